//! Library exports for the tunnel service registry
//!
//! This module exposes internal components for testing and potential library usage.

pub mod allocator;
pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod model;
pub mod notifier;
pub mod registry;
pub mod route;
pub mod state;
pub mod tunnel_config;
pub mod validation;
