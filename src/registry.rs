//! Service lifecycle: create, read, list, update and delete
//!
//! Every operation takes an authenticated [`Caller`]. Services are only
//! visible to their owner (and to admins for reads and deletes); a service
//! owned by someone else is reported as `NotFound` so its existence does not
//! leak.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::allocator::SubdomainAllocator;
use crate::auth::require_role;
use crate::config::TunnelSettings;
use crate::database::ServiceStore;
use crate::error::AppError;
use crate::model::{
    Caller, Role, Service, ServiceRecord, ServiceRequest, SubdomainAvailability, Usage,
};
use crate::notifier::{dispatch_service_created, Notifier, ServiceCreated};
use crate::tunnel_config::{self, ClientArtifacts};
use crate::validation::validate_service;

#[derive(Clone)]
pub struct ServiceRegistry {
    store: ServiceStore,
    allocator: SubdomainAllocator,
    settings: Arc<TunnelSettings>,
    notifier: Arc<dyn Notifier>,
}

impl ServiceRegistry {
    pub fn new(store: ServiceStore, settings: TunnelSettings, notifier: Arc<dyn Notifier>) -> Self {
        let settings = Arc::new(settings);
        Self {
            allocator: SubdomainAllocator::new(store.clone(), settings.clone()),
            store,
            settings,
            notifier,
        }
    }

    /// Registers a new service for the caller
    ///
    /// 1. Validates the request
    /// 2. Rejects the call when the caller's role quota is used up
    /// 3. Checks the subdomain is free
    /// 4. Stores the record (quota and subdomain are re-checked atomically)
    /// 5. Fires the owner notification without waiting for it
    pub async fn create(
        &self,
        caller: &Caller,
        request: &ServiceRequest,
    ) -> Result<Service, AppError> {
        let input = validate_service(request).map_err(AppError::ValidationFailed)?;

        let limit = caller.role.limits().max_tunnels;
        if let Some(limit) = limit {
            if self.store.count_by_owner(&caller.id)? >= limit as usize {
                return Err(AppError::QuotaExceeded { limit });
            }
        }

        self.allocator.ensure_available(&input.subdomain, None)?;

        let record = ServiceRecord::from_input(
            Uuid::new_v4().to_string(),
            caller.id.clone(),
            input,
            Utc::now(),
        );

        self.store.insert(&record, limit)?;

        let service = self.allocator.view(record);
        tracing::info!(
            service_id = %service.record.id,
            owner_id = %caller.id,
            subdomain = %service.record.subdomain,
            frp_type = %service.record.frp_type,
            "service created"
        );

        dispatch_service_created(
            self.notifier.clone(),
            ServiceCreated {
                owner_id: caller.id.clone(),
                service_id: service.record.id.clone(),
                name: service.record.name.clone(),
                public_url: service.public_url.clone(),
            },
        );

        Ok(service)
    }

    /// Loads a record the caller may see, hiding foreign services as `NotFound`
    fn load_visible(
        &self,
        caller: &Caller,
        id: &str,
        admin_allowed: bool,
    ) -> Result<ServiceRecord, AppError> {
        match self.store.get(id)? {
            Some(record) if record.owner_id == caller.id => Ok(record),
            Some(record) if admin_allowed && caller.is_admin() => Ok(record),
            _ => Err(AppError::NotFound),
        }
    }

    pub async fn get(&self, caller: &Caller, id: &str) -> Result<Service, AppError> {
        let record = self.load_visible(caller, id, true)?;
        Ok(self.allocator.view(record))
    }

    /// The caller's services, newest first
    pub async fn list_by_owner(&self, caller: &Caller) -> Result<Vec<Service>, AppError> {
        let records = self.store.list_by_owner(&caller.id)?;
        Ok(records.into_iter().map(|r| self.allocator.view(r)).collect())
    }

    /// Every service in the system, newest first (admin only)
    pub async fn list_all(&self, caller: &Caller) -> Result<Vec<Service>, AppError> {
        require_role(caller, Role::Admin)?;
        let records = self.store.list_all()?;
        Ok(records.into_iter().map(|r| self.allocator.view(r)).collect())
    }

    /// Replaces every mutable field of an owned service
    pub async fn update(
        &self,
        caller: &Caller,
        id: &str,
        request: &ServiceRequest,
    ) -> Result<Service, AppError> {
        let input = validate_service(request).map_err(AppError::ValidationFailed)?;
        let mut record = self.load_visible(caller, id, false)?;

        self.allocator
            .ensure_available(&input.subdomain, Some(&record.subdomain))?;

        record.apply(input);
        self.store.update(&record)?;

        tracing::info!(service_id = %record.id, subdomain = %record.subdomain, "service updated");
        Ok(self.allocator.view(record))
    }

    /// Permanently removes a service owned by the caller (or any service for admins)
    pub async fn delete(&self, caller: &Caller, id: &str) -> Result<Service, AppError> {
        self.load_visible(caller, id, true)?;
        let record = self.store.delete(id)?;

        tracing::info!(service_id = %record.id, deleted_by = %caller.id, "service deleted");
        Ok(self.allocator.view(record))
    }

    /// Renders the frpc config and startup script for a visible service
    pub async fn client_artifacts(
        &self,
        caller: &Caller,
        id: &str,
    ) -> Result<ClientArtifacts, AppError> {
        let record = self.load_visible(caller, id, true)?;
        Ok(tunnel_config::generate(&record, &self.settings))
    }

    pub async fn subdomain_availability(
        &self,
        subdomain: &str,
    ) -> Result<SubdomainAvailability, AppError> {
        self.allocator.availability(subdomain)
    }

    /// Quota usage of the caller
    pub async fn usage(&self, caller: &Caller) -> Result<Usage, AppError> {
        Ok(Usage {
            caller: caller.clone(),
            max_tunnels: caller.role.limits().max_tunnels,
            used: self.store.count_by_owner(&caller.id)?,
        })
    }
}
