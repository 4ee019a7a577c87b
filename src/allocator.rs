//! Subdomain allocation and public URL derivation

use std::sync::Arc;

use crate::config::TunnelSettings;
use crate::database::ServiceStore;
use crate::error::AppError;
use crate::model::{Service, ServiceRecord, SubdomainAvailability};
use crate::validation::check_subdomain;

/// Builds the public URL of a subdomain on the given base host
///
/// ```
/// # use tunnel_registry::allocator::public_url;
/// assert_eq!(public_url("myapp", "panda.example.com"), "http://myapp.panda.example.com");
/// ```
pub fn public_url(subdomain: &str, base_host: &str) -> String {
    format!("http://{subdomain}.{base_host}")
}

#[derive(Clone)]
pub struct SubdomainAllocator {
    store: ServiceStore,
    settings: Arc<TunnelSettings>,
}

impl SubdomainAllocator {
    pub fn new(store: ServiceStore, settings: Arc<TunnelSettings>) -> Self {
        Self { store, settings }
    }

    pub fn base_host(&self) -> &str {
        self.settings.base_host()
    }

    pub fn public_url(&self, subdomain: &str) -> String {
        public_url(subdomain, self.base_host())
    }

    /// Attaches the derived public URL to a stored record
    pub fn view(&self, record: ServiceRecord) -> Service {
        let public_url = self.public_url(&record.subdomain);
        Service { record, public_url }
    }

    /// Fails with `DuplicateSubdomain` when another service owns `candidate`
    ///
    /// `current` is the service's stored subdomain on update; an unchanged
    /// subdomain is not checked again. This is only a pre-check for a
    /// friendly error: the store re-checks inside the write transaction.
    pub fn ensure_available(
        &self,
        candidate: &str,
        current: Option<&str>,
    ) -> Result<(), AppError> {
        if current == Some(candidate) {
            return Ok(());
        }

        match self.store.subdomain_owner(candidate)? {
            Some(_) => Err(AppError::DuplicateSubdomain(candidate.to_string())),
            None => Ok(()),
        }
    }

    /// Reports whether a subdomain can still be registered
    pub fn availability(&self, candidate: &str) -> Result<SubdomainAvailability, AppError> {
        check_subdomain(candidate).map_err(|message| AppError::invalid("subdomain", message))?;

        let available = self.store.subdomain_owner(candidate)?.is_none();
        Ok(SubdomainAvailability {
            subdomain: candidate.to_string(),
            available,
            public_url: self.public_url(candidate),
        })
    }
}
