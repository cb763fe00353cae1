//! Egress interface resolution.
//!
//! The route to a well-known external address names the egress device. Right after boot the
//! default route may not exist yet, so the lookup is retried with a [`FixedBackoff`] before
//! falling back to the first non-loopback device.

use netkeep_sys::link;
use thiserror::Error;

use crate::{
    backoff::{self, FixedBackoff},
    interface::Interface,
    kernel::NetKernel,
    options::ResolverOptions,
};

/// Resolution failed; the watchdog cannot start.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// Neither the route lookup nor device enumeration produced a usable device.
    #[error("no interface found after {attempts} route lookups and device enumeration")]
    NoInterfaceFound {
        /// Route lookups attempted.
        attempts: usize,
    },
}

/// Binds the egress interface once at startup.
#[derive(Debug)]
pub struct Resolver<'a, K: ?Sized> {
    kernel: &'a K,
    options: ResolverOptions,
}

impl<'a, K> Resolver<'a, K>
where
    K: NetKernel + ?Sized,
{
    /// Creates a resolver with default options.
    pub fn new(kernel: &'a K) -> Self {
        Self { kernel, options: ResolverOptions::default() }
    }

    /// Replaces the options.
    pub fn with_options(mut self, options: ResolverOptions) -> Self {
        self.options = options;
        self
    }

    /// Resolves the egress interface.
    pub async fn resolve(&self) -> Result<Interface, ResolveError> {
        let attempts = self.options.route_attempts.max(1);
        let backoff = FixedBackoff::attempts(self.options.route_delay, attempts);

        if let Some(iface) = backoff::retry(backoff, |n| self.from_route(n)).await {
            tracing::info!(%iface, "egress interface resolved from route");
            return Ok(iface);
        }

        tracing::warn!(
            attempts,
            "route lookup gave no interface, falling back to device enumeration"
        );

        match self.first_device().await {
            Some(iface) => {
                tracing::info!(%iface, "egress interface resolved from device list");
                Ok(iface)
            }
            None => Err(ResolveError::NoInterfaceFound { attempts }),
        }
    }

    async fn from_route(&self, attempt: usize) -> Option<Interface> {
        let destination = self.options.probe_address;

        let name = match self.kernel.route_device(destination).await {
            Ok(Some(name)) => name,
            Ok(None) => {
                tracing::debug!(attempt, %destination, "route names no device");
                return None;
            }
            Err(e) => {
                tracing::debug!(attempt, %destination, error = %e, "route lookup failed");
                return None;
            }
        };

        self.validate(&name)
    }

    async fn first_device(&self) -> Option<Interface> {
        let devices = self
            .kernel
            .devices()
            .await
            .map_err(|e| tracing::warn!(error = %e, "failed to enumerate devices"))
            .ok()?;

        let first = link::first_non_loopback(&devices);
        tracing::debug!(count = devices.len(), ?first, "devices enumerated");

        self.validate(&first?.name)
    }

    fn validate(&self, name: &str) -> Option<Interface> {
        let iface = Interface::new(name).map_err(|e| tracing::debug!(error = %e, "rejected")).ok()?;
        if !self.kernel.device_exists(iface.name()) {
            tracing::debug!(%iface, "device not in device table");
            return None;
        }
        Some(iface)
    }
}
