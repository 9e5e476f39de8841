//! Named host services and the capability used to control them.
//!
//! A [`Service`] is a thin handle: it caches nothing and asks the injected
//! [`ServiceControl`] about liveness every time. The production capability
//! is [`systemd::Systemctl`].

pub mod systemd;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ExecutionError;

/// Unit suffix used by the service manager.
pub const UNIT_SUFFIX: &str = ".service";

/// Start/stop/status access to host services by unit name.
///
/// Each operation returns `Ok(false)` for a clean failure status (inactive
/// service, refused start) and `Err` only when the mechanism itself could
/// not be invoked.
#[async_trait]
pub trait ServiceControl: Send + Sync {
    /// Whether the unit is currently active.
    async fn is_active(&self, unit: &str) -> Result<bool, ExecutionError>;
    /// Request the unit to start. Starting an active unit must succeed.
    async fn start(&self, unit: &str) -> Result<bool, ExecutionError>;
    /// Request the unit to stop.
    async fn stop(&self, unit: &str) -> Result<bool, ExecutionError>;
}

/// Handle for one watched host service.
#[derive(Clone)]
pub struct Service {
    name: String,
    unit: String,
    control: Arc<dyn ServiceControl>,
}

impl Service {
    /// Create a handle for `name`, controlled through `control`.
    pub fn new(name: impl Into<String>, control: Arc<dyn ServiceControl>) -> Self {
        let name = name.into();
        let unit = unit_name(&name);
        Self {
            name,
            unit,
            control,
        }
    }

    /// Configured service name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unit name passed to the service manager (`<name>.service`).
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Whether the service is active right now.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError`] if the control capability cannot be invoked.
    pub async fn ping(&self) -> Result<bool, ExecutionError> {
        self.control.is_active(&self.unit).await
    }

    /// Ask the service manager to start the service.
    ///
    /// Does not verify liveness; callers re-`ping`.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError`] if the control capability cannot be invoked.
    pub async fn start(&self) -> Result<bool, ExecutionError> {
        self.control.start(&self.unit).await
    }

    /// Ask the service manager to stop the service.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError`] if the control capability cannot be invoked.
    pub async fn stop(&self) -> Result<bool, ExecutionError> {
        self.control.stop(&self.unit).await
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.unit)
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("name", &self.name)
            .field("unit", &self.unit)
            .finish_non_exhaustive()
    }
}

/// Derive the unit name for a configured service name.
///
/// Names that already carry the `.service` suffix are used as-is.
pub fn unit_name(name: &str) -> String {
    if name.ends_with(UNIT_SUFFIX) {
        name.to_owned()
    } else {
        format!("{name}{UNIT_SUFFIX}")
    }
}
