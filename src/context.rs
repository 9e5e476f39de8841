//! Validated, immutable watchdog configuration snapshots.
//!
//! A [`WatchdogContext`] is built from the raw key-value document returned
//! by a settings store. Construction either fully succeeds or fails with a
//! [`ValidationError`]; there is no partially valid context.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;
use crate::service::{Service, ServiceControl};

/// Raw field holding the list of service names.
pub const LIST_OF_SERVICES: &str = "ListOfServices";
/// Raw field holding the seconds between check cycles.
pub const NUM_OF_SEC_CHECK: &str = "NumOfSecCheck";
/// Raw field holding the seconds between start attempts.
pub const NUM_OF_SEC_WAIT: &str = "NumOfSecWait";
/// Raw field holding the number of start attempts per cycle.
pub const NUM_OF_ATTEMPTS: &str = "NumOfAttempts";

/// Largest float that still maps exactly onto an integer.
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;

/// Raw configuration fields as fetched from a settings store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawSettings {
    fields: BTreeMap<String, Value>,
}

impl RawSettings {
    /// Empty field map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(field.to_owned(), value.into());
        self
    }

    /// Look up a raw field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

/// Immutable configuration snapshot consumed by the engine.
#[derive(Debug, Clone)]
pub struct WatchdogContext {
    services: Vec<Service>,
    check_interval_secs: u64,
    retry_wait_secs: u64,
    max_attempts: u32,
}

impl WatchdogContext {
    /// Build a context from already-typed values.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyServiceName`] if any name is blank.
    pub fn new<I, S>(
        names: I,
        check_interval_secs: u64,
        retry_wait_secs: u64,
        max_attempts: u32,
        control: Arc<dyn ServiceControl>,
    ) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let services = names
            .into_iter()
            .enumerate()
            .map(|(index, name)| {
                let name: String = name.into();
                let trimmed = name.trim();
                if trimmed.is_empty() {
                    return Err(ValidationError::EmptyServiceName { index });
                }
                Ok(Service::new(trimmed, Arc::clone(&control)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            services,
            check_interval_secs,
            retry_wait_secs,
            max_attempts,
        })
    }

    /// Validate raw settings and build a context.
    ///
    /// All four fields are required. Numeric fields accept integers, floats
    /// without a fractional part and numeric strings.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming the first offending field.
    pub fn from_raw(
        raw: &RawSettings,
        control: Arc<dyn ServiceControl>,
    ) -> Result<Self, ValidationError> {
        let names = service_names(raw)?;
        let check_interval_secs = non_negative(raw, NUM_OF_SEC_CHECK)?;
        let retry_wait_secs = non_negative(raw, NUM_OF_SEC_WAIT)?;
        let attempts = non_negative(raw, NUM_OF_ATTEMPTS)?;
        let max_attempts = u32::try_from(attempts).map_err(|_| ValidationError::OutOfRange {
            field: NUM_OF_ATTEMPTS,
            value: attempts.to_string(),
        })?;

        Self::new(
            names,
            check_interval_secs,
            retry_wait_secs,
            max_attempts,
            control,
        )
    }

    /// Watched services, in configuration order.
    pub fn services(&self) -> &[Service] {
        &self.services
    }

    /// Seconds to sleep between check cycles.
    pub fn check_interval_secs(&self) -> u64 {
        self.check_interval_secs
    }

    /// Seconds to wait between start attempts for one service.
    pub fn retry_wait_secs(&self) -> u64 {
        self.retry_wait_secs
    }

    /// Start attempts per service per cycle.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// [`Self::check_interval_secs`] as a [`Duration`].
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    /// [`Self::retry_wait_secs`] as a [`Duration`].
    pub fn retry_wait(&self) -> Duration {
        Duration::from_secs(self.retry_wait_secs)
    }
}

fn service_names(raw: &RawSettings) -> Result<Vec<String>, ValidationError> {
    let invalid = ValidationError::InvalidType {
        field: LIST_OF_SERVICES,
        expected: "a list of service names",
    };

    match raw.get(LIST_OF_SERVICES) {
        None | Some(Value::Null) => Err(ValidationError::MissingField {
            field: LIST_OF_SERVICES,
        }),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(name) => Ok(name.clone()),
                _ => Err(invalid.clone()),
            })
            .collect(),
        Some(_) => Err(invalid),
    }
}

fn non_negative(raw: &RawSettings, field: &'static str) -> Result<u64, ValidationError> {
    match raw.get(field) {
        None | Some(Value::Null) => Err(ValidationError::MissingField { field }),
        Some(Value::Number(n)) => {
            if let Some(v) = n.as_u64() {
                Ok(v)
            } else if n.as_i64().is_some() {
                Err(ValidationError::Negative {
                    field,
                    value: n.to_string(),
                })
            } else {
                let f = n.as_f64().ok_or_else(|| ValidationError::OutOfRange {
                    field,
                    value: n.to_string(),
                })?;
                float_to_u64(field, f, &n.to_string())
            }
        }
        Some(Value::String(s)) => {
            let s = s.trim();
            if let Ok(v) = s.parse::<u64>() {
                Ok(v)
            } else if s.parse::<i64>().is_ok() {
                Err(ValidationError::Negative {
                    field,
                    value: s.to_owned(),
                })
            } else if let Ok(f) = s.parse::<f64>() {
                float_to_u64(field, f, s)
            } else {
                Err(ValidationError::InvalidType {
                    field,
                    expected: "a non-negative integer",
                })
            }
        }
        Some(_) => Err(ValidationError::InvalidType {
            field,
            expected: "a non-negative integer",
        }),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn float_to_u64(field: &'static str, f: f64, shown: &str) -> Result<u64, ValidationError> {
    if !f.is_finite() || f > MAX_EXACT_FLOAT {
        return Err(ValidationError::OutOfRange {
            field,
            value: shown.to_owned(),
        });
    }
    if f < 0.0 {
        return Err(ValidationError::Negative {
            field,
            value: shown.to_owned(),
        });
    }
    if f.fract() != 0.0 {
        return Err(ValidationError::NotInteger {
            field,
            value: shown.to_owned(),
        });
    }
    // Range and fraction are checked above.
    Ok(f as u64)
}
