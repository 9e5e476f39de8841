//! Watchdog: keeps a configured set of systemd services running.
//!
//! Periodically pings each service, tries a bounded number of restarts when
//! one is found down, and notifies about every transition. The set of
//! services and the timing come from a settings store and are refetched on a
//! fixed cadence, so changes apply without restarting the daemon.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Settings-fetch / watch supervisory loop.
pub mod app;
/// Daemon configuration loading and validation.
pub mod config;
/// Validated configuration snapshots.
pub mod context;
/// Notification sink credentials.
pub mod credentials;
/// Check cycle, retry and reload engine.
pub mod engine;
/// Error taxonomy.
pub mod error;
/// Structured logging setup.
pub mod logging;
/// Notification sinks.
pub mod notify;
/// Service handles and service-manager control.
pub mod service;
/// Raw settings stores.
pub mod settings;
