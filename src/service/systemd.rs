//! `systemctl`-backed service control for Linux hosts.
//!
//! Every call spawns `systemctl` with stdout/stderr discarded and maps the
//! exit status to a boolean. Start and stop can optionally be wrapped in
//! non-interactive `sudo`; status queries never are.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::ServiceControl;
use crate::error::ExecutionError;

/// Service manager binary.
const SYSTEMCTL: &str = "systemctl";

/// Privilege escalation binary used when `use_sudo` is set.
const SUDO: &str = "sudo";

/// Action requested from `systemctl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// `is-active --quiet`
    IsActive,
    /// `start`
    Start,
    /// `stop`
    Stop,
}

impl Action {
    fn verb(self) -> &'static str {
        match self {
            Self::IsActive => "is-active",
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }

    fn mutates(self) -> bool {
        !matches!(self, Self::IsActive)
    }
}

/// Production [`ServiceControl`] that shells out to `systemctl`.
#[derive(Debug, Clone, Default)]
pub struct Systemctl {
    use_sudo: bool,
    user_mode: bool,
    timeout: Option<Duration>,
}

impl Systemctl {
    /// System-manager control without sudo and without a time bound.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap `start`/`stop` in `sudo -n`.
    #[must_use]
    pub fn with_sudo(mut self, use_sudo: bool) -> Self {
        self.use_sudo = use_sudo;
        self
    }

    /// Talk to the per-user manager (`systemctl --user`).
    #[must_use]
    pub fn with_user_mode(mut self, user_mode: bool) -> Self {
        self.user_mode = user_mode;
        self
    }

    /// Kill and fail any call that runs longer than `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Program and arguments used for `action` on `unit`.
    pub fn command_line(&self, action: Action, unit: &str) -> (&'static str, Vec<String>) {
        let mut args = Vec::new();
        let program = if self.use_sudo && action.mutates() {
            args.push("-n".to_owned());
            args.push(SYSTEMCTL.to_owned());
            SUDO
        } else {
            SYSTEMCTL
        };

        if self.user_mode {
            args.push("--user".to_owned());
        }
        args.push(action.verb().to_owned());
        if action == Action::IsActive {
            args.push("--quiet".to_owned());
        }
        args.push(unit.to_owned());

        (program, args)
    }

    async fn run(&self, action: Action, unit: &str) -> Result<bool, ExecutionError> {
        let (program, args) = self.command_line(action, unit);

        let mut cmd = tokio::process::Command::new(program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let status = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, cmd.status())
                .await
                .map_err(|_| ExecutionError::Timeout {
                    program: program.to_owned(),
                    unit: unit.to_owned(),
                    seconds: limit.as_secs(),
                })?,
            None => cmd.status().await,
        }
        .map_err(|source| ExecutionError::Spawn {
            program: program.to_owned(),
            source,
        })?;

        debug!(
            action = action.verb(),
            unit = %unit,
            exit_code = ?status.code(),
            "systemctl finished"
        );

        Ok(status.success())
    }
}

#[async_trait]
impl ServiceControl for Systemctl {
    async fn is_active(&self, unit: &str) -> Result<bool, ExecutionError> {
        self.run(Action::IsActive, unit).await
    }

    async fn start(&self, unit: &str) -> Result<bool, ExecutionError> {
        self.run(Action::Start, unit).await
    }

    async fn stop(&self, unit: &str) -> Result<bool, ExecutionError> {
        self.run(Action::Stop, unit).await
    }
}
