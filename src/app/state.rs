use super::{LifecycleState, Supervisor};
use crate::signals::StopSignal;
use tokio::sync::watch;
use tracing::debug;

/// A launched service and the handle used to observe its exit.
#[derive(Debug)]
pub struct TrackedService {
    pub name: String,
    pub pid: u32,
    pub stop_signal: StopSignal,
    pub program: String,
    pub args: Vec<String>,
    exit: watch::Receiver<Option<i32>>,
}

impl TrackedService {
    pub(super) fn new(
        name: String,
        pid: u32,
        stop_signal: StopSignal,
        program: String,
        args: Vec<String>,
        exit: watch::Receiver<Option<i32>>,
    ) -> Self {
        Self {
            name,
            pid,
            stop_signal,
            program,
            args,
            exit,
        }
    }

    /// Liveness check: `false` once the process has been reaped.
    pub fn is_alive(&self) -> bool {
        self.exit.borrow().is_none()
    }

    pub fn exit_code(&self) -> Option<i32> {
        *self.exit.borrow()
    }
}

impl Supervisor {
    pub(super) fn set_lifecycle(&mut self, state: LifecycleState) {
        debug!("Supervisor state changed to: {:?}", state);
        self.lifecycle = state;
    }

    pub fn lifecycle(&self) -> LifecycleState {
        self.lifecycle
    }

    pub fn services(&self) -> &[TrackedService] {
        &self.services
    }

    pub fn service(&self, name: &str) -> Option<&TrackedService> {
        self.services.iter().find(|service| service.name == name)
    }

    /// Names of tracked services that are still running.
    pub fn alive_services(&self) -> Vec<String> {
        self.services
            .iter()
            .filter(|service| service.is_alive())
            .map(|service| service.name.clone())
            .collect()
    }
}
