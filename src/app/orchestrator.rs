use super::state::TrackedService;
use super::types::{LifecycleState, ShutdownReport, ShutdownState, SupervisorEvent};
use crate::config::SupervisorConfig;
use crate::error::{Result, SupervisorError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Main supervisor that owns the tracked services for one container run
pub struct Supervisor {
    pub(super) config: SupervisorConfig,

    // Tracked services, fixed after launch
    pub(super) services: Vec<TrackedService>,

    // Lifecycle management
    pub(super) lifecycle: LifecycleState,
    pub(super) shutdown_state: ShutdownState,
    pub(super) shutdown_report: Option<ShutdownReport>,
    pub(super) event_sender: mpsc::UnboundedSender<SupervisorEvent>,
    pub(super) event_receiver: mpsc::UnboundedReceiver<SupervisorEvent>,
    pub(super) signals_installed: bool,
    pub(super) cancellation_token: CancellationToken,

    // Side channels, never awaited by the supervisor itself
    pub(super) background_tasks: Vec<JoinHandle<bool>>,
    pub(super) health_task: Option<JoinHandle<bool>>,
}

impl Supervisor {
    /// Create a new supervisor with the given configuration
    pub fn new(config: SupervisorConfig) -> Self {
        let (event_sender, event_receiver) = mpsc::unbounded_channel();

        Self {
            config,
            services: Vec::new(),
            lifecycle: LifecycleState::Starting,
            shutdown_state: ShutdownState::default(),
            shutdown_report: None,
            event_sender,
            event_receiver,
            signals_installed: false,
            cancellation_token: CancellationToken::new(),
            background_tasks: Vec::new(),
            health_task: None,
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Sender feeding the same queue the signal handlers and exit watchers use.
    pub fn event_sender(&self) -> mpsc::UnboundedSender<SupervisorEvent> {
        self.event_sender.clone()
    }

    pub fn shutdown_state(&self) -> ShutdownState {
        self.shutdown_state
    }

    pub fn shutdown_report(&self) -> Option<&ShutdownReport> {
        self.shutdown_report.as_ref()
    }

    /// Take the readiness monitor's handle, if one was started.
    pub fn take_health_task(&mut self) -> Option<JoinHandle<bool>> {
        self.health_task.take()
    }

    /// Take the background task handles, if any were started.
    pub fn take_background_tasks(&mut self) -> Vec<JoinHandle<bool>> {
        std::mem::take(&mut self.background_tasks)
    }

    pub(super) fn port(&self) -> Result<u16> {
        self.config
            .port
            .ok_or_else(|| SupervisorError::MissingSetting {
                key: "PORT".to_string(),
            })
    }
}
