use std::fmt;

/// Supervisor lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Starting,
    Running,
    ShuttingDown,
    Stopped,
}

/// Progress of the one-time shutdown sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownState {
    #[default]
    NotStarted,
    InProgress,
    Complete,
}

impl ShutdownState {
    /// Test-and-set: returns `true` only for the call that moves the state
    /// out of `NotStarted`.
    pub fn begin(&mut self) -> bool {
        match self {
            ShutdownState::NotStarted => {
                *self = ShutdownState::InProgress;
                true
            }
            ShutdownState::InProgress | ShutdownState::Complete => false,
        }
    }

    pub fn complete(&mut self) {
        *self = ShutdownState::Complete;
    }
}

/// Notifications delivered into the supervisor's control loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    ServiceExited { name: String, code: i32 },
    SignalReceived(String),
}

/// What started the shutdown sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownTrigger {
    ServiceExited { name: String, code: i32 },
    Signal(String),
}

impl From<SupervisorEvent> for ShutdownTrigger {
    fn from(event: SupervisorEvent) -> Self {
        match event {
            SupervisorEvent::ServiceExited { name, code } => {
                ShutdownTrigger::ServiceExited { name, code }
            }
            SupervisorEvent::SignalReceived(signal) => ShutdownTrigger::Signal(signal),
        }
    }
}

impl fmt::Display for ShutdownTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownTrigger::ServiceExited { name, code } => {
                write!(f, "service {} exited with code {}", name, code)
            }
            ShutdownTrigger::Signal(signal) => write!(f, "received {}", signal),
        }
    }
}

/// Outcome of the shutdown sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    pub trigger: ShutdownTrigger,
    pub exit_code: i32,
    /// Services that were sent their stop signal
    pub signalled: Vec<String>,
    /// All services confirmed stopped before the deadline
    pub drained: bool,
}
