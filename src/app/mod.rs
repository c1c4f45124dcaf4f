mod background;
mod health;
mod launch;
mod orchestrator;
mod runtime;
mod shutdown;
mod startup;
mod state;
mod types;


pub use background::spawn_background_tasks;
pub use health::{HealthCheckResult, HealthMonitor};
pub use orchestrator::Supervisor;
pub use startup::{prepare_runtime_dirs, validate_environment};
pub use state::TrackedService;
pub use types::{
    LifecycleState, ShutdownReport, ShutdownState, ShutdownTrigger, SupervisorEvent,
};
