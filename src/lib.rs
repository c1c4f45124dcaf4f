pub mod app;
pub mod config;
pub mod error;
pub mod process;
pub mod signals;

pub use app::{
    HealthCheckResult, HealthMonitor, LifecycleState, ShutdownReport, ShutdownState,
    ShutdownTrigger, Supervisor, SupervisorEvent, TrackedService,
};
pub use config::SupervisorConfig;
pub use error::{ErrorClass, Result, SupervisorError};
pub use signals::StopSignal;
