use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Required setting '{key}' is not set")]
    MissingSetting { key: String },

    #[error("Required {kind} not found: {}", .path.display())]
    MissingPath { kind: &'static str, path: PathBuf },

    #[error("Required executable '{name}' not found on PATH")]
    MissingExecutable { name: String },

    #[error("Initialization step '{step}' failed: {message}")]
    InitFailed { step: String, message: String },

    #[error("Failed to spawn {service}: {source}")]
    Spawn {
        service: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Service {service} is not running after launch (exit code {code})")]
    LaunchFailed { service: String, code: i32 },

    #[error("Failed to register signal handler for {signal}: {source}")]
    SignalSetup {
        signal: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("System error: {message}")]
    System { message: String },
}

/// Coarse classification used to pick the early-exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Precondition,
    Initialization,
    Launch,
    Runtime,
}

impl SupervisorError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn init_failed<S: Into<String>, M: Into<String>>(step: S, message: M) -> Self {
        Self::InitFailed {
            step: step.into(),
            message: message.into(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Config(_)
            | Self::MissingSetting { .. }
            | Self::MissingPath { .. }
            | Self::MissingExecutable { .. } => ErrorClass::Precondition,
            Self::InitFailed { .. } => ErrorClass::Initialization,
            Self::Spawn { .. } | Self::LaunchFailed { .. } => ErrorClass::Launch,
            Self::SignalSetup { .. } | Self::System { .. } => ErrorClass::Runtime,
        }
    }

    /// Process exit status for a supervisor that stops on this error.
    pub fn exit_code(&self) -> i32 {
        match self.class() {
            ErrorClass::Precondition => 2,
            ErrorClass::Initialization => 3,
            ErrorClass::Launch => 4,
            ErrorClass::Runtime => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, SupervisorError>;
