use super::{background, LifecycleState, Supervisor};
use crate::config::SupervisorConfig;
use crate::error::{Result, SupervisorError};
use crate::process;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

/// Check the port setting, required paths and required executables.
///
/// Returns the configured port. Has no side effects beyond logging.
pub fn validate_environment(config: &SupervisorConfig) -> Result<u16> {
    let port = config.port.ok_or_else(|| {
        error!("PORT is not set");
        SupervisorError::MissingSetting {
            key: "PORT".to_string(),
        }
    })?;

    if !config.paths.scheduler_config.is_file() {
        error!(
            "Scheduler config not found: {}",
            config.paths.scheduler_config.display()
        );
        return Err(SupervisorError::MissingPath {
            kind: "scheduler config",
            path: config.paths.scheduler_config.clone(),
        });
    }

    if !config.paths.app_dir.is_dir() {
        error!(
            "Application directory not found: {}",
            config.paths.app_dir.display()
        );
        return Err(SupervisorError::MissingPath {
            kind: "application directory",
            path: config.paths.app_dir.clone(),
        });
    }

    for name in &config.required_executables {
        match which::which(name) {
            Ok(path) => debug!("Resolved {} to {}", name, path.display()),
            Err(_) => {
                error!("Required executable not found: {}", name);
                return Err(SupervisorError::MissingExecutable { name: name.clone() });
            }
        }
    }

    info!("Environment validated (port {})", port);
    Ok(port)
}

/// Ensure each writable directory exists and relax its permission bits.
///
/// Every failure is logged and skipped. Returns how many directories exist
/// afterwards.
pub fn prepare_runtime_dirs(dirs: &[PathBuf], mode: u32) -> usize {
    let mut ready = 0;

    for dir in dirs {
        if let Err(e) = fs::create_dir_all(dir) {
            warn!("Could not create {}: {}", dir.display(), e);
            continue;
        }
        ready += 1;

        if let Err(e) = fs::set_permissions(dir, fs::Permissions::from_mode(mode)) {
            debug!(
                "Could not set mode {:o} on {}: {}",
                mode,
                dir.display(),
                e
            );
        }
    }

    debug!("{} of {} runtime directories ready", ready, dirs.len());
    ready
}

impl Supervisor {
    /// Environment Validator
    pub fn validate(&self) -> Result<u16> {
        info!("Validating environment");
        validate_environment(&self.config)
    }

    /// Run the one-time setup steps in order; the first failure aborts startup
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Running {} initialization step(s)", self.config.init.len());
        let port = self.config.port;

        for step in &self.config.init {
            info!("Initialization step '{}' starting", step.name);

            let status = process::command(&step.program, &step.resolved_args(port), port)
                .status()
                .await
                .map_err(|e| {
                    error!("Failed to run initialization step '{}': {}", step.name, e);
                    SupervisorError::init_failed(
                        step.name.as_str(),
                        format!("could not run {}: {}", step.program, e),
                    )
                })?;

            if !status.success() {
                let code = process::exit_code(status);
                error!(
                    "Initialization step '{}' exited with code {}",
                    step.name, code
                );
                return Err(SupervisorError::init_failed(
                    step.name.as_str(),
                    format!("exited with code {}", code),
                ));
            }

            info!("Initialization step '{}' completed", step.name);
        }

        info!("Initialization completed successfully");
        Ok(())
    }

    /// Runtime Directory Preparer
    pub fn prepare_runtime_dirs(&self) -> usize {
        prepare_runtime_dirs(
            &self.config.paths.writable_dirs,
            self.config.paths.writable_mode,
        )
    }

    /// Start background tasks, launch the services and confirm they are alive
    pub async fn start(&mut self) -> Result<()> {
        let port = self.port()?;
        info!("Starting supervised services");

        self.background_tasks = background::spawn_background_tasks(&self.config.background, port);

        self.prepare_runtime_dirs();

        // Handlers must exist before any child is spawned
        self.install_signal_handlers()?;

        self.launch_services(port)?;
        self.confirm_liveness().await?;

        self.set_lifecycle(LifecycleState::Running);
        self.spawn_health_monitor(port);

        info!("All services started successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CommandConfig;

    fn config_in(dir: &std::path::Path) -> SupervisorConfig {
        let scheduler_config = dir.join("crontab");
        std::fs::write(&scheduler_config, "* * * * * true\n").unwrap();

        let mut config = SupervisorConfig::default();
        config.port = Some(8080);
        config.paths.app_dir = dir.to_path_buf();
        config.paths.scheduler_config = scheduler_config;
        config.required_executables = vec!["sh".to_string()];
        config
    }

    #[test]
    fn test_missing_port_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.port = None;

        let err = validate_environment(&config).unwrap_err();
        assert!(matches!(err, SupervisorError::MissingSetting { .. }));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_missing_paths_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.paths.scheduler_config = dir.path().join("missing-crontab");
        assert!(matches!(
            validate_environment(&config),
            Err(SupervisorError::MissingPath {
                kind: "scheduler config",
                ..
            })
        ));

        let mut config = config_in(dir.path());
        config.paths.app_dir = dir.path().join("missing-app");
        assert!(matches!(
            validate_environment(&config),
            Err(SupervisorError::MissingPath {
                kind: "application directory",
                ..
            })
        ));
    }

    #[test]
    fn test_missing_executable_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config
            .required_executables
            .push("definitely-not-installed-procvisor".to_string());

        match validate_environment(&config) {
            Err(SupervisorError::MissingExecutable { name }) => {
                assert_eq!(name, "definitely-not-installed-procvisor")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_valid_environment_returns_port() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        assert_eq!(validate_environment(&config).unwrap(), 8080);
    }

    #[test]
    fn test_prepare_runtime_dirs_creates_and_relaxes() {
        let dir = tempfile::tempdir().unwrap();
        let dirs = vec![dir.path().join("tmp"), dir.path().join("run/nested")];

        assert_eq!(prepare_runtime_dirs(&dirs, 0o777), 2);
        for path in &dirs {
            let mode = std::fs::metadata(path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o777);
        }
    }

    #[test]
    fn test_prepare_runtime_dirs_skips_failures() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "not a directory").unwrap();

        let dirs = vec![blocker.join("child"), dir.path().join("ok")];
        assert_eq!(prepare_runtime_dirs(&dirs, 0o755), 1);
        assert!(dir.path().join("ok").is_dir());
    }

    #[tokio::test]
    async fn test_initialize_runs_steps_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("init.log");
        let mut config = config_in(dir.path());
        config.init = ["create", "migrate"]
            .iter()
            .map(|name| CommandConfig {
                name: name.to_string(),
                program: "sh".to_string(),
                args: vec![
                    "-c".to_string(),
                    format!("echo {} >> {}", name, log.display()),
                ],
            })
            .collect();

        let mut supervisor = Supervisor::new(config);
        supervisor.initialize().await.unwrap();

        let contents = std::fs::read_to_string(&log).unwrap();
        assert_eq!(contents, "create\nmigrate\n");
    }

    #[tokio::test]
    async fn test_initialize_stops_at_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("second-ran");
        let mut config = config_in(dir.path());
        config.init = vec![
            CommandConfig {
                name: "create".to_string(),
                program: "sh".to_string(),
                args: vec!["-c".to_string(), "exit 5".to_string()],
            },
            CommandConfig {
                name: "migrate".to_string(),
                program: "sh".to_string(),
                args: vec!["-c".to_string(), format!("touch {}", marker.display())],
            },
        ];

        let mut supervisor = Supervisor::new(config);
        let err = supervisor.initialize().await.unwrap_err();

        match &err {
            SupervisorError::InitFailed { step, message } => {
                assert_eq!(step, "create");
                assert!(message.contains('5'));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(err.exit_code(), 3);
        assert!(!marker.exists());
    }
}
