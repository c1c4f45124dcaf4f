use crate::signals::StopSignal;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Placeholder substituted with the configured port in service arguments.
pub const PORT_PLACEHOLDER: &str = "{port}";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SupervisorConfig {
    /// Port the web server binds to and the readiness probe targets
    #[serde(default)]
    pub port: Option<u16>,

    pub paths: PathsConfig,

    /// Web-serving process
    pub web: ServiceConfig,

    /// FastCGI process manager
    pub fastcgi: ServiceConfig,

    /// Cron-like scheduler
    pub scheduler: ServiceConfig,

    /// One-shot setup steps, run in order before any service starts
    #[serde(default)]
    pub init: Vec<CommandConfig>,

    /// Best-effort startup tasks, run concurrently with the rest of startup
    #[serde(default)]
    pub background: Vec<CommandConfig>,

    pub health: HealthConfig,

    pub timing: TimingConfig,

    /// Executables that must resolve on PATH before startup continues
    #[serde(default)]
    pub required_executables: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PathsConfig {
    /// Application files directory tree
    #[serde(default = "default_app_dir")]
    pub app_dir: PathBuf,

    /// Configuration file handed to the scheduler
    #[serde(default = "default_scheduler_config")]
    pub scheduler_config: PathBuf,

    /// Directories that must exist and be writable at runtime
    #[serde(default = "default_writable_dirs")]
    pub writable_dirs: Vec<PathBuf>,

    /// Permission bits applied to each writable directory
    #[serde(default = "default_writable_mode")]
    pub writable_mode: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServiceConfig {
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Signal that asks this service to stop gracefully
    pub stop_signal: StopSignal,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CommandConfig {
    pub name: String,

    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct HealthConfig {
    #[serde(default = "default_health_host")]
    pub host: String,

    /// Readiness endpoint path
    #[serde(default = "default_health_path")]
    pub path: String,

    #[serde(default = "default_health_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_health_attempts")]
    pub attempts: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TimingConfig {
    /// Delay between launching the services and the liveness re-check
    #[serde(default = "default_launch_check_delay_ms")]
    pub launch_check_delay_ms: u64,

    /// Liveness poll interval while draining
    #[serde(default = "default_drain_interval_ms")]
    pub drain_interval_ms: u64,

    /// Number of drain intervals before giving up on stragglers
    #[serde(default = "default_drain_ticks")]
    pub drain_ticks: u32,
}

impl ServiceConfig {
    /// Arguments with the port placeholder substituted.
    pub fn resolved_args(&self, port: u16) -> Vec<String> {
        substitute_port(&self.args, port)
    }
}

impl CommandConfig {
    pub fn resolved_args(&self, port: Option<u16>) -> Vec<String> {
        match port {
            Some(port) => substitute_port(&self.args, port),
            None => self.args.clone(),
        }
    }
}

/// Environment variables with the `PROCVISOR__` prefix.
///
/// List settings take space-separated values, e.g.
/// `PROCVISOR__REQUIRED_EXECUTABLES="php nginx"`.
fn environment() -> Environment {
    Environment::with_prefix("PROCVISOR")
        .separator("__")
        .try_parsing(true)
        .list_separator(" ")
        .with_list_parse_key("required_executables")
        .with_list_parse_key("paths.writable_dirs")
        .with_list_parse_key("web.args")
        .with_list_parse_key("fastcgi.args")
        .with_list_parse_key("scheduler.args")
}

fn substitute_port(args: &[String], port: u16) -> Vec<String> {
    let port = port.to_string();
    args.iter()
        .map(|arg| arg.replace(PORT_PLACEHOLDER, &port))
        .collect()
}

impl HealthConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn url(&self, port: u16) -> String {
        format!("http://{}:{}{}", self.host, port, self.path)
    }
}

impl TimingConfig {
    pub fn launch_check_delay(&self) -> Duration {
        Duration::from_millis(self.launch_check_delay_ms)
    }

    pub fn drain_interval(&self) -> Duration {
        Duration::from_millis(self.drain_interval_ms)
    }

    pub fn drain_deadline(&self) -> Duration {
        self.drain_interval() * self.drain_ticks
    }
}

impl SupervisorConfig {
    /// Load configuration from a specific file path, then the environment.
    ///
    /// `PROCVISOR__<SECTION>__<KEY>` variables override file values and the
    /// plain `PORT` variable overrides `port`.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let port = std::env::var("PORT").ok();
        Self::load_with_port_override(path, port)
    }

    pub fn load_with_port_override<P: AsRef<Path>>(
        path: P,
        port: Option<String>,
    ) -> Result<Self, ConfigError> {
        Self::load_with_environment(path, port, environment())
    }

    fn load_with_environment<P: AsRef<Path>>(
        path: P,
        port: Option<String>,
        environment: Environment,
    ) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        // An empty PORT counts as unset
        let port = port.filter(|value| !value.trim().is_empty());

        let settings = Config::builder()
            // Start with default values
            .add_source(Config::try_from(&SupervisorConfig::default())?)
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Add environment variables with PROCVISOR_ prefix
            .add_source(environment)
            .set_override_option("port", port)?
            .build()?;

        let config: SupervisorConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, service) in self.services() {
            if service.program.trim().is_empty() {
                return Err(ConfigError::Message(format!(
                    "{} program must not be empty",
                    name
                )));
            }
        }

        let mut seen = HashSet::new();
        for command in self.init.iter().chain(self.background.iter()) {
            if command.program.trim().is_empty() {
                return Err(ConfigError::Message(format!(
                    "Command '{}' has an empty program",
                    command.name
                )));
            }
            if !seen.insert(command.name.as_str()) {
                return Err(ConfigError::Message(format!(
                    "Command name '{}' is used more than once",
                    command.name
                )));
            }
        }

        if self.health.interval_ms == 0 {
            return Err(ConfigError::Message(
                "Health interval must be greater than 0".to_string(),
            ));
        }

        if self.health.attempts == 0 {
            return Err(ConfigError::Message(
                "Health attempts must be greater than 0".to_string(),
            ));
        }

        if !self.health.path.starts_with('/') {
            return Err(ConfigError::Message(
                "Health path must start with '/'".to_string(),
            ));
        }

        if self.timing.drain_interval_ms == 0 {
            return Err(ConfigError::Message(
                "Drain interval must be greater than 0".to_string(),
            ));
        }

        if self.timing.drain_ticks == 0 {
            return Err(ConfigError::Message(
                "Drain ticks must be greater than 0".to_string(),
            ));
        }

        if self.paths.writable_mode > 0o7777 {
            return Err(ConfigError::Message(format!(
                "Writable mode {:o} is not a valid permission mask",
                self.paths.writable_mode
            )));
        }

        Ok(())
    }

    /// The three tracked services in launch order.
    pub fn services(&self) -> [(&'static str, &ServiceConfig); 3] {
        [
            ("web", &self.web),
            ("fastcgi", &self.fastcgi),
            ("scheduler", &self.scheduler),
        ]
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            port: None,
            paths: PathsConfig {
                app_dir: default_app_dir(),
                scheduler_config: default_scheduler_config(),
                writable_dirs: default_writable_dirs(),
                writable_mode: default_writable_mode(),
            },
            web: ServiceConfig {
                program: "nginx".to_string(),
                args: vec!["-g".to_string(), "daemon off;".to_string()],
                stop_signal: StopSignal::Quit,
            },
            fastcgi: ServiceConfig {
                program: "php-fpm".to_string(),
                args: vec!["--nodaemonize".to_string()],
                stop_signal: StopSignal::Quit,
            },
            scheduler: ServiceConfig {
                program: "supercronic".to_string(),
                args: vec![default_scheduler_config().to_string_lossy().into_owned()],
                stop_signal: StopSignal::Term,
            },
            init: vec![
                console_command("create-database", &["db:create", "--if-not-exists"]),
                console_command("migrate", &["db:migrate", "--no-interaction"]),
            ],
            background: vec![
                console_command("refresh-schedule", &["schedule:refresh"]),
                console_command("refresh-reference-data", &["reference-data:refresh"]),
                console_command("check-updates", &["updates:check"]),
            ],
            health: HealthConfig {
                host: default_health_host(),
                path: default_health_path(),
                interval_ms: default_health_interval_ms(),
                attempts: default_health_attempts(),
            },
            timing: TimingConfig {
                launch_check_delay_ms: default_launch_check_delay_ms(),
                drain_interval_ms: default_drain_interval_ms(),
                drain_ticks: default_drain_ticks(),
            },
            required_executables: vec![
                "php".to_string(),
                "php-fpm".to_string(),
                "nginx".to_string(),
                "supercronic".to_string(),
            ],
        }
    }
}

fn console_command(name: &str, args: &[&str]) -> CommandConfig {
    let console = default_app_dir().join("bin/console");
    let mut full_args = vec![console.to_string_lossy().into_owned()];
    full_args.extend(args.iter().map(|arg| arg.to_string()));
    CommandConfig {
        name: name.to_string(),
        program: "php".to_string(),
        args: full_args,
    }
}

// Default value functions
fn default_app_dir() -> PathBuf {
    PathBuf::from("/var/www/app")
}
fn default_scheduler_config() -> PathBuf {
    PathBuf::from("/etc/crontab")
}
fn default_writable_dirs() -> Vec<PathBuf> {
    vec![
        PathBuf::from("/tmp/app"),
        PathBuf::from("/run/app"),
        PathBuf::from("/var/log/app"),
    ]
}
fn default_writable_mode() -> u32 {
    0o777
}

fn default_health_host() -> String {
    "127.0.0.1".to_string()
}
fn default_health_path() -> String {
    "/health".to_string()
}
fn default_health_interval_ms() -> u64 {
    1000
}
fn default_health_attempts() -> u32 {
    30
}

fn default_launch_check_delay_ms() -> u64 {
    2000
}
fn default_drain_interval_ms() -> u64 {
    1000
}
fn default_drain_ticks() -> u32 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = SupervisorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.port, None);
        assert_eq!(config.web.stop_signal, StopSignal::Quit);
        assert_eq!(config.scheduler.stop_signal, StopSignal::Term);
        assert_eq!(config.timing.drain_deadline(), Duration::from_secs(10));
    }

    #[test]
    fn test_port_override_and_file_values() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[health]
path = "/ready"
attempts = 3

[fastcgi]
program = "php-fpm82"
args = ["-F"]
stop_signal = "SIGQUIT"
"#
        )
        .unwrap();

        let config =
            SupervisorConfig::load_with_port_override(file.path(), Some("8080".to_string()))
                .unwrap();

        assert_eq!(config.port, Some(8080));
        assert_eq!(config.health.path, "/ready");
        assert_eq!(config.health.attempts, 3);
        assert_eq!(config.health.interval_ms, 1000);
        assert_eq!(config.fastcgi.program, "php-fpm82");
        assert_eq!(config.fastcgi.stop_signal, StopSignal::Quit);
        assert_eq!(config.web.program, "nginx");
    }

    #[test]
    fn test_empty_port_is_unset() {
        let dir = tempfile::tempdir().unwrap();
        let config = SupervisorConfig::load_with_port_override(
            dir.path().join("absent.toml"),
            Some("  ".to_string()),
        )
        .unwrap();
        assert_eq!(config.port, None);
    }

    #[test]
    fn test_environment_overrides_lists() {
        let dir = tempfile::tempdir().unwrap();
        let mut vars = config::Map::new();
        vars.insert(
            "PROCVISOR__REQUIRED_EXECUTABLES".to_string(),
            "php nginx".to_string(),
        );
        vars.insert(
            "PROCVISOR__SCHEDULER__ARGS".to_string(),
            "/etc/cron.d/app -json".to_string(),
        );
        vars.insert(
            "PROCVISOR__HEALTH__ATTEMPTS".to_string(),
            "7".to_string(),
        );

        let config = SupervisorConfig::load_with_environment(
            dir.path().join("absent.toml"),
            None,
            environment().source(Some(vars)),
        )
        .unwrap();

        assert_eq!(config.required_executables, vec!["php", "nginx"]);
        assert_eq!(config.scheduler.args, vec!["/etc/cron.d/app", "-json"]);
        assert_eq!(config.scheduler.program, "supercronic");
        assert_eq!(config.health.attempts, 7);
    }

    #[test]
    fn test_config_validation() {
        let mut config = SupervisorConfig::default();
        config.timing.drain_ticks = 0;
        assert!(config.validate().is_err());

        config.timing.drain_ticks = 10;
        config.background.push(CommandConfig {
            name: "migrate".to_string(),
            program: "php".to_string(),
            args: vec![],
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_port_placeholder_substitution() {
        let service = ServiceConfig {
            program: "php".to_string(),
            args: vec!["-S".to_string(), "0.0.0.0:{port}".to_string()],
            stop_signal: StopSignal::Term,
        };
        assert_eq!(service.resolved_args(8080), vec!["-S", "0.0.0.0:8080"]);
    }
}
