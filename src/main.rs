use anyhow::Result;
use clap::Parser;
use procvisor::{Supervisor, SupervisorConfig, SupervisorError};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "procvisor")]
#[command(about = "Container entrypoint supervising a web server, a FastCGI manager and a scheduler")]
#[command(version)]
#[command(long_about = "Validates the container environment, runs one-time initialization, \
starts the web server, FastCGI process manager and scheduler, and stops all of them \
gracefully as soon as one exits or a termination signal arrives.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "procvisor.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and environment, then exit
    #[arg(long, help = "Validate configuration and environment and exit without starting services")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Dry run mode - initialize but don't launch services
    #[arg(long, help = "Perform dry run - validate, initialize and prepare directories only")]
    dry_run: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle special modes that don't require full initialization
    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    let guard = init_logging(&args)?;

    let exit_code = match supervise(&args).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            e.exit_code()
        }
    };

    info!("Procvisor exited with code: {}", exit_code);

    // Flush buffered log lines before the process goes away
    drop(guard);
    std::process::exit(exit_code);
}

async fn supervise(args: &Args) -> Result<i32, SupervisorError> {
    info!("Starting procvisor v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = SupervisorConfig::load_from_file(&args.config).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;
    config.validate().map_err(|e| {
        error!("Configuration validation failed: {}", e);
        e
    })?;

    let mut supervisor = Supervisor::new(config);
    supervisor.validate()?;

    if args.validate_config {
        info!("Configuration and environment validation successful");
        println!("✓ Configuration is valid");
        return Ok(0);
    }

    supervisor.initialize().await?;

    if args.dry_run {
        supervisor.prepare_runtime_dirs();
        info!("Dry run mode - initialized but no services launched");
        println!("✓ Dry run completed successfully");
        return Ok(0);
    }

    supervisor.start().await?;
    supervisor.run().await
}

fn init_logging(args: &Args) -> Result<WorkerGuard> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    // Determine log level based on flags
    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "info"
    };

    // Create environment filter
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("procvisor={}", log_level)));

    let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());

    // Configure format based on options
    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_writer(writer)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("pretty") => fmt::layer()
            .pretty()
            .with_writer(writer)
            .with_target(true)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some("compact") | None => fmt::layer()
            .compact()
            .with_writer(writer)
            .with_target(false)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .compact()
                .with_writer(writer)
                .with_target(false)
                .boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(guard)
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# Procvisor Configuration File");
    println!("# `port` has no default; set it here or through the PORT environment variable.");
    println!();

    let rendered = toml::to_string_pretty(&SupervisorConfig::default())?;
    println!("{}", rendered);
    Ok(())
}
