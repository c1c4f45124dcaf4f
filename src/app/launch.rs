use super::state::TrackedService;
use super::{Supervisor, SupervisorEvent};
use crate::config::ServiceConfig;
use crate::error::{Result, SupervisorError};
use crate::process;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Spawn one service and a watcher that reports its exit.
///
/// The watcher publishes the exit code on the returned service's liveness
/// channel first, then enqueues a [`SupervisorEvent::ServiceExited`].
pub(super) fn spawn_service(
    name: &str,
    service: &ServiceConfig,
    port: u16,
    events: mpsc::UnboundedSender<SupervisorEvent>,
) -> Result<TrackedService> {
    let args = service.resolved_args(port);

    let mut child = process::command(&service.program, &args, Some(port))
        .spawn()
        .map_err(|source| {
            error!("Failed to spawn {} ({}): {}", name, service.program, source);
            SupervisorError::Spawn {
                service: name.to_string(),
                source,
            }
        })?;

    let pid = child
        .id()
        .ok_or_else(|| SupervisorError::system(format!("{} exited before its pid was read", name)))?;

    let (exit_sender, exit_receiver) = watch::channel(None);
    let watcher_name = name.to_string();
    tokio::spawn(async move {
        let code = match child.wait().await {
            Ok(status) => process::exit_code(status),
            Err(e) => {
                warn!("Failed to wait on {}: {}", watcher_name, e);
                1
            }
        };
        let _ = exit_sender.send(Some(code));
        let _ = events.send(SupervisorEvent::ServiceExited {
            name: watcher_name,
            code,
        });
    });

    info!("Started {} (pid {}): {} {}", name, pid, service.program, args.join(" "));

    Ok(TrackedService::new(
        name.to_string(),
        pid,
        service.stop_signal,
        service.program.clone(),
        args,
        exit_receiver,
    ))
}

impl Supervisor {
    /// Service Launcher: start the web server, FastCGI manager and scheduler
    pub(super) fn launch_services(&mut self, port: u16) -> Result<()> {
        if !self.services.is_empty() {
            return Err(SupervisorError::system("Services already launched"));
        }

        let config = self.config.clone();
        for (name, service) in config.services() {
            let tracked = spawn_service(name, service, port, self.event_sender.clone())?;
            self.services.push(tracked);
        }

        Ok(())
    }

    /// Re-check liveness of every service after the launch delay
    pub(super) async fn confirm_liveness(&self) -> Result<()> {
        sleep(self.config.timing.launch_check_delay()).await;

        for service in &self.services {
            if let Some(code) = service.exit_code() {
                error!(
                    "{} failed to start (exited with code {})",
                    service.name, code
                );
                return Err(SupervisorError::LaunchFailed {
                    service: service.name.clone(),
                    code,
                });
            }
        }

        info!("All {} services are alive", self.services.len());
        Ok(())
    }
}
