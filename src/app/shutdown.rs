use super::{LifecycleState, ShutdownReport, ShutdownTrigger, Supervisor};
use tokio::time::sleep;
use tracing::{debug, info, warn};

impl Supervisor {
    /// Perform the graceful shutdown of all tracked services.
    ///
    /// Only the first call runs the sequence; later calls return the report
    /// recorded by the first one.
    pub async fn shutdown(&mut self, trigger: ShutdownTrigger) -> ShutdownReport {
        if !self.shutdown_state.begin() {
            debug!(
                "Shutdown already {:?}; ignoring trigger: {}",
                self.shutdown_state, trigger
            );
            // The report is recorded before the first await, so it is present
            // whenever the state has left NotStarted.
            return self.shutdown_report.clone().unwrap_or(ShutdownReport {
                trigger,
                exit_code: 0,
                signalled: Vec::new(),
                drained: false,
            });
        }

        self.set_lifecycle(LifecycleState::ShuttingDown);
        info!("Beginning graceful shutdown");

        // Stop readiness polling
        self.cancellation_token.cancel();

        let exit_code = self.resolve_exit_code(&trigger);
        let mut report = ShutdownReport {
            trigger,
            exit_code,
            signalled: Vec::new(),
            drained: false,
        };
        self.shutdown_report = Some(report.clone());

        // Signal everything first, then drain
        for service in &self.services {
            if !service.is_alive() {
                debug!("{} already stopped", service.name);
                continue;
            }
            match service.stop_signal.send(service.pid) {
                Ok(()) => {
                    info!(
                        "Sent {} to {} (pid {})",
                        service.stop_signal, service.name, service.pid
                    );
                    report.signalled.push(service.name.clone());
                }
                Err(e) => warn!(
                    "Failed to send {} to {} (pid {}): {}",
                    service.stop_signal, service.name, service.pid, e
                ),
            }
        }

        report.drained = self.drain().await;

        self.shutdown_state.complete();
        self.set_lifecycle(LifecycleState::Stopped);
        self.shutdown_report = Some(report.clone());

        info!("Graceful shutdown completed with exit code: {}", report.exit_code);
        report
    }

    /// A crash propagates the crashed service's code. A signal yields 0
    /// unless some service had already exited by the time it arrived.
    fn resolve_exit_code(&mut self, trigger: &ShutdownTrigger) -> i32 {
        match trigger {
            ShutdownTrigger::ServiceExited { code, .. } => {
                self.take_queued_exit();
                *code
            }
            ShutdownTrigger::Signal(_) => self
                .take_queued_exit()
                .or_else(|| self.services.iter().find_map(|service| service.exit_code()))
                .unwrap_or(0),
        }
    }

    /// Poll liveness once per drain interval until every service has
    /// stopped or the deadline passes. No forced kill follows a timeout.
    async fn drain(&self) -> bool {
        let interval = self.config.timing.drain_interval();
        let ticks = self.config.timing.drain_ticks;

        for tick in 0..=ticks {
            let alive = self.alive_services();
            if alive.is_empty() {
                info!("All services stopped");
                return true;
            }
            if tick == ticks {
                warn!(
                    "Shutdown deadline of {:?} exceeded; still running: {}",
                    self.config.timing.drain_deadline(),
                    alive.join(", ")
                );
                return false;
            }
            debug!("Waiting for {} to stop", alive.join(", "));
            sleep(interval).await;
        }

        false
    }
}
