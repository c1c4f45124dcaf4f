use super::{LifecycleState, ShutdownTrigger, Supervisor, SupervisorEvent};
use crate::error::{Result, SupervisorError};
use tokio::signal::unix::{signal, Signal, SignalKind};
use tracing::{debug, info, warn};

fn register(kind: SignalKind, name: &'static str) -> Result<Signal> {
    signal(kind).map_err(|source| SupervisorError::SignalSetup {
        signal: name,
        source,
    })
}

impl Supervisor {
    /// Register termination signals as shutdown requests and SIGHUP as a no-op.
    ///
    /// Registration happens synchronously, so a signal delivered right after
    /// this returns is queued.
    pub(super) fn install_signal_handlers(&mut self) -> Result<()> {
        if self.signals_installed {
            return Ok(());
        }

        let mut sigterm = register(SignalKind::terminate(), "SIGTERM")?;
        let mut sigint = register(SignalKind::interrupt(), "SIGINT")?;
        let mut sigquit = register(SignalKind::quit(), "SIGQUIT")?;
        let mut sighup = register(SignalKind::hangup(), "SIGHUP")?;

        let events = self.event_sender.clone();
        tokio::spawn(async move {
            loop {
                let name = tokio::select! {
                    _ = sigterm.recv() => "SIGTERM",
                    _ = sigint.recv() => "SIGINT",
                    _ = sigquit.recv() => "SIGQUIT",
                    _ = sighup.recv() => {
                        debug!("Received SIGHUP; reload is not supported, ignoring");
                        continue;
                    }
                };

                info!("Received {} signal", name);
                if events
                    .send(SupervisorEvent::SignalReceived(name.to_string()))
                    .is_err()
                {
                    break;
                }
            }
        });

        self.signals_installed = true;
        debug!("Signal handlers installed");
        Ok(())
    }

    /// Block until the first service exit or termination signal, then shut down.
    ///
    /// Returns the exit code the container process should use.
    pub async fn run(&mut self) -> Result<i32> {
        if self.lifecycle != LifecycleState::Running {
            return Err(SupervisorError::system(format!(
                "Cannot run supervisor in state {:?}",
                self.lifecycle
            )));
        }

        info!("Supervisor is running");
        let trigger = self.wait_for_trigger().await?;
        info!("Shutdown initiated: {}", trigger);

        let report = self.shutdown(trigger).await;

        info!("Supervisor shutdown complete");
        Ok(report.exit_code)
    }

    /// The composite wait: whichever event arrives first becomes the trigger.
    async fn wait_for_trigger(&mut self) -> Result<ShutdownTrigger> {
        let event = self
            .event_receiver
            .recv()
            .await
            .ok_or_else(|| SupervisorError::system("Event channel closed unexpectedly"))?;

        if let SupervisorEvent::ServiceExited { name, code } = &event {
            warn!("{} exited unexpectedly with code {}", name, code);
        }

        Ok(ShutdownTrigger::from(event))
    }

    /// Exit code of the earliest service exit still queued, if any.
    pub(super) fn take_queued_exit(&mut self) -> Option<i32> {
        let mut first = None;
        while let Ok(event) = self.event_receiver.try_recv() {
            match event {
                SupervisorEvent::ServiceExited { name, code } if first.is_none() => {
                    debug!("{} had already exited with code {}", name, code);
                    first = Some(code);
                }
                other => debug!("Ignoring event during shutdown: {:?}", other),
            }
        }
        first
    }
}
