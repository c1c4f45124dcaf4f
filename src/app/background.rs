use crate::config::CommandConfig;
use crate::process;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Spawn every best-effort startup task without waiting for any of them.
///
/// Each handle resolves to whether its task succeeded. Failures are only
/// logged; the recurring scheduler runs the same tasks again later.
pub fn spawn_background_tasks(tasks: &[CommandConfig], port: u16) -> Vec<JoinHandle<bool>> {
    tasks
        .iter()
        .cloned()
        .map(|task| {
            tokio::spawn(async move {
                let args = task.resolved_args(Some(port));
                match process::command(&task.program, &args, Some(port))
                    .status()
                    .await
                {
                    Ok(status) if status.success() => {
                        info!("Background task '{}' completed", task.name);
                        true
                    }
                    Ok(status) => {
                        warn!(
                            "Background task '{}' exited with code {}",
                            task.name,
                            process::exit_code(status)
                        );
                        false
                    }
                    Err(e) => {
                        warn!("Background task '{}' could not start: {}", task.name, e);
                        false
                    }
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell(name: &str, script: &str) -> CommandConfig {
        CommandConfig {
            name: name.to_string(),
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
        }
    }

    #[tokio::test]
    async fn test_failures_are_reported_but_not_raised() {
        let tasks = vec![
            shell("ok", "exit 0"),
            shell("fails", "exit 2"),
            CommandConfig {
                name: "missing".to_string(),
                program: "/nonexistent/procvisor-task".to_string(),
                args: vec![],
            },
        ];

        let handles = spawn_background_tasks(&tasks, 8080);
        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }

        assert_eq!(results, vec![true, false, false]);
    }

    #[tokio::test]
    async fn test_spawn_does_not_block_caller() {
        let tasks = vec![shell("slow", "sleep 2")];
        let started = std::time::Instant::now();
        let handles = spawn_background_tasks(&tasks, 8080);

        assert!(started.elapsed() < std::time::Duration::from_millis(500));
        for handle in handles {
            handle.abort();
        }
    }
}
