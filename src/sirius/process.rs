use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::sirius::client::{EngineError, SiriusClient};
use crate::sirius::models::Credentials;

const READY_CHECK_INTERVAL: Duration = Duration::from_millis(500);
const EXIT_CHECK_INTERVAL: Duration = Duration::from_millis(200);
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub program: PathBuf,
    pub port: u16,
    pub credentials: Credentials,
    pub startup_timeout: Duration,
    pub request_timeout: Duration,
    pub shutdown_grace: Duration,
}

impl EngineConfig {
    pub fn base_url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }
}

/// A SIRIUS REST service owned by this process.
///
/// The child is stopped by [`SiriusEngine::shutdown`], or killed on drop
/// if it is still running.
pub struct SiriusEngine {
    child: Option<Child>,
    client: SiriusClient,
    shutdown_grace: Duration,
}

impl SiriusEngine {
    /// Launches `sirius rest` and blocks until the service reports healthy.
    pub fn start(config: &EngineConfig) -> Result<Self, EngineError> {
        let client = SiriusClient::new(&config.base_url(), config.request_timeout)?;

        info!(program = %config.program.display(), port = config.port, "Starting SIRIUS");
        let child = Command::new(&config.program)
            .args(["rest", "--port", &config.port.to_string(), "--enable-rest-shutdown"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .spawn()
            .map_err(|source| EngineError::Spawn {
                program: config.program.display().to_string(),
                source,
            })?;

        let mut engine = SiriusEngine {
            child: Some(child),
            client,
            shutdown_grace: config.shutdown_grace,
        };
        engine.wait_until_ready(config.startup_timeout)?;
        info!(url = engine.client.base_url(), "SIRIUS is ready");
        Ok(engine)
    }

    pub fn client(&self) -> &SiriusClient {
        &self.client
    }

    fn wait_until_ready(&mut self, timeout: Duration) -> Result<(), EngineError> {
        let started = Instant::now();
        loop {
            let remaining = timeout.saturating_sub(started.elapsed());
            if self.client.is_healthy(remaining.min(HEALTH_CHECK_TIMEOUT)) {
                return Ok(());
            }
            if let Some(child) = self.child.as_mut() {
                if let Some(status) = child.try_wait()? {
                    self.child = None;
                    return Err(EngineError::Exited(status));
                }
            }
            if started.elapsed() >= timeout {
                return Err(EngineError::StartupTimeout(timeout.as_secs()));
            }
            sleep(READY_CHECK_INTERVAL);
        }
    }

    /// Asks the service to shut down and waits for the process to exit,
    /// killing it once the grace period runs out.
    pub fn shutdown(mut self) -> Result<(), EngineError> {
        self.stop()
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        if let Err(error) = self.client.shutdown() {
            warn!(%error, "REST shutdown request failed");
        }

        let deadline = Instant::now() + self.shutdown_grace;
        while Instant::now() < deadline {
            if child.try_wait()?.is_some() {
                info!("SIRIUS stopped");
                return Ok(());
            }
            sleep(EXIT_CHECK_INTERVAL);
        }

        warn!("SIRIUS still running after {}s, killing it", self.shutdown_grace.as_secs());
        child.kill()?;
        child.wait()?;
        Ok(())
    }
}

impl Drop for SiriusEngine {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
