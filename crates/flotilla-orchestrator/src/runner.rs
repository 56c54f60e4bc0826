//! Playbook runner invocation
//!
//! The runner is an external process. It receives a JSON parameter bundle on
//! stdin and posts progress events to the callback URL; the orchestrator
//! only observes its exit status and the callback stream.

use std::process::Stdio;

use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use flotilla_common::FlotillaError;

/// One target instance in the parameter bundle
#[derive(Clone, Debug, Serialize)]
pub struct RunnerInstance {
    pub instance_id: i64,
    pub instance_name: String,
    pub app_type: String,
    pub server_name: String,
    pub server_ip: String,
}

/// The JSON bundle written to the runner's stdin
#[derive(Debug, Serialize)]
pub struct RunnerBundle<'a> {
    pub task_id: i64,
    /// Correlation id echoed by the runner in progress events
    pub correlation_id: &'a str,
    pub action: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playbook: Option<&'a str>,
    pub instances: &'a [RunnerInstance],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distr_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<&'a str>,
    pub drain_wait_minutes: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<&'a str>,
    /// For `action = "drain"`: the member to put into drain state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub haproxy_target: Option<HaproxyTarget<'a>>,
}

#[derive(Debug, Serialize)]
pub struct HaproxyTarget<'a> {
    pub server_name: &'a str,
    pub backend: &'a str,
    pub member: &'a str,
}

/// A spawned runner process
pub struct RunnerHandle {
    pub child: Child,
    pub pid: Option<u32>,
}

/// Spawns the configured runner command
#[derive(Clone)]
pub struct PlaybookRunner {
    command: Vec<String>,
}

impl PlaybookRunner {
    /// `command` is the program plus fixed arguments, e.g.
    /// `["/usr/local/bin/flotilla-runner"]`.
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }

    pub async fn spawn(&self, bundle: &RunnerBundle<'_>) -> anyhow::Result<RunnerHandle> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| FlotillaError::Internal("runner command not configured".into()))?;
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| FlotillaError::RemoteUnavailable(format!("spawn {}: {}", program, e)))?;

        let payload = serde_json::to_vec(bundle)?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&payload).await?;
            stdin.shutdown().await?;
        }
        let pid = child.id();
        debug!(task_id = bundle.task_id, pid, "runner spawned");
        Ok(RunnerHandle { child, pid })
    }

    /// Spawn and wait for exit; used for the drain side-command where the
    /// callback stream is not needed.
    pub async fn run_to_completion(&self, bundle: &RunnerBundle<'_>) -> anyhow::Result<bool> {
        let mut handle = self.spawn(bundle).await?;
        let status = handle.child.wait().await?;
        Ok(status.success())
    }

    /// Best-effort kill of an orphaned runner by PID
    pub fn kill_pid(pid: i64) {
        let mut system = sysinfo::System::new();
        system.refresh_processes(sysinfo::ProcessesToUpdate::All, true);
        match system.process(sysinfo::Pid::from_u32(pid as u32)) {
            Some(process) => {
                if !process.kill() {
                    warn!(pid, "failed to signal runner process");
                }
            }
            None => debug!(pid, "runner process already gone"),
        }
    }
}
