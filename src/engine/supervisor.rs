//! Engine process supervision.
//!
//! One descriptor maps to at most one live engine process. Processes live in
//! an arena keyed by a monotonically increasing id, never by the descriptor
//! itself. Each process gets a non-overlapping port pair: SOCKS on
//! `start_port + 2 * index`, HTTP one above it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::descriptor::VlessDescriptor;
use crate::engine::config::{sing_box_config, v2ray_config};
use crate::error::{GatemonError, GatemonResult};

/// Which external proxy engine binary to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    SingBox,
    V2ray,
}

impl EngineKind {
    /// Default binary name looked up on PATH.
    pub fn default_binary(&self) -> &'static str {
        match self {
            EngineKind::SingBox => "sing-box",
            EngineKind::V2ray => "v2ray",
        }
    }

    fn probe_args(&self) -> &'static [&'static str] {
        match self {
            EngineKind::SingBox => &["version"],
            EngineKind::V2ray => &["-version"],
        }
    }

    fn run_args(&self, config_path: &Path) -> Vec<String> {
        let cfg = config_path.display().to_string();
        match self {
            EngineKind::SingBox => vec!["run".to_string(), "-c".to_string(), cfg],
            EngineKind::V2ray => vec!["-c".to_string(), cfg],
        }
    }

    fn config_file_name(&self, id: u64) -> String {
        match self {
            EngineKind::SingBox => format!("sing_box_config_{}.json", id),
            EngineKind::V2ray => format!("v2ray_config_{}.json", id),
        }
    }
}

/// A running local proxy-engine instance.
#[derive(Debug)]
pub struct EngineProcess {
    pub id: u64,
    pub descriptor: VlessDescriptor,
    pub socks_port: u16,
    pub http_port: u16,
    pub config_path: PathBuf,
    child: Option<Child>,
    stopped: bool,
}

impl EngineProcess {
    /// Local SOCKS endpoint exposed by this engine instance.
    pub fn proxy_url(&self) -> String {
        format!("socks5://127.0.0.1:{}", self.socks_port)
    }

    /// Local HTTP endpoint exposed by this engine instance.
    pub fn http_proxy_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.http_port)
    }

    /// Poll the process without blocking. A stopped or exited process is
    /// not alive.
    pub fn is_alive(&mut self) -> bool {
        if self.stopped {
            return false;
        }
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }
}

/// Launches and tracks engine processes for a set of descriptors.
pub struct EngineSupervisor {
    kind: EngineKind,
    binary: String,
    config_dir: PathBuf,
    grace_period: Duration,
    stop_timeout: Duration,
    next_id: u64,
    processes: HashMap<u64, EngineProcess>,
}

impl EngineSupervisor {
    pub fn new(kind: EngineKind, binary: impl Into<String>, config_dir: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            binary: binary.into(),
            config_dir: config_dir.into(),
            grace_period: Duration::from_secs(2),
            stop_timeout: Duration::from_secs(5),
            next_id: 0,
            processes: HashMap::new(),
        }
    }

    /// Override the startup grace period. Tests use a short one.
    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    /// Check that the engine binary exists and answers its version probe.
    pub async fn probe(&self) -> GatemonResult<()> {
        let status = Command::new(&self.binary)
            .args(self.kind.probe_args())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| GatemonError::EngineUnavailable {
                binary: self.binary.clone(),
                message: e.to_string(),
            })?;

        if !status.success() {
            return Err(GatemonError::EngineUnavailable {
                binary: self.binary.clone(),
                message: format!("version probe exited with {}", status),
            });
        }
        Ok(())
    }

    /// Start one engine process for `descriptor` with its SOCKS listener on
    /// `socks_port`. Returns the arena id of the registered process.
    ///
    /// The binary is probed first; probe failure aborts with no side
    /// effects. A process that exits within the grace period fails with
    /// `EngineStartFailed` carrying its captured stderr.
    pub async fn start(
        &mut self,
        descriptor: VlessDescriptor,
        socks_port: u16,
    ) -> GatemonResult<u64> {
        let http_port = socks_port.checked_add(1).ok_or_else(|| {
            GatemonError::config(format!(
                "socks port {} leaves no room for the http listener",
                socks_port
            ))
        })?;

        self.probe().await?;

        let id = self.next_id;
        self.next_id += 1;

        let config_path = self.config_dir.join(self.kind.config_file_name(id));
        let config_json = match self.kind {
            EngineKind::SingBox => {
                serde_json::to_string_pretty(&sing_box_config(&descriptor, socks_port))?
            }
            EngineKind::V2ray => {
                serde_json::to_string_pretty(&v2ray_config(&descriptor, socks_port))?
            }
        };
        tokio::fs::write(&config_path, config_json).await?;

        let mut child = Command::new(&self.binary)
            .args(self.kind.run_args(&config_path))
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        sleep(self.grace_period).await;

        if let Ok(Some(status)) = child.try_wait() {
            let mut detail = String::new();
            if let Some(mut stderr) = child.stderr.take() {
                let mut buf = Vec::new();
                let _ = stderr.read_to_end(&mut buf).await;
                detail = String::from_utf8_lossy(&buf).trim().to_string();
            }
            if detail.is_empty() {
                detail = format!("exited with {}", status);
            }
            error!(tag = %descriptor.tag, %detail, "engine exited during startup");
            return Err(GatemonError::EngineStartFailed {
                tag: descriptor.to_string(),
                detail,
            });
        }

        let process = EngineProcess {
            id,
            descriptor,
            socks_port,
            http_port,
            config_path,
            child: Some(child),
            stopped: false,
        };
        info!(id, url = %process.proxy_url(), tag = %process.descriptor.tag, "engine started");
        self.processes.insert(id, process);
        Ok(id)
    }

    /// Start one engine per descriptor, assigning port pairs from
    /// `start_port` upward. Failed descriptors are logged and skipped; the
    /// returned list holds the ids that came up.
    pub async fn start_all(
        &mut self,
        descriptors: Vec<VlessDescriptor>,
        start_port: u16,
    ) -> Vec<u64> {
        let mut started = Vec::new();
        for (index, descriptor) in descriptors.into_iter().enumerate() {
            let slot = u32::from(start_port) + 2 * index as u32;
            if slot + 1 > u32::from(u16::MAX) {
                warn!(start_port, index, "local port range exhausted, skipping remaining descriptors");
                break;
            }
            let socks_port = slot as u16;
            let label = descriptor.to_string();
            match self.start(descriptor, socks_port).await {
                Ok(id) => started.push(id),
                Err(e) => warn!(descriptor = %label, error = %e, "skipping descriptor"),
            }
        }
        started
    }

    /// Stop one process: SIGTERM, wait up to the stop timeout, then force
    /// kill. Safe to call twice; the second call is a no-op.
    pub async fn stop(&mut self, id: u64) {
        let Some(process) = self.processes.get_mut(&id) else {
            return;
        };
        if process.stopped {
            return;
        }
        process.stopped = true;

        if let Some(mut child) = process.child.take() {
            terminate(&mut child);
            match timeout(self.stop_timeout, child.wait()).await {
                Ok(_) => debug!(id, "engine stopped"),
                Err(_) => {
                    warn!(id, "engine did not exit in time, killing");
                    let _ = child.kill().await;
                }
            }
        }
        info!(id, tag = %process.descriptor.tag, "stopped local engine");
    }

    /// Stop every tracked process.
    pub async fn stop_all(&mut self) {
        let ids: Vec<u64> = self.processes.keys().copied().collect();
        for id in ids {
            self.stop(id).await;
        }
    }

    /// Proxy URLs of processes that are still alive.
    pub fn live_proxy_urls(&mut self) -> Vec<String> {
        self.processes
            .values_mut()
            .filter_map(|p| if p.is_alive() { Some(p.proxy_url()) } else { None })
            .collect()
    }

    pub fn get(&self, id: u64) -> Option<&EngineProcess> {
        self.processes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }
}

/// Request graceful termination. Falls back to the tokio kill signal on
/// platforms without SIGTERM.
fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = child.id() {
            let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
            return;
        }
    }
    let _ = child.start_kill();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_kind_arguments() {
        let path = Path::new("/tmp/cfg.json");
        assert_eq!(
            EngineKind::SingBox.run_args(path),
            vec!["run", "-c", "/tmp/cfg.json"]
        );
        assert_eq!(EngineKind::V2ray.run_args(path), vec!["-c", "/tmp/cfg.json"]);
        assert_eq!(EngineKind::SingBox.probe_args(), &["version"]);
        assert_eq!(EngineKind::V2ray.probe_args(), &["-version"]);
    }

    #[tokio::test]
    async fn test_socks_port_at_range_end_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut supervisor = EngineSupervisor::new(
            EngineKind::SingBox,
            "definitely-not-a-real-engine-binary",
            dir.path(),
        );
        let descriptor = VlessDescriptor::parse("vless://u@h:443").unwrap();
        // 65535 has no room for the paired http listener; the port check
        // fires before the binary is even probed.
        let err = supervisor.start(descriptor, u16::MAX).await.unwrap_err();
        assert!(matches!(err, GatemonError::Config { .. }), "got {:?}", err);
        assert!(supervisor.is_empty());
    }

    #[tokio::test]
    async fn test_start_all_stops_at_port_range_end() {
        let dir = tempfile::tempdir().unwrap();
        let mut supervisor = EngineSupervisor::new(
            EngineKind::SingBox,
            "definitely-not-a-real-engine-binary",
            dir.path(),
        );
        let descriptors = vec![
            VlessDescriptor::parse("vless://u@h1:443").unwrap(),
            VlessDescriptor::parse("vless://u@h2:443").unwrap(),
        ];
        // The second descriptor's slot would pass 65535; it is skipped
        // instead of wrapping or panicking.
        let started = supervisor.start_all(descriptors, 65534).await;
        assert!(started.is_empty());
    }

    #[tokio::test]
    async fn test_missing_binary_is_engine_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let mut supervisor = EngineSupervisor::new(
            EngineKind::SingBox,
            "definitely-not-a-real-engine-binary",
            dir.path(),
        );
        let descriptor = VlessDescriptor::parse("vless://u@h:443").unwrap();
        let err = supervisor.start(descriptor, 10800).await.unwrap_err();
        assert!(matches!(err, GatemonError::EngineUnavailable { .. }));
        assert!(supervisor.is_empty());
        // probe failure must leave no config file behind
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
