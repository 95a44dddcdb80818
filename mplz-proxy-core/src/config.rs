use crate::error::{ProxyError, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where the mplz worker listens by default
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5391";

/// Fixed wait after spawning before the worker is assumed to be listening.
pub const DEFAULT_STARTUP_DELAY_MS: u64 = 3000;

const DEFAULT_PROBE_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_PROBE_INTERVAL_MS: u64 = 100;

/// Full client configuration. Every field falls back to its default when
/// missing from the TOML source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProxyConfig {
    pub base_url: String,
    pub kill_on_drop: bool,
    pub worker: WorkerCommand,
    pub readiness: Readiness,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            kill_on_drop: false,
            worker: WorkerCommand::default(),
            readiness: Readiness::default(),
        }
    }
}

impl ProxyConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ProxyConfig = toml::from_str(content)
            .map_err(|e| ProxyError::InvalidConfiguration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_worker(mut self, worker: WorkerCommand) -> Self {
        self.worker = worker;
        self
    }

    pub fn with_readiness(mut self, readiness: Readiness) -> Self {
        self.readiness = readiness;
        self
    }

    /// Checks that `base_url` is an absolute http(s) URL with a host.
    pub fn validate(&self) -> Result<()> {
        let url = self.parsed_base_url()?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ProxyError::InvalidConfiguration(format!(
                "base_url must be http or https, got {}",
                url.scheme()
            )));
        }
        if url.host_str().is_none() {
            return Err(ProxyError::InvalidConfiguration(format!(
                "base_url has no host: {}",
                self.base_url
            )));
        }
        if self.worker.program.trim().is_empty() {
            return Err(ProxyError::InvalidConfiguration(
                "worker program is empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Absolute URL of a worker route such as `/load`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// `host:port` the worker is expected to bind.
    pub fn socket_addr(&self) -> Result<String> {
        let url = self.parsed_base_url()?;
        let host = url.host_str().ok_or_else(|| {
            ProxyError::InvalidConfiguration(format!("base_url has no host: {}", self.base_url))
        })?;
        let port = url.port_or_known_default().ok_or_else(|| {
            ProxyError::InvalidConfiguration(format!("base_url has no port: {}", self.base_url))
        })?;
        Ok(format!("{}:{}", host, port))
    }

    fn parsed_base_url(&self) -> Result<Url> {
        Url::parse(&self.base_url).map_err(|e| {
            ProxyError::InvalidConfiguration(format!("invalid base_url {}: {}", self.base_url, e))
        })
    }
}

/// The fixed invocation that starts the worker.
///
/// The default `cargo run --bin=mplz` arguments only apply when `program`
/// is left out too; a configured program starts with no arguments unless
/// `args` is given.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "RawWorkerCommand")]
pub struct WorkerCommand {
    pub program: String,
    pub args: Vec<String>,
    pub working_directory: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
}

impl Default for WorkerCommand {
    fn default() -> Self {
        Self {
            program: "cargo".to_string(),
            args: vec!["run".to_string(), "--bin=mplz".to_string()],
            working_directory: None,
            env: BTreeMap::new(),
        }
    }
}

impl WorkerCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_directory: None,
            env: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

}

#[derive(Deserialize)]
struct RawWorkerCommand {
    program: Option<String>,
    args: Option<Vec<String>>,
    working_directory: Option<PathBuf>,
    #[serde(default)]
    env: BTreeMap<String, String>,
}

impl From<RawWorkerCommand> for WorkerCommand {
    fn from(raw: RawWorkerCommand) -> Self {
        let (program, args) = match raw.program {
            Some(program) => (program, raw.args.unwrap_or_default()),
            None => {
                let default = WorkerCommand::default();
                (default.program, raw.args.unwrap_or(default.args))
            }
        };
        Self {
            program,
            args,
            working_directory: raw.working_directory,
            env: raw.env,
        }
    }
}

/// How construction waits for the worker to start listening
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Readiness {
    /// Sleep a fixed interval and assume the worker is up.
    Delay {
        #[serde(default = "default_delay_ms")]
        delay_ms: u64,
    },
    /// Poll the worker's TCP port until it accepts a connection.
    Probe {
        #[serde(default = "default_probe_timeout_ms")]
        timeout_ms: u64,
        #[serde(default = "default_probe_interval_ms")]
        interval_ms: u64,
    },
}

impl Default for Readiness {
    fn default() -> Self {
        Readiness::Delay {
            delay_ms: DEFAULT_STARTUP_DELAY_MS,
        }
    }
}

impl Readiness {
    pub fn probe(timeout: Duration, interval: Duration) -> Self {
        Readiness::Probe {
            timeout_ms: saturating_millis(timeout),
            interval_ms: saturating_millis(interval),
        }
    }

    pub fn probe_with_default_interval(timeout: Duration) -> Self {
        Self::probe(timeout, Duration::from_millis(DEFAULT_PROBE_INTERVAL_MS))
    }
}

/// Whole milliseconds in `duration`, clamped to `u64::MAX`.
pub fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn default_delay_ms() -> u64 {
    DEFAULT_STARTUP_DELAY_MS
}

fn default_probe_timeout_ms() -> u64 {
    DEFAULT_PROBE_TIMEOUT_MS
}

fn default_probe_interval_ms() -> u64 {
    DEFAULT_PROBE_INTERVAL_MS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_mplz_worker() {
        let config = ProxyConfig::default();
        assert_eq!(config.base_url, "http://127.0.0.1:5391");
        assert_eq!(config.worker.program, "cargo");
        assert_eq!(config.worker.args, vec!["run", "--bin=mplz"]);
        assert_eq!(config.readiness, Readiness::Delay { delay_ms: 3000 });
        assert!(!config.kill_on_drop);
    }

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config = ProxyConfig::from_toml_str("").unwrap();
        assert_eq!(config, ProxyConfig::default());
    }

    #[test]
    fn test_full_toml() {
        let content = r#"
base_url = "http://localhost:6000/"
kill_on_drop = true

[worker]
program = "./target/release/mplz"
working_directory = "/srv/mplz"
env = { RUST_LOG = "debug" }

[readiness]
mode = "probe"
timeout_ms = 5000
"#;
        let config = ProxyConfig::from_toml_str(content).unwrap();
        assert!(config.kill_on_drop);
        assert_eq!(config.worker.program, "./target/release/mplz");
        assert!(config.worker.args.is_empty());
        assert_eq!(
            config.worker.working_directory,
            Some(PathBuf::from("/srv/mplz"))
        );
        assert_eq!(config.worker.env.get("RUST_LOG").map(String::as_str), Some("debug"));
        assert_eq!(
            config.readiness,
            Readiness::Probe {
                timeout_ms: 5000,
                interval_ms: 100
            }
        );
        assert_eq!(config.endpoint("/load"), "http://localhost:6000/load");
        assert_eq!(config.socket_addr().unwrap(), "localhost:6000");
    }

    #[test]
    fn test_configured_program_does_not_inherit_cargo_args() {
        let config =
            ProxyConfig::from_toml_str("[worker]\nprogram = \"./target/release/mplz\"\n").unwrap();
        assert_eq!(config.worker.program, "./target/release/mplz");
        assert!(config.worker.args.is_empty());
    }

    #[test]
    fn test_worker_section_without_program_keeps_cargo_invocation() {
        let config =
            ProxyConfig::from_toml_str("[worker]\nenv = { RUST_LOG = \"info\" }\n").unwrap();
        assert_eq!(config.worker.program, "cargo");
        assert_eq!(config.worker.args, vec!["run", "--bin=mplz"]);
        assert_eq!(config.worker.env.len(), 1);

        let config =
            ProxyConfig::from_toml_str("[worker]\nargs = [\"run\", \"--release\"]\n").unwrap();
        assert_eq!(config.worker.program, "cargo");
        assert_eq!(config.worker.args, vec!["run", "--release"]);
    }

    #[test]
    fn test_probe_durations_saturate() {
        let readiness = Readiness::probe(Duration::MAX, Duration::from_millis(25));
        assert_eq!(
            readiness,
            Readiness::Probe {
                timeout_ms: u64::MAX,
                interval_ms: 25
            }
        );
    }

    #[test]
    fn test_delay_mode_without_value_uses_default() {
        let config = ProxyConfig::from_toml_str("[readiness]\nmode = \"delay\"\n").unwrap();
        assert_eq!(config.readiness, Readiness::Delay { delay_ms: 3000 });
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let err = ProxyConfig::from_toml_str("base_url = \"not a url\"").unwrap_err();
        assert!(matches!(err, ProxyError::InvalidConfiguration(_)));

        let err = ProxyConfig::from_toml_str("base_url = \"ftp://127.0.0.1:21\"").unwrap_err();
        assert!(matches!(err, ProxyError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_unknown_readiness_mode_rejected() {
        let err = ProxyConfig::from_toml_str("[readiness]\nmode = \"guess\"\n").unwrap_err();
        assert!(matches!(err, ProxyError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_socket_addr_uses_scheme_default_port() {
        let config = ProxyConfig::default().with_base_url("http://example.com");
        assert_eq!(config.socket_addr().unwrap(), "example.com:80");
    }

    #[test]
    fn test_missing_config_file_is_io_error() {
        let err = ProxyConfig::from_file("/nonexistent/mplz-proxy.toml").unwrap_err();
        assert!(matches!(err, ProxyError::Io(_)));
    }
}
