//! TOML configuration for tunnelbench.
//!
//! A layered model: an explicit `--config` path, then the `TUNNELBENCH_CONFIG`
//! environment variable, then `./tunnelbench.toml`, then compiled-in defaults.
//! Command templates are rendered once into a [`CommandSet`] that stays
//! immutable for the rest of the process.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "TUNNELBENCH_CONFIG";

/// Longest accepted workload timeout: one day.
pub const MAX_TASK_TIMEOUT_SECS: u64 = 86_400;

/// Config file picked up from the working directory when nothing else is given.
pub const DEFAULT_CONFIG_FILE: &str = "tunnelbench.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid {field} '{value}': {reason}")]
    InvalidValue {
        field: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("command template '{template}' uses unknown placeholder '{{{placeholder}}}'")]
    UnknownPlaceholder {
        template: &'static str,
        placeholder: String,
    },
}

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for a test run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub results: ResultsConfig,
    #[serde(default)]
    pub workload: WorkloadConfig,
    #[serde(default)]
    pub high_latency: NetemConfig,
    #[serde(default)]
    pub commands: CommandTemplates,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Resolve the configuration source and load it.
    ///
    /// An explicit path must load. A path from `TUNNELBENCH_CONFIG` that fails
    /// is skipped and handed back in [`Discovered::skipped`] so the caller can
    /// report it once logging is up.
    pub fn discover(explicit: Option<&Path>) -> Result<Discovered, ConfigError> {
        if let Some(path) = explicit {
            return Ok(Discovered::from_file(Self::load(path)?, path));
        }

        let mut skipped = None;
        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(env_path);
            match Self::load(&path) {
                Ok(cfg) => return Ok(Discovered::from_file(cfg, &path)),
                Err(e) => skipped = Some(e),
            }
        }

        let local = Path::new(DEFAULT_CONFIG_FILE);
        let mut found = if local.exists() {
            Discovered::from_file(Self::load(local)?, local)
        } else {
            Discovered {
                config: Self::default(),
                source: None,
                skipped: None,
            }
        };
        found.skipped = skipped;
        Ok(found)
    }

    /// Reject values that would break the run or the shell commands built from them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_host(&self.target.server)?;
        validate_interface(&self.target.interface)?;

        let timeout = self.workload.task_timeout_secs;
        if timeout == 0 {
            return Err(ConfigError::InvalidValue {
                field: "workload.task_timeout_secs",
                value: "0".to_string(),
                reason: "must be at least one second",
            });
        }
        if timeout > MAX_TASK_TIMEOUT_SECS {
            return Err(ConfigError::InvalidValue {
                field: "workload.task_timeout_secs",
                value: timeout.to_string(),
                reason: "must be at most 86400 (one day)",
            });
        }

        let loss = self.high_latency.loss_percent;
        if !(0.0..=100.0).contains(&loss) {
            return Err(ConfigError::InvalidValue {
                field: "high_latency.loss_percent",
                value: loss.to_string(),
                reason: "must be between 0 and 100",
            });
        }

        Ok(())
    }

    /// Serialize the effective configuration back to TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Outcome of [`Config::discover`].
#[derive(Debug)]
pub struct Discovered {
    pub config: Config,
    /// File the config came from; `None` means compiled-in defaults.
    pub source: Option<PathBuf>,
    /// Why `TUNNELBENCH_CONFIG` was set but not used.
    pub skipped: Option<ConfigError>,
}

impl Discovered {
    fn from_file(config: Config, path: &Path) -> Self {
        Self {
            config,
            source: Some(path.to_path_buf()),
            skipped: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// The far end of the VPN link and the local interface carrying it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Address of the host running the iperf3 server, sshd and the media server.
    pub server: String,
    /// Interface the traffic-shaping override is applied to.
    pub interface: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            server: "10.8.0.1".to_string(),
            interface: "tun0".to_string(),
        }
    }
}

/// Where results and charts are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultsConfig {
    /// Append-only CSV table.
    pub path: PathBuf,
    /// Directory for rendered charts.
    pub chart_dir: PathBuf,
}

impl Default for ResultsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("vpn_test_results.csv"),
            chart_dir: PathBuf::from("charts"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    /// How long the mixed workload waits for its tasks before killing them.
    pub task_timeout_secs: u64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            task_timeout_secs: 30,
        }
    }
}

impl WorkloadConfig {
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }
}

/// Impairment applied with `tc netem` during the high-latency scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetemConfig {
    pub delay_ms: u32,
    pub loss_percent: f64,
}

impl Default for NetemConfig {
    fn default() -> Self {
        Self {
            delay_ms: 100,
            loss_percent: 1.0,
        }
    }
}

/// Shell command templates.
///
/// Placeholders: `{server}`, `{interface}`, `{delay_ms}`, `{loss_percent}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandTemplates {
    pub throughput_tcp: String,
    pub throughput_udp: String,
    pub latency: String,
    pub file_transfer_upload: String,
    pub file_transfer_download: String,
    pub video_streaming: String,
    pub netem_apply: String,
    pub netem_revert: String,
}

impl Default for CommandTemplates {
    fn default() -> Self {
        Self {
            throughput_tcp: "iperf3 -c {server} -p 5201 -t 10".to_string(),
            throughput_udp: "iperf3 -c {server} -p 5201 -u -b 0 -t 10".to_string(),
            latency: "ping -c 10 {server}".to_string(),
            file_transfer_upload: "scp -B payload.bin {server}:/tmp/payload.bin".to_string(),
            file_transfer_download: "scp -B {server}:/tmp/payload.bin payload.download"
                .to_string(),
            video_streaming:
                "ffplay -nodisp -autoexit -loglevel quiet http://{server}/stream/video.mp4"
                    .to_string(),
            netem_apply:
                "sudo tc qdisc add dev {interface} root netem delay {delay_ms}ms loss {loss_percent}%"
                    .to_string(),
            netem_revert: "sudo tc qdisc del dev {interface} root netem".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Rendered commands
// ---------------------------------------------------------------------------

/// Fully rendered command strings, fixed for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSet {
    pub throughput_tcp: String,
    pub throughput_udp: String,
    pub latency: String,
    pub file_transfer_upload: String,
    pub file_transfer_download: String,
    pub video_streaming: String,
    pub netem_apply: String,
    pub netem_revert: String,
}

impl CommandSet {
    pub fn render(config: &Config) -> Result<Self, ConfigError> {
        let delay_ms = config.high_latency.delay_ms.to_string();
        let loss_percent = config.high_latency.loss_percent.to_string();
        let vars = [
            ("server", config.target.server.as_str()),
            ("interface", config.target.interface.as_str()),
            ("delay_ms", delay_ms.as_str()),
            ("loss_percent", loss_percent.as_str()),
        ];
        let t = &config.commands;

        Ok(Self {
            throughput_tcp: render_template("throughput_tcp", &t.throughput_tcp, &vars)?,
            throughput_udp: render_template("throughput_udp", &t.throughput_udp, &vars)?,
            latency: render_template("latency", &t.latency, &vars)?,
            file_transfer_upload: render_template(
                "file_transfer_upload",
                &t.file_transfer_upload,
                &vars,
            )?,
            file_transfer_download: render_template(
                "file_transfer_download",
                &t.file_transfer_download,
                &vars,
            )?,
            video_streaming: render_template("video_streaming", &t.video_streaming, &vars)?,
            netem_apply: render_template("netem_apply", &t.netem_apply, &vars)?,
            netem_revert: render_template("netem_revert", &t.netem_revert, &vars)?,
        })
    }

    /// Every command with its name, in a stable order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("throughput_tcp", self.throughput_tcp.as_str()),
            ("throughput_udp", self.throughput_udp.as_str()),
            ("latency", self.latency.as_str()),
            ("file_transfer_upload", self.file_transfer_upload.as_str()),
            ("file_transfer_download", self.file_transfer_download.as_str()),
            ("video_streaming", self.video_streaming.as_str()),
            ("netem_apply", self.netem_apply.as_str()),
            ("netem_revert", self.netem_revert.as_str()),
        ]
        .into_iter()
    }
}

/// Substitute `{name}` placeholders. Braces around anything that is not a
/// lowercase identifier are left alone so shell syntax like `${HOME}` survives.
fn render_template(
    template_name: &'static str,
    template: &str,
    vars: &[(&str, &str)],
) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let key = after.find('}').map(|close| &after[..close]).filter(|key| {
            !key.is_empty() && key.chars().all(|c| c.is_ascii_lowercase() || c == '_')
        });

        match key {
            Some(key) => {
                let value = vars
                    .iter()
                    .find(|(name, _)| *name == key)
                    .map(|(_, value)| *value)
                    .ok_or_else(|| ConfigError::UnknownPlaceholder {
                        template: template_name,
                        placeholder: key.to_string(),
                    })?;
                out.push_str(value);
                rest = &after[key.len() + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    Ok(out)
}

fn validate_host(host: &str) -> Result<(), ConfigError> {
    let invalid = |reason| ConfigError::InvalidValue {
        field: "target.server",
        value: host.to_string(),
        reason,
    };
    if host.is_empty() {
        return Err(invalid("cannot be empty"));
    }
    if host.starts_with('-') {
        return Err(invalid("cannot start with a hyphen"));
    }
    // Alphanumeric, dot, hyphen, colon (IPv6)
    if host
        .chars()
        .any(|c| !c.is_ascii_alphanumeric() && c != '.' && c != '-' && c != ':')
    {
        return Err(invalid("contains characters not allowed in a host name or address"));
    }
    Ok(())
}

fn validate_interface(name: &str) -> Result<(), ConfigError> {
    let invalid = |reason| ConfigError::InvalidValue {
        field: "target.interface",
        value: name.to_string(),
        reason,
    };
    if name.is_empty() {
        return Err(invalid("cannot be empty"));
    }
    if name.starts_with('-') {
        return Err(invalid("cannot start with a hyphen"));
    }
    if name
        .chars()
        .any(|c| !c.is_ascii_alphanumeric() && c != '.' && c != '-' && c != '_')
    {
        return Err(invalid("contains characters not allowed in an interface name"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
