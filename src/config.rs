//! Client configuration parsing and validation.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::acp::connection::ConnectionOptions;
use crate::acp::schema::{ClientCapabilities, FileSystemCapability, McpServer};
use crate::acp::spawner::SpawnConfig;
use crate::orchestrator::session_manager::SessionOptions;
use crate::orchestrator::stream_buffer::StreamingConfig;
use crate::{AppError, Result};

/// How to launch the agent subprocess.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct AgentConfig {
    /// Agent executable.
    pub command: String,
    /// Arguments passed to the executable.
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment variables for the child.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Working directory of the agent and of new sessions.
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,
    /// Backend identifier (`claude`, `gemini`, `codex`, ...) used when
    /// classifying errors.
    #[serde(default)]
    pub backend: Option<String>,
    /// Pass only an allowlisted environment plus `env` to the child.
    #[serde(default)]
    pub isolate_env: bool,
}

fn default_working_dir() -> PathBuf {
    PathBuf::from(".")
}

/// Timeout values.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TimeoutConfig {
    /// Ordinary request timeout.
    #[serde(default = "default_request_seconds")]
    pub request_seconds: u64,
    /// `initialize` and `authenticate` timeout.
    #[serde(default = "default_initialize_seconds")]
    pub initialize_seconds: u64,
    /// `session/prompt` timeout; 0 means no timeout.
    #[serde(default)]
    pub prompt_seconds: u64,
    /// How long `cancel` waits for the agent to end the turn.
    #[serde(default = "default_cancel_grace_ms")]
    pub cancel_grace_ms: u64,
    /// Time between SIGTERM and kill on disconnect.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_seconds: default_request_seconds(),
            initialize_seconds: default_initialize_seconds(),
            prompt_seconds: 0,
            cancel_grace_ms: default_cancel_grace_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

fn default_request_seconds() -> u64 {
    60
}

fn default_initialize_seconds() -> u64 {
    30
}

fn default_cancel_grace_ms() -> u64 {
    5000
}

fn default_shutdown_grace_ms() -> u64 {
    2000
}

/// Stream coalescing thresholds.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct StreamingSection {
    /// Flush interval in milliseconds.
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    /// Pending chunk count that forces a flush.
    #[serde(default = "default_max_chunks")]
    pub max_chunks: usize,
}

impl Default for StreamingSection {
    fn default() -> Self {
        Self {
            flush_interval_ms: default_flush_interval_ms(),
            max_chunks: default_max_chunks(),
        }
    }
}

fn default_flush_interval_ms() -> u64 {
    300
}

fn default_max_chunks() -> usize {
    20
}

/// Authentication settings.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct AuthConfig {
    /// Method id passed to `authenticate` after `initialize`.
    #[serde(default)]
    pub method_id: Option<String>,
}

/// Capabilities this client advertises.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ClientSection {
    /// Serve `fs/read_text_file`.
    #[serde(default = "default_true")]
    pub read_text_file: bool,
    /// Serve `fs/write_text_file`.
    #[serde(default = "default_true")]
    pub write_text_file: bool,
    /// Advertise terminal support.
    #[serde(default)]
    pub terminal: bool,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            read_text_file: true,
            write_text_file: true,
            terminal: false,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Top-level configuration for the client.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct ClientConfig {
    /// Agent launch settings.
    pub agent: AgentConfig,
    /// Timeout values.
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// Stream coalescing thresholds.
    #[serde(default)]
    pub streaming: StreamingSection,
    /// Authentication.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Advertised client capabilities.
    #[serde(default)]
    pub client: ClientSection,
    /// MCP servers forwarded to `session/new` and `session/load`.
    #[serde(default)]
    pub mcp_servers: Vec<McpServer>,
}

impl ClientConfig {
    /// Load configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or fails
    /// validation.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref())
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and validate it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Replace the working directory (e.g. from `--cwd`) and re-validate.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the directory does not exist.
    pub fn override_working_dir(&mut self, dir: impl Into<PathBuf>) -> Result<()> {
        self.agent.working_dir = dir.into();
        self.validate()
    }

    /// How to spawn the agent.
    #[must_use]
    pub fn spawn_config(&self) -> SpawnConfig {
        let mut spawn = SpawnConfig::new(
            self.agent.command.clone(),
            self.agent.args.clone(),
            self.agent.working_dir.clone(),
        );
        spawn.env = self.agent.env.clone();
        spawn.isolate_env = self.agent.isolate_env;
        spawn
    }

    /// Capabilities advertised during `initialize`.
    #[must_use]
    pub fn client_capabilities(&self) -> ClientCapabilities {
        ClientCapabilities {
            fs: FileSystemCapability {
                read_text_file: self.client.read_text_file,
                write_text_file: self.client.write_text_file,
            },
            terminal: self.client.terminal,
        }
    }

    /// Connection settings derived from this config.
    #[must_use]
    pub fn connection_options(&self) -> ConnectionOptions {
        let t = &self.timeouts;
        ConnectionOptions {
            client_capabilities: self.client_capabilities(),
            auth_method: self.auth.method_id.clone(),
            request_timeout: Some(Duration::from_secs(t.request_seconds)),
            initialize_timeout: Some(Duration::from_secs(t.initialize_seconds)),
            prompt_timeout: (t.prompt_seconds > 0).then(|| Duration::from_secs(t.prompt_seconds)),
            shutdown_grace: Duration::from_millis(t.shutdown_grace_ms),
            backend: self.agent.backend.clone(),
        }
    }

    /// Session manager settings derived from this config.
    #[must_use]
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            connection: self.connection_options(),
            streaming: StreamingConfig {
                flush_interval: Duration::from_millis(self.streaming.flush_interval_ms),
                max_chunks: self.streaming.max_chunks,
            },
            cancel_grace: Duration::from_millis(self.timeouts.cancel_grace_ms),
        }
    }

    fn validate(&mut self) -> Result<()> {
        if self.agent.command.trim().is_empty() {
            return Err(AppError::Config("agent.command must not be empty".into()));
        }

        if self.timeouts.request_seconds == 0 {
            return Err(AppError::Config(
                "timeouts.request_seconds must be greater than zero".into(),
            ));
        }

        if self.streaming.max_chunks == 0 {
            return Err(AppError::Config(
                "streaming.max_chunks must be greater than zero".into(),
            ));
        }

        if self.streaming.flush_interval_ms == 0 {
            return Err(AppError::Config(
                "streaming.flush_interval_ms must be greater than zero".into(),
            ));
        }

        let canonical = self
            .agent
            .working_dir
            .canonicalize()
            .map_err(|err| AppError::Config(format!("agent.working_dir invalid: {err}")))?;
        self.agent.working_dir = canonical;

        Ok(())
    }
}
