//! Unit tests for TOML configuration loading and validation.

use std::time::Duration;

use serial_test::serial;

use acp_client::acp::schema::{KnownMcpServer, McpServer};
use acp_client::{AppError, ClientConfig};

fn full_toml(workspace: &str) -> String {
    format!(
        r#"
[agent]
command = "claude-code-acp"
args = ["--verbose"]
working_dir = '{workspace}'
backend = "claude"
isolate_env = true

[agent.env]
ANTHROPIC_LOG = "debug"

[timeouts]
request_seconds = 45
initialize_seconds = 10
prompt_seconds = 600
cancel_grace_ms = 1500
shutdown_grace_ms = 500

[streaming]
flush_interval_ms = 100
max_chunks = 8

[auth]
method_id = "oauth"

[client]
read_text_file = true
write_text_file = false
terminal = false

[[mcp_servers]]
type = "stdio"
name = "files"
command = "mcp-files"
args = ["--root", "."]

[[mcp_servers]]
type = "http"
name = "search"
url = "https://mcp.example.test/search"
"#
    )
}

fn minimal_toml(workspace: &str) -> String {
    format!(
        r#"
[agent]
command = "gemini"
args = ["--experimental-acp"]
working_dir = '{workspace}'
"#
    )
}

#[test]
fn full_config_parses() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = ClientConfig::from_toml_str(&full_toml(&dir.path().to_string_lossy()))
        .expect("valid config");

    assert_eq!(config.agent.command, "claude-code-acp");
    assert_eq!(config.agent.args, vec!["--verbose"]);
    assert_eq!(config.agent.backend.as_deref(), Some("claude"));
    assert!(config.agent.isolate_env);
    assert_eq!(config.agent.env["ANTHROPIC_LOG"], "debug");
    assert_eq!(config.timeouts.request_seconds, 45);
    assert_eq!(config.streaming.max_chunks, 8);
    assert_eq!(config.auth.method_id.as_deref(), Some("oauth"));
    assert!(!config.client.write_text_file);

    assert_eq!(config.mcp_servers.len(), 2);
    assert!(matches!(
        &config.mcp_servers[0],
        McpServer::Known(KnownMcpServer::Stdio { name, args, .. })
            if name == "files" && args.len() == 2
    ));
    assert_eq!(config.mcp_servers[1].name(), Some("search"));
}

#[test]
fn minimal_config_uses_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = ClientConfig::from_toml_str(&minimal_toml(&dir.path().to_string_lossy()))
        .expect("valid config");

    assert_eq!(config.timeouts.request_seconds, 60);
    assert_eq!(config.timeouts.initialize_seconds, 30);
    assert_eq!(config.timeouts.prompt_seconds, 0);
    assert_eq!(config.timeouts.cancel_grace_ms, 5000);
    assert_eq!(config.timeouts.shutdown_grace_ms, 2000);
    assert_eq!(config.streaming.flush_interval_ms, 300);
    assert_eq!(config.streaming.max_chunks, 20);
    assert!(config.client.read_text_file);
    assert!(config.client.write_text_file);
    assert!(!config.client.terminal);
    assert!(config.auth.method_id.is_none());
    assert!(config.mcp_servers.is_empty());
    assert!(!config.agent.isolate_env);
}

#[test]
fn working_dir_is_canonicalized() {
    let dir = tempfile::tempdir().expect("tempdir");
    let nested = dir.path().join("project");
    std::fs::create_dir(&nested).unwrap();
    let dotted = dir.path().join("project").join("..").join("project");

    let config = ClientConfig::from_toml_str(&minimal_toml(&dotted.to_string_lossy()))
        .expect("valid config");
    assert_eq!(config.agent.working_dir, nested.canonicalize().unwrap());
}

#[test]
fn derived_options_follow_the_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = ClientConfig::from_toml_str(&full_toml(&dir.path().to_string_lossy()))
        .expect("valid config");

    let spawn = config.spawn_config();
    assert_eq!(spawn.command, "claude-code-acp");
    assert_eq!(spawn.working_dir, config.agent.working_dir);
    assert!(spawn.isolate_env);
    assert_eq!(spawn.env.len(), 1);

    let options = config.session_options();
    assert_eq!(options.connection.request_timeout, Some(Duration::from_secs(45)));
    assert_eq!(options.connection.initialize_timeout, Some(Duration::from_secs(10)));
    assert_eq!(options.connection.prompt_timeout, Some(Duration::from_secs(600)));
    assert_eq!(options.connection.shutdown_grace, Duration::from_millis(500));
    assert_eq!(options.connection.auth_method.as_deref(), Some("oauth"));
    assert_eq!(options.connection.backend.as_deref(), Some("claude"));
    assert!(options.connection.client_capabilities.fs.read_text_file);
    assert!(!options.connection.client_capabilities.fs.write_text_file);
    assert_eq!(options.streaming.flush_interval, Duration::from_millis(100));
    assert_eq!(options.streaming.max_chunks, 8);
    assert_eq!(options.cancel_grace, Duration::from_millis(1500));
}

#[test]
fn zero_prompt_timeout_means_unbounded() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = ClientConfig::from_toml_str(&minimal_toml(&dir.path().to_string_lossy()))
        .expect("valid config");
    assert_eq!(config.connection_options().prompt_timeout, None);
}

#[test]
fn empty_command_is_rejected() {
    let err = ClientConfig::from_toml_str("[agent]\ncommand = \"  \"\nworking_dir = '.'\n")
        .unwrap_err();
    assert_eq!(
        err,
        AppError::Config("agent.command must not be empty".into())
    );
}

#[test]
fn zero_thresholds_are_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let base = minimal_toml(&dir.path().to_string_lossy());

    let cases = [
        (
            "[timeouts]\nrequest_seconds = 0\n",
            "timeouts.request_seconds must be greater than zero",
        ),
        (
            "[streaming]\nmax_chunks = 0\n",
            "streaming.max_chunks must be greater than zero",
        ),
        (
            "[streaming]\nflush_interval_ms = 0\n",
            "streaming.flush_interval_ms must be greater than zero",
        ),
    ];
    for (extra, message) in cases {
        let err = ClientConfig::from_toml_str(&format!("{base}\n{extra}")).unwrap_err();
        assert_eq!(err, AppError::Config(message.into()), "{extra}");
    }
}

#[test]
fn missing_working_dir_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("does-not-exist");
    let err = ClientConfig::from_toml_str(&minimal_toml(&missing.to_string_lossy())).unwrap_err();
    assert!(matches!(err, AppError::Config(ref m) if m.starts_with("agent.working_dir invalid")));
}

#[test]
fn missing_agent_section_is_a_parse_error() {
    let err = ClientConfig::from_toml_str("[timeouts]\nrequest_seconds = 5\n").unwrap_err();
    assert!(matches!(err, AppError::Config(ref m) if m.starts_with("invalid config")));
}

#[test]
fn load_from_path_reads_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("acp.toml");
    std::fs::write(&path, minimal_toml(&dir.path().to_string_lossy())).unwrap();

    let config = ClientConfig::load_from_path(&path).expect("loads");
    assert_eq!(config.agent.command, "gemini");

    let err = ClientConfig::load_from_path(dir.path().join("missing.toml")).unwrap_err();
    assert!(matches!(err, AppError::Config(ref m) if m.starts_with("failed to read config")));
}

#[test]
fn override_working_dir_revalidates() {
    let dir = tempfile::tempdir().expect("tempdir");
    let other = tempfile::tempdir().expect("tempdir");
    let mut config = ClientConfig::from_toml_str(&minimal_toml(&dir.path().to_string_lossy()))
        .expect("valid config");

    config.override_working_dir(other.path()).expect("exists");
    assert_eq!(config.agent.working_dir, other.path().canonicalize().unwrap());

    let err = config
        .override_working_dir(other.path().join("nope"))
        .unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
}

/// Relative working directories resolve against the process cwd.
#[test]
#[serial]
fn relative_working_dir_uses_process_cwd() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir(dir.path().join("repo")).unwrap();
    let previous = std::env::current_dir().unwrap();

    std::env::set_current_dir(dir.path()).unwrap();
    let result = ClientConfig::from_toml_str(&minimal_toml("repo"));
    std::env::set_current_dir(previous).unwrap();

    let config = result.expect("valid config");
    assert_eq!(
        config.agent.working_dir,
        dir.path().join("repo").canonicalize().unwrap()
    );
}
