//! Configuration types for upload-relay
//!
//! Settings are resolved once at startup in layers, highest precedence first:
//! process environment variables (`APP_` prefix), the same variables from a
//! `.env` file, the YAML config file, built-in defaults.
//! The resulting [`Config`] is passed explicitly to every component that needs it.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::{net::SocketAddr, path::Path, path::PathBuf, time::Duration};

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "APP_";

/// Dotenv file read from the working directory
pub const DOTENV_FILE: &str = ".env";

/// How the external processing call is made
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalServiceMode {
    /// Stubbed call: short fixed delay, canned response (default)
    #[default]
    Simulated,
    /// Real HTTP POST to `external_service_url`
    Http,
}

impl std::str::FromStr for ExternalServiceMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simulated" => Ok(Self::Simulated),
            "http" => Ok(Self::Http),
            other => Err(format!("unknown external service mode '{other}'")),
        }
    }
}

/// Upload handling and processing settings (`application:` section)
#[derive(Clone, Debug, PartialEq)]
pub struct ApplicationConfig {
    /// Directory uploads are written to (default: "./files")
    pub upload_directory: PathBuf,

    /// Number of simulated progress ticks per task (default: 20, values below 1 act as 1)
    pub processing_steps: i64,

    /// URL of the external processing service
    pub external_service_url: String,

    /// Whether to call the service for real or use the stub (default: simulated)
    pub external_service_mode: ExternalServiceMode,

    /// Expected duration of external processing, spread across the progress ticks (default: 120s)
    pub external_processing_estimated_duration: Duration,

    /// Hard ceiling for one external call (default: 300s)
    pub external_processing_timeout: Duration,

    /// Latency of the stubbed call (default: 100ms)
    pub simulated_call_delay: Duration,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            upload_directory: default_upload_directory(),
            processing_steps: default_processing_steps(),
            external_service_url: default_external_service_url(),
            external_service_mode: ExternalServiceMode::default(),
            external_processing_estimated_duration: default_estimated_duration(),
            external_processing_timeout: default_processing_timeout(),
            simulated_call_delay: default_simulated_call_delay(),
        }
    }
}

/// Cross-origin settings (`cors:` section)
#[derive(Clone, Debug, PartialEq)]
pub struct CorsConfig {
    /// Allowed origins; "*" or an empty list allows any origin
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
        }
    }
}

/// Listener settings (`server:` section)
#[derive(Clone, Debug, PartialEq)]
pub struct ServerConfig {
    /// Interface to bind (default: 0.0.0.0)
    pub host: String,

    /// Port to bind (default: 8000)
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Main configuration for the service
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Config {
    /// Upload handling and processing
    pub application: ApplicationConfig,

    /// Cross-origin settings
    pub cors: CorsConfig,

    /// Listener settings
    pub server: ServerConfig,
}

/// Partially specified configuration as read from the YAML file
///
/// Every field is optional; absent fields fall through to the next layer.
/// Unknown keys are ignored.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct FileConfig {
    /// `application:` section
    #[serde(default)]
    pub application: FileApplicationSection,
    /// `cors:` section
    #[serde(default)]
    pub cors: FileCorsSection,
    /// `server:` section
    #[serde(default)]
    pub server: FileServerSection,
}

/// `application:` section of [`FileConfig`]
#[allow(missing_docs)]
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct FileApplicationSection {
    pub upload_directory: Option<PathBuf>,
    pub processing_steps: Option<i64>,
    pub external_service_url: Option<String>,
    pub external_service_mode: Option<ExternalServiceMode>,
    pub external_processing_estimated_duration_seconds: Option<i64>,
    pub external_processing_timeout_seconds: Option<i64>,
    pub simulated_call_delay_ms: Option<i64>,
}

/// `cors:` section of [`FileConfig`]
#[allow(missing_docs)]
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct FileCorsSection {
    pub allowed_origins: Option<Vec<String>>,
}

/// `server:` section of [`FileConfig`]
#[allow(missing_docs)]
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct FileServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Read the YAML config file
///
/// Never fails: a missing file, an unreadable file, an empty file and a
/// malformed document all yield an empty [`FileConfig`], so every setting
/// falls back to the environment or the built-in default.
pub fn load_config_file(path: &Path) -> FileConfig {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(
                path = %path.display(),
                "Configuration file not found, using default values"
            );
            return FileConfig::default();
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Could not read configuration file, using default values"
            );
            return FileConfig::default();
        }
    };

    if contents.trim().is_empty() {
        return FileConfig::default();
    }

    // A document holding only comments parses as YAML null
    match serde_yaml::from_str::<Option<FileConfig>>(&contents) {
        Ok(parsed) => parsed.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Error parsing YAML configuration file, using default values"
            );
            FileConfig::default()
        }
    }
}

/// Read variables from a dotenv file
///
/// A missing file yields an empty map. Lines that fail to parse are logged
/// and skipped.
pub fn load_dotenv(path: &Path) -> HashMap<String, String> {
    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(e) if e.not_found() => return HashMap::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Could not read dotenv file");
            return HashMap::new();
        }
    };

    let mut vars = HashMap::new();
    for item in iter {
        match item {
            Ok((key, value)) => {
                vars.insert(key, value);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping dotenv entry");
            }
        }
    }
    tracing::debug!(path = %path.display(), count = vars.len(), "Loaded dotenv file");
    vars
}

impl Config {
    /// Resolve configuration from a config file path, `./.env` and the process environment
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with(path, Path::new(DOTENV_FILE), |name| std::env::var(name).ok())
    }

    /// Resolve configuration from a config file, a dotenv file and an environment lookup
    ///
    /// A variable set in `env` wins over the same variable in the dotenv file.
    pub fn load_with<F>(path: &Path, dotenv_path: &Path, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = load_config_file(path);
        let dotenv = load_dotenv(dotenv_path);
        Self::resolve(file, |name| env(name).or_else(|| dotenv.get(name).cloned()))
    }

    /// Resolve configuration from a file layer and an environment lookup
    ///
    /// Precedence is environment > file > default. `env` is called with full
    /// variable names such as `APP_SERVER_PORT`.
    pub fn resolve<F>(file: FileConfig, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();
        config.apply_file(file);
        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_file(&mut self, file: FileConfig) {
        let app = &mut self.application;
        let FileApplicationSection {
            upload_directory,
            processing_steps,
            external_service_url,
            external_service_mode,
            external_processing_estimated_duration_seconds,
            external_processing_timeout_seconds,
            simulated_call_delay_ms,
        } = file.application;

        if let Some(v) = upload_directory {
            app.upload_directory = v;
        }
        if let Some(v) = processing_steps {
            app.processing_steps = v;
        }
        if let Some(v) = external_service_url {
            app.external_service_url = v;
        }
        if let Some(v) = external_service_mode {
            app.external_service_mode = v;
        }
        if let Some(v) = external_processing_estimated_duration_seconds {
            app.external_processing_estimated_duration = clamped_secs(v);
        }
        if let Some(v) = external_processing_timeout_seconds {
            app.external_processing_timeout = clamped_secs(v);
        }
        if let Some(v) = simulated_call_delay_ms {
            app.simulated_call_delay = clamped_millis(v);
        }
        if let Some(v) = file.cors.allowed_origins {
            self.cors.allowed_origins = v;
        }
        if let Some(v) = file.server.host {
            self.server.host = v;
        }
        if let Some(v) = file.server.port {
            self.server.port = v;
        }
    }

    fn apply_env<F>(&mut self, env: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| {
            let name = format!("{ENV_PREFIX}{key}");
            env(&name).map(|value| (name, value))
        };

        let app = &mut self.application;
        if let Some((_, v)) = lookup("UPLOAD_DIRECTORY") {
            app.upload_directory = PathBuf::from(v);
        }
        if let Some((name, v)) = lookup("PROCESSING_STEPS") {
            app.processing_steps = parse_env(&name, &v)?;
        }
        if let Some((_, v)) = lookup("EXTERNAL_SERVICE_URL") {
            app.external_service_url = v;
        }
        if let Some((name, v)) = lookup("EXTERNAL_SERVICE_MODE") {
            app.external_service_mode = parse_env(&name, &v)?;
        }
        if let Some((name, v)) = lookup("EXTERNAL_PROCESSING_ESTIMATED_DURATION_SECONDS") {
            app.external_processing_estimated_duration = clamped_secs(parse_env(&name, &v)?);
        }
        if let Some((name, v)) = lookup("EXTERNAL_PROCESSING_TIMEOUT_SECONDS") {
            app.external_processing_timeout = clamped_secs(parse_env(&name, &v)?);
        }
        if let Some((name, v)) = lookup("SIMULATED_CALL_DELAY_MS") {
            app.simulated_call_delay = clamped_millis(parse_env(&name, &v)?);
        }
        if let Some((name, v)) = lookup("CORS_ALLOWED_ORIGINS") {
            self.cors.allowed_origins = parse_origin_list(&name, &v)?;
        }
        if let Some((_, v)) = lookup("SERVER_HOST") {
            self.server.host = v;
        }
        if let Some((name, v)) = lookup("SERVER_PORT") {
            self.server.port = parse_env(&name, &v)?;
        }
        Ok(())
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.application.external_service_mode == ExternalServiceMode::Http {
            url::Url::parse(&self.application.external_service_url).map_err(|e| {
                Error::Config {
                    message: format!(
                        "external_service_url '{}' is not a valid URL: {}",
                        self.application.external_service_url, e
                    ),
                    key: Some("external_service_url".to_string()),
                }
            })?;
        }
        if self.application.external_processing_timeout.is_zero() {
            return Err(Error::Config {
                message: "external_processing_timeout_seconds must be greater than zero"
                    .to_string(),
                key: Some("external_processing_timeout_seconds".to_string()),
            });
        }
        Ok(())
    }

    /// Socket address built from `server.host` and `server.port`
    pub fn bind_address(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| Error::Config {
                message: format!(
                    "invalid bind address {}:{}: {}",
                    self.server.host, self.server.port, e
                ),
                key: Some("server.host".to_string()),
            })
    }
}

fn parse_env<T>(name: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| Error::Config {
        message: format!("{name}='{value}' is invalid: {e}"),
        key: Some(name.to_string()),
    })
}

/// Accepts a JSON array (`["http://a", "http://b"]`) or a comma-separated list
fn parse_origin_list(name: &str, value: &str) -> Result<Vec<String>> {
    let trimmed = value.trim();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).map_err(|e| Error::Config {
            message: format!("{name} is not a valid JSON list: {e}"),
            key: Some(name.to_string()),
        });
    }
    Ok(trimmed
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect())
}

fn clamped_secs(secs: i64) -> Duration {
    Duration::from_secs(secs.max(0) as u64)
}

fn clamped_millis(millis: i64) -> Duration {
    Duration::from_millis(millis.max(0) as u64)
}

fn default_upload_directory() -> PathBuf {
    PathBuf::from("./files")
}

fn default_processing_steps() -> i64 {
    20
}

fn default_external_service_url() -> String {
    "http://localhost:8001/process_data".to_string()
}

fn default_estimated_duration() -> Duration {
    Duration::from_secs(120)
}

fn default_processing_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_simulated_call_delay() -> Duration {
    Duration::from_millis(100)
}

fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_missing_file_yields_empty_config() {
        let dir = tempfile::tempdir().unwrap();
        let file = load_config_file(&dir.path().join("non_existent_config.yaml"));
        assert_eq!(file, FileConfig::default());
    }

    #[test]
    fn test_malformed_yaml_yields_empty_config() {
        let file = write_config("key: value\n  nested: - value1");
        assert_eq!(load_config_file(file.path()), FileConfig::default());
    }

    #[test]
    fn test_empty_file_yields_empty_config() {
        let file = write_config("");
        assert_eq!(load_config_file(file.path()), FileConfig::default());
    }

    #[test]
    fn test_defaults_apply_when_nothing_is_configured() {
        let config = Config::resolve(FileConfig::default(), no_env).unwrap();
        assert_eq!(config.application.upload_directory, PathBuf::from("./files"));
        assert_eq!(config.application.processing_steps, 20);
        assert_eq!(
            config.application.external_processing_estimated_duration,
            Duration::from_secs(120)
        );
        assert_eq!(
            config.application.external_processing_timeout,
            Duration::from_secs(300)
        );
        assert_eq!(
            config.application.external_service_mode,
            ExternalServiceMode::Simulated
        );
        assert_eq!(config.cors.allowed_origins, vec!["http://localhost:3000"]);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_file_sections_override_defaults() {
        let file = write_config(
            r#"
application:
  upload_directory: /srv/uploads
  processing_steps: 5
  external_processing_estimated_duration_seconds: 10
  simulated_task_url: https://news.ycombinator.com
cors:
  allowed_origins:
    - https://app.example.com
server:
  host: 127.0.0.1
  port: 9000
"#,
        );
        let config = Config::resolve(load_config_file(file.path()), no_env).unwrap();

        assert_eq!(
            config.application.upload_directory,
            PathBuf::from("/srv/uploads")
        );
        assert_eq!(config.application.processing_steps, 5);
        assert_eq!(
            config.application.external_processing_estimated_duration,
            Duration::from_secs(10)
        );
        // untouched by the file
        assert_eq!(
            config.application.external_processing_timeout,
            Duration::from_secs(300)
        );
        assert_eq!(config.cors.allowed_origins, vec!["https://app.example.com"]);
        assert_eq!(
            config.bind_address().unwrap(),
            "127.0.0.1:9000".parse().unwrap()
        );
    }

    #[test]
    fn test_example_config_matches_defaults() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config.example.yaml");
        let file = load_config_file(&path);
        assert_ne!(file, FileConfig::default());

        let from_file = Config::resolve(file, no_env).unwrap();
        let defaults = Config::resolve(FileConfig::default(), no_env).unwrap();
        assert_eq!(from_file, defaults);
    }

    #[test]
    fn test_environment_overrides_file() {
        let file = FileConfig {
            server: FileServerSection {
                host: Some("127.0.0.1".into()),
                port: Some(9000),
            },
            ..Default::default()
        };
        let env = env_from(&[
            ("APP_SERVER_PORT", "9100"),
            ("APP_PROCESSING_STEPS", "3"),
            ("APP_CORS_ALLOWED_ORIGINS", "http://a.test, http://b.test"),
        ]);

        let config = Config::resolve(file, env).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.application.processing_steps, 3);
        assert_eq!(
            config.cors.allowed_origins,
            vec!["http://a.test", "http://b.test"]
        );
    }

    #[test]
    fn test_dotenv_fills_gaps_below_process_env() {
        let dir = tempfile::tempdir().unwrap();
        let dotenv_path = dir.path().join(".env");
        std::fs::write(
            &dotenv_path,
            "# local overrides\nAPP_SERVER_PORT=9200\nAPP_PROCESSING_STEPS=7\n",
        )
        .unwrap();
        let config_path = dir.path().join("config.yaml");
        std::fs::write(&config_path, "server:\n  port: 9000\n  host: 127.0.0.1\n").unwrap();

        let env = env_from(&[("APP_PROCESSING_STEPS", "3")]);
        let config = Config::load_with(&config_path, &dotenv_path, env).unwrap();

        // process env > .env > file > default
        assert_eq!(config.application.processing_steps, 3);
        assert_eq!(config.server.port, 9200);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.application.upload_directory, PathBuf::from("./files"));
    }

    #[test]
    fn test_missing_dotenv_is_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_dotenv(&dir.path().join(".env")).is_empty());

        let config = Config::load_with(
            &dir.path().join("config.yaml"),
            &dir.path().join(".env"),
            no_env,
        )
        .unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_origins_accept_json_list() {
        let env = env_from(&[("APP_CORS_ALLOWED_ORIGINS", r#"["http://x.test"]"#)]);
        let config = Config::resolve(FileConfig::default(), env).unwrap();
        assert_eq!(config.cors.allowed_origins, vec!["http://x.test"]);
    }

    #[test]
    fn test_invalid_env_value_names_the_variable() {
        let env = env_from(&[("APP_SERVER_PORT", "eighty")]);
        let err = Config::resolve(FileConfig::default(), env).unwrap_err();
        match err {
            Error::Config { key, .. } => assert_eq!(key.as_deref(), Some("APP_SERVER_PORT")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_negative_estimated_duration_clamps_to_zero() {
        let env = env_from(&[("APP_EXTERNAL_PROCESSING_ESTIMATED_DURATION_SECONDS", "-5")]);
        let config = Config::resolve(FileConfig::default(), env).unwrap();
        assert!(
            config
                .application
                .external_processing_estimated_duration
                .is_zero()
        );
    }

    #[test]
    fn test_http_mode_requires_valid_url() {
        let env = env_from(&[
            ("APP_EXTERNAL_SERVICE_MODE", "http"),
            ("APP_EXTERNAL_SERVICE_URL", "not a url"),
        ]);
        assert!(Config::resolve(FileConfig::default(), env).is_err());
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let env = env_from(&[("APP_EXTERNAL_PROCESSING_TIMEOUT_SECONDS", "0")]);
        assert!(Config::resolve(FileConfig::default(), env).is_err());
    }
}
