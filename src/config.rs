//!
//! src/config.rs  Oct 16th, 2026
//!
//! Configuration for both catalog clients, the shared http layer and the
//! logger. Values come from the command line, which already folds in
//! environment variables (flags win), plus a .env file loaded up front.
//!

use std::time;

use url::Url;

use crate::MigrateError;
use crate::cli::Cli;

/// Constants for Http Config
pub const HTTP_TIMEOUT: u64 = 30000;
pub const HTTP_CONNECT_TIMEOUT: u64 = 5000;
pub const HTTP_POOL_MAX_IDLE: usize = 4;
pub const HTTP_POOL_IDLE_TIMEOUT: u64 = 90000;
pub const HTTP_MAX_REDIRECTS: u8 = 4;

pub const RETRY_MAX_ATTEMPTS: u8 = 3;
pub const RETRY_BASE_BACKOFF: u64 = 250;
pub const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

pub const JELLYFIN_PAGE_SIZE: u32 = 500;
pub const PLEX_PAGE_SIZE: u32 = 1000;
pub const PLEX_WRITE_BATCH: usize = 200;
pub const PLEX_SIGNIN_URL: &str = "https://plex.tv/users/sign_in.json";

pub const PRODUCT: &str = "playlist-migrator";

/// Ensures the url is http(s) and names a host
fn ensure_http(url: &Url) -> Result<(), String> {
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(format!("URL must be http or https (got {other}): {url}")),
    }
    match url.host_str() {
        Some(_) => Ok(()),
        None => Err(format!("URL missing host: {url}")),
    }
}

/// Parses a server base url and makes sure joins stay below its path
fn base_url(name: &str, raw: &str) -> Result<Url, MigrateError> {
    let mut url = Url::parse(raw.trim())
        .map_err(|e| MigrateError::Config(format!("{name} invalid {e}")))?;
    ensure_http(&url).map_err(MigrateError::Config)?;

    // ensure trailing slash
    if !url.path().ends_with('/') {
        let mut path = url.path().to_string();
        path.push('/');
        url.set_path(&path);
    }
    Ok(url)
}

fn required(name: &str, value: Option<String>) -> Result<String, MigrateError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(MigrateError::Config(format!("{name} was not set"))),
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

///
/// Configuration for the Jellyfin (source) server
///
#[derive(Clone)]
pub enum JellyfinAuth {
    ApiKey(String),
    Password { username: String, password: String },
}

impl std::fmt::Debug for JellyfinAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JellyfinAuth::ApiKey(_) => f.write_str("ApiKey(..)"),
            JellyfinAuth::Password { username, .. } => {
                write!(f, "Password {{ username: {username:?}, .. }}")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct JellyfinConfig {
    pub base_url: Url,
    pub auth: JellyfinAuth,
    pub user_id: Option<String>,
    pub device_id: String,
    pub page_size: u32,
}

fn build_jellyfin(cli: &Cli, device_id: &str) -> Result<JellyfinConfig, MigrateError> {
    let raw = required("JELLYFIN_URL", cli.jellyfin_url.clone())?;
    let base_url = base_url("JELLYFIN_URL", &raw)?;

    let auth = match (
        present(cli.jellyfin_api_key.clone()),
        present(cli.jellyfin_username.clone()),
    ) {
        (Some(key), _) => JellyfinAuth::ApiKey(key),
        (None, Some(username)) => JellyfinAuth::Password {
            username,
            // jellyfin accounts may legitimately have an empty password
            password: cli.jellyfin_password.clone().unwrap_or_default(),
        },
        (None, None) => {
            return Err(MigrateError::Config(
                "JELLYFIN_API_KEY or JELLYFIN_USERNAME was not set".to_string(),
            ));
        }
    };

    Ok(JellyfinConfig {
        base_url,
        auth,
        user_id: present(cli.jellyfin_user_id.clone()),
        device_id: device_id.to_string(),
        page_size: JELLYFIN_PAGE_SIZE,
    })
}

///
/// Configuration for the Plex (target) server
///
#[derive(Clone)]
pub enum PlexAuth {
    Token(String),
    Password { username: String, password: String },
}

impl std::fmt::Debug for PlexAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlexAuth::Token(_) => f.write_str("Token(..)"),
            PlexAuth::Password { username, .. } => {
                write!(f, "Password {{ username: {username:?}, .. }}")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlexConfig {
    pub base_url: Url,
    pub signin_url: Url,
    pub auth: PlexAuth,
    pub client_identifier: String,
    pub page_size: u32,
    pub write_batch: usize,
}

fn build_plex<P>(cli: &Cli, client_id: &str, prompt: P) -> Result<PlexConfig, MigrateError>
where
    P: FnOnce(&str) -> Result<String, MigrateError>,
{
    let raw = required("PLEX_URL", cli.plex_url.clone())?;
    let base_url = base_url("PLEX_URL", &raw)?;

    let signin = std::env::var("PLEX_SIGNIN_URL").unwrap_or_else(|_| PLEX_SIGNIN_URL.to_string());
    let signin_url = Url::parse(&signin)
        .map_err(|e| MigrateError::Config(format!("PLEX_SIGNIN_URL invalid {e}")))?;
    ensure_http(&signin_url).map_err(MigrateError::Config)?;

    let auth = match (present(cli.plex_token.clone()), present(cli.plex_username.clone())) {
        (Some(token), _) => PlexAuth::Token(token),
        (None, Some(username)) => {
            let password = match present(cli.plex_password.clone()) {
                Some(p) => p,
                None => prompt(&format!("Plex password for {username}: "))?,
            };
            PlexAuth::Password { username, password }
        }
        (None, None) => {
            return Err(MigrateError::Config(
                "PLEX_TOKEN or PLEX_USERNAME was not set".to_string(),
            ));
        }
    };

    Ok(PlexConfig {
        base_url,
        signin_url,
        auth,
        client_identifier: client_id.to_string(),
        page_size: PLEX_PAGE_SIZE,
        write_batch: PLEX_WRITE_BATCH,
    })
}

///
/// Configuration for Http timeouts, retries, etc.
///
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u8,
    pub base_backoff: time::Duration,
    pub retryable_statuses: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: RETRY_MAX_ATTEMPTS,
            base_backoff: time::Duration::from_millis(RETRY_BASE_BACKOFF),
            retryable_statuses: RETRYABLE_STATUSES.to_vec(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: time::Duration,
    pub connect_timeout: time::Duration,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout: time::Duration,
    pub max_redirects: u8,
    pub retry: RetryConfig,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: time::Duration::from_millis(HTTP_TIMEOUT),
            connect_timeout: time::Duration::from_millis(HTTP_CONNECT_TIMEOUT),
            pool_max_idle_per_host: HTTP_POOL_MAX_IDLE,
            pool_idle_timeout: time::Duration::from_millis(HTTP_POOL_IDLE_TIMEOUT),
            max_redirects: HTTP_MAX_REDIRECTS,
            retry: RetryConfig::default(),
        }
    }
}

///
/// Configuration for Logger
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub filter_directives: String,
    pub format: LogFormat,
    pub with_ansi: bool,
    pub include_file_line: bool,
    pub include_target: bool,
}

impl LoggingConfig {
    pub fn new(verbose: bool, format: LogFormat) -> Self {
        let level = if verbose { "debug" } else { "info" };
        Self {
            filter_directives: format!("warn,playlist_migrator={level}"),
            format,
            with_ansi: format == LogFormat::Pretty,
            include_file_line: verbose,
            include_target: verbose,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::new(false, LogFormat::Pretty)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
}

/// What to migrate and how
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    pub playlist_name: String,
    pub target_name: Option<String>,
    pub dry_run: bool,
    pub report_format: ReportFormat,
}

///
/// AppConfig holding everything the clients and the migrator need. Logging
/// is set up from the command line alone, before this is loaded.
///
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub jellyfin: JellyfinConfig,
    pub plex: PlexConfig,
    pub http: HttpConfig,
    pub migration: MigrationConfig,
}

/// Reads a secret from the terminal without echoing it
pub fn prompt_secret(label: &str) -> Result<String, MigrateError> {
    let secret = rpassword::prompt_password(label)?;
    if secret.is_empty() {
        return Err(MigrateError::Config("no password entered".to_string()));
    }
    Ok(secret)
}

/// Logging settings are available before anything else is validated
pub fn logging_config(cli: &Cli) -> LoggingConfig {
    LoggingConfig::new(cli.verbose, cli.log_format.into())
}

pub fn load_config<P>(cli: &Cli, prompt: P) -> Result<AppConfig, MigrateError>
where
    P: FnOnce(&str) -> Result<String, MigrateError>,
{
    if cli.playlist_name.trim().is_empty() {
        return Err(MigrateError::Config("playlist name is empty".to_string()));
    }

    // identifies this run towards both servers
    let client_id = format!("{PRODUCT}-{}", uuid::Uuid::new_v4());

    let jellyfin = build_jellyfin(cli, &client_id)?;
    let plex = build_plex(cli, &client_id, prompt)?;
    let http = HttpConfig::default();
    let migration = MigrationConfig {
        playlist_name: cli.playlist_name.clone(),
        target_name: present(cli.target_name.clone()),
        dry_run: cli.dry_run,
        report_format: cli.report_format.into(),
    };

    Ok(AppConfig { jellyfin, plex, http, migration })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["playlist-migrator"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    fn no_prompt(_: &str) -> Result<String, MigrateError> {
        panic!("prompt should not be called")
    }

    #[test]
    fn base_urls_get_trailing_slash() {
        let url = base_url("X", "http://jf.local:8096/jellyfin").unwrap();
        assert_eq!(url.as_str(), "http://jf.local:8096/jellyfin/");
        assert!(base_url("X", "ftp://jf.local").is_err());
        assert!(base_url("X", "not a url").is_err());
    }

    #[test]
    fn api_key_and_token_skip_passwords() {
        let cfg = load_config(
            &cli(&[
                "Road Trip",
                "--jellyfin-url", "http://jf:8096",
                "--jellyfin-api-key", "abc",
                "--plex-url", "http://plex:32400",
                "--plex-token", "tok",
                "--target-name", "Road Trip (from Jellyfin)",
            ]),
            no_prompt,
        )
        .unwrap();
        assert!(matches!(cfg.jellyfin.auth, JellyfinAuth::ApiKey(ref k) if k == "abc"));
        assert!(matches!(cfg.plex.auth, PlexAuth::Token(ref t) if t == "tok"));
        assert_eq!(cfg.migration.target_name.as_deref(), Some("Road Trip (from Jellyfin)"));
        assert!(!cfg.migration.dry_run);
        assert_eq!(cfg.jellyfin.device_id, cfg.plex.client_identifier);
    }

    #[test]
    fn missing_plex_password_is_prompted_for() {
        let cfg = load_config(
            &cli(&[
                "Mix",
                "--jellyfin-url", "http://jf:8096",
                "--jellyfin-username", "demo",
                "--plex-url", "http://plex:32400",
                "--plex-username", "me",
            ]),
            |label| {
                assert!(label.contains("me"));
                Ok("s3cret".to_string())
            },
        )
        .unwrap();
        match cfg.plex.auth {
            PlexAuth::Password { username, password } => {
                assert_eq!(username, "me");
                assert_eq!(password, "s3cret");
            }
            other => panic!("unexpected auth {other:?}"),
        }
        assert!(matches!(cfg.jellyfin.auth, JellyfinAuth::Password { ref password, .. } if password.is_empty()));
    }

    #[test]
    fn missing_credentials_are_config_errors() {
        let err = load_config(
            &cli(&["Mix", "--jellyfin-url", "http://jf:8096", "--plex-url", "http://plex:32400"]),
            no_prompt,
        )
        .unwrap_err();
        assert!(matches!(err, MigrateError::Config(_)));
    }

    #[test]
    fn secrets_stay_out_of_debug_output() {
        let auth = PlexAuth::Password { username: "me".into(), password: "hunter2".into() };
        assert!(!format!("{auth:?}").contains("hunter2"));
        assert!(!format!("{:?}", JellyfinAuth::ApiKey("k3y".into())).contains("k3y"));
    }

    #[test]
    fn verbose_only_changes_log_detail() {
        assert_eq!(LoggingConfig::new(true, LogFormat::Json).filter_directives, "warn,playlist_migrator=debug");
        assert_eq!(LoggingConfig::default().filter_directives, "warn,playlist_migrator=info");
    }
}
