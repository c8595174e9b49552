use clap::{Parser, ValueEnum};

use crate::config::{LogFormat, ReportFormat};

/// Migrate a Jellyfin playlist to Plex by matching identical file paths
#[derive(Parser, Debug, Clone)]
#[command(name = "playlist-migrator")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Name of the Jellyfin playlist to migrate
    pub playlist_name: String,

    /// Jellyfin server URL
    #[arg(long, env = "JELLYFIN_URL")]
    pub jellyfin_url: Option<String>,

    /// Jellyfin API key
    #[arg(long, env = "JELLYFIN_API_KEY", hide_env_values = true)]
    pub jellyfin_api_key: Option<String>,

    /// Jellyfin username, used when no API key is given
    #[arg(long, env = "JELLYFIN_USERNAME")]
    pub jellyfin_username: Option<String>,

    #[arg(long, env = "JELLYFIN_PASSWORD", hide_env_values = true)]
    pub jellyfin_password: Option<String>,

    /// Jellyfin user whose view of the library is used
    #[arg(long, env = "JELLYFIN_USER_ID")]
    pub jellyfin_user_id: Option<String>,

    /// Plex server URL
    #[arg(long, env = "PLEX_URL")]
    pub plex_url: Option<String>,

    /// Plex token, skips the plex.tv sign-in
    #[arg(long, env = "PLEX_TOKEN", hide_env_values = true)]
    pub plex_token: Option<String>,

    #[arg(long, env = "PLEX_USERNAME")]
    pub plex_username: Option<String>,

    /// Plex password (prompted for when missing)
    #[arg(long, env = "PLEX_PASSWORD", hide_env_values = true)]
    pub plex_password: Option<String>,

    /// Name of the playlist written to Plex (default: the Jellyfin name)
    #[arg(long)]
    pub target_name: Option<String>,

    /// Preview the migration without creating the playlist
    #[arg(long)]
    pub dry_run: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[arg(long, value_enum, default_value_t = ReportFormatArg::Text, env = "MIGRATE_REPORT_FORMAT")]
    pub report_format: ReportFormatArg,

    #[arg(long, value_enum, default_value_t = LogFormatArg::Pretty, env = "MIGRATE_LOG_FORMAT")]
    pub log_format: LogFormatArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormatArg {
    Text,
    Json,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormatArg {
    Pretty,
    Json,
}

impl From<ReportFormatArg> for ReportFormat {
    fn from(a: ReportFormatArg) -> Self {
        match a {
            ReportFormatArg::Text => ReportFormat::Text,
            ReportFormatArg::Json => ReportFormat::Json,
        }
    }
}

impl From<LogFormatArg> for LogFormat {
    fn from(a: LogFormatArg) -> Self {
        match a {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}
