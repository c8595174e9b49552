//!
//! src/jellyfin.rs  Oct 16th, 2026
//!
//! Source catalog client for Jellyfin. Authenticates lazily on first use,
//! resolves a playlist by name and pages through its entries.
//!

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, header};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::catalog::SourceCatalog;
use crate::config::{HttpConfig, JellyfinAuth, JellyfinConfig, PRODUCT, RetryConfig};
use crate::errors::MigrateError;
use crate::fetch::{self, client_with_headers, header_value};
use crate::types::{SourceItem, SourcePlaylist};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ItemsPage<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(default)]
    total_record_count: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PlaylistDto {
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ItemDto {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    media_sources: Vec<MediaSourceDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MediaSourceDto {
    #[serde(default)]
    path: Option<String>,
}

impl ItemDto {
    /// Item path, falling back to the first media source
    fn file_path(&self) -> Option<&str> {
        self.path
            .as_deref()
            .filter(|p| !p.is_empty())
            .or_else(|| self.media_sources.first().and_then(|m| m.path.as_deref()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthResponse {
    access_token: String,
    user: UserDto,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UserDto {
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Clone)]
struct Session {
    token: String,
    user_id: Option<String>,
}

pub struct JellyfinClient {
    http: Client,
    cfg: JellyfinConfig,
    retry: RetryConfig,
    session: OnceCell<Session>,
}

impl JellyfinClient {
    pub fn new(http_config: &HttpConfig, cfg: &JellyfinConfig) -> Result<Self, MigrateError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            "X-Emby-Authorization",
            header_value(&format!(
                "MediaBrowser Client=\"{PRODUCT}\", Device=\"{PRODUCT}\", DeviceId=\"{}\", Version=\"{}\"",
                cfg.device_id,
                env!("CARGO_PKG_VERSION")
            ))?,
        );
        let http = client_with_headers(http_config, headers)?;
        Ok(Self {
            http,
            cfg: cfg.clone(),
            retry: http_config.retry.clone(),
            session: OnceCell::new(),
        })
    }

    async fn session(&self) -> Result<&Session, MigrateError> {
        self.session.get_or_try_init(|| self.authenticate()).await
    }

    async fn authenticate(&self) -> Result<Session, MigrateError> {
        match &self.cfg.auth {
            JellyfinAuth::ApiKey(key) => {
                let user_id = match &self.cfg.user_id {
                    Some(id) => Some(id.clone()),
                    None => self.current_user(key).await,
                };
                Ok(Session { token: key.clone(), user_id })
            }
            JellyfinAuth::Password { username, password } => {
                let url = self.cfg.base_url.join("Users/AuthenticateByName")?;
                let request = self
                    .http
                    .post(url)
                    .json(&json!({ "Username": username, "Pw": password }));
                let auth: AuthResponse = fetch::send_once_json(request).await?;
                info!(user = %auth.user.name, "jellyfin.auth");
                Ok(Session {
                    token: auth.access_token,
                    user_id: self.cfg.user_id.clone().or(Some(auth.user.id)),
                })
            }
        }
    }

    /// API keys are not tied to a user, so this is allowed to fail
    async fn current_user(&self, token: &str) -> Option<String> {
        let url = self.cfg.base_url.join("Users/Me").ok()?;
        let request = self.http.get(url).header("X-Emby-Token", token);
        match fetch::get_with_retry::<UserDto>(request, &self.retry).await {
            Ok(user) => Some(user.id),
            Err(e) => {
                debug!(error = %e, "jellyfin.users_me.skip");
                None
            }
        }
    }

    fn get(&self, session: &Session, path: &str) -> Result<RequestBuilder, MigrateError> {
        let url = self.cfg.base_url.join(path)?;
        let mut request = self.http.get(url).header("X-Emby-Token", &session.token);
        if let Some(user_id) = &session.user_id {
            request = request.query(&[("userId", user_id)]);
        }
        Ok(request)
    }

    async fn playlists(&self, session: &Session) -> Result<Vec<PlaylistDto>, MigrateError> {
        let request = self
            .get(session, "Items")?
            .query(&[("IncludeItemTypes", "Playlist"), ("Recursive", "true")]);
        let page: ItemsPage<PlaylistDto> = fetch::get_with_retry(request, &self.retry).await?;
        Ok(page.items)
    }

    async fn playlist_items(
        &self,
        session: &Session,
        playlist_id: &str,
    ) -> Result<Vec<ItemDto>, MigrateError> {
        let mut items: Vec<ItemDto> = Vec::new();
        loop {
            let request = self
                .get(session, &format!("Playlists/{playlist_id}/Items"))?
                .query(&[
                    ("Fields", "Path,MediaSources".to_string()),
                    ("StartIndex", items.len().to_string()),
                    ("Limit", self.cfg.page_size.to_string()),
                ]);
            let page: ItemsPage<ItemDto> = fetch::get_with_retry(request, &self.retry).await?;
            let received = page.items.len();
            items.extend(page.items);
            debug!(received, so_far = items.len(), total = ?page.total_record_count, "jellyfin.page");

            let done = match page.total_record_count {
                Some(total) => items.len() >= total,
                None => received < self.cfg.page_size as usize,
            };
            if done || received == 0 {
                break;
            }
        }
        Ok(items)
    }
}

/// Exact name first, then a single case-insensitive match
fn select_playlist<'a>(
    name: &str,
    playlists: &'a [PlaylistDto],
) -> Result<&'a PlaylistDto, MigrateError> {
    if let Some(exact) = playlists.iter().find(|p| p.name == name) {
        return Ok(exact);
    }

    let folded = name.to_lowercase();
    let loose: Vec<&PlaylistDto> = playlists
        .iter()
        .filter(|p| p.name.to_lowercase() == folded)
        .collect();
    match loose.as_slice() {
        [only] => Ok(*only),
        [] => Err(MigrateError::SourceNotFound(name.to_string())),
        many => Err(MigrateError::SourceNotFound(format!(
            "{name} is ambiguous, candidates: {}",
            many.iter().map(|p| p.name.as_str()).collect::<Vec<_>>().join(", ")
        ))),
    }
}

#[async_trait]
impl SourceCatalog for JellyfinClient {
    async fn fetch_playlist_by_name(&self, name: &str) -> Result<SourcePlaylist, MigrateError> {
        let result: Result<SourcePlaylist, MigrateError> = async {
            let session = self.session().await?;
            let playlists = self.playlists(session).await?;
            let playlist = select_playlist(name, &playlists)?.clone();
            info!(name = %playlist.name, id = %playlist.id, "jellyfin.playlist");

            let items = self.playlist_items(session, &playlist.id).await?;
            let items: Vec<SourceItem> = items
                .into_iter()
                .enumerate()
                .map(|(i, item)| {
                    let path = item.file_path().unwrap_or_default().to_string();
                    let title = item.name.clone().unwrap_or_else(|| "Unknown".to_string());
                    if path.is_empty() {
                        warn!(seq = i, title = %title, "jellyfin.item.no_path");
                    }
                    SourceItem { sequence_index: i, title, absolute_path: path }
                })
                .collect();

            Ok(SourcePlaylist { id: playlist.id, name: playlist.name, items })
        }
        .await;
        result.map_err(MigrateError::into_source)
    }
}
