//!
//! src/plex.rs  Oct 16th, 2026
//!
//! Target catalog client for Plex Media Server. Enumerates every track,
//! movie and episode part with its file path and writes playlists in
//! batches. Plex has no atomic replace, so a new playlist is built first
//! and older ones with the same title are removed only once it is whole.
//!

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, header};
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

use crate::catalog::TargetCatalog;
use crate::config::{HttpConfig, PRODUCT, PlexAuth, PlexConfig, RetryConfig};
use crate::errors::{MigrateError, PartialWrite};
use crate::fetch::{self, client_with_headers, header_value};
use crate::types::{MediaKind, TargetItem, TargetItemId};

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(rename = "MediaContainer")]
    container: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityDto {
    machine_identifier: String,
}

#[derive(Debug, Deserialize)]
struct SectionsDto {
    #[serde(rename = "Directory", default)]
    directories: Vec<SectionDto>,
}

#[derive(Debug, Deserialize)]
struct SectionDto {
    key: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetadataPage {
    #[serde(default)]
    total_size: Option<usize>,
    #[serde(rename = "Metadata", default)]
    metadata: Vec<MetadataDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetadataDto {
    rating_key: String,
    #[serde(default)]
    title: String,
    #[serde(rename = "Media", default)]
    media: Vec<MediaDto>,
}

#[derive(Debug, Deserialize)]
struct MediaDto {
    #[serde(rename = "Part", default)]
    parts: Vec<PartDto>,
}

#[derive(Debug, Deserialize)]
struct PartDto {
    #[serde(default)]
    file: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SignInDto {
    user: SignInUser,
}

#[derive(Debug, Deserialize)]
struct SignInUser {
    #[serde(rename = "authToken", alias = "authentication_token")]
    auth_token: String,
}

/// Library section types that can feed a playlist, with the leaf item
/// type requested from `/all`
fn section_leaf(section_type: &str) -> Option<(u8, MediaKind)> {
    match section_type {
        "artist" => Some((10, MediaKind::Audio)),
        "movie" => Some((1, MediaKind::Video)),
        "show" => Some((4, MediaKind::Video)),
        _ => None,
    }
}

fn playlist_type(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Audio => "audio",
        MediaKind::Video => "video",
    }
}

#[derive(Debug, Clone)]
struct Session {
    token: String,
    machine_id: String,
}

pub struct PlexClient {
    http: Client,
    cfg: PlexConfig,
    retry: RetryConfig,
    session: OnceCell<Session>,
    // filled by enumeration, consulted when picking the playlist type
    kinds: Mutex<HashMap<TargetItemId, MediaKind>>,
}

impl PlexClient {
    pub fn new(http_config: &HttpConfig, cfg: &PlexConfig) -> Result<Self, MigrateError> {
        let mut headers = header::HeaderMap::new();
        headers.insert("X-Plex-Client-Identifier", header_value(&cfg.client_identifier)?);
        headers.insert("X-Plex-Product", header::HeaderValue::from_static(PRODUCT));
        headers.insert(
            "X-Plex-Version",
            header::HeaderValue::from_static(env!("CARGO_PKG_VERSION")),
        );
        let http = client_with_headers(http_config, headers)?;
        Ok(Self {
            http,
            cfg: cfg.clone(),
            retry: http_config.retry.clone(),
            session: OnceCell::new(),
            kinds: Mutex::new(HashMap::new()),
        })
    }

    async fn session(&self) -> Result<&Session, MigrateError> {
        self.session.get_or_try_init(|| self.connect()).await
    }

    async fn connect(&self) -> Result<Session, MigrateError> {
        let token = match &self.cfg.auth {
            PlexAuth::Token(token) => token.clone(),
            PlexAuth::Password { username, password } => {
                let request = self
                    .http
                    .post(self.cfg.signin_url.clone())
                    .basic_auth(username, Some(password));
                let signed: SignInDto = fetch::send_once_json(request).await?;
                info!(user = %username, "plex.auth");
                signed.user.auth_token
            }
        };

        let url = self.cfg.base_url.join("identity")?;
        let request = self.http.get(url).header("X-Plex-Token", &token);
        let identity: Envelope<IdentityDto> = fetch::get_with_retry(request, &self.retry).await?;
        debug!(machine = %identity.container.machine_identifier, "plex.identity");

        Ok(Session { token, machine_id: identity.container.machine_identifier })
    }

    fn request(
        &self,
        method: reqwest::Method,
        session: &Session,
        path: &str,
    ) -> Result<RequestBuilder, MigrateError> {
        let url = self.cfg.base_url.join(path)?;
        Ok(self.http.request(method, url).header("X-Plex-Token", &session.token))
    }

    async fn sections(&self, session: &Session) -> Result<Vec<SectionDto>, MigrateError> {
        let request = self.request(reqwest::Method::GET, session, "library/sections")?;
        let sections: Envelope<SectionsDto> = fetch::get_with_retry(request, &self.retry).await?;
        Ok(sections.container.directories)
    }

    async fn section_items(
        &self,
        session: &Session,
        section: &SectionDto,
        leaf_type: u8,
        kind: MediaKind,
    ) -> Result<Vec<TargetItem>, MigrateError> {
        let mut items = Vec::new();
        let mut offset = 0_usize;
        loop {
            let request = self
                .request(
                    reqwest::Method::GET,
                    session,
                    &format!("library/sections/{}/all", section.key),
                )?
                .query(&[
                    ("type", leaf_type.to_string()),
                    ("X-Plex-Container-Start", offset.to_string()),
                    ("X-Plex-Container-Size", self.cfg.page_size.to_string()),
                ]);
            let page: Envelope<MetadataPage> = fetch::get_with_retry(request, &self.retry).await?;
            let page = page.container;
            let received = page.metadata.len();
            offset += received;

            for meta in page.metadata {
                let id = TargetItemId(meta.rating_key);
                for file in meta.media.iter().flat_map(|m| &m.parts).filter_map(|p| p.file.as_ref()) {
                    items.push(TargetItem {
                        id: id.clone(),
                        absolute_path: file.clone(),
                        title: meta.title.clone(),
                        kind,
                    });
                }
            }

            let done = match page.total_size {
                Some(total) => offset >= total,
                None => received < self.cfg.page_size as usize,
            };
            if done || received == 0 {
                break;
            }
        }
        debug!(section = %section.title, parts = items.len(), "plex.section");
        Ok(items)
    }

    /// All identifiers must be known and of one kind
    fn playlist_kind(&self, ids: &[TargetItemId]) -> Result<MediaKind, MigrateError> {
        let kinds = self
            .kinds
            .lock()
            .map_err(|_| MigrateError::write_failed("item kind table poisoned"))?;
        let mut found: Option<MediaKind> = None;
        for id in ids {
            let kind = kinds.get(id).copied().ok_or_else(|| {
                MigrateError::write_failed(format!("item {id} was not enumerated in this run"))
            })?;
            match found {
                None => found = Some(kind),
                Some(k) if k == kind => {}
                Some(_) => {
                    return Err(MigrateError::write_failed(
                        "playlist mixes audio and video items, Plex cannot hold both",
                    ));
                }
            }
        }
        found.ok_or_else(|| MigrateError::write_failed("no items to write"))
    }

    /// Lowest known item id, used to create a playlist that is emptied again
    fn seed_item(&self) -> Result<(TargetItemId, MediaKind), MigrateError> {
        let kinds = self
            .kinds
            .lock()
            .map_err(|_| MigrateError::write_failed("item kind table poisoned"))?;
        kinds
            .iter()
            .min_by(|a, b| a.0.cmp(b.0))
            .map(|(id, kind)| (id.clone(), *kind))
            .ok_or_else(|| {
                MigrateError::write_failed("target library is empty, no item to create the playlist from")
            })
    }

    fn items_uri(&self, session: &Session, ids: &[TargetItemId]) -> String {
        let joined = ids.iter().map(|id| id.0.as_str()).collect::<Vec<_>>().join(",");
        format!(
            "server://{}/com.plexapp.plugins.library/library/metadata/{joined}",
            session.machine_id
        )
    }

    async fn playlists_titled(
        &self,
        session: &Session,
        title: &str,
        kind: Option<MediaKind>,
    ) -> Result<Vec<String>, MigrateError> {
        let mut request = self.request(reqwest::Method::GET, session, "playlists")?;
        if let Some(kind) = kind {
            request = request.query(&[("playlistType", playlist_type(kind))]);
        }
        let page: Envelope<MetadataPage> = fetch::get_with_retry(request, &self.retry).await?;
        Ok(page
            .container
            .metadata
            .into_iter()
            .filter(|m| m.title == title)
            .map(|m| m.rating_key)
            .collect())
    }

    async fn create_playlist(
        &self,
        session: &Session,
        name: &str,
        kind: MediaKind,
        ids: &[TargetItemId],
    ) -> Result<String, MigrateError> {
        let uri = self.items_uri(session, ids);
        let request = self
            .request(reqwest::Method::POST, session, "playlists")?
            .query(&[
                ("type", playlist_type(kind)),
                ("title", name),
                ("smart", "0"),
                ("uri", uri.as_str()),
            ]);
        let created: Envelope<MetadataPage> = fetch::send_once_json(request).await?;
        created
            .container
            .metadata
            .into_iter()
            .next()
            .map(|m| m.rating_key)
            .ok_or_else(|| MigrateError::write_failed("Plex did not return the new playlist"))
    }

    async fn clear_playlist(&self, session: &Session, id: &str) -> Result<(), MigrateError> {
        let request =
            self.request(reqwest::Method::DELETE, session, &format!("playlists/{id}/items"))?;
        fetch::send_once(request).await?;
        Ok(())
    }

    async fn delete_playlist(&self, session: &Session, id: &str) -> Result<(), MigrateError> {
        let request = self.request(reqwest::Method::DELETE, session, &format!("playlists/{id}"))?;
        fetch::send_once(request).await?;
        Ok(())
    }

    /// Best-effort removal of a half-built playlist; true when it is gone
    async fn abandon(&self, session: &Session, id: &str) -> bool {
        match self.delete_playlist(session, id).await {
            Ok(()) => true,
            Err(e) => {
                warn!(id = %id, error = %e, "plex.write.cleanup");
                false
            }
        }
    }

    /// Deletes older playlists with the same title once `keep` is complete
    async fn remove_previous(
        &self,
        session: &Session,
        keep: &str,
        previous: &[String],
        written: usize,
        expected: usize,
    ) -> Result<(), MigrateError> {
        for old in previous.iter().filter(|old| old.as_str() != keep) {
            if let Err(e) = self.delete_playlist(session, old).await {
                return Err(MigrateError::TargetWriteFailed {
                    reason: format!("new playlist written but previous playlist {old} was not removed: {e}"),
                    partial: Some(PartialWrite {
                        playlist_id: Some(keep.to_string()),
                        written,
                        expected,
                        cleaned_up: false,
                    }),
                });
            }
            info!(id = %old, "plex.write.replaced");
        }
        Ok(())
    }

    async fn write_playlist(&self, name: &str, ids: &[TargetItemId]) -> Result<String, MigrateError> {
        if ids.is_empty() {
            return self.write_empty_playlist(name).await;
        }
        let kind = self.playlist_kind(ids)?;
        let session = self.session().await?;
        let previous = self.playlists_titled(session, name, Some(kind)).await?;

        let mut batches = ids.chunks(self.cfg.write_batch.max(1));
        let first = batches.next().unwrap_or_default();
        let playlist_id = self.create_playlist(session, name, kind, first).await?;
        let mut written = first.len();
        info!(id = %playlist_id, written, total = ids.len(), "plex.write.create");

        for (n, batch) in batches.enumerate() {
            let request = self
                .request(reqwest::Method::PUT, session, &format!("playlists/{playlist_id}/items"))?
                .query(&[("uri", self.items_uri(session, batch))]);
            if let Err(e) = fetch::send_once(request).await {
                error!(id = %playlist_id, batch = n + 1, error = %e, "plex.write.batch");
                let cleaned_up = self.abandon(session, &playlist_id).await;
                return Err(MigrateError::TargetWriteFailed {
                    reason: format!("appending batch {}: {e}", n + 1),
                    partial: Some(PartialWrite {
                        playlist_id: Some(playlist_id),
                        written,
                        expected: ids.len(),
                        cleaned_up,
                    }),
                });
            }
            written += batch.len();
            debug!(id = %playlist_id, written, "plex.write.batch");
        }

        self.remove_previous(session, &playlist_id, &previous, written, ids.len()).await?;
        Ok(playlist_id)
    }

    /// Plex has no empty non-smart playlist on creation: reuse and clear a
    /// playlist with the same title, or create one from a seed item and
    /// clear it
    async fn write_empty_playlist(&self, name: &str) -> Result<String, MigrateError> {
        let session = self.session().await?;
        let previous = self.playlists_titled(session, name, None).await?;

        if let Some((keep, rest)) = previous.split_first() {
            self.clear_playlist(session, keep).await?;
            info!(id = %keep, "plex.write.cleared");
            self.remove_previous(session, keep, rest, 0, 0).await?;
            return Ok(keep.clone());
        }

        let (seed, kind) = self.seed_item()?;
        let playlist_id =
            self.create_playlist(session, name, kind, std::slice::from_ref(&seed)).await?;
        if let Err(e) = self.clear_playlist(session, &playlist_id).await {
            let cleaned_up = self.abandon(session, &playlist_id).await;
            return Err(MigrateError::TargetWriteFailed {
                reason: format!("emptying new playlist: {e}"),
                partial: Some(PartialWrite {
                    playlist_id: Some(playlist_id),
                    written: 1,
                    expected: 0,
                    cleaned_up,
                }),
            });
        }
        info!(id = %playlist_id, "plex.write.empty");
        Ok(playlist_id)
    }
}

#[async_trait]
impl TargetCatalog for PlexClient {
    async fn enumerate_library_items(&self) -> Result<Vec<TargetItem>, MigrateError> {
        let result: Result<Vec<TargetItem>, MigrateError> = async {
            let session = self.session().await?;
            let mut items = Vec::new();
            for section in self.sections(session).await? {
                let Some((leaf, kind)) = section_leaf(&section.kind) else {
                    debug!(section = %section.title, kind = %section.kind, "plex.section.skip");
                    continue;
                };
                items.extend(self.section_items(session, &section, leaf, kind).await?);
            }
            Ok(items)
        }
        .await;

        let items = result.map_err(MigrateError::into_target)?;
        if let Ok(mut kinds) = self.kinds.lock() {
            kinds.extend(items.iter().map(|i| (i.id.clone(), i.kind)));
        }
        info!(parts = items.len(), "plex.enumerated");
        Ok(items)
    }

    async fn create_or_replace_playlist(
        &self,
        name: &str,
        ordered_ids: &[TargetItemId],
    ) -> Result<String, MigrateError> {
        self.write_playlist(name, ordered_ids).await.map_err(|e| match e {
            e @ MigrateError::TargetWriteFailed { .. } => e,
            other => MigrateError::write_failed(other.to_string()),
        })
    }
}
