//!
//! src/catalog.rs  Oct 16th, 2026
//!
//! Seams between the migrator and the two media servers. Clients map
//! their own transport and auth failures onto the run-fatal errors
//! listed on each method.
//!

use async_trait::async_trait;

use crate::errors::MigrateError;
use crate::types::{SourcePlaylist, TargetItem, TargetItemId};

#[async_trait]
pub trait SourceCatalog: Send + Sync {
    /// Ordered entries of the named playlist.
    /// Fails with SourceNotFound or SourceUnavailable.
    async fn fetch_playlist_by_name(&self, name: &str) -> Result<SourcePlaylist, MigrateError>;
}

#[async_trait]
pub trait TargetCatalog: Send + Sync {
    /// Every library item with a file path, fully drained.
    /// Fails with TargetUnavailable.
    async fn enumerate_library_items(&self) -> Result<Vec<TargetItem>, MigrateError>;

    /// Writes the playlist in the given order and returns its identifier.
    /// Fails with TargetWriteFailed.
    async fn create_or_replace_playlist(
        &self,
        name: &str,
        ordered_ids: &[TargetItemId],
    ) -> Result<String, MigrateError>;
}
