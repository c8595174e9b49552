//!
//! src/migrator.rs  Oct 16th, 2026
//!
//! Drives one migration run: fetch the source playlist, drain the target
//! library, index it, match, then either stop (dry run) or write the
//! playlist. Each step waits for the previous one; the first run-fatal
//! error ends the run.
//!

use std::fmt;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::catalog::{SourceCatalog, TargetCatalog};
use crate::config::MigrationConfig;
use crate::engine::match_items;
use crate::errors::MigrateError;
use crate::index::PathIndex;
use crate::plan::{MigrationOutcome, MigrationPlan};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    Init,
    SourceFetched,
    TargetEnumerated,
    Indexed,
    Matched,
    DryRunReported,
    Applying,
    Applied,
    Done,
    Failed,
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MigrationState::Init => "init",
            MigrationState::SourceFetched => "source_fetched",
            MigrationState::TargetEnumerated => "target_enumerated",
            MigrationState::Indexed => "indexed",
            MigrationState::Matched => "matched",
            MigrationState::DryRunReported => "dry_run_reported",
            MigrationState::Applying => "applying",
            MigrationState::Applied => "applied",
            MigrationState::Done => "done",
            MigrationState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A run that ended in Failed. `at` is the state the failing step started
/// from; `plan` and the source playlist name are kept when matching had
/// already finished.
#[derive(Error, Debug)]
#[error("migration failed at {at}: {error}")]
pub struct MigrationFailure {
    pub at: MigrationState,
    pub error: MigrateError,
    pub plan: Option<MigrationPlan>,
    pub source_playlist_name: Option<String>,
}

pub struct Migrator<'a, S: ?Sized, T: ?Sized> {
    source: &'a S,
    target: &'a T,
    cfg: &'a MigrationConfig,
    state: MigrationState,
}

impl<'a, S, T> Migrator<'a, S, T>
where
    S: SourceCatalog + ?Sized,
    T: TargetCatalog + ?Sized,
{
    pub fn new(source: &'a S, target: &'a T, cfg: &'a MigrationConfig) -> Self {
        Self { source, target, cfg, state: MigrationState::Init }
    }

    pub fn state(&self) -> MigrationState {
        self.state
    }

    fn advance(&mut self, next: MigrationState) {
        info!(from = %self.state, to = %next, "migrate.state");
        self.state = next;
    }

    fn fail(&mut self, error: MigrateError, plan: Option<MigrationPlan>) -> MigrationFailure {
        let at = self.state;
        error!(at = %at, error = %error, "migrate.failed");
        self.state = MigrationState::Failed;
        MigrationFailure { at, error, plan, source_playlist_name: None }
    }

    pub async fn run(&mut self) -> Result<MigrationOutcome, MigrationFailure> {
        info!(
            playlist = %self.cfg.playlist_name,
            dry_run = self.cfg.dry_run,
            "migrate.start"
        );

        let playlist = match self.source.fetch_playlist_by_name(&self.cfg.playlist_name).await {
            Ok(playlist) => playlist,
            Err(e) => return Err(self.fail(e.into_source(), None)),
        };
        info!(id = %playlist.id, items = playlist.items.len(), "migrate.source");
        self.advance(MigrationState::SourceFetched);

        let library = match self.target.enumerate_library_items().await {
            Ok(items) => items,
            Err(e) => return Err(self.fail(e.into_target(), None)),
        };
        info!(items = library.len(), "migrate.target");
        self.advance(MigrationState::TargetEnumerated);

        let index = PathIndex::build(library);
        info!(
            paths = index.len(),
            collisions = index.collision_count(),
            skipped = index.skipped().len(),
            "migrate.index"
        );
        if index.is_empty() {
            warn!("migrate.index.empty");
        }
        for (path, candidates) in index.collisions() {
            let ids: Vec<&str> = candidates.iter().map(|c| c.id.0.as_str()).collect();
            debug!(path = %path, ids = ?ids, "migrate.index.collision");
        }
        self.advance(MigrationState::Indexed);

        let plan = match_items(&playlist.items, &index);
        if plan.nothing_matched() {
            warn!(total = plan.total(), "migrate.nothing_matched");
        }
        self.advance(MigrationState::Matched);

        let source_name = playlist.name;
        let target_name = self.cfg.target_name.clone().unwrap_or_else(|| source_name.clone());

        if self.cfg.dry_run {
            self.advance(MigrationState::DryRunReported);
            self.advance(MigrationState::Done);
            return Ok(MigrationOutcome {
                plan,
                source_playlist_name: source_name,
                applied: false,
                target_playlist_id: None,
                target_playlist_name: target_name,
            });
        }

        self.advance(MigrationState::Applying);
        let ids = plan.matched_ids();
        let playlist_id = match self.target.create_or_replace_playlist(&target_name, &ids).await {
            Ok(id) => id,
            Err(e) => {
                let e = match e {
                    e @ MigrateError::TargetWriteFailed { .. } => e,
                    other => MigrateError::write_failed(other.to_string()),
                };
                let mut failure = self.fail(e, Some(plan));
                failure.source_playlist_name = Some(source_name);
                return Err(failure);
            }
        };
        info!(id = %playlist_id, name = %target_name, written = ids.len(), "migrate.applied");
        self.advance(MigrationState::Applied);
        self.advance(MigrationState::Done);

        Ok(MigrationOutcome {
            plan,
            source_playlist_name: source_name,
            applied: true,
            target_playlist_id: Some(playlist_id),
            target_playlist_name: target_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReportFormat;
    use crate::plan::UnmatchReason;
    use crate::types::{MediaKind, SourceItem, SourcePlaylist, TargetItem, TargetItemId};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeSource {
        playlist: Option<SourcePlaylist>,
    }

    #[async_trait]
    impl SourceCatalog for FakeSource {
        async fn fetch_playlist_by_name(&self, name: &str) -> Result<SourcePlaylist, MigrateError> {
            self.playlist
                .clone()
                .filter(|p| p.name.eq_ignore_ascii_case(name))
                .ok_or_else(|| MigrateError::SourceNotFound(name.to_string()))
        }
    }

    #[derive(Default)]
    struct FakeTarget {
        library: Vec<TargetItem>,
        fail_enumerate: bool,
        fail_write: bool,
        enumerate_calls: AtomicUsize,
        writes: Mutex<Vec<(String, Vec<TargetItemId>)>>,
    }

    impl FakeTarget {
        fn calls(&self) -> usize {
            self.enumerate_calls.load(Ordering::SeqCst) + self.writes.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TargetCatalog for FakeTarget {
        async fn enumerate_library_items(&self) -> Result<Vec<TargetItem>, MigrateError> {
            self.enumerate_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_enumerate {
                return Err(MigrateError::Auth("401 Unauthorized for /library/sections".to_string()));
            }
            Ok(self.library.clone())
        }

        async fn create_or_replace_playlist(
            &self,
            name: &str,
            ordered_ids: &[TargetItemId],
        ) -> Result<String, MigrateError> {
            self.writes.lock().unwrap().push((name.to_string(), ordered_ids.to_vec()));
            if self.fail_write {
                return Err(MigrateError::Http("500 for /playlists".to_string()));
            }
            Ok("pl-1".to_string())
        }
    }

    fn source(paths: &[&str]) -> FakeSource {
        let items = paths
            .iter()
            .enumerate()
            .map(|(i, p)| SourceItem {
                sequence_index: i,
                title: format!("item {i}"),
                absolute_path: p.to_string(),
            })
            .collect();
        FakeSource {
            playlist: Some(SourcePlaylist { id: "src-1".into(), name: "Road Trip".into(), items }),
        }
    }

    fn target(entries: &[(&str, &str)]) -> FakeTarget {
        FakeTarget {
            library: entries
                .iter()
                .map(|(id, p)| TargetItem {
                    id: TargetItemId(id.to_string()),
                    absolute_path: p.to_string(),
                    title: String::new(),
                    kind: MediaKind::Video,
                })
                .collect(),
            ..FakeTarget::default()
        }
    }

    fn settings(dry_run: bool) -> MigrationConfig {
        MigrationConfig {
            playlist_name: "Road Trip".to_string(),
            target_name: None,
            dry_run,
            report_format: ReportFormat::Text,
        }
    }

    #[tokio::test]
    async fn apply_writes_matched_ids_in_source_order() {
        let src = source(&["/media/a.mkv", "/media/b.mkv", "/media/missing.mkv"]);
        let tgt = target(&[("2", "/media/b.mkv"), ("1", "/media/a.mkv")]);
        let cfg = settings(false);

        let mut migrator = Migrator::new(&src, &tgt, &cfg);
        let outcome = migrator.run().await.unwrap();

        assert_eq!(migrator.state(), MigrationState::Done);
        assert!(outcome.applied);
        assert_eq!(outcome.target_playlist_id.as_deref(), Some("pl-1"));
        assert_eq!(outcome.plan.matched_count(), 2);
        assert_eq!(outcome.plan.count_for(UnmatchReason::NotFound), 1);

        let writes = tgt.writes.lock().unwrap();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, "Road Trip");
        assert_eq!(writes[0].1, vec![TargetItemId("1".into()), TargetItemId("2".into())]);
    }

    #[tokio::test]
    async fn dry_run_never_writes_even_when_everything_matches() {
        let src = source(&["/media/a.mkv", "/media/b.mkv"]);
        let tgt = target(&[("1", "/media/a.mkv"), ("2", "/media/b.mkv")]);
        let cfg = settings(true);

        let mut migrator = Migrator::new(&src, &tgt, &cfg);
        let outcome = migrator.run().await.unwrap();

        assert!(!outcome.applied);
        assert_eq!(outcome.plan.matched_count(), 2);
        assert!(tgt.writes.lock().unwrap().is_empty());
        assert_eq!(migrator.state(), MigrationState::Done);
    }

    #[tokio::test]
    async fn missing_source_playlist_never_touches_target() {
        let src = FakeSource { playlist: None };
        let tgt = target(&[("1", "/media/a.mkv")]);
        let cfg = settings(false);

        let mut migrator = Migrator::new(&src, &tgt, &cfg);
        let failure = migrator.run().await.unwrap_err();

        assert!(matches!(failure.error, MigrateError::SourceNotFound(_)));
        assert_eq!(failure.at, MigrationState::Init);
        assert_eq!(migrator.state(), MigrationState::Failed);
        assert_eq!(tgt.calls(), 0);
    }

    #[tokio::test]
    async fn unreachable_target_fails_after_source_fetch() {
        let src = source(&["/media/a.mkv"]);
        let mut tgt = target(&[("1", "/media/a.mkv")]);
        tgt.fail_enumerate = true;
        let cfg = settings(false);

        let mut migrator = Migrator::new(&src, &tgt, &cfg);
        let failure = migrator.run().await.unwrap_err();

        assert_eq!(failure.at, MigrationState::SourceFetched);
        assert!(matches!(failure.error, MigrateError::TargetUnavailable(ref m) if m.contains("401")));
        assert!(failure.plan.is_none());
        assert!(tgt.writes.lock().unwrap().is_empty());
        assert_eq!(migrator.state(), MigrationState::Failed);
        assert!(failure.to_string().starts_with("migration failed at source_fetched: target catalog unavailable"));
    }

    #[tokio::test]
    async fn zero_matches_still_write_an_empty_playlist() {
        let src = source(&["/media/gone.mkv", "/media/also-gone.mkv"]);
        let tgt = target(&[("1", "/media/a.mkv")]);
        let cfg = settings(false);

        let mut migrator = Migrator::new(&src, &tgt, &cfg);
        let outcome = migrator.run().await.unwrap();

        assert_eq!(migrator.state(), MigrationState::Done);
        assert!(outcome.applied);
        assert!(outcome.plan.nothing_matched());
        assert_eq!(outcome.target_playlist_id.as_deref(), Some("pl-1"));
        assert_eq!(tgt.writes.lock().unwrap()[0], ("Road Trip".to_string(), Vec::new()));
    }

    #[tokio::test]
    async fn outcome_carries_source_spelling_of_the_name() {
        let src = source(&["/media/a.mkv"]);
        let tgt = target(&[("1", "/media/a.mkv")]);
        let cfg = MigrationConfig { playlist_name: "road trip".into(), ..settings(true) };

        let outcome = Migrator::new(&src, &tgt, &cfg).run().await.unwrap();
        assert_eq!(outcome.source_playlist_name, "Road Trip");
        assert_eq!(outcome.target_playlist_name, "Road Trip");
    }

    #[tokio::test]
    async fn write_failure_keeps_plan_for_report() {
        let src = source(&["/media/a.mkv"]);
        let mut tgt = target(&[("1", "/media/a.mkv")]);
        tgt.fail_write = true;
        let cfg = settings(false);

        let mut migrator = Migrator::new(&src, &tgt, &cfg);
        let failure = migrator.run().await.unwrap_err();

        assert!(matches!(failure.error, MigrateError::TargetWriteFailed { .. }));
        assert_eq!(failure.at, MigrationState::Applying);
        assert_eq!(failure.source_playlist_name.as_deref(), Some("Road Trip"));
        assert_eq!(failure.plan.map(|p| p.matched_count()), Some(1));
        assert_eq!(failure.error.exit_code(), 1);
    }

    #[tokio::test]
    async fn empty_playlist_still_applies() {
        let src = source(&[]);
        let tgt = target(&[("1", "/media/a.mkv")]);
        let cfg = MigrationConfig { target_name: Some("Copy".into()), ..settings(false) };

        let outcome = Migrator::new(&src, &tgt, &cfg).run().await.unwrap();

        assert!(outcome.applied);
        assert_eq!(outcome.plan.total(), 0);
        assert_eq!(outcome.target_playlist_name, "Copy");
        let writes = tgt.writes.lock().unwrap();
        assert_eq!(writes[0], ("Copy".to_string(), Vec::new()));
    }

    #[tokio::test]
    async fn colliding_paths_are_not_written() {
        let src = source(&["/media/c.mkv", "/media/a.mkv"]);
        let tgt = target(&[("1", "/media/c.mkv"), ("2", "/media/c.mkv"), ("3", "/media/a.mkv")]);
        let cfg = settings(false);

        let outcome = Migrator::new(&src, &tgt, &cfg).run().await.unwrap();

        assert_eq!(outcome.plan.collision_count(), 1);
        assert_eq!(tgt.writes.lock().unwrap()[0].1, vec![TargetItemId("3".into())]);
    }
}
