//!
//! src/report.rs  Oct 16th, 2026
//!
//! Summary of a migration plan for the terminal, either as text or as
//! JSON. Formatting only; nothing in here touches a catalog.
//!

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::ReportFormat;
use crate::errors::MigrateError;
use crate::path;
use crate::plan::{MigrationOutcome, MigrationPlan, UnmatchReason};

#[derive(Debug, Clone, Serialize)]
pub struct UnmatchedEntry {
    pub sequence_index: usize,
    pub title: String,
    pub path: String,
    pub reason: UnmatchReason,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReasonCounts {
    pub not_found: usize,
    pub path_collision: usize,
    pub invalid_path: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppliedSummary {
    pub playlist_id: String,
    pub playlist_name: String,
    pub written: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub playlist: String,
    pub generated_at: DateTime<Utc>,
    pub total: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub by_reason: ReasonCounts,
    pub unmatched_items: Vec<UnmatchedEntry>,
    pub collided_paths: Vec<String>,
    pub applied: Option<AppliedSummary>,
    pub write_failed: bool,
}

pub fn summarize(plan: &MigrationPlan, playlist: &str) -> MigrationReport {
    let unmatched_items: Vec<UnmatchedEntry> = plan
        .unmatched()
        .map(|(source, reason)| UnmatchedEntry {
            sequence_index: source.sequence_index,
            title: source.title.clone(),
            path: source.absolute_path.clone(),
            reason,
        })
        .collect();

    // one line per index key, however the source spelled the path
    let collided_paths: BTreeSet<String> = unmatched_items
        .iter()
        .filter(|u| u.reason == UnmatchReason::PathCollision)
        .map(|u| match path::normalize(&u.path) {
            Ok(key) => key.to_string(),
            Err(_) => u.path.clone(),
        })
        .collect();

    MigrationReport {
        playlist: playlist.to_string(),
        generated_at: Utc::now(),
        total: plan.total(),
        matched: plan.matched_count(),
        unmatched: plan.unmatched_count(),
        by_reason: ReasonCounts {
            not_found: plan.count_for(UnmatchReason::NotFound),
            path_collision: plan.count_for(UnmatchReason::PathCollision),
            invalid_path: plan.count_for(UnmatchReason::InvalidPath),
        },
        unmatched_items,
        collided_paths: collided_paths.into_iter().collect(),
        applied: None,
        write_failed: false,
    }
}

/// Second pass once the playlist has been written
pub fn confirm(mut report: MigrationReport, outcome: &MigrationOutcome) -> MigrationReport {
    if let (true, Some(id)) = (outcome.applied, outcome.target_playlist_id.as_ref()) {
        report.applied = Some(AppliedSummary {
            playlist_id: id.clone(),
            playlist_name: outcome.target_playlist_name.clone(),
            written: outcome.written(),
        });
    }
    report
}

/// The plan was complete but writing it to the target failed
pub fn mark_failed(mut report: MigrationReport) -> MigrationReport {
    report.write_failed = true;
    report
}

impl MigrationReport {
    pub fn nothing_matched(&self) -> bool {
        self.total > 0 && self.matched == 0
    }

    pub fn render(&self, format: ReportFormat) -> Result<String, MigrateError> {
        match format {
            ReportFormat::Text => Ok(self.to_string()),
            ReportFormat::Json => Ok(serde_json::to_string_pretty(self)?),
        }
    }
}

impl fmt::Display for MigrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nothing_matched() {
            writeln!(
                f,
                "WARNING: none of the {} items in '{}' matched the target catalog",
                self.total, self.playlist
            )?;
            writeln!(f)?;
        }

        writeln!(f, "Playlist:  {}", self.playlist)?;
        writeln!(f, "Total:     {}", self.total)?;
        writeln!(f, "Matched:   {}", self.matched)?;
        writeln!(f, "Unmatched: {}", self.unmatched)?;
        if self.unmatched > 0 {
            writeln!(f, "  not found:      {}", self.by_reason.not_found)?;
            writeln!(f, "  path collision: {}", self.by_reason.path_collision)?;
            writeln!(f, "  invalid path:   {}", self.by_reason.invalid_path)?;
        }

        if !self.unmatched_items.is_empty() {
            writeln!(f)?;
            writeln!(f, "Unmatched items:")?;
            for u in &self.unmatched_items {
                writeln!(
                    f,
                    "  #{:<4} {} [{}] {}",
                    u.sequence_index,
                    u.title,
                    u.reason.label(),
                    if u.path.is_empty() { "<no path>" } else { &u.path }
                )?;
            }
        }

        if !self.collided_paths.is_empty() {
            writeln!(f)?;
            writeln!(f, "Paths shared by several target items:")?;
            for p in &self.collided_paths {
                writeln!(f, "  {p}")?;
            }
        }

        writeln!(f)?;
        match &self.applied {
            Some(a) => write!(
                f,
                "Wrote playlist '{}' (id {}) with {} items",
                a.playlist_name, a.playlist_id, a.written
            ),
            None if self.write_failed => write!(f, "Playlist was not written, see the error below"),
            None => write!(f, "Dry run: target catalog left untouched"),
        }
    }
}
