use serde::Serialize;

use crate::types::{SourceItem, TargetItem, TargetItemId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchReason {
    NotFound,
    PathCollision,
    InvalidPath,
}

impl UnmatchReason {
    pub fn label(&self) -> &'static str {
        match self {
            UnmatchReason::NotFound => "not found",
            UnmatchReason::PathCollision => "path collision",
            UnmatchReason::InvalidPath => "invalid path",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MatchResult {
    Matched { source: SourceItem, target: TargetItem },
    Unmatched { source: SourceItem, reason: UnmatchReason },
}

impl MatchResult {
    pub fn source(&self) -> &SourceItem {
        match self {
            MatchResult::Matched { source, .. } | MatchResult::Unmatched { source, .. } => source,
        }
    }

    pub fn target(&self) -> Option<&TargetItem> {
        match self {
            MatchResult::Matched { target, .. } => Some(target),
            MatchResult::Unmatched { .. } => None,
        }
    }
}

/// Ordered match outcome for one playlist, one entry per source item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationPlan {
    results: Vec<MatchResult>,
    matched: usize,
    not_found: usize,
    collisions: usize,
    invalid: usize,
}

impl MigrationPlan {
    pub(crate) fn with_capacity(n: usize) -> Self {
        Self { results: Vec::with_capacity(n), ..Self::default() }
    }

    pub(crate) fn push(&mut self, result: MatchResult) {
        match &result {
            MatchResult::Matched { .. } => self.matched += 1,
            MatchResult::Unmatched { reason, .. } => match reason {
                UnmatchReason::NotFound => self.not_found += 1,
                UnmatchReason::PathCollision => self.collisions += 1,
                UnmatchReason::InvalidPath => self.invalid += 1,
            },
        }
        self.results.push(result);
    }

    pub fn results(&self) -> &[MatchResult] {
        &self.results
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn matched_count(&self) -> usize {
        self.matched
    }

    pub fn unmatched_count(&self) -> usize {
        self.results.len() - self.matched
    }

    pub fn collision_count(&self) -> usize {
        self.collisions
    }

    pub fn count_for(&self, reason: UnmatchReason) -> usize {
        match reason {
            UnmatchReason::NotFound => self.not_found,
            UnmatchReason::PathCollision => self.collisions,
            UnmatchReason::InvalidPath => self.invalid,
        }
    }

    /// Target identifiers of matched entries, in source order
    pub fn matched_ids(&self) -> Vec<TargetItemId> {
        self.results
            .iter()
            .filter_map(MatchResult::target)
            .map(|t| t.id.clone())
            .collect()
    }

    pub fn unmatched(&self) -> impl Iterator<Item = (&SourceItem, UnmatchReason)> {
        self.results().iter().filter_map(|r| match r {
            MatchResult::Unmatched { source, reason } => Some((source, *reason)),
            MatchResult::Matched { .. } => None,
        })
    }

    /// Every source item failed to match
    pub fn nothing_matched(&self) -> bool {
        !self.results.is_empty() && self.matched == 0
    }
}

/// What a run ended with. `target_playlist_id` is set only when applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationOutcome {
    pub plan: MigrationPlan,
    // as the source catalog spells it, which may differ from the request
    pub source_playlist_name: String,
    pub applied: bool,
    pub target_playlist_id: Option<String>,
    pub target_playlist_name: String,
}

impl MigrationOutcome {
    pub fn written(&self) -> usize {
        if self.applied { self.plan.matched_count() } else { 0 }
    }
}
