//!
//! src/engine.rs  Oct 16th, 2026
//!
//! Resolves each source playlist entry against the target path index.
//! Pure function of its inputs: one result per source item, in source
//! order, no I/O.
//!

use tracing::debug;

use crate::index::{Lookup, PathIndex};
use crate::path;
use crate::plan::{MatchResult, MigrationPlan, UnmatchReason};
use crate::types::SourceItem;

pub fn match_items(sources: &[SourceItem], index: &PathIndex) -> MigrationPlan {
    let mut ordered: Vec<&SourceItem> = sources.iter().collect();
    // stable, so equal indices keep the order they were fetched in
    ordered.sort_by_key(|s| s.sequence_index);

    let mut plan = MigrationPlan::with_capacity(ordered.len());
    for source in ordered {
        let result = match_one(source, index);
        if let MatchResult::Unmatched { reason, .. } = &result {
            debug!(
                seq = source.sequence_index,
                path = %source.absolute_path,
                reason = reason.label(),
                "match.miss"
            );
        }
        plan.push(result);
    }

    debug!(
        total = plan.total(),
        matched = plan.matched_count(),
        unmatched = plan.unmatched_count(),
        "match.done"
    );
    plan
}

fn match_one(source: &SourceItem, index: &PathIndex) -> MatchResult {
    let key = match path::normalize(&source.absolute_path) {
        Ok(key) => key,
        Err(_) => {
            return MatchResult::Unmatched {
                source: source.clone(),
                reason: UnmatchReason::InvalidPath,
            };
        }
    };

    match index.lookup(&key) {
        Lookup::Found(target) => MatchResult::Matched {
            source: source.clone(),
            target: target.clone(),
        },
        Lookup::Collision(_) => MatchResult::Unmatched {
            source: source.clone(),
            reason: UnmatchReason::PathCollision,
        },
        Lookup::NotFound => MatchResult::Unmatched {
            source: source.clone(),
            reason: UnmatchReason::NotFound,
        },
    }
}
