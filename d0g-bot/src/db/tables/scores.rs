//! Score ledger: per-reason entries and per-user totals.
//!
//! Entries live in `community:{id}:scores:{user}` (reason -> score) and totals
//! in `community:{id}:scorestotals` (user -> total). Both are written in the
//! same transaction so a total always equals the sum of that user's entries.

use super::super::keys;
use super::super::{Store, Tx};
use crate::error::{BotError, BotResult, ValidationError};

/// A key and the score accumulated against it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyScore {
    pub key: String,
    pub score: i64,
}

/// Result of a successful adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adjusted {
    pub score: i64,
    pub total: i64,
}

fn decode_score(raw: &[u8]) -> BotResult<i64> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| BotError::storage(format!("stored score is not an integer: {:?}", raw)))
}

fn encode_score(score: i64) -> Vec<u8> {
    score.to_string().into_bytes()
}

/// Read-or-default, add, write back
fn accumulate(tx: &Tx<'_>, bucket: &[u8], key: &[u8], delta: i64) -> BotResult<i64> {
    let current = match tx.get(bucket, key)? {
        Some(raw) => decode_score(&raw)?,
        None => 0,
    };
    let updated = current + delta;
    tx.put(bucket, key, &encode_score(updated))?;
    Ok(updated)
}

/// Sorted by score descending; `sort_by` is stable so equal scores keep scan order
fn sorted_scores(pairs: Vec<(Vec<u8>, Vec<u8>)>) -> BotResult<Vec<KeyScore>> {
    let mut scores = pairs
        .into_iter()
        .map(|(k, v)| {
            Ok(KeyScore {
                key: String::from_utf8_lossy(&k).into_owned(),
                score: decode_score(&v)?,
            })
        })
        .collect::<BotResult<Vec<_>>>()?;
    scores.sort_by(|a, b| b.score.cmp(&a.score));
    Ok(scores)
}

impl Store {
    /// Apply `delta` to `target`'s score for `reason` and to their total.
    ///
    /// Not idempotent: callers must not retry a failed adjustment blindly.
    pub fn adjust_score(
        &self,
        community: &str,
        actor: &str,
        target: &str,
        reason: &str,
        delta: i64,
    ) -> BotResult<Adjusted> {
        if actor == target {
            return Err(ValidationError::SelfRating.into());
        }
        if reason.is_empty() {
            return Err(ValidationError::MissingReason.into());
        }

        let scores_bucket = keys::scores_bucket(community, target);
        let totals_bucket = keys::totals_bucket(community);

        let adjusted = self.update(|tx| {
            let score = accumulate(tx, &scores_bucket, reason.as_bytes(), delta)?;
            let total = accumulate(tx, &totals_bucket, target.as_bytes(), delta)?;
            Ok(Adjusted { score, total })
        })?;

        log::debug!(
            "Store: adjusted {}/{} for {:?} by {} -> {} (total {})",
            community,
            target,
            reason,
            delta,
            adjusted.score,
            adjusted.total
        );
        Ok(adjusted)
    }

    /// All reasons `subject` has been scored for, highest first
    pub fn list_reasons(&self, community: &str, subject: &str) -> BotResult<Vec<KeyScore>> {
        let bucket = keys::scores_bucket(community, subject);
        let pairs = self.view(|tx| tx.scan(&bucket))?;
        sorted_scores(pairs)
    }

    /// Every user's total in the community, highest first
    pub fn list_totals(&self, community: &str) -> BotResult<Vec<KeyScore>> {
        let bucket = keys::totals_bucket(community);
        let pairs = self.view(|tx| tx.scan(&bucket))?;
        sorted_scores(pairs)
    }
}
