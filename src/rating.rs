//! Site rating counter: one vote per client per UTC day.
//!
//! State lives in two JSON documents inside the data directory:
//!
//! * `ratings.json`: running totals ([`RatingSummary`])
//! * `votes.json`: client key → date of that client's last vote
//!
//! Clients are identified by the SHA-256 of their address; raw addresses are
//! never written to disk and logs carry only a short prefix of the digest.
//!
//! ## Concurrency
//!
//! Every read-modify-write cycle holds an async mutex, so within one process
//! votes are applied one at a time. Each document is replaced atomically
//! (temp file in the same directory, then rename), so a crash mid-write
//! leaves the previous version intact. Separate processes sharing one data
//! directory are not coordinated.

use crate::error::RatingError;
use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const SUMMARY_FILE: &str = "ratings.json";
pub const VOTES_FILE: &str = "votes.json";

/// Persisted running totals.
///
/// Invariant: `total_score <= 5 * total_votes`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingSummary {
    pub total_votes: u64,
    pub total_score: u64,
}

impl RatingSummary {
    pub fn snapshot(&self) -> RatingSnapshot {
        let average = if self.total_votes == 0 {
            0.0
        } else {
            self.total_score as f64 / self.total_votes as f64
        };
        RatingSnapshot {
            average,
            count: self.total_votes,
        }
    }
}

/// What `/rate` reports back.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingSnapshot {
    pub average: f64,
    pub count: u64,
}

type VoteLog = BTreeMap<String, NaiveDate>;

/// File-backed vote counter.
#[derive(Debug)]
pub struct RatingStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl RatingStore {
    /// Open (creating if needed) the store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, RatingError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| RatingError::Storage {
            path: dir.clone(),
            source,
        })?;
        info!("Rating store at {}", dir.display());
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    /// Current average and vote count.
    pub async fn summary(&self) -> Result<RatingSnapshot, RatingError> {
        let _guard = self.lock.lock().await;
        let summary: RatingSummary = read_document(&self.dir.join(SUMMARY_FILE))?;
        Ok(summary.snapshot())
    }

    /// Record one vote of `rating` (1–5) from `client_id` on `today`.
    ///
    /// # Errors
    /// * [`RatingError::InvalidRating`] — rating outside `1..=5`
    /// * [`RatingError::AlreadyVotedToday`] — the client's last vote is dated `today`
    /// * [`RatingError::Storage`] / [`RatingError::Corrupt`] — the documents
    ///   could not be read or replaced
    pub async fn record_vote(
        &self,
        client_id: &str,
        rating: i64,
        today: NaiveDate,
    ) -> Result<RatingSnapshot, RatingError> {
        if !(1..=5).contains(&rating) {
            return Err(RatingError::InvalidRating(rating));
        }
        let key = client_key(client_id);

        let _guard = self.lock.lock().await;
        let summary_path = self.dir.join(SUMMARY_FILE);
        let votes_path = self.dir.join(VOTES_FILE);

        let mut votes: VoteLog = read_document(&votes_path)?;
        if votes.get(&key) == Some(&today) {
            warn!("Duplicate vote from client {} on {}", short_key(&key), today);
            return Err(RatingError::AlreadyVotedToday);
        }

        let mut summary: RatingSummary = read_document(&summary_path)?;
        summary.total_votes += 1;
        summary.total_score += rating as u64;
        votes.insert(key.clone(), today);

        // Vote log first: a failed summary write must not allow a second vote.
        write_document(&votes_path, &votes)?;
        write_document(&summary_path, &summary)?;

        let snapshot = summary.snapshot();
        info!(
            "Vote {} from client {} → average {:.2} over {} votes",
            rating,
            short_key(&key),
            snapshot.average,
            snapshot.count
        );
        Ok(snapshot)
    }
}

/// Hex SHA-256 of a client identifier.
pub fn client_key(client_id: &str) -> String {
    format!("{:x}", Sha256::digest(client_id.as_bytes()))
}

fn short_key(key: &str) -> &str {
    key.get(..8).unwrap_or(key)
}

// ── Document I/O ─────────────────────────────────────────────────────────

/// Read a JSON document; a missing file reads as the default value.
fn read_document<T: DeserializeOwned + Default>(path: &Path) -> Result<T, RatingError> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("{} not found, starting empty", path.display());
            return Ok(T::default());
        }
        Err(source) => {
            return Err(RatingError::Storage {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_slice(&raw).map_err(|e| RatingError::Corrupt {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

/// Replace `path` atomically with the JSON encoding of `value`.
fn write_document<T: Serialize>(path: &Path, value: &T) -> Result<(), RatingError> {
    let storage = |source| RatingError::Storage {
        path: path.to_path_buf(),
        source,
    };
    let dir = path.parent().unwrap_or_else(|| Path::new("."));

    let body = serde_json::to_vec_pretty(value).map_err(|e| RatingError::Corrupt {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(storage)?;
    tmp.write_all(&body).map_err(storage)?;
    tmp.as_file().sync_all().map_err(storage)?;
    tmp.persist(path).map_err(|e| storage(e.error))?;
    Ok(())
}
