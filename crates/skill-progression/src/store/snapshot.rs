//! Snapshot persistence — save and load a [`MemoryStore`] as one JSON file.
//!
//! File format:
//! ```json
//! {
//!     "version": 1,
//!     "state": { "nodes": [...], "edges": [...], ..., "events": [...] }
//! }
//! ```
//!
//! Saves go through a temporary sibling file and a rename, so a crash
//! mid-write never leaves a truncated state file behind.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::badge::{BadgeDefinition, IssuedBadge};
use crate::certification::{CertificationDefinition, IssuedCertification};
use crate::error::{ProgressionError, Result};
use crate::graph::{DependencyEdge, Node};
use crate::ledger::LedgerEvent;
use crate::progress::{ActivityOutcome, CourseProgressSummary, NodeProgress};

use super::memory::MemoryStore;

// ── File format constants ─────────────────────────────────────────────────────

const STATE_FILE_VERSION: u32 = 1;

// ── On-disk structures ────────────────────────────────────────────────────────

/// Every table, as plain record lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<DependencyEdge>,
    #[serde(default)]
    pub progress: Vec<NodeProgress>,
    #[serde(default)]
    pub summaries: Vec<CourseProgressSummary>,
    #[serde(default)]
    pub outcomes: Vec<ActivityOutcome>,
    #[serde(default)]
    pub badge_definitions: Vec<BadgeDefinition>,
    #[serde(default)]
    pub badges: Vec<IssuedBadge>,
    #[serde(default)]
    pub certification_definitions: Vec<CertificationDefinition>,
    #[serde(default)]
    pub certifications: Vec<IssuedCertification>,
    #[serde(default)]
    pub events: Vec<LedgerEvent>,
}

/// Wrapper written to disk.
#[derive(Debug, Serialize, Deserialize)]
struct StateFile {
    /// Format version number.
    version: u32,
    /// The stored tables.
    state: Snapshot,
}

impl MemoryStore {
    /// Load a store from `path`, or start empty if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns `ProgressionError::InvalidFileFormat` if the file cannot be
    /// parsed or has an unsupported version, or `ProgressionError::Io` for
    /// other filesystem errors.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("no state file at {}, starting empty", path.display());
            return Ok(Self::new());
        }

        let bytes = std::fs::read(path)?;
        let file: StateFile = serde_json::from_slice(&bytes).map_err(|e| {
            ProgressionError::InvalidFileFormat(format!(
                "failed to parse state file {}: {e}",
                path.display()
            ))
        })?;

        if file.version != STATE_FILE_VERSION {
            return Err(ProgressionError::InvalidFileFormat(format!(
                "unsupported state file version {} (expected {STATE_FILE_VERSION})",
                file.version
            )));
        }

        Ok(Self::from_snapshot(file.state))
    }

    /// Persist the store to `path`, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns `ProgressionError::SerializationError` if JSON serialization
    /// fails, or `ProgressionError::Io` for filesystem errors.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = StateFile {
            version: STATE_FILE_VERSION,
            state: self.snapshot(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| ProgressionError::SerializationError(e.to_string()))?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json.as_bytes())?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
