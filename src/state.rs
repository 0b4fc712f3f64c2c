// File: state.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025
// - Volker Schwaberow <volker@schwaberow.de>

use crate::errors::{ScanError, ScanResult, TransportErrorKind};
use crate::probe::{Finding, ProbeId};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const CHECKPOINT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Succeeded,
    FailedExhausted {
        kind: TransportErrorKind,
        message: String,
    },
    /// No request could be built for the spec.
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub id: ProbeId,
    pub outcome: AttemptOutcome,
    pub attempts: u32,
}

/// Attempted identities plus the findings they produced. Owned by the
/// engine's dispatch loop, which is the only writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanState {
    version: u32,
    target_fingerprint: String,
    attempted: Vec<AttemptRecord>,
    findings: Vec<Finding>,
    #[serde(skip)]
    index: HashSet<ProbeId>,
    #[serde(skip)]
    reported: HashSet<ProbeId>,
}

impl ScanState {
    pub fn new(target_fingerprint: impl Into<String>) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            target_fingerprint: target_fingerprint.into(),
            attempted: Vec::new(),
            findings: Vec::new(),
            index: HashSet::new(),
            reported: HashSet::new(),
        }
    }

    pub fn target_fingerprint(&self) -> &str {
        &self.target_fingerprint
    }

    pub fn is_attempted(&self, id: &ProbeId) -> bool {
        self.index.contains(id)
    }

    pub fn record_attempt(
        &mut self,
        id: ProbeId,
        outcome: AttemptOutcome,
        attempts: u32,
    ) -> ScanResult<()> {
        if !self.index.insert(id.clone()) {
            return Err(ScanError::State(format!("{} was already attempted", id)));
        }
        self.attempted.push(AttemptRecord {
            id,
            outcome,
            attempts,
        });
        Ok(())
    }

    pub fn append_finding(&mut self, finding: Finding) -> ScanResult<()> {
        let id = finding.id();
        if !self.index.contains(&id) {
            return Err(ScanError::State(format!(
                "finding for {} has no attempt record",
                id
            )));
        }
        if !self.reported.insert(id.clone()) {
            return Err(ScanError::State(format!("{} already has a finding", id)));
        }
        self.findings.push(finding);
        Ok(())
    }

    pub fn attempted(&self) -> &[AttemptRecord] {
        &self.attempted
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn failed(&self) -> impl Iterator<Item = &AttemptRecord> {
        self.attempted
            .iter()
            .filter(|r| matches!(r.outcome, AttemptOutcome::FailedExhausted { .. }))
    }

    pub fn skipped(&self) -> impl Iterator<Item = &AttemptRecord> {
        self.attempted
            .iter()
            .filter(|r| matches!(r.outcome, AttemptOutcome::Skipped { .. }))
    }

    pub fn succeeded_count(&self) -> usize {
        self.attempted
            .iter()
            .filter(|r| r.outcome == AttemptOutcome::Succeeded)
            .count()
    }

    /// Rebuilds the lookup sets after deserialization and checks the
    /// invariants a checkpoint must satisfy.
    fn reindex(&mut self) -> ScanResult<()> {
        self.index.clear();
        self.reported.clear();
        for record in &self.attempted {
            if !self.index.insert(record.id.clone()) {
                return Err(ScanError::State(format!(
                    "checkpoint lists {} more than once",
                    record.id
                )));
            }
        }
        for finding in &self.findings {
            let id = finding.id();
            if !self.index.contains(&id) {
                return Err(ScanError::State(format!(
                    "checkpoint finding for {} has no attempt record",
                    id
                )));
            }
            if !self.reported.insert(id.clone()) {
                return Err(ScanError::State(format!(
                    "checkpoint lists a finding for {} more than once",
                    id
                )));
            }
        }
        Ok(())
    }
}

/// JSON checkpoint file, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, state: &ScanState) -> ScanResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut temp = NamedTempFile::new_in(&dir)?;
        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            serde_json::to_writer(&mut writer, state)?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| ScanError::Io(e.error))?;
        debug!(
            "Checkpoint saved to {} ({} attempted, {} findings)",
            self.path.display(),
            state.attempted.len(),
            state.findings.len()
        );
        Ok(())
    }

    /// Every failure here is a `StateError`: a scan must not start from a
    /// checkpoint it cannot trust.
    pub fn load(&self, expected_fingerprint: &str) -> ScanResult<ScanState> {
        let file = File::open(&self.path).map_err(|e| {
            ScanError::State(format!(
                "cannot open checkpoint {}: {}",
                self.path.display(),
                e
            ))
        })?;
        let mut state: ScanState = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            ScanError::State(format!(
                "checkpoint {} is corrupt: {}",
                self.path.display(),
                e
            ))
        })?;

        if state.version != CHECKPOINT_VERSION {
            return Err(ScanError::State(format!(
                "checkpoint version {} is not supported (expected {})",
                state.version, CHECKPOINT_VERSION
            )));
        }
        if state.target_fingerprint != expected_fingerprint {
            return Err(ScanError::State(format!(
                "checkpoint {} was taken for a different target",
                self.path.display()
            )));
        }
        state.reindex()?;
        debug!(
            "Loaded checkpoint {} ({} attempted, {} findings)",
            self.path.display(),
            state.attempted.len(),
            state.findings.len()
        );
        Ok(state)
    }
}
