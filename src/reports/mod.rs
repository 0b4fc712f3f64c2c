// File: mod.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::probe::Finding;
use crate::state::{AttemptOutcome, ScanState};

pub mod csv;
pub mod json;
pub mod markdown;
pub mod text;


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportData {
    pub generated_at: DateTime<Utc>,
    pub title: String,
    pub target: String,
    pub summary: ReportSummary,
    pub findings: Vec<Finding>,
    pub failed: Vec<FailedProbe>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total_findings: usize,
    pub findings_by_kind: BTreeMap<String, usize>,
    pub findings_by_confidence: BTreeMap<String, usize>,
    pub duration_secs: f64,
    pub cancelled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedProbe {
    pub probe: String,
    pub error: String,
    pub message: String,
    pub attempts: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    Text,
    Json,
    Csv,
    Markdown,
}

impl ReportFormat {
    /// Guesses the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "txt" | "text" | "log" => Some(Self::Text),
            "json" => Some(Self::Json),
            "csv" => Some(Self::Csv),
            "md" | "markdown" => Some(Self::Markdown),
            _ => None,
        }
    }
}

pub trait ReportGenerator {
    fn generate(&self, data: &ReportData) -> Result<String>;
}

pub struct ReportEngine;

impl Default for ReportEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn generate_report<P: AsRef<Path>>(
        &self,
        format: ReportFormat,
        data: &ReportData,
        output_path: Option<P>,
    ) -> Result<String> {
        let generator = self.get_generator(format);
        let content = generator.generate(data)?;

        if let Some(path) = output_path {
            std::fs::write(path, &content)?;
        }

        Ok(content)
    }

    pub fn create_report_data(
        &self,
        target: &str,
        state: &ScanState,
        duration: Duration,
        cancelled: bool,
    ) -> ReportData {
        let failed = state
            .failed()
            .filter_map(|record| match &record.outcome {
                AttemptOutcome::FailedExhausted { kind, message } => Some(FailedProbe {
                    probe: record.id.to_string(),
                    error: kind.to_string(),
                    message: message.clone(),
                    attempts: record.attempts,
                }),
                _ => None,
            })
            .collect::<Vec<_>>();

        let mut findings_by_kind = BTreeMap::new();
        let mut findings_by_confidence = BTreeMap::new();
        for finding in state.findings() {
            *findings_by_kind
                .entry(finding.spec.kind().to_string())
                .or_insert(0) += 1;
            *findings_by_confidence
                .entry(finding.verdict.confidence.to_string())
                .or_insert(0) += 1;
        }

        let summary = ReportSummary {
            attempted: state.attempted().len(),
            succeeded: state.succeeded_count(),
            failed: failed.len(),
            skipped: state.skipped().count(),
            total_findings: state.findings().len(),
            findings_by_kind,
            findings_by_confidence,
            duration_secs: duration.as_secs_f64(),
            cancelled,
        };

        ReportData {
            generated_at: Utc::now(),
            title: "rsweep Scan Report".to_string(),
            target: target.to_string(),
            summary,
            findings: state.findings().to_vec(),
            failed,
        }
    }

    fn get_generator(&self, format: ReportFormat) -> Box<dyn ReportGenerator> {
        match format {
            ReportFormat::Text => Box::new(text::TextGenerator::new()),
            ReportFormat::Json => Box::new(json::JsonGenerator::new()),
            ReportFormat::Csv => Box::new(csv::CsvGenerator::new()),
            ReportFormat::Markdown => Box::new(markdown::MarkdownGenerator::new()),
        }
    }
}

/// Where a finding was injected, for table columns.
pub(crate) fn injection_label(finding: &Finding) -> String {
    match finding.spec.injection() {
        Some(injection) => injection.point().to_string(),
        None => String::new(),
    }
}

pub(crate) fn payload_label(finding: &Finding) -> String {
    match finding.spec.injection() {
        Some(injection) => injection.payload().to_string(),
        None => String::new(),
    }
}
