// File: markdown.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use anyhow::Result;

use super::{injection_label, payload_label, ReportData, ReportGenerator};
use crate::probe::Confidence;

pub struct MarkdownGenerator;

impl MarkdownGenerator {
    pub fn new() -> Self {
        Self
    }

    fn confidence_badge(&self, confidence: Confidence) -> &str {
        match confidence {
            Confidence::High => "![High](https://img.shields.io/badge/HIGH-red?style=flat-square)",
            Confidence::Medium => {
                "![Medium](https://img.shields.io/badge/MEDIUM-orange?style=flat-square)"
            }
            Confidence::Low => "![Low](https://img.shields.io/badge/LOW-blue?style=flat-square)",
        }
    }

    fn escape_markdown(&self, text: &str) -> String {
        text.replace('|', "\\|")
            .replace('*', "\\*")
            .replace('_', "\\_")
            .replace('`', "\\`")
            .replace('#', "\\#")
            .replace('[', "\\[")
            .replace(']', "\\]")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('\n', " ")
    }
}

impl ReportGenerator for MarkdownGenerator {
    fn generate(&self, data: &ReportData) -> Result<String> {
        let mut md = String::new();

        md.push_str(&format!("# {}\n\n", data.title));
        md.push_str(&format!(
            "**Target:** {} | **Generated:** {} | **Tool:** rsweep v{}\n\n",
            self.escape_markdown(&data.target),
            data.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
            env!("CARGO_PKG_VERSION")
        ));
        md.push_str("---\n\n");

        md.push_str("## Summary\n\n");
        md.push_str("| Metric | Value |\n");
        md.push_str("|--------|-------|\n");
        md.push_str(&format!("| Probes Attempted | {} |\n", data.summary.attempted));
        md.push_str(&format!("| Succeeded | {} |\n", data.summary.succeeded));
        md.push_str(&format!("| Failed | {} |\n", data.summary.failed));
        md.push_str(&format!("| Skipped | {} |\n", data.summary.skipped));
        md.push_str(&format!("| Findings | {} |\n", data.summary.total_findings));
        md.push_str(&format!(
            "| Duration | {:.1}s |\n",
            data.summary.duration_secs
        ));
        if data.summary.cancelled {
            md.push_str("| Status | cancelled, partial results |\n");
        }
        md.push('\n');

        if !data.summary.findings_by_kind.is_empty() {
            md.push_str("### Findings by Kind\n\n");
            for (kind, count) in &data.summary.findings_by_kind {
                md.push_str(&format!("- **{}**: {}\n", kind, count));
            }
            md.push('\n');
        }

        md.push_str("## Findings\n\n");
        if data.findings.is_empty() {
            md.push_str("_No findings._\n\n");
        } else {
            md.push_str("| Confidence | Kind | URL | Injection | Payload | Evidence |\n");
            md.push_str("|------------|------|-----|-----------|---------|----------|\n");
            for finding in &data.findings {
                md.push_str(&format!(
                    "| {} | {} | {} | {} | {} | {}: {} |\n",
                    self.confidence_badge(finding.verdict.confidence),
                    finding.spec.kind(),
                    self.escape_markdown(&finding.url),
                    self.escape_markdown(&injection_label(finding)),
                    self.escape_markdown(&payload_label(finding)),
                    finding.verdict.evidence.label(),
                    self.escape_markdown(&finding.verdict.evidence.detail()),
                ));
            }
            md.push('\n');
        }

        if !data.failed.is_empty() {
            md.push_str("## Failed Probes\n\n");
            md.push_str("| Probe | Error | Attempts |\n");
            md.push_str("|-------|-------|----------|\n");
            for failed in &data.failed {
                md.push_str(&format!(
                    "| {} | {} | {} |\n",
                    self.escape_markdown(&failed.probe),
                    failed.error,
                    failed.attempts
                ));
            }
            md.push('\n');
        }

        Ok(md)
    }
}
