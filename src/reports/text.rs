// File: text.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use anyhow::Result;

use super::{injection_label, ReportData, ReportGenerator};
use crate::probe::Confidence;

pub struct TextGenerator;

impl TextGenerator {
    pub fn new() -> Self {
        Self
    }

    fn format_confidence(&self, confidence: Confidence) -> &str {
        match confidence {
            Confidence::High => "[HIGH]  ",
            Confidence::Medium => "[MEDIUM]",
            Confidence::Low => "[LOW]   ",
        }
    }
}

impl ReportGenerator for TextGenerator {
    fn generate(&self, data: &ReportData) -> Result<String> {
        let mut output = String::new();
        let rule = "===============================================================================\n";

        output.push_str(rule);
        output.push_str(&format!(
            "                          {}\n",
            data.title.to_uppercase()
        ));
        output.push_str(rule);
        output.push_str(&format!("Target: {}\n", data.target));
        output.push_str(&format!(
            "Generated: {}\n",
            data.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        output.push_str(&format!("Tool: rsweep v{}\n", env!("CARGO_PKG_VERSION")));
        output.push_str(rule);
        output.push('\n');

        output.push_str("SUMMARY\n");
        output.push_str("-------\n");
        output.push_str(&format!(
            "Probes attempted:     {}\n",
            data.summary.attempted
        ));
        output.push_str(&format!(
            "Succeeded:            {}\n",
            data.summary.succeeded
        ));
        output.push_str(&format!("Failed:               {}\n", data.summary.failed));
        output.push_str(&format!("Skipped:              {}\n", data.summary.skipped));
        output.push_str(&format!(
            "Findings:             {}\n",
            data.summary.total_findings
        ));
        output.push_str(&format!(
            "Duration:             {:.1}s\n",
            data.summary.duration_secs
        ));
        if data.summary.cancelled {
            output.push_str("Status:               cancelled (partial results)\n");
        }
        output.push('\n');

        if !data.findings.is_empty() {
            output.push_str("FINDINGS\n");
            output.push_str("--------\n");
            for finding in &data.findings {
                let point = injection_label(finding);
                output.push_str(&format!(
                    "{} {:<9} {} {}\n",
                    self.format_confidence(finding.verdict.confidence),
                    finding.spec.kind(),
                    finding.verdict.evidence.label(),
                    finding.url
                ));
                if !point.is_empty() {
                    output.push_str(&format!("           injected via {}\n", point));
                }
                output.push_str(&format!(
                    "           {}\n",
                    finding.verdict.evidence.detail()
                ));
            }
            output.push('\n');
        }

        if !data.failed.is_empty() {
            output.push_str("FAILED PROBES\n");
            output.push_str("-------------\n");
            for failed in &data.failed {
                output.push_str(&format!(
                    "{} ({} after {} attempts): {}\n",
                    failed.probe, failed.error, failed.attempts, failed.message
                ));
            }
        }

        Ok(output)
    }
}
