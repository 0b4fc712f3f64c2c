// File: csv.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use anyhow::Result;

use super::{injection_label, payload_label, ReportData, ReportGenerator};

pub struct CsvGenerator;

impl CsvGenerator {
    pub fn new() -> Self {
        Self
    }

    fn escape_csv(&self, field: &str) -> String {
        if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
        {
            format!("\"{}\"", field.replace('"', "\"\""))
        } else {
            field.to_string()
        }
    }
}

impl ReportGenerator for CsvGenerator {
    fn generate(&self, data: &ReportData) -> Result<String> {
        let mut csv = String::new();

        csv.push_str("Kind,URL,Path,Injection_Point,Payload,Evidence,Confidence,Detail,Timestamp\n");

        for finding in &data.findings {
            csv.push_str(&format!(
                "{},{},{},{},{},{},{},{},{}\n",
                finding.spec.kind(),
                self.escape_csv(&finding.url),
                self.escape_csv(finding.spec.path()),
                self.escape_csv(&injection_label(finding)),
                self.escape_csv(&payload_label(finding)),
                self.escape_csv(&finding.verdict.evidence.label()),
                finding.verdict.confidence,
                self.escape_csv(&finding.verdict.evidence.detail()),
                finding.discovered_at.format("%Y-%m-%d %H:%M:%S"),
            ));
        }

        Ok(csv)
    }
}
