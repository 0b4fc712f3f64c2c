// File: discovery.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025
// - Volker Schwaberow <volker@schwaberow.de>

use super::ClassifyContext;
use crate::errors::ScanResult;
use crate::probe::{Confidence, Evidence, ProbeResult, ProbeSpec, Verdict};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

static TITLE: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r"<title[^>]*>([^<]*)</title>")
        .case_insensitive(true)
        .build()
        .unwrap()
});

fn interesting(status: u16) -> Option<Confidence> {
    match status {
        200..=299 => Some(Confidence::High),
        301..=303 | 307 | 308 | 401 | 403 => Some(Confidence::Medium),
        500..=599 => Some(Confidence::Low),
        _ => None,
    }
}

pub fn page_title(body: &str) -> Option<String> {
    TITLE
        .captures(body)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty())
}

pub fn classify(
    _spec: &ProbeSpec,
    result: &ProbeResult,
    context: &ClassifyContext,
) -> ScanResult<Option<Verdict>> {
    let status = result.status();
    if status == 404 {
        return Ok(None);
    }
    if let Some(baseline) = context.soft404 {
        if result.size().abs_diff(baseline.size) <= context.soft404_tolerance {
            return Ok(None);
        }
    }
    let Some(confidence) = interesting(status) else {
        return Ok(None);
    };

    let location = if (300..400).contains(&status) {
        result.location().map(|l| l.to_string())
    } else {
        None
    };

    Ok(Some(Verdict::new(
        Evidence::Discovery {
            status,
            size: result.size(),
            title: page_title(result.body()),
            location,
        },
        confidence,
    )))
}
