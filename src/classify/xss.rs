// File: xss.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025
// - Volker Schwaberow <volker@schwaberow.de>

use super::ClassifyContext;
use crate::errors::ScanResult;
use crate::probe::{Confidence, Evidence, ProbeResult, ProbeSpec, Verdict, XssContext};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

static EVENT_HANDLER: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r"\bon[a-z]+\s*=")
        .case_insensitive(true)
        .build()
        .unwrap()
});

static TAG_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[A-Za-z/!]").unwrap());

/// Elements whose content the browser never parses as markup.
const RAW_TEXT_ELEMENTS: &[&str] = &["textarea", "title", "style", "noscript", "xmp"];

/// Script sinks that turn a string into markup or code.
static DOM_SINKS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"document\.write(?:ln)?\s*\(",
        r"\.(?:inner|outer)HTML\s*\+?=",
        r"\.insertAdjacentHTML\s*\(",
        r"\beval\s*\(",
        r"\bset(?:Timeout|Interval)\s*\(",
        r"\bFunction\s*\(",
        r"\blocation(?:\.href)?\s*=[^=]",
        r"\bwindow\.open\s*\(",
        r"\.src\s*=[^=]",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

/// Values a visitor's URL, referrer or window name can control.
static DOM_SOURCES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\blocation\b|document\.(?:URL|documentURI|baseURI|referrer|cookie)|window\.name")
        .unwrap()
});

const SNIPPET_RADIUS: usize = 60;
const SINK_SNIPPET_CHARS: usize = 200;

fn inside(prefix: &str, open: &str, close: &str) -> bool {
    match prefix.rfind(open) {
        Some(opened) => prefix.rfind(close).map_or(true, |closed| closed < opened),
        None => false,
    }
}

/// Quote character of the attribute value that `tag` ends inside, if any.
fn open_quote(tag: &str) -> Option<char> {
    let mut quote = None;
    for c in tag.chars() {
        match quote {
            None if c == '"' || c == '\'' => quote = Some(c),
            Some(q) if c == q => quote = None,
            _ => {}
        }
    }
    quote
}

/// Where in the document a reflection starting after `prefix` lands, plus
/// the quote that must be closed to leave an attribute value.
/// `None` means a region that is never executed.
fn reflection_context(prefix: &str) -> Option<(XssContext, Option<char>)> {
    let lower = prefix.to_ascii_lowercase();

    if inside(&lower, "<!--", "-->") {
        return None;
    }

    if let Some(lt) = lower.rfind('<') {
        let closed = lower.rfind('>').map_or(false, |gt| gt > lt);
        let starts_tag = lower[lt + 1..]
            .chars()
            .next()
            .map_or(false, |c| c.is_ascii_alphabetic());
        if !closed && starts_tag {
            return Some((XssContext::Attribute, open_quote(&lower[lt + 1..])));
        }
    }

    for element in RAW_TEXT_ELEMENTS {
        if inside(&lower, &format!("<{}", element), &format!("</{}", element)) {
            return None;
        }
    }

    if inside(&lower, "<script", "</script") {
        return Some((XssContext::Script, None));
    }

    Some((XssContext::HtmlBody, None))
}

fn executable(context: XssContext, quote: Option<char>, payload: &str) -> bool {
    match context {
        XssContext::Script => true,
        XssContext::Attribute => {
            if payload.to_ascii_lowercase().contains("javascript:") {
                return true;
            }
            let escapes = payload.contains('>') || EVENT_HANDLER.is_match(payload);
            match quote {
                Some(quote) => payload.contains(quote) && escapes,
                None => escapes,
            }
        }
        XssContext::HtmlBody => TAG_OPEN.is_match(payload),
        XssContext::DomSink => false,
    }
}

fn snippet(body: &str, start: usize, len: usize) -> String {
    let mut from = start.saturating_sub(SNIPPET_RADIUS);
    while !body.is_char_boundary(from) {
        from -= 1;
    }
    let mut to = (start + len + SNIPPET_RADIUS).min(body.len());
    while !body.is_char_boundary(to) {
        to += 1;
    }
    body[from..to].replace(['\r', '\n'], " ")
}

/// First sink whose argument or right-hand side reads a DOM source, as the
/// statement that does it.
fn dom_sink(body: &str) -> Option<String> {
    DOM_SINKS
        .iter()
        .flat_map(|sink| sink.find_iter(body))
        .find_map(|sink| {
            let rest = &body[sink.end()..];
            let end = rest.find([';', '\n', '<']).unwrap_or(rest.len());
            DOM_SOURCES
                .is_match(&rest[..end])
                .then(|| body[sink.start()..sink.end() + end].trim().to_string())
        })
        .map(|statement| statement.chars().take(SINK_SNIPPET_CHARS).collect())
}

/// Looks for the payload reflected verbatim in a place where the browser
/// would run it. HTML-encoded or URL-encoded reflections do not count.
/// A probe without an injection checks the page for DOM XSS sinks instead.
pub fn classify(
    spec: &ProbeSpec,
    result: &ProbeResult,
    _context: &ClassifyContext,
) -> ScanResult<Option<Verdict>> {
    let Some(injection) = spec.injection() else {
        return Ok(dom_sink(result.body()).map(|snippet| {
            Verdict::new(
                Evidence::Xss {
                    context: XssContext::DomSink,
                    snippet,
                },
                Confidence::Medium,
            )
        }));
    };
    let payload = injection.payload();
    if payload.is_empty() {
        return Ok(None);
    }

    let body = result.body();
    for (offset, matched) in body.match_indices(payload) {
        let Some((context, quote)) = reflection_context(&body[..offset]) else {
            continue;
        };
        if !executable(context, quote, matched) {
            continue;
        }

        let confidence = if context == XssContext::Script
            || EVENT_HANDLER.is_match(payload)
            || payload.to_ascii_lowercase().contains("<script")
        {
            Confidence::High
        } else {
            Confidence::Medium
        };

        return Ok(Some(Verdict::new(
            Evidence::Xss {
                context,
                snippet: snippet(body, offset, matched.len()),
            },
            confidence,
        )));
    }

    Ok(None)
}
