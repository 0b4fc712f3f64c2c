// File: sqli.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025
// - Volker Schwaberow <volker@schwaberow.de>

use super::ClassifyContext;
use crate::errors::{ScanError, ScanResult};
use crate::probe::{
    Confidence, Evidence, ProbeResult, ProbeSpec, SqliEvidence, SqliTechnique, Verdict,
};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

fn pattern(source: &str) -> Regex {
    RegexBuilder::new(source)
        .case_insensitive(true)
        .build()
        .unwrap()
}

static ERROR_SIGNATURES: Lazy<Vec<(&str, Vec<Regex>)>> = Lazy::new(|| {
    vec![
        (
            "mysql",
            vec![
                pattern(r"SQL syntax.*MySQL"),
                pattern(r"Warning.*mysql_.*"),
                pattern(r"MySqlClient\."),
                pattern(r"mysql_fetch"),
                pattern(r"You have an error in your SQL syntax"),
                pattern(r"MySQL server version"),
                pattern(r"MariaDB server version"),
                pattern(r"got an error in conversation"),
            ],
        ),
        (
            "mssql",
            vec![
                pattern(r"Microsoft OLE DB Provider for SQL Server"),
                pattern(r"ODBC SQL Server Driver"),
                pattern(r"SQL Server.*Driver"),
                pattern(r"SQLServer JDBC Driver"),
                pattern(r"Incorrect syntax near"),
                pattern(r"Unclosed quotation mark"),
                pattern(r"Procedure or function"),
            ],
        ),
        (
            "postgres",
            vec![
                pattern(r"PostgreSQL.*ERROR"),
                pattern(r"Warning.*pg_.*"),
                pattern(r"valid PostgreSQL result"),
                pattern(r"Npgsql\."),
                pattern(r"PG::SyntaxError"),
                pattern(r"PostgreSQL query failed"),
                pattern(r"relation .* does not exist"),
            ],
        ),
        (
            "oracle",
            vec![
                pattern(r"ORA-\d{5}"),
                pattern(r"Oracle error"),
                pattern(r"Oracle.*Driver"),
                pattern(r"Warning.*oci_.*"),
                pattern(r"PLS-\d+"),
                pattern(r"SQL command not properly ended"),
            ],
        ),
        (
            "sqlite",
            vec![
                pattern(r"SQLite/JDBCDriver"),
                pattern(r"SQLite\.Exception"),
                pattern(r"System\.Data\.SQLite"),
                pattern(r"SQLite error"),
                pattern(r"no such table"),
                pattern(r"no such column"),
            ],
        ),
    ]
});

const HIGH_CONFIDENCE_ERRORS: &[&str] = &["sql syntax", "ora-", "unclosed quotation", "incorrect syntax"];

const MAX_MATCH_LEN: usize = 200;

/// First database error signature found in `body`, with the database it identifies.
pub fn detect_error(body: &str) -> Option<(&'static str, String)> {
    for (database, patterns) in ERROR_SIGNATURES.iter() {
        for regex in patterns {
            if let Some(found) = regex.find(body) {
                let matched: String = found.as_str().chars().take(MAX_MATCH_LEN).collect();
                return Some((*database, matched));
            }
        }
    }
    None
}

fn error_based(result: &ProbeResult) -> Option<Verdict> {
    let (database, matched) = detect_error(result.body())?;
    let lower = matched.to_lowercase();
    let confidence = if HIGH_CONFIDENCE_ERRORS.iter().any(|s| lower.contains(s)) {
        Confidence::High
    } else {
        Confidence::Medium
    };
    Some(Verdict::new(
        Evidence::Sqli {
            technique: SqliEvidence::ErrorBased,
            matched,
            database: Some(database.to_string()),
        },
        confidence,
    ))
}

fn boolean_based(result: &ProbeResult, context: &ClassifyContext) -> ScanResult<Option<Verdict>> {
    let control = result.control().ok_or_else(|| {
        ScanError::Classifier("boolean-based probe has no control response".to_string())
    })?;
    let size_delta = result.size().abs_diff(control.size);
    if result.status() == control.status && size_delta <= context.sqli_boolean_delta {
        return Ok(None);
    }
    let confidence = if result.status() != control.status {
        Confidence::High
    } else {
        Confidence::Medium
    };
    Ok(Some(Verdict::new(
        Evidence::Sqli {
            technique: SqliEvidence::BooleanBased,
            matched: format!(
                "true: {} / {} bytes, false: {} / {} bytes",
                result.status(),
                result.size(),
                control.status,
                control.size
            ),
            database: None,
        },
        confidence,
    )))
}

fn time_based(result: &ProbeResult, delay_secs: u64, context: &ClassifyContext) -> Option<Verdict> {
    let excess = result.latency().saturating_sub(context.baseline_latency);
    if excess < context.sqli_time_threshold {
        return None;
    }
    let confidence = if excess.as_secs() >= delay_secs
        && excess >= context.sqli_time_threshold * 2
    {
        Confidence::High
    } else {
        Confidence::Medium
    };
    Some(Verdict::new(
        Evidence::Sqli {
            technique: SqliEvidence::TimeBased,
            matched: format!(
                "{}ms against a {}ms baseline",
                result.latency().as_millis(),
                context.baseline_latency.as_millis()
            ),
            database: None,
        },
        confidence,
    ))
}

/// Error signatures are checked for every technique; the technique-specific
/// check runs only when no error leaked.
pub fn classify(
    spec: &ProbeSpec,
    result: &ProbeResult,
    context: &ClassifyContext,
) -> ScanResult<Option<Verdict>> {
    let technique = spec
        .technique()
        .ok_or_else(|| ScanError::Classifier("SQLi probe without a technique".to_string()))?;

    if let Some(verdict) = error_based(result) {
        return Ok(Some(verdict));
    }

    match technique {
        SqliTechnique::ErrorBased => Ok(None),
        SqliTechnique::BooleanBased { .. } => boolean_based(result, context),
        SqliTechnique::TimeBased { delay_secs } => Ok(time_based(result, *delay_secs, context)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{ControlSample, InjectionPoint};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::time::Duration;

    fn result(status: u16, body: &str, latency: Duration) -> ProbeResult {
        ProbeResult::new_with_all(
            status,
            body.len() as u64,
            latency,
            body.to_string(),
            "http://example.com/item?id=1".into(),
            None,
        )
    }

    fn spec(technique: SqliTechnique) -> ProbeSpec {
        ProbeSpec::sqli("item", InjectionPoint::Query("id".into()), "'", technique)
    }

    #[rstest]
    #[case("You have an error in your SQL syntax; check the manual", "mysql", Confidence::High)]
    #[case("Unclosed quotation mark after the character string", "mssql", Confidence::High)]
    #[case("ORA-01756: quoted string not properly terminated", "oracle", Confidence::High)]
    #[case("pg_query(): Query failed: Warning: pg_exec", "postgres", Confidence::Medium)]
    #[case("SQLite error: no such column: foo", "sqlite", Confidence::Medium)]
    fn test_error_signatures(
        #[case] body: &str,
        #[case] database: &str,
        #[case] confidence: Confidence,
    ) {
        let verdict = classify(
            &spec(SqliTechnique::ErrorBased),
            &result(500, body, Duration::from_millis(10)),
            &ClassifyContext::default(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(verdict.confidence, confidence);
        match verdict.evidence {
            Evidence::Sqli {
                technique,
                database: found,
                ..
            } => {
                assert_eq!(technique, SqliEvidence::ErrorBased);
                assert_eq!(found.as_deref(), Some(database));
            }
            other => panic!("unexpected evidence {:?}", other),
        }
    }

    #[test]
    fn test_clean_page_is_no_match() {
        let verdict = classify(
            &spec(SqliTechnique::ErrorBased),
            &result(200, "<html>Product 1</html>", Duration::from_millis(10)),
            &ClassifyContext::default(),
        )
        .unwrap();
        assert_eq!(verdict, None);
    }

    #[test]
    fn test_time_based_delay_over_baseline() {
        let context = ClassifyContext {
            baseline_latency: Duration::from_millis(120),
            sqli_time_threshold: Duration::from_secs(2),
            ..Default::default()
        };
        let technique = SqliTechnique::TimeBased { delay_secs: 5 };

        let slow = classify(
            &spec(technique.clone()),
            &result(200, "ok", Duration::from_millis(5200)),
            &context,
        )
        .unwrap()
        .unwrap();
        assert!(matches!(
            slow.evidence,
            Evidence::Sqli {
                technique: SqliEvidence::TimeBased,
                ..
            }
        ));
        assert_eq!(slow.confidence, Confidence::High);

        let fast = classify(
            &spec(technique),
            &result(200, "ok", Duration::from_millis(900)),
            &context,
        )
        .unwrap();
        assert_eq!(fast, None);
    }

    #[test]
    fn test_boolean_based_compares_against_control() {
        let technique = SqliTechnique::BooleanBased {
            false_payload: "' AND '1'='2' -- ".into(),
        };
        let context = ClassifyContext::default();

        let mut differing = result(200, &"x".repeat(4000), Duration::from_millis(10));
        differing.set_control(ControlSample {
            status: 200,
            size: 150,
            latency: Duration::from_millis(10),
        });
        let verdict = classify(&spec(technique.clone()), &differing, &context)
            .unwrap()
            .unwrap();
        assert!(matches!(
            verdict.evidence,
            Evidence::Sqli {
                technique: SqliEvidence::BooleanBased,
                ..
            }
        ));

        let mut same = result(200, &"x".repeat(4000), Duration::from_millis(10));
        same.set_control(ControlSample {
            status: 200,
            size: 3990,
            latency: Duration::from_millis(10),
        });
        assert_eq!(classify(&spec(technique), &same, &context).unwrap(), None);
    }

    #[test]
    fn test_boolean_without_control_is_classifier_error() {
        let technique = SqliTechnique::BooleanBased {
            false_payload: "x".into(),
        };
        let outcome = classify(
            &spec(technique),
            &result(200, "ok", Duration::from_millis(10)),
            &ClassifyContext::default(),
        );
        assert!(matches!(outcome, Err(ScanError::Classifier(_))));
    }
}
