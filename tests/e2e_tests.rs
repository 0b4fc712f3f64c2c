// File: e2e_tests.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025
// - Volker Schwaberow <volker@schwaberow.de>

mod common;

use clap::Parser;
use common::*;
use rsweep::cli::Cli;
use rsweep::commands::scan;
use rsweep::engine::Engine;
use rsweep::probe::ProbeKind;
use rsweep::reports::{ReportEngine, ReportFormat};
use rsweep::source::SourceBuilder;
use rsweep::target::Target;
use serde_json::Value;
use serial_test::serial;
use std::fs;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::Mock;

async fn mount_site(mock_server: &wiremock::MockServer) {
    Mock::given(method("GET"))
        .and(path("/shop/admin"))
        .respond_with(create_html_response(&format!(
            "<title>Shop Admin</title>{}",
            padded_body(400)
        )))
        .mount(mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/shop"))
        .respond_with(ReflectParam("q"))
        .mount(mock_server)
        .await;
    mount_not_found_fallback(mock_server).await;
}

#[tokio::test]
#[serial]
async fn test_complete_scan_workflow() {
    let mock_server = setup_mock_server().await;
    mount_site(&mock_server).await;

    let temp_dir = TempDir::new().unwrap();
    let wordlist = temp_dir.path().join("words.txt");
    fs::write(&wordlist, "admin\nbackup\n# ignored\nadmin\n").unwrap();
    let report = temp_dir.path().join("report.json");
    let checkpoint = temp_dir.path().join("scan.json");

    let target = format!("{}/shop?q=shoes", mock_server.uri());
    let cli = Cli::try_parse_from([
        "rsweep",
        target.as_str(),
        "--kinds",
        "discovery,xss",
        "--no-builtin",
        "-W",
        wordlist.to_str().unwrap(),
        "--no-progress",
        "--backoff-ms",
        "5",
        "--checkpoint",
        checkpoint.to_str().unwrap(),
        "-o",
        report.to_str().unwrap(),
    ])
    .unwrap();

    scan::execute(&cli).await.unwrap();

    let json: Value = serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
    let findings = json["findings"].as_array().unwrap();
    assert_eq!(json["summary"]["cancelled"], false);
    assert_eq!(json["summary"]["failed"], 0);
    assert_eq!(json["summary"]["findings_by_kind"]["discovery"], 1);
    assert!(json["summary"]["findings_by_kind"]["xss"].as_u64().unwrap() >= 1);
    assert!(findings
        .iter()
        .any(|f| f["url"].as_str().unwrap().ends_with("/shop/admin")));

    // Discovery paths, payloads against both /shop and the discovered /shop/admin,
    // and one DOM sink check per page.
    let attempted = json["summary"]["attempted"].as_u64().unwrap();
    let payloads = rsweep::wordlist::xss_payloads().len() as u64;
    assert_eq!(attempted, 2 + 2 * payloads + 2);
    assert!(checkpoint.exists());
}

#[tokio::test]
#[serial]
async fn test_rerun_with_resume_sends_no_new_probes() {
    let mock_server = setup_mock_server().await;
    mount_site(&mock_server).await;

    let temp_dir = TempDir::new().unwrap();
    let wordlist = temp_dir.path().join("words.txt");
    fs::write(&wordlist, "admin\n").unwrap();
    let checkpoint = temp_dir.path().join("scan.json");
    let target = format!("{}/shop", mock_server.uri());

    let args = |resume: bool| {
        let mut args = vec![
            "rsweep".to_string(),
            target.clone(),
            "--kinds".to_string(),
            "discovery".to_string(),
            "--no-builtin".to_string(),
            "-W".to_string(),
            wordlist.to_str().unwrap().to_string(),
            "--no-progress".to_string(),
        ];
        if resume {
            args.push("--resume".to_string());
        } else {
            args.push("--checkpoint".to_string());
        }
        args.push(checkpoint.to_str().unwrap().to_string());
        args
    };

    scan::execute(&Cli::try_parse_from(args(false)).unwrap())
        .await
        .unwrap();
    let first = mock_server.received_requests().await.unwrap().len();

    scan::execute(&Cli::try_parse_from(args(true)).unwrap())
        .await
        .unwrap();
    let second = mock_server.received_requests().await.unwrap().len();

    // Only the soft-404 baseline is repeated.
    assert_eq!(second - first, 1);
}

#[tokio::test]
#[serial]
async fn test_forms_and_dom_sinks_on_scanned_pages() {
    let mock_server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/shop"))
        .respond_with(create_html_response(
            r#"<html><body>
<form action="/shop/find" method="get">
  <input type="text" name="q">
  <input type="hidden" name="lang" value="en">
  <input type="submit" value="Go">
</form>
<script>document.write(location.hash.substring(1));</script>
</body></html>"#,
        ))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/shop/find"))
        .respond_with(ReflectParam("q"))
        .mount(&mock_server)
        .await;
    mount_not_found_fallback(&mock_server).await;

    let temp_dir = TempDir::new().unwrap();
    let report = temp_dir.path().join("report.json");
    let target = format!("{}/shop", mock_server.uri());
    let cli = Cli::try_parse_from([
        "rsweep",
        target.as_str(),
        "--kinds",
        "xss",
        "--no-progress",
        "-o",
        report.to_str().unwrap(),
    ])
    .unwrap();

    scan::execute(&cli).await.unwrap();

    let json: Value = serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
    let findings = json["findings"].as_array().unwrap();
    assert!(findings.iter().any(|f| {
        f["spec"]["path"] == "find"
            && f["spec"]["injection"]["point"]["in"] == "page-form"
            && f["spec"]["injection"]["point"]["name"]["name"] == "q"
            && f["spec"]["injection"]["point"]["name"]["method"] == "GET"
    }));
    assert!(findings
        .iter()
        .any(|f| f["verdict"]["evidence"]["context"] == "dom-sink"));
    assert!(!findings
        .iter()
        .any(|f| f["spec"]["injection"]["point"]["name"]["name"] == "lang"));
}

#[tokio::test]
#[serial]
async fn test_invalid_target_fails_before_scanning() {
    let cli = Cli::try_parse_from(["rsweep", "ftp://example.com", "--no-progress"]).unwrap();
    let err = scan::execute(&cli).await.unwrap_err();
    assert!(format!("{:#}", err).contains("unsupported scheme"));
}

#[tokio::test]
async fn test_engine_state_exports_to_every_format() {
    let mock_server = setup_mock_server().await;
    mount_site(&mock_server).await;

    let target = Target::parse(&format!("{}/shop", mock_server.uri())).unwrap();
    let mut engine = Engine::new(target, test_config(&[ProbeKind::Discovery])).unwrap();
    let source = SourceBuilder::new(&[ProbeKind::Discovery])
        .paths(vec!["admin".to_string(), "nothing".to_string()])
        .build();
    let outcome = engine.run(source, None).await.unwrap();

    let report_engine = ReportEngine::new();
    let data = report_engine.create_report_data(
        &engine.target().base_url(),
        engine.state(),
        outcome.elapsed,
        outcome.cancelled,
    );
    assert_eq!(data.summary.attempted, 2);
    assert_eq!(data.summary.total_findings, 1);

    for format in [
        ReportFormat::Text,
        ReportFormat::Json,
        ReportFormat::Csv,
        ReportFormat::Markdown,
    ] {
        let content = report_engine
            .generate_report::<&str>(format, &data, None)
            .unwrap();
        assert!(content.contains("/shop/admin"), "{:?}", format);
    }
}

#[test]
fn test_cli_report_format_follows_extension() {
    let cli = Cli::try_parse_from(["rsweep", "example.com", "-o", "out.md"]).unwrap();
    assert_eq!(cli.report_format(), ReportFormat::Markdown);

    let cli =
        Cli::try_parse_from(["rsweep", "example.com", "-o", "out.md", "--format", "csv"]).unwrap();
    assert_eq!(cli.report_format(), ReportFormat::Csv);
}
