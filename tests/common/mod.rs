// File: common/mod.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025
// - Volker Schwaberow <volker@schwaberow.de>

#![allow(dead_code)]

use rsweep::config::ConfigParameter;
use rsweep::probe::ProbeKind;
use std::collections::HashMap;
use std::time::Duration;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

pub fn create_mock_response(
    status: u16,
    body: &str,
    headers: HashMap<&str, &str>,
) -> ResponseTemplate {
    let mut response = ResponseTemplate::new(status).set_body_string(body);
    for (key, value) in headers {
        response = response.append_header(key, value);
    }
    response
}

pub fn create_html_response(content: &str) -> ResponseTemplate {
    let mut headers = HashMap::new();
    headers.insert("content-type", "text/html");
    create_mock_response(200, content, headers)
}

/// A body of exactly `size` bytes.
pub fn padded_body(size: usize) -> String {
    "x".repeat(size)
}

/// Answers every GET that no other mock matched with a plain 404.
pub async fn mount_not_found_fallback(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path_regex(".*"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
        .with_priority(u8::MAX)
        .mount(server)
        .await;
}

/// Fast defaults for tests: no real backoff, short timeout, generous rate.
pub fn test_config(kinds: &[ProbeKind]) -> ConfigParameter {
    let mut config = ConfigParameter::new();
    config.set_concurrency(8);
    config.set_rate_limit(1000);
    config.set_timeout(Duration::from_secs(2));
    config.set_retries(1);
    config.set_backoff_initial(Duration::from_millis(5));
    config.set_scan_kinds(kinds.to_vec());
    config
}

pub fn sample_search_page(reflected: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Search</title></head>
<body>
    <h1>Results</h1>
    <p>You searched for: {}</p>
</body>
</html>"#,
        reflected
    )
}

pub fn sample_mysql_error() -> String {
    r#"<html><body>
<b>Warning</b>: You have an error in your SQL syntax; check the manual that corresponds to your MySQL server version for the right syntax to use near ''' at line 1
</body></html>"#
        .to_string()
}

fn query_value(request: &Request, name: &str) -> String {
    request
        .url
        .query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default()
}

/// Echoes a query parameter into the page without escaping.
pub struct ReflectParam(pub &'static str);

impl Respond for ReflectParam {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        create_html_response(&sample_search_page(&query_value(request, self.0)))
    }
}

/// Leaks a MySQL error when the parameter contains a single quote.
pub struct SqlErrorOnQuote(pub &'static str);

impl Respond for SqlErrorOnQuote {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        if query_value(request, self.0).contains('\'') {
            ResponseTemplate::new(500).set_body_string(sample_mysql_error())
        } else {
            create_html_response("<html><body>item 1</body></html>")
        }
    }
}

/// Returns the full listing only when the injected condition is true.
pub struct BooleanOracle(pub &'static str);

impl Respond for BooleanOracle {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        if query_value(request, self.0).contains("'1'='1") {
            create_html_response(&format!("<ul>{}</ul>", "<li>row</li>".repeat(100)))
        } else {
            create_html_response("<ul></ul>")
        }
    }
}
