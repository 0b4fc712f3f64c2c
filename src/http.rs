// File: http.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use crate::config::ConfigParameter;
use crate::errors::{ScanError, ScanResult, TransportErrorKind};
use crate::probe::ProbeResult;
use crate::target::{ProbeRequest, RequestMethod, Target};
use log::{debug, trace};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, COOKIE, LOCATION};
use reqwest::redirect::Policy;
use std::error::Error as _;
use std::time::Instant;

/// Shared keep-alive transport. Cloning is cheap and reuses the same pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl HttpClient {
    pub fn new(config: &ConfigParameter, target: &Target) -> ScanResult<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in target.headers() {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ScanError::Validation(format!("invalid header name '{}'", name)))?;
            let value = HeaderValue::from_str(value).map_err(|_| {
                ScanError::Validation(format!("invalid value for header '{}'", name))
            })?;
            headers.append(name, value);
        }
        if let Some(cookies) = target.cookies() {
            let value = HeaderValue::from_str(cookies)
                .map_err(|_| ScanError::Validation("invalid cookie string".to_string()))?;
            headers.insert(COOKIE, value);
        }

        let max_redirects = config.max_redirects();
        let origin = target.origin();
        let redirect = Policy::custom(move |attempt| {
            if attempt.previous().len() > max_redirects {
                attempt.stop()
            } else if attempt.url().origin().ascii_serialization() != origin {
                attempt.stop()
            } else {
                attempt.follow()
            }
        });

        let mut builder = reqwest::Client::builder()
            .pool_max_idle_per_host(config.pool_max_idle_per_host())
            .pool_idle_timeout(config.pool_idle_timeout())
            .timeout(config.timeout())
            .connect_timeout(config.timeout())
            .user_agent(config.user_agent())
            .default_headers(headers)
            .redirect(redirect);

        if let Some(proxy) = config.proxy() {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| ScanError::Validation(format!("invalid proxy '{}': {}", proxy, e)))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| ScanError::Validation(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_body_bytes: config.max_body_bytes(),
        })
    }

    /// Performs one exchange. Transport failures come back inside the
    /// `ProbeResult`; this never retries.
    pub async fn execute(&self, request: &ProbeRequest) -> ProbeResult {
        let url = request.url.to_string();
        let builder = match request.method {
            RequestMethod::Get => self.client.get(request.url.clone()),
            RequestMethod::Post => self.client.post(request.url.clone()).form(&request.form),
        };

        trace!("{:?} {}", request.method, url);
        let start = Instant::now();
        let mut response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                let kind = classify_error(&e);
                debug!("{} failed ({}): {}", url, kind, e);
                return ProbeResult::failure(kind, e.to_string(), url, start.elapsed());
            }
        };

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        let mut body = Vec::new();
        let mut size: u64 = 0;
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    size += chunk.len() as u64;
                    let room = self.max_body_bytes.saturating_sub(body.len());
                    if room > 0 {
                        body.extend_from_slice(&chunk[..chunk.len().min(room)]);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    let kind = if e.is_timeout() {
                        TransportErrorKind::Timeout
                    } else {
                        TransportErrorKind::Body
                    };
                    debug!("{} body read failed ({}): {}", final_url, kind, e);
                    return ProbeResult::failure(kind, e.to_string(), final_url, start.elapsed());
                }
            }
        }

        ProbeResult::new_with_all(
            status,
            size,
            start.elapsed(),
            String::from_utf8_lossy(&body).into_owned(),
            final_url,
            location,
        )
    }
}

pub fn classify_error(error: &reqwest::Error) -> TransportErrorKind {
    if error.is_timeout() {
        return TransportErrorKind::Timeout;
    }
    if error.is_redirect() {
        return TransportErrorKind::Redirect;
    }

    let mut chain = String::new();
    let mut source = error.source();
    while let Some(cause) = source {
        chain.push_str(&cause.to_string().to_lowercase());
        chain.push('\n');
        source = cause.source();
    }

    if chain.contains("dns") || chain.contains("failed to lookup") || chain.contains("resolve") {
        TransportErrorKind::Dns
    } else if chain.contains("certificate") || chain.contains("tls") || chain.contains("ssl") {
        TransportErrorKind::Tls
    } else if error.is_connect() {
        TransportErrorKind::Connect
    } else if error.is_body() || error.is_decode() {
        TransportErrorKind::Body
    } else {
        TransportErrorKind::Other
    }
}
