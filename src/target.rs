// File: target.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025
// - Volker Schwaberow <volker@schwaberow.de>

use crate::errors::{ScanError, ScanResult};
use crate::probe::{FormMethod, InjectionPoint, ProbeSpec};
use sha2::{Digest, Sha256};
use url::Url;

/// The normalized origin a scan is scoped to. Built once per scan and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    origin: Url,
    base_path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    cookies: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMethod {
    Get,
    Post,
}

/// A fully resolved HTTP exchange for one probe.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeRequest {
    pub method: RequestMethod,
    pub url: Url,
    pub form: Vec<(String, String)>,
}

impl ProbeRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: RequestMethod::Get,
            url,
            form: Vec::new(),
        }
    }
}

impl Target {
    pub fn parse(input: &str) -> ScanResult<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ScanError::Validation("target cannot be empty".to_string()));
        }
        if trimmed.chars().any(|c| c.is_control() || c.is_whitespace()) {
            return Err(ScanError::Validation(format!(
                "target contains whitespace or control characters: {:?}",
                trimmed
            )));
        }

        let with_scheme = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("http://{}", trimmed)
        };

        let parsed = Url::parse(&with_scheme)?;
        match parsed.scheme() {
            "http" | "https" => {}
            other => {
                return Err(ScanError::Validation(format!(
                    "unsupported scheme '{}', expected http or https",
                    other
                )))
            }
        }
        let host = parsed
            .host_str()
            .ok_or_else(|| ScanError::Validation(format!("no host in target '{}'", trimmed)))?;
        if host.is_empty() {
            return Err(ScanError::Validation(format!("no host in target '{}'", trimmed)));
        }

        let mut origin = parsed.clone();
        origin.set_path("/");
        origin.set_query(None);
        origin.set_fragment(None);
        let _ = origin.set_username("");
        let _ = origin.set_password(None);

        let base_path = parsed.path().trim_end_matches('/').to_string();
        let query = parsed
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        Ok(Self {
            origin,
            base_path,
            query,
            headers: Vec::new(),
            cookies: None,
        })
    }

    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_cookies(mut self, cookies: Option<String>) -> Self {
        self.cookies = cookies;
        self
    }

    /// `scheme://host[:port]` without a trailing slash.
    pub fn origin(&self) -> String {
        self.origin.origin().ascii_serialization()
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn base_url(&self) -> String {
        format!("{}{}", self.origin(), self.base_path)
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn query_parameters(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for (name, _) in &self.query {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn cookies(&self) -> Option<&str> {
        self.cookies.as_deref()
    }

    /// Stable fingerprint used to bind a checkpoint to the target it was taken for.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.origin().as_bytes());
        hasher.update(b"\n");
        hasher.update(self.base_path.as_bytes());
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }

    pub fn url_for(&self, path: &str) -> ScanResult<Url> {
        let relative = path.trim_start_matches('/');
        let joined = if relative.is_empty() || relative.starts_with('?') {
            let root = if self.base_path.is_empty() {
                format!("{}/", self.origin())
            } else {
                self.base_url()
            };
            format!("{}{}", root, relative)
        } else {
            format!("{}{}/{}", self.origin(), self.base_path, relative)
        };
        let url = Url::parse(&joined)?;
        if url.origin() != self.origin.origin() {
            return Err(ScanError::Validation(format!(
                "path '{}' escapes the target origin",
                path
            )));
        }
        Ok(url)
    }

    /// `url` as a path relative to the base path, query included, or `None`
    /// when it lies outside the scan scope.
    pub fn relative_path(&self, url: &Url) -> Option<String> {
        if url.origin() != self.origin.origin() {
            return None;
        }
        let rest = url.path().strip_prefix(self.base_path.as_str())?;
        if !(rest.is_empty() || rest.starts_with('/')) {
            return None;
        }
        let mut relative = rest.trim_start_matches('/').to_string();
        if let Some(query) = url.query() {
            relative.push('?');
            relative.push_str(query);
        }
        Some(relative)
    }

    pub fn request_for(&self, spec: &ProbeSpec) -> ScanResult<ProbeRequest> {
        let mut url = self.url_for(spec.path())?;
        let injection = match spec.injection() {
            None => return Ok(ProbeRequest::get(url)),
            Some(injection) => injection,
        };

        match injection.point() {
            InjectionPoint::Query(name) => {
                let mut pairs: Vec<(String, String)> = self
                    .query
                    .iter()
                    .filter(|(k, _)| k != name)
                    .cloned()
                    .collect();
                pairs.push((name.clone(), injection.payload().to_string()));
                url.query_pairs_mut().clear().extend_pairs(pairs.iter());
                Ok(ProbeRequest::get(url))
            }
            InjectionPoint::Form(name) => {
                if !self.query.is_empty() {
                    url.query_pairs_mut().extend_pairs(self.query.iter());
                }
                Ok(ProbeRequest {
                    method: RequestMethod::Post,
                    url,
                    form: vec![(name.clone(), injection.payload().to_string())],
                })
            }
            InjectionPoint::PageForm(input) => {
                let pairs = input.submission(injection.payload());
                match input.method {
                    FormMethod::Get => {
                        url.query_pairs_mut().clear().extend_pairs(pairs.iter());
                        Ok(ProbeRequest::get(url))
                    }
                    FormMethod::Post => Ok(ProbeRequest {
                        method: RequestMethod::Post,
                        url,
                        form: pairs,
                    }),
                }
            }
        }
    }

    /// The request used for the control half of a boolean-based SQLi probe.
    pub fn control_request_for(&self, spec: &ProbeSpec) -> ScanResult<Option<ProbeRequest>> {
        match spec.control_spec() {
            Some(control) => self.request_for(&control).map(Some),
            None => Ok(None),
        }
    }
}
