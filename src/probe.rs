// File: probe.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025
// - Volker Schwaberow <volker@schwaberow.de>

use crate::errors::TransportErrorKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    Discovery,
    Xss,
    Sqli,
}

impl ProbeKind {
    pub fn all() -> &'static [ProbeKind] {
        &[ProbeKind::Discovery, ProbeKind::Xss, ProbeKind::Sqli]
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            ProbeKind::Discovery => 0,
            ProbeKind::Xss => 1,
            ProbeKind::Sqli => 2,
        }
    }
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeKind::Discovery => write!(f, "discovery"),
            ProbeKind::Xss => write!(f, "xss"),
            ProbeKind::Sqli => write!(f, "sqli"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FormMethod {
    Get,
    Post,
}

impl fmt::Display for FormMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormMethod::Get => write!(f, "get"),
            FormMethod::Post => write!(f, "post"),
        }
    }
}

/// One input of an HTML form found on a scanned page. `fields` lists every
/// named field of the form with the value it is submitted with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FormInput {
    pub method: FormMethod,
    pub name: String,
    pub fields: Vec<(String, String)>,
}

impl FormInput {
    /// The form's fields with `payload` in place of this input's value.
    pub fn submission(&self, payload: &str) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .fields
            .iter()
            .map(|(name, value)| {
                if *name == self.name {
                    (name.clone(), payload.to_string())
                } else {
                    (name.clone(), value.clone())
                }
            })
            .collect();
        if !self.fields.iter().any(|(name, _)| *name == self.name) {
            pairs.push((self.name.clone(), payload.to_string()));
        }
        pairs
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "in", content = "name", rename_all = "lowercase")]
pub enum InjectionPoint {
    Query(String),
    /// A POST field named on the command line.
    Form(String),
    #[serde(rename = "page-form")]
    PageForm(FormInput),
}

impl InjectionPoint {
    pub fn name(&self) -> &str {
        match self {
            InjectionPoint::Query(name) | InjectionPoint::Form(name) => name,
            InjectionPoint::PageForm(input) => &input.name,
        }
    }
}

impl fmt::Display for InjectionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InjectionPoint::Query(name) => write!(f, "query:{}", name),
            InjectionPoint::Form(name) => write!(f, "form:{}", name),
            InjectionPoint::PageForm(input) => write!(f, "{}-form:{}", input.method, input.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "technique", rename_all = "snake_case")]
pub enum SqliTechnique {
    ErrorBased,
    /// The probe's payload is the true condition, `false_payload` the control.
    BooleanBased { false_payload: String },
    TimeBased { delay_secs: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Injection {
    point: InjectionPoint,
    payload: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    technique: Option<SqliTechnique>,
}

impl Injection {
    pub fn point(&self) -> &InjectionPoint {
        &self.point
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn technique(&self) -> Option<&SqliTechnique> {
        self.technique.as_ref()
    }
}

/// One unit of scan work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProbeSpec {
    kind: ProbeKind,
    path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    injection: Option<Injection>,
}

impl ProbeSpec {
    pub fn discovery(path: impl Into<String>) -> Self {
        Self {
            kind: ProbeKind::Discovery,
            path: path.into(),
            injection: None,
        }
    }

    pub fn xss(path: impl Into<String>, point: InjectionPoint, payload: impl Into<String>) -> Self {
        Self {
            kind: ProbeKind::Xss,
            path: path.into(),
            injection: Some(Injection {
                point,
                payload: payload.into(),
                technique: None,
            }),
        }
    }

    pub fn sqli(
        path: impl Into<String>,
        point: InjectionPoint,
        payload: impl Into<String>,
        technique: SqliTechnique,
    ) -> Self {
        Self {
            kind: ProbeKind::Sqli,
            path: path.into(),
            injection: Some(Injection {
                point,
                payload: payload.into(),
                technique: Some(technique),
            }),
        }
    }

    /// Fetches a page and looks for DOM XSS sinks fed from the URL or
    /// other attacker-influenced sources. Carries no injection.
    pub fn dom_sinks(path: impl Into<String>) -> Self {
        Self {
            kind: ProbeKind::Xss,
            path: path.into(),
            injection: None,
        }
    }

    pub fn kind(&self) -> ProbeKind {
        self.kind
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn injection(&self) -> Option<&Injection> {
        self.injection.as_ref()
    }

    pub fn technique(&self) -> Option<&SqliTechnique> {
        self.injection.as_ref().and_then(|i| i.technique())
    }

    pub fn id(&self) -> ProbeId {
        ProbeId {
            kind: self.kind,
            path: self.path.clone(),
            parameter: self.injection.as_ref().map(|i| i.point.clone()),
            payload: self.injection.as_ref().map(|i| i.payload.clone()),
        }
    }

    /// For boolean-based SQLi: the same injection point carrying the false condition.
    pub fn control_spec(&self) -> Option<ProbeSpec> {
        let injection = self.injection.as_ref()?;
        match &injection.technique {
            Some(SqliTechnique::BooleanBased { false_payload }) => Some(ProbeSpec::sqli(
                self.path.clone(),
                injection.point.clone(),
                false_payload.clone(),
                SqliTechnique::ErrorBased,
            )),
            _ => None,
        }
    }
}

/// Deduplication and checkpoint key: `(kind, path, parameter, payload)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProbeId {
    pub kind: ProbeKind,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<InjectionPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

impl fmt::Display for ProbeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} /{}", self.kind, self.path.trim_start_matches('/'))?;
        if let Some(parameter) = &self.parameter {
            write!(f, " [{}]", parameter)?;
        }
        if let Some(payload) = &self.payload {
            write!(f, " {:?}", payload)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlSample {
    pub status: u16,
    pub size: u64,
    pub latency: Duration,
}

/// Outcome of one HTTP exchange. Lives only until it is classified.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    status: u16,
    size: u64,
    latency: Duration,
    body: String,
    url: String,
    location: Option<String>,
    error: Option<(TransportErrorKind, String)>,
    control: Option<ControlSample>,
}

impl ProbeResult {
    pub fn new_with_all(
        status: u16,
        size: u64,
        latency: Duration,
        body: String,
        url: String,
        location: Option<String>,
    ) -> Self {
        Self {
            status,
            size,
            latency,
            body,
            url,
            location,
            error: None,
            control: None,
        }
    }

    pub fn failure(
        kind: TransportErrorKind,
        message: impl Into<String>,
        url: String,
        latency: Duration,
    ) -> Self {
        Self {
            status: 0,
            size: 0,
            latency,
            body: String::new(),
            url,
            location: None,
            error: Some((kind, message.into())),
            control: None,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn latency(&self) -> Duration {
        self.latency
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn error(&self) -> Option<(TransportErrorKind, &str)> {
        self.error.as_ref().map(|(kind, msg)| (*kind, msg.as_str()))
    }

    pub fn success(&self) -> bool {
        self.error.is_none()
    }

    pub fn control(&self) -> Option<&ControlSample> {
        self.control.as_ref()
    }

    pub fn set_control(&mut self, control: ControlSample) {
        self.control = Some(control);
    }

    pub fn sample(&self) -> ControlSample {
        ControlSample {
            status: self.status,
            size: self.size,
            latency: self.latency,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::Low => write!(f, "Low"),
            Confidence::Medium => write!(f, "Medium"),
            Confidence::High => write!(f, "High"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum XssContext {
    HtmlBody,
    Attribute,
    Script,
    DomSink,
}

impl fmt::Display for XssContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XssContext::HtmlBody => write!(f, "html-body"),
            XssContext::Attribute => write!(f, "attribute"),
            XssContext::Script => write!(f, "script"),
            XssContext::DomSink => write!(f, "dom-sink"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SqliEvidence {
    ErrorBased,
    BooleanBased,
    TimeBased,
}

impl fmt::Display for SqliEvidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqliEvidence::ErrorBased => write!(f, "error-based"),
            SqliEvidence::BooleanBased => write!(f, "boolean-based"),
            SqliEvidence::TimeBased => write!(f, "time-based"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Evidence {
    Discovery {
        status: u16,
        size: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        location: Option<String>,
    },
    Xss {
        context: XssContext,
        snippet: String,
    },
    Sqli {
        technique: SqliEvidence,
        matched: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        database: Option<String>,
    },
}

impl Evidence {
    /// Short tag naming what matched: a status code, an XSS context or an SQLi technique.
    pub fn label(&self) -> String {
        match self {
            Evidence::Discovery { status, .. } => format!("status-{}", status),
            Evidence::Xss { context, .. } => context.to_string(),
            Evidence::Sqli { technique, .. } => technique.to_string(),
        }
    }

    pub fn detail(&self) -> String {
        match self {
            Evidence::Discovery {
                size,
                title,
                location,
                ..
            } => {
                let mut detail = format!("{} bytes", size);
                if let Some(title) = title {
                    detail.push_str(&format!(", title \"{}\"", title));
                }
                if let Some(location) = location {
                    detail.push_str(&format!(", -> {}", location));
                }
                detail
            }
            Evidence::Xss { snippet, .. } => snippet.clone(),
            Evidence::Sqli {
                matched, database, ..
            } => match database {
                Some(db) => format!("{} ({})", matched, db),
                None => matched.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub evidence: Evidence,
    pub confidence: Confidence,
}

impl Verdict {
    pub fn new(evidence: Evidence, confidence: Confidence) -> Self {
        Self {
            evidence,
            confidence,
        }
    }
}

/// A positively classified probe. Written once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub spec: ProbeSpec,
    pub url: String,
    pub verdict: Verdict,
    pub discovered_at: DateTime<Utc>,
}

impl Finding {
    pub fn new(spec: ProbeSpec, url: String, verdict: Verdict) -> Self {
        Self {
            spec,
            url,
            verdict,
            discovered_at: Utc::now(),
        }
    }

    pub fn id(&self) -> ProbeId {
        self.spec.id()
    }
}
