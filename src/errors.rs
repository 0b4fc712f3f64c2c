// File: errors.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025
// - Volker Schwaberow <volker@schwaberow.de>

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    Timeout,
    Connect,
    Dns,
    Tls,
    Redirect,
    Body,
    Other,
}

impl TransportErrorKind {
    /// Every transport failure is retried by the dispatcher, timeouts included.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Redirect)
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Timeout => "timeout",
            Self::Connect => "connect",
            Self::Dns => "dns",
            Self::Tls => "tls",
            Self::Redirect => "redirect",
            Self::Body => "body",
            Self::Other => "other",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug)]
pub enum ScanError {
    Validation(String),
    Transport {
        kind: TransportErrorKind,
        message: String,
    },
    Timeout(String),
    Classifier(String),
    State(String),
    Io(std::io::Error),
    Serialization(serde_json::Error),
}

impl ScanError {
    pub fn transport(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        match kind {
            TransportErrorKind::Timeout => Self::Timeout(message.into()),
            kind => Self::Transport {
                kind,
                message: message.into(),
            },
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::State(_) | Self::Io(_) | Self::Serialization(_)
        )
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(msg) => write!(f, "Validation error: {}", msg),
            Self::Transport { kind, message } => {
                write!(f, "Transport error ({}): {}", kind, message)
            }
            Self::Timeout(msg) => write!(f, "Timeout error: {}", msg),
            Self::Classifier(msg) => write!(f, "Classifier error: {}", msg),
            Self::State(msg) => write!(f, "State error: {}", msg),
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::Serialization(e) => write!(f, "Serialization error: {}", e),
        }
    }
}

impl std::error::Error for ScanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Serialization(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ScanError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error)
    }
}

impl From<serde_json::Error> for ScanError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error)
    }
}

impl From<url::ParseError> for ScanError {
    fn from(error: url::ParseError) -> Self {
        Self::Validation(format!("invalid URL: {}", error))
    }
}

pub type ScanResult<T> = Result<T, ScanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_transport_subtype() {
        let err = ScanError::transport(TransportErrorKind::Timeout, "took too long");
        assert!(matches!(err, ScanError::Timeout(_)));
        assert!(TransportErrorKind::Timeout.is_retryable());
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_fatal_classification() {
        assert!(ScanError::Validation("bad".into()).is_fatal());
        assert!(ScanError::State("corrupt".into()).is_fatal());
        assert!(!ScanError::Classifier("oops".into()).is_fatal());
        assert!(!ScanError::transport(TransportErrorKind::Connect, "refused").is_fatal());
    }

    #[test]
    fn test_display() {
        let err = ScanError::transport(TransportErrorKind::Dns, "no such host");
        assert_eq!(err.to_string(), "Transport error (dns): no such host");
    }
}
