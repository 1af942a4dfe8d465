// Call results, failure payloads and normalized responses
// Author: kelexine (https://github.com/kelexine)

use crate::error::Result;
use futures::stream::BoxStream;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Status reported for failures that never produced an HTTP response.
pub const CONNECT_FAILURE_STATUS: StatusCode = StatusCode::BAD_GATEWAY;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The upstream answered with a non-2xx status.
    Status,
    /// No response: connection refused, DNS failure, reset, body read failure.
    Connect,
}

/// A remote-call failure handed to the fallback resolver.
#[derive(Error, Debug, Clone)]
#[error("{method} {url} failed with {status}: {body}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub status: StatusCode,
    pub body: String,
    pub method: String,
    pub url: String,
}

impl TransportError {
    pub fn from_status(method: &str, url: &str, status: StatusCode, body: String) -> Self {
        Self {
            kind: TransportErrorKind::Status,
            status,
            body,
            method: method.to_string(),
            url: url.to_string(),
        }
    }

    pub fn from_connect(method: &str, url: &str, error: &reqwest::Error) -> Self {
        Self {
            kind: TransportErrorKind::Connect,
            status: CONNECT_FAILURE_STATUS,
            body: error.to_string(),
            method: method.to_string(),
            url: url.to_string(),
        }
    }

    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    pub fn payload(&self) -> FailurePayload {
        FailurePayload {
            status: self.status_code(),
            body: self.body.clone(),
        }
    }
}

/// Synthetic value returned in place of a result when a call fails and no
/// fallback is registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailurePayload {
    pub status: u16,
    pub body: String,
}

/// A value of the operation's element type, or the failure that replaced it.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Value(T),
    Failure(FailurePayload),
}

impl<T> Outcome<T> {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure(_))
    }

    pub fn value(self) -> Option<T> {
        match self {
            Outcome::Value(v) => Some(v),
            Outcome::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&FailurePayload> {
        match self {
            Outcome::Failure(payload) => Some(payload),
            Outcome::Value(_) => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Value(v) => Outcome::Value(f(v)),
            Outcome::Failure(payload) => Outcome::Failure(payload),
        }
    }
}

impl Outcome<Value> {
    /// JSON rendering: the value itself, or `{"status":..,"body":..}`.
    pub fn to_json(&self) -> Value {
        match self {
            Outcome::Value(v) => v.clone(),
            Outcome::Failure(payload) => serde_json::json!({
                "status": payload.status,
                "body": payload.body,
            }),
        }
    }
}

/// Lazy, single-pass sequence of outcomes.
pub type OutcomeStream<T = Value> = BoxStream<'static, Result<Outcome<T>>>;

/// Result of an untyped invocation, in the operation's declared shape.
pub enum Reply {
    Single(Outcome<Value>),
    Stream(OutcomeStream),
    Empty,
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Single(outcome) => f.debug_tuple("Single").field(outcome).finish(),
            Reply::Stream(_) => f.write_str("Stream(..)"),
            Reply::Empty => f.write_str("Empty"),
        }
    }
}

/// Where a normalized response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    /// A 2xx answer from the remote service.
    Upstream,
    /// A registered fallback handler produced the result.
    Fallback,
    /// No fallback; the result is a synthetic failure payload (or empty).
    Failure,
}

/// What interceptors see after a call produced its result.
#[derive(Debug, Clone)]
pub struct NormalizedResponse {
    pub alias: String,
    pub operation_id: String,
    pub method: String,
    pub url: String,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub source: ResponseSource,
}
