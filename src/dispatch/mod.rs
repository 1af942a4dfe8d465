//! Request dispatch: resolve templates, send, shape the result.
//!
//! The [`Dispatcher`] owns the HTTP client and the body codec. For each call
//! it builds an [`InvocationContext`] from the compiled route and the live
//! bindings, sends it, and converts the response into the operation's
//! declared shape. Any transport failure is handed to the fallback resolver.
//!
//! Author: kelexine (<https://github.com/kelexine>)

mod client;
pub mod streaming;

pub use client::{apply_header_bindings, Dispatcher};

use crate::models::{HttpMethod, ReturnShape};
use bytes::Bytes;
use reqwest::header::HeaderMap;

/// Everything needed to send one request. Built per call and dropped once the
/// call has completed.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    pub alias: String,
    pub operation_id: String,
    pub method: HttpMethod,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub returns: ReturnShape,
    /// Header bindings that had no slot in the header template.
    pub dropped_headers: Vec<String>,
}
