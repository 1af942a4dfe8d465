//! Data models for the gateway.
//!
//! This module contains the type definitions shared by every stage of a call:
//! - Registration input (`descriptor`)
//! - Compiled route templates and bindings (`metadata`)
//! - The alias → host routing table (`routes`)
//! - Call results and failure payloads (`response`)

// Author: kelexine (https://github.com/kelexine)

pub mod descriptor;
pub mod metadata;
pub mod response;
pub mod routes;

pub use descriptor::{
    DefaultHeader, DescriptorFile, HttpMethod, InterfaceDescriptor, OperationDescriptor,
    ParameterDescriptor, ReturnShape, StaticFallbackDescriptor,
};
pub use metadata::{
    BindingKind, HeaderTemplate, ParameterBinding, RouteMetadata, Segment, UrlTemplate,
};
pub use response::{
    FailurePayload, NormalizedResponse, Outcome, OutcomeStream, Reply, ResponseSource,
    TransportError, TransportErrorKind,
};
pub use routes::{ServiceRoute, ServiceRoutes};
