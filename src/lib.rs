// restgate - Declarative HTTP gateway for REST services
// Author: kelexine (https://github.com/kelexine)

pub mod binder;
pub mod cli;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod fallback;
pub mod gateway;
pub mod interceptor;
pub mod metrics;
pub mod models;
pub mod template;
pub mod utils;

pub use codec::{BodyCodec, JsonCodec};
pub use error::{GatewayError, Result};
pub use fallback::{fallback_fn, FallbackHandler, StaticFallback};
pub use gateway::{Gateway, GatewayBuilder, ServiceClient};
pub use interceptor::Interceptor;
pub use models::{
    FailurePayload, HttpMethod, InterfaceDescriptor, NormalizedResponse, OperationDescriptor,
    Outcome, OutcomeStream, ParameterDescriptor, Reply, ReturnShape, TransportError,
};
