//! Validated request/response client for compatible-message queries.
//!
//! One call, one result or one error: the request body is the serialized
//! payload, the response body is decoded and validated against the
//! expected schema before anything is returned to the caller.

pub mod compatible;
pub mod http;

pub use compatible::{
    ApiError, CompatibleClient, CompatibleMessage, CompatiblePayload, MessageDirection,
    MessageKind,
};
pub use http::{HttpBackend, ReqwestBackend};
