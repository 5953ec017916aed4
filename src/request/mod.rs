//! Logical HTTP requests.
//!
//! This module handles:
//! - Request options and their resolution against process-wide defaults
//! - Transport selection (plain, secure, or caller-injected)
//! - Redirect following with a bounded budget
//! - Response decoding (gzip) into a reusable [`RequestContext`]
//! - Cancellation through a `CancellationToken`

mod context;
mod decode;
mod options;
mod redirects;
mod service;
mod transport;

pub use context::{RequestContext, ResponseInfo};
pub use options::{resolve_options, Headers, RawRequestFactory, RequestOptions};
pub use service::RequestService;
pub use transport::{
    BodyStream, PlainTransport, RawRequest, RawResponse, SecureTransport, Transport,
    TransportProvider,
};
