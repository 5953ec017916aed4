//! Response body decoding.
//!
//! Drains the terminal response, decompressing gzip bodies on the fly, and
//! builds the [`RequestContext`].

use std::io::Write;

use bytes::Bytes;
use flate2::write::MultiGzDecoder;
use futures::StreamExt;
use log::debug;
use reqwest::Url;

use crate::config::{GZIP_ENCODING, HEADER_CONTENT_ENCODING};
use crate::error_handling::RequestError;
use crate::request::context::RequestContext;
use crate::request::transport::RawResponse;

/// Accumulates body chunks in arrival order, inflating them when gzip-encoded.
///
/// Concatenated gzip members decode to the concatenation of their payloads.
enum BodySink {
    Identity(Vec<u8>),
    Gzip {
        decoder: MultiGzDecoder<Vec<u8>>,
        received: bool,
    },
}

impl BodySink {
    fn new(gzip: bool) -> Self {
        if gzip {
            BodySink::Gzip {
                decoder: MultiGzDecoder::new(Vec::new()),
                received: false,
            }
        } else {
            BodySink::Identity(Vec::new())
        }
    }

    fn write(&mut self, chunk: &[u8]) -> Result<(), RequestError> {
        match self {
            BodySink::Identity(buf) => buf.extend_from_slice(chunk),
            BodySink::Gzip { decoder, received } => {
                *received |= !chunk.is_empty();
                decoder.write_all(chunk).map_err(RequestError::Decode)?;
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<Bytes, RequestError> {
        match self {
            BodySink::Identity(buf) => Ok(Bytes::from(buf)),
            // An empty gzip-labelled body (HEAD, 204, 304) decodes to nothing
            BodySink::Gzip {
                received: false, ..
            } => Ok(Bytes::new()),
            BodySink::Gzip { decoder, .. } => {
                let buf = decoder.finish().map_err(RequestError::Decode)?;
                Ok(Bytes::from(buf))
            }
        }
    }
}

/// Returns `true` if `content-encoding` names gzip.
pub(crate) fn is_gzip(response: &RawResponse) -> bool {
    response
        .header(HEADER_CONTENT_ENCODING)
        .is_some_and(|encoding| encoding.trim().eq_ignore_ascii_case(GZIP_ENCODING))
}

/// Drains `response` and builds the context for the attempt at `url`.
///
/// # Errors
///
/// A stream error from the transport is returned unchanged; a corrupt gzip
/// body yields `RequestError::Decode`. No partial context is ever produced.
pub(crate) async fn decode_response(
    url: Url,
    response: RawResponse,
) -> Result<RequestContext, RequestError> {
    let gzip = is_gzip(&response);
    if gzip {
        debug!("Decoding gzip response body from {}", url);
    }

    let RawResponse {
        status,
        headers,
        mut body,
    } = response;

    let mut sink = BodySink::new(gzip);
    while let Some(chunk) = body.next().await {
        sink.write(&chunk?)?;
    }
    let body = sink.finish()?;

    debug!(
        "Received {} {} ({} bytes decoded)",
        status,
        url,
        body.len()
    );
    Ok(RequestContext::new(url, status, headers, body))
}
