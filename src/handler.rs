//! SID resolution request handler
//!
//! CoAP library-agnostic entry point: feed it a [`Request`] (or a raw
//! payload and an output buffer) and send back what it returns.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::cbor;
use crate::coap_types::{ContentFormat, Method, Request, Response, ResponseCode};
use crate::datastore::Datastore;
use crate::error::{CoreconfError, ErrorKind};
use crate::fetch::handle_fetch;

/// Counters for one server process
///
/// `rejected` counts requests answered with an error status, response
/// overflows included. `positional` counts resolved entries that crossed a
/// keyed list without key values and so matched its first entry.
#[derive(Debug, Default)]
pub struct RequestStats {
    requests: AtomicU64,
    resolved: AtomicU64,
    missed: AtomicU64,
    positional: AtomicU64,
    rejected: AtomicU64,
}

/// Point-in-time copy of [`RequestStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub requests: u64,
    pub resolved: u64,
    pub missed: u64,
    pub positional: u64,
    pub rejected: u64,
}

impl RequestStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            resolved: self.resolved.load(Ordering::Relaxed),
            missed: self.missed.load(Ordering::Relaxed),
            positional: self.positional.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.requests.store(0, Ordering::Relaxed);
        self.resolved.store(0, Ordering::Relaxed);
        self.missed.store(0, Ordering::Relaxed);
        self.positional.store(0, Ordering::Relaxed);
        self.rejected.store(0, Ordering::Relaxed);
    }
}

/// Main request handler
///
/// # Example
/// ```ignore
/// let handler = RequestHandler::new(Arc::new(datastore));
/// let response = handler.handle(&request);
/// // Send response via your CoAP transport
/// ```
#[derive(Debug)]
pub struct RequestHandler {
    datastore: Arc<Datastore>,
    stats: RequestStats,
}

impl RequestHandler {
    /// Create a new request handler over a shared datastore
    pub fn new(datastore: Arc<Datastore>) -> Self {
        Self {
            datastore,
            stats: RequestStats::default(),
        }
    }

    pub fn datastore(&self) -> &Arc<Datastore> {
        &self.datastore
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    /// Handle an incoming request
    pub fn handle(&self, request: &Request) -> Response {
        self.stats.requests.fetch_add(1, Ordering::Relaxed);
        match request.method {
            Method::Get => self.handle_get(),
            Method::Fetch => self.handle_fetch(request),
        }
    }

    /// Handle a FETCH payload into a transport buffer.
    ///
    /// Returns the status and the number of bytes written to `out`. When the
    /// response body does not fit, nothing is written and the status is
    /// 5.00.
    pub fn handle_into(&self, payload: &[u8], out: &mut [u8]) -> (ResponseCode, usize) {
        let request = Request::new(Method::Fetch).with_payload(payload.to_vec(), ContentFormat::Cbor);
        let response = self.handle(&request);

        if !response.code.is_success() {
            return (response.code, 0);
        }
        if response.payload.len() > out.len() {
            tracing::warn!(
                needed = response.payload.len(),
                available = out.len(),
                "response does not fit transport buffer"
            );
            return (ResponseCode::InternalServerError, 0);
        }
        out[..response.payload.len()].copy_from_slice(&response.payload);
        (response.code, response.payload.len())
    }

    /// Handle GET - the whole model
    fn handle_get(&self) -> Response {
        let snapshot = self.datastore.snapshot();
        match cbor::encode(snapshot.model(), self.datastore.config().max_response_len) {
            Ok(bytes) => Response::content(bytes, ContentFormat::Cbor),
            Err(e) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %e, "model does not fit response");
                Response::empty(ResponseCode::InternalServerError)
            }
        }
    }

    /// Handle FETCH - resolve a batch of SID queries
    ///
    /// Request payload: CBOR array of SIDs and `[SID, key...]` arrays
    /// Response payload: CBOR array of the resolved subtrees
    fn handle_fetch(&self, request: &Request) -> Response {
        if let Some(format) = request.content_format {
            if format != ContentFormat::Cbor && format != ContentFormat::YangIdentifiersCbor {
                return Response::error(
                    ResponseCode::UnsupportedContentFormat,
                    "expected application/cbor",
                );
            }
        }

        let config = self.datastore.config();
        match self.resolve_payload(&request.payload) {
            Ok(resolved) => {
                let hits = resolved.hits as u64;
                let misses = (resolved.requested - resolved.hits) as u64;
                self.stats.resolved.fetch_add(hits, Ordering::Relaxed);
                self.stats.missed.fetch_add(misses, Ordering::Relaxed);
                self.stats
                    .positional
                    .fetch_add(resolved.positional as u64, Ordering::Relaxed);

                if config.not_found_on_single_miss && resolved.requested == 1 && hits == 0 {
                    return Response::empty(ResponseCode::NotFound);
                }
                Response::content(resolved.body, ContentFormat::Cbor)
            }
            Err(CoreconfError::Encode(e)) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %e, "FETCH response overflow");
                Response::empty(ResponseCode::InternalServerError)
            }
            Err(e) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %e, "FETCH rejected");
                let code = match e.kind() {
                    ErrorKind::Format | ErrorKind::Capacity => ResponseCode::BadRequest,
                    ErrorKind::StateConsistency | ErrorKind::Io => {
                        ResponseCode::InternalServerError
                    }
                };
                Response::error(code, &e.to_string())
            }
        }
    }

    /// Decode, resolve and re-encode one FETCH payload
    fn resolve_payload(&self, payload: &[u8]) -> Result<Resolved, CoreconfError> {
        let config = self.datastore.config();
        if payload.len() > config.max_request_len {
            return Err(CoreconfError::PayloadTooLarge {
                what: "FETCH payload",
                len: payload.len(),
                max: config.max_request_len,
            });
        }

        let request = cbor::decode_with_depth(payload, config.max_request_len, config.max_depth)?;
        let snapshot = self.datastore.snapshot();
        let outcome = handle_fetch(&snapshot, &request, config.max_fetch_entries)?;

        let requested = outcome.requested;
        let hits = outcome.values.len();
        let positional = outcome.positional;
        tracing::debug!(
            generation = snapshot.generation(),
            requested,
            hits,
            positional,
            "FETCH resolved"
        );

        let body = cbor::encode(&outcome.into_value(), config.max_response_len)?;
        Ok(Resolved {
            body,
            requested,
            hits,
            positional,
        })
    }
}

/// Encoded FETCH response and the counts behind it
struct Resolved {
    body: Vec<u8>,
    requested: usize,
    hits: usize,
    positional: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolverConfig;
    use crate::value::Value;

    const SAMPLE_MODEL: &[u8] = include_bytes!("../testdata/sample_model.cbor");
    const SAMPLE_KEYS: &[u8] = include_bytes!("../testdata/sample_keys.cbor");

    fn create_handler(config: ResolverConfig) -> RequestHandler {
        let datastore = Datastore::load(config, SAMPLE_MODEL, SAMPLE_KEYS).unwrap();
        RequestHandler::new(Arc::new(datastore))
    }

    fn fetch(payload: &str) -> Request {
        Request::new(Method::Fetch)
            .with_payload(hex::decode(payload).unwrap(), ContentFormat::Cbor)
    }

    #[test]
    fn test_handle_fetch_sample() {
        let handler = create_handler(ResolverConfig::default());
        // [1008, [1013, 2]]
        let response = handler.handle(&fetch("821903f0821903f502"));

        assert_eq!(response.code, ResponseCode::Content);
        let values = cbor::decode(&response.payload, 128).unwrap();
        let values = values.as_array().unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[1].get(1), Some(&Value::Float(2048.0)));

        let stats = handler.stats();
        assert_eq!(stats.requests, 1);
        assert_eq!(stats.resolved, 2);
        assert_eq!(stats.missed, 0);
    }

    #[test]
    fn test_handle_fetch_all_miss() {
        let handler = create_handler(ResolverConfig::default());
        // [4242]
        let response = handler.handle(&fetch("81191092"));

        assert_eq!(response.code, ResponseCode::Content);
        assert_eq!(hex::encode(&response.payload), "80");
        assert_eq!(handler.stats().missed, 1);
    }

    #[test]
    fn test_single_miss_not_found_option() {
        let handler = create_handler(ResolverConfig {
            not_found_on_single_miss: true,
            ..ResolverConfig::default()
        });
        assert_eq!(handler.handle(&fetch("81191092")).code, ResponseCode::NotFound);
        assert_eq!(handler.handle(&fetch("811903f0")).code, ResponseCode::Content);
    }

    #[test]
    fn test_too_many_queries() {
        let handler = create_handler(ResolverConfig::default());
        // six times 1009
        let response = handler.handle(&fetch("861903f11903f11903f11903f11903f11903f1"));

        assert_eq!(response.code, ResponseCode::BadRequest);
        assert_eq!(handler.stats().rejected, 1);
    }

    #[test]
    fn test_malformed_payload() {
        let handler = create_handler(ResolverConfig::default());
        assert_eq!(handler.handle(&fetch("82")).code, ResponseCode::BadRequest);
        assert_eq!(handler.handle(&fetch("1903f0")).code, ResponseCode::BadRequest);
    }

    #[test]
    fn test_payload_over_limit() {
        let handler = create_handler(ResolverConfig {
            max_request_len: 4,
            ..ResolverConfig::default()
        });
        let response = handler.handle(&fetch("821903f01903f1"));
        assert_eq!(response.code, ResponseCode::BadRequest);
    }

    #[test]
    fn test_response_overflow() {
        let handler = create_handler(ResolverConfig {
            max_response_len: 16,
            ..ResolverConfig::default()
        });
        // [1007]: the whole second variant
        let response = handler.handle(&fetch("811903ef"));

        assert_eq!(response.code, ResponseCode::InternalServerError);
        assert!(response.payload.is_empty());
        assert_eq!(handler.stats().rejected, 1);
    }

    #[test]
    fn test_empty_fetch_payload_rejected() {
        let handler = create_handler(ResolverConfig::default());
        let response = handler.handle(&fetch(""));
        assert_eq!(response.code, ResponseCode::BadRequest);

        let mut out = [0u8; 128];
        assert_eq!(handler.handle_into(&[], &mut out), (ResponseCode::BadRequest, 0));
        assert_eq!(handler.stats().rejected, 2);
    }

    #[test]
    fn test_positional_stats() {
        let handler = create_handler(ResolverConfig::default());
        // [1009, [1009, 2]]
        let response = handler.handle(&fetch("821903f1821903f102"));
        assert_eq!(response.code, ResponseCode::Content);

        let stats = handler.stats();
        assert_eq!(stats.resolved, 2);
        assert_eq!(stats.positional, 1);
    }

    #[test]
    fn test_unsupported_content_format() {
        let handler = create_handler(ResolverConfig::default());
        let request = Request::new(Method::Fetch)
            .with_payload(vec![0x80], ContentFormat::YangDataCbor);
        assert_eq!(
            handler.handle(&request).code,
            ResponseCode::UnsupportedContentFormat
        );
    }

    #[test]
    fn test_handle_get() {
        let handler = create_handler(ResolverConfig::default());
        let response = handler.handle(&Request::new(Method::Get));

        assert!(response.code.is_success());
        let model = cbor::decode(&response.payload, 4096).unwrap();
        assert_eq!(&model, handler.datastore().snapshot().model());
    }

    #[test]
    fn test_handle_into() {
        let handler = create_handler(ResolverConfig::default());
        let payload = hex::decode("811903f1").unwrap();

        let mut out = [0u8; 64];
        let (code, len) = handler.handle_into(&payload, &mut out);
        assert_eq!(code, ResponseCode::Content);
        assert_eq!(cbor::decode(&out[..len], 64).unwrap(), Value::Array(vec![Value::Float(1002.0)]));

        let mut small = [0u8; 2];
        assert_eq!(
            handler.handle_into(&payload, &mut small),
            (ResponseCode::InternalServerError, 0)
        );
    }

    #[test]
    fn test_reset_stats() {
        let handler = create_handler(ResolverConfig::default());
        handler.handle(&fetch("811903f1"));
        handler.reset_stats();
        assert_eq!(handler.stats(), StatsSnapshot::default());
    }
}
