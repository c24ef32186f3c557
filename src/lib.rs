//! coreconf-sid - SID resolution for CORECONF (CoAP Management Interface)
//!
//! This library indexes a delta-SID encoded CBOR model, resolves FETCH
//! queries made of SIDs and list key values, and extracts the addressed
//! subtrees, plus CoAP request/response handling for the FETCH resource.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use coreconf_sid::{Datastore, RequestHandler, ResolverConfig};
//! use coreconf_sid::coap_types::{ContentFormat, Method, Request};
//!
//! let model = std::fs::read("model.cbor").unwrap();
//! let keys = std::fs::read("keys.cbor").unwrap();
//!
//! // Decode and index the model
//! let datastore = Datastore::load(ResolverConfig::default(), &model, &keys).unwrap();
//!
//! // Create request handler
//! let handler = RequestHandler::new(Arc::new(datastore));
//!
//! // [1008, [1013, 2]]
//! let payload = vec![0x82, 0x19, 0x03, 0xf0, 0x82, 0x19, 0x03, 0xf5, 0x02];
//! let request = Request::new(Method::Fetch).with_payload(payload, ContentFormat::Cbor);
//! let response = handler.handle(&request);
//! ```

pub mod cbor;
pub mod coap_types;
pub mod config;
pub mod datastore;
mod error;
pub mod extract;
pub mod fetch;
pub mod handler;
pub mod instance_id;
pub mod key_mapping;
pub mod path;
pub mod request_builder;
pub mod sid;
pub mod value;

pub use config::ResolverConfig;
pub use datastore::{Datastore, ModelSnapshot};
pub use error::{CoreconfError, DecodeError, EncodeError, ErrorKind, Result};
pub use fetch::{FetchOutcome, handle_fetch};
pub use handler::{RequestHandler, StatsSnapshot};
pub use instance_id::InstanceId;
pub use key_mapping::KeyMapping;
pub use request_builder::FetchRequestBuilder;
pub use sid::SidIndex;
pub use value::{NodeKind, Value};
