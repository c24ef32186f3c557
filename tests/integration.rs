//! Integration tests using the embedded sample model
//!
//! The sample is a two-list model rooted at SID 1000:
//! `{1000: {12: {1: [{2: 1.0, 1: 1024.0}, {2: 2.0, 1: 2048.0}]},
//!          7: {1: [{3: 1.0, 2: 987654.0, 1: 1002.0}, {3: 2.0, 2: 876543.0, 1: 1003.0}]}}}`
//! with list 1013 keyed by 1015 and list 1008 keyed by 1011.

use std::sync::Arc;

use coreconf_sid::coap_types::{ContentFormat, Method, Request, ResponseCode};
use coreconf_sid::fetch::resolve_one;
use coreconf_sid::{
    Datastore, FetchRequestBuilder, InstanceId, KeyMapping, RequestHandler, ResolverConfig, Value,
    cbor,
};

const SAMPLE_MODEL: &[u8] = include_bytes!("../testdata/sample_model.cbor");
const SAMPLE_KEYS: &[u8] = include_bytes!("../testdata/sample_keys.cbor");

fn sample_handler() -> RequestHandler {
    let datastore = Datastore::load(ResolverConfig::default(), SAMPLE_MODEL, SAMPLE_KEYS)
        .expect("Failed to load sample model");
    RequestHandler::new(Arc::new(datastore))
}

fn fetch(handler: &RequestHandler, payload: Vec<u8>) -> (ResponseCode, Vec<Value>) {
    let request = Request::new(Method::Fetch).with_payload(payload, ContentFormat::Cbor);
    let response = handler.handle(&request);
    if !response.code.is_success() {
        return (response.code, Vec::new());
    }
    let values = FetchRequestBuilder::parse_response(&response.payload, 128)
        .expect("Failed to parse response");
    (response.code, values)
}

/// First node with absolute SID `target` in pre-order, list entries in order
fn naive_find(node: &Value, sid: u64, target: u64) -> Option<&Value> {
    match node {
        Value::Map(entries) => entries.iter().find_map(|(delta, child)| {
            let child_sid = sid + delta;
            if child_sid == target {
                Some(child)
            } else {
                naive_find(child, child_sid, target)
            }
        }),
        Value::Array(items) => items.iter().find_map(|entry| naive_find(entry, sid, target)),
        _ => None,
    }
}

fn naive_sids(node: &Value, sid: u64, out: &mut Vec<u64>) {
    match node {
        Value::Map(entries) => {
            for (delta, child) in entries {
                out.push(sid + delta);
                naive_sids(child, sid + delta, out);
            }
        }
        Value::Array(items) => {
            for entry in items {
                naive_sids(entry, sid, out);
            }
        }
        _ => {}
    }
}

#[test]
fn test_sample_fetch() {
    let handler = sample_handler();
    let payload = FetchRequestBuilder::new(5)
        .sid(1008)
        .keyed(1013, [Value::Uint(2)])
        .build()
        .unwrap();

    let (code, values) = fetch(&handler, payload);
    assert_eq!(code, ResponseCode::Content);
    assert_eq!(values.len(), 2);

    let counters = values[0].as_array().unwrap();
    assert_eq!(counters.len(), 2);
    assert_eq!(counters[0].get(1), Some(&Value::Float(1002.0)));
    assert_eq!(counters[1].get(2), Some(&Value::Float(876543.0)));

    assert_eq!(
        values[1],
        Value::map([(2, Value::Float(2.0)), (1, Value::Float(2048.0))])
    );
}

#[test]
fn test_results_keep_request_order() {
    let handler = sample_handler();
    let payload = FetchRequestBuilder::new(5)
        .sid(1010)
        .sid(4242)
        .keyed(1014, [Value::Uint(2)])
        .sid(1009)
        .keyed(1014, [Value::Uint(1)])
        .build()
        .unwrap();

    let (_, values) = fetch(&handler, payload);
    assert_eq!(
        values,
        vec![
            Value::Float(987654.0),
            Value::Float(2048.0),
            Value::Float(1002.0),
            Value::Float(1024.0),
        ]
    );
}

#[test]
fn test_fetch_cardinality_bound() {
    let handler = sample_handler();
    let max = handler.datastore().config().max_fetch_entries;

    let at_max = (0..max).map(|_| Value::Uint(1009)).collect::<Vec<_>>();
    let payload = cbor::encode(&Value::Array(at_max), 64).unwrap();
    let (code, values) = fetch(&handler, payload);
    assert_eq!(code, ResponseCode::Content);
    assert_eq!(values.len(), max);

    let over = (0..=max).map(|_| Value::Uint(1009)).collect::<Vec<_>>();
    let payload = cbor::encode(&Value::Array(over), 64).unwrap();
    let (code, _) = fetch(&handler, payload);
    assert_eq!(code, ResponseCode::BadRequest);
}

#[test]
fn test_index_matches_naive_search() {
    let handler = sample_handler();
    let snapshot = handler.datastore().snapshot();
    let model = snapshot.model();

    let mut expected = Vec::new();
    naive_sids(model, 0, &mut expected);
    expected.sort_unstable();
    expected.dedup();
    assert_eq!(snapshot.index().sids(), expected);

    for sid in expected {
        let query = InstanceId::new(sid);
        assert_eq!(
            resolve_one(&snapshot, &query),
            naive_find(model, 0, sid),
            "SID {}",
            sid
        );
    }
}

#[test]
fn test_unknown_sids_miss() {
    let handler = sample_handler();
    let snapshot = handler.datastore().snapshot();
    for sid in [0, 999, 1001, 1006, 1016, u64::MAX] {
        assert!(!snapshot.index().contains(sid));
        assert_eq!(resolve_one(&snapshot, &InstanceId::new(sid)), None);
    }
}

#[test]
fn test_fetch_is_idempotent() {
    let handler = sample_handler();
    let payload = hex::decode("821903f0821903f502").unwrap();
    let request = Request::new(Method::Fetch).with_payload(payload, ContentFormat::Cbor);

    let first = handler.handle(&request);
    let second = handler.handle(&request);
    assert_eq!(first.code, second.code);
    assert_eq!(first.payload, second.payload);
}

#[test]
fn test_composite_keys_disambiguate() {
    // {2000: {1: [{1: 1, 2: "eth0", 3: 10}, {1: 1, 2: "eth1", 3: 20}]}}
    // list 2001 keyed by [2002, 2003]
    let model = Value::map([(
        2000,
        Value::map([(
            1,
            Value::Array(vec![
                Value::map([(1, Value::Uint(1)), (2, Value::from("eth0")), (3, Value::Uint(10))]),
                Value::map([(1, Value::Uint(1)), (2, Value::from("eth1")), (3, Value::Uint(20))]),
            ]),
        )]),
    )]);
    let mut keys = KeyMapping::new();
    keys.insert(2001, vec![2002, 2003]);

    let datastore = Datastore::with_model(ResolverConfig::default(), model, keys).unwrap();
    let handler = RequestHandler::new(Arc::new(datastore));

    let payload = FetchRequestBuilder::new(5)
        .keyed(2004, [Value::Uint(1), Value::from("eth1")])
        .keyed(2004, [Value::Uint(1), Value::from("eth0")])
        .keyed(2004, [Value::Uint(2), Value::from("eth0")])
        .build()
        .unwrap();

    let (_, values) = fetch(&handler, payload);
    assert_eq!(values, vec![Value::Uint(20), Value::Uint(10)]);
}

#[test]
fn test_handle_into_transport_buffer() {
    let handler = sample_handler();
    let payload = FetchRequestBuilder::new(5)
        .keyed(1013, [Value::Uint(1)])
        .build()
        .unwrap();

    let mut out = [0u8; 128];
    let (code, len) = handler.handle_into(&payload, &mut out);
    assert_eq!(code, ResponseCode::Content);

    let values = FetchRequestBuilder::parse_response(&out[..len], 128).unwrap();
    assert_eq!(values[0].get(1), Some(&Value::Float(1024.0)));
}

#[test]
fn test_key_mapping_from_sid_file() {
    let from_sid = KeyMapping::from_sid_file("testdata/sample.sid").unwrap();
    let from_cbor = KeyMapping::from_cbor(SAMPLE_KEYS, 128).unwrap();
    assert_eq!(from_sid, from_cbor);
}

#[test]
fn test_config_file() {
    let config = ResolverConfig::from_file("testdata/resolver.json").unwrap();
    assert_eq!(config, ResolverConfig::default());
}

#[test]
fn test_reload_under_load() {
    let handler = sample_handler();
    // Same shape, different buffer sizes
    let replacement = Value::map([(
        1000,
        Value::map([
            (
                12,
                Value::map([(
                    1,
                    Value::Array(vec![Value::map([
                        (2, Value::Float(1.0)),
                        (1, Value::Float(4096.0)),
                    ])]),
                )]),
            ),
            (
                7,
                Value::map([(
                    1,
                    Value::Array(vec![Value::map([
                        (3, Value::Float(1.0)),
                        (2, Value::Float(5.0)),
                        (1, Value::Float(1002.0)),
                    ])]),
                )]),
            ),
        ]),
    )]);
    let keys = KeyMapping::from_cbor(SAMPLE_KEYS, 128).unwrap();
    let payload = FetchRequestBuilder::new(5)
        .keyed(1014, [Value::Uint(1)])
        .build()
        .unwrap();

    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..200 {
                    let (code, values) = fetch(&handler, payload.clone());
                    assert_eq!(code, ResponseCode::Content);
                    assert!(
                        values == vec![Value::Float(1024.0)] || values == vec![Value::Float(4096.0)],
                        "unexpected {:?}",
                        values
                    );
                }
            });
        }
        let generation = handler
            .datastore()
            .reload_value(replacement, keys)
            .unwrap();
        assert_eq!(generation, 2);
    });

    let (_, values) = fetch(&handler, payload);
    assert_eq!(values, vec![Value::Float(4096.0)]);
    assert_eq!(handler.stats().requests, 801);
}

#[test]
fn test_get_returns_model() {
    let config = ResolverConfig {
        max_response_len: 4096,
        ..ResolverConfig::default()
    };
    let datastore = Datastore::load(config, SAMPLE_MODEL, SAMPLE_KEYS).unwrap();
    let handler = RequestHandler::new(Arc::new(datastore));
    let response = handler.handle(&Request::new(Method::Get));
    assert!(response.code.is_success());
    assert_eq!(
        cbor::decode(&response.payload, 4096).unwrap(),
        cbor::decode(SAMPLE_MODEL, 4096).unwrap()
    );
}
