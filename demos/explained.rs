//! CORECONF SID resolution explained - walks a FETCH through every stage
//!
//! Run with: cargo run --example explained
//!
//! This example shows what happens between a FETCH payload arriving and the
//! response bytes leaving, using the bundled sample model.

use coreconf_sid::coap_types::{ContentFormat, Method, Request};
use coreconf_sid::extract::extract;
use coreconf_sid::path::resolve_path;
use coreconf_sid::{
    Datastore, FetchRequestBuilder, InstanceId, RequestHandler, ResolverConfig, Value, cbor,
};
use std::sync::Arc;

const SAMPLE_MODEL: &[u8] = include_bytes!("../testdata/sample_model.cbor");
const SAMPLE_KEYS: &[u8] = include_bytes!("../testdata/sample_keys.cbor");

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("╔══════════════════════════════════════════════════════════════════════╗");
    println!("║                 CORECONF SID Resolution Explained                    ║");
    println!("╚══════════════════════════════════════════════════════════════════════╝\n");

    // ========== SETUP ==========
    println!("┌─ SETUP ──────────────────────────────────────────────────────────────┐");
    println!("│ CORECONF names YANG nodes by SID. Map keys in the model are deltas:  │");
    println!("│ a child's SID is its parent's SID plus the key.                      │");
    println!("└──────────────────────────────────────────────────────────────────────┘\n");

    let datastore = Datastore::load(ResolverConfig::default(), SAMPLE_MODEL, SAMPLE_KEYS)?;
    let snapshot = datastore.snapshot();

    println!("Model CBOR ({} bytes): {}", SAMPLE_MODEL.len(), hex::encode(SAMPLE_MODEL));
    println!("Decoded:  {}", snapshot.model());
    println!("Key mapping CBOR: {}", hex::encode(SAMPLE_KEYS));
    for (list, keys) in snapshot.keys().iter() {
        println!("  list {} keyed by {:?}", list, keys);
    }
    println!();

    // ========== INDEX ==========
    println!("┌─ 1. SID Index ───────────────────────────────────────────────────────┐");
    println!("│ One walk over the model records the delta path to every SID.         │");
    println!("└──────────────────────────────────────────────────────────────────────┘\n");

    for sid in snapshot.index().sids() {
        if let Some(spec) = snapshot.index().resolve(sid) {
            println!("  {:>5}  {:<10} deltas {:?}", sid, format!("{:?}", spec.kind), spec.deltas);
        }
    }
    println!();

    // ========== RESOLVE ==========
    println!("┌─ 2. Path Resolution ─────────────────────────────────────────────────┐");
    println!("│ Query [1013, 2]: the entry of list 1013 whose key leaf 1015 is 2.    │");
    println!("└──────────────────────────────────────────────────────────────────────┘\n");

    let query = InstanceId::with_keys(1013, [Value::Uint(2)]);
    let path = resolve_path(snapshot.index(), snapshot.keys(), query.sid, query.keys.as_slice())
        .ok_or("sample query did not resolve")?;
    for node in &path.nodes {
        let keys: Vec<String> = node.keys.iter().map(Value::to_string).collect();
        println!(
            "  SID {:>5} (delta {:>4}) {:<10} keys {:?}",
            node.sid,
            node.delta,
            format!("{:?}", node.kind),
            keys
        );
    }

    let subtree = extract(snapshot.model(), &path, snapshot.keys()).ok_or("no matching entry")?;
    println!("\nExtracted subtree: {}", subtree);
    println!();

    // ========== FETCH ==========
    println!("┌─ 3. FETCH Request ───────────────────────────────────────────────────┐");
    println!("│ CoAP:    FETCH /sid with payload [1008, [1013, 2], 4242]             │");
    println!("│ 4242 is not in the model, so it is skipped.                          │");
    println!("└──────────────────────────────────────────────────────────────────────┘\n");

    let handler = RequestHandler::new(Arc::new(datastore));
    let payload = FetchRequestBuilder::new(5)
        .sid(1008)
        .keyed(1013, [Value::Uint(2)])
        .sid(4242)
        .build()?;
    println!("Request Payload (CBOR): {}", hex::encode(&payload));

    let request = Request::new(Method::Fetch).with_payload(payload, ContentFormat::Cbor);
    let response = handler.handle(&request);

    println!("\nResponse Code: {}", response.code);
    println!(
        "Response CBOR ({} bytes): {}",
        response.payload.len(),
        hex::encode(&response.payload)
    );
    let values = FetchRequestBuilder::parse_response(&response.payload, response.payload.len())?;
    println!("\nDecoded Response:");
    for (i, value) in values.iter().enumerate() {
        println!("  [{}] {}", i, value);
    }
    println!();

    // ========== LIMITS ==========
    println!("┌─ 4. Limits ──────────────────────────────────────────────────────────┐");
    println!("│ More than five queries in one FETCH is rejected as a whole.          │");
    println!("└──────────────────────────────────────────────────────────────────────┘\n");

    let too_many = Value::Array(vec![Value::Uint(1009); 6]);
    let request = Request::new(Method::Fetch)
        .with_payload(cbor::encode(&too_many, 64)?, ContentFormat::Cbor);
    let response = handler.handle(&request);
    println!("Response Code: {}", response.code);
    println!("Diagnostic:    {}", String::from_utf8_lossy(&response.payload));

    let stats = handler.stats();
    println!("\n╔══════════════════════════════════════════════════════════════════════╗");
    println!("║                           Summary                                    ║");
    println!("╠══════════════════════════════════════════════════════════════════════╣");
    println!(
        "║ requests {:<3} resolved {:<3} missed {:<3} rejected {:<3}                   ║",
        stats.requests, stats.resolved, stats.missed, stats.rejected
    );
    println!("╚══════════════════════════════════════════════════════════════════════╝");

    Ok(())
}
