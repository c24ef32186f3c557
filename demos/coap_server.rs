//! CORECONF SID resolution CoAP server
//!
//! Usage:
//!   cargo run --example coap_server -- --model model.cbor --keys keys.cbor [--port 5683]
//!   cargo run --example coap_server -- --model model.cbor --keys model.sid list
//!
//! `--keys` takes either a CBOR key-mapping blob or a `.sid` file.

use clap::{Parser, Subcommand};
use coap_lite::{
    CoapOption, CoapRequest, ContentFormat as CoapContentFormat, MessageClass, Packet,
    RequestType, ResponseType,
};
use coreconf_sid::coap_types::{ContentFormat, Method, Request};
use coreconf_sid::{Datastore, KeyMapping, RequestHandler, ResolverConfig, cbor};
use std::net::UdpSocket;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "coreconf-sid-server")]
#[command(about = "CORECONF CoAP Server - Resolve SID queries over CoAP FETCH")]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to the CBOR model
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Path to the key mapping (CBOR blob or .sid JSON)
    #[arg(short, long, global = true)]
    keys: Option<String>,

    /// Path to a JSON resolver config
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// UDP port to listen on
    #[arg(short, long, default_value = "5683")]
    port: u16,

    /// Resource path for the FETCH resource
    #[arg(long, default_value = "sid")]
    path: String,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List all SIDs in the model
    List,
}

type BoxError = Box<dyn std::error::Error>;

fn main() -> Result<(), BoxError> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let model_path = args.model.as_deref().ok_or("--model is required")?;
    let keys_path = args.keys.as_deref().ok_or("--keys is required")?;
    let config = match args.config.as_deref() {
        Some(path) => ResolverConfig::from_file(path)?,
        None => ResolverConfig::default(),
    };
    let datastore = load_datastore(config, model_path, keys_path)?;

    match args.command {
        Some(Commands::List) => list_sids(&datastore),
        None => run_server(datastore, args.port, &args.path, args.verbose)?,
    }

    Ok(())
}

fn load_datastore(
    config: ResolverConfig,
    model_path: &str,
    keys_path: &str,
) -> Result<Datastore, BoxError> {
    let model = std::fs::read(model_path)?;

    let is_sid_file = Path::new(keys_path)
        .extension()
        .is_some_and(|ext| ext == "sid" || ext == "json");
    let datastore = if is_sid_file {
        let keys = KeyMapping::from_sid_file(keys_path)?;
        let model = cbor::decode_with_depth(&model, config.max_model_len, config.max_depth)?;
        Datastore::with_model(config, model, keys)?
    } else {
        let keys = std::fs::read(keys_path)?;
        Datastore::load(config, &model, &keys)?
    };
    Ok(datastore)
}

fn list_sids(datastore: &Datastore) {
    let snapshot = datastore.snapshot();

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║  SIDs in model ({:>4} indexed)                                ║", snapshot.index().len());
    println!("╠══════════════════════════════════════════════════════════════╣");

    for sid in snapshot.index().sids() {
        let Some(spec) = snapshot.index().resolve(sid) else {
            continue;
        };
        let keys = snapshot.keys().keys_for(sid);
        let keys_str = if keys.is_empty() {
            String::new()
        } else {
            format!("keys {:?}", keys)
        };
        println!(
            "║  {:>8}  {:<10} depth {:<3} {:<30} ║",
            sid,
            format!("{:?}", spec.kind),
            spec.deltas.len(),
            keys_str
        );
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
}

fn run_server(datastore: Datastore, port: u16, res_path: &str, verbose: bool) -> Result<(), BoxError> {
    let handler = RequestHandler::new(Arc::new(datastore));

    // Set up Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    // Bind socket
    let bind_addr = format!("0.0.0.0:{}", port);
    let socket = UdpSocket::bind(&bind_addr)?;
    socket.set_read_timeout(Some(std::time::Duration::from_millis(500)))?;

    tracing::info!(addr = %bind_addr, resource = %res_path, "server listening");
    println!("\nQuick test:");
    println!("  cargo run --example coap_client -- --server 127.0.0.1:{}", port);
    println!("  coreconf> fetch 1008 [1013,2]");
    println!("\nWaiting for requests... (Ctrl+C to stop)\n");

    let mut buf = [0u8; 1500];

    while running.load(Ordering::SeqCst) {
        let (len, src) = match socket.recv_from(&mut buf) {
            Ok(r) => r,
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::Interrupted =>
            {
                continue; // Check running flag
            }
            Err(e) => return Err(e.into()),
        };

        let packet = match Packet::from_bytes(&buf[..len]) {
            Ok(packet) => packet,
            Err(e) => {
                tracing::debug!(%src, error = ?e, "dropping undecodable datagram");
                continue;
            }
        };

        // Skip empty ACK packets (follow-up confirmations)
        if matches!(packet.header.code, MessageClass::Empty) {
            continue;
        }

        let request = CoapRequest::from_packet(packet, src);
        let path = request.get_path();

        let response_packet = if path != res_path {
            reply(&request.message, ResponseType::NotFound)
        } else {
            if verbose && !request.message.payload.is_empty() {
                tracing::debug!(%src, payload = %hex::encode(&request.message.payload), "request");
            }
            handle_coap_request(&handler, &request.message)
        };

        tracing::info!(
            %src,
            method = format_method(&request.message.header.code),
            path = %path,
            code = ?response_packet.header.code,
            bytes = response_packet.payload.len(),
            "handled"
        );

        let response_bytes = response_packet.to_bytes().unwrap_or_default();
        socket.send_to(&response_bytes, src)?;
    }

    let stats = handler.stats();
    tracing::info!(
        requests = stats.requests,
        resolved = stats.resolved,
        missed = stats.missed,
        positional = stats.positional,
        rejected = stats.rejected,
        "shutting down"
    );
    println!("{}", serde_json::to_string_pretty(&stats)?);

    Ok(())
}

fn handle_coap_request(handler: &RequestHandler, packet: &Packet) -> Packet {
    let method = match packet.header.code {
        MessageClass::Request(RequestType::Get) => Method::Get,
        MessageClass::Request(RequestType::Fetch) => Method::Fetch,
        _ => return reply(packet, ResponseType::MethodNotAllowed),
    };

    let mut request = Request::new(method);
    request.payload = packet.payload.clone();

    if let Some(raw) = raw_content_format(packet) {
        match ContentFormat::from_u16(raw) {
            Some(format) => request.content_format = Some(format),
            None => return reply(packet, ResponseType::UnsupportedContentFormat),
        }
    }

    let resolved = handler.handle(&request);

    let mut response = reply(packet, ResponseType::InternalServerError);
    let (class, detail) = resolved.code.to_code_pair();
    response.header.code = match (class, detail) {
        (2, 5) => MessageClass::Response(ResponseType::Content),
        (4, 0) => MessageClass::Response(ResponseType::BadRequest),
        (4, 4) => MessageClass::Response(ResponseType::NotFound),
        (4, 15) => MessageClass::Response(ResponseType::UnsupportedContentFormat),
        _ => MessageClass::Response(ResponseType::InternalServerError),
    };

    if !resolved.payload.is_empty() {
        response.payload = resolved.payload;
        if resolved.content_format.is_some() {
            response.set_content_format(CoapContentFormat::ApplicationCBOR);
        }
    }

    response
}

/// Content-Format option as a raw number, if present
fn raw_content_format(packet: &Packet) -> Option<u16> {
    let values = packet.get_option(CoapOption::ContentFormat)?;
    let raw = values.front()?;
    Some(raw.iter().fold(0u16, |acc, b| (acc << 8) | u16::from(*b)))
}

fn reply(request: &Packet, code: ResponseType) -> Packet {
    let mut response = Packet::new();
    response.header.message_id = request.header.message_id;
    response.header.code = MessageClass::Response(code);
    response.set_token(request.get_token().to_vec());
    response
}

fn format_method(code: &MessageClass) -> &'static str {
    match code {
        MessageClass::Request(RequestType::Get) => "GET",
        MessageClass::Request(RequestType::Post) => "POST",
        MessageClass::Request(RequestType::Put) => "PUT",
        MessageClass::Request(RequestType::Delete) => "DELETE",
        MessageClass::Request(RequestType::Fetch) => "FETCH",
        MessageClass::Request(RequestType::Patch) => "PATCH",
        MessageClass::Request(RequestType::IPatch) => "iPATCH",
        _ => "???",
    }
}
