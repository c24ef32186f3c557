//! Interactive CORECONF CoAP Client
//!
//! A REPL-style CoAP client for the SID resolution resource.
//!
//! Usage:
//!   cargo run --example coap_client -- [--server 127.0.0.1:5683] [--sid model.sid]
//!
//! Commands:
//!   get                        - Get the whole model
//!   fetch <query> [query...]   - Fetch SIDs, e.g. `fetch 1008 [1013,2]`
//!   list                       - Show SID names from the .sid file
//!   help                       - Show commands
//!   quit                       - Exit

use clap::Parser;
use coap_lite::{ContentFormat as CoapContentFormat, MessageClass, MessageType, Packet, RequestType};
use coreconf_sid::{FetchRequestBuilder, Value};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::net::UdpSocket;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "coap-client")]
#[command(about = "Interactive CORECONF SID resolution client")]
struct Args {
    /// Optional .sid file for naming SIDs
    #[arg(short, long)]
    sid: Option<String>,

    /// Server address
    #[arg(long, default_value = "127.0.0.1:5683")]
    server: String,

    /// Resource path
    #[arg(long, default_value = "sid")]
    path: String,

    /// Most queries per FETCH
    #[arg(long, default_value = "5")]
    max_entries: usize,
}

#[derive(Debug, Deserialize)]
struct SidItem {
    identifier: String,
    sid: u64,
}

#[derive(Debug, Deserialize)]
struct SidNames {
    #[serde(default)]
    item: Vec<SidItem>,
}

struct Client {
    names: BTreeMap<u64, String>,
    socket: UdpSocket,
    path: String,
    max_entries: usize,
    message_id: u16,
}

impl Client {
    fn new(names: BTreeMap<u64, String>, args: &Args) -> io::Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.set_read_timeout(Some(Duration::from_secs(5)))?;
        socket.connect(&args.server)?;

        Ok(Self {
            names,
            socket,
            path: args.path.clone(),
            max_entries: args.max_entries,
            message_id: 1,
        })
    }

    fn send_request(&mut self, request_type: RequestType, payload: Vec<u8>) -> io::Result<Option<Vec<u8>>> {
        let mut packet = Packet::new();
        packet.header.message_id = self.message_id;
        self.message_id = self.message_id.wrapping_add(1);
        packet.header.code = MessageClass::Request(request_type);
        packet.header.set_type(MessageType::Confirmable);
        packet.set_token(vec![0x01]);
        packet.add_option(coap_lite::CoapOption::UriPath, self.path.as_bytes().to_vec());

        if !payload.is_empty() {
            packet.payload = payload;
            packet.set_content_format(CoapContentFormat::ApplicationCBOR);
        }

        let bytes = packet.to_bytes().map_err(|e| io::Error::other(e.to_string()))?;
        self.socket.send(&bytes)?;

        let mut buf = [0u8; 1500];
        match self.socket.recv(&mut buf) {
            Ok(len) => {
                let response =
                    Packet::from_bytes(&buf[..len]).map_err(|e| io::Error::other(e.to_string()))?;
                println!("  Response: {:?}", response.header.code);

                if response.payload.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(response.payload))
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut => {
                println!("  Timeout - no response");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn cmd_get(&mut self) {
        println!("GET /{}", self.path);
        match self.send_request(RequestType::Get, vec![]) {
            Ok(Some(payload)) => match coreconf_sid::cbor::decode(&payload, payload.len()) {
                Ok(model) => println!("  Model: {}", model),
                Err(e) => println!("  CBOR ({} bytes): {} ({})", payload.len(), hex::encode(&payload), e),
            },
            Ok(None) => {}
            Err(e) => println!("  Error: {}", e),
        }
    }

    fn cmd_fetch(&mut self, queries: Vec<(u64, Vec<Value>)>) {
        let mut builder = FetchRequestBuilder::new(self.max_entries);
        for (sid, keys) in queries {
            let name = self.names.get(&sid).map(String::as_str).unwrap_or("(unnamed)");
            if keys.is_empty() {
                println!("  {} = {}", sid, name);
                builder = builder.sid(sid);
            } else {
                println!("  {} = {} keys {:?}", sid, name, keys.iter().map(Value::to_string).collect::<Vec<_>>());
                builder = builder.keyed(sid, keys);
            }
        }

        let payload = match builder.build() {
            Ok(payload) => payload,
            Err(e) => {
                println!("  Failed to build request: {}", e);
                return;
            }
        };
        println!("  → CBOR: {}", hex::encode(&payload));

        match self.send_request(RequestType::Fetch, payload) {
            Ok(Some(response)) => match FetchRequestBuilder::parse_response(&response, response.len()) {
                Ok(values) if values.is_empty() => println!("  (no data for requested SIDs)"),
                Ok(values) => {
                    println!("  Results:");
                    for (i, value) in values.iter().enumerate() {
                        println!("    [{}] {}", i, value);
                    }
                }
                Err(_) => println!("  {}", String::from_utf8_lossy(&response)),
            },
            Ok(None) => println!("  (no data returned)"),
            Err(e) => println!("  Error: {}", e),
        }
    }

    fn cmd_list(&self) {
        if self.names.is_empty() {
            println!("No .sid file loaded (use --sid)");
            return;
        }
        println!("\nSID Mappings:");
        println!("─────────────────────────────────────────────────────────");
        for (sid, name) in &self.names {
            println!("  {:>6}  {}", sid, name);
        }
        println!();
    }
}

/// Split on whitespace outside brackets: `1008 [1013, 2]` -> `1008`, `[1013, 2]`
fn split_queries(input: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    for (i, c) in input.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            c if c.is_whitespace() && depth == 0 => {
                if let Some(s) = start.take() {
                    tokens.push(&input[s..i]);
                }
                continue;
            }
            _ => {}
        }
        start.get_or_insert(i);
    }
    if let Some(s) = start {
        tokens.push(&input[s..]);
    }
    tokens
}

fn json_to_key(value: &serde_json::Value) -> Option<Value> {
    match value {
        serde_json::Value::Number(n) => n
            .as_u64()
            .map(Value::Uint)
            .or_else(|| n.as_i64().map(Value::from))
            .or_else(|| n.as_f64().map(Value::Float)),
        serde_json::Value::String(s) => Some(Value::Text(s.clone())),
        serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
        _ => None,
    }
}

fn parse_query(token: &str) -> Option<(u64, Vec<Value>)> {
    match serde_json::from_str::<serde_json::Value>(token).ok()? {
        serde_json::Value::Number(n) => Some((n.as_u64()?, Vec::new())),
        serde_json::Value::Array(items) => {
            let (first, rest) = items.split_first()?;
            let keys = rest.iter().map(json_to_key).collect::<Option<Vec<_>>>()?;
            Some((first.as_u64()?, keys))
        }
        _ => None,
    }
}

fn load_names(path: &str) -> Result<BTreeMap<u64, String>, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    let names: SidNames = serde_json::from_str(&content)?;
    Ok(names.item.into_iter().map(|i| (i.sid, i.identifier)).collect())
}

fn print_help() {
    println!("\nCommands:");
    println!("  get                        Get the whole model");
    println!("  fetch <q1> [q2...]         Fetch SIDs (e.g., fetch 1008 [1013,2])");
    println!("  list                       Show SID names from the .sid file");
    println!("  help                       Show this help");
    println!("  quit                       Exit");
    println!();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    println!("╔═══════════════════════════════════════════════════════════╗");
    println!("║           CORECONF SID Resolution Client                  ║");
    println!("╚═══════════════════════════════════════════════════════════╝\n");

    let names = match args.sid.as_deref() {
        Some(path) => {
            println!("Loading: {}", path);
            load_names(path)?
        }
        None => BTreeMap::new(),
    };
    println!("Server:  {}", args.server);
    println!("Path:    /{}\n", args.path);

    let mut client = Client::new(names, &args)?;

    println!("Type 'help' for commands, 'quit' to exit.\n");

    loop {
        print!("coreconf> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break; // EOF
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        let (cmd, rest) = match input.split_once(char::is_whitespace) {
            Some((c, r)) => (c.to_lowercase(), r.trim()),
            None => (input.to_lowercase(), ""),
        };

        match cmd.as_str() {
            "quit" | "exit" | "q" => {
                println!("Bye!");
                break;
            }
            "help" | "?" => print_help(),
            "get" => client.cmd_get(),
            "list" | "ls" => client.cmd_list(),
            "fetch" | "f" => {
                let tokens = split_queries(rest);
                let queries: Option<Vec<_>> = tokens.iter().map(|t| parse_query(t)).collect();
                match queries {
                    Some(q) if !q.is_empty() => client.cmd_fetch(q),
                    _ => println!("Usage: fetch <sid | [sid, key...]> ..."),
                }
            }
            _ => println!("Unknown command: {}. Type 'help' for commands.", cmd),
        }
        println!();
    }

    Ok(())
}
