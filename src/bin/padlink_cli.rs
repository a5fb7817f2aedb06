//! CLI client for the `padlinkd` daemon. Stands in for a chat bridge.
//!
//! Examples:
//!   padlink-cli status
//!   padlink-cli say load
//!   padlink-cli say start
//!   padlink-cli --guild 1234 --channel games say a
//!
//! By default it talks to 127.0.0.1:9877; override with `--addr host:port`.

use padlink::protocol::{Request, Response, StatusSnapshot, DEFAULT_ADDR};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::process;
use std::time::Duration;

struct Options {
    addr: String,
    guild: Option<String>,
    channel: Option<String>,
}

fn usage() -> ! {
    eprintln!("padlink-cli (talks to padlinkd @ {DEFAULT_ADDR} by default)");
    eprintln!("Usage: padlink-cli [--addr host:port] [--guild id] [--channel name] <command> [args]\n");
    eprintln!("Commands:");
    eprintln!("  status             Show daemon state");
    eprintln!("  say <text...>      Send a chat message (load, quit, exit, kill, a, b, <, >, ^, v, ...)");
    process::exit(1);
}

fn parse_args() -> (Options, Vec<String>) {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let mut opts = Options {
        addr: DEFAULT_ADDR.to_string(),
        guild: None,
        channel: None,
    };

    while args.len() >= 2 && args[0].starts_with("--") {
        let value = args[1].clone();
        match args[0].as_str() {
            "--addr" => opts.addr = value,
            "--guild" => opts.guild = Some(value),
            "--channel" => opts.channel = Some(value),
            _ => usage(),
        }
        args.drain(0..2);
    }

    if args.is_empty() {
        usage();
    }

    (opts, args)
}

fn send_request(addr: &str, req: &Request) -> Result<Response, String> {
    let mut stream = TcpStream::connect(addr).map_err(|e| format!("connect: {e}"))?;
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .map_err(|e| format!("set_read_timeout: {e}"))?;
    let mut reader = BufReader::new(stream.try_clone().map_err(|e| format!("clone: {e}"))?);

    let line = serde_json::to_string(req).map_err(|e| format!("serialize: {e}"))?;
    stream
        .write_all(line.as_bytes())
        .and_then(|_| stream.write_all(b"\n"))
        .map_err(|e| format!("send: {e}"))?;

    let mut resp_line = String::new();
    reader
        .read_line(&mut resp_line)
        .map_err(|e| format!("recv: {e}"))?;
    serde_json::from_str(&resp_line).map_err(|e| format!("parse response: {e}"))
}

fn print_status(s: StatusSnapshot) {
    println!(
        "state={:?} program={} frames={} queued={} policy={} fps={}",
        s.state,
        s.program.as_deref().unwrap_or("-"),
        s.frames,
        s.queued,
        s.policy.as_str(),
        s.target_fps,
    );
}

fn main() {
    let (opts, args) = parse_args();

    let req = match args[0].as_str() {
        "status" => Request::Status,
        "say" => {
            if args.len() < 2 {
                usage();
            }
            Request::Message {
                guild: opts.guild.clone(),
                channel: opts.channel.clone(),
                content: args[1..].join(" "),
            }
        }
        _ => usage(),
    };

    match send_request(&opts.addr, &req) {
        Ok(Response::Status(s)) => print_status(s),
        Ok(Response::Handled { action, delete }) => {
            println!("{action}{}", if delete { " (deleted)" } else { "" })
        }
        Ok(Response::Ignored { reason }) => println!("ignored: {reason}"),
        Ok(Response::Error { message }) => {
            eprintln!("Error: {message}");
            process::exit(1);
        }
        Err(e) => {
            eprintln!("Failed: {e}");
            process::exit(1);
        }
    }
}
