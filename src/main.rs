//! Headless driver: run a program through the daemon core without a chat
//! transport, feeding commands from the command line.
//!
//!   padlink run games/foo.rom load a a start quit
//!   padlink run --every 30 --policy lifo games/foo.rom load up up quit

use padlink::prelude::*;
use std::path::PathBuf;

fn print_help() {
    println!("padlink - headless emulation control");
    println!();
    println!("Usage:");
    println!("  padlink run [--every N] [--policy fifo|lifo] [--halt-after N] <program> [command...]");
    println!("  padlink help");
    println!();
    println!("Each command is classified exactly like a chat message, then the daemon");
    println!("ticks N frames (default 10) before the next command. A session still");
    println!("running after the last command is saved with `quit`.");
}

struct RunArgs {
    program: PathBuf,
    commands: Vec<String>,
    every: u32,
    policy: DrainPolicy,
    halt_after: Option<u64>,
}

fn parse_run_args(mut args: Vec<String>) -> Result<RunArgs, String> {
    let mut every = 10u32;
    let mut policy = DrainPolicy::Fifo;
    let mut halt_after = None;

    while args.first().is_some_and(|a| a.starts_with("--")) {
        let flag = args.remove(0);
        if args.is_empty() {
            return Err(format!("{flag} needs a value"));
        }
        let value = args.remove(0);
        match flag.as_str() {
            "--every" => {
                every = value
                    .parse()
                    .map_err(|e| format!("--every {value}: {e}"))?;
            }
            "--policy" => {
                policy = DrainPolicy::parse(&value)
                    .ok_or_else(|| format!("--policy must be fifo or lifo, got {value}"))?;
            }
            "--halt-after" => {
                halt_after = Some(
                    value
                        .parse()
                        .map_err(|e| format!("--halt-after {value}: {e}"))?,
                );
            }
            other => return Err(format!("unknown flag {other}")),
        }
    }

    if args.is_empty() {
        return Err("missing <program>".to_string());
    }
    let program = PathBuf::from(args.remove(0));
    Ok(RunArgs {
        program,
        commands: args,
        every,
        policy,
        halt_after,
    })
}

fn run(args: RunArgs) -> Result<(), String> {
    let mut daemon = Daemon::new(
        ConsoleBoot {
            halt_after: args.halt_after,
        },
        args.policy,
    );
    let dispatcher = Dispatcher::new(&args.program);

    for raw in &args.commands {
        let action = classify(&normalize(raw));
        let before = daemon.state();
        let flow = dispatcher.dispatch(&mut daemon, action);
        println!(
            "{raw:>8} -> {action:<7} {before:?} -> {:?} (queued {})",
            daemon.state(),
            daemon.queue().len()
        );
        if flow == Flow::Terminate {
            println!("kill: terminating");
            return Ok(());
        }

        for _ in 0..args.every {
            match daemon.tick() {
                Ok(TickOutcome::Halted) => {
                    println!("engine halted");
                    break;
                }
                Ok(TickOutcome::Idle) => break,
                Ok(TickOutcome::Advanced { .. }) => {}
                Err(e) => {
                    println!("engine fault: {e}");
                    break;
                }
            }
        }
    }

    if daemon.is_running() {
        let frames = daemon.machine().map_or(0, |m| m.frame_count());
        match daemon.quit() {
            padlink::daemon::Stopped::Saved(path) => {
                println!("saved at frame {frames} to {}", path.display())
            }
            padlink::daemon::Stopped::SaveFailed(e) => return Err(format!("save failed: {e}")),
            _ => {}
        }
    }
    Ok(())
}

fn main() {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() || matches!(args[0].as_str(), "help" | "--help" | "-h") {
        print_help();
        return;
    }

    let cmd = args.remove(0);
    let result = match cmd.as_str() {
        "run" => parse_run_args(args).and_then(run),
        other => Err(format!("Unknown command: {other}")),
    };

    if let Err(e) = result {
        eprintln!("{e}");
        print_help();
        std::process::exit(2);
    }
}
