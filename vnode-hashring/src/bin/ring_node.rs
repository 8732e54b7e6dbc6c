//! Line-protocol driver for a ring.
//!
//! Reads commands on stdin and reports results as one JSON object per line on
//! stdout. Logs go to stderr. Used by integration tests to check that routing
//! agrees across separate processes.
//!
//! Run: cargo run -p vnode-hashring --bin ring_node -- --node a --node b
//!
//! Commands:
//!   add <node>        add a member
//!   remove <node>     remove a member
//!   get <key>         route a key
//!   nodes <key> <n>   up to n distinct members for a key
//!   members           list members
//!   status            member count and replication factor
//!   quit | exit       exit

use clap::Parser;
use serde_json::{json, Value};
use std::io::{self, BufRead, Write};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vnode_hashring::{ConsistentHashRing, MembershipEvent, RingConfig, RingCoordinator};

#[derive(Parser)]
#[command(name = "ring_node")]
#[command(about = "Drive a consistent hash ring over stdin/stdout")]
#[command(version)]
struct Cli {
    /// Virtual nodes per physical node [default: $HASHRING_REPLICATION_FACTOR or 160]
    #[arg(short, long)]
    replicas: Option<u32>,

    /// Initial members (repeatable)
    #[arg(short, long = "node")]
    nodes: Vec<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let config = match cli.replicas {
        Some(replicas) => RingConfig::new(replicas),
        None => RingConfig::from_env()?,
    };
    let coordinator: RingCoordinator = RingCoordinator::new(ConsistentHashRing::from_config(&config)?);
    let mut events = coordinator.subscribe();

    for node in cli.nodes {
        coordinator.add_node(node)?;
    }
    // Initial members are reported by the ready line, not as events.
    while events.try_recv().is_ok() {}

    tracing::info!(
        replicas = config.replication_factor,
        count = coordinator.node_count(),
        "Ring ready"
    );
    emit(status("ready", &coordinator, config.replication_factor));

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.is_empty() {
            continue;
        }

        match (parts[0], &parts[1..]) {
            ("add", [node]) => match coordinator.add_node(*node) {
                Ok(()) => drain_events(&mut events),
                Err(e) => emit(error(&e.to_string())),
            },
            ("remove", [node]) => match coordinator.remove_node(*node) {
                Ok(()) => drain_events(&mut events),
                Err(e) => emit(error(&e.to_string())),
            },
            ("get", [key]) => match coordinator.get_node(key) {
                Ok(node) => emit(json!({ "event": "route", "key": key, "node": node })),
                Err(e) => emit(error(&e.to_string())),
            },
            ("nodes", [key, count]) => {
                let Ok(count) = count.parse::<usize>() else {
                    emit(error(&format!("invalid count: {}", count)));
                    continue;
                };
                match coordinator.get_nodes(key, count) {
                    Ok(nodes) => emit(json!({ "event": "nodes", "key": key, "nodes": nodes })),
                    Err(e) => emit(error(&e.to_string())),
                }
            }
            ("members", []) => {
                emit(json!({ "event": "members", "members": coordinator.members() }));
            }
            ("status", []) => emit(status("status", &coordinator, config.replication_factor)),
            ("quit" | "exit", []) => break,
            (command, _) => {
                emit(json!({ "error": "unknown_command", "command": command }));
            }
        }
    }

    tracing::info!(count = coordinator.node_count(), "Ring shutting down");
    emit(json!({ "event": "shutdown" }));
    Ok(())
}

fn drain_events(events: &mut tokio::sync::broadcast::Receiver<MembershipEvent>) {
    while let Ok(event) = events.try_recv() {
        let line = match event {
            MembershipEvent::Joined(node) => json!({ "event": "joined", "node": node }),
            MembershipEvent::Left(node) => json!({ "event": "left", "node": node }),
        };
        emit(line);
    }
}

fn status(event: &str, coordinator: &RingCoordinator, replicas: u32) -> Value {
    json!({
        "event": event,
        "nodes": coordinator.node_count(),
        "replicas": replicas,
    })
}

fn error(message: &str) -> Value {
    json!({ "error": message })
}

fn emit(line: Value) {
    println!("{}", line);
    let _ = io::stdout().flush();
}
