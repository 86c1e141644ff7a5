//! Glass Pilot: desktop assistant control plane.
//!
//! This is the app shell that wires the domains together. No business
//! logic lives here, only module declarations and startup.
//!
//! Domains:
//!   - rpc          : versioned JSON calls to independently hosted services
//!   - bridge       : the streaming WebSocket to the reasoning backend
//!   - clipboard    : highlight capture from the system clipboard
//!   - screen_text  : post-processing of recognized screen text
//!   - automation   : prompt dispatch with pause/resume

pub mod automation;
pub mod bridge;
pub mod clipboard;
pub mod config;
pub mod error;
pub mod ids;
pub mod rpc;
pub mod screen_text;
pub mod shell;

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use automation::{AutomationController, OutputEvent, Prompt, RemoteEngine};
use bridge::{BridgeEvent, BridgeManager};
use clipboard::{ClipboardLedger, ClipboardWatcher};
use error::Result;
use rpc::{RpcClient, ServiceRegistry};
use shell::Command;

/// Entry point: load configuration, start every domain, then serve
/// prompts from stdin until EOF or `/quit`.
pub async fn run() -> Result<()> {
    config::load_env_files();
    env_logger::init();
    log::info!("[STARTUP] Glass Pilot {} starting up", env!("CARGO_PKG_VERSION"));

    let config = config::load_config()?;
    let registry = Arc::new(ServiceRegistry::from_config(&config.services));
    log::info!("[STARTUP] {} services configured", registry.len());
    let rpc = Arc::new(RpcClient::from_config(registry, &config));

    {
        let rpc = Arc::clone(&rpc);
        tokio::spawn(async move { health_sweep(&rpc).await });
    }

    let bridge = BridgeManager::new(config.bridge.clone(), config.automation.source.clone());
    if let Some(events) = bridge.take_events() {
        tokio::spawn(print_bridge_events(events));
    }
    {
        let bridge = Arc::clone(&bridge);
        tokio::spawn(async move {
            if let Err(e) = bridge.connect().await {
                log::warn!("[BRIDGE] Initial connect failed: {}", e);
            }
        });
    }

    let ledger = Arc::new(Mutex::new(ClipboardLedger::new(config.clipboard.clone())));
    let (highlight_tx, mut highlight_rx) = mpsc::unbounded_channel();
    let watcher = ClipboardWatcher::start_system(Arc::clone(&ledger), highlight_tx);

    let (output_tx, output_rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(print_output(output_rx));

    let engine = Arc::new(RemoteEngine::new(
        Arc::clone(&rpc),
        config.automation.engine_service.clone(),
    ));
    let mut controller = AutomationController::new(
        engine,
        Arc::clone(&ledger),
        output_tx,
        config.automation.clone(),
    );

    log::info!("[STARTUP] Ready");
    let mut screen_text: Option<String> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match shell::parse(&line) {
            Command::Empty => {}
            Command::Quit => break,
            Command::Help => println!("{}", shell::HELP),
            Command::Unknown(cmd) => println!("unknown command: {} (try /help)", cmd),
            Command::Health => health_sweep(&rpc).await,
            Command::Status => {
                let status = bridge.status();
                println!(
                    "bridge: {:?} (attempts {}, next retry {:?}ms, last error {:?})",
                    status.state, status.reconnect_attempts, status.next_retry_ms, status.last_error
                );
                println!(
                    "session: {:?}, paused: {}",
                    controller.session_id(),
                    controller.paused().is_some()
                );
            }
            Command::SaveKey { service, credential } => {
                match config::save_credential(&service, &credential) {
                    Ok(()) => println!("stored credential for '{}'", service),
                    Err(e) => println!("error: {}", e),
                }
            }
            Command::Reconnect => {
                if let Err(e) = bridge.reconnect().await {
                    println!("reconnect failed: {}", e);
                }
            }
            Command::Ask(text) => {
                let mut highlights = Vec::new();
                while let Ok(h) = highlight_rx.try_recv() {
                    highlights.push(h);
                }
                if let Err(e) = ask(&bridge, &ledger, &text, &highlights).await {
                    println!("error: {}", e);
                }
            }
            Command::Screen(path) => match tokio::fs::read_to_string(&path).await {
                Ok(text) => {
                    log::info!("[SCREEN_TEXT] Attached {} ({} chars)", path.display(), text.len());
                    screen_text = Some(text);
                }
                Err(e) => println!("could not read {}: {}", path.display(), e),
            },
            Command::Prompt(message) => {
                let mut highlights = Vec::new();
                while let Ok(h) = highlight_rx.try_recv() {
                    highlights.push(h);
                }
                controller
                    .submit(Prompt {
                        message,
                        highlights,
                        screen_text: screen_text.take(),
                    })
                    .await;
            }
        }
    }

    log::info!("[STARTUP] Shutting down");
    watcher.stop();
    bridge.disconnect().await?;
    drop(controller);
    let _ = printer.await;
    Ok(())
}

/// Send text straight to the bridge. Recorded as a submission first so
/// copying the query back does not return as a highlight.
async fn ask(
    bridge: &BridgeManager,
    ledger: &Mutex<ClipboardLedger>,
    text: &str,
    highlights: &[String],
) -> Result<String> {
    ledger
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .record_submission(text, Instant::now());
    bridge.send_llm_request(text, &highlights.join("\n\n")).await
}

async fn health_sweep(rpc: &RpcClient) {
    let healthy = rpc.healthy_services().await;
    log::info!(
        "[HEALTH] {}/{} services healthy: [{}]",
        healthy.len(),
        rpc.registry().len(),
        healthy.join(", ")
    );
}

async fn print_output(mut rx: mpsc::UnboundedReceiver<OutputEvent>) {
    let mut stdout = std::io::stdout();
    while let Some(event) = rx.recv().await {
        let _ = write!(stdout, "{}", event.render());
        let _ = stdout.flush();
    }
}

async fn print_bridge_events(mut rx: mpsc::UnboundedReceiver<BridgeEvent>) {
    let mut stdout = std::io::stdout();
    while let Some(event) = rx.recv().await {
        match event {
            BridgeEvent::Chunk { content, .. } => {
                let _ = write!(stdout, "{}", content);
                let _ = stdout.flush();
            }
            BridgeEvent::Done { id } => {
                let _ = writeln!(stdout);
                log::debug!("[BRIDGE] Stream {:?} done", id);
            }
            BridgeEvent::Error { id, message } => {
                let _ = writeln!(stdout, "\nbridge error: {}", message);
                log::warn!("[BRIDGE] Stream {:?} failed: {}", id, message);
            }
            BridgeEvent::Exhausted { attempts } => {
                let _ = writeln!(
                    stdout,
                    "bridge offline after {} attempts; /reconnect to retry",
                    attempts
                );
            }
            other => log::info!("[BRIDGE] {:?}", other),
        }
    }
}
