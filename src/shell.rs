//! Line commands for the interactive shell.

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Anything not starting with `/`: a prompt for the controller.
    Prompt(String),
    /// Send text straight to the bridge and stream the reply.
    Ask(String),
    /// Attach recognized screen text from a file to the next prompt.
    Screen(PathBuf),
    /// Store a service credential in the OS keychain.
    SaveKey { service: String, credential: String },
    Reconnect,
    Health,
    Status,
    Help,
    Quit,
    Unknown(String),
    Empty,
}

pub const HELP: &str = "\
commands:
  <text>            run a prompt (answers a pending question when paused)
  /ask <text>       send text straight to the bridge
  /screen <file>    attach recognized screen text to the next prompt
  /key <svc> <key>  store a service credential in the OS keychain (used on next start)
  /reconnect        reconnect the bridge and reset its retry counter
  /health           re-run the service health sweep
  /status           show bridge and session status
  /quit             exit";

pub fn parse(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Command::Prompt(line.to_string());
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    match (name, arg) {
        ("reconnect", _) => Command::Reconnect,
        ("health", _) => Command::Health,
        ("status", _) => Command::Status,
        ("help", _) => Command::Help,
        ("quit" | "exit", _) => Command::Quit,
        ("ask", text) if !text.is_empty() => Command::Ask(text.to_string()),
        ("screen", path) if !path.is_empty() => Command::Screen(PathBuf::from(path)),
        ("key", arg) => match arg.split_once(char::is_whitespace) {
            Some((service, credential)) if !credential.trim().is_empty() => Command::SaveKey {
                service: service.to_string(),
                credential: credential.trim().to_string(),
            },
            _ => Command::Unknown(line.to_string()),
        },
        _ => Command::Unknown(line.to_string()),
    }
}
