// Operator command handlers
// Manual trigger/stop surface, driven from the CLI's stdin
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::audio::AudioSink;
use crate::notify::{NotificationEngine, RequestOutcome};
use crate::state::PlaybackState;

pub const HELP: &str = "commands: trigger <table> | stop | state | reset | help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Trigger(String),
    Stop,
    State,
    Reset,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        match (verb.to_ascii_lowercase().as_str(), rest) {
            ("trigger" | "play" | "t", table) if !table.is_empty() => {
                Ok(Command::Trigger(table.to_string()))
            }
            ("trigger" | "play" | "t", _) => Err("usage: trigger <table>".to_string()),
            ("stop" | "s", "") => Ok(Command::Stop),
            ("state" | "status", "") => Ok(Command::State),
            ("reset", "") => Ok(Command::Reset),
            ("help" | "?", "") => Ok(Command::Help),
            ("quit" | "exit" | "q", "") => Ok(Command::Quit),
            _ => Err(format!("unknown command '{}'; {}", line, HELP)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Response {
    Request(RequestOutcome),
    State(PlaybackState),
    Ack { message: String },
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Request(RequestOutcome::Started { table, tier }) => {
                write!(f, "playing table {} ({:?})", table, tier)
            }
            Response::Request(RequestOutcome::Skipped { table }) => {
                write!(f, "skipped table {}: another alert is playing", table)
            }
            Response::State(state) => match &state.current_table {
                Some(table) if state.is_playing => write!(f, "playing table {}", table),
                _ => write!(f, "idle"),
            },
            Response::Ack { message } => f.write_str(message),
        }
    }
}

/// Run one command against the engine. `Quit` is the caller's to handle.
pub fn execute<S: AudioSink>(
    engine: &NotificationEngine<S>,
    command: &Command,
) -> Result<Response, String> {
    match command {
        Command::Trigger(table) => engine
            .manual_trigger(table.as_str())
            .map(Response::Request)
            .map_err(|e| e.to_string()),
        Command::Stop => {
            engine.stop();
            Ok(Response::State(engine.state()))
        }
        Command::State => Ok(Response::State(engine.state())),
        Command::Reset => {
            engine.reset_baseline();
            Ok(Response::Ack {
                message: "baseline cleared; next snapshot will not alert".to_string(),
            })
        }
        Command::Help => Ok(Response::Ack {
            message: HELP.to_string(),
        }),
        Command::Quit => Ok(Response::Ack {
            message: "bye".to_string(),
        }),
    }
}
