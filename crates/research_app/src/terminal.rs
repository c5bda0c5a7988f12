//! Command parsing and transcript printing for the terminal client.

use std::collections::HashSet;
use std::io::Write;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Local};
use research_core::{DisplayMessage, HistoryEntry, JobContext, MessageKind, SessionView};
use research_engine::{ExportFormat, SessionObserver};
use research_logging::research_warn;
use thiserror::Error;

pub const HELP: &str = "\
Type a question to start deep research, or a command:
  /history              list finished jobs
  /open <n>             show history entry n
  /export md|html [n]   export answer n (default: latest)
  /transcript           export every answer into one file
  /clear                clear the chat
  /quit                 exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Query(String),
    History,
    Open(usize),
    Export {
        format: ExportFormat,
        number: Option<usize>,
    },
    Transcript,
    Clear,
    Help,
    Quit,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command {0}; try /help")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Command::Empty);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Command::Query(line.to_string()));
    };

    let mut words = rest.split_whitespace();
    let name = words.next().unwrap_or_default();
    let args: Vec<&str> = words.collect();
    match (name, args.as_slice()) {
        ("history", []) => Ok(Command::History),
        ("open", [n]) => positive(n)
            .map(Command::Open)
            .ok_or(CommandError::Usage("/open <n>")),
        ("export", [format, rest @ ..]) if rest.len() <= 1 => {
            let format = match *format {
                "md" | "markdown" => ExportFormat::Markdown,
                "html" => ExportFormat::Html,
                _ => return Err(CommandError::Usage("/export md|html [n]")),
            };
            let number = match rest {
                [] => None,
                [n] => Some(positive(n).ok_or(CommandError::Usage("/export md|html [n]"))?),
                _ => None,
            };
            Ok(Command::Export { format, number })
        }
        ("transcript", []) => Ok(Command::Transcript),
        ("clear", []) => Ok(Command::Clear),
        ("help", []) => Ok(Command::Help),
        ("quit" | "exit", []) => Ok(Command::Quit),
        ("open", _) => Err(CommandError::Usage("/open <n>")),
        ("export", _) => Err(CommandError::Usage("/export md|html [n]")),
        _ => Err(CommandError::Unknown(format!("/{name}"))),
    }
}

fn positive(text: &str) -> Option<usize> {
    text.parse().ok().filter(|n| *n > 0)
}

pub fn format_history(entries: &[HistoryEntry]) -> String {
    if entries.is_empty() {
        return "No finished jobs yet.".to_string();
    }
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            format!(
                "{:>3}. [{}] {} ({})",
                index + 1,
                entry.status,
                entry.summary,
                entry.created_at
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_message(message: &DisplayMessage, job: Option<&JobContext>) -> String {
    let stamp = message
        .timestamp
        .as_deref()
        .and_then(local_time)
        .map(|time| format!("[{time}] "))
        .unwrap_or_default();
    match message.kind {
        MessageKind::User => format!("{stamp}you> {}", message.body),
        MessageKind::Progress => format!("{stamp}  ... {}", message.body),
        MessageKind::Ai => {
            let mut text = format!("{stamp}research> {}", message.resolved_markdown(job));
            for (index, reference) in message.references.iter().enumerate() {
                text.push_str(&format!("\n  [{}] {} <{}>", index + 1, reference.title, reference.url));
            }
            text
        }
    }
}

fn local_time(timestamp: &str) -> Option<String> {
    DateTime::parse_from_rfc3339(timestamp)
        .ok()
        .map(|ts| ts.with_timezone(&Local).format("%H:%M:%S").to_string())
}

/// Prints each message once, as it first appears in the session view.
pub struct TerminalObserver<W> {
    inner: Mutex<PrintState<W>>,
}

struct PrintState<W> {
    out: W,
    printed: HashSet<String>,
    was_loading: bool,
}

impl<W: Write + Send> TerminalObserver<W> {
    pub fn new(out: W) -> Self {
        Self {
            inner: Mutex::new(PrintState {
                out,
                printed: HashSet::new(),
                was_loading: false,
            }),
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner).out
    }
}

impl<W: Write + Send> SessionObserver for TerminalObserver<W> {
    fn session_changed(&self, view: &SessionView) {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        // A new job or a cleared chat starts a fresh transcript.
        if (view.loading && !state.was_loading) || view.messages.is_empty() {
            state.printed.clear();
        }
        state.was_loading = view.loading;

        for message in &view.messages {
            let key = format!(
                "{:?}|{}|{}|{}",
                message.kind,
                message.message_id.as_deref().unwrap_or_default(),
                message.timestamp.as_deref().unwrap_or_default(),
                message.body
            );
            if !state.printed.insert(key) {
                continue;
            }
            let line = format_message(message, view.job_context.as_ref());
            if let Err(err) = writeln!(state.out, "{line}") {
                research_warn!("Could not print message: {}", err);
                return;
            }
        }
        let _ = state.out.flush();
    }
}
