use std::io::{self, BufRead};
use std::sync::Arc;
use std::thread;

use anyhow::Context;
use research_engine::{ChatSession, ReportExporter, ReqwestJobApi};
use research_logging::{research_error, research_info};
use tokio::sync::mpsc;

use crate::config::AppConfig;
use crate::terminal::{format_history, parse_command, Command, TerminalObserver, HELP};

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let api = ReqwestJobApi::new(config.api_settings()).context("creating job API client")?;
    research_info!("Using research API at {}", config.api_base_url);

    let observer = Arc::new(TerminalObserver::new(io::stdout()));
    let session = Arc::new(
        ChatSession::new(Arc::new(api), config.session_options()).with_observer(observer),
    );

    let startup = {
        let session = Arc::clone(&session);
        tokio::spawn(async move {
            tokio::join!(session.restore_in_flight_job(), session.load_history());
        })
    };

    println!("{HELP}");
    let mut lines = spawn_stdin_reader();
    while let Some(line) = lines.recv().await {
        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(err) => {
                println!("! {err}");
                continue;
            }
        };
        match command {
            Command::Empty => {}
            Command::Quit => break,
            Command::Help => println!("{HELP}"),
            Command::Query(text) => {
                if session.is_loading() {
                    println!("! A research job is still running.");
                    continue;
                }
                let session = Arc::clone(&session);
                tokio::spawn(async move { session.submit_query(&text).await });
            }
            Command::History => {
                session.load_history().await;
                println!("{}", format_history(&session.view().history));
            }
            Command::Open(number) => {
                let view = session.view();
                let Some(entry) = view.history.get(number - 1) else {
                    println!("! No history entry {number}.");
                    continue;
                };
                if view.loading {
                    println!("! Wait for the running job to finish first.");
                    continue;
                }
                let session = Arc::clone(&session);
                let job_id = entry.job_id.clone();
                tokio::spawn(async move { session.select_history(&job_id).await });
            }
            Command::Export { format, number } => {
                let exporter = ReportExporter::new(&session, config.export_options());
                match exporter.export_answer(number, format) {
                    Ok(path) => println!("Exported to {}", path.display()),
                    Err(err) => println!("! Export failed: {err}"),
                }
            }
            Command::Transcript => {
                let exporter = ReportExporter::new(&session, config.export_options());
                match exporter.export_transcript() {
                    Ok(summary) => println!(
                        "Exported {} answers to {}",
                        summary.answer_count,
                        summary.output_path.display()
                    ),
                    Err(err) => println!("! Export failed: {err}"),
                }
            }
            Command::Clear => {
                if session.is_loading() {
                    println!("! Cannot clear while a job is running.");
                } else {
                    session.clear();
                }
            }
        }
    }

    startup.abort();
    research_info!("Terminal session closed");
    Ok(())
}

fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    research_error!("Reading stdin failed: {}", err);
                    break;
                }
            }
        }
    });
    rx
}
