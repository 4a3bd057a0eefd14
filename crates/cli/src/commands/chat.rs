//! `opsclaw chat`: interactive session or a single turn.

use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use opsclaw_agent::{Command, KeywordExtractor, Session, TurnOutcome, Vocabulary, normalize};
use opsclaw_channels::{InterruptAction, InterruptGate, LineEditor, LineEvent, restore_terminal};
use opsclaw_config::AppConfig;
use opsclaw_core::Extractor;
use opsclaw_providers::LlmExtractor;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::render;

const PROMPT: &str = "  ops > ";

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let extractor = build_extractor(&config);
    let mut session = Session::from_config(&config, extractor);

    match message {
        Some(line) => {
            if let Command::Query(input) = normalize(&line, config.cli.default_line_limit) {
                print_warnings(&input.warnings);
                let outcome = session.run_turn(&input).await;
                present(&session, outcome, input.raw);
            }
            session.registry().shutdown(config.worker.kill_grace()).await;
        }
        None => interactive(&config, &mut session).await?,
    }

    Ok(())
}

/// Pick the extractor backend. `llm` without a usable key falls back to
/// the keyword rules.
pub fn build_extractor(config: &AppConfig) -> Arc<dyn Extractor> {
    match config.extractor.backend.as_str() {
        "llm" => match LlmExtractor::from_config(config) {
            Ok(llm) => return Arc::new(llm),
            Err(e) => {
                warn!("LLM extractor unavailable ({e}), falling back to keyword");
                eprintln!("  ⚠️  LLM extractor unavailable ({e}); using keyword rules");
            }
        },
        "keyword" => {}
        other => warn!(backend = other, "Unknown extractor backend, using keyword"),
    }
    Arc::new(KeywordExtractor::new(Vocabulary::from_config(
        &config.vocabulary,
    )))
}

async fn interactive(
    config: &AppConfig,
    session: &mut Session,
) -> Result<(), Box<dyn std::error::Error>> {
    print_banner(config, session);

    let shutdown = CancellationToken::new();
    watch_terminate(shutdown.clone());

    let mut gate = InterruptGate::new(config.cli.interrupt_window());
    let mut editor = LineEditor::new(PROMPT).spawn();

    'session: loop {
        editor.request();
        let event = tokio::select! {
            event = editor.next_event() => event,
            // Only fires when stdin is not a raw-mode terminal.
            _ = tokio::signal::ctrl_c() => Some(LineEvent::Interrupted { pending: false }),
            _ = shutdown.cancelled() => break 'session,
        };

        let line = match event {
            None | Some(LineEvent::Eof) => break,
            Some(LineEvent::Interrupted { pending }) => {
                match gate.on_interrupt(pending, Instant::now()) {
                    InterruptAction::ClearLine => {}
                    InterruptAction::Hint => print_hint(&gate),
                    InterruptAction::Exit => break,
                }
                continue;
            }
            Some(LineEvent::Line(line)) => line,
        };

        let input = match normalize(&line, config.cli.default_line_limit) {
            Command::Empty => continue,
            Command::Exit => break,
            Command::Query(input) => input,
        };
        gate.disarm();
        print_warnings(&input.warnings);

        eprint!("  ...");
        let outcome = {
            let turn = session.run_turn(&input);
            tokio::pin!(turn);
            loop {
                tokio::select! {
                    outcome = &mut turn => break Some(outcome),
                    _ = tokio::signal::ctrl_c() => {
                        match gate.on_interrupt(false, Instant::now()) {
                            InterruptAction::Exit => break None,
                            _ => {
                                eprint!("\r     \r");
                                print_hint(&gate);
                            }
                        }
                    }
                    _ = shutdown.cancelled() => break None,
                }
            }
        };
        eprint!("\r     \r");

        match outcome {
            Some(outcome) => present(session, outcome, input.raw),
            None => break,
        }
        std::io::stdout().flush()?;
    }

    let live = session.registry().len();
    if live > 0 {
        eprintln!("  Stopping {live} running worker(s)...");
    }
    let report = session.registry().shutdown(config.worker.kill_grace()).await;
    info!(
        terminated = report.terminated,
        killed = report.killed,
        "Session closed"
    );
    restore_terminal();

    println!();
    println!("  Goodbye! 👋");
    println!();
    Ok(())
}

fn present(session: &Session, outcome: TurnOutcome, raw: bool) {
    match outcome {
        TurnOutcome::NoCandidates => {
            println!("  Couldn't tell what to look up.");
            println!("  Try `pods ns-team hzh` or `describe app my-app ns-team --lines 50`.");
        }
        TurnOutcome::Rejected(e) => println!("  {e}"),
        TurnOutcome::Dispatched(reports) => {
            let summary = session.aggregator().present(reports, |report| {
                let rendered = render::render(report, raw);
                print!("{}", rendered.text);
                rendered.items
            });
            println!("{}", render::summary_line(&summary));
        }
    }
    println!();
}

fn print_banner(config: &AppConfig, session: &Session) {
    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║         OpsClaw · Interactive Mode           ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Extractor: {}", session.extractor_name());
    println!("  Worker:    {}", config.worker.command);
    println!("  Timeout:   {}s per query", config.worker.timeout_secs);
    println!("  Zones:     {}", config.vocabulary.zones.join(", "));
    println!();
    println!("  Ask for resources, e.g. `pods ns-team hzh`.");
    println!("  Flags: --raw, --lines N. Type 'exit' or Ctrl+D to quit.");
    println!();
}

fn print_hint(gate: &InterruptGate) {
    eprintln!(
        "  (press Ctrl+C again within {}s to exit, or type 'exit')",
        gate.window().as_secs()
    );
}

fn print_warnings(warnings: &[String]) {
    for warning in warnings {
        eprintln!("  ⚠️  {warning}");
    }
}

/// SIGTERM takes the same shutdown path as `exit`.
fn watch_terminate(shutdown: CancellationToken) {
    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
                info!("SIGTERM received");
                shutdown.cancel();
            }
            Err(e) => warn!("Cannot watch SIGTERM: {e}"),
        }
    });
    #[cfg(not(unix))]
    drop(shutdown);
}
