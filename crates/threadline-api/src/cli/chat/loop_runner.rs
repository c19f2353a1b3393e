//! Main chat loop orchestrator.
//!
//! Ties the session, the renderer and the readline input together:
//! - transcript changes are printed as they arrive (including streamed text),
//! - each line is submitted to the session (commands included),
//! - Ctrl+C cancels the running generation, Ctrl+D or `/exit` ends the loop.
//!
//! With `listen` set, the HTTP/WebSocket API runs in-process on the same
//! store and bus so other observers can follow the conversation live.

use std::io::Write;

use anyhow::Result;
use console::style;
use futures_util::future::BoxFuture;
use rustyline_async::SharedWriter;
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;

use threadline_core::chat::{StreamOutcome, SubmitOutcome};
use threadline_types::error::SessionError;

use super::input::{ChatInput, InputEvent};
use super::renderer::TranscriptRenderer;
use crate::http::router;
use crate::state::AppState;

/// Inputs that leave the loop without reaching the session.
fn is_exit(text: &str, marker: char) -> bool {
    text.strip_prefix(marker)
        .is_some_and(|verb| verb.eq_ignore_ascii_case("exit") || verb.eq_ignore_ascii_case("quit"))
}

/// Wait for the running generation, or forever when there is none.
async fn next_outcome(pending: &mut Option<BoxFuture<'static, StreamOutcome>>) -> StreamOutcome {
    match pending {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

fn print_banner(out: &mut SharedWriter, state: &AppState, model: &str, count: usize) -> Result<()> {
    writeln!(out)?;
    writeln!(
        out,
        "  {} {}",
        style("Threadline").cyan().bold(),
        style(format!("v{}", env!("CARGO_PKG_VERSION"))).dim()
    )?;
    writeln!(
        out,
        "  {} {}  {} {}",
        style("model").dim(),
        style(model).yellow(),
        style("history").dim(),
        style(format!("{count} message(s)")).yellow()
    )?;
    writeln!(
        out,
        "  {}",
        style(format!(
            "{}help for commands, Ctrl+C cancels a reply, Ctrl+D exits.",
            state.config.command_marker
        ))
        .dim()
    )?;
    writeln!(out)?;
    Ok(())
}

/// Run the interactive chat loop until the user exits.
pub async fn run_chat_loop(
    state: &AppState,
    model: Option<String>,
    credential: SecretString,
    listen: Option<String>,
) -> Result<()> {
    let model = model.unwrap_or_else(|| state.config.default_model.clone());
    let backend = state.backend()?;
    let prepared = state.prepare_session(backend).await;

    let prompt = format!("  {} ", style("You >").green().bold());
    let (mut input, mut out) = ChatInput::new(prompt)?;

    // The cached transcript shows while the store listing is loading.
    let mut transcript_rx = prepared.subscribe_transcript();
    let mut renderer = TranscriptRenderer::new();
    let cached = transcript_rx.borrow_and_update().messages().to_vec();
    print_banner(&mut out, state, &model, cached.len())?;
    write!(out, "{}", renderer.render(&cached))?;
    write!(out, "{}", renderer.finish())?;

    let session = prepared.load().await?;
    let loaded = transcript_rx.borrow_and_update().messages().to_vec();
    write!(out, "{}", renderer.render(&loaded))?;
    write!(out, "{}", renderer.finish())?;

    let server_shutdown = CancellationToken::new();
    let server = listen.map(|addr| {
        let state = state.clone();
        let token = server_shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = router::serve(state, &addr, async move { token.cancelled().await }).await {
                tracing::error!(%addr, error = %e, "in-process HTTP server failed");
            }
        })
    });

    let marker = session.config().command_marker;
    let mut pending: Option<BoxFuture<'static, StreamOutcome>> = None;

    loop {
        tokio::select! {
            changed = transcript_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let messages = transcript_rx.borrow_and_update().messages().to_vec();
                write!(out, "{}", renderer.render(&messages))?;
            }

            outcome = next_outcome(&mut pending) => {
                pending = None;
                write!(out, "{}", renderer.finish())?;
                match outcome {
                    StreamOutcome::Completed(_) => {}
                    StreamOutcome::Cancelled(_) => {
                        writeln!(out, "  {}", style("(reply cancelled)").dim())?;
                    }
                    StreamOutcome::Failed { error, .. } => {
                        writeln!(out, "  {} {error}", style("!").red().bold())?;
                    }
                }
            }

            event = input.read_line() => {
                match event {
                    InputEvent::Eof => break,
                    InputEvent::Interrupted => {
                        if session.cancel_generation() {
                            tracing::debug!("generation cancelled from keyboard");
                        } else {
                            writeln!(out, "  {}", style("Press Ctrl+D to exit, or keep chatting.").dim())?;
                        }
                    }
                    InputEvent::Message(text) if text.is_empty() => {}
                    InputEvent::Message(text) if is_exit(&text, marker) => break,
                    InputEvent::Message(text) => {
                        match session.submit(&text, &model, &credential).await {
                            Ok(SubmitOutcome::Generating(handle)) => {
                                pending = Some(Box::pin(handle.outcome()));
                            }
                            Ok(SubmitOutcome::Command) => {}
                            Err(SessionError::Validation(e)) => {
                                writeln!(out, "  {} {e}", style("!").yellow().bold())?;
                            }
                            Err(e) => {
                                writeln!(out, "  {} {e}", style("!").red().bold())?;
                            }
                        }
                    }
                }
            }
        }
    }

    writeln!(out, "{}", renderer.finish())?;
    writeln!(out, "  {}", style("Session ended.").dim())?;
    input.flush();
    drop(pending);
    session.shutdown().await;

    server_shutdown.cancel();
    if let Some(server) = server {
        if let Err(e) = server.await {
            tracing::warn!(error = %e, "HTTP server task ended abnormally");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_inputs() {
        assert!(is_exit("/exit", '/'));
        assert!(is_exit("/QUIT", '/'));
        assert!(!is_exit("exit", '/'));
        assert!(!is_exit("/exit now", '/'));
        assert!(is_exit("!exit", '!'));
    }

    #[tokio::test]
    async fn test_next_outcome_resolves_pending_future() {
        let mut pending: Option<BoxFuture<'static, StreamOutcome>> =
            Some(Box::pin(async { StreamOutcome::Completed("4!".to_string()) }));

        let outcome = next_outcome(&mut pending).await;
        assert_eq!(outcome.content(), "4!");
    }

    #[tokio::test]
    async fn test_next_outcome_without_generation_never_resolves() {
        let mut pending = None;
        let waited = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            next_outcome(&mut pending),
        )
        .await;
        assert!(waited.is_err());
    }
}
