//! History CLI commands: print and clear the stored transcript.

use anyhow::Result;
use console::style;

use threadline_core::repository::MessageStore;
use threadline_types::message::{ChatMessage, MessageKind};

use crate::state::AppState;

/// Print every stored message in order.
///
/// # Examples
///
/// ```bash
/// tline history
/// tline history --json
/// ```
pub async fn show_history(state: &AppState, json: bool) -> Result<()> {
    let messages = state.store.list_all().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&messages)?);
        return Ok(());
    }

    if messages.is_empty() {
        println!();
        println!(
            "  {} No messages yet. Start one with: {}",
            style("i").blue().bold(),
            style("tline chat").yellow()
        );
        println!();
        return Ok(());
    }

    println!();
    for message in &messages {
        println!("{}", format_entry(message));
    }
    println!();
    println!("  {}", style(format!("{} message(s)", messages.len())).dim());
    Ok(())
}

/// Delete every stored message.
///
/// Connected sessions receive a `cleared` event when truncation is
/// broadcast (the default).
pub async fn clear_history(state: &AppState, json: bool) -> Result<()> {
    let count = state.store.list_all().await?.len();
    state.store.truncate().await?;

    if json {
        println!("{}", serde_json::json!({ "cleared": true, "removed": count }));
    } else {
        println!(
            "\n  {} Cleared {} message(s).\n",
            style("✓").green().bold(),
            count
        );
    }
    Ok(())
}

fn format_entry(message: &ChatMessage) -> String {
    let label = match message.kind {
        MessageKind::User => style("You").green().bold(),
        MessageKind::Bot => style("Bot").cyan().bold(),
    };
    let mut lines = message.content.lines();
    let first = lines.next().unwrap_or_default();
    let mut out = format!("  {label} {first}");
    for line in lines {
        out.push_str("\n      ");
        out.push_str(line);
    }
    out
}
