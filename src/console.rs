//! Operator console
//!
//! Prints one human-readable line per controller event.

use std::io::Write;

use tokio::sync::broadcast;
use tracing::warn;

use crate::events::CaneEvent;

/// Print the startup banner
pub fn banner<W: Write>(out: &mut W, start_word: &str, exit_word: &str, session_secs: f64) -> std::io::Result<()> {
    writeln!(out, "Smart Cane System Initialized.")?;
    writeln!(out, "Say '{}' to start detection for {} seconds.", capitalize(start_word), session_secs)?;
    writeln!(out, "Say '{}' to quit.", capitalize(exit_word))?;
    Ok(())
}

/// Print events until the channel closes
pub async fn report<W: Write>(mut events: broadcast::Receiver<CaneEvent>, mut out: W) {
    loop {
        match events.recv().await {
            Ok(event) => {
                let written = if event == CaneEvent::Listening {
                    // blank line between cycles
                    writeln!(out, "\n{event}")
                } else {
                    writeln!(out, "{event}")
                };
                if let Err(e) = written.and_then(|()| out.flush()) {
                    warn!(error = %e, "console write failed");
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "console lagged behind events");
            }
            Err(broadcast::error::RecvError::Closed) => {
                break;
            }
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
