use async_trait::async_trait;
use registry_core::{AlwaysConfirm, Confirm, ConfirmPrompt, Confirmation};
use std::io::{self, BufRead, Write};
use tracing::warn;

/// Asks on the terminal; anything but y/yes declines
pub struct TerminalConfirm;

#[async_trait]
impl Confirm for TerminalConfirm {
    async fn confirm(&self, prompt: &ConfirmPrompt) -> Confirmation {
        let text = format!("{}: {} [y/N] ", prompt.title, prompt.message);
        let answer = tokio::task::spawn_blocking(move || -> io::Result<String> {
            let mut stderr = io::stderr();
            stderr.write_all(text.as_bytes())?;
            stderr.flush()?;
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line)?;
            Ok(line)
        })
        .await;

        match answer {
            Ok(Ok(line)) => parse_answer(&line),
            Ok(Err(e)) => {
                warn!("Could not read confirmation: {}", e);
                Confirmation::Declined
            }
            Err(e) => {
                warn!("Confirmation prompt failed: {}", e);
                Confirmation::Declined
            }
        }
    }
}

pub fn parse_answer(line: &str) -> Confirmation {
    match line.trim().to_lowercase().as_str() {
        "y" | "yes" => Confirmation::Confirmed,
        _ => Confirmation::Declined,
    }
}

pub fn confirmer(assume_yes: bool) -> Box<dyn Confirm> {
    if assume_yes {
        Box::new(AlwaysConfirm)
    } else {
        Box::new(TerminalConfirm)
    }
}
