//! Terminal confirmation prompt

use std::io::{BufRead, Write};

use drivesync_core::ports::Confirm;
use tokio::sync::Mutex;
use tracing::warn;

/// Asks yes/no questions on stdin/stderr
///
/// Questions are serialized so concurrent resolutions never interleave
/// their prompts.
#[derive(Debug, Default)]
pub struct StdinConfirm {
    lock: Mutex<()>,
}

impl StdinConfirm {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Empty input, `y` and `yes` mean yes; `n` and `no` mean no
///
/// Anything else is `None` and asks again.
pub fn parse_answer(line: &str) -> Option<bool> {
    match line.trim().to_ascii_lowercase().as_str() {
        "" | "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

#[async_trait::async_trait]
impl Confirm for StdinConfirm {
    async fn confirm(&self, question: &str) -> bool {
        let _guard = self.lock.lock().await;
        let question = question.to_string();

        let answer = tokio::task::spawn_blocking(move || {
            let mut stderr = std::io::stderr();
            let stdin = std::io::stdin();
            loop {
                let _ = write!(stderr, "{question} [Y/n] ");
                let _ = stderr.flush();
                let mut line = String::new();
                match stdin.lock().read_line(&mut line) {
                    // EOF is a "no"
                    Ok(0) => return false,
                    Ok(_) => {
                        if let Some(answer) = parse_answer(&line) {
                            return answer;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to read answer");
                        return false;
                    }
                }
            }
        })
        .await;

        answer.unwrap_or_else(|e| {
            warn!(error = %e, "Prompt task failed");
            false
        })
    }
}
