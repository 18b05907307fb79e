//! Confirmation port
//!
//! The engine only owns the decision contract for yes/no gating (for example,
//! "create the missing archive root?"). The prompting mechanics live in the
//! binary.

/// Port trait for yes/no confirmation
#[async_trait::async_trait]
pub trait Confirm: Send + Sync {
    /// Asks `question` and returns the answer
    ///
    /// Implementations that cannot ask must answer `false`.
    async fn confirm(&self, question: &str) -> bool;
}

/// Confirmation policy for unattended runs: every question is answered "no"
#[derive(Debug, Clone, Copy, Default)]
pub struct NonInteractive;

#[async_trait::async_trait]
impl Confirm for NonInteractive {
    async fn confirm(&self, _question: &str) -> bool {
        false
    }
}

/// Confirmation policy for `--yes`: every question is answered "yes"
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeYes;

#[async_trait::async_trait]
impl Confirm for AssumeYes {
    async fn confirm(&self, _question: &str) -> bool {
        true
    }
}
