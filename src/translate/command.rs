//! Optional offline provider: shells out to a local translation command.
//!
//! Invocation contract: `<program> <source> <target>` with the text on stdin
//! and the translation expected on stdout. This fills the offline slot of
//! the chain when no network provider is reachable.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::warn;

use crate::translate::{TranslateError, TranslationProvider};

pub struct CommandProvider {
    program: String,
}

impl CommandProvider {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl TranslationProvider for CommandProvider {
    fn name(&self) -> &'static str {
        "offline"
    }

    async fn translate(
        &self,
        text: &str,
        source: &str,
        target: &str,
    ) -> Result<String, TranslateError> {
        if text.is_empty() {
            return Err(TranslateError::Empty);
        }

        let source = if source.is_empty() { "en" } else { source };

        let mut child = Command::new(&self.program)
            .arg(source)
            .arg(target)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TranslateError::Unavailable(format!("{}: {}", self.program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes()).await?;
            // Closes stdin so the command sees EOF
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(program = %self.program, status = ?output.status.code(), "Offline translator failed");
            return Err(TranslateError::Unavailable(
                stderr.chars().take(300).collect(),
            ));
        }

        let out = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if out.is_empty() {
            return Err(TranslateError::Empty);
        }
        Ok(out)
    }
}
