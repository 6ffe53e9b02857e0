//! External classifier runtime
//!
//! Runs the AI-music detection model through a command-line scorer, the same
//! way local musical-feature extraction is commonly shipped as a separate
//! analysis binary. The scorer receives a raw little-endian f32 window on a
//! temp file and prints a single probability to stdout.
//!
//! Usage contract: `<command> <window.f32>` → `0.87\n`

use crate::services::inference::{ClassifierRuntime, InferenceError};
use async_trait::async_trait;
use std::process::Command;

/// Classifier collaborator backed by an external scorer binary
pub struct ExternalClassifier {
    command: String,
}

impl ExternalClassifier {
    pub fn new(command: String) -> Self {
        ExternalClassifier { command }
    }
}

#[async_trait]
impl ClassifierRuntime for ExternalClassifier {
    async fn prepare(&self) -> Result<(), InferenceError> {
        let command = self.command.clone();
        let result = tokio::task::spawn_blocking(move || {
            Command::new(&command).arg("--version").output()
        })
        .await
        .map_err(|e| InferenceError::Session(format!("task join error: {e}")))?;

        match result {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(InferenceError::Session(
                format!("classifier binary not found: {}", self.command),
            )),
            Err(e) => Err(InferenceError::Session(e.to_string())),
        }
    }

    async fn run(&self, window: &[f32]) -> Result<f32, InferenceError> {
        let input = std::env::temp_dir().join(format!("sift_window_{}.f32", uuid::Uuid::new_v4()));

        let mut bytes = Vec::with_capacity(window.len() * 4);
        for sample in window {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        tokio::fs::write(&input, &bytes)
            .await
            .map_err(|e| InferenceError::Run(e.to_string()))?;

        let output = tokio::task::spawn_blocking({
            let command = self.command.clone();
            let input = input.clone();
            move || Command::new(&command).arg(&input).output()
        })
        .await
        .map_err(|e| InferenceError::Run(format!("task join error: {e}")))?
        .map_err(|e| InferenceError::Run(e.to_string()));

        let _ = tokio::fs::remove_file(&input).await;
        let output = output?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(InferenceError::Run(format!(
                "exit code {:?}: {}",
                output.status.code(),
                stderr
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let probability: f32 = stdout
            .trim()
            .parse()
            .map_err(|_| InferenceError::Run(format!("unparseable scorer output: {stdout:?}")))?;

        if !(0.0..=1.0).contains(&probability) {
            return Err(InferenceError::Run(format!(
                "probability out of range: {probability}"
            )));
        }

        Ok(probability)
    }
}
