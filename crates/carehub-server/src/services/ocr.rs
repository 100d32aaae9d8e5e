//! Prescription image text extraction.

use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::config::OcrConfig;

/// Stored (sealed) when an image yields no text.
pub const NO_TEXT_PLACEHOLDER: &str = "No text detected";

#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("OCR engine unavailable: {0}")]
    Unavailable(#[source] std::io::Error),

    #[error("OCR engine exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
}

#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn extract_text(&self, image: &[u8]) -> Result<String, OcrError>;
}

/// Runs an external OCR command that reads the image on stdin and prints
/// the text on stdout (`tesseract stdin stdout` by default).
pub struct TesseractOcr {
    command: String,
    args: Vec<String>,
}

impl TesseractOcr {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn extract_text(&self, image: &[u8]) -> Result<String, OcrError> {
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(OcrError::Unavailable)?;

        if let Some(mut stdin) = child.stdin.take() {
            // The engine may exit before consuming all input; its exit status decides.
            if let Err(e) = stdin.write_all(image).await
                && e.kind() != std::io::ErrorKind::BrokenPipe
            {
                return Err(OcrError::Unavailable(e));
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(OcrError::Unavailable)?;
        if !output.status.success() {
            return Err(OcrError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

pub struct OcrService {
    engine: Option<Arc<dyn OcrEngine>>,
    fallback_text: String,
}

impl OcrService {
    pub fn new(engine: Option<Arc<dyn OcrEngine>>, fallback_text: impl Into<String>) -> Self {
        Self {
            engine,
            fallback_text: fallback_text.into(),
        }
    }

    pub fn from_config(config: &OcrConfig) -> Self {
        let engine: Option<Arc<dyn OcrEngine>> = config.enabled.then(|| {
            Arc::new(TesseractOcr::new(&config.command, config.args.clone())) as Arc<dyn OcrEngine>
        });
        Self::new(engine, &config.fallback_text)
    }

    /// Extracted text, possibly empty. Engine failures yield the simulated
    /// fallback text instead.
    pub async fn extract(&self, image: &[u8]) -> String {
        let Some(engine) = &self.engine else {
            return self.fallback_text.clone();
        };
        match engine.extract_text(image).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "OCR failed, using simulated text");
                self.fallback_text.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_binary_falls_back() {
        let service = OcrService::new(
            Some(Arc::new(TesseractOcr::new(
                "carehub-no-such-ocr-binary",
                vec![],
            ))),
            "simulated",
        );
        assert_eq!(service.extract(b"png").await, "simulated");
    }

    #[tokio::test]
    async fn disabled_engine_uses_fallback() {
        let config = OcrConfig {
            enabled: false,
            ..Default::default()
        };
        let text = OcrService::from_config(&config).extract(b"img").await;
        assert!(text.starts_with("Simulated:"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_output_is_trimmed() {
        let service = OcrService::new(
            Some(Arc::new(TesseractOcr::new("cat", vec![]))),
            "simulated",
        );
        assert_eq!(service.extract(b"  Ibuprofen 200mg \n").await, "Ibuprofen 200mg");
    }
}
