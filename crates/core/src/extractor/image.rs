use super::TextExtractor;
use crate::config::OcrOptions;
use crate::error::ExtractionError;
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::process::Command;

pub struct TesseractExtractor {
    options: OcrOptions,
}

impl TesseractExtractor {
    pub fn new(options: OcrOptions) -> Self {
        Self { options }
    }

    fn run_tesseract(&self, image_path: &Path) -> Result<String, ExtractionError> {
        let output = Command::new(&self.options.tesseract_bin)
            .arg(image_path)
            .arg("stdout")
            .args(["-l", &self.options.language])
            .output();

        match output {
            Ok(output) if output.status.success() => {
                Ok(String::from_utf8_lossy(&output.stdout).into_owned())
            }
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(ExtractionError::OcrFailed(format!(
                    "{} exited with {}: {}",
                    self.options.tesseract_bin,
                    output.status,
                    stderr.trim()
                )))
            }
            Err(error) if error.kind() == ErrorKind::NotFound => Err(ExtractionError::OcrUnavailable(
                format!("{} not found (install tesseract-ocr)", self.options.tesseract_bin),
            )),
            Err(error) => Err(ExtractionError::Io(error)),
        }
    }
}

impl TextExtractor for TesseractExtractor {
    fn format(&self) -> &'static str {
        "image"
    }

    fn extract_text(&self, bytes: &[u8]) -> Result<Option<String>, ExtractionError> {
        let mut staged = tempfile::Builder::new().prefix("docsearch-ocr-").tempfile()?;
        staged.write_all(bytes)?;
        staged.flush()?;

        let text = self.run_tesseract(staged.path())?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_binary_is_reported_as_unavailable() {
        let extractor = TesseractExtractor::new(OcrOptions {
            tesseract_bin: "/nonexistent/bin/tesseract-for-tests".to_string(),
            ..OcrOptions::default()
        });

        let result = extractor.extract_text(b"\x89PNG\r\n\x1a\n");
        assert!(matches!(result, Err(ExtractionError::OcrUnavailable(_))));
    }
}
