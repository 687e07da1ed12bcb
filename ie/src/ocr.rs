//! OCR wrapper.
//!
//! Text recognition is delegated to `ocr-rs` (Rust PaddleOCR bindings). The
//! engine is a black box here: it may return an empty string or noise, and
//! filtering that is the job of [`crate::text`].

use std::path::Path;

use anyhow::Context;

pub struct Ocr {
    engine: ocr_rs::OcrEngine,
}

impl Ocr {
    /// Initialize the OCR engine with the given model paths.
    ///
    /// Missing or invalid model files surface as an error so the binary can
    /// refuse to start with a clear message.
    pub fn try_new(
        detection: impl AsRef<Path>,
        recognition: impl AsRef<Path>,
        charsset: impl AsRef<Path>,
    ) -> anyhow::Result<Self> {
        let detection = detection.as_ref();
        let recognition = recognition.as_ref();
        let charsset = charsset.as_ref();
        for path in [detection, recognition, charsset] {
            anyhow::ensure!(path.is_file(), "OCR model file {} does not exist", path.display());
        }

        // Crops are tiny; a couple of threads is plenty and keeps the game smooth.
        let thread_count = std::thread::available_parallelism()
            .map(|n| n.get().min(2))
            .unwrap_or(1);

        let engine = ocr_rs::OcrEngine::new(
            detection,
            recognition,
            charsset,
            Some(ocr_rs::OcrEngineConfig {
                backend: ocr_rs::Backend::CPU,
                thread_count,
                precision_mode: ocr_rs::PrecisionMode::High,
                enable_parallel: thread_count > 1,
                min_result_confidence: 0.5,
                ..Default::default()
            }),
        )
        .context("failed to initialize OCR engine")?;

        Ok(Self { engine })
    }

    /// Recognize text from an RGB image view.
    ///
    /// Engine errors are reported as "no text"; they are transient per frame.
    pub fn get_text(&self, image: crate::Image) -> String {
        let image = ocr_rs::preprocess::rgb_to_image(&image.get_bytes(), image.width(), image.height());

        match self.engine.recognize(&image) {
            Ok(results) => results
                .into_iter()
                .map(|v| v.text)
                .collect::<Vec<_>>()
                .join(" "),
            Err(err) => {
                tracing::debug!(error = %err, "OCR engine failed on frame");
                String::new()
            }
        }
    }
}
