mod image;
pub use image::*;
mod ocr;
pub use ocr::Ocr;
mod region;
pub use region::*;
pub mod text;

pub struct Ie {
	ocr: Ocr,
}

impl Ie {
	/// Load the OCR models.
	///
	/// Failing here means the engine is unavailable, which the caller should
	/// treat as a fatal configuration error.
	pub fn try_new(
		ocr_detection: impl AsRef<std::path::Path>,
		ocr_recognition: impl AsRef<std::path::Path>,
		ocr_charsset: impl AsRef<std::path::Path>,
	) -> anyhow::Result<Self> {
		Ok(Self {
			ocr: Ocr::try_new(ocr_detection, ocr_recognition, ocr_charsset)?,
		})
	}

	/// Raw OCR text of a region, preprocessed but not normalized.
	pub fn read_text(&self, image: Image) -> String {
		image.get_text(&self.ocr)
	}

	/// Recognize and normalize the text of a region.
	///
	/// Returns `None` for empty or garbled reads rather than passing noise on.
	pub fn recognize(&self, image: Image) -> Option<String> {
		let raw = self.read_text(image);
		let text = text::normalize(&raw);
		if text.is_none() && !raw.trim().is_empty() {
			tracing::trace!(raw = %raw, "discarded low-confidence read");
		}
		text
	}
}
