use ie::{OwnedImage, RegionSpec};
use xcap::image::EncodableLayout;

use crate::error::Error;

/// Source of region bitmaps.
pub trait Sampler {
	fn capture(&mut self, region: &RegionSpec) -> Result<OwnedImage, Error>;
}

/// Captures regions of the primary monitor (the game runs full-screen).
#[derive(Debug, Default)]
pub struct ScreenSampler {
	last_size: Option<(u32, u32)>,
}

impl ScreenSampler {
	pub fn new() -> Self {
		Self::default()
	}
}

impl Sampler for ScreenSampler {
	fn capture(&mut self, region: &RegionSpec) -> Result<OwnedImage, Error> {
		let fail = |message: String| Error::Capture {
			region: region.name.clone(),
			message,
		};

		let monitor = primary_monitor().map_err(fail)?;
		let img = monitor
			.capture_image()
			.map_err(|err| fail(format!("capture_image: {err}")))?;

		// Size is taken from the capture itself so DPI or resolution changes
		// need no restart.
		let size = (img.width(), img.height());
		if self.last_size != Some(size) {
			tracing::info!(width = size.0, height = size.1, "screen size");
			self.last_size = Some(size);
		}

		let frame = OwnedImage::from_rgba(img.width() as usize, img.as_bytes());
		let rect = region.region.to_pixels(size.0, size.1);
		tracing::trace!(region = %region.name, ?rect, "cropping region");
		Ok(frame.as_image().crop(rect).to_owned_image())
	}
}

fn primary_monitor() -> Result<xcap::Monitor, String> {
	let monitors = xcap::Monitor::all().map_err(|err| format!("list monitors: {err}"))?;
	let mut fallback = None;
	for monitor in monitors {
		if monitor.is_primary().unwrap_or(false) {
			return Ok(monitor);
		}
		fallback.get_or_insert(monitor);
	}
	fallback.ok_or_else(|| "no monitor available (no active display session?)".to_string())
}
