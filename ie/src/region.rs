//! Screen regions expressed as fractions of the screen.
//!
//! Users calibrate regions once as fractions so the same config keeps working
//! across resolutions and DPI changes. Pixel rectangles are derived on every
//! capture from whatever the screen size is at that moment.

use anyhow::ensure;

/// Fractional rectangle, every edge in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Region {
	pub left: f32,
	pub top: f32,
	pub right: f32,
	pub bottom: f32,
}

/// A named region sampled every tick.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionSpec {
	pub name: String,
	pub region: Region,
}

/// Absolute pixel rectangle relative to the captured screen's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
	pub x: u32,
	pub y: u32,
	pub width: u32,
	pub height: u32,
}

impl Region {
	pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
		Self { left, top, right, bottom }
	}

	pub fn validate(&self) -> anyhow::Result<()> {
		let edges = [self.left, self.top, self.right, self.bottom];
		ensure!(
			edges.iter().all(|v| v.is_finite() && (0.0..=1.0).contains(v)),
			"region edges must lie within [0, 1], got {self:?}"
		);
		ensure!(self.left < self.right, "region left must be less than right, got {self:?}");
		ensure!(self.top < self.bottom, "region top must be less than bottom, got {self:?}");
		Ok(())
	}

	/// Convert to pixels for a `screen_w` x `screen_h` screen.
	///
	/// Left and top round down, right and bottom to the nearest pixel. The
	/// result is never empty and never extends past the screen.
	pub fn to_pixels(&self, screen_w: u32, screen_h: u32) -> PixelRect {
		let x0 = scale(self.left, screen_w, f64::floor);
		let y0 = scale(self.top, screen_h, f64::floor);
		let x1 = scale(self.right, screen_w, f64::round).max(x0 + 1).min(screen_w.max(1));
		let y1 = scale(self.bottom, screen_h, f64::round).max(y0 + 1).min(screen_h.max(1));
		let x0 = x0.min(x1.saturating_sub(1));
		let y0 = y0.min(y1.saturating_sub(1));

		PixelRect {
			x: x0,
			y: y0,
			width: x1 - x0,
			height: y1 - y0,
		}
	}
}

impl RegionSpec {
	pub fn new(name: impl Into<String>, region: Region) -> Self {
		Self { name: name.into(), region }
	}
}

impl PixelRect {
	/// Inverse of [`Region::to_pixels`] on the same screen size.
	pub fn to_fraction(&self, screen_w: u32, screen_h: u32) -> Region {
		let w = screen_w.max(1) as f32;
		let h = screen_h.max(1) as f32;
		Region {
			left: self.x as f32 / w,
			top: self.y as f32 / h,
			right: (self.x + self.width) as f32 / w,
			bottom: (self.y + self.height) as f32 / h,
		}
	}
}

#[inline]
fn scale(fraction: f32, size: u32, snap: fn(f64) -> f64) -> u32 {
	snap(fraction.clamp(0.0, 1.0) as f64 * size as f64) as u32
}

#[cfg(test)]
mod tests {
	use super::*;

	fn assert_close(a: Region, b: Region, tolerance: f32) {
		for (x, y) in [(a.left, b.left), (a.top, b.top), (a.right, b.right), (a.bottom, b.bottom)] {
			assert!((x - y).abs() <= tolerance, "{a:?} != {b:?}");
		}
	}

	#[test]
	fn converts_to_pixels() {
		let rect = Region::new(0.8, 0.88, 0.98, 0.94).to_pixels(1920, 1080);
		assert_eq!(rect, PixelRect { x: 1536, y: 950, width: 346, height: 65 });
	}

	#[test]
	fn pixel_round_trip_stays_within_a_pixel() {
		let regions = [
			Region::new(0.8, 0.88, 0.98, 0.94),
			Region::new(0.4, 0.0, 0.6, 0.08),
			Region::new(0.0, 0.0, 1.0, 1.0),
			Region::new(0.123, 0.456, 0.789, 0.987),
		];
		for (w, h) in [(1920, 1080), (2560, 1440), (1366, 768), (3840, 2160)] {
			for region in regions {
				let back = region.to_pixels(w, h).to_fraction(w, h);
				assert_close(region, back, 1.0 / h.min(w) as f32 + f32::EPSILON);
			}
		}
	}

	#[test]
	fn exact_pixel_fractions_round_trip_exactly() {
		let rect = PixelRect { x: 480, y: 270, width: 960, height: 540 };
		let region = rect.to_fraction(1920, 1080);
		assert_eq!(region.to_pixels(1920, 1080), rect);
	}

	#[test]
	fn tiny_region_is_never_empty() {
		let rect = Region::new(0.5, 0.5, 0.5001, 0.5001).to_pixels(100, 100);
		assert_eq!((rect.width, rect.height), (1, 1));

		let edge = Region::new(0.9999, 0.9999, 1.0, 1.0).to_pixels(100, 100);
		assert_eq!(edge, PixelRect { x: 99, y: 99, width: 1, height: 1 });
	}

	#[test]
	fn leading_edges_round_down_trailing_edges_to_nearest() {
		// 6.6 px floors to 6; 8.6 px rounds to 9.
		let rect = Region::new(0.66, 0.66, 0.86, 0.86).to_pixels(10, 10);
		assert_eq!(rect, PixelRect { x: 6, y: 6, width: 3, height: 3 });
	}

	#[test]
	fn validate_rejects_bad_regions() {
		assert!(Region::new(0.1, 0.1, 0.2, 0.2).validate().is_ok());
		assert!(Region::new(0.3, 0.1, 0.2, 0.2).validate().is_err());
		assert!(Region::new(0.1, 0.1, 0.2, 1.5).validate().is_err());
		assert!(Region::new(0.1, f32::NAN, 0.2, 0.2).validate().is_err());
	}

	#[test]
	fn deserializes_from_config_json() {
		let region: Region =
			serde_json::from_str(r#"{"left": 0.8, "top": 0.88, "right": 0.98, "bottom": 0.94}"#).unwrap();
		assert_eq!(region, Region::new(0.8, 0.88, 0.98, 0.94));
	}
}
