//! Application configuration.
//!
//! Stored as JSON in a platform-appropriate config directory, or wherever
//! `--config` points. Loaded once at startup; never written back while
//! running.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use ie::Region;
use serde::{Deserialize, Serialize};

/// On-disk configuration for the application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
	/// Seconds between two screen samples.
	pub poll_interval_s: f32,

	/// Screen regions as fractions of the primary monitor.
	pub regions: Regions,

	pub ocr: OcrConfig,

	#[serde(rename = "match")]
	pub match_: MatchConfig,

	pub discord: DiscordConfig,

	pub display: DisplayOptions,

	pub roster: RosterConfig,

	/// Consecutive ticks with both captures failing before a warning is logged.
	pub failure_warn_ticks: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Regions {
	/// Weapon name in the bottom-right HUD.
	pub weapon_name: Region,
	/// Objective banner and round timer at the top-center.
	pub match_info: Region,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
	/// Maximum edit distance between an OCR read and a known weapon name.
	pub fuzzy_max_distance: usize,
	/// Folder containing the OCR model files (or an `ocr/` subfolder).
	pub assets_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
	/// Case-insensitive regex; a match-info read matching it means a match is running.
	pub active_pattern: String,
	/// Consecutive ticks without the pattern before the match is considered over.
	pub end_hysteresis_ticks: u32,
	/// Forget the character when a match ends instead of keeping the last one.
	pub clear_character_on_menu: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
	/// Discord application id.
	pub client_id: String,
	/// Asset key of the game logo.
	pub logo_image: String,
	/// Hover text of the game logo.
	pub logo_text: String,
	/// Seconds to wait between connection attempts.
	pub reconnect_interval_s: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayOptions {
	pub show_character: bool,
	pub show_timer: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterConfig {
	/// `{"weapon": "Character"}` JSON. Defaults to `character_weapon_map.json` next to the config.
	pub weapon_map: Option<PathBuf>,
	/// `{"Character": "asset_key"}` JSON. Defaults to `character_icons.json` next to the config.
	pub icon_map: Option<PathBuf>,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			poll_interval_s: 2.0,
			regions: Regions::default(),
			ocr: OcrConfig::default(),
			match_: MatchConfig::default(),
			discord: DiscordConfig::default(),
			display: DisplayOptions::default(),
			roster: RosterConfig::default(),
			failure_warn_ticks: 3,
		}
	}
}

impl Default for Regions {
	fn default() -> Self {
		Self {
			weapon_name: Region::new(0.80, 0.88, 0.98, 0.94),
			match_info: Region::new(0.40, 0.00, 0.60, 0.08),
		}
	}
}

impl Default for OcrConfig {
	fn default() -> Self {
		Self {
			fuzzy_max_distance: 2,
			assets_dir: None,
		}
	}
}

impl Default for MatchConfig {
	fn default() -> Self {
		Self {
			active_pattern: "objectiv".to_string(),
			end_hysteresis_ticks: 3,
			clear_character_on_menu: false,
		}
	}
}

impl Default for DiscordConfig {
	fn default() -> Self {
		Self {
			client_id: String::new(),
			logo_image: "strinova_logo".to_string(),
			logo_text: "Strinova".to_string(),
			reconnect_interval_s: 10,
		}
	}
}

impl Default for DisplayOptions {
	fn default() -> Self {
		Self {
			show_character: true,
			show_timer: true,
		}
	}
}

impl Config {
	/// Default path to the config file.
	pub fn default_path() -> Result<PathBuf> {
		let base = dirs::config_dir().context("config_dir() unavailable")?;
		Ok(base.join("strinova-rpc").join("config.json"))
	}

	/// Load and validate the config at `path`.
	///
	/// A missing file is replaced by defaults, which are written out so the
	/// user has something to edit. A file that exists but does not parse is
	/// an error.
	pub fn load(path: &Path) -> Result<Self> {
		let cfg = Self::read(path)?;
		cfg.validate()
			.with_context(|| format!("invalid config {:?}", path))?;
		Ok(cfg)
	}

	/// Like [`Config::load`], without validation.
	pub fn read(path: &Path) -> Result<Self> {
		let cfg = if path.exists() {
			let json = fs::read_to_string(path).with_context(|| format!("read {:?}", path))?;
			serde_json::from_str(&json).with_context(|| format!("parse {:?}", path))?
		} else {
			tracing::warn!(path = %path.display(), "config file not found; writing defaults");
			let cfg = Self::default();
			if let Err(err) = cfg.save(path) {
				tracing::warn!(error = %err, "failed to write default config");
			}
			cfg
		};
		Ok(cfg)
	}

	/// Save configuration to disk.
	pub fn save(&self, path: &Path) -> Result<()> {
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent).with_context(|| format!("create {:?}", parent))?;
		}
		let json = serde_json::to_string_pretty(self).context("serialize config")?;
		fs::write(path, json).with_context(|| format!("write {:?}", path))?;
		Ok(())
	}

	pub fn validate(&self) -> Result<()> {
		ensure!(
			self.poll_interval_s.is_finite() && self.poll_interval_s > 0.0,
			"poll_interval_s must be positive"
		);
		self.regions.weapon_name.validate().context("regions.weapon_name")?;
		self.regions.match_info.validate().context("regions.match_info")?;
		ensure!(self.match_.end_hysteresis_ticks >= 1, "match.end_hysteresis_ticks must be at least 1");
		regex::RegexBuilder::new(&self.match_.active_pattern)
			.case_insensitive(true)
			.build()
			.context("match.active_pattern is not a valid regex")?;
		ensure!(
			!self.discord.client_id.trim().is_empty(),
			"discord.client_id is empty; set it to your Discord application id"
		);
		Ok(())
	}

	/// Poll period, clamped to a sane range.
	pub fn poll_interval(&self) -> Duration {
		Duration::from_secs_f32(self.poll_interval_s.clamp(0.1, 60.0))
	}

	pub fn reconnect_interval(&self) -> Duration {
		Duration::from_secs(self.discord.reconnect_interval_s.max(1))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn valid() -> Config {
		let mut cfg = Config::default();
		cfg.discord.client_id = "1234".into();
		cfg
	}

	#[test]
	fn partial_file_uses_defaults_for_the_rest() {
		let cfg: Config = serde_json::from_str(
			r#"{"poll_interval_s": 5, "match": {"end_hysteresis_ticks": 4}, "discord": {"client_id": "42"}}"#,
		)
		.unwrap();
		assert_eq!(cfg.poll_interval(), Duration::from_secs(5));
		assert_eq!(cfg.match_.end_hysteresis_ticks, 4);
		assert_eq!(cfg.match_.active_pattern, "objectiv");
		assert_eq!(cfg.discord.client_id, "42");
		assert_eq!(cfg.discord.logo_image, "strinova_logo");
		assert!(cfg.validate().is_ok());
	}

	#[test]
	fn missing_file_writes_defaults() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("nested").join("config.json");
		// Defaults have no client id, so loading fails, but the file is written.
		assert!(Config::load(&path).is_err());
		assert!(path.is_file());

		let mut cfg: Config = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
		cfg.discord.client_id = "1234".into();
		cfg.save(&path).unwrap();
		assert_eq!(Config::load(&path).unwrap().discord.client_id, "1234");
	}

	#[test]
	fn unparseable_file_is_an_error() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("config.json");
		fs::write(&path, "{ not json").unwrap();
		let err = Config::load(&path).unwrap_err();
		assert!(format!("{err:#}").contains("parse"));
	}

	#[test]
	fn validation_catches_bad_values() {
		assert!(valid().validate().is_ok());

		let mut cfg = valid();
		cfg.regions.weapon_name = Region::new(0.9, 0.9, 0.1, 0.1);
		assert!(cfg.validate().is_err());

		let mut cfg = valid();
		cfg.match_.end_hysteresis_ticks = 0;
		assert!(cfg.validate().is_err());

		let mut cfg = valid();
		cfg.match_.active_pattern = "(".into();
		assert!(cfg.validate().is_err());

		let mut cfg = valid();
		cfg.poll_interval_s = 0.0;
		assert!(cfg.validate().is_err());
	}

	#[test]
	fn poll_interval_is_clamped() {
		let mut cfg = valid();
		cfg.poll_interval_s = 3600.0;
		assert_eq!(cfg.poll_interval(), Duration::from_secs(60));
	}
}
