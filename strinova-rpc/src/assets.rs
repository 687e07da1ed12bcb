use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::config::Config;

pub const WEAPON_MAP_FILE: &str = "character_weapon_map.json";
pub const ICON_MAP_FILE: &str = "character_icons.json";

#[derive(Debug, Clone)]
pub struct OcrAssets {
	pub detection: PathBuf,
	pub recognition: PathBuf,
	pub charset: PathBuf,
}

#[derive(Debug, Clone)]
pub struct RosterFiles {
	pub weapon_map: PathBuf,
	pub icon_map: PathBuf,
}

/// Directories searched for bundled files, most specific first.
///
/// `STRINOVA_RPC_ASSETS_DIR` overrides everything except paths set in the
/// config file.
fn search_dirs(configured: Option<&Path>, config_path: &Path) -> Vec<PathBuf> {
	let mut candidates: Vec<PathBuf> = Vec::new();
	if let Some(dir) = configured {
		candidates.push(dir.to_path_buf());
	}
	if let Some(dir) = std::env::var_os("STRINOVA_RPC_ASSETS_DIR") {
		candidates.push(PathBuf::from(dir));
	}
	if let Some(dir) = config_path.parent() {
		candidates.push(dir.to_path_buf());
	}
	if let Ok(exe) = std::env::current_exe()
		&& let Some(dir) = exe.parent()
	{
		candidates.push(dir.to_path_buf());
	}
	if let Ok(cwd) = std::env::current_dir() {
		candidates.push(cwd);
	}
	// Source tree, for `cargo run` from anywhere.
	#[cfg(debug_assertions)]
	candidates.push(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets"));
	candidates
}

fn searched(tried: &[PathBuf]) -> String {
	tried
		.iter()
		.map(|p| format!("  - {}", p.display()))
		.collect::<Vec<_>>()
		.join("\n")
}

/// Accept either a directory holding `ocr/` or the `ocr/` directory itself.
fn ocr_dir(dir: &Path) -> PathBuf {
	if dir.join("detection.mnn").is_file() {
		dir.to_path_buf()
	} else {
		dir.join("ocr")
	}
}

/// Locate the OCR model files.
pub fn resolve_ocr_assets(cfg: &Config, config_path: &Path) -> Result<OcrAssets> {
	let mut tried = Vec::new();
	for base in search_dirs(cfg.ocr.assets_dir.as_deref(), config_path) {
		let dir = ocr_dir(&base);
		let assets = OcrAssets {
			detection: dir.join("detection.mnn"),
			recognition: dir.join("latin_recognition.mnn"),
			charset: dir.join("latin_charset.txt"),
		};
		if assets.detection.is_file() && assets.recognition.is_file() && assets.charset.is_file() {
			tracing::debug!(dir = %dir.display(), "found OCR models");
			return Ok(assets);
		}
		tried.push(dir);
	}

	bail!(
		"OCR model files not found. Expected ocr/detection.mnn, ocr/latin_recognition.mnn and ocr/latin_charset.txt.\n\nSearched in:\n{}\n\nFix: copy the 'ocr/' folder next to the executable, set ocr.assets_dir in the config, or set STRINOVA_RPC_ASSETS_DIR.",
		searched(&tried)
	)
}

/// Locate the weapon and icon maps. Paths set in the config are used as is.
pub fn resolve_roster(cfg: &Config, config_path: &Path) -> Result<RosterFiles> {
	let dirs = search_dirs(cfg.ocr.assets_dir.as_deref(), config_path);
	Ok(RosterFiles {
		weapon_map: find(cfg.roster.weapon_map.as_deref(), WEAPON_MAP_FILE, &dirs)?,
		icon_map: find(cfg.roster.icon_map.as_deref(), ICON_MAP_FILE, &dirs)?,
	})
}

fn find(configured: Option<&Path>, name: &str, dirs: &[PathBuf]) -> Result<PathBuf> {
	if let Some(path) = configured {
		if path.is_file() {
			return Ok(path.to_path_buf());
		}
		bail!("{} does not exist", path.display());
	}

	let mut tried = Vec::new();
	for dir in dirs {
		let path = dir.join(name);
		if path.is_file() {
			return Ok(path);
		}
		tried.push(path);
	}
	bail!("{name} not found. Searched:\n{}", searched(&tried))
}
