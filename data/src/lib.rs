//! Static game data: which weapon belongs to which character, and which
//! presence asset shows each character.

use std::{
	collections::{BTreeMap, HashMap},
	fs,
	path::Path,
};

use anyhow::{ensure, Context, Result};

mod weapons;
pub use weapons::WeaponMap;

/// Name of a playable character, as shown to other users.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct CharacterId(String);

impl CharacterId {
	pub fn new(name: impl Into<String>) -> Self {
		Self(name.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl std::fmt::Display for CharacterId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for CharacterId {
	fn from(name: &str) -> Self {
		Self::new(name)
	}
}

impl From<String> for CharacterId {
	fn from(name: String) -> Self {
		Self(name)
	}
}

/// Character to presence asset key.
#[derive(Debug, Clone, Default)]
pub struct IconMap {
	icons: HashMap<CharacterId, String>,
}

impl IconMap {
	pub fn new<C, K>(entries: impl IntoIterator<Item = (C, K)>) -> Self
	where
		C: Into<CharacterId>,
		K: Into<String>,
	{
		Self {
			icons: entries
				.into_iter()
				.map(|(character, key)| (character.into(), key.into()))
				.collect(),
		}
	}

	pub fn get(&self, character: &CharacterId) -> Option<&str> {
		self.icons.get(character).map(String::as_str)
	}
}

/// Everything loaded from the roster files.
#[derive(Debug, Clone, Default)]
pub struct Roster {
	pub weapons: WeaponMap,
	pub icons: IconMap,
}

impl Roster {
	pub fn new(weapons: WeaponMap, icons: IconMap) -> Self {
		for character in weapons.characters() {
			if icons.get(character).is_none() {
				tracing::warn!(%character, "character has no presence icon; the logo will be shown instead");
			}
		}
		Self { weapons, icons }
	}

	/// Load `{"weapon": "Character"}` and `{"Character": "asset_key"}` JSON files.
	pub fn load(weapon_map: impl AsRef<Path>, icon_map: impl AsRef<Path>) -> Result<Self> {
		let (weapon_map, icon_map) = (weapon_map.as_ref(), icon_map.as_ref());
		let weapons = fs::read_to_string(weapon_map).with_context(|| format!("Read {}", weapon_map.display()))?;
		let icons = fs::read_to_string(icon_map).with_context(|| format!("Read {}", icon_map.display()))?;
		Self::from_json(&weapons, &icons)
			.with_context(|| format!("Load roster from {} and {}", weapon_map.display(), icon_map.display()))
	}

	/// Parse both maps from JSON text. A roster without weapons is an error.
	pub fn from_json(weapon_map: &str, icon_map: &str) -> Result<Self> {
		let weapon_entries: BTreeMap<String, String> =
			serde_json::from_str(weapon_map).context("Parse weapon map")?;
		let icon_entries: BTreeMap<String, String> =
			serde_json::from_str(icon_map).context("Parse icon map")?;

		let weapons = WeaponMap::new(weapon_entries).context("Invalid weapon map")?;
		ensure!(!weapons.is_empty(), "Weapon map is empty");
		Ok(Self::new(weapons, IconMap::new(icon_entries)))
	}
}
