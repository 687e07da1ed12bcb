use std::collections::BTreeMap;

use anyhow::{bail, Result};

use crate::CharacterId;

/// Weapon name to character lookup.
///
/// Keys are stored normalized, so lookups ignore case, whitespace and UI
/// decoration. A `BTreeMap` keeps candidates in lexical order, which makes
/// fuzzy tie-breaking deterministic: the lexically first weapon wins.
#[derive(Debug, Clone, Default)]
pub struct WeaponMap {
	weapons: BTreeMap<String, CharacterId>,
}

impl WeaponMap {
	pub fn new<W, C>(entries: impl IntoIterator<Item = (W, C)>) -> Result<Self>
	where
		W: AsRef<str>,
		C: Into<CharacterId>,
	{
		let mut weapons = BTreeMap::new();
		for (weapon, character) in entries {
			let key = ie::text::normalize_key(weapon.as_ref());
			if key.is_empty() {
				bail!("empty weapon name in weapon map");
			}
			if weapons.insert(key.clone(), character.into()).is_some() {
				bail!("weapon {:?} is listed more than once (keys are case-insensitive)", key);
			}
		}
		Ok(Self { weapons })
	}

	pub fn len(&self) -> usize {
		self.weapons.len()
	}

	pub fn is_empty(&self) -> bool {
		self.weapons.is_empty()
	}

	pub fn characters(&self) -> impl Iterator<Item = &CharacterId> {
		self.weapons.values()
	}

	/// Find the weapon a (possibly noisy) OCR read refers to.
	///
	/// Tries an exact match, then the closest weapon by edit distance, then
	/// the read with leading or trailing words dropped. The closest weapon
	/// must be within `max_distance` edits and within half its length.
	pub fn lookup(&self, text: &str, max_distance: usize) -> Option<(&str, &CharacterId)> {
		let name = ie::text::normalize_key(text);
		if name.is_empty() {
			return None;
		}
		if let Some(found) = self.get(&name) {
			return Some(found);
		}

		// A near miss on the whole read beats an exact hit on part of it:
		// "sum tracer" is "sun tracer", not "tracer".
		let closest = self.closest(&name, max_distance);
		if closest.is_some() {
			return closest;
		}

		// OCR tends to pick up ammo counters and key hints next to the name.
		let mut start = 0;
		while let Some(index) = name[start..].find(' ') {
			start += index + 1;
			if let Some(found) = self.get(&name[start..]) {
				return Some(found);
			}
		}
		let mut end = name.len();
		while let Some(index) = name[..end].rfind(' ') {
			end = index;
			if let Some(found) = self.get(&name[..end]) {
				return Some(found);
			}
		}
		None
	}

	fn closest(&self, name: &str, max_distance: usize) -> Option<(&str, &CharacterId)> {
		let mut best = None;
		let mut min = usize::MAX;
		for (weapon, character) in &self.weapons {
			let lev = levenshtein::levenshtein(name, weapon);
			if lev < min {
				best = Some((weapon.as_str(), character));
				min = lev;
			}
		}

		let (weapon, character) = best?;
		let limit = max_distance.min(name.len().max(weapon.len()) / 2);
		if min > limit {
			tracing::trace!(read = %name, closest = %weapon, distance = min, "no weapon close enough");
			return None;
		}
		Some((weapon, character))
	}

	/// Resolve a read to a character, `None` when nothing is close enough.
	pub fn resolve(&self, text: &str, max_distance: usize) -> Option<CharacterId> {
		self.lookup(text, max_distance).map(|(_, character)| character.clone())
	}

	fn get(&self, key: &str) -> Option<(&str, &CharacterId)> {
		self.weapons
			.get_key_value(key)
			.map(|(weapon, character)| (weapon.as_str(), character))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn map() -> WeaponMap {
		WeaponMap::new([
			("Artemis", "Galatea"),
			("Sun Tracer", "Michele"),
			("Blade of Dawn", "Nobunaga"),
		])
		.unwrap()
	}

	#[test]
	fn exact_match_ignores_case_and_spacing() {
		let map = map();
		assert_eq!(map.resolve("artemis", 2), Some("Galatea".into()));
		assert_eq!(map.resolve("  SUN   tracer ", 2), Some("Michele".into()));
	}

	#[test]
	fn one_character_substitution_is_tolerated() {
		let map = WeaponMap::new([("artemis", "Galatea")]).unwrap();
		assert_eq!(map.resolve("Artem1s", 1), Some("Galatea".into()));
		assert_eq!(map.lookup("Artem1s", 1).map(|(w, _)| w), Some("artemis"));
	}

	#[test]
	fn distance_beyond_threshold_is_rejected() {
		let map = map();
		assert_eq!(map.resolve("Arxxmxs", 2), None);
		assert_eq!(map.resolve("Arxxmxs", 0), None);
		assert_eq!(map.resolve("Artemis", 0), Some("Galatea".into()));
	}

	#[test]
	fn short_reads_never_match_by_distance() {
		// Two edits apart, but half of a two-letter name is a single edit.
		let map = WeaponMap::new([("ax", "Someone")]).unwrap();
		assert_eq!(map.resolve("by", 5), None);
	}

	#[test]
	fn noise_around_the_name_is_dropped() {
		let map = map();
		assert_eq!(map.resolve("30/120 Sun Tracer", 0), Some("Michele".into()));
		assert_eq!(map.resolve("Blade of Dawn [F]", 0), Some("Nobunaga".into()));
	}

	#[test]
	fn near_miss_on_a_longer_name_beats_a_word_of_it() {
		let map = WeaponMap::new([("tracer", "Short"), ("sun tracer", "Long")]).unwrap();
		assert_eq!(map.resolve("sum tracer", 2), Some("Long".into()));
		assert_eq!(map.resolve("sun tracer", 2), Some("Long".into()));
		assert_eq!(map.resolve("12 tracer", 0), Some("Short".into()));
	}

	#[test]
	fn ties_go_to_the_lexically_first_weapon() {
		let map = WeaponMap::new([("cat", "C"), ("bat", "B")]).unwrap();
		assert_eq!(map.resolve("hat", 2), Some("B".into()));
	}

	#[test]
	fn duplicate_keys_are_rejected() {
		assert!(WeaponMap::new([("Artemis", "Galatea"), ("ARTEMIS ", "Other")]).is_err());
	}

	#[test]
	fn empty_read_resolves_to_nothing() {
		assert_eq!(map().resolve("", 2), None);
	}
}
