use std::time::SystemTime;

use data::WeaponMap;

use super::{MatchClassifier, MatchPhase, PresenceState, PublishCommand};

/// Turns one tick of OCR reads into the next presence state.
pub struct PresenceDriver {
	weapons: WeaponMap,
	classifier: MatchClassifier,
	max_distance: usize,
	clear_character_on_menu: bool,
}

impl PresenceDriver {
	pub fn new(weapons: WeaponMap, classifier: MatchClassifier, max_distance: usize) -> Self {
		Self {
			weapons,
			classifier,
			max_distance,
			clear_character_on_menu: false,
		}
	}

	/// Forget the character whenever a match ends.
	pub fn clear_character_on_menu(mut self, clear: bool) -> Self {
		self.clear_character_on_menu = clear;
		self
	}

	pub fn classifier(&self) -> &MatchClassifier {
		&self.classifier
	}

	/// Advance `state` by one tick.
	///
	/// Returns a command when the observable presence differs from what the
	/// transport last acknowledged. The caller reports success back through
	/// [`PresenceState::acknowledge`]; until then, every tick re-emits.
	pub fn tick(
		&self,
		weapon_read: Option<&str>,
		match_read: Option<&str>,
		now: SystemTime,
		state: &mut PresenceState,
	) -> Option<PublishCommand> {
		// A missed read keeps the previous character.
		if let Some((weapon, character)) = weapon_read.and_then(|read| self.weapons.lookup(read, self.max_distance)) {
			if state.character.as_ref() != Some(character) {
				tracing::info!(%weapon, %character, "character changed");
				state.character = Some(character.clone());
			}
		}

		let update = self.classifier.classify(match_read, now, state);
		state.in_match = update.in_match;
		state.match_started_at = update.match_started_at;
		state.missed_indicators = update.missed_indicators;

		match update.transition {
			Some(MatchPhase::InMatch) => tracing::info!("match detected; starting timer"),
			Some(MatchPhase::Menu) => {
				tracing::info!("match ended; resetting timer");
				if self.clear_character_on_menu {
					state.character = None;
				}
			}
			None => {}
		}

		let snapshot = state.snapshot(now);
		if state.last_published.as_ref() == Some(&snapshot) {
			return None;
		}

		Some(PublishCommand {
			snapshot,
			elapsed: state.elapsed(now),
		})
	}
}
