//! Presence state and the pure decisions made on it every tick.
//!
//! Nothing in here touches the screen or the network: the poll loop feeds in
//! OCR reads and a timestamp, and gets back an optional [`PublishCommand`].

use std::time::{Duration, SystemTime};

use data::CharacterId;

mod classifier;
pub use classifier::{MatchClassifier, MatchInfo, MatchUpdate};
mod driver;
pub use driver::PresenceDriver;

/// Shown phase of the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
	Menu,
	InMatch,
}

impl std::fmt::Display for MatchPhase {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			MatchPhase::Menu => write!(f, "In Menu"),
			MatchPhase::InMatch => write!(f, "In Match"),
		}
	}
}

/// The observable part of the presence, used for change detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceSnapshot {
	pub character: Option<CharacterId>,
	pub in_match: bool,
	/// Set exactly while `in_match`; a new match always differs from the last.
	pub match_started_at: Option<SystemTime>,
	/// Whole minutes since the match started.
	pub elapsed_minute: Option<u64>,
}

/// Everything the transport needs to show one presence update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishCommand {
	pub snapshot: PresenceSnapshot,
	pub elapsed: Option<Duration>,
}

impl PublishCommand {
	pub fn phase(&self) -> MatchPhase {
		if self.snapshot.in_match {
			MatchPhase::InMatch
		} else {
			MatchPhase::Menu
		}
	}
}

/// The single mutable entity of the application.
///
/// `match_started_at` is `Some` exactly while `in_match` is true.
/// `last_published` only changes when the transport confirms an update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceState {
	character: Option<CharacterId>,
	in_match: bool,
	match_started_at: Option<SystemTime>,
	/// Consecutive ticks without the active indicator while in a match.
	missed_indicators: u32,
	last_published: Option<PresenceSnapshot>,
}

impl PresenceState {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn character(&self) -> Option<&CharacterId> {
		self.character.as_ref()
	}

	pub fn in_match(&self) -> bool {
		self.in_match
	}

	pub fn phase(&self) -> MatchPhase {
		if self.in_match {
			MatchPhase::InMatch
		} else {
			MatchPhase::Menu
		}
	}

	pub fn match_started_at(&self) -> Option<SystemTime> {
		self.match_started_at
	}

	pub fn missed_indicators(&self) -> u32 {
		self.missed_indicators
	}

	pub fn last_published(&self) -> Option<&PresenceSnapshot> {
		self.last_published.as_ref()
	}

	/// Time since the match started, `None` outside a match.
	pub fn elapsed(&self, now: SystemTime) -> Option<Duration> {
		self.match_started_at
			.map(|start| now.duration_since(start).unwrap_or_default())
	}

	/// Record that the transport accepted `snapshot`.
	pub fn acknowledge(&mut self, snapshot: PresenceSnapshot) {
		self.last_published = Some(snapshot);
	}

	pub(crate) fn snapshot(&self, now: SystemTime) -> PresenceSnapshot {
		PresenceSnapshot {
			character: self.character.clone(),
			in_match: self.in_match,
			match_started_at: self.match_started_at,
			elapsed_minute: self.elapsed(now).map(|d| d.as_secs() / 60),
		}
	}
}
