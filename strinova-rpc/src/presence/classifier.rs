//! Match state machine.
//!
//! Two states, `Menu` (initial) and `InMatch`:
//! - `Menu -> InMatch` on the first read matching the active pattern;
//! - `InMatch -> Menu` after `end_hysteresis` consecutive reads without it.
//!
//! OCR misses the objective banner now and then, so a single blank read
//! must never end a match.

use std::sync::LazyLock;
use std::time::SystemTime;

use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};

use super::{MatchPhase, PresenceState};

static TIMER_REGEX: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"(?<timer>\d{1,2}:\d{2})").expect("timer regex is valid"));

/// What the match-info region says this tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchInfo {
	/// The active indicator (objective banner) is visible.
	pub active: bool,
	/// Round timer as shown, `M:SS` or `MM:SS`.
	pub timer: Option<String>,
}

/// Result of classifying one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchUpdate {
	pub in_match: bool,
	pub match_started_at: Option<SystemTime>,
	pub missed_indicators: u32,
	/// Set when this tick changed the phase.
	pub transition: Option<MatchPhase>,
}

#[derive(Debug, Clone)]
pub struct MatchClassifier {
	active: Regex,
	end_hysteresis: u32,
}

impl MatchClassifier {
	pub fn new(active_pattern: &str, end_hysteresis: u32) -> Result<Self> {
		let active = RegexBuilder::new(active_pattern)
			.case_insensitive(true)
			.build()
			.with_context(|| format!("invalid active pattern {active_pattern:?}"))?;
		Ok(Self {
			active,
			end_hysteresis: end_hysteresis.max(1),
		})
	}

	pub fn end_hysteresis(&self) -> u32 {
		self.end_hysteresis
	}

	/// Interpret a match-info read.
	pub fn read(&self, text: Option<&str>) -> MatchInfo {
		let Some(text) = text else {
			return MatchInfo::default();
		};
		MatchInfo {
			active: self.active.is_match(text),
			timer: TIMER_REGEX
				.captures(text)
				.map(|caps| caps["timer"].to_string()),
		}
	}

	/// Advance the state machine by one tick.
	pub fn classify(&self, indicator: Option<&str>, now: SystemTime, prior: &PresenceState) -> MatchUpdate {
		let active = self.read(indicator).active;

		match (prior.in_match(), active) {
			(false, true) => MatchUpdate {
				in_match: true,
				match_started_at: Some(now),
				missed_indicators: 0,
				transition: Some(MatchPhase::InMatch),
			},
			(true, true) => MatchUpdate {
				in_match: true,
				match_started_at: prior.match_started_at().or(Some(now)),
				missed_indicators: 0,
				transition: None,
			},
			(true, false) => {
				let missed = prior.missed_indicators() + 1;
				if missed >= self.end_hysteresis {
					MatchUpdate {
						in_match: false,
						match_started_at: None,
						missed_indicators: 0,
						transition: Some(MatchPhase::Menu),
					}
				} else {
					MatchUpdate {
						in_match: true,
						match_started_at: prior.match_started_at().or(Some(now)),
						missed_indicators: missed,
						transition: None,
					}
				}
			}
			(false, false) => MatchUpdate {
				in_match: false,
				match_started_at: None,
				missed_indicators: 0,
				transition: None,
			},
		}
	}
}
