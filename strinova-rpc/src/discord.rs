//! Discord Rich Presence transport.
//!
//! The transport owns its connection lifecycle: it connects lazily on the
//! first publish, waits `reconnect_interval` after a failed attempt, and drops
//! the connection when a send fails so the next publish reconnects.

use std::time::{Duration, Instant, UNIX_EPOCH};

use data::IconMap;
use discord_rich_presence::{activity, DiscordIpc, DiscordIpcClient};

use crate::config::{DiscordConfig, DisplayOptions};
use crate::error::Error;
use crate::presence::{MatchPhase, PublishCommand};

/// Sink for presence updates.
pub trait Transport {
	/// Show `cmd`. `Ok` means the client accepted it.
	fn publish(&mut self, cmd: &PublishCommand) -> Result<(), Error>;

	/// Clear the presence and disconnect. Errors are ignored.
	fn shutdown(&mut self);
}

/// What one activity update shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityContent {
	pub details: String,
	pub state: String,
	pub large_image: String,
	pub large_text: String,
	/// Logo overlay, only shown next to a character icon.
	pub small: Option<(String, String)>,
	/// Unix timestamp the client counts elapsed time from.
	pub start: Option<i64>,
}

/// Builds activity content from publish commands.
#[derive(Debug, Clone)]
pub struct ActivityLayout {
	icons: IconMap,
	display: DisplayOptions,
	logo_image: String,
	logo_text: String,
}

impl ActivityLayout {
	pub fn new(icons: IconMap, display: DisplayOptions, discord: &DiscordConfig) -> Self {
		Self {
			icons,
			display,
			logo_image: discord.logo_image.clone(),
			logo_text: discord.logo_text.clone(),
		}
	}

	pub fn content(&self, cmd: &PublishCommand) -> ActivityContent {
		let character = cmd
			.snapshot
			.character
			.as_ref()
			.filter(|_| self.display.show_character);

		let (details, large_image, large_text, small) = match character {
			Some(character) => {
				let (image, text) = match self.icons.get(character) {
					Some(icon) => (icon.to_string(), character.to_string()),
					None => (self.logo_image.clone(), self.logo_text.clone()),
				};
				(
					format!("Playing as {character}"),
					image,
					text,
					Some((self.logo_image.clone(), self.logo_text.clone())),
				)
			}
			None => (
				"In Game".to_string(),
				self.logo_image.clone(),
				self.logo_text.clone(),
				None,
			),
		};

		let start = cmd
			.snapshot
			.match_started_at
			.filter(|_| self.display.show_timer && cmd.phase() == MatchPhase::InMatch)
			.and_then(|t| t.duration_since(UNIX_EPOCH).ok())
			.map(|d| d.as_secs() as i64);
		let state = if start.is_some() { MatchPhase::InMatch } else { MatchPhase::Menu };

		ActivityContent {
			details,
			state: state.to_string(),
			large_image,
			large_text,
			small,
			start,
		}
	}
}

pub struct DiscordPresence {
	client_id: String,
	client: Option<DiscordIpcClient>,
	next_attempt: Option<Instant>,
	reconnect_interval: Duration,
	layout: ActivityLayout,
}

impl DiscordPresence {
	pub fn new(discord: &DiscordConfig, reconnect_interval: Duration, layout: ActivityLayout) -> Self {
		Self {
			client_id: discord.client_id.clone(),
			client: None,
			next_attempt: None,
			reconnect_interval,
			layout,
		}
	}

	fn connected(&mut self) -> Result<&mut DiscordIpcClient, Error> {
		if self.client.is_none() {
			let now = Instant::now();
			if let Some(next) = self.next_attempt.filter(|next| *next > now) {
				return Err(Error::Disconnected(next - now));
			}

			match connect(&self.client_id) {
				Ok(client) => {
					tracing::info!("connected to Discord");
					self.next_attempt = None;
					self.client = Some(client);
				}
				Err(err) => {
					tracing::warn!(
						error = %err,
						retry_in_s = self.reconnect_interval.as_secs(),
						"failed to connect to Discord"
					);
					self.next_attempt = Some(now + self.reconnect_interval);
					return Err(Error::Transport(err));
				}
			}
		}

		self.client
			.as_mut()
			.ok_or_else(|| Error::Transport("not connected".to_string()))
	}
}

fn connect(client_id: &str) -> Result<DiscordIpcClient, String> {
	let mut client = DiscordIpcClient::new(client_id).map_err(|err| err.to_string())?;
	client.connect().map_err(|err| err.to_string())?;
	Ok(client)
}

impl Transport for DiscordPresence {
	fn publish(&mut self, cmd: &PublishCommand) -> Result<(), Error> {
		let content = self.layout.content(cmd);

		let mut assets = activity::Assets::new()
			.large_image(&content.large_image)
			.large_text(&content.large_text);
		if let Some((image, text)) = &content.small {
			assets = assets.small_image(image).small_text(text);
		}
		let mut payload = activity::Activity::new()
			.details(&content.details)
			.state(&content.state)
			.assets(assets);
		if let Some(start) = content.start {
			payload = payload.timestamps(activity::Timestamps::new().start(start));
		}

		let client = self.connected()?;
		if let Err(err) = client.set_activity(payload) {
			let err = err.to_string();
			// The pipe is most likely gone (Discord restarted); reconnect next time.
			self.client = None;
			return Err(Error::Transport(err));
		}

		tracing::debug!(details = %content.details, state = %content.state, "presence updated");
		Ok(())
	}

	fn shutdown(&mut self) {
		if let Some(mut client) = self.client.take() {
			let _ = client.clear_activity();
			let _ = client.close();
			tracing::info!("disconnected from Discord");
		}
	}
}

#[cfg(test)]
mod tests {
	use data::CharacterId;

	use super::*;
	use crate::presence::PresenceSnapshot;

	fn layout(display: DisplayOptions) -> ActivityLayout {
		ActivityLayout::new(
			IconMap::new([("Galatea", "galatea_icon")]),
			display,
			&DiscordConfig::default(),
		)
	}

	fn command(character: Option<&str>, started: Option<u64>) -> PublishCommand {
		let started_at = started.map(|s| UNIX_EPOCH + Duration::from_secs(s));
		PublishCommand {
			snapshot: PresenceSnapshot {
				character: character.map(CharacterId::from),
				in_match: started.is_some(),
				match_started_at: started_at,
				elapsed_minute: started.map(|_| 0),
			},
			elapsed: started.map(|_| Duration::ZERO),
		}
	}

	#[test]
	fn character_in_match() {
		let content = layout(DisplayOptions::default()).content(&command(Some("Galatea"), Some(1_700_000_000)));
		assert_eq!(
			content,
			ActivityContent {
				details: "Playing as Galatea".into(),
				state: "In Match".into(),
				large_image: "galatea_icon".into(),
				large_text: "Galatea".into(),
				small: Some(("strinova_logo".into(), "Strinova".into())),
				start: Some(1_700_000_000),
			}
		);
	}

	#[test]
	fn unknown_icon_falls_back_to_logo() {
		let content = layout(DisplayOptions::default()).content(&command(Some("Michele"), None));
		assert_eq!(content.details, "Playing as Michele");
		assert_eq!(content.large_image, "strinova_logo");
		assert_eq!(content.state, "In Menu");
		assert_eq!(content.start, None);
	}

	#[test]
	fn menu_without_character() {
		let content = layout(DisplayOptions::default()).content(&command(None, None));
		assert_eq!(content.details, "In Game");
		assert_eq!(content.large_image, "strinova_logo");
		assert_eq!(content.small, None);
	}

	#[test]
	fn display_options_hide_character_and_timer() {
		let display = DisplayOptions {
			show_character: false,
			show_timer: false,
		};
		let content = layout(display).content(&command(Some("Galatea"), Some(5)));
		assert_eq!(content.details, "In Game");
		assert_eq!(content.state, "In Menu");
		assert_eq!(content.start, None);
	}

	#[test]
	fn connection_attempts_are_spaced_out() {
		let mut presence = DiscordPresence::new(
			&DiscordConfig::default(),
			Duration::from_secs(60),
			layout(DisplayOptions::default()),
		);
		presence.next_attempt = Some(Instant::now() + Duration::from_secs(30));
		let err = presence.publish(&command(None, None)).unwrap_err();
		assert!(matches!(err, Error::Disconnected(_)));
	}
}
