//! Poll loop: capture, recognize, decide, publish, sleep.
//!
//! Ticks run one at a time on the calling thread. Stopping only takes effect
//! between ticks, so an in-flight tick always completes.

use std::{
	sync::{Arc, Condvar, Mutex, PoisonError},
	time::{Duration, Instant, SystemTime},
};

use ie::RegionSpec;

use crate::{
	capture::Sampler,
	discord::Transport,
	error::Error,
	presence::{PresenceDriver, PresenceState},
};

/// Text recognition of a captured region.
pub trait Recognizer {
	/// Normalized text, or `None` when nothing was read confidently.
	fn recognize(&self, image: ie::Image) -> Option<String>;
}

impl Recognizer for ie::Ie {
	fn recognize(&self, image: ie::Image) -> Option<String> {
		ie::Ie::recognize(self, image)
	}
}

/// Cooperative stop flag. Cloning shares the flag.
#[derive(Clone, Default)]
pub struct Stop {
	inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Stop {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn stop(&self) {
		let (lock, cv) = &*self.inner;
		*lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
		cv.notify_all();
	}

	/// Sleep until `deadline` or until stopped. Returns `true` if stopped.
	pub fn wait_until(&self, deadline: Instant) -> bool {
		let (lock, cv) = &*self.inner;
		let mut stopped = lock.lock().unwrap_or_else(PoisonError::into_inner);
		loop {
			if *stopped {
				return true;
			}
			let now = Instant::now();
			if deadline <= now {
				return false;
			}
			let (guard, _timeout) = cv
				.wait_timeout(stopped, deadline - now)
				.unwrap_or_else(PoisonError::into_inner);
			stopped = guard;
		}
	}
}

/// The two regions sampled every tick.
#[derive(Debug, Clone)]
pub struct TickRegions {
	pub weapon: RegionSpec,
	pub match_info: RegionSpec,
}

/// Change in capture health worth telling the user about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureAlert {
	/// This many ticks in a row failed to capture anything.
	Failing(u32),
	/// Capture works again after this many failed ticks.
	Recovered(u32),
}

/// What happened during one tick, for logging and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
	pub weapon_read: Option<String>,
	pub match_read: Option<String>,
	/// Both captures failed.
	pub failed: bool,
	pub alert: Option<CaptureAlert>,
	pub published: bool,
}

pub struct PollLoop<S, R, T> {
	sampler: S,
	recognizer: R,
	transport: T,
	driver: PresenceDriver,
	regions: TickRegions,
	interval: Duration,
	warn_after: u32,
	failed_ticks: u32,
}

impl<S: Sampler, R: Recognizer, T: Transport> PollLoop<S, R, T> {
	pub fn new(
		sampler: S,
		recognizer: R,
		transport: T,
		driver: PresenceDriver,
		regions: TickRegions,
		interval: Duration,
	) -> Self {
		Self {
			sampler,
			recognizer,
			transport,
			driver,
			regions,
			interval,
			warn_after: 3,
			failed_ticks: 0,
		}
	}

	/// Consecutive fully failed ticks before a warning.
	pub fn warn_after(mut self, ticks: u32) -> Self {
		self.warn_after = ticks.max(1);
		self
	}

	/// Run ticks every `interval` until `stop` is set, then shut the transport down.
	///
	/// A tick that overruns the interval delays the next one; missed ticks are
	/// not made up.
	pub fn run(&mut self, state: &mut PresenceState, stop: &Stop) {
		tracing::info!(interval_s = self.interval.as_secs_f32(), "monitoring; press Ctrl+C to stop");

		let mut next = Instant::now();
		while !stop.wait_until(next) {
			let started = Instant::now();
			self.tick(state, SystemTime::now());
			next = (started + self.interval).max(Instant::now());
		}

		tracing::info!("shutting down");
		self.transport.shutdown();
	}

	/// Run a single tick. Never fails; problems degrade the tick's reads.
	pub fn tick(&mut self, state: &mut PresenceState, now: SystemTime) -> TickReport {
		let weapon = self.read(RegionKind::Weapon);
		let match_info = self.read(RegionKind::MatchInfo);

		let failed = weapon.is_err() && match_info.is_err();
		let alert = self.track_failures(failed);
		match alert {
			Some(CaptureAlert::Failing(ticks)) => {
				tracing::warn!(ticks, "screen capture keeps failing; is the game running?")
			}
			Some(CaptureAlert::Recovered(ticks)) => tracing::info!(ticks, "screen capture recovered"),
			None => {}
		}

		let weapon_read = weapon.unwrap_or(None);
		let match_read = match_info.unwrap_or(None);
		tracing::debug!(weapon = ?weapon_read, match_info = ?match_read, "tick reads");
		if let Some(timer) = self.driver.classifier().read(match_read.as_deref()).timer {
			tracing::debug!(%timer, "round timer");
		}

		let mut published = false;
		if let Some(cmd) = self.driver.tick(weapon_read.as_deref(), match_read.as_deref(), now, state) {
			match self.transport.publish(&cmd) {
				Ok(()) => {
					state.acknowledge(cmd.snapshot);
					published = true;
				}
				Err(err @ Error::Disconnected(_)) => tracing::debug!(error = %err, "presence update deferred"),
				Err(err) => tracing::warn!(error = %err, "presence update failed; retrying next tick"),
			}
		}

		TickReport {
			weapon_read,
			match_read,
			failed,
			alert,
			published,
		}
	}

	/// Count fully failed ticks. Alerts once when the streak reaches
	/// `warn_after`, and once when a warned-about streak ends.
	fn track_failures(&mut self, failed: bool) -> Option<CaptureAlert> {
		if failed {
			self.failed_ticks += 1;
			(self.failed_ticks == self.warn_after).then_some(CaptureAlert::Failing(self.failed_ticks))
		} else {
			let streak = std::mem::take(&mut self.failed_ticks);
			(streak >= self.warn_after).then_some(CaptureAlert::Recovered(streak))
		}
	}

	fn read(&mut self, kind: RegionKind) -> Result<Option<String>, Error> {
		let region = match kind {
			RegionKind::Weapon => &self.regions.weapon,
			RegionKind::MatchInfo => &self.regions.match_info,
		};
		match self.sampler.capture(region) {
			Ok(image) => Ok(self.recognizer.recognize(image.as_image())),
			Err(err) => {
				tracing::debug!(error = %err, "capture failed");
				Err(err)
			}
		}
	}

	pub fn into_parts(self) -> (S, R, T) {
		(self.sampler, self.recognizer, self.transport)
	}
}

#[derive(Debug, Clone, Copy)]
enum RegionKind {
	Weapon,
	MatchInfo,
}

#[cfg(test)]
mod tests {
	use std::collections::{HashMap, VecDeque};
	use std::time::UNIX_EPOCH;

	use data::{CharacterId, WeaponMap};
	use ie::{Color, OwnedImage, Region};

	use super::*;
	use crate::presence::{MatchClassifier, PublishCommand};

	/// Texts the fake screen can show. A captured image's width is the
	/// index of its text plus one.
	const TEXTS: &[Option<&str>] = &[None, Some("| Artemis |"), Some("OBJECTIVE 1:45"), Some("objective")];

	fn text(index: usize) -> Result<usize, ()> {
		Ok(index)
	}

	/// Serves scripted screens per region; `Err` simulates a capture failure.
	#[derive(Default)]
	struct FakeScreen {
		script: HashMap<&'static str, VecDeque<Result<usize, ()>>>,
	}

	impl FakeScreen {
		fn with(mut self, region: &'static str, screens: &[Result<usize, ()>]) -> Self {
			self.script.insert(region, screens.iter().copied().collect());
			self
		}
	}

	impl Sampler for FakeScreen {
		fn capture(&mut self, region: &RegionSpec) -> Result<OwnedImage, Error> {
			let next = self
				.script
				.get_mut(region.name.as_str())
				.and_then(VecDeque::pop_front)
				.unwrap_or(Ok(0));
			match next {
				Ok(index) => Ok(OwnedImage::filled(index as u32 + 1, 1, Color::BLACK)),
				Err(()) => Err(Error::Capture {
					region: region.name.clone(),
					message: "no display".into(),
				}),
			}
		}
	}

	struct FakeOcr;

	impl Recognizer for FakeOcr {
		fn recognize(&self, image: ie::Image) -> Option<String> {
			TEXTS[image.width() as usize - 1].and_then(ie::text::normalize)
		}
	}

	#[derive(Default)]
	struct FakeTransport {
		sent: Vec<PublishCommand>,
		fail_next: usize,
		shut_down: bool,
	}

	impl Transport for FakeTransport {
		fn publish(&mut self, cmd: &PublishCommand) -> Result<(), Error> {
			if self.fail_next > 0 {
				self.fail_next -= 1;
				return Err(Error::Transport("pipe closed".into()));
			}
			self.sent.push(cmd.clone());
			Ok(())
		}

		fn shutdown(&mut self) {
			self.shut_down = true;
		}
	}

	fn poll_loop(screen: FakeScreen, transport: FakeTransport) -> PollLoop<FakeScreen, FakeOcr, FakeTransport> {
		let weapons = WeaponMap::new([("artemis", "Galatea")]).unwrap();
		let driver = PresenceDriver::new(weapons, MatchClassifier::new("objectiv", 3).unwrap(), 1);
		let regions = TickRegions {
			weapon: RegionSpec::new("weapon_name", Region::new(0.8, 0.88, 0.98, 0.94)),
			match_info: RegionSpec::new("match_info", Region::new(0.4, 0.0, 0.6, 0.08)),
		};
		PollLoop::new(screen, FakeOcr, transport, driver, regions, Duration::from_millis(10))
	}

	fn at(secs: u64) -> SystemTime {
		UNIX_EPOCH + Duration::from_secs(secs)
	}

	#[test]
	fn tick_reads_both_regions_and_publishes() {
		let screen = FakeScreen::default()
			.with("weapon_name", &[text(1)])
			.with("match_info", &[text(2)]);
		let mut poll = poll_loop(screen, FakeTransport::default());
		let mut state = PresenceState::new();

		let report = poll.tick(&mut state, at(0));
		assert_eq!(report.weapon_read.as_deref(), Some("artemis"));
		assert_eq!(report.match_read.as_deref(), Some("objective 1:45"));
		assert!(report.published);
		assert!(state.in_match());
		assert_eq!(state.character(), Some(&CharacterId::from("Galatea")));

		let (_, _, transport) = poll.into_parts();
		assert_eq!(transport.sent.len(), 1);
	}

	#[test]
	fn short_failure_streak_never_alerts() {
		let screen = FakeScreen::default()
			.with("weapon_name", &[Err(()), Err(())])
			.with("match_info", &[Err(()), Err(())]);
		let mut poll = poll_loop(screen, FakeTransport::default()).warn_after(3);
		let mut state = PresenceState::new();

		for i in 0..3 {
			assert_eq!(poll.tick(&mut state, at(i)).alert, None);
		}
	}

	#[test]
	fn failed_capture_degrades_only_that_field() {
		let screen = FakeScreen::default()
			.with("weapon_name", &[Err(())])
			.with("match_info", &[text(3)]);
		let mut poll = poll_loop(screen, FakeTransport::default());
		let mut state = PresenceState::new();

		let report = poll.tick(&mut state, at(0));
		assert_eq!(report.weapon_read, None);
		assert!(!report.failed);
		assert!(state.in_match());
	}

	#[test]
	fn repeated_full_failures_do_not_stop_ticking() {
		let fails = [Err(()), Err(()), Err(()), Err(())];
		let screen = FakeScreen::default()
			.with("weapon_name", &fails)
			.with("match_info", &fails);
		let mut poll = poll_loop(screen, FakeTransport::default()).warn_after(3);
		let mut state = PresenceState::new();

		let alerts: Vec<_> = (0..4)
			.map(|i| {
				let report = poll.tick(&mut state, at(i));
				assert!(report.failed);
				report.alert
			})
			.collect();
		assert_eq!(alerts, [None, None, Some(CaptureAlert::Failing(3)), None]);

		let report = poll.tick(&mut state, at(5));
		assert!(!report.failed);
		assert_eq!(report.alert, Some(CaptureAlert::Recovered(4)));
		assert_eq!(poll.tick(&mut state, at(6)).alert, None);
	}

	#[test]
	fn transport_failure_is_retried_next_tick() {
		let transport = FakeTransport {
			fail_next: 1,
			..Default::default()
		};
		let screen = FakeScreen::default().with("weapon_name", &[text(1), text(0), text(0)]);
		let mut poll = poll_loop(screen, transport);
		let mut state = PresenceState::new();

		assert!(!poll.tick(&mut state, at(0)).published);
		assert!(state.last_published().is_none());
		assert!(poll.tick(&mut state, at(2)).published);
		assert!(!poll.tick(&mut state, at(4)).published);

		let (_, _, transport) = poll.into_parts();
		assert_eq!(transport.sent.len(), 1);
		assert_eq!(transport.sent[0].snapshot.character, Some(CharacterId::from("Galatea")));
	}

	#[test]
	fn stop_ends_the_loop_and_shuts_down_transport() {
		let mut poll = poll_loop(FakeScreen::default(), FakeTransport::default());
		let mut state = PresenceState::new();
		let stop = Stop::new();
		stop.stop();

		poll.run(&mut state, &stop);
		let (_, _, transport) = poll.into_parts();
		assert!(transport.shut_down);
		assert!(transport.sent.is_empty());
	}

	#[test]
	fn stop_from_another_thread_wakes_the_sleeper() {
		let stop = Stop::new();
		let remote = stop.clone();
		let handle = std::thread::spawn(move || {
			std::thread::sleep(Duration::from_millis(20));
			remote.stop();
		});

		let started = Instant::now();
		assert!(stop.wait_until(Instant::now() + Duration::from_secs(30)));
		assert!(started.elapsed() < Duration::from_secs(10));
		assert!(stop.wait_until(Instant::now()));
		handle.join().unwrap();
	}

	#[test]
	fn wait_until_past_deadline_returns_immediately() {
		let stop = Stop::new();
		assert!(!stop.wait_until(Instant::now()));
	}
}
