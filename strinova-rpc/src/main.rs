//! Strinova Rich Presence.
//!
//! Reads the equipped weapon and the match banner off the screen and keeps a
//! Discord presence in sync with them.

mod assets;
mod capture;
mod config;
mod discord;
mod error;
mod poll;
mod presence;

use std::{path::PathBuf, process::ExitCode, time::SystemTime};

use clap::Parser;
use ie::RegionSpec;
use tracing_subscriber::EnvFilter;

use crate::{
	capture::ScreenSampler,
	config::Config,
	discord::{ActivityLayout, DiscordPresence},
	error::Error,
	poll::{PollLoop, Stop, TickRegions},
	presence::{MatchClassifier, PresenceDriver, PresenceState},
};

#[derive(Debug, Parser)]
#[command(version, about = "Discord Rich Presence for Strinova")]
struct Args {
	/// Config file [default: <config dir>/strinova-rpc/config.json]
	#[arg(long, env = "STRINOVA_RPC_CONFIG")]
	config: Option<PathBuf>,

	/// Run a single tick and exit
	#[arg(long)]
	once: bool,

	/// Print the effective config and exit
	#[arg(long)]
	print_config: bool,
}

type App = PollLoop<ScreenSampler, ie::Ie, DiscordPresence>;

fn init_logging() {
	let filter = EnvFilter::builder()
		.with_default_directive(tracing::Level::INFO.into())
		.from_env_lossy();

	if let Ok(path) = std::env::var("STRINOVA_RPC_LOG_PATH")
		&& let Ok(file) = std::fs::OpenOptions::new().create(true).append(true).open(&path)
	{
		tracing_subscriber::fmt()
			.with_env_filter(filter)
			.with_ansi(false)
			.with_writer(file)
			.init();
		return;
	}

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.init();
}

fn config_path(args: &Args) -> Result<PathBuf, Error> {
	match &args.config {
		Some(path) => Ok(path.clone()),
		None => Ok(Config::default_path()?),
	}
}

/// Load everything the loop needs. Any failure here is fatal.
fn startup(cfg: &Config, cfg_path: &std::path::Path) -> Result<App, Error> {
	let models = assets::resolve_ocr_assets(cfg, cfg_path)?;
	let ie = ie::Ie::try_new(&models.detection, &models.recognition, &models.charset)?;
	tracing::info!("OCR engine ready");

	let files = assets::resolve_roster(cfg, cfg_path)?;
	let roster = data::Roster::load(&files.weapon_map, &files.icon_map)?;
	tracing::info!(weapons = roster.weapons.len(), "roster loaded");

	let classifier = MatchClassifier::new(&cfg.match_.active_pattern, cfg.match_.end_hysteresis_ticks)?;
	let driver = PresenceDriver::new(roster.weapons, classifier, cfg.ocr.fuzzy_max_distance)
		.clear_character_on_menu(cfg.match_.clear_character_on_menu);

	let layout = ActivityLayout::new(roster.icons, cfg.display.clone(), &cfg.discord);
	let transport = DiscordPresence::new(&cfg.discord, cfg.reconnect_interval(), layout);

	let regions = TickRegions {
		weapon: RegionSpec::new("weapon_name", cfg.regions.weapon_name),
		match_info: RegionSpec::new("match_info", cfg.regions.match_info),
	};

	Ok(PollLoop::new(ScreenSampler::new(), ie, transport, driver, regions, cfg.poll_interval())
		.warn_after(cfg.failure_warn_ticks))
}

fn run(args: &Args) -> Result<(), Error> {
	let cfg_path = config_path(args)?;

	if args.print_config {
		let cfg = Config::read(&cfg_path)?;
		let json = serde_json::to_string_pretty(&cfg).map_err(anyhow::Error::from)?;
		println!("{json}");
		return Ok(());
	}

	tracing::info!(path = %cfg_path.display(), "loading config");
	let cfg = Config::load(&cfg_path)?;
	let mut app = startup(&cfg, &cfg_path)?;
	let mut state = PresenceState::new();

	if args.once {
		let report = app.tick(&mut state, SystemTime::now());
		tracing::info!(
			weapon = ?report.weapon_read,
			match_info = ?report.match_read,
			character = ?state.character().map(|c| c.as_str()),
			phase = %state.phase(),
			published = report.published,
			"single tick"
		);
		let (_, _, mut transport) = app.into_parts();
		discord::Transport::shutdown(&mut transport);
		return Ok(());
	}

	let stop = Stop::new();
	let handler = stop.clone();
	ctrlc::set_handler(move || handler.stop()).map_err(anyhow::Error::from)?;

	app.run(&mut state, &stop);
	Ok(())
}

fn main() -> ExitCode {
	init_logging();
	let args = Args::parse();

	match run(&args) {
		Ok(()) => ExitCode::SUCCESS,
		Err(err) => {
			tracing::error!("{err}");
			ExitCode::FAILURE
		}
	}
}
