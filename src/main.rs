// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{crate_version, Parser, Subcommand};
use tracing::info;

use rpisound::audio::{self, container, DeviceDescriptor, DeviceRegistry, Direction, Session};
use rpisound::config::{self, Player};
use rpisound::samples::SampleBank;
use rpisound::util::{bytes_display, duration_minutes_seconds, frames_duration};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "Streams PCM audio to a local sound card."
)]
struct Cli {
    /// The path to the player config.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the audio devices and their negotiated formats.
    Devices {},
    /// Plays an audio file through a playback device.
    Play {
        /// The audio file to play.
        path: PathBuf,
        /// The card to play through. Defaults to the first playback device.
        #[arg(long)]
        card: Option<u32>,
        /// The sub-device on the card.
        #[arg(long, default_value_t = 0)]
        device: u32,
    },
    /// Lists the samples in an instrument folder.
    Samples {
        /// The instrument folder under the samples root.
        instrument: String,
    },
    /// Plays a single sample through a playback device.
    PlaySample {
        /// The instrument folder under the samples root.
        instrument: String,
        /// The sample name.
        name: String,
        /// The card to play through. Defaults to the first playback device.
        #[arg(long)]
        card: Option<u32>,
        /// The sub-device on the card.
        #[arg(long, default_value_t = 0)]
        device: u32,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let player = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Devices {} => {
            let (_, registry) = discover(&player)?;
            println!("Devices:");
            for device in registry.devices() {
                println!("- {}", device);
            }
        }
        Commands::Play { path, card, device } => {
            let (driver, registry) = discover(&player)?;
            let descriptor = select(&registry, card, device)?;
            let blob = container::load_file(&path)?;

            let mut session = open_session(&player, driver, descriptor)?;
            println!(
                "Playing {} ({}, {}) on {}",
                path.display(),
                blob.format(),
                duration_minutes_seconds(frames_duration(blob.frames(), blob.format().sample_rate)),
                descriptor
            );
            let progress = session.play(&blob)?;
            info!(frames = progress.frames, writes = progress.writes, "Playback finished");
        }
        Commands::Samples { instrument } => {
            let bank = load_bank(&player, &instrument)?;
            if bank.is_empty() {
                println!("No samples found for {}.", instrument);
                return Ok(());
            }

            println!(
                "Samples (count: {}, memory: {}):",
                bank.len(),
                bytes_display(bank.total_memory())
            );
            for name in bank.names() {
                if let Some(sample) = bank.get(name) {
                    println!(
                        "- {}: {}Hz {}ch {}",
                        name,
                        sample.sample_rate,
                        sample.channels,
                        duration_minutes_seconds(frames_duration(
                            sample.frame_count,
                            sample.sample_rate
                        ))
                    );
                }
            }
        }
        Commands::PlaySample {
            instrument,
            name,
            card,
            device,
        } => {
            let bank = load_bank(&player, &instrument)?;
            let sample = bank
                .get(&name)
                .ok_or_else(|| format!("no sample named {} in {}", name, instrument))?;

            let (driver, registry) = discover(&player)?;
            let descriptor = select(&registry, card, device)?;
            let mut session = open_session(&player, driver, descriptor)?;
            println!("Playing sample {} on {}", name, descriptor);
            let progress = session.play_sample(&sample)?;
            info!(frames = progress.frames, writes = progress.writes, "Playback finished");
        }
    }

    Ok(())
}

fn discover(player: &Player) -> Result<(Arc<dyn audio::Driver>, DeviceRegistry), Box<dyn Error>> {
    let driver = audio::get_driver(player.driver());
    let registry = DeviceRegistry::from_tables(
        driver.as_ref(),
        player.audio().preferred_format()?,
        player.cards_table(),
        player.devices_table(),
    )?;
    Ok((driver, registry))
}

fn select(
    registry: &DeviceRegistry,
    card: Option<u32>,
    device: u32,
) -> Result<&DeviceDescriptor, Box<dyn Error>> {
    let descriptor = match card {
        Some(card) => registry.find(card, device, Direction::Playback),
        None => registry.playback().next(),
    };
    descriptor.ok_or_else(|| "no matching playback device found".into())
}

fn open_session(
    player: &Player,
    driver: Arc<dyn audio::Driver>,
    descriptor: &DeviceDescriptor,
) -> Result<Session, Box<dyn Error>> {
    let mut session = Session::new(driver).with_wait_timeout(player.audio().write_timeout()?);
    session.open(descriptor)?;
    Ok(session)
}

fn load_bank(player: &Player, instrument: &str) -> Result<SampleBank, Box<dyn Error>> {
    let mut bank = SampleBank::new(player.samples_root()).with_extension(player.sample_extension());
    bank.load(instrument)?;
    Ok(bank)
}
