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

//! Discovers the sound card topology from the kernel's text tables.

use std::{
    fmt,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info, warn};

use super::error::AudioError;
use super::format::HardwareFormat;
use super::Direction;

pub const CARDS_TABLE: &str = "/proc/asound/cards";
pub const DEVICES_TABLE: &str = "/proc/asound/devices";

const PLAYBACK_KIND: &str = "digital audio playback";
const CAPTURE_KIND: &str = "digital audio capture";

lazy_static! {
    // " 0 [Headphones     ]: bcm2835_headpho - bcm2835 Headphones"
    static ref CARD_HEADER: Regex = Regex::new(
        r"^\s*(?<index>\d+)\s+\[(?<id>[^\]]*?)\s*\]:\s+(?<driver>\S+)\s+-\s+(?<name>.+)$"
    )
    .unwrap();
    // "                      bcm2835 Headphones"
    static ref CARD_CONTINUATION: Regex = Regex::new(r"^\s+(?<description>\S.*?)\s*$").unwrap();
    // "  2: [ 0- 0]: digital audio playback"
    static ref DEVICE_LINE: Regex = Regex::new(
        r"^\s*\d+:\s+\[\s*(?<card>\d+)-\s*(?<device>\d+)\]:\s+(?<kind>.+?)\s*$"
    )
    .unwrap();
    // "  3: [ 0]   : control" or " 33:        : timer"
    static ref OTHER_DEVICE_LINE: Regex = Regex::new(
        r"^\s*\d+:\s+(?:\[\s*\d+\]\s*)?:\s+(?<kind>.+?)\s*$"
    )
    .unwrap();
}

/// A playback or capture sub-device on a sound card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub card: u32,
    pub device: u32,
    pub direction: Direction,
    /// The kernel driver name of the card.
    pub driver: String,
    pub description: String,
    /// The negotiated streaming format. None until negotiation has run.
    pub format: Option<HardwareFormat>,
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hw:{},{} ({}) {} - {}",
            self.card, self.device, self.direction, self.driver, self.description
        )?;
        if let Some(format) = &self.format {
            write!(f, " [{}]", format)?;
        }
        Ok(())
    }
}

/// A card entry from the cards table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    pub index: u32,
    pub id: String,
    pub driver: String,
    pub description: String,
}

/// Scans both tables from the locations the kernel exposes them at.
pub fn scan_files(cards: &Path, devices: &Path) -> Result<Vec<DeviceDescriptor>, AudioError> {
    let cards_table = File::open(cards).map_err(|e| {
        warn!(path = ?cards, err = %e, "Failed to open cards table");
        e
    })?;
    let devices_table = File::open(devices).map_err(|e| {
        warn!(path = ?devices, err = %e, "Failed to open devices table");
        e
    })?;
    scan(BufReader::new(cards_table), BufReader::new(devices_table))
}

/// Builds one descriptor per playback or capture sub-device listed in the
/// devices table that belongs to a card in the cards table.
pub fn scan<C: BufRead, D: BufRead>(
    cards: C,
    devices: D,
) -> Result<Vec<DeviceDescriptor>, AudioError> {
    let cards = parse_cards(cards)?;
    if cards.is_empty() {
        return Err(AudioError::EmptyTopology("no sound cards found".to_string()));
    }

    let descriptors = parse_devices(devices, &cards)?;
    if descriptors.is_empty() {
        return Err(AudioError::EmptyTopology(format!(
            "no playback or capture devices found on {} card(s)",
            cards.len()
        )));
    }

    info!(
        cards = cards.len(),
        devices = descriptors.len(),
        "Scanned sound topology"
    );
    Ok(descriptors)
}

/// Parses the cards table. A card is only kept once its continuation line has
/// been seen.
pub fn parse_cards<R: BufRead>(reader: R) -> Result<Vec<Card>, AudioError> {
    let mut cards = Vec::new();
    let mut pending: Option<Card> = None;

    for line in reader.lines() {
        let line = line?;

        if let Some(captures) = CARD_HEADER.captures(&line) {
            let Ok(index) = captures["index"].parse::<u32>() else {
                warn!(line, "Unparseable card index");
                continue;
            };
            if let Some(dropped) = pending.take() {
                debug!(card = dropped.index, "Card header has no description, skipping");
            }
            pending = Some(Card {
                index,
                id: captures["id"].to_string(),
                driver: captures["driver"].to_string(),
                description: captures["name"].trim().to_string(),
            });
        } else if let Some(captures) = CARD_CONTINUATION.captures(&line) {
            if let Some(mut card) = pending.take() {
                card.description = captures["description"].to_string();
                cards.push(card);
            }
        }
    }

    if let Some(dropped) = pending {
        debug!(card = dropped.index, "Card header has no description, skipping");
    }

    Ok(cards)
}

/// Parses the devices table against already discovered cards. Lines for
/// unknown cards or other device kinds are skipped.
pub fn parse_devices<R: BufRead>(
    reader: R,
    cards: &[Card],
) -> Result<Vec<DeviceDescriptor>, AudioError> {
    let mut descriptors = Vec::new();

    for line in reader.lines() {
        let line = line?;
        let Some(captures) = DEVICE_LINE.captures(&line) else {
            match other_kind(&line) {
                Some(kind) => debug!(kind, "Ignoring device kind"),
                None if !line.trim().is_empty() => debug!(line, "Unrecognized device line"),
                None => {}
            }
            continue;
        };
        let (Ok(card_index), Ok(device)) = (
            captures["card"].parse::<usize>(),
            captures["device"].parse::<u32>(),
        ) else {
            warn!(line, "Unparseable device line");
            continue;
        };

        let direction = match &captures["kind"] {
            PLAYBACK_KIND => Direction::Playback,
            CAPTURE_KIND => Direction::Capture,
            kind => {
                debug!(card = card_index, device, kind, "Ignoring device kind");
                continue;
            }
        };

        let Some(card) = cards.get(card_index) else {
            warn!(card = card_index, device, "Device refers to an unknown card");
            continue;
        };
        if card.index as usize != card_index {
            warn!(
                expected = card.index,
                got = card_index,
                "Card index mismatch, skipping device"
            );
            continue;
        }

        descriptors.push(DeviceDescriptor {
            card: card.index,
            device,
            direction,
            driver: card.driver.clone(),
            description: card.description.clone(),
            format: None,
        });
    }

    Ok(descriptors)
}

/// The kind of a devices table line that isn't tied to a sub-device, such as
/// a card's control or the global timer.
fn other_kind(line: &str) -> Option<&str> {
    OTHER_DEVICE_LINE
        .captures(line)
        .and_then(|captures| captures.name("kind"))
        .map(|kind| kind.as_str())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    const CARDS: &str = " 0 [Headphones     ]: bcm2835_headpho - bcm2835 Headphones
                      bcm2835 Headphones
 1 [vc4hdmi0       ]: vc4-hdmi - vc4-hdmi-0
                      vc4-hdmi-0
 2 [vc4hdmi1       ]: vc4-hdmi - vc4-hdmi-1
                      vc4-hdmi-1
 3 [A4             ]: USB-Audio - AIR 192 4
                      M-Audio AIR 192 4 at usb-0000:01:00.0-1.2, high speed
";

    const DEVICES: &str = "  2: [ 0- 0]: digital audio playback
  3: [ 0]   : control
  4: [ 1- 0]: digital audio playback
  5: [ 1]   : control
  6: [ 2- 0]: digital audio playback
  7: [ 2]   : control
  8: [ 3- 0]: digital audio playback
  9: [ 3- 0]: digital audio capture
 10: [ 3]   : control
 33:        : timer
";

    #[test]
    fn test_parse_cards() {
        let cards = parse_cards(Cursor::new(CARDS)).unwrap();
        assert_eq!(cards.len(), 4);
        assert_eq!(cards[0].index, 0);
        assert_eq!(cards[0].id, "Headphones");
        assert_eq!(cards[0].driver, "bcm2835_headpho");
        assert_eq!(cards[0].description, "bcm2835 Headphones");
        assert_eq!(cards[3].driver, "USB-Audio");
        assert_eq!(
            cards[3].description,
            "M-Audio AIR 192 4 at usb-0000:01:00.0-1.2, high speed"
        );
    }

    #[test]
    fn test_header_without_continuation_is_dropped() {
        let cards = " 0 [Headphones     ]: bcm2835_headpho - bcm2835 Headphones
 1 [vc4hdmi0       ]: vc4-hdmi - vc4-hdmi-0
                      vc4-hdmi-0
 2 [vc4hdmi1       ]: vc4-hdmi - vc4-hdmi-1
";
        let cards = parse_cards(Cursor::new(cards)).unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].index, 1);
        assert_eq!(cards[0].description, "vc4-hdmi-0");
    }

    #[test]
    fn test_scan_full_topology() {
        let descriptors = scan(Cursor::new(CARDS), Cursor::new(DEVICES)).unwrap();
        assert_eq!(descriptors.len(), 5);

        let usb: Vec<&DeviceDescriptor> = descriptors.iter().filter(|d| d.card == 3).collect();
        assert_eq!(usb.len(), 2);
        assert_eq!(usb[0].direction, Direction::Playback);
        assert_eq!(usb[1].direction, Direction::Capture);
        assert_eq!(usb[1].driver, "USB-Audio");
        assert!(descriptors.iter().all(|d| d.format.is_none()));
    }

    #[test]
    fn test_scan_two_cards_with_directions() {
        let cards = " 0 [Headphones     ]: bcm2835_headpho - bcm2835 Headphones
                      bcm2835 Headphones
 1 [A4             ]: USB-Audio - AIR 192 4
                      M-Audio AIR 192 4
";
        let devices = "  2: [ 0- 0]: digital audio playback
  3: [ 0]   : control
  9: [ 1- 0]: digital audio capture
";
        let descriptors = scan(Cursor::new(cards), Cursor::new(devices)).unwrap();
        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[0].card, 0);
        assert_eq!(descriptors[0].device, 0);
        assert_eq!(descriptors[0].direction, Direction::Playback);
        assert_eq!(descriptors[0].description, "bcm2835 Headphones");
        assert_eq!(descriptors[1].card, 1);
        assert_eq!(descriptors[1].direction, Direction::Capture);
        assert_eq!(descriptors[1].description, "M-Audio AIR 192 4");
    }

    #[test]
    fn test_unknown_cards_and_kinds_are_skipped() {
        let cards = " 0 [Headphones     ]: bcm2835_headpho - bcm2835 Headphones
                      bcm2835 Headphones
";
        let devices = "  2: [ 0- 0]: digital audio playback
  3: [ 0- 1]: hardware dependent
  4: [ 7- 0]: digital audio playback
";
        let descriptors = scan(Cursor::new(cards), Cursor::new(devices)).unwrap();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].device, 0);
    }

    #[test]
    fn test_card_level_lines_are_recognized() {
        assert_eq!(other_kind("  3: [ 0]   : control"), Some("control"));
        assert_eq!(other_kind(" 33:        : timer"), Some("timer"));
        assert_eq!(other_kind("  2: [ 0- 0]: digital audio playback"), None);
        assert_eq!(other_kind("garbage"), None);

        // Control and timer lines never turn into descriptors.
        let cards = parse_cards(Cursor::new(CARDS)).unwrap();
        let descriptors = parse_devices(
            Cursor::new("  3: [ 0]   : control\n 33:        : timer\n"),
            &cards,
        )
        .unwrap();
        assert!(descriptors.is_empty());
    }

    #[test]
    fn test_mismatched_card_index_is_skipped() {
        // Card 0 never commits, so card 1 lands at position 0.
        let cards = " 0 [Headphones     ]: bcm2835_headpho - bcm2835 Headphones
 1 [A4             ]: USB-Audio - AIR 192 4
                      M-Audio AIR 192 4
";
        let devices = "  2: [ 0- 0]: digital audio playback
  4: [ 1- 0]: digital audio playback
";
        let result = scan(Cursor::new(cards), Cursor::new(devices));
        assert!(matches!(result, Err(AudioError::EmptyTopology(_))));
    }

    #[test]
    fn test_empty_tables() {
        let result = scan(Cursor::new(""), Cursor::new(DEVICES));
        assert!(matches!(result, Err(AudioError::EmptyTopology(_))));

        let result = scan(Cursor::new(CARDS), Cursor::new("  3: [ 0]   : control\n"));
        assert!(matches!(result, Err(AudioError::EmptyTopology(_))));
    }

    #[test]
    fn test_scan_files() {
        let dir = tempfile::tempdir().unwrap();
        let cards = dir.path().join("cards");
        let devices = dir.path().join("devices");
        std::fs::write(&cards, CARDS).unwrap();
        std::fs::write(&devices, DEVICES).unwrap();

        assert_eq!(scan_files(&cards, &devices).unwrap().len(), 5);
        assert!(matches!(
            scan_files(&dir.path().join("missing"), &devices),
            Err(AudioError::Io(_))
        ));
    }

    #[test]
    fn test_descriptor_display() {
        let descriptor = DeviceDescriptor {
            card: 1,
            device: 0,
            direction: Direction::Playback,
            driver: "vc4-hdmi".to_string(),
            description: "vc4-hdmi-0".to_string(),
            format: Some(HardwareFormat::default()),
        };
        assert_eq!(
            descriptor.to_string(),
            "hw:1,0 (Playback) vc4-hdmi - vc4-hdmi-0 [44100Hz 2ch s16le (period 1024x2)]"
        );
    }
}
