//! Track profiles
//!
//! A profile is what the articulation page shows for the selected track.
//! Only tracks whose name ends in the word `KS` (keyswitch) get
//! articulations; they are looked up in a `profiles.json` library by
//! case-insensitive substring of the track name. Every track gets a title.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info, warn};

/// One articulation key of a profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Articulation {
    #[serde(default)]
    pub name: String,
    /// Keyswitch note sent when the key is pressed; keys without one only show their name
    #[serde(default)]
    pub note: Option<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackProfile {
    pub title: String,
    #[serde(default)]
    pub articulations: Vec<Articulation>,
    /// Track colour as `#rrggbb`
    #[serde(default)]
    pub color: Option<String>,
}

impl TrackProfile {
    pub fn note_at(&self, index: usize) -> Option<u8> {
        self.articulations
            .get(index)
            .and_then(|articulation| articulation.note)
            .filter(|note| *note <= 127)
    }
}

/// Track name to profile lookup
pub trait TrackProfiles: Send {
    fn on_track_changed(&mut self, track_name: &str) -> TrackProfile;
}

/// Library entry as stored in `profiles.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProfileEntry {
    #[serde(default)]
    pub articulations: Vec<Articulation>,
}

/// Profiles keyed by a fragment of the track name
#[derive(Debug, Clone, Default)]
pub struct ProfileLibrary {
    entries: BTreeMap<String, ProfileEntry>,
}

impl ProfileLibrary {
    pub fn from_json(contents: &str) -> Result<Self> {
        let entries = serde_json::from_str(contents).context("Failed to parse profiles JSON")?;
        Ok(Self { entries })
    }

    /// Load the library; a missing or unreadable file leaves it empty
    pub async fn load_or_empty(path: &Path) -> Self {
        let contents = match fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) => {
                warn!("No profiles at {} ({}), articulation keys stay empty", path.display(), e);
                return Self::default();
            }
        };
        match Self::from_json(&contents) {
            Ok(library) => {
                info!("Loaded {} profiles from {}", library.len(), path.display());
                library
            }
            Err(e) => {
                warn!("Ignoring {}: {:#}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry whose key occurs in the track name; the longest key wins
    pub fn find(&self, track_name: &str) -> Option<(&str, &ProfileEntry)> {
        let name = track_name.to_lowercase();
        self.entries
            .iter()
            .filter(|(key, _)| !key.is_empty() && name.contains(&key.to_lowercase()))
            .max_by_key(|(key, _)| key.len())
            .map(|(key, entry)| (key.as_str(), entry))
    }
}

impl TrackProfiles for ProfileLibrary {
    fn on_track_changed(&mut self, track_name: &str) -> TrackProfile {
        let name = track_name.trim();
        let title = instrument_title(name);

        if strip_keyswitch_suffix(name).is_none() {
            debug!(track = %name, %title, "no KS suffix, clearing articulations");
            return TrackProfile {
                title,
                ..TrackProfile::default()
            };
        }

        let articulations = match self.find(name) {
            Some((key, entry)) => {
                debug!(track = %name, profile = %key, articulations = entry.articulations.len(), "profile matched");
                entry.articulations.clone()
            }
            None => {
                debug!(track = %name, "no profile matches");
                Vec::new()
            }
        };

        TrackProfile {
            title,
            articulations,
            color: None,
        }
    }
}

/// Name without a trailing standalone `KS` word, if it has one
fn strip_keyswitch_suffix(name: &str) -> Option<&str> {
    let name = name.trim_end();
    let split = name.len().checked_sub(2)?;
    let (head, tail) = (name.get(..split)?, name.get(split..)?);
    if !tail.eq_ignore_ascii_case("ks") {
        return None;
    }
    match head.chars().last() {
        Some(c) if c.is_alphanumeric() || c == '_' => None,
        _ => Some(head),
    }
}

/// Short instrument title for the page header
///
/// Drops the `KS` suffix, anything after a dash and parenthesised remarks.
pub fn instrument_title(track_name: &str) -> String {
    let name = track_name.trim();
    let mut title = strip_keyswitch_suffix(name).unwrap_or(name).to_string();

    if let Some(dash) = title.find('-') {
        title.truncate(dash);
    }
    while let Some(open) = title.find('(') {
        let Some(close) = title[open..].find(')') else {
            break;
        };
        title.replace_range(open..=open + close, " ");
    }

    title.split_whitespace().collect::<Vec<_>>().join(" ")
}
