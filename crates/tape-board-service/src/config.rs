// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Host preferences for the board hub (socket path, seed cards), stored as
//! JSON under the platform config directory.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tape_board::CardFields;
use tape_board_proto::default_socket_path;
use thiserror::Error;

/// Failure while loading or persisting preferences.
#[derive(Debug, Error)]
pub enum PrefsError {
    /// Platform config dir could not be resolved.
    #[error("could not resolve config dir")]
    NoConfigDir,
    /// I/O error while reading or writing the prefs file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Prefs document failed to (de)serialize.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Host preferences loaded at boot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostPrefs {
    /// Unix socket path the hub listens on.
    pub socket_path: String,
    /// Cards created at boot, in collection order. The board is ephemeral,
    /// so these are re-created on every restart.
    pub seed: Vec<CardFields>,
}

impl Default for HostPrefs {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path().display().to_string(),
            seed: default_seed(),
        }
    }
}

/// The five cards the hub starts with when no prefs exist.
fn default_seed() -> Vec<CardFields> {
    let card = |price: &str, style: &str, prev: &str, instrument: &str| CardFields {
        price: price.to_string(),
        style: style.to_string(),
        prev_price: prev.to_string(),
        signal: "Neutral".to_string(),
        trade_buy: "0".to_string(),
        trade_sell: "0".to_string(),
        instrument: instrument.to_string(),
    };
    vec![
        card("1500.13 ▲", "h2", "1500.12", "XAU/USD"),
        card("1500.14 ▲", "h2", "1500.12", "GBP/USD"),
        card("1500.15 ▼", "h1", "1501.12", "EUR/USD"),
        card("1500.15 ▼", "h1", "1501.12", "OIL CR"),
        card("1500.15 ▼", "h1", "1501.12", "OIL BR"),
    ]
}

/// Stores prefs as JSON files under the platform config directory
/// (e.g., `~/.config/Tape`).
pub struct PrefsStore {
    base: PathBuf,
}

impl PrefsStore {
    /// Create a store rooted at the user config directory.
    pub fn open() -> Result<Self, PrefsError> {
        let proj = ProjectDirs::from("dev", "flyingrobots", "Tape").ok_or(PrefsError::NoConfigDir)?;
        let base = proj.config_dir().to_path_buf();
        fs::create_dir_all(&base)?;
        Ok(Self { base })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base.join(format!("{key}.json"))
    }

    /// Load prefs for `key`. Returns `Ok(None)` when the file is missing.
    pub fn load(&self, key: &str) -> Result<Option<HostPrefs>, PrefsError> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(PrefsError::Io(err)),
        }
    }

    /// Serialize and persist prefs for `key`.
    pub fn save(&self, key: &str, prefs: &HostPrefs) -> Result<(), PrefsError> {
        let data = serde_json::to_vec_pretty(prefs)?;
        fs::write(self.path_for(key), data)?;
        Ok(())
    }
}
