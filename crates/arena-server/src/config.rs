//! Server configuration.
//!
//! Values come from three layers, later ones winning: built-in defaults, an
//! optional TOML file, then command-line flags (each of which can also be set
//! through an `ARENA_*` environment variable).
//!
//! ```toml
//! bind = "0.0.0.0:3000"
//! map = "maps/arena.json"
//! record = "logs/last-game.json"
//!
//! [tick]
//! tick_rate_hz = 60
//!
//! [rules]
//! respawn_delay = 3.0
//! seed = 1234
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use arena_engine::prelude::*;
use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::ServerError;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug, Default)]
#[command(name = "arena-server")]
#[command(about = "Authoritative server for the arena shooter")]
#[command(version)]
pub struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "ARENA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long, env = "ARENA_BIND")]
    pub bind: Option<SocketAddr>,

    /// Tile map file (JSON); the built-in arena when omitted
    #[arg(short, long, env = "ARENA_MAP")]
    pub map: Option<PathBuf>,

    /// Simulation rate (Hz)
    #[arg(long, env = "ARENA_TICK_RATE")]
    pub tick_rate: Option<u32>,

    /// Seed for the authority's random draws
    #[arg(long, env = "ARENA_SEED")]
    pub seed: Option<u64>,

    /// Write the action log here on shutdown
    #[arg(long, env = "ARENA_RECORD")]
    pub record: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Tile map file. `None` uses [`TileMap::default_arena`].
    pub map: Option<PathBuf>,
    /// Where to write the action log on shutdown. `None` disables recording.
    pub record: Option<PathBuf>,
    pub tick: TickConfig,
    pub rules: RulesConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            map: None,
            record: None,
            tick: TickConfig::default(),
            rules: RulesConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Parse a TOML document. Missing fields keep their defaults.
    pub fn from_toml(text: &str) -> Result<Self, ServerError> {
        toml::from_str(text).map_err(ServerError::Config)
    }

    /// Read a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ServerError> {
        let text = std::fs::read_to_string(path).map_err(|source| ServerError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Resolve the full configuration for a command line.
    pub fn load(args: &Args) -> Result<Self, ServerError> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_args(args);
        config.validate()?;
        Ok(config)
    }

    /// Override file values with whatever the command line set.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(bind) = args.bind {
            self.bind = bind;
        }
        if let Some(map) = &args.map {
            self.map = Some(map.clone());
        }
        if let Some(record) = &args.record {
            self.record = Some(record.clone());
        }
        if let Some(rate) = args.tick_rate {
            self.tick.tick_rate_hz = rate;
        }
        if let Some(seed) = args.seed {
            self.rules.seed = seed;
        }
    }

    pub fn validate(&self) -> Result<(), ServerError> {
        if self.tick.tick_rate_hz == 0 {
            return Err(ServerError::Invalid("tick rate must be positive".into()));
        }
        if self.tick.period().is_zero() {
            return Err(ServerError::Invalid(format!(
                "tick rate {} Hz is too high to schedule",
                self.tick.tick_rate_hz
            )));
        }
        Ok(())
    }

    /// The configured tile map, or the built-in arena.
    pub fn load_map(&self) -> Result<TileMap, ServerError> {
        let Some(path) = &self.map else {
            return Ok(TileMap::default_arena());
        };
        let text = std::fs::read_to_string(path).map_err(|source| ServerError::Read {
            path: path.clone(),
            source,
        })?;
        TileMap::from_json(&text).map_err(|source| ServerError::Map {
            path: path.clone(),
            source,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
