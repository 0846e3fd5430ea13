//! Raw frame logging.
//!
//! With `-l DIR` every chunk of bus traffic is appended to a file named
//! after the current unix second: `DIR/<ts>.to` for outbound bytes and
//! `DIR/<ts>.from` for inbound bytes. The files hold the raw wire bytes
//! for offline protocol analysis.

use crate::prelude::*;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    To,
    From,
}

impl Direction {
    fn suffix(&self) -> &'static str {
        match self {
            Direction::To => "to",
            Direction::From => "from",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatalogWriter {
    dir: PathBuf,
}

impl DatalogWriter {
    pub fn new(dir: &str) -> Result<Self> {
        info!("logging raw frames under {}", dir);
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: Path::new(dir).to_path_buf(),
        })
    }

    /// Appends `bytes` to the current second's file for `direction`.
    pub fn write(&self, direction: Direction, bytes: &[u8]) -> Result<()> {
        let ts = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
        let path = self.dir.join(format!("{}.{}", ts, direction.suffix()));

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(bytes)?;
        file.flush()?;

        Ok(())
    }
}
