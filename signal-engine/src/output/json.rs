//! JSON snapshot of the current signal list

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::Signal;

use crate::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSnapshot {
    pub signals: Vec<Signal>,
    pub total_count: usize,
    pub last_updated: DateTime<Utc>,
}

impl SignalSnapshot {
    pub fn new(signals: Vec<Signal>) -> Self {
        Self {
            total_count: signals.len(),
            signals,
            last_updated: Utc::now(),
        }
    }
}

pub fn write_snapshot<P: AsRef<Path>>(signals: &[Signal], path: P) -> Result<()> {
    let snapshot = SignalSnapshot::new(signals.to_vec());
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &snapshot)?;
    writer.flush()?;
    Ok(())
}

pub fn load_snapshot<P: AsRef<Path>>(path: P) -> Result<SignalSnapshot> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}
