//! MetaTrader CSV files

use std::path::Path;

use chrono::SecondsFormat;
use ::csv::Writer;
use shared::Signal;

use crate::Result;

pub const MT4_HEADER: [&str; 7] = [
    "Symbol",
    "Signal",
    "Entry",
    "StopLoss",
    "TakeProfit",
    "Confidence",
    "Timeframe",
];

fn mt4_record(signal: &Signal) -> Vec<String> {
    vec![
        signal.symbol.clone(),
        signal.signal_type.as_str().to_string(),
        format!("{:.5}", signal.entry_price),
        format!("{:.5}", signal.stop_loss),
        format!("{:.5}", signal.take_profit),
        format!("{:.3}", signal.confidence),
        signal.timeframe.as_str().to_string(),
    ]
}

/// Write the MT4 file, header only when there are no signals
pub fn write_mt4<P: AsRef<Path>>(signals: &[Signal], path: P) -> Result<()> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record(MT4_HEADER)?;
    for signal in signals {
        writer.write_record(mt4_record(signal))?;
    }
    writer.flush()?;
    Ok(())
}

/// MT4 columns plus an ISO-8601 UTC timestamp
pub fn write_mt5<P: AsRef<Path>>(signals: &[Signal], path: P) -> Result<()> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record(MT4_HEADER.iter().chain(std::iter::once(&"Timestamp")))?;
    for signal in signals {
        let mut record = mt4_record(signal);
        record.push(signal.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true));
        writer.write_record(record)?;
    }
    writer.flush()?;
    Ok(())
}
