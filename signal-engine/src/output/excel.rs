//! Excel dashboard with a signal sheet and a summary sheet

use std::path::Path;

use chrono::{SecondsFormat, Utc};
use rust_xlsxwriter::{Color, Format, Workbook, Worksheet};
use shared::{Signal, SignalType};

use crate::Result;

pub const SIGNALS_SHEET: &str = "Trading Signals";
pub const SUMMARY_SHEET: &str = "Summary";

pub const HEADERS: [&str; 9] = [
    "Timestamp",
    "Symbol",
    "Signal",
    "Entry Price",
    "Stop Loss",
    "Take Profit",
    "Confidence",
    "Timeframe",
    "Risk/Reward",
];

const HEADER_FILL: u32 = 0x4472C4;
const BUY_FILL: u32 = 0xC6EFCE;
const SELL_FILL: u32 = 0xFFC7CE;

/// Cell formats for one row colour
struct RowStyle {
    text: Format,
    price: Format,
    confidence: Format,
    ratio: Format,
}

impl RowStyle {
    fn new(fill: Option<u32>) -> Self {
        let base = match fill {
            Some(rgb) => Format::new().set_background_color(Color::RGB(rgb)),
            None => Format::new(),
        };
        Self {
            text: base.clone(),
            price: base.clone().set_num_format("0.00000"),
            confidence: base.clone().set_num_format("0.000"),
            ratio: base.set_num_format("0.00"),
        }
    }
}

fn write_signals(sheet: &mut Worksheet, signals: &[Signal]) -> Result<()> {
    sheet.set_name(SIGNALS_SHEET)?;

    let header = Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(HEADER_FILL));
    for (col, title) in HEADERS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, &header)?;
    }

    let buy = RowStyle::new(Some(BUY_FILL));
    let sell = RowStyle::new(Some(SELL_FILL));
    let plain = RowStyle::new(None);

    for (i, signal) in signals.iter().enumerate() {
        let row = i as u32 + 1;
        let style = match signal.signal_type {
            SignalType::Buy => &buy,
            SignalType::Sell => &sell,
            SignalType::Hold => &plain,
        };
        let timestamp = signal.timestamp.format("%Y-%m-%d %H:%M:%S").to_string();

        sheet.write_string_with_format(row, 0, timestamp, &style.text)?;
        sheet.write_string_with_format(row, 1, &signal.symbol, &style.text)?;
        sheet.write_string_with_format(row, 2, signal.signal_type.as_str(), &style.text)?;
        sheet.write_number_with_format(row, 3, signal.entry_price, &style.price)?;
        sheet.write_number_with_format(row, 4, signal.stop_loss, &style.price)?;
        sheet.write_number_with_format(row, 5, signal.take_profit, &style.price)?;
        sheet.write_number_with_format(row, 6, signal.confidence, &style.confidence)?;
        sheet.write_string_with_format(row, 7, signal.timeframe.as_str(), &style.text)?;
        sheet.write_number_with_format(row, 8, signal.risk_reward_ratio, &style.ratio)?;
    }

    sheet.set_column_width(0, 20)?;
    for col in 1..HEADERS.len() as u16 {
        sheet.set_column_width(col, 13)?;
    }
    sheet.set_freeze_panes(1, 0)?;
    Ok(())
}

fn write_summary(sheet: &mut Worksheet, signals: &[Signal]) -> Result<()> {
    sheet.set_name(SUMMARY_SHEET)?;

    let buys = signals.iter().filter(|s| s.signal_type == SignalType::Buy).count();
    let sells = signals.iter().filter(|s| s.signal_type == SignalType::Sell).count();
    let avg_confidence = if signals.is_empty() {
        0.0
    } else {
        signals.iter().map(|s| s.confidence).sum::<f64>() / signals.len() as f64
    };

    let bold = Format::new().set_bold();
    sheet.write_string_with_format(0, 0, "Metric", &bold)?;
    sheet.write_string_with_format(0, 1, "Value", &bold)?;
    sheet.write_string(1, 0, "Total Signals")?;
    sheet.write_number(1, 1, signals.len() as f64)?;
    sheet.write_string(2, 0, "BUY Signals")?;
    sheet.write_number(2, 1, buys as f64)?;
    sheet.write_string(3, 0, "SELL Signals")?;
    sheet.write_number(3, 1, sells as f64)?;
    sheet.write_string(4, 0, "Average Confidence")?;
    sheet.write_number_with_format(4, 1, avg_confidence, &Format::new().set_num_format("0.000"))?;
    sheet.write_string(5, 0, "Last Update")?;
    sheet.write_string(5, 1, Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true))?;

    sheet.set_column_width(0, 20)?;
    sheet.set_column_width(1, 24)?;
    Ok(())
}

/// Rewrite the whole workbook from `signals`
pub fn write_workbook<P: AsRef<Path>>(signals: &[Signal], path: P) -> Result<()> {
    let mut workbook = Workbook::new();
    write_signals(workbook.add_worksheet(), signals)?;
    write_summary(workbook.add_worksheet(), signals)?;
    workbook.save(path.as_ref())?;
    Ok(())
}
