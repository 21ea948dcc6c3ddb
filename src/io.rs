use anyhow::{Context, Result};
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::eval::validate_trades;
use crate::types::{Candle, Trade};

/// TradingView "Download chart data" row
#[derive(Debug, Deserialize)]
struct CandleRow {
    time: f64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: Option<f64>,
}

/// Open a CSV file, transparently decompressing `.zst`
fn open_csv(path: &Path) -> Result<csv::Reader<Box<dyn Read>>> {
    let file = File::open(path).with_context(|| format!("Failed to open file: {:?}", path))?;

    let reader: Box<dyn Read> = if path.extension().map_or(false, |ext| ext == "zst") {
        let decoder = zstd::stream::Decoder::new(file)
            .with_context(|| format!("Failed to create zstd decoder for: {:?}", path))?;
        Box::new(BufReader::new(decoder))
    } else {
        Box::new(BufReader::new(file))
    };

    Ok(csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader))
}

/// Load closed trades (`side,entry_ts,exit_ts,pnl`, unix seconds).
///
/// The file must already be a single-position stream ordered by exit.
pub fn load_trades_csv(path: &Path) -> Result<Vec<Trade>> {
    let mut reader = open_csv(path)?;
    let mut trades = Vec::new();
    for (i, row) in reader.deserialize().enumerate() {
        let trade: Trade = row.with_context(|| format!("Failed to parse trade row {}", i + 1))?;
        trades.push(trade);
    }

    validate_trades(&trades).with_context(|| format!("Invalid trade stream in {:?}", path))?;
    tracing::debug!("Loaded {} trades from {:?}", trades.len(), path);
    Ok(trades)
}

/// Load a candle series, sorted by timestamp
pub fn load_candles_csv(path: &Path) -> Result<Vec<Candle>> {
    let mut reader = open_csv(path)?;
    let mut candles = Vec::new();
    for (i, row) in reader.deserialize().enumerate() {
        let row: CandleRow = row.with_context(|| format!("Failed to parse candle row {}", i + 1))?;
        let ts = DateTime::from_timestamp(row.time as i64, 0)
            .with_context(|| format!("Timestamp out of range on row {}: {}", i + 1, row.time))?;
        candles.push(Candle {
            ts,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        });
    }

    candles.sort_by_key(|c| c.ts);
    tracing::debug!("Loaded {} candles from {:?}", candles.len(), path);
    Ok(candles)
}

/// Parse a comma-separated list of numbers (e.g. "250,250,-100")
pub fn parse_number_list(s: &str) -> Result<Vec<f64>> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<f64>().with_context(|| format!("Invalid number: {:?}", part)))
        .collect()
}

/// Pretty JSON to a file, or stdout when no path is given
pub fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))?;
            tracing::info!("Report written to {:?}", path);
        }
        None => println!("{}", json),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::types::Side;
    use std::io::Write;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("prop-eval-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_load_trades_csv() {
        let path = temp_path("trades.csv");
        std::fs::write(
            &path,
            "side,entry_ts,exit_ts,pnl\nlong,1741013000,1741013600,120\nshort,1741100000,1741100300,-42.5\n",
        )
        .unwrap();

        let trades = load_trades_csv(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].side, Side::Long);
        assert_eq!(trades[0].pnl, 120.0);
        assert_eq!(trades[1].exit_ts.timestamp(), 1_741_100_300);
    }

    #[test]
    fn test_load_trades_csv_rejects_unordered_file() {
        let path = temp_path("unordered.csv");
        std::fs::write(
            &path,
            "side,entry_ts,exit_ts,pnl\nshort,1741100000,1741100300,-42.5\nlong,1741013000,1741013600,120\n",
        )
        .unwrap();

        let err = load_trades_csv(&path).unwrap_err();
        std::fs::remove_file(&path).ok();

        assert_eq!(
            err.downcast_ref::<ValidationError>(),
            Some(&ValidationError::TradesOutOfOrder { index: 1 })
        );
    }

    #[test]
    fn test_load_candles_zst() {
        let path = temp_path("candles.csv.zst");
        let csv = "time,open,high,low,close,volume\n1741100400,1,2,0.5,1.5,\n1741100340,1,1,1,1,10\n";
        let compressed = zstd::encode_all(csv.as_bytes(), 3).unwrap();
        File::create(&path).unwrap().write_all(&compressed).unwrap();

        let candles = load_candles_csv(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].ts.timestamp(), 1_741_100_340);
        assert_eq!(candles[0].volume, Some(10.0));
        assert_eq!(candles[1].volume, None);
    }

    #[test]
    fn test_parse_number_list() {
        assert_eq!(parse_number_list("250, 250,-100").unwrap(), vec![250.0, 250.0, -100.0]);
        assert!(parse_number_list("250,abc").is_err());
        assert!(parse_number_list("").unwrap().is_empty());
    }
}
