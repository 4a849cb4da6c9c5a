//! Loading instruments from disk.
//!
//! - `.json`: an array of instruments, as serialised by [`Instrument`]
//! - `.csv`: one item per row, `instrument_id,instrument_name,text[,polarity][,language]`
//!
//! CSV rows are grouped by instrument id in order of first appearance.

use std::path::Path;

use crate::model::{Instrument, ItemInput};

#[derive(thiserror::Error, Debug)]
pub enum InputError {
    #[error("io error: {0:?}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("line {line}: {message}")]
    Row { line: u64, message: String },

    #[error("unsupported file extension {0:?}, expected .json or .csv")]
    UnsupportedFormat(String),
}

pub fn load_instruments(path: &Path) -> Result<Vec<Instrument>, InputError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let instruments = match extension.as_str() {
        "json" => serde_json::from_slice(&std::fs::read(path)?)?,
        "csv" => read_csv(csv::ReaderBuilder::new().flexible(true).from_path(path)?)?,
        _ => return Err(InputError::UnsupportedFormat(extension)),
    };

    log::debug!("loaded {} instruments from {}", instruments.len(), path.display());

    Ok(instruments)
}

fn read_csv<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<Vec<Instrument>, InputError> {
    let mut instruments: Vec<Instrument> = vec![];

    for record in reader.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let row_err = |message: String| InputError::Row { line, message };

        let id = record
            .get(0)
            .ok_or_else(|| row_err("missing instrument_id".to_string()))?
            .trim()
            .parse::<i64>()
            .map_err(|e| row_err(format!("invalid instrument_id: {e}")))?;
        let name = record
            .get(1)
            .ok_or_else(|| row_err("missing instrument_name".to_string()))?
            .to_string();
        let text = record
            .get(2)
            .ok_or_else(|| row_err("missing text".to_string()))?
            .to_string();
        let polarity = match record.get(3).map(str::trim) {
            None | Some("") => 1.0,
            Some(value) => value
                .parse::<f32>()
                .map_err(|e| row_err(format!("invalid polarity: {e}")))?,
        };
        let language = record
            .get(4)
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string);

        let position = match instruments.iter().position(|i| i.id == id) {
            Some(position) => position,
            None => {
                instruments.push(Instrument::new(id, name));
                instruments.len() - 1
            }
        };

        let instrument = &mut instruments[position];
        if instrument.language.is_none() {
            instrument.language = language;
        }
        instrument.items.push(ItemInput { text, polarity });
    }

    Ok(instruments)
}
