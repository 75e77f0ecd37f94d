use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::errors::ErrorKind;

#[derive(Error, Debug)]
pub enum Error {
    #[error("JSON parsing failed. ({0})")]
    Parse(String),
    #[error("invalid response format")]
    Format,
    #[error("malformed flag record ({0})")]
    Record(String),
}

/// The wire representation of a single feature flag state.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct FlagRecord {
    pub name: String,
    pub state: bool,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRequest<'a> {
    pub project_id: &'a str,
    pub toggle_id: &'a str,
}

#[derive(Deserialize, Debug)]
pub struct ValidationResponse {
    pub valid: bool,
}

/// Parses a bulk fetch response body. Elements that are not well-formed flag records are skipped.
pub fn records_from_json(json: &str) -> Result<Vec<FlagRecord>, Error> {
    let parsed = serde_json::from_str::<Value>(json).map_err(|err| Error::Parse(err.to_string()))?;
    let items = match parsed {
        Value::Array(items) => items,
        _ => return Err(Error::Format),
    };
    let mut records = Vec::with_capacity(items.len());
    for item in items {
        match record_from_value(item) {
            Ok(record) => records.push(record),
            Err(err) => {
                warn!(event_id = ErrorKind::Protocol.as_u16(); "Skipping flag record in bulk response. {err}")
            }
        }
    }
    Ok(records)
}

/// Parses a single live update payload.
pub fn record_from_json(json: &str) -> Result<FlagRecord, Error> {
    let parsed = serde_json::from_str::<Value>(json).map_err(|err| Error::Parse(err.to_string()))?;
    record_from_value(parsed)
}

fn record_from_value(value: Value) -> Result<FlagRecord, Error> {
    let record = serde_json::from_value::<FlagRecord>(value)
        .map_err(|err| Error::Record(err.to_string()))?;
    if record.name.is_empty() {
        return Err(Error::Record("empty flag name".to_owned()));
    }
    Ok(record)
}

pub fn validation_from_json(json: &str) -> Result<ValidationResponse, Error> {
    serde_json::from_str::<ValidationResponse>(json).map_err(|err| Error::Parse(err.to_string()))
}
