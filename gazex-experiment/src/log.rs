//! Append-only trial data log and its export shapes.

use crate::error::{ExperimentError, ExperimentResult};
use chrono::{DateTime, Utc};
use gazex_core::TrialRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialDataLog {
    participant_id: u32,
    records: Vec<TrialRecord>,
    finalized: bool,
}

/// Document handed to the persistence endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistencePayload {
    pub participant_id: u32,
    pub trial_data: Vec<TrialRecord>,
    pub timestamp: DateTime<Utc>,
    pub total_trials: usize,
}

/// Row/column view of the log
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TrialDataLog {
    pub fn new(participant_id: u32) -> Self {
        Self {
            participant_id,
            records: Vec::new(),
            finalized: false,
        }
    }

    pub fn participant_id(&self) -> u32 {
        self.participant_id
    }

    pub fn append(&mut self, record: TrialRecord) -> ExperimentResult<()> {
        if self.finalized {
            return Err(ExperimentError::LogFinalized);
        }
        self.records.push(record);
        Ok(())
    }

    /// Seal the log; later appends fail with `LogFinalized`.
    pub fn finalize(&mut self) {
        self.finalized = true;
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn records(&self) -> &[TrialRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Columns follow the key order of the first record. Nested values
    /// (gaze samples, asset lists) are written as JSON text.
    pub fn to_table(&self) -> ExperimentResult<Table> {
        let mut objects = Vec::with_capacity(self.records.len());
        for record in &self.records {
            match serde_json::to_value(record)? {
                Value::Object(map) => objects.push(map),
                other => {
                    return Err(ExperimentError::Serialization(serde::ser::Error::custom(format!(
                        "trial record serialized as `{other}` instead of an object"
                    ))));
                }
            }
        }

        let Some(first) = objects.first() else {
            return Ok(Table::default());
        };
        let columns: Vec<String> = first.keys().cloned().collect();
        let rows = objects
            .iter()
            .map(|object| {
                columns
                    .iter()
                    .map(|column| object.get(column).map(cell_text).unwrap_or_default())
                    .collect()
            })
            .collect();

        Ok(Table { columns, rows })
    }

    pub fn to_csv(&self) -> ExperimentResult<String> {
        let table = self.to_table()?;
        if table.columns.is_empty() {
            return Ok(String::new());
        }

        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.write_record(&table.columns)?;
        for row in &table.rows {
            wtr.write_record(row)?;
        }
        let bytes = wtr.into_inner().map_err(|err| ExperimentError::Io(err.into_error()))?;
        String::from_utf8(bytes).map_err(|err| ExperimentError::Io(io::Error::new(io::ErrorKind::InvalidData, err)))
    }

    pub fn persistence_payload(&self, timestamp: DateTime<Utc>) -> PersistencePayload {
        PersistencePayload {
            participant_id: self.participant_id,
            trial_data: self.records.clone(),
            timestamp,
            total_trials: self.records.len(),
        }
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
