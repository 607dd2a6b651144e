//! Ordered `(label, rmse)` results and their tab-separated output.

use crate::search::LambdaTrial;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to write report file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to encode report rows: {0}")]
    CsvError(#[from] csv::Error),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResultRow {
    pub label: String,
    pub rmse: f64,
}

/// Model comparison table. Rows stay in insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResultsTable {
    rows: Vec<ResultRow>,
}

impl ResultsTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, label: impl Into<String>, rmse: f64) {
        self.rows.push(ResultRow {
            label: label.into(),
            rmse,
        });
    }

    pub fn extend<I, S>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        for (label, rmse) in entries {
            self.push(label, rmse);
        }
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, label: &str) -> Option<f64> {
        self.rows
            .iter()
            .find(|row| row.label == label)
            .map(|row| row.rmse)
    }

    pub fn write_tsv(&self, path: &Path) -> Result<(), ReportError> {
        write_rows(path, &self.rows)
    }
}

impl fmt::Display for ResultsTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .rows
            .iter()
            .map(|row| row.label.chars().count())
            .max()
            .unwrap_or(0)
            .max("Model".len());
        writeln!(f, "{:<width$}  {:>10}", "Model", "RMSE")?;
        writeln!(f, "{}  {}", "-".repeat(width), "-".repeat(10))?;
        for row in &self.rows {
            writeln!(f, "{:<width$}  {:>10.5}", row.label, row.rmse)?;
        }
        Ok(())
    }
}

/// Builds a results table from ordered `(label, rmse)` entries.
pub fn report<I, S>(entries: I) -> ResultsTable
where
    I: IntoIterator<Item = (S, f64)>,
    S: Into<String>,
{
    let mut table = ResultsTable::new();
    table.extend(entries);
    table
}

/// Writes the shrinkage curve as `lambda\trmse` rows.
pub fn write_lambda_curve(path: &Path, trials: &[LambdaTrial]) -> Result<(), ReportError> {
    write_rows(path, trials)
}

fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), ReportError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
