use std::fs::File;
use std::io::Read;
use std::path::Path;

use log::debug;

use crate::error::{PipelineError, Result};
use crate::value::Value;

/// One named column of a dataset
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

/// An in-memory table: ordered named columns of equal length
///
/// Column names are not required to be unique. Lookups by name always
/// resolve to the first column carrying that name.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Dataset {
    columns: Vec<Column>,
    rows: usize,
}

impl Dataset {
    /// Build a dataset from `(name, values)` pairs
    ///
    /// # Errors
    /// * `InvalidUpload` if the columns differ in length
    pub fn from_columns<S: Into<String>>(columns: Vec<(S, Vec<Value>)>) -> Result<Self> {
        let columns: Vec<Column> = columns
            .into_iter()
            .map(|(name, values)| Column {
                name: name.into(),
                values,
            })
            .collect();

        let rows = columns.first().map(|c| c.values.len()).unwrap_or(0);
        if let Some(bad) = columns.iter().find(|c| c.values.len() != rows) {
            return Err(PipelineError::InvalidUpload(format!(
                "Column '{}' has {} values but expected {}",
                bad.name,
                bad.values.len(),
                rows
            )));
        }

        Ok(Dataset { columns, rows })
    }

    /// Parse CSV text with a header row
    ///
    /// Every field is classified with [`Value::parse`]. Ragged rows are
    /// rejected by the CSV reader.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::Reader::from_reader(reader);
        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

        if headers.is_empty() {
            return Err(PipelineError::InvalidUpload(
                "CSV file has no header row".to_string(),
            ));
        }

        let mut values: Vec<Vec<Value>> = vec![Vec::new(); headers.len()];
        for record in reader.records() {
            let record = record?;
            for (col, field) in record.iter().enumerate() {
                values[col].push(Value::parse(field));
            }
        }

        Dataset::from_columns(headers.into_iter().zip(values).collect())
    }

    /// Read a CSV file from disk
    ///
    /// # Errors
    /// * `MissingFile` if the file does not exist
    /// * `Csv` if the content cannot be parsed
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PipelineError::MissingFile(
                "CSV files not found. Please upload them again.".to_string(),
            ),
            _ => PipelineError::Io(e),
        })?;

        let dataset = Dataset::from_csv_reader(file)?;
        debug!(
            "loaded {} ({} rows x {} columns)",
            path.display(),
            dataset.len(),
            dataset.columns.len()
        );
        Ok(dataset)
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column names in order, duplicates included
    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// First column with the given name
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Values of a named column, or `UnknownColumn`
    pub fn values(&self, name: &str) -> Result<&[Value]> {
        self.column(name)
            .map(|c| c.values.as_slice())
            .ok_or_else(|| PipelineError::UnknownColumn(name.to_string()))
    }

    /// New dataset holding only the given rows, in the given order
    ///
    /// Indices may repeat; every index must be below `len()`.
    pub fn take_rows(&self, indices: &[usize]) -> Dataset {
        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                values: indices.iter().map(|&i| c.values[i].clone()).collect(),
            })
            .collect();

        Dataset {
            columns,
            rows: indices.len(),
        }
    }

    /// Append columns side by side; both datasets must have equal length
    pub(crate) fn hstack(mut self, other: Dataset) -> Dataset {
        debug_assert_eq!(self.rows, other.rows);
        self.columns.extend(other.columns);
        self
    }

    /// Keep only the columns for which `keep` returns true
    pub(crate) fn retain_columns<F: Fn(&Column) -> bool>(mut self, keep: F) -> Dataset {
        self.columns.retain(|c| keep(c));
        self
    }
}

/// Load the dataset stored at a session-recorded path
///
/// # Errors
/// * `MissingFile` if no path was recorded or the file is gone
pub fn load_dataset(path: Option<&str>) -> Result<Dataset> {
    match path {
        Some(p) if !p.is_empty() => Dataset::from_csv_path(p),
        _ => Err(PipelineError::MissingFile(
            "Feature or Target CSV file not uploaded.".to_string(),
        )),
    }
}
