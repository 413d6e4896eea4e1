//! CSV data source for data-driven requests.
//!
//! The header row names the columns; every following row holds the values for
//! one iteration. Iteration `i` reads row `i % row_count`, so runs longer than
//! the file wrap around to the first row.
//!
//! The file is parsed once at construction and the rows are never mutated
//! afterwards, so concurrent iterations read them without locking.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, info};

use crate::errors::ConfigurationError;
use crate::template::ValueMapping;
use crate::value_provider::ValueProvider;

/// CSV-backed value provider.
///
/// # Example CSV File
/// ```csv
/// username,password,email
/// user1,pass123,user1@example.com
/// user2,pass456,user2@example.com
/// ```
///
/// # Example Usage
/// ```rust
/// use rust_reqgen::data_source::CsvDataSource;
/// use rust_reqgen::value_provider::ValueProvider;
///
/// let data = CsvDataSource::from_string("id\n1\n2").unwrap();
/// assert_eq!(data.get_values(2).get("id").unwrap(), "1");
/// ```
#[derive(Debug, Clone)]
pub struct CsvDataSource {
    /// Column headers from the CSV
    headers: Vec<String>,

    /// One mapping per data row
    rows: Vec<ValueMapping>,
}

impl CsvDataSource {
    /// Load a CSV file from the given path.
    ///
    /// # Errors
    /// Returns a [`ConfigurationError`] if the file cannot be read, has no
    /// header row, has no data rows, or has a row whose column count differs
    /// from the header's.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigurationError> {
        let path_ref = path.as_ref();
        info!(path = ?path_ref, "Loading CSV values file");

        let file_error = |source| ConfigurationError::FileRead {
            kind: "values",
            path: path_ref.to_path_buf(),
            source,
        };
        let file = File::open(path_ref).map_err(file_error)?;
        let data = Self::from_reader(file)?;

        info!(
            path = ?path_ref,
            rows = data.rows.len(),
            columns = data.headers.len(),
            "CSV values loaded successfully"
        );

        Ok(data)
    }

    /// Create a data source from raw CSV text.
    pub fn from_string(csv_content: &str) -> Result<Self, ConfigurationError> {
        Self::from_reader(csv_content.as_bytes())
    }

    fn from_reader<R: Read>(reader: R) -> Result<Self, ConfigurationError> {
        // Flexible so short/long rows reach our own check and get a row number.
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);

        let headers = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect::<Vec<_>>();

        if headers.iter().all(|h| h.is_empty()) {
            return Err(ConfigurationError::NoHeaders);
        }

        debug!(headers = ?headers, "CSV headers loaded");

        let mut rows = Vec::new();
        for (idx, result) in reader.records().enumerate() {
            let record = result?;
            if record.len() != headers.len() {
                return Err(ConfigurationError::InconsistentColumns {
                    // 1-based, counting the header line
                    row: idx + 2,
                    expected: headers.len(),
                    found: record.len(),
                });
            }

            let row = headers
                .iter()
                .zip(record.iter())
                .map(|(header, value)| (header.clone(), Value::String(value.to_string())))
                .collect::<ValueMapping>();
            rows.push(row);
        }

        if rows.is_empty() {
            return Err(ConfigurationError::EmptyData);
        }

        Ok(Self { headers, rows })
    }

    /// Get a specific row by index, without wrap-around.
    pub fn get_row(&self, index: usize) -> Option<&ValueMapping> {
        self.rows.get(index)
    }

    /// Get the total number of data rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Get the column headers.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }
}

impl ValueProvider for CsvDataSource {
    fn get_values(&self, iteration: usize) -> ValueMapping {
        // Construction guarantees at least one row.
        self.rows[iteration % self.rows.len()].clone()
    }
}
