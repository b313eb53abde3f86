//! Dataset Module
//!
//! Turns a dataset reference into an in-memory table for the phase pipeline.
//! Storage and upload of datasets belong to the persistence layer; this
//! module only defines the seam and a directory-of-CSV-files resolver.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::DatasetError;

// == Table ==
/// A tabular dataset: a header row and string cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { columns, rows }
    }

    /// Parses CSV text whose first record is the header.
    ///
    /// Quoted fields may contain commas and newlines. Short rows are padded
    /// with empty cells; extra cells are dropped.
    pub fn from_csv(text: &str) -> Result<Self, DatasetError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let columns: Vec<String> = reader
            .headers()
            .map_err(|e| DatasetError::Io(e.to_string()))?
            .iter()
            .map(str::to_string)
            .collect();
        if columns.is_empty() {
            return Ok(Self::default());
        }

        let width = columns.len();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| DatasetError::Io(e.to_string()))?;
            let mut cells: Vec<String> = record.iter().map(str::to_string).collect();
            cells.resize(width, String::new());
            rows.push(cells);
        }

        Ok(Self { columns, rows })
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Iterates the cells of column `index`.
    pub fn column(&self, index: usize) -> impl Iterator<Item = &str> {
        self.rows
            .iter()
            .map(move |row| row.get(index).map(String::as_str).unwrap_or(""))
    }
}

// == Dataset Resolver ==
/// Resolves dataset references for the orchestrator.
#[async_trait]
pub trait DatasetResolver: Send + Sync {
    async fn resolve(&self, dataset_ref: &str) -> Result<Arc<Table>, DatasetError>;
}

// == CSV Directory Resolver ==
/// Reads `<dir>/<dataset_ref>.csv`.
#[derive(Debug, Clone)]
pub struct CsvDirectoryResolver {
    dir: PathBuf,
}

impl CsvDirectoryResolver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, dataset_ref: &str) -> Result<PathBuf, DatasetError> {
        if dataset_ref.contains(['/', '\\']) || dataset_ref.contains("..") {
            return Err(DatasetError::InvalidReference(dataset_ref.to_string()));
        }
        Ok(self.dir.join(format!("{}.csv", dataset_ref)))
    }
}

#[async_trait]
impl DatasetResolver for CsvDirectoryResolver {
    async fn resolve(&self, dataset_ref: &str) -> Result<Arc<Table>, DatasetError> {
        let path = self.path_for(dataset_ref)?;

        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(DatasetError::NotFound(dataset_ref.to_string()));
            }
            Err(err) => return Err(err.into()),
        };

        let table = tokio::task::spawn_blocking(move || Table::from_csv(&text))
            .await
            .map_err(|e| DatasetError::Io(e.to_string()))??;

        debug!(
            dataset_ref,
            rows = table.row_count(),
            columns = table.column_count(),
            "Dataset loaded"
        );
        Ok(Arc::new(table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_csv() {
        let table = Table::from_csv("a,b\n1,2\n3\n\n4,5,6\n").unwrap();

        assert_eq!(table.columns, vec!["a", "b"]);
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.rows[1], vec!["3", ""]);
        assert_eq!(table.rows[2], vec!["4", "5"]);
        assert_eq!(table.column(0).collect::<Vec<_>>(), vec!["1", "3", "4"]);
    }

    #[test]
    fn test_from_csv_quoted_fields() {
        let table = Table::from_csv("name,age\n\"Smith, J\",30\n\"Doe\nJr\",41\n").unwrap();

        assert_eq!(table.row_count(), 2);
        assert_eq!(table.rows[0], vec!["Smith, J", "30"]);
        assert_eq!(table.rows[1], vec!["Doe\nJr", "41"]);
        assert_eq!(table.column(1).collect::<Vec<_>>(), vec!["30", "41"]);
    }

    #[test]
    fn test_from_empty_csv() {
        let table = Table::from_csv("").unwrap();
        assert_eq!(table.column_count(), 0);
        assert_eq!(table.row_count(), 0);
    }

    #[tokio::test]
    async fn test_resolver_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ds-1.csv"), "x,y\n1,2\n").unwrap();

        let resolver = CsvDirectoryResolver::new(dir.path());
        let table = resolver.resolve("ds-1").await.unwrap();

        assert_eq!(table.columns, vec!["x", "y"]);
        assert_eq!(table.row_count(), 1);
    }

    #[tokio::test]
    async fn test_resolver_missing_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = CsvDirectoryResolver::new(dir.path());

        let result = resolver.resolve("absent").await;
        assert!(matches!(result, Err(DatasetError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_resolver_rejects_traversal() {
        let resolver = CsvDirectoryResolver::new("/tmp");

        let result = resolver.resolve("../etc/passwd").await;
        assert!(matches!(result, Err(DatasetError::InvalidReference(_))));
    }
}
