//! Newline-delimited JSON file source.
//!
//! Each non-blank line is one record. The source is bounded: once the file is
//! exhausted `read` returns `Ok(None)`.

use super::traits::{EventSource, SourceBatch};
use super::SourceError;
use crate::execution::types::{current_time_millis, StreamRecord};
use async_trait::async_trait;
use log::{debug, warn};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};

pub struct JsonLinesFileSource {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    batch_size: usize,
    /// 1-based number of the last line read
    line_number: i64,
    exhausted: bool,
}

impl JsonLinesFileSource {
    pub async fn open<P: AsRef<Path>>(path: P, batch_size: usize) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).await.map_err(|e| SourceError::Io {
            path: path.clone(),
            source: e,
        })?;
        debug!("Opened file source {}", path.display());

        Ok(Self {
            path,
            lines: BufReader::new(file).lines(),
            batch_size: batch_size.max(1),
            line_number: 0,
            exhausted: false,
        })
    }
}

#[async_trait]
impl EventSource for JsonLinesFileSource {
    fn name(&self) -> String {
        format!("file:{}", self.path.display())
    }

    async fn read(&mut self) -> Result<Option<SourceBatch>, SourceError> {
        if self.exhausted {
            return Ok(None);
        }

        let mut batch = SourceBatch::default();
        while batch.records.len() < self.batch_size {
            let line = self.lines.next_line().await.map_err(|e| SourceError::Io {
                path: self.path.clone(),
                source: e,
            })?;
            let Some(line) = line else {
                self.exhausted = true;
                break;
            };
            self.line_number += 1;

            if line.trim().is_empty() {
                continue;
            }

            match StreamRecord::from_json_slice(line.as_bytes()) {
                Ok(record) => batch.records.push(
                    record
                        .with_timestamp(current_time_millis())
                        .with_position(0, self.line_number),
                ),
                Err(message) => {
                    warn!(
                        "Skipping malformed line {} in {}: {}",
                        self.line_number,
                        self.path.display(),
                        message
                    );
                    batch.malformed += 1;
                }
            }
        }

        if self.exhausted && batch.is_empty() {
            return Ok(None);
        }
        Ok(Some(batch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_reads_batches_and_skips_malformed_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"Car": 1, "telemetry": {{"Gear": "1.0"}}}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, "not json").unwrap();
        writeln!(file, r#"{{"Car": 2, "telemetry": {{"Gear": "2.0"}}}}"#).unwrap();
        writeln!(file, r#"{{"Car": 3, "telemetry": {{"Gear": "3.0"}}}}"#).unwrap();

        let mut source = JsonLinesFileSource::open(file.path(), 2).await.unwrap();

        let first = source.read().await.unwrap().unwrap();
        assert_eq!(first.records.len(), 2);
        assert_eq!(first.malformed, 1);
        assert_eq!(first.records[0].offset, 1);
        assert_eq!(first.records[1].offset, 4);

        let second = source.read().await.unwrap().unwrap();
        assert_eq!(second.records.len(), 1);

        assert!(source.read().await.unwrap().is_none());
        assert!(source.read().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let result = JsonLinesFileSource::open("/no/such/telemetry.jsonl", 10).await;
        assert!(matches!(result, Err(SourceError::Io { .. })));
    }
}
