//! Standard output sink.

use super::{LineSink, SinkError};
use async_trait::async_trait;
use tokio::io::{AsyncWriteExt, Stdout};

pub struct ConsoleSink {
    stdout: Stdout,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self {
            stdout: tokio::io::stdout(),
        }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LineSink for ConsoleSink {
    fn name(&self) -> String {
        "console".to_string()
    }

    async fn deliver(&mut self, line: &str) -> Result<(), SinkError> {
        self.stdout.write_all(line.as_bytes()).await?;
        self.stdout.write_all(b"\n").await?;
        self.stdout.flush().await?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        self.stdout.flush().await?;
        Ok(())
    }
}
