//! In-memory sink that keeps every delivered line.
//!
//! Clones share the same buffer, so a handle kept by the caller sees what the
//! dispatcher delivered.

use super::{LineSink, SinkError};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the lines delivered so far.
    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl LineSink for MemorySink {
    fn name(&self) -> String {
        "memory".to_string()
    }

    async fn deliver(&mut self, line: &str) -> Result<(), SinkError> {
        let mut lines = match self.lines.lock() {
            Ok(lines) => lines,
            Err(poisoned) => poisoned.into_inner(),
        };
        lines.push(line.to_string());
        Ok(())
    }
}
