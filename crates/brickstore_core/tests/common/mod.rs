#![allow(dead_code)]

use brickstore_core::db::open_db_in_memory;
use brickstore_core::CoreLogger;
use log::{Level, Log, Metadata, Record};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

/// In-memory sink capturing rendered event lines.
#[derive(Default)]
pub struct MemoryLog {
    lines: Mutex<Vec<String>>,
}

impl MemoryLog {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl Log for MemoryLog {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= Level::Debug
    }

    fn log(&self, record: &Record<'_>) {
        self.lines
            .lock()
            .unwrap()
            .push(format!("{} {}", record.level(), record.args()));
    }

    fn flush(&self) {}
}

pub fn capturing_logger() -> (CoreLogger, Arc<MemoryLog>) {
    let sink = Arc::new(MemoryLog::default());
    (CoreLogger::new(sink.clone()), sink)
}

pub fn memory_db() -> Connection {
    open_db_in_memory(&CoreLogger::discard()).unwrap()
}

pub fn args(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}
