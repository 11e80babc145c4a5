// src/logging.rs
//
// Telemetry sinks for episode runs.
// - EventSink: trait used by the episode runner
// - NoopSink:  discards all events
// - FileSink:  writes one JSON object per tick (JSONL) for offline analysis

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::world::AgentId;

/// One tick of telemetry.
#[derive(Debug, Clone, Serialize)]
pub struct TickRecord<'a> {
    pub episode_id: u64,
    pub tick: u64,
    pub green_score_importance: f64,
    pub selected: &'a [usize],
    pub rewards: &'a BTreeMap<AgentId, f64>,
    pub metrics: &'a BTreeMap<String, f64>,
}

/// Abstract sink for per-tick telemetry.
pub trait EventSink {
    fn log_tick(&mut self, record: &TickRecord<'_>);

    fn flush(&mut self) {}
}

/// Sink that discards all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn log_tick(&mut self, _record: &TickRecord<'_>) {}
}

/// JSONL file sink.
///
/// Each tick is written as a single JSON object on its own line.
pub struct FileSink {
    writer: BufWriter<File>,
}

impl FileSink {
    /// Create a new sink writing to `path`, truncating any existing file.
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl EventSink for FileSink {
    fn log_tick(&mut self, record: &TickRecord<'_>) {
        // Telemetry must never abort a run, so I/O errors are ignored.
        if serde_json::to_writer(&mut self.writer, record).is_ok() {
            let _ = self.writer.write_all(b"\n");
        }
    }

    fn flush(&mut self) {
        let _ = self.writer.flush();
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_sink_writes_one_line_per_tick() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ticks.jsonl");

        let mut rewards = BTreeMap::new();
        rewards.insert(AgentId::Miner(0), 0.5);
        rewards.insert(AgentId::Planner, -0.25);
        let metrics = BTreeMap::from([("util/p".to_string(), 1.0)]);

        {
            let mut sink = FileSink::create(&path).unwrap();
            for tick in 0..3 {
                sink.log_tick(&TickRecord {
                    episode_id: 7,
                    tick,
                    green_score_importance: 0.1,
                    selected: &[0],
                    rewards: &rewards,
                    metrics: &metrics,
                });
            }
            sink.flush();
        }

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["episode_id"], 7);
        assert_eq!(first["rewards"]["p"], -0.25);
        assert_eq!(first["metrics"]["util/p"], 1.0);
    }
}
