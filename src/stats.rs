//! Match result persistence
//!
//! Games hand finished [`MatchRecord`]s to a [`ResultSink`] and never wait on
//! the outcome. The default sink appends JSON lines from a dedicated worker
//! thread fed by a channel, so the tick thread never touches the filesystem.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::game::match_result::MatchRecord;

/// Persistence errors
#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    #[error("failed to open result log {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to spawn result writer: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("result writer has shut down")]
    Closed,
}

/// Fire-and-forget consumer of finished matches
pub trait ResultSink: Send + Sync {
    fn submit(&self, record: MatchRecord);
}

enum WriterCommand {
    Record(Box<MatchRecord>),
    Flush(Sender<()>),
    Shutdown,
}

/// Appends one JSON object per match to a log file
pub struct JsonlResultWriter {
    tx: Sender<WriterCommand>,
    thread: Mutex<Option<JoinHandle<()>>>,
    written: Arc<AtomicU64>,
    path: PathBuf,
}

impl JsonlResultWriter {
    /// Open (or create) the log and start the writer thread
    pub fn spawn(path: impl Into<PathBuf>) -> Result<Self, StatsError> {
        let path = path.into();
        let file = open_log(&path)?;
        let (tx, rx) = unbounded::<WriterCommand>();
        let written = Arc::new(AtomicU64::new(0));

        let counter = written.clone();
        let log_path = path.clone();
        let thread = thread::Builder::new()
            .name("match-result-writer".to_string())
            .spawn(move || writer_loop(rx, BufWriter::new(file), counter, log_path))
            .map_err(StatsError::Spawn)?;

        info!("Writing match results to {}", path.display());
        Ok(Self {
            tx,
            thread: Mutex::new(Some(thread)),
            written,
            path,
        })
    }

    /// Block until every record submitted so far is on disk
    pub fn flush(&self) -> Result<(), StatsError> {
        let (ack_tx, ack_rx) = bounded(1);
        self.tx
            .send(WriterCommand::Flush(ack_tx))
            .map_err(|_| StatsError::Closed)?;
        ack_rx.recv().map_err(|_| StatsError::Closed)
    }

    /// Drain pending records and stop the worker; later calls do nothing
    pub fn shutdown(&self) {
        let Some(thread) = self.thread.lock().take() else {
            return;
        };
        let _ = self.tx.send(WriterCommand::Shutdown);
        if thread.join().is_err() {
            error!("Result writer thread panicked");
        }
    }

    /// Records successfully appended
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResultSink for JsonlResultWriter {
    fn submit(&self, record: MatchRecord) {
        if self.tx.send(WriterCommand::Record(Box::new(record))).is_err() {
            error!("Dropped match result: writer has shut down");
        }
    }
}

impl Drop for JsonlResultWriter {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn open_log(path: &Path) -> Result<File, StatsError> {
    let open_err = |source| StatsError::Open {
        path: path.to_path_buf(),
        source,
    };
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(open_err)?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(open_err)
}

fn writer_loop(
    rx: Receiver<WriterCommand>,
    mut out: BufWriter<File>,
    written: Arc<AtomicU64>,
    path: PathBuf,
) {
    while let Ok(cmd) = rx.recv() {
        match cmd {
            WriterCommand::Record(record) => {
                let line = match serde_json::to_string(&record) {
                    Ok(line) => line,
                    Err(e) => {
                        error!("Failed to encode result for game {}: {}", record.game_id, e);
                        continue;
                    }
                };
                match writeln!(out, "{}", line) {
                    Ok(()) => {
                        written.fetch_add(1, Ordering::Relaxed);
                        debug!("Stored result for game {}", record.game_id);
                    }
                    Err(e) => error!("Failed to write {}: {}", path.display(), e),
                }
            }
            WriterCommand::Flush(ack) => {
                if let Err(e) = out.flush() {
                    error!("Failed to flush {}: {}", path.display(), e);
                }
                let _ = ack.send(());
            }
            WriterCommand::Shutdown => break,
        }
    }

    if let Err(e) = out.flush() {
        error!("Failed to flush {}: {}", path.display(), e);
    }
}

/// Keeps records in memory
#[derive(Debug, Default)]
pub struct MemoryResultSink {
    records: Mutex<Vec<MatchRecord>>,
}

impl MemoryResultSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<MatchRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl ResultSink for MemoryResultSink {
    fn submit(&self, record: MatchRecord) {
        self.records.lock().push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::match_result::{EndReason, ParticipantResult};
    use chrono::Utc;
    use uuid::Uuid;

    fn record(arena: &str) -> MatchRecord {
        let winner = Uuid::new_v4();
        MatchRecord {
            game_id: Uuid::new_v4(),
            arena_name: arena.to_string(),
            mode: "classic".to_string(),
            start_time: Utc::now(),
            end_time: Utc::now(),
            duration_ms: 12_000,
            winner: Some(winner),
            winner_name: Some("P1".to_string()),
            player_count: 1,
            walls_spawned: 4,
            max_round: 4,
            end_reason: EndReason::LastPlayerStanding,
            participants: vec![ParticipantResult {
                player_id: winner,
                name: "P1".to_string(),
                final_score: 80,
                survival_ms: 12_000,
                walls_dodged: 3,
                placement: 1,
                eliminated_round: None,
                survived: true,
            }],
        }
    }

    #[test]
    fn test_memory_sink() {
        let sink = MemoryResultSink::new();
        assert!(sink.is_empty());
        sink.submit(record("alpha"));
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.records()[0].arena_name, "alpha");
    }

    #[test]
    fn test_jsonl_writer_appends_lines() {
        let path = std::env::temp_dir().join(format!("hitw-results-{}.jsonl", Uuid::new_v4()));
        let writer = JsonlResultWriter::spawn(&path).unwrap();

        writer.submit(record("alpha"));
        writer.submit(record("beta"));
        writer.flush().unwrap();
        assert_eq!(writer.written(), 2);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<MatchRecord> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].arena_name, "beta");
        assert_eq!(lines[0].participants[0].walls_dodged, 3);

        writer.shutdown();
        writer.shutdown();
        assert!(matches!(writer.flush(), Err(StatsError::Closed)));

        let _ = std::fs::remove_file(&path);
    }
}
