//! JSON-lines record replay
//!
//! Streams a recorded log of typed records into the router channel with a
//! fixed inter-record pace. Doubles as the development transport: any file
//! of one-JSON-object-per-line records (dispatched on `message_id`) drives
//! the full pipeline without live sensors.

use std::path::PathBuf;
use std::time::Duration;

use colav_core::error::RecordError;
use colav_core::records::InputRecord;
use tokio::sync::mpsc;
use tokio_graceful_shutdown::SubsystemHandle;

use crate::SubsystemResult;

/// Inter-record pacing
const RECORD_PACE: Duration = Duration::from_millis(25);

pub struct ReplaySource {
    path: PathBuf,
    records: mpsc::Sender<InputRecord>,
}

impl ReplaySource {
    pub fn new(path: PathBuf, records: mpsc::Sender<InputRecord>) -> Self {
        Self { path, records }
    }

    pub async fn run(self, subsys: SubsystemHandle) -> SubsystemResult {
        let contents = tokio::fs::read_to_string(&self.path).await?;
        log::info!("Replaying records from {}", self.path.display());

        let mut sent = 0usize;
        let mut dropped = 0usize;
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match parse_line(line) {
                Ok(record) => {
                    if self.records.send(record).await.is_err() {
                        log::warn!("Replay: router gone, stopping");
                        break;
                    }
                    sent += 1;
                }
                Err(e) => {
                    dropped += 1;
                    log::debug!("Replay: dropped record: {}", e);
                }
            }

            tokio::select! {
                _ = subsys.on_shutdown_requested() => {
                    log::info!("Replay interrupted after {} records", sent);
                    return Ok(());
                }
                _ = tokio::time::sleep(RECORD_PACE) => {}
            }
        }

        log::info!("Replay finished: {} records sent, {} dropped", sent, dropped);
        Ok(())
    }
}

fn parse_line(line: &str) -> Result<InputRecord, RecordError> {
    let value: serde_json::Value = serde_json::from_str(line)?;
    InputRecord::from_value(value)
}
