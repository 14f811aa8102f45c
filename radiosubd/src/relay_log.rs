use chrono::{DateTime, Local, Utc};
use futures::StreamExt;
use serde::Serialize;
use std::{fs::OpenOptions, io::Write, path::Path};
use tokio_stream::wrappers::UnboundedReceiverStream;

use radiosub_coordinator::RelayedFrame;
use radiosub_proto::{Message, NodeId};

use crate::RadiosubdResult;

#[derive(Debug, Serialize)]
struct RelayLogRecord<'a> {
    time: String,
    src: NodeId,
    frame: String,
    message: &'a Message,
}

impl<'a> From<&'a RelayedFrame> for RelayLogRecord<'a> {
    fn from(relayed: &'a RelayedFrame) -> Self {
        let time = DateTime::<Utc>::from_timestamp_millis(relayed.ts)
            .map(|t| t.with_timezone(&Local).to_rfc3339())
            .unwrap_or_default();

        Self {
            time,
            src: relayed.src,
            frame: hex::encode(&relayed.frame),
            message: &relayed.message,
        }
    }
}

/// Append-only JSON lines log of relayed serial frames
pub struct RelayLog<W> {
    writer: W,
}

impl RelayLog<std::fs::File> {
    pub fn open(path: &Path) -> RadiosubdResult<Self> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        log::info!("Relaying frames to {}", path.display());
        Ok(Self::new(file))
    }
}

impl<W: Write> RelayLog<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn append(&mut self, relayed: &RelayedFrame) -> RadiosubdResult<()> {
        serde_json::to_writer(&mut self.writer, &RelayLogRecord::from(relayed))?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Drain relayed frames into `log` until the coordinator drops the sender
pub async fn relay_log_process<W: Write>(
    mut stream: UnboundedReceiverStream<RelayedFrame>,
    mut log: RelayLog<W>,
) {
    log::trace!("Processing relayed frames as a stream");
    while let Some(relayed) = stream.next().await {
        if let Err(e) = log.append(&relayed) {
            log::error!("Failure to write relayed frame from node {}: {e:}", relayed.src);
        }
    }
    log::warn!("Relay stream closed");
}
