//! Coordinator daemon for the radiosub network: runs the coordinator on
//! a loopback radio link, writes relayed frames to a JSON lines log and
//! periodically reports dispatch counters

pub mod config;
pub mod relay_log;
pub mod stats;

use radiosub_coordinator::CoordinatorError;
use radiosub_proto::link::LinkError;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RadiosubdError {
    #[error("I/O Error")]
    Io(#[from] std::io::Error),
    #[error("Config Error: {0}")]
    Config(#[from] serde_json::Error),
    #[error("Coordinator Error: {0}")]
    CoordinatorError(#[from] CoordinatorError),
    #[error("Link Error: {0}")]
    LinkError(#[from] LinkError),
    #[error("Actix mailbox Error")]
    MailError(#[from] actix::MailboxError),
    #[error("Unable to set up log tracer")]
    LogTracer(#[from] log::SetLoggerError),
    #[error("Unable to set up tracing subscriber")]
    Tracing(#[from] tracing::subscriber::SetGlobalDefaultError),
}

pub type RadiosubdResult<T> = Result<T, RadiosubdError>;
