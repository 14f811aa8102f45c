use actix::Addr;
use futures::future::join_all;
use std::{sync::Arc, time::Duration};

use radiosub_proto::link::{Link, LinkError};

use crate::{Coordinator, CoordinatorError, Inbound};

/// Consecutive receive errors after which the pump gives up on the link
pub const MAX_RECV_ERRORS: usize = 10;
// Pause after each receive error so a failing socket is not polled hot
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Owns the task that moves frames between a [`Link`] and the
/// [`Coordinator`] mailbox. The task is aborted when the router drops.
pub struct LinkRouter {
    pump_handle: Option<tokio::task::JoinHandle<Result<(), CoordinatorError>>>,
}

impl LinkRouter {
    pub fn new(link: Arc<dyn Link>, coordinator: Addr<Coordinator>) -> Self {
        let handle = tokio::spawn(pump(link, coordinator));
        Self {
            pump_handle: Some(handle),
        }
    }

    /// Wait for the pump task to finish. Returns immediately if it has
    /// already been awaited.
    pub async fn exec_pump(&mut self) -> Result<(), CoordinatorError> {
        match self.pump_handle.take() {
            Some(handle) => handle.await?,
            None => Ok(()),
        }
    }
}

async fn pump(link: Arc<dyn Link>, coordinator: Addr<Coordinator>) -> Result<(), CoordinatorError> {
    log::info!("Link pump listening as node {}", link.local_id());

    let mut errors = 0;
    loop {
        let raw = match link.recv().await {
            Ok(raw) => {
                errors = 0;
                raw
            }
            Err(LinkError::Closed(id)) => {
                log::warn!("Link for node {id:} closed");
                break;
            }
            Err(e) => {
                errors += 1;
                if errors >= MAX_RECV_ERRORS {
                    log::error!("Giving up on link after {errors:} receive errors, last: {e:}");
                    return Err(e.into());
                }
                log::error!("Error receiving frame: {e:}");
                tokio::time::sleep(RECV_ERROR_BACKOFF).await;
                continue;
            }
        };

        // Mailbox failure means the actor is gone, nothing left to pump for
        let outgoing = match coordinator.send(Inbound(raw)).await? {
            Ok(outgoing) => outgoing,
            Err(e) => {
                log::debug!("Inbound frame dropped: {e:}");
                continue;
            }
        };

        let link = &link;
        join_all(outgoing.iter().map(|out| async move {
            if let Err(e) = link.send(out.dst, &out.frame).await {
                log::error!("Failure to forward frame to {:?}: {e:}", out.dst);
            }
        }))
        .await;
    }

    log::warn!("Link pump exiting");
    Ok(())
}

impl Drop for LinkRouter {
    fn drop(&mut self) {
        if let Some(pump) = &self.pump_handle {
            pump.abort();
        }
    }
}
