use actix::Addr;
use std::time::Duration;

use radiosub_coordinator::{Coordinator, GetStats};

/// Log the coordinator's dispatch counters every `every`, until the actor
/// goes away
pub async fn report_stats(coordinator: Addr<Coordinator>, every: Duration) {
    let mut tick = tokio::time::interval(every);
    // skip the immediate first tick
    tick.tick().await;

    loop {
        tick.tick().await;
        match coordinator.send(GetStats).await {
            Ok(stats) => match serde_json::to_string(&stats) {
                Ok(json) => log::info!("Dispatch stats {json}"),
                Err(e) => log::error!("Unable to render stats {e:}"),
            },
            Err(e) => {
                log::error!("Coordinator unreachable {e:}, stopping stats reports");
                break;
            }
        }
    }
}
