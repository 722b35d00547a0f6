use std::sync::Arc;
use std::time::Duration;

use flume::Sender;
use tokio::sync::Notify;

use super::session::ScopedTask;
use super::AppCore;
use crate::backoff::{jittered, Backoff};
use crate::transport::ChatApi;
use crate::updates::{CoreMsg, InternalEvent};

impl AppCore {
    pub(super) fn spawn_notification_poller(
        &self,
        token: u64,
        user_id: String,
        trigger: Arc<Notify>,
    ) -> ScopedTask {
        let api = self.api.clone();
        let tx = self.core_sender.clone();
        let interval = self.config.poll_interval();
        let retry_base = self.config.poll_retry_base();
        ScopedTask::new(self.runtime.spawn(run_notification_poller(
            api, tx, token, user_id, interval, retry_base, trigger,
        )))
    }
}

/// Fetches immediately, then on `interval`. Consecutive failures retry sooner
/// (exponential from `retry_base`, never slower than `interval`). A trigger
/// notification cuts the current wait short.
async fn run_notification_poller(
    api: Arc<dyn ChatApi>,
    tx: Sender<CoreMsg>,
    session: u64,
    user_id: String,
    interval: Duration,
    retry_base: Duration,
    trigger: Arc<Notify>,
) {
    let mut retry = Backoff::new(retry_base, interval);
    loop {
        let result = api.fetch_notifications(&user_id).await;
        let delay = match &result {
            Ok(list) => {
                tracing::debug!(count = list.len(), "notifications fetched");
                retry.reset();
                interval
            }
            Err(_) => {
                let delay = retry.next_delay();
                let mut rng = rand::thread_rng();
                jittered(delay, &mut rng)
            }
        };
        if tx
            .send(CoreMsg::Internal(Box::new(
                InternalEvent::NotificationsFetched { session, result },
            )))
            .is_err()
        {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = trigger.notified() => tracing::debug!("notification refresh requested"),
        }
    }
}
