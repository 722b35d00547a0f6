use std::sync::Arc;
use std::time::Duration;

use flume::Sender;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use super::AppCore;
use crate::backoff::{jittered, Backoff};
use crate::state::{SessionState, StreamStatus};
use crate::transport::{PushEvent, PushTransport, RawEvent};
use crate::updates::{CoreMsg, InternalEvent};

/// Owned handle to a spawned task; aborts the task when dropped.
pub(super) struct ScopedTask(JoinHandle<()>);

impl ScopedTask {
    pub(super) fn new(handle: JoinHandle<()>) -> Self {
        Self(handle)
    }
}

impl Drop for ScopedTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

pub(super) struct Session {
    pub(super) token: u64,
    pub(super) user_id: Option<String>,
    pub(super) poll_trigger: Arc<Notify>,
    _snapshot_task: Option<ScopedTask>,
    _stream_task: Option<ScopedTask>,
    _poll_task: Option<ScopedTask>,
}

impl AppCore {
    pub(super) fn start_session(&mut self, user_id: Option<String>) {
        self.stop_session();

        self.session_token = self.session_token.wrapping_add(1);
        let token = self.session_token;
        tracing::info!(session = token, has_user = user_id.is_some(), "session start");

        self.state.session = SessionState::Active {
            user_id: user_id.clone(),
        };

        let poll_trigger = Arc::new(Notify::new());
        let (stream_task, poll_task) = if self.network_enabled() {
            let stream_task = self.spawn_event_stream(token);
            let poll_task = user_id
                .as_ref()
                .map(|uid| self.spawn_notification_poller(token, uid.clone(), poll_trigger.clone()));
            (Some(stream_task), poll_task)
        } else {
            tracing::info!("network disabled; session has no I/O tasks");
            (None, None)
        };

        self.session = Some(Session {
            token,
            user_id,
            poll_trigger,
            _snapshot_task: None,
            _stream_task: stream_task,
            _poll_task: poll_task,
        });

        if self.network_enabled() {
            self.spawn_snapshot_fetch(token);
        }
    }

    /// Drops the session (aborting its tasks) and clears per-session state.
    pub(super) fn stop_session(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        tracing::info!(session = session.token, "session end");
        drop(session);
        self.session_token = self.session_token.wrapping_add(1);
        self.reset_session_state();
    }

    pub(super) fn spawn_snapshot_fetch(&mut self, token: u64) {
        self.set_busy(|b| b.loading_messages = true);
        let api = self.api.clone();
        let tx = self.core_sender.clone();
        let handle = self.runtime.spawn(async move {
            let result = api.fetch_messages().await;
            let _ = tx.send(CoreMsg::Internal(Box::new(InternalEvent::SnapshotFetched {
                session: token,
                result,
            })));
        });
        if let Some(session) = self.session.as_mut() {
            session._snapshot_task = Some(ScopedTask::new(handle));
        }
    }

    fn spawn_event_stream(&self, token: u64) -> ScopedTask {
        let push = self.push.clone();
        let tx = self.core_sender.clone();
        let base = self.config.stream_reconnect_base();
        let max = self.config.stream_reconnect_max();
        ScopedTask::new(
            self.runtime
                .spawn(run_event_stream(push, tx, token, base, max)),
        )
    }
}

fn post(tx: &Sender<CoreMsg>, event: InternalEvent) -> bool {
    tx.send(CoreMsg::Internal(Box::new(event))).is_ok()
}

async fn run_event_stream(
    push: Arc<dyn PushTransport>,
    tx: Sender<CoreMsg>,
    session: u64,
    reconnect_base: Duration,
    reconnect_max: Duration,
) {
    let mut backoff = Backoff::new(reconnect_base, reconnect_max);
    if !post(
        &tx,
        InternalEvent::StreamStatusChanged {
            session,
            status: StreamStatus::Connecting,
        },
    ) {
        return;
    }

    loop {
        match push.connect().await {
            Ok(mut conn) => {
                backoff.reset();
                if !post(
                    &tx,
                    InternalEvent::StreamStatusChanged {
                        session,
                        status: StreamStatus::Connected,
                    },
                ) {
                    return;
                }
                loop {
                    match conn.next_event().await {
                        Ok(Some(raw)) => {
                            if !route_push_event(&tx, session, raw) {
                                return;
                            }
                        }
                        Ok(None) => {
                            tracing::info!("push channel closed by server");
                            break;
                        }
                        Err(e) => {
                            tracing::warn!(%e, "push channel failed");
                            break;
                        }
                    }
                }
            }
            Err(e) => tracing::warn!(%e, attempt = backoff.attempt(), "push connect failed"),
        }

        let delay = backoff.next_delay();
        let delay = {
            let mut rng = rand::thread_rng();
            jittered(delay, &mut rng)
        };
        if !post(
            &tx,
            InternalEvent::StreamStatusChanged {
                session,
                status: StreamStatus::Reconnecting {
                    attempt: backoff.attempt(),
                },
            },
        ) {
            return;
        }
        tracing::debug!(delay_ms = delay.as_millis() as u64, "push reconnect scheduled");
        tokio::time::sleep(delay).await;
    }
}

/// Forwards one push event to the core. Returns false once the core is gone.
fn route_push_event(tx: &Sender<CoreMsg>, session: u64, raw: RawEvent) -> bool {
    match PushEvent::decode(raw) {
        Ok(PushEvent::ChatMessage(message)) => {
            post(tx, InternalEvent::ChatMessagePushed { session, message })
        }
        Ok(PushEvent::DirectMessage {
            sender_id,
            sender_name,
            ..
        }) => post(
            tx,
            InternalEvent::DirectMessageReceived {
                session,
                sender_id,
                sender_name,
            },
        ),
        Ok(PushEvent::Other(name)) => {
            tracing::debug!(event = %name, "ignoring push event");
            true
        }
        Err(e) => {
            tracing::warn!(%e, "dropping malformed push event");
            true
        }
    }
}
