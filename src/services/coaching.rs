use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::thread;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};

const QUEUE_CAPACITY: usize = 256;

/// Context handed to the external coaching/tip collaborator when a habit
/// day is completed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CoachingEvent {
    pub user_id: String,
    pub habit_id: String,
    pub day: String,
    pub streak: u32,
}

/// The boundary to the text-generation collaborator. The core never reads
/// the response; delivery failures stay invisible to the completion path.
pub trait TipSink: Send + Sync {
    fn deliver(&self, event: &CoachingEvent) -> AppResult<()>;
}

/// Fire-and-forget fan-out to a [`TipSink`], drained by a dedicated thread
/// so the append path never blocks on the collaborator.
pub struct CoachingRelay {
    tx: SyncSender<CoachingEvent>,
}

impl CoachingRelay {
    pub fn start(sink: Box<dyn TipSink>) -> AppResult<Self> {
        let (tx, rx) = mpsc::sync_channel::<CoachingEvent>(QUEUE_CAPACITY);

        thread::Builder::new()
            .name("coaching-relay".to_string())
            .spawn(move || {
                for event in rx {
                    if let Err(err) = sink.deliver(&event) {
                        warn!(
                            target: "app::coaching",
                            user_id = %event.user_id,
                            habit_id = %event.habit_id,
                            error = %err,
                            "coaching tip delivery failed"
                        );
                    }
                }
                info!(target: "app::coaching", "coaching relay stopped");
            })
            .map_err(|err| AppError::other(format!("无法启动教练消息线程: {err}")))?;

        Ok(Self { tx })
    }

    /// Never blocks: a full queue drops the tip, a stopped relay logs.
    pub fn emit(&self, event: CoachingEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                debug!(
                    target: "app::coaching",
                    user_id = %event.user_id,
                    "coaching queue full, tip dropped"
                );
            }
            Err(TrySendError::Disconnected(event)) => {
                warn!(
                    target: "app::coaching",
                    user_id = %event.user_id,
                    "coaching relay disconnected, tip dropped"
                );
            }
        }
    }
}
