//! One door action from request to result.
//!
//! A [`DoorTask`] turns a door action into a command, runs it through the
//! session context and decodes the answer into a [`DoorResult`].
//!
//! # State machine
//!
//! ```text
//! Idle ──execute(open/close/status)──────────────────────────▶ Sending ──▶ Done
//!   │                                                            ▲  │
//!   └──execute(leave-open)──▶ NeedsDuration ──leave_open(n)──────┘  └──▶ Cancelled
//!                                  │
//!                                  └──handle dropped / cancel()──▶ Cancelled
//! ```
//!
//! # Silence policy
//!
//! When a command produces no interpretable output the same command text is
//! sent once more. A second silence ends the task with
//! [`SshErrorKind::ExecutionFailed`]. Session preparation failures end the task
//! immediately and are never resent.
//!
//! # Delivery
//!
//! The start callback fires once, synchronously, right before the first
//! attempt. The result travels over a single-use channel to the
//! [`TaskCompletion`] future, so it is delivered at most once.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::task::{Context, Poll};

use thiserror::Error;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use super::error::SshErrorKind;
use super::manager::SessionHandle;
use super::protocol::{
    DoorCommandKind, DoorId, DoorResult, encode_command, leave_open_command, parse_output,
};

/// Problems with how a task was driven, as opposed to how the door answered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("invalid door id: '{0}'")]
    InvalidDoorId(String),

    #[error("task was already started")]
    AlreadyStarted,

    #[error("leave-open duration must be at least one minute")]
    InvalidDuration,

    #[error("leave-open needs a duration")]
    DurationRequired,

    #[error("door {0} cannot be left open for longer than the default")]
    LeaveOpenNotAllowed(String),

    #[error("task was cancelled")]
    Cancelled,

    #[error("task no longer exists")]
    Expired,
}

type StartCallback = Box<dyn FnOnce() + Send>;

/// Observable phase of a [`DoorTask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPhase {
    Idle,
    NeedsDuration,
    Sending,
    Done,
    Cancelled,
}

enum TaskState {
    Idle {
        on_start: Option<StartCallback>,
    },
    NeedsDuration {
        door: DoorId,
        on_start: Option<StartCallback>,
        completion: Completion,
    },
    Sending {
        command: String,
        retried: bool,
    },
    Done,
    Cancelled,
}

impl TaskState {
    fn phase(&self) -> TaskPhase {
        match self {
            TaskState::Idle { .. } => TaskPhase::Idle,
            TaskState::NeedsDuration { .. } => TaskPhase::NeedsDuration,
            TaskState::Sending { .. } => TaskPhase::Sending,
            TaskState::Done => TaskPhase::Done,
            TaskState::Cancelled => TaskPhase::Cancelled,
        }
    }
}

/// Sending half of the result channel. Fulfilling consumes it.
struct Completion {
    tx: oneshot::Sender<DoorResult>,
}

impl Completion {
    fn pair() -> (Completion, TaskCompletion) {
        let (tx, rx) = oneshot::channel();
        (Completion { tx }, TaskCompletion { rx })
    }

    /// `false` when nobody is waiting any more.
    fn fulfill(self, result: DoorResult) -> bool {
        self.tx.send(result).is_ok()
    }
}

/// Resolves to the task's result, or `None` if the task was cancelled.
#[derive(Debug)]
pub struct TaskCompletion {
    rx: oneshot::Receiver<DoorResult>,
}

impl TaskCompletion {
    /// Non-blocking peek; `None` while pending or after cancellation.
    pub fn try_result(&mut self) -> Option<DoorResult> {
        self.rx.try_recv().ok()
    }
}

impl Future for TaskCompletion {
    type Output = Option<DoorResult>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(Result::ok)
    }
}

/// What [`DoorTask::execute`] did with the request.
#[derive(Debug)]
pub enum Dispatch {
    /// The command is on its way.
    Sent(TaskCompletion),
    /// Leave-open: nothing is sent until a duration is supplied.
    NeedsDuration(PendingLeaveOpen),
}

struct TaskInner {
    id: Uuid,
    sessions: SessionHandle,
    reconnect_on_retry: bool,
    cancel: CancellationToken,
    delivered: AtomicBool,
    state: Mutex<TaskState>,
}

impl TaskInner {
    fn lock_state(&self) -> MutexGuard<'_, TaskState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn start_sending(
        self: Arc<Self>,
        door: DoorId,
        command: String,
        on_start: Option<StartCallback>,
        completion: Completion,
    ) {
        if let Some(on_start) = on_start {
            on_start();
        }

        let span = info_span!("door_task", id = %self.id, door = %door);
        tokio::spawn(self.drive(command, completion).instrument(span));
    }

    async fn drive(self: Arc<Self>, command: String, completion: Completion) {
        let mut retried = false;

        let result = loop {
            let force = retried && self.reconnect_on_retry;
            debug!("Sending '{}'{}", command, if retried { " (retry)" } else { "" });

            match self.sessions.execute(command.as_str(), force).await {
                Err(kind) => break DoorResult::Error(kind),
                Ok(Some(output)) => break parse_output(&output),
                Ok(None) if retried => break DoorResult::Error(SshErrorKind::ExecutionFailed),
                Ok(None) => {
                    warn!("No response to '{}', resending once", command);
                    retried = true;
                    self.mark_retried();
                }
            }
        };

        self.finish(result, completion);
    }

    fn mark_retried(&self) {
        if let TaskState::Sending { retried, .. } = &mut *self.lock_state() {
            *retried = true;
        }
    }

    fn finish(&self, result: DoorResult, completion: Completion) {
        let cancelled = self.cancel.is_cancelled();
        *self.lock_state() = if cancelled {
            TaskState::Cancelled
        } else {
            TaskState::Done
        };

        if cancelled {
            debug!("Task cancelled; dropping {:?}", result);
            return;
        }

        let already_delivered = self.delivered.swap(true, Ordering::SeqCst);
        debug_assert!(!already_delivered, "task completion fulfilled twice");

        info!("Task finished: {:?}", result);
        if !completion.fulfill(result) {
            debug!("Nobody is waiting for the result");
        }
    }

    /// Drop callbacks of a task that has not started sending.
    fn invalidate(&self) {
        let mut state = self.lock_state();
        if matches!(
            *state,
            TaskState::Idle { .. } | TaskState::NeedsDuration { .. }
        ) {
            debug!("Task {} invalidated before sending", self.id);
            *state = TaskState::Cancelled;
        }
    }

    fn begin_leave_open(self: &Arc<Self>, minutes: u32) -> Result<(), TaskError> {
        if minutes == 0 {
            return Err(TaskError::InvalidDuration);
        }

        let mut state = self.lock_state();
        let (door, on_start, completion) = match std::mem::replace(&mut *state, TaskState::Done) {
            TaskState::NeedsDuration {
                door,
                on_start,
                completion,
            } => (door, on_start, completion),
            other => {
                let error = if matches!(other, TaskState::Cancelled) {
                    TaskError::Cancelled
                } else {
                    TaskError::AlreadyStarted
                };
                *state = other;
                return Err(error);
            }
        };

        let command = leave_open_command(&door, minutes);
        *state = TaskState::Sending {
            command: command.clone(),
            retried: false,
        };
        drop(state);

        info!("Leaving door {} open for {} minute(s)", door, minutes);
        self.clone().start_sending(door, command, on_start, completion);
        Ok(())
    }
}

/// One user-initiated door action.
///
/// Must be executed inside a tokio runtime; sending happens on a spawned task.
pub struct DoorTask {
    inner: Arc<TaskInner>,
}

impl DoorTask {
    pub fn new(sessions: SessionHandle) -> Self {
        Self {
            inner: Arc::new(TaskInner {
                id: Uuid::new_v4(),
                sessions,
                reconnect_on_retry: false,
                cancel: CancellationToken::new(),
                delivered: AtomicBool::new(false),
                state: Mutex::new(TaskState::Idle { on_start: None }),
            }),
        }
    }

    /// Force a reconnect before the single resend that follows a silent output.
    pub fn reconnect_on_retry(mut self, reconnect: bool) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.reconnect_on_retry = reconnect;
        }
        self
    }

    /// Called once, right before the first attempt; never on a retry.
    pub fn on_start(self, callback: impl FnOnce() + Send + 'static) -> Self {
        if let TaskState::Idle { on_start } = &mut *self.inner.lock_state() {
            *on_start = Some(Box::new(callback));
        }
        self
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn phase(&self) -> TaskPhase {
        self.inner.lock_state().phase()
    }

    /// Whether the last resend after silence has been used up.
    pub fn has_retried(&self) -> bool {
        matches!(
            *self.inner.lock_state(),
            TaskState::Sending { retried: true, .. }
        )
    }

    /// Command text most recently handed to the session context.
    pub fn last_command(&self) -> Option<String> {
        match &*self.inner.lock_state() {
            TaskState::Sending { command, .. } => Some(command.clone()),
            _ => None,
        }
    }

    /// Start the action on `door_id` (trimmed and uppercased here).
    pub fn execute(&self, kind: DoorCommandKind, door_id: &str) -> Result<Dispatch, TaskError> {
        let door = DoorId::parse(door_id)?;

        if self.inner.cancel.is_cancelled() {
            return Err(TaskError::Cancelled);
        }

        let mut state = self.inner.lock_state();
        let on_start = match std::mem::replace(&mut *state, TaskState::Done) {
            TaskState::Idle { on_start } => on_start,
            other => {
                *state = other;
                return Err(TaskError::AlreadyStarted);
            }
        };

        let (completion, receiver) = Completion::pair();

        match encode_command(kind, &door) {
            Some(command) => {
                *state = TaskState::Sending {
                    command: command.clone(),
                    retried: false,
                };
                drop(state);

                info!("Task {}: {} door {}", self.inner.id, kind, door);
                self.inner
                    .clone()
                    .start_sending(door, command, on_start, completion);
                Ok(Dispatch::Sent(receiver))
            }
            None => {
                *state = TaskState::NeedsDuration {
                    door: door.clone(),
                    on_start,
                    completion,
                };
                drop(state);

                debug!("Task {}: door {} needs a duration", self.inner.id, door);
                Ok(Dispatch::NeedsDuration(PendingLeaveOpen {
                    task: Arc::downgrade(&self.inner),
                    door,
                    completion: Some(receiver),
                    token: self.inner.cancel.clone(),
                }))
            }
        }
    }

    /// Suppress delivery of the result.
    ///
    /// A command already sent still runs to completion on the remote side;
    /// its result is dropped.
    pub fn cancel(&self) {
        self.inner.cancel.cancel();
        self.inner.invalidate();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }
}

/// Handle for the duration step of a leave-open task.
///
/// Holds only a weak link to its task. Dropping it before
/// [`PendingLeaveOpen::leave_open`] succeeds cancels the task: no command is
/// sent and no result is delivered.
#[derive(Debug)]
pub struct PendingLeaveOpen {
    task: Weak<TaskInner>,
    door: DoorId,
    completion: Option<TaskCompletion>,
    token: CancellationToken,
}

impl PendingLeaveOpen {
    pub fn door_id(&self) -> &DoorId {
        &self.door
    }

    /// Send `door <ID> <minutes>` through the normal pipeline.
    ///
    /// An invalid duration leaves the handle usable for another attempt.
    pub fn leave_open(&mut self, minutes: u32) -> Result<TaskCompletion, TaskError> {
        if self.completion.is_none() {
            return Err(TaskError::AlreadyStarted);
        }

        let task = self.task.upgrade().ok_or(TaskError::Expired)?;
        task.begin_leave_open(minutes)?;

        self.completion.take().ok_or(TaskError::AlreadyStarted)
    }

    /// Explicit form of dropping the handle.
    pub fn dismiss(self) {}
}

impl Drop for PendingLeaveOpen {
    fn drop(&mut self) {
        if self.completion.is_none() {
            return;
        }

        self.token.cancel();
        if let Some(task) = self.task.upgrade() {
            task.invalidate();
        }
    }
}
