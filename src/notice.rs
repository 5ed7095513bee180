//! Events surfaced to the presentation layer.
use log::debug;
use tokio::sync::mpsc;

use crate::TaskId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// Input was rejected; nothing changed
    Validation,
    /// A delete is waiting for confirm or cancel
    ConfirmDelete,
    Success,
    /// The action went through locally but the server diverged
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    pub task_id: Option<TaskId>,
}

impl Notice {
    pub fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            task_id: None,
        }
    }

    pub fn for_task(mut self, id: TaskId) -> Self {
        self.task_id = Some(id);
        self
    }
}

pub type NoticeReceiver = mpsc::UnboundedReceiver<Notice>;

/// Sending half handed to the engine. Sends never block and are dropped
/// silently once the presentation layer has gone away.
#[derive(Debug, Clone)]
pub struct NoticeSender {
    tx: mpsc::UnboundedSender<Notice>,
}

impl NoticeSender {
    pub fn show(&self, notice: Notice) {
        debug!("Notice {:?}: {}", notice.kind, notice.message);
        let _ = self.tx.send(notice);
    }
}

pub fn notice_channel() -> (NoticeSender, NoticeReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (NoticeSender { tx }, rx)
}

/// Collects every notice currently queued.
pub fn drain_notices(rx: &mut NoticeReceiver) -> Vec<Notice> {
    let mut notices = Vec::new();
    while let Ok(notice) = rx.try_recv() {
        notices.push(notice);
    }
    notices
}
