//! Notification surface that records what it was asked to show.

use std::sync::Mutex;

use super::lock;
use crate::ports::{Notice, NoticeKind, NotificationSurface};

#[derive(Debug, Default)]
pub struct RecordingSurface {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        lock(&self.notices).clone()
    }

    pub fn count_of(&self, kind: NoticeKind) -> usize {
        lock(&self.notices).iter().filter(|n| n.kind == kind).count()
    }

    pub fn clear(&self) {
        lock(&self.notices).clear();
    }
}

impl NotificationSurface for RecordingSurface {
    fn show(&self, notice: &Notice) {
        lock(&self.notices).push(notice.clone());
    }
}
