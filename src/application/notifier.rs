//! Advisory notice delivery to an optionally mounted UI surface.

use std::sync::{Arc, RwLock};

use crate::ports::{Notice, NotificationSurface};

/// Routes notices to whichever surface is mounted.
///
/// Notices emitted while nothing is mounted are logged and dropped, never
/// queued and never an error.
#[derive(Default)]
pub struct Notifier {
    surface: RwLock<Option<Arc<dyn NotificationSurface>>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mount(&self, surface: Arc<dyn NotificationSurface>) {
        *self
            .surface
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(surface);
    }

    pub fn unmount(&self) {
        *self
            .surface
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }

    /// Shows `notice` if a surface is mounted. Returns whether it was shown.
    pub fn notify(&self, notice: Notice) -> bool {
        let surface = self
            .surface
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        match surface {
            Some(surface) => {
                surface.show(&notice);
                true
            }
            None => {
                tracing::debug!(kind = ?notice.kind, message = %notice.message, "No notification surface mounted");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::RecordingSurface;
    use crate::ports::NoticeKind;

    #[test]
    fn notify_without_surface_is_dropped() {
        let notifier = Notifier::new();
        assert!(!notifier.notify(Notice::transient(NoticeKind::CommentAdded, "hi")));
    }

    #[test]
    fn mounted_surface_receives_notices_until_unmounted() {
        let notifier = Notifier::new();
        let surface = Arc::new(RecordingSurface::new());
        notifier.mount(surface.clone());
        assert!(notifier.notify(Notice::transient(NoticeKind::CommentAdded, "one")));
        notifier.unmount();
        assert!(!notifier.notify(Notice::transient(NoticeKind::CommentAdded, "two")));
        assert_eq!(surface.notices().len(), 1);
    }
}
