//! Presentation-layer seam.

use std::ops::{Deref, DerefMut};

/// Callbacks the orchestrator drives while a submission runs.
pub trait SubmissionUi: Send {
    /// Cover the form so nothing can be edited mid-submission.
    fn lock_screen(&mut self);
    fn unlock_screen(&mut self);
    fn set_submit_enabled(&mut self, enabled: bool);
    fn compress_progress(&mut self, done: usize, total: usize);
    fn send_progress(&mut self, done: usize, total: usize);
    fn show_error(&mut self, message: &str);
    fn show_complete(&mut self, images: usize);
}

/// Holds the screen lock for as long as it lives.
///
/// Every exit path of a submission, including early returns and panics, drops the
/// guard, which unlocks the screen and re-enables the submit control.
pub struct ScreenLock<'a> {
    ui: &'a mut dyn SubmissionUi,
}

impl<'a> ScreenLock<'a> {
    pub fn acquire(ui: &'a mut dyn SubmissionUi) -> Self {
        ui.lock_screen();
        ui.set_submit_enabled(false);
        Self { ui }
    }
}

impl<'a> Deref for ScreenLock<'a> {
    type Target = dyn SubmissionUi + 'a;

    fn deref(&self) -> &Self::Target {
        self.ui
    }
}

impl<'a> DerefMut for ScreenLock<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.ui
    }
}

impl Drop for ScreenLock<'_> {
    fn drop(&mut self) {
        self.ui.set_submit_enabled(true);
        self.ui.unlock_screen();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingUi, UiEvent};

    #[test]
    fn test_lock_released_on_drop() {
        let mut ui = RecordingUi::default();
        {
            let mut lock = ScreenLock::acquire(&mut ui);
            lock.compress_progress(1, 1);
        }
        assert_eq!(
            ui.events,
            vec![
                UiEvent::Locked,
                UiEvent::SubmitEnabled(false),
                UiEvent::CompressProgress(1, 1),
                UiEvent::SubmitEnabled(true),
                UiEvent::Unlocked,
            ]
        );
    }
}
