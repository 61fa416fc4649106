use std::io::Write;

use cleanreport_client::SubmissionUi;

/// [`SubmissionUi`] writing progress lines to stderr.
#[derive(Default)]
pub struct ConsoleUi {
    locked: bool,
    lines: Vec<String>,
}

impl ConsoleUi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Lines printed so far.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    fn emit(&mut self, line: String) {
        let _ = writeln!(std::io::stderr(), "{}", line);
        self.lines.push(line);
    }
}

impl SubmissionUi for ConsoleUi {
    fn lock_screen(&mut self) {
        self.locked = true;
    }

    fn unlock_screen(&mut self) {
        self.locked = false;
    }

    fn set_submit_enabled(&mut self, _enabled: bool) {}

    fn compress_progress(&mut self, done: usize, total: usize) {
        self.emit(format!("圧縮中 ({}/{})", done, total));
    }

    fn send_progress(&mut self, done: usize, total: usize) {
        self.emit(format!("送信中 ({}/{})", done, total));
    }

    fn show_error(&mut self, message: &str) {
        self.emit(message.to_string());
    }

    fn show_complete(&mut self, images: usize) {
        self.emit(format!("送信完了 ({}枚) お疲れ様でした！", images));
    }
}

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_ui_progress_lines() {
        let mut ui = ConsoleUi::new();
        ui.lock_screen();
        assert!(ui.is_locked());
        ui.compress_progress(1, 2);
        ui.send_progress(2, 2);
        ui.show_complete(2);
        ui.unlock_screen();

        assert!(!ui.is_locked());
        assert_eq!(
            ui.lines(),
            &["圧縮中 (1/2)", "送信中 (2/2)", "送信完了 (2枚) お疲れ様でした！"]
        );
    }
}
