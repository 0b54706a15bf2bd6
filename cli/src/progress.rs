//! Transient progress line on stderr, shown while a query waits for its
//! first output.

use std::io::Write;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use owo_colors::OwoColorize;
use tokio::task::JoinHandle;

const FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const FRAME_INTERVAL: Duration = Duration::from_millis(80);

struct Shared {
    out: Box<dyn Write + Send>,
    drawn: bool,
    stopped: bool,
}

struct Active {
    shared: Arc<Mutex<Shared>>,
    task: JoinHandle<()>,
    width: usize,
}

/// Animated one-line indicator. Stopping (or dropping) it erases the line.
pub struct Spinner {
    active: Option<Active>,
}

impl Spinner {
    /// Start on stderr when `enabled`; otherwise a no-op.
    pub fn start(message: &str, enabled: bool) -> Self {
        if !enabled {
            return Self { active: None };
        }
        Self::start_on(Box::new(std::io::stderr()), message, true)
    }

    fn start_on(out: Box<dyn Write + Send>, message: &str, styled: bool) -> Self {
        let shared = Arc::new(Mutex::new(Shared {
            out,
            drawn: false,
            stopped: false,
        }));
        let text = message.to_string();
        let task = tokio::spawn({
            let shared = Arc::clone(&shared);
            async move {
                let mut ticker = tokio::time::interval(FRAME_INTERVAL);
                for frame in FRAMES.iter().cycle() {
                    ticker.tick().await;
                    if !draw(&shared, &frame_line(frame, &text, styled)) {
                        return;
                    }
                }
            }
        });
        Self {
            active: Some(Active {
                shared,
                task,
                width: message.chars().count() + 2,
            }),
        }
    }

    /// Stop animating and erase the line. Safe to call more than once.
    pub fn stop(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        if let Ok(mut guard) = active.shared.lock() {
            guard.stopped = true;
            if guard.drawn {
                let clear = format!("\r{}\r", " ".repeat(active.width));
                let _ = write_flush(&mut *guard.out, &clear);
            }
        }
        active.task.abort();
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Write one frame unless the spinner was stopped. Returns whether to keep
/// animating.
fn draw(shared: &Mutex<Shared>, line: &str) -> bool {
    let Ok(mut guard) = shared.lock() else {
        return false;
    };
    if guard.stopped || write_flush(&mut *guard.out, line).is_err() {
        return false;
    }
    guard.drawn = true;
    true
}

fn frame_line(frame: &str, text: &str, styled: bool) -> String {
    if styled {
        format!("\r{} {}", frame.cyan(), text.dimmed())
    } else {
        format!("\r{frame} {text}")
    }
}

fn write_flush(out: &mut dyn Write, s: &str) -> std::io::Result<()> {
    out.write_all(s.as_bytes())?;
    out.flush()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Capture {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[tokio::test]
    async fn draws_until_stopped_then_clears_the_line() {
        let capture = Capture::default();
        let mut spinner = Spinner::start_on(Box::new(capture.clone()), "Searching...", false);
        tokio::time::sleep(Duration::from_millis(250)).await;
        spinner.stop();

        let drawn = capture.text();
        assert!(drawn.starts_with("\r⠋ Searching..."), "{drawn:?}");
        assert!(drawn.contains("\r⠙ Searching..."), "{drawn:?}");
        assert!(drawn.ends_with(&format!("\r{}\r", " ".repeat(14))), "{drawn:?}");

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(capture.text(), drawn);
        spinner.stop();
        assert_eq!(capture.text(), drawn);
    }

    #[tokio::test]
    async fn stopping_before_the_first_frame_writes_nothing() {
        let capture = Capture::default();
        let mut spinner = Spinner::start_on(Box::new(capture.clone()), "Thinking deeply...", false);
        spinner.stop();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(capture.text(), "");
    }

    #[test]
    fn disabled_spinner_is_inert() {
        let mut spinner = Spinner::start("Searching...", false);
        assert!(spinner.active.is_none());
        spinner.stop();
    }

    #[test]
    fn styled_frame_keeps_the_text() {
        let line = frame_line("⠋", "Researching...", true);
        assert!(line.contains('\u{1b}'));
        assert!(line.contains("Researching..."));
        assert_eq!(frame_line("⠋", "Researching...", false), "\r⠋ Researching...");
    }
}
