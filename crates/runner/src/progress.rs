// SPDX-License-Identifier: Apache-2.0
//! Parses UE log lines for render/encoding progress and pushes throttled
//! updates back to the outer scheduler's frame-state override API.

use std::sync::OnceLock;
use std::time::Instant;

use regex::Regex;

/// Fixed display colour for progress overrides (R, G, B).
pub const PROGRESS_COLOR: (u8, u8, u8) = (80, 170, 255);

const DUPLICATE_PERCENT_DELTA: f64 = 0.5;
const DUPLICATE_WINDOW_SECS: f64 = 2.0;

// Pattern is a fixed literal validated here; it cannot fail at runtime.
#[allow(clippy::unwrap_used)]
fn render_progress_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\[OpenCueCmdExecutor\]\s*Render progress:\s*([0-9]+(?:\.[0-9]+)?)%").unwrap())
}

// Pattern is a fixed literal validated here; it cannot fail at runtime.
#[allow(clippy::unwrap_used)]
fn encoding_progress_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\[OpenCueCmdExecutor\]\s*Encoding progress:\s*([0-9]+(?:\.[0-9]+)?)%").unwrap())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Rendering,
    Encoding,
}

impl Stage {
    fn as_str(self) -> &'static str {
        match self {
            Stage::Rendering => "Rendering",
            Stage::Encoding => "Encoding",
        }
    }
}

/// Extracts `(stage, percent)` from a single UE log line, if present.
pub fn parse_progress_line(line: &str) -> Option<(Stage, f64)> {
    if let Some(captures) = render_progress_re().captures(line) {
        return captures[1].parse().ok().map(|p| (Stage::Rendering, p));
    }
    if let Some(captures) = encoding_progress_re().captures(line) {
        return captures[1].parse().ok().map(|p| (Stage::Encoding, p));
    }
    None
}

/// A pluggable sink for progress overrides, implemented by the Cue
/// frame-state client in production and a recording stub in tests.
pub trait ProgressSink {
    fn set_frame_state_override(&mut self, text: &str, color: (u8, u8, u8)) -> Result<(), String>;
}

/// Reports de-duplicated, throttled progress updates to a [`ProgressSink`].
///
/// Activated only when constructed with `Some(sink)` (i.e. a frame id
/// was supplied); otherwise every call is a no-op. Any sink error
/// latches the reporter off for the remainder of the process.
pub struct ProgressReporter<S: ProgressSink> {
    sink: Option<S>,
    last_stage: Option<Stage>,
    last_percent: f64,
    last_update: Option<Instant>,
}

impl<S: ProgressSink> ProgressReporter<S> {
    pub fn new(sink: Option<S>) -> Self {
        Self { sink, last_stage: None, last_percent: -1.0, last_update: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    pub fn report_from_line(&mut self, line: &str) {
        if let Some((stage, percent)) = parse_progress_line(line) {
            self.report(stage, percent);
        }
    }

    pub fn report(&mut self, stage: Stage, percent: f64) {
        let Some(sink) = self.sink.as_mut() else { return };

        let normalized = percent.clamp(0.0, 100.0);
        let now = Instant::now();

        if self.last_stage == Some(stage) && self.last_percent >= 0.0 {
            let delta = (normalized - self.last_percent).abs();
            let elapsed = self.last_update.map(|t| now.duration_since(t).as_secs_f64()).unwrap_or(f64::MAX);
            if delta < DUPLICATE_PERCENT_DELTA && elapsed < DUPLICATE_WINDOW_SECS {
                return;
            }
        }

        let text = format!("{} {:.1}%", stage.as_str(), normalized);
        match sink.set_frame_state_override(&text, PROGRESS_COLOR) {
            Ok(()) => {
                self.last_stage = Some(stage);
                self.last_percent = normalized;
                self.last_update = Some(now);
            }
            Err(err) => {
                tracing::warn!(error = %err, "progress sync disabled after push failure");
                self.sink = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        calls: Vec<String>,
        fail_next: bool,
    }

    impl ProgressSink for RecordingSink {
        fn set_frame_state_override(&mut self, text: &str, _color: (u8, u8, u8)) -> Result<(), String> {
            if self.fail_next {
                return Err("boom".to_string());
            }
            self.calls.push(text.to_string());
            Ok(())
        }
    }

    #[test]
    fn parses_render_and_encoding_lines() {
        assert_eq!(parse_progress_line("[OpenCueCmdExecutor] Render progress: 42%"), Some((Stage::Rendering, 42.0)));
        assert_eq!(
            parse_progress_line("[OpenCueCmdExecutor] Encoding progress: 7.5%"),
            Some((Stage::Encoding, 7.5))
        );
        assert_eq!(parse_progress_line("unrelated log line"), None);
    }

    #[test]
    fn disabled_reporter_is_a_no_op() {
        let mut reporter = ProgressReporter::<RecordingSink>::new(None);
        reporter.report(Stage::Rendering, 50.0);
        assert!(!reporter.is_enabled());
    }

    #[test]
    fn suppresses_small_fast_duplicate_updates() {
        let mut reporter = ProgressReporter::new(Some(RecordingSink::default()));
        reporter.report(Stage::Rendering, 50.0);
        reporter.report(Stage::Rendering, 50.2);
        let sink = reporter.sink.as_ref().unwrap();
        assert_eq!(sink.calls.len(), 1);
    }

    #[test]
    fn emits_update_when_delta_exceeds_threshold() {
        let mut reporter = ProgressReporter::new(Some(RecordingSink::default()));
        reporter.report(Stage::Rendering, 50.0);
        reporter.report(Stage::Rendering, 51.0);
        let sink = reporter.sink.as_ref().unwrap();
        assert_eq!(sink.calls.len(), 2);
    }

    #[test]
    fn sink_failure_latches_reporter_off() {
        let mut reporter = ProgressReporter::new(Some(RecordingSink { fail_next: true, ..Default::default() }));
        reporter.report(Stage::Rendering, 50.0);
        assert!(!reporter.is_enabled());
    }
}
