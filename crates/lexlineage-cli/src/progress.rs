//! Run progress on stderr, so stdout stays parseable for scripts.

use std::io::Write;

use clap::ValueEnum;
use lexlineage_engine::ProgressEvent;

/// Receives every progress event of a run, in order.
pub trait RunReporter: Send + Sync {
    fn report(&self, event: &ProgressEvent);
}

/// Human-friendly lines: `14:02:11  42% grouping           batch 3/7 (punjab) grouped by oracle`.
pub struct StderrProgress;

impl RunReporter for StderrProgress {
    fn report(&self, event: &ProgressEvent) {
        let line = human_line(event);
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err, "{line}");
        let _ = err.flush();
    }
}

/// One JSON object per line.
pub struct JsonProgress;

impl RunReporter for JsonProgress {
    fn report(&self, event: &ProgressEvent) {
        if let Ok(line) = serde_json::to_string(event) {
            let mut err = std::io::stderr().lock();
            let _ = writeln!(err, "{line}");
            let _ = err.flush();
        }
    }
}

pub struct NoProgress;

impl RunReporter for NoProgress {
    fn report(&self, _event: &ProgressEvent) {}
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ProgressFormat {
    Human,
    Json,
    Off,
}

impl ProgressFormat {
    pub fn reporter(&self) -> Box<dyn RunReporter> {
        match self {
            ProgressFormat::Human => Box::new(StderrProgress),
            ProgressFormat::Json => Box::new(JsonProgress),
            ProgressFormat::Off => Box::new(NoProgress),
        }
    }
}

fn human_line(event: &ProgressEvent) -> String {
    let mut line = format!(
        "{} {:>3}% {:<17} {}",
        event.at.format("%H:%M:%S"),
        event.percent_complete,
        event.status.as_str(),
        event.message
    );
    if let Some(error) = &event.error {
        line.push_str(&format!(" (error: {error})"));
    }
    line
}

/// `1234567` → `1,234,567`.
pub fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}
