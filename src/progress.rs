use crate::error::Stage;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressEvent {
    pub stage: Stage,
    pub fraction: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running(Stage),
    Done,
    Cancelled,
    Failed(Stage),
}

pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, event: ProgressEvent);

    fn on_state(&self, _state: RunState) {}

    fn on_warning(&self, _message: &str) {}
}

pub struct NullSink;

impl ProgressSink for NullSink {
    fn on_progress(&self, _event: ProgressEvent) {}
}

const BAR_TICKS: u64 = 1000;

fn create_progress_bar(len: u64, title: impl Into<String>) -> ProgressBar {
    ProgressBar::new(len)
        .with_message(title.into())
        .with_style(
            ProgressStyle::default_bar()
                .template("{msg}\n[{bar:40.cyan/blue}] {percent}% • {elapsed_precise} (ETA: {eta})")
                .unwrap()
                .progress_chars("=>-"),
        )
}

pub struct ConsoleSink {
    active: Mutex<Option<(Stage, ProgressBar)>>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self {
            active: Mutex::new(None),
        }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ConsoleSink {
    fn on_progress(&self, event: ProgressEvent) {
        let mut active = self.active.lock().unwrap();

        let stale = !matches!(&*active, Some((stage, _)) if *stage == event.stage);
        if stale {
            if let Some((_, bar)) = active.take() {
                bar.finish();
            }
            *active = Some((
                event.stage,
                create_progress_bar(BAR_TICKS, event.stage.name()),
            ));
        }

        if let Some((_, bar)) = &*active {
            bar.set_position((event.fraction.clamp(0.0, 1.0) * BAR_TICKS as f64) as u64);
            if event.fraction >= 1.0 {
                bar.finish();
            }
        }
    }

    fn on_state(&self, state: RunState) {
        if matches!(
            state,
            RunState::Done | RunState::Cancelled | RunState::Failed(_)
        ) {
            if let Some((_, bar)) = self.active.lock().unwrap().take() {
                bar.abandon();
            }
        }
    }

    fn on_warning(&self, message: &str) {
        let active = self.active.lock().unwrap();
        match &*active {
            Some((_, bar)) => bar.println(format!("warning: {message}")),
            None => eprintln!("warning: {message}"),
        }
    }
}

// Per-stage handle threaded through the stage functions.
pub struct Progress<'a> {
    sink: &'a dyn ProgressSink,
    stage: Stage,
}

impl<'a> Progress<'a> {
    pub fn start(sink: &'a dyn ProgressSink, stage: Stage) -> Self {
        sink.on_state(RunState::Running(stage));
        sink.on_progress(ProgressEvent {
            stage,
            fraction: 0.0,
        });
        Self { sink, stage }
    }

    pub fn update(&self, fraction: f64) {
        self.sink.on_progress(ProgressEvent {
            stage: self.stage,
            fraction,
        });
    }

    pub fn warn(&self, message: &str) {
        self.sink.on_warning(message);
    }

    pub fn finish(&self) {
        self.update(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RecordingSink {
        events: StdMutex<Vec<ProgressEvent>>,
        warnings: StdMutex<Vec<String>>,
    }

    impl ProgressSink for RecordingSink {
        fn on_progress(&self, event: ProgressEvent) {
            self.events.lock().unwrap().push(event);
        }

        fn on_warning(&self, message: &str) {
            self.warnings.lock().unwrap().push(message.to_string());
        }
    }

    #[test]
    fn stage_handle_emits_start_and_finish() {
        let sink = RecordingSink::default();

        let progress = Progress::start(&sink, Stage::Sampling);
        progress.update(0.5);
        progress.warn("gap pixels");
        progress.finish();

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].fraction, 0.0);
        assert_eq!(events[1].fraction, 0.5);
        assert_eq!(events[2].fraction, 1.0);
        assert!(events.iter().all(|e| e.stage == Stage::Sampling));

        assert_eq!(sink.warnings.lock().unwrap().as_slice(), ["gap pixels"]);
    }
}
