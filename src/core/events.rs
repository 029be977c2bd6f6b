//! Caller-supplied observability for the pipeline and the segmenter.
//!
//! Processing code never reaches for a global logger. Instead every entry
//! point that can report progress or data-shape warnings takes a
//! `&dyn EventSink`, so independent callers can process curves side by side
//! and route the events wherever they like.

use std::cell::RefCell;
use std::fmt;

use log::{debug, warn};

/// Something worth reporting while processing a curve or a recording.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessingEvent {
    /// Replay applied one queued operation.
    OperationApplied {
        index: usize,
        operation: String,
        len: usize,
    },
    /// Odd-length data had to lose its last sample. Processing continues.
    DataShapeWarning {
        context: String,
        len: usize,
        dropped: usize,
    },
    /// An x-unit symmetry reference was resolved to an index.
    SymmetryResolved {
        reference: String,
        index: usize,
        value: f64,
    },
    /// The segmenter found one field segment.
    SegmentDetected { field: f64, start: usize, end: usize },
}

impl ProcessingEvent {
    /// True for events that signal a non-fatal data problem.
    pub fn is_warning(&self) -> bool {
        matches!(self, ProcessingEvent::DataShapeWarning { .. })
    }
}

impl fmt::Display for ProcessingEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessingEvent::OperationApplied {
                index,
                operation,
                len,
            } => write!(f, "step {}: {} -> {} samples", index + 1, operation, len),
            ProcessingEvent::DataShapeWarning {
                context,
                len,
                dropped,
            } => write!(
                f,
                "{context}: odd length {len}, dropped {dropped} trailing sample(s)"
            ),
            ProcessingEvent::SymmetryResolved {
                reference,
                index,
                value,
            } => write!(f, "{reference} resolved to index {index} (x = {value})"),
            ProcessingEvent::SegmentDetected { field, start, end } => {
                write!(f, "field {field}: samples {start}..{end}")
            }
        }
    }
}

/// Receiver for [`ProcessingEvent`]s.
pub trait EventSink {
    fn emit(&self, event: ProcessingEvent);
}

impl<F> EventSink for F
where
    F: Fn(ProcessingEvent),
{
    fn emit(&self, event: ProcessingEvent) {
        self(event)
    }
}

/// Forwards events to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: ProcessingEvent) {
        if event.is_warning() {
            warn!("{}", event);
        } else {
            debug!("{}", event);
        }
    }
}

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: ProcessingEvent) {}
}

/// Collects events in memory.
#[derive(Debug, Default)]
pub struct EventLog {
    events: RefCell<Vec<ProcessingEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything received so far.
    pub fn events(&self) -> Vec<ProcessingEvent> {
        self.events.borrow().clone()
    }

    pub fn warnings(&self) -> Vec<ProcessingEvent> {
        self.events
            .borrow()
            .iter()
            .filter(|e| e.is_warning())
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

impl EventSink for EventLog {
    fn emit(&self, event: ProcessingEvent) {
        self.events.borrow_mut().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_event_log_collects_in_order() {
        let log = EventLog::new();
        log.emit(ProcessingEvent::SegmentDetected {
            field: 1.0,
            start: 0,
            end: 2,
        });
        log.emit(ProcessingEvent::DataShapeWarning {
            context: "delta method".to_string(),
            len: 5,
            dropped: 1,
        });

        assert_eq!(log.events().len(), 2);
        assert_eq!(log.warnings().len(), 1);
        assert!(log.events()[1].is_warning());

        log.clear();
        assert!(log.events().is_empty());
    }

    #[test]
    fn test_closure_sink() {
        let count = Cell::new(0);
        let sink = |_event: ProcessingEvent| count.set(count.get() + 1);
        sink.emit(ProcessingEvent::SegmentDetected {
            field: 2.0,
            start: 2,
            end: 5,
        });
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_display() {
        let event = ProcessingEvent::OperationApplied {
            index: 0,
            operation: "average_up_down".to_string(),
            len: 10,
        };
        assert_eq!(event.to_string(), "step 1: average_up_down -> 10 samples");
    }
}
