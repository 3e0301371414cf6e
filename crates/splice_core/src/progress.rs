use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Event emitted while a transform runs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum ProgressEvent {
    /// Seconds of output produced so far.
    Elapsed(f64),
    Done,
}

/// Sending half handed to the media provider. Sends never block, and fail
/// silently once the receiver is gone.
pub type ProgressSink = mpsc::UnboundedSender<ProgressEvent>;
pub type ProgressStream = mpsc::UnboundedReceiver<ProgressEvent>;

pub fn progress_channel() -> (ProgressSink, ProgressStream) {
    mpsc::unbounded_channel()
}

/// Forward an event, ignoring a disconnected listener.
pub fn report(sink: Option<&ProgressSink>, event: ProgressEvent) {
    if let Some(sink) = sink {
        let _ = sink.send(event);
    }
}

/// Fraction of `total` covered by `elapsed`, clamped to `[0, 1]`.
pub fn fraction(elapsed: f64, total: f64) -> f64 {
    if total > 0.0 {
        (elapsed / total).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_arrive_in_order() {
        let (tx, mut rx) = progress_channel();
        report(Some(&tx), ProgressEvent::Elapsed(1.0));
        report(Some(&tx), ProgressEvent::Elapsed(2.5));
        report(Some(&tx), ProgressEvent::Done);

        assert_eq!(rx.try_recv().unwrap(), ProgressEvent::Elapsed(1.0));
        assert_eq!(rx.try_recv().unwrap(), ProgressEvent::Elapsed(2.5));
        assert_eq!(rx.try_recv().unwrap(), ProgressEvent::Done);
    }

    #[test]
    fn dropped_listener_is_harmless() {
        let (tx, rx) = progress_channel();
        drop(rx);
        report(Some(&tx), ProgressEvent::Elapsed(1.0));
        report(None, ProgressEvent::Done);
    }

    #[test]
    fn fraction_clamps() {
        assert!((fraction(5.0, 10.0) - 0.5).abs() < f64::EPSILON);
        assert_eq!(fraction(12.0, 10.0), 1.0);
        assert_eq!(fraction(1.0, 0.0), 0.0);
    }
}
