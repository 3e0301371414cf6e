use indicatif::{ProgressBar, ProgressStyle};
use splice_core::progress::{fraction, progress_channel, ProgressEvent, ProgressSink};
use std::time::Duration;
use tokio::task::JoinHandle;

const STEPS: u64 = 1000;

/// Show a progress bar for a render of `total` seconds. The bar closes when
/// `Done` arrives or the sink is dropped.
pub fn progress_bar(total: f64, message: &str) -> (ProgressSink, JoinHandle<()>) {
    let (tx, mut rx) = progress_channel();
    let pb = ProgressBar::new(STEPS);
    pb.set_style(progress_style());
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));

    let handle = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                ProgressEvent::Elapsed(elapsed) => {
                    pb.set_position((fraction(elapsed, total) * STEPS as f64) as u64);
                }
                ProgressEvent::Done => break,
            }
        }
        pb.finish_and_clear();
    });
    (tx, handle)
}

fn progress_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {percent}% | ETA: {eta} | {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("#>-")
}
