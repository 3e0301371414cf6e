//! In-memory media provider for unit tests.
//!
//! A "video" is a JSON file holding its `StreamInfo`. Rendering writes the
//! first input's metadata with the expected duration to the output.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};

use crate::error::{CoreError, Result};
use crate::graph::TransformGraph;
use crate::progress::{report, ProgressEvent};
use crate::provider::{MediaProvider, RenderRequest};
use crate::types::{Rational, StreamInfo};

#[derive(Debug, Clone)]
pub struct RecordedRender {
    pub graph: TransformGraph,
    pub output: PathBuf,
    pub overwrite: bool,
    pub expected_duration: Option<f64>,
}

#[derive(Default)]
pub struct FakeProvider {
    probes: AtomicUsize,
    renders: Mutex<Vec<RecordedRender>>,
    fail: AtomicBool,
    crash: AtomicBool,
    gate: Option<Gate>,
}

/// Holds renders until released, so a test can observe a job in flight.
#[derive(Default)]
struct Gate {
    state: Mutex<GateState>,
    cond: Condvar,
}

#[derive(Default)]
struct GateState {
    entered: bool,
    open: bool,
}

impl FakeProvider {
    pub fn gated() -> Self {
        Self {
            gate: Some(Gate::default()),
            ..Self::default()
        }
    }

    pub fn fail_renders(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Make renders write a truncated output and then panic, like a worker
    /// that dies mid-write.
    pub fn crash_renders(&self) {
        self.crash.store(true, Ordering::SeqCst);
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn renders(&self) -> Vec<RecordedRender> {
        self.renders.lock().unwrap().clone()
    }

    /// True once a render is blocked on the gate.
    pub fn render_entered(&self) -> bool {
        self.gate
            .as_ref()
            .is_some_and(|g| g.state.lock().unwrap().entered)
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.state.lock().unwrap().open = true;
            gate.cond.notify_all();
        }
    }

    fn wait_for_gate(&self) {
        if let Some(gate) = &self.gate {
            let mut state = gate.state.lock().unwrap();
            state.entered = true;
            while !state.open {
                state = gate.cond.wait(state).unwrap();
            }
        }
    }
}

impl MediaProvider for FakeProvider {
    fn probe(&self, path: &Path) -> Result<StreamInfo> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        let data = std::fs::read_to_string(path).map_err(|e| CoreError::Probe(e.to_string()))?;
        serde_json::from_str(&data).map_err(|e| CoreError::Probe(e.to_string()))
    }

    fn render(&self, request: RenderRequest<'_>) -> Result<()> {
        self.wait_for_gate();
        self.renders.lock().unwrap().push(RecordedRender {
            graph: request.graph.clone(),
            output: request.output.to_path_buf(),
            overwrite: request.overwrite,
            expected_duration: request.expected_duration,
        });

        if self.crash.load(Ordering::SeqCst) {
            std::fs::write(request.output, b"half-written").unwrap();
            panic!("render worker died");
        }
        if self.fail.load(Ordering::SeqCst) {
            std::fs::write(request.output, b"partial").unwrap();
            report(request.progress.as_ref(), ProgressEvent::Done);
            return Err(CoreError::Transform("fake render failure".into()));
        }

        let mut info = self.probe(&request.graph.inputs[0])?;
        if let Some(duration) = request.expected_duration {
            info.duration = duration;
            report(request.progress.as_ref(), ProgressEvent::Elapsed(duration));
        }
        std::fs::write(request.output, serde_json::to_string(&info).unwrap()).unwrap();
        report(request.progress.as_ref(), ProgressEvent::Done);
        Ok(())
    }
}

pub fn stream(width: u32, height: u32, duration: f64) -> StreamInfo {
    StreamInfo {
        width,
        height,
        fps: 25,
        sample_aspect_ratio: Rational::ONE,
        duration,
    }
}

/// Write a fake source video and return its path.
pub fn write_source(dir: &Path, name: &str, info: &StreamInfo) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, serde_json::to_string(info).unwrap()).unwrap();
    path
}
