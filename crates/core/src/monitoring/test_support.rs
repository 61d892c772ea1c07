//! Port stubs shared by the monitoring tests.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use crate::monitoring::domain::detection_job::DetectionJob;
use crate::recognition::domain::face_encoding::FaceEncoding;
use crate::recognition::domain::face_recognizer::{
    DetectedFace, FaceRecognizer, RecognizerFactory,
};
use crate::shared::frame::Frame;
use crate::shared::region::Region;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::{VideoReader, VideoReaderFactory};

pub const FRAME_SIDE: u32 = 4;

/// The reference person.
pub fn target() -> Vec<f32> {
    vec![1.0, 0.0, 0.0]
}

/// Someone else entirely (cosine distance 1.0 from the target).
pub fn stranger() -> Vec<f32> {
    vec![0.0, 1.0, 0.0]
}

pub fn face(encoding: Vec<f32>) -> DetectedFace {
    DetectedFace {
        region: Region {
            x: 0,
            y: 0,
            width: 2,
            height: 2,
            confidence: 0.9,
        },
        encoding: FaceEncoding::new(encoding),
    }
}

/// Synthetic video of flat frames.
#[derive(Clone)]
pub struct StubReader {
    pub frame_count: usize,
    pub fps: f64,
    pub unreadable: bool,
    /// Frames from this index on fail to decode.
    pub corrupt_from: Option<usize>,
    pub closes: Arc<AtomicUsize>,
}

impl StubReader {
    pub fn new(frame_count: usize, fps: f64) -> Self {
        Self {
            frame_count,
            fps,
            unreadable: false,
            corrupt_from: None,
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl VideoReader for StubReader {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        if self.unreadable {
            return Err(format!("cannot open {}", path.display()).into());
        }
        Ok(VideoMetadata {
            width: FRAME_SIDE,
            height: FRAME_SIDE,
            fps: self.fps,
            total_frames: self.frame_count,
            codec: "stub".into(),
            source_path: Some(path.to_path_buf()),
        })
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        let corrupt_from = self.corrupt_from;
        Box::new((0..self.frame_count).map(move |i| {
            if corrupt_from.is_some_and(|c| i >= c) {
                return Err("corrupt packet".into());
            }
            let side = FRAME_SIDE as usize;
            Ok(Frame::new(vec![0u8; side * side * 3], FRAME_SIDE, FRAME_SIDE, i))
        }))
    }

    fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

impl VideoReaderFactory for StubReader {
    fn create(&self) -> Box<dyn VideoReader> {
        Box::new(self.clone())
    }
}

/// Pauses the recognizer on its Nth call until released.
pub struct Gate {
    pub at_call: usize,
    pub reached: Sender<()>,
    pub release: Receiver<()>,
}

/// Test-side handles of a [`Gate`].
pub struct GateHandle {
    pub reached: Receiver<()>,
    pub release: Sender<()>,
}

pub fn gate(at_call: usize) -> (Gate, GateHandle) {
    let (reached_tx, reached_rx) = crossbeam_channel::bounded(1);
    let (release_tx, release_rx) = crossbeam_channel::bounded(1);
    (
        Gate {
            at_call,
            reached: reached_tx,
            release: release_rx,
        },
        GateHandle {
            reached: reached_rx,
            release: release_tx,
        },
    )
}

type Script = Arc<dyn Fn(&Frame) -> Vec<DetectedFace> + Send + Sync>;

/// Recognizer whose faces are a function of the frame.
pub struct ScriptedRecognizer {
    script: Script,
    gate: Option<Gate>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedRecognizer {
    pub fn new(script: impl Fn(&Frame) -> Vec<DetectedFace> + Send + Sync + 'static) -> Self {
        Self {
            script: Arc::new(script),
            gate: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_gate(mut self, gate: Gate) -> Self {
        self.gate = Some(gate);
        self
    }
}

impl FaceRecognizer for ScriptedRecognizer {
    fn detect_and_encode(
        &mut self,
        frame: &Frame,
    ) -> Result<Vec<DetectedFace>, Box<dyn std::error::Error>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(gate) = self.gate.as_ref().filter(|g| g.at_call == call) {
            let _ = gate.reached.send(());
            let _ = gate.release.recv();
        }
        Ok((self.script)(frame))
    }
}

/// Hands out one prepared recognizer, then scripted copies without a gate.
pub struct ScriptedFactory {
    script: Script,
    first: Mutex<Option<ScriptedRecognizer>>,
}

impl ScriptedFactory {
    pub fn new(script: impl Fn(&Frame) -> Vec<DetectedFace> + Send + Sync + 'static) -> Self {
        Self {
            script: Arc::new(script),
            first: Mutex::new(None),
        }
    }

    pub fn gated(
        script: impl Fn(&Frame) -> Vec<DetectedFace> + Send + Sync + 'static,
        gate: Gate,
    ) -> Self {
        let factory = Self::new(script);
        let first = ScriptedRecognizer {
            script: Arc::clone(&factory.script),
            gate: Some(gate),
            calls: Arc::new(AtomicUsize::new(0)),
        };
        *factory.first.lock().unwrap() = Some(first);
        factory
    }
}

impl RecognizerFactory for ScriptedFactory {
    fn create(&self) -> Result<Box<dyn FaceRecognizer>, Box<dyn std::error::Error>> {
        if let Some(first) = self.first.lock().unwrap().take() {
            return Ok(Box::new(first));
        }
        Ok(Box::new(ScriptedRecognizer {
            script: Arc::clone(&self.script),
            gate: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }))
    }
}

/// Polls until the job is terminal or five seconds pass.
pub fn wait_terminal(job: &DetectionJob) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !job.state().is_terminal() {
        assert!(Instant::now() < deadline, "job did not finish: {job:?}");
        std::thread::sleep(Duration::from_millis(2));
    }
}
