//! Object detector abstraction.
//!
//! The `Detector` trait decouples the frame controller from any specific
//! backend (stub, scripted replay, TFLite, ONNX, etc.). The core only
//! consumes the output contract: a set of `Detection`s per frame.
//!
//! `&mut self` on `infer` expresses that backends may hold interpreter
//! state. All mutation is serialised through `DetectorHandle`'s
//! `parking_lot::Mutex`.

pub mod stub;

pub use stub::{ScriptedDetector, StubDetector};

use std::sync::Arc;

use parking_lot::Mutex;

use crate::detection::Detection;
use crate::error::Result;

/// One image delivered by the frame source.
///
/// The pixel layout is opaque to the core; only the detector interprets it.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    /// Position of this frame in the source stream, starting at 0.
    pub seq: u64,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(seq: u64, width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            seq,
            width,
            height,
            data,
        }
    }

    /// A frame with no pixel payload, for backends that ignore the image.
    pub fn empty(seq: u64) -> Self {
        Self {
            seq,
            ..Self::default()
        }
    }
}

/// Contract for object detection backends.
pub trait Detector: Send + 'static {
    /// Run detection on one frame.
    ///
    /// # Returns
    /// Detections in the detector's coordinate space. May be empty.
    ///
    /// # Errors
    /// Returns an error if no model is loaded or inference fails. The frame
    /// controller degrades any error to an empty detection set.
    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>>;
}

/// Thread-safe reference-counted handle to any `Detector` implementor.
#[derive(Clone)]
pub struct DetectorHandle(pub Arc<Mutex<dyn Detector>>);

impl DetectorHandle {
    /// Wrap any `Detector` in a `DetectorHandle`.
    pub fn new<D: Detector>(detector: D) -> Self {
        Self(Arc::new(Mutex::new(detector)))
    }

    pub fn infer(&self, frame: &Frame) -> Result<Vec<Detection>> {
        self.0.lock().infer(frame)
    }
}

impl std::fmt::Debug for DetectorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectorHandle").finish_non_exhaustive()
    }
}
