//! Trajectory buffer and smoothing.
//!
//! The buffer is a bounded double-ended queue of per-frame records, newest
//! at the front, oldest at the back. It plays two roles at once: it is the
//! lookahead required to emit the frame centered in the smoothing window,
//! and it carries the incremental running sum that keeps the windowed
//! average O(1) per step instead of an O(W) recompute.

use std::collections::VecDeque;

use tracing::debug;

use crate::filter::MotionFilter;
use crate::io::RigidEstimator;
use crate::transform::Transform;

/// One buffered frame with its three cumulative poses.
///
/// `sensor` is the raw measured pose, `camera` the filtered pose, and
/// `apparent` the smoothed pose the compensating warp is computed from.
/// A new record inherits the previous front's cumulative poses (zero for
/// the first frame); `sensor` and `camera` are written once at ingestion,
/// `apparent` when smoothing is computed and again when the record is
/// emitted.
#[derive(Debug, Clone)]
pub struct FrameRecord<I> {
    /// Raw decoded frame.
    pub image: I,
    /// Cumulative raw measured pose.
    pub sensor: Transform,
    /// Cumulative filtered pose.
    pub camera: Transform,
    /// Cumulative smoothed pose.
    pub apparent: Transform,
}

/// Trajectory smoothing mode, selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SmoothingMode {
    /// Exponential moving average with factor `alpha` in `(0, 1]`.
    ///
    /// Needs only the immediately preceding frame, so the buffer keeps a
    /// depth of two and frames are emitted without lag.
    LowPass {
        /// Smoothing factor; `1.0` makes the apparent pose track the
        /// camera pose exactly.
        alpha: f64,
    },
    /// Running mean of the last `window` cumulative camera poses.
    ///
    /// The emitted frame is the one centered in the window, `window / 2`
    /// positions behind the newest: a fixed output lag traded for
    /// centered smoothing.
    Windowed {
        /// Number of camera-pose samples in the running mean.
        window: usize,
    },
}

/// Bounded lookahead queue of [`FrameRecord`]s.
#[derive(Debug)]
pub struct TrajectoryBuffer<I> {
    frames: VecDeque<FrameRecord<I>>,
    mode: SmoothingMode,
    /// Running sum of the camera poses inside the window (windowed mode).
    window_sum: Transform,
}

impl<I> TrajectoryBuffer<I> {
    /// Create an empty buffer for the given smoothing mode.
    pub fn new(mode: SmoothingMode) -> Self {
        Self {
            frames: VecDeque::new(),
            mode,
            window_sum: Transform::default(),
        }
    }

    /// Number of buffered records.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the buffer holds no records.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Smoothing mode this buffer was created with.
    pub fn mode(&self) -> SmoothingMode {
        self.mode
    }

    /// Records retained after [`advance`](Self::advance).
    ///
    /// Windowed mode keeps the window's W camera samples (at least two, so
    /// registration always has a predecessor); low-pass mode keeps two.
    /// One extra record is present transiently between ingest and advance.
    pub fn retained_depth(&self) -> usize {
        match self.mode {
            SmoothingMode::LowPass { .. } => 2,
            SmoothingMode::Windowed { window } => window.max(2),
        }
    }

    /// Distance of the emission slot from the front.
    pub fn emission_offset(&self) -> usize {
        match self.mode {
            SmoothingMode::LowPass { .. } => 0,
            SmoothingMode::Windowed { window } => window / 2,
        }
    }

    /// Whether a record currently occupies the emission slot.
    pub fn ready_to_emit(&self) -> bool {
        self.frames.len() > self.emission_offset()
    }

    /// Record currently in the emission slot.
    pub fn emission_record(&self) -> Option<&FrameRecord<I>> {
        self.frames.get(self.emission_offset())
    }

    /// Mutable record in the emission slot (the emitted record's apparent
    /// pose is refreshed at emission time).
    pub fn emission_record_mut(&mut self) -> Option<&mut FrameRecord<I>> {
        let offset = self.emission_offset();
        self.frames.get_mut(offset)
    }

    /// Newest record, if any.
    pub fn front(&self) -> Option<&FrameRecord<I>> {
        self.frames.front()
    }

    /// Push a new capture to the front, inheriting the cumulative poses of
    /// the previous front (zero for the first frame).
    pub fn ingest(&mut self, image: I) {
        let (sensor, camera, apparent) = match self.frames.front() {
            Some(prev) => (prev.sensor, prev.camera, prev.apparent),
            None => Default::default(),
        };
        self.frames.push_front(FrameRecord {
            image,
            sensor,
            camera,
            apparent,
        });
    }

    /// Register the two frontmost frames and accumulate the new front's
    /// sensor and camera poses.
    ///
    /// No-op until two frames are buffered. A failed registration is
    /// replaced by the identity motion; it never stops the pipeline. The
    /// filter is driven predict-then-correct exactly once per call.
    pub fn compute_transformation(
        &mut self,
        filter: &mut MotionFilter,
        estimator: &mut dyn RigidEstimator<I>,
    ) {
        if self.frames.len() < 2 {
            return;
        }

        let sensor_delta = {
            let prev = &self.frames[1];
            let next = &self.frames[0];
            match estimator.estimate(&prev.image, &next.image) {
                Some(delta) => delta,
                None => {
                    debug!("registration failed, substituting identity motion");
                    Transform::default()
                }
            }
        };

        filter.predict();
        let camera_delta = Transform::from_vector(&filter.correct(&sensor_delta.to_vector()));

        let (prev_sensor, prev_camera) = {
            let prev = &self.frames[1];
            (prev.sensor, prev.camera)
        };
        let next = &mut self.frames[0];
        next.sensor = prev_sensor + sensor_delta;
        next.camera = prev_camera + camera_delta;
    }

    /// Evict the oldest record once the retained depth is exceeded, after
    /// updating the incremental window bookkeeping.
    ///
    /// In windowed mode the camera sample aging past the window (the one
    /// ingested W steps before the current front) leaves the running sum
    /// here, before its record is dropped.
    pub fn advance(&mut self) {
        if let SmoothingMode::Windowed { window } = self.mode {
            if self.frames.len() > window {
                self.window_sum -= self.frames[window].camera;
            }
        }
        while self.frames.len() > self.retained_depth() {
            self.frames.pop_back();
        }
    }

    /// Apply the configured smoothing formula to the newest record.
    ///
    /// Low-pass: `apparent = prev_apparent + alpha * (camera -
    /// prev_apparent)`. Windowed: the new camera sample joins the running
    /// sum and the apparent pose is `sum / W`; at steady state this equals
    /// the arithmetic mean of the last W cumulative camera poses. During
    /// the first W steps the missing samples behave as the zero rest pose.
    pub fn compute_apparent(&mut self) {
        match self.mode {
            SmoothingMode::LowPass { alpha } => {
                if self.frames.len() < 2 {
                    return;
                }
                let prev_apparent = self.frames[1].apparent;
                let camera = self.frames[0].camera;
                self.frames[0].apparent = prev_apparent + (camera - prev_apparent) * alpha;
            }
            SmoothingMode::Windowed { window } => {
                if let Some(front) = self.frames.front() {
                    self.window_sum += front.camera;
                }
                let apparent = self.window_sum / window as f64;
                if let Some(front) = self.frames.front_mut() {
                    front.apparent = apparent;
                }
            }
        }
    }

    /// Current smoothed pose.
    pub fn smoothed(&self) -> Transform {
        match self.mode {
            SmoothingMode::LowPass { .. } => self
                .frames
                .front()
                .map(|f| f.apparent)
                .unwrap_or_default(),
            SmoothingMode::Windowed { window } => self.window_sum / window as f64,
        }
    }
}

impl<I: Clone> TrajectoryBuffer<I> {
    /// Push a synthetic record repeating the newest frame's image and
    /// cumulative poses. Used while draining at end of stream, where the
    /// last known camera pose keeps feeding the window.
    pub fn synthesize_repeat(&mut self) {
        if let Some(front) = self.frames.front() {
            let repeat = front.clone();
            self.frames.push_front(repeat);
        }
    }
}
