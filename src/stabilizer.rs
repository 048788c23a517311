//! Pipeline controller.
//!
//! A [`Stabilizer`] owns all mutable core state for one stream: the
//! lookahead buffer, the motion filter, the emitted-frame counter, and the
//! boxed collaborators. It drives capture -> estimate -> filter -> smooth
//! -> emit synchronously, one full step at a time, through a four-state
//! machine: `Startup` (pre-filling the lookahead), `Streaming` (steady
//! state), `Draining` (end-of-stream flush, windowed mode only), and
//! `Stopped`.

use tracing::{debug, info};

use crate::buffer::{SmoothingMode, TrajectoryBuffer};
use crate::filter::MotionFilter;
use crate::io::{
    Frame, FrameSource, FrameWarper, RigidEstimator, TrajectorySink, VideoSink, Viewer,
    ViewerEvent,
};
use crate::{Error, Result};

/// Stabilizer configuration. Immutable after validation.
#[derive(Debug, Clone, PartialEq)]
pub struct StabilizerConfig {
    /// Number of camera-pose samples in the windowed average; `0` disables
    /// windowed averaging and falls back to exponential smoothing.
    pub window: usize,

    /// Low-pass smoothing factor in `(0, 1]`. Only used when `window` is
    /// zero.
    pub low_pass: f64,

    /// Filter process-error fraction relative to the frame dimensions.
    pub process_error: f64,

    /// Filter measurement-error fraction relative to the frame dimensions.
    pub measurement_error: f64,

    /// Output frame size; `None` keeps the input size.
    pub output_size: Option<(u32, u32)>,

    /// Suppress the interactive viewer.
    pub quiet: bool,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            window: 0,
            low_pass: 0.1,
            process_error: 0.5,
            measurement_error: 0.5,
            output_size: None,
            quiet: false,
        }
    }
}

impl StabilizerConfig {
    fn validate(&self) -> Result<()> {
        if !(self.low_pass > 0.0 && self.low_pass <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "low_pass must be in (0, 1], got {}",
                self.low_pass
            )));
        }
        if self.process_error <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "process_error must be positive, got {}",
                self.process_error
            )));
        }
        if self.measurement_error <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "measurement_error must be positive, got {}",
                self.measurement_error
            )));
        }
        if let Some((w, h)) = self.output_size {
            if w == 0 || h == 0 {
                return Err(Error::InvalidConfig(format!(
                    "output size must be non-zero, got {}x{}",
                    w, h
                )));
            }
        }
        Ok(())
    }

    fn smoothing_mode(&self) -> SmoothingMode {
        if self.window > 0 {
            SmoothingMode::Windowed {
                window: self.window,
            }
        } else {
            SmoothingMode::LowPass {
                alpha: self.low_pass,
            }
        }
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// Frames pulled from the capture source.
    pub frames_read: u64,
    /// Frames emitted (warped, written, logged).
    pub frames_emitted: u64,
    /// Whether the run ended on a user quit rather than stream exhaustion.
    pub quit_requested: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineState {
    Startup,
    Streaming,
    Draining,
    Stopped,
}

/// Single-owner pipeline controller for one stream.
pub struct Stabilizer<I: Frame> {
    config: StabilizerConfig,
    source: Box<dyn FrameSource<I>>,
    estimator: Box<dyn RigidEstimator<I>>,
    warper: Box<dyn FrameWarper<I>>,
    sink: Option<Box<dyn VideoSink<I>>>,
    viewer: Option<Box<dyn Viewer<I>>>,
    trajectory: Option<Box<dyn TrajectorySink>>,

    buffer: TrajectoryBuffer<I>,
    /// Built once the first frame's dimensions are known.
    filter: Option<MotionFilter>,
    /// Resolved from config or the first frame.
    output_size: Option<(u32, u32)>,
    state: PipelineState,
    frames_read: u64,
    frames_emitted: u64,
    drain_remaining: usize,
    quit_requested: bool,
    header_written: bool,
}

impl<I: Frame> Stabilizer<I> {
    /// Create a stabilizer from a validated configuration and the three
    /// required collaborators.
    pub fn new(
        config: StabilizerConfig,
        source: impl FrameSource<I> + 'static,
        estimator: impl RigidEstimator<I> + 'static,
        warper: impl FrameWarper<I> + 'static,
    ) -> Result<Self> {
        config.validate()?;
        let buffer = TrajectoryBuffer::new(config.smoothing_mode());
        let output_size = config.output_size;
        Ok(Self {
            config,
            source: Box::new(source),
            estimator: Box::new(estimator),
            warper: Box::new(warper),
            sink: None,
            viewer: None,
            trajectory: None,
            buffer,
            filter: None,
            output_size,
            state: PipelineState::Startup,
            frames_read: 0,
            frames_emitted: 0,
            drain_remaining: 0,
            quit_requested: false,
            header_written: false,
        })
    }

    /// Attach an output stream consumer.
    pub fn with_sink(mut self, sink: impl VideoSink<I> + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Attach an interactive viewer. Ignored when the configuration is
    /// quiet.
    pub fn with_viewer(mut self, viewer: impl Viewer<I> + 'static) -> Self {
        self.viewer = Some(Box::new(viewer));
        self
    }

    /// Attach a per-frame trajectory sink.
    pub fn with_trajectory(mut self, trajectory: impl TrajectorySink + 'static) -> Self {
        self.trajectory = Some(Box::new(trajectory));
        self
    }

    /// Drive the pipeline to completion.
    pub fn run(&mut self) -> Result<RunReport> {
        if let Some(trajectory) = self.trajectory.as_mut() {
            if !self.header_written {
                trajectory.write_header()?;
                self.header_written = true;
            }
        }

        while self.state != PipelineState::Stopped {
            match self.state {
                PipelineState::Startup | PipelineState::Streaming => self.capture_step()?,
                PipelineState::Draining => self.drain_step()?,
                PipelineState::Stopped => {}
            }
        }

        Ok(RunReport {
            frames_read: self.frames_read,
            frames_emitted: self.frames_emitted,
            quit_requested: self.quit_requested,
        })
    }

    /// One `Startup`/`Streaming` step: ingest, compute, advance, emit
    /// when the lookahead is deep enough, poll quit.
    fn capture_step(&mut self) -> Result<()> {
        let Some(image) = self.source.read() else {
            self.on_exhausted();
            return Ok(());
        };
        self.frames_read += 1;

        if self.filter.is_none() {
            let (width, height) = (image.width(), image.height());
            info!(width, height, "input size");
            self.filter = Some(MotionFilter::new(
                width,
                height,
                self.config.process_error,
                self.config.measurement_error,
            ));
            if self.output_size.is_none() {
                self.output_size = Some((width, height));
            }
        }

        self.buffer.ingest(image);
        if let Some(filter) = self.filter.as_mut() {
            self.buffer
                .compute_transformation(filter, self.estimator.as_mut());
        }
        self.buffer.advance();
        self.buffer.compute_apparent();

        if self.buffer.ready_to_emit() {
            if self.state == PipelineState::Startup {
                debug!(depth = self.buffer.len(), "lookahead filled, streaming");
                self.state = PipelineState::Streaming;
            }
            self.emit()?;
        }
        Ok(())
    }

    /// One `Draining` step: repeat the last known pose through the window
    /// and keep emitting until the tail frames have been flushed.
    fn drain_step(&mut self) -> Result<()> {
        self.buffer.synthesize_repeat();
        self.buffer.advance();
        self.buffer.compute_apparent();
        self.drain_remaining -= 1;

        if self.buffer.ready_to_emit() {
            self.emit()?;
        }
        if self.drain_remaining == 0 && self.state == PipelineState::Draining {
            self.state = PipelineState::Stopped;
        }
        Ok(())
    }

    /// Capture exhaustion: a normal terminal signal, not an error.
    fn on_exhausted(&mut self) {
        let flush_steps = self.config.window / 2;
        if self.config.window > 0
            && flush_steps > 0
            && self.frames_emitted < self.frames_read
            && !self.buffer.is_empty()
        {
            debug!(steps = flush_steps, "end of stream, draining lookahead");
            self.state = PipelineState::Draining;
            self.drain_remaining = flush_steps;
        } else {
            debug!("end of stream");
            self.state = PipelineState::Stopped;
        }
    }

    /// Emit the record in the emission slot: refresh its apparent pose,
    /// warp with the compensating correction, then write, log, and show.
    fn emit(&mut self) -> Result<()> {
        let Some(size) = self.output_size else {
            return Ok(());
        };
        let apparent = self.buffer.smoothed();
        let Some(record) = self.buffer.emission_record_mut() else {
            return Ok(());
        };
        record.apparent = apparent;

        let correction = record.apparent - record.camera;
        let sensor = record.sensor;
        let camera = record.camera;
        let warped = self.warper.warp(&record.image, &correction, size);

        if let Some(sink) = self.sink.as_mut() {
            sink.write(&warped)?;
        }
        if let Some(trajectory) = self.trajectory.as_mut() {
            trajectory.write_row(self.frames_emitted, &sensor, &camera, &apparent)?;
        }
        self.frames_emitted += 1;

        if !self.config.quiet {
            if let Some(viewer) = self.viewer.as_mut() {
                if viewer.show(&warped)? == Some(ViewerEvent::Quit) {
                    debug!("user quit, stopping");
                    self.quit_requested = true;
                    self.state = PipelineState::Stopped;
                }
            }
        }
        Ok(())
    }
}
