//! # Steadyframe - Video Stabilization Core
//!
//! Steadyframe stabilizes a video stream by estimating frame-to-frame camera
//! motion, smoothing the motion trajectory, and re-rendering each frame to
//! compensate for unwanted movement while preserving intentional camera
//! motion.
//!
//! ## Features
//!
//! - 3-state recursive motion filter (predict/correct) with a noise model
//!   scaled to the input frame dimensions
//! - Exponential low-pass or centered windowed-average trajectory smoothing
//! - Lookahead frame buffer with incremental window bookkeeping
//! - Pluggable capture, registration, warping, and output collaborators
//! - Per-frame trajectory logging (tab-separated sensor/camera/apparent
//!   poses)
//!
//! ## Example
//!
//! ```rust,ignore
//! use steadyframe::{Stabilizer, StabilizerConfig};
//!
//! let mut config = StabilizerConfig::default();
//! config.window = 30;
//!
//! let mut stabilizer = Stabilizer::new(config, source, estimator, warper)?
//!     .with_sink(writer)
//!     .with_trajectory(trajectory);
//! let report = stabilizer.run()?;
//! println!("emitted {} frames", report.frames_emitted);
//! ```

pub mod buffer;
pub mod filter;
pub mod io;
pub mod stabilizer;
pub mod transform;

// Re-exports for convenience
pub use buffer::{FrameRecord, SmoothingMode, TrajectoryBuffer};
pub use filter::MotionFilter;
pub use io::{
    Frame, FrameSource, FrameWarper, RigidEstimator, TrajectorySink, TsvTrajectoryWriter,
    VideoSink, Viewer, ViewerEvent,
};
pub use stabilizer::{RunReport, Stabilizer, StabilizerConfig};
pub use transform::Transform;

// Error types
pub use crate::error::{Error, Result};

mod error {
    use thiserror::Error;

    /// Errors that can occur in the steadyframe library
    #[derive(Error, Debug)]
    pub enum Error {
        #[error("Invalid configuration: {0}")]
        InvalidConfig(String),

        #[error("Output sink error: {0}")]
        SinkError(String),

        #[error("Viewer error: {0}")]
        ViewerError(String),

        #[error("IO error: {0}")]
        IoError(#[from] std::io::Error),
    }

    /// Result type for steadyframe operations
    pub type Result<T> = std::result::Result<T, Error>;
}
