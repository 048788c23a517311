//! Collaborator interfaces for the stabilization pipeline.
//!
//! The core never touches pixels. Capture, two-frame registration, image
//! resampling, encoding, and display are all consumed behind the traits in
//! this module; the pipeline stays synchronous and pull-based, so every
//! call here is an opaque blocking operation.

use std::io::Write;

use crate::transform::Transform;
use crate::Result;

/// Opaque image handle flowing through the pipeline.
///
/// The dimensions of the first captured frame configure the motion
/// filter's noise model; cloning supports the end-of-stream drain, which
/// repeats the last captured frame.
pub trait Frame: Clone {
    /// Frame width in pixels.
    fn width(&self) -> u32;

    /// Frame height in pixels.
    fn height(&self) -> u32;
}

/// Pull-based capture source.
pub trait FrameSource<I> {
    /// Read the next frame.
    ///
    /// `None` signals end of stream, a normal terminal condition rather
    /// than an error. A stalled source stalls the pipeline; there is no
    /// timeout.
    fn read(&mut self) -> Option<I>;
}

/// Two-frame rigid-motion registration.
pub trait RigidEstimator<I> {
    /// Estimate the rigid motion carrying `prev` onto `next`.
    ///
    /// `None` means no transform could be estimated for this pair; the
    /// pipeline substitutes the identity motion and continues.
    fn estimate(&mut self, prev: &I, next: &I) -> Option<Transform>;
}

/// Affine image resampler.
pub trait FrameWarper<I> {
    /// Apply `correction` to `image`, producing an `output_size` frame.
    fn warp(&mut self, image: &I, correction: &Transform, output_size: (u32, u32)) -> I;
}

/// Output stream consumer (encoder, file writer, network sink).
pub trait VideoSink<I> {
    /// Write one stabilized frame.
    fn write(&mut self, image: &I) -> Result<()>;
}

/// Event reported by the interactive viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerEvent {
    /// The user requested an orderly early exit.
    Quit,
}

/// On-screen display with keyboard polling.
pub trait Viewer<I> {
    /// Show one frame and poll for user input.
    fn show(&mut self, image: &I) -> Result<Option<ViewerEvent>>;
}

/// Per-frame trajectory record sink.
pub trait TrajectorySink {
    /// Write the column header once, before any rows.
    fn write_header(&mut self) -> Result<()>;

    /// Write one record for an emitted frame.
    fn write_row(
        &mut self,
        frame_index: u64,
        sensor: &Transform,
        camera: &Transform,
        apparent: &Transform,
    ) -> Result<()>;
}

const DELIM: char = '\t';

/// Tab-separated trajectory writer over any [`Write`] target.
///
/// One row per emitted frame: frame index followed by the x/y/a components
/// of the cumulative sensor, camera, and apparent poses.
#[derive(Debug)]
pub struct TsvTrajectoryWriter<W: Write> {
    out: W,
}

impl<W: Write> TsvTrajectoryWriter<W> {
    /// Wrap a writer. Callers that need buffering supply a `BufWriter`.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Unwrap the inner writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> TrajectorySink for TsvTrajectoryWriter<W> {
    fn write_header(&mut self) -> Result<()> {
        writeln!(
            self.out,
            "frame{d}sensor_x{d}sensor_y{d}sensor_a{d}camera_x{d}camera_y{d}camera_a{d}apparent_x{d}apparent_y{d}apparent_a",
            d = DELIM,
        )?;
        Ok(())
    }

    fn write_row(
        &mut self,
        frame_index: u64,
        sensor: &Transform,
        camera: &Transform,
        apparent: &Transform,
    ) -> Result<()> {
        writeln!(
            self.out,
            "{}{d}{}{d}{}{d}{}{d}{}{d}{}{d}{}{d}{}{d}{}{d}{}",
            frame_index,
            sensor.x,
            sensor.y,
            sensor.a,
            camera.x,
            camera.y,
            camera.a,
            apparent.x,
            apparent.y,
            apparent.a,
            d = DELIM,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::BufWriter;
    use tempfile::NamedTempFile;

    #[test]
    fn test_header_layout() {
        let mut writer = TsvTrajectoryWriter::new(Vec::new());
        writer.write_header().unwrap();

        let text = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(
            text,
            "frame\tsensor_x\tsensor_y\tsensor_a\tcamera_x\tcamera_y\tcamera_a\tapparent_x\tapparent_y\tapparent_a\n"
        );
    }

    #[test]
    fn test_row_layout() {
        let mut writer = TsvTrajectoryWriter::new(Vec::new());
        writer
            .write_row(
                7,
                &Transform::new(1.0, 2.0, 3.0),
                &Transform::new(4.5, -5.0, 6.0),
                &Transform::new(0.0, 0.25, -1.0),
            )
            .unwrap();

        let text = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(text, "7\t1\t2\t3\t4.5\t-5\t6\t0\t0.25\t-1\n");
    }

    #[test]
    fn test_writes_through_to_file() {
        let file = NamedTempFile::new().unwrap();
        {
            let mut writer =
                TsvTrajectoryWriter::new(BufWriter::new(file.reopen().unwrap()));
            writer.write_header().unwrap();
            writer
                .write_row(
                    0,
                    &Transform::default(),
                    &Transform::default(),
                    &Transform::default(),
                )
                .unwrap();
            writer.into_inner().flush().unwrap();
        }

        let text = fs::read_to_string(file.path()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("frame\t"));
        assert_eq!(lines[1], "0\t0\t0\t0\t0\t0\t0\t0\t0\t0");
    }
}
