//! 3-state recursive motion filter.
//!
//! Turns a noisy per-step sensor-motion measurement `(dx, dy, da)` into a
//! filtered camera-motion delta via the standard linear predict/correct
//! update. The transition and measurement matrices are identity: the model
//! assumes the camera delta is constant between steps and fully observed,
//! so all of the tuning lives in the two noise covariances.
//!
//! The matrices are statically sized 3x3 and the update is written out
//! explicitly so the numeric contract is exact and testable in isolation.

use nalgebra::{Matrix3, Vector3};

/// Recursive estimator for per-frame motion deltas.
///
/// Constructed once per stream, after the first frame's dimensions are
/// known; never reset mid-stream. Must be driven predict-then-correct
/// exactly once per ingested frame. Deterministic: an identical measurement
/// sequence produces an identical output sequence.
#[derive(Clone, Debug)]
pub struct MotionFilter {
    /// State transition matrix (identity).
    f: Matrix3<f64>,
    /// Measurement matrix (identity).
    h: Matrix3<f64>,
    /// Process noise covariance (diagonal).
    q: Matrix3<f64>,
    /// Measurement noise covariance (diagonal).
    r: Matrix3<f64>,
    /// State estimate `[dx, dy, da]`.
    x: Vector3<f64>,
    /// Error covariance estimate.
    p: Matrix3<f64>,
}

impl MotionFilter {
    /// Create a motion filter for a stream of `width` x `height` frames.
    ///
    /// `process_error` and `measurement_error` are error fractions relative
    /// to the frame dimensions: the translation channels are scaled by the
    /// squared width and height, the rotation channel by `4 * pi^2`.
    /// Treating the frame dimension as the measurement unit keeps error
    /// magnitudes comparable across differently sized inputs.
    pub fn new(width: u32, height: u32, process_error: f64, measurement_error: f64) -> Self {
        let w = f64::from(width);
        let h = f64::from(height);
        let perr2 = process_error * process_error;
        let merr2 = measurement_error * measurement_error;
        let full_turn2 = 4.0 * std::f64::consts::PI * std::f64::consts::PI;

        Self {
            f: Matrix3::identity(),
            h: Matrix3::identity(),
            q: Matrix3::from_diagonal(&Vector3::new(
                w * w * perr2,
                h * h * perr2,
                full_turn2 * perr2,
            )),
            r: Matrix3::from_diagonal(&Vector3::new(
                w * w * merr2,
                h * h * merr2,
                full_turn2 * merr2,
            )),
            x: Vector3::zeros(),
            p: Matrix3::zeros(),
        }
    }

    /// Advance the state estimate one step without a new measurement.
    ///
    /// With an identity transition the state is unchanged and the error
    /// covariance grows by the process noise.
    pub fn predict(&mut self) {
        // x = F @ x
        self.x = self.f * self.x;

        // P = F @ P @ F.T + Q
        self.p = self.f * self.p * self.f.transpose() + self.q;
    }

    /// Blend the predicted state with a measurement and return the
    /// corrected `[dx, dy, da]`.
    pub fn correct(&mut self, measurement: &Vector3<f64>) -> Vector3<f64> {
        // y = z - H @ x (innovation)
        let y = measurement - self.h * self.x;

        // S = H @ P @ H.T + R (innovation covariance)
        let s = self.h * self.p * self.h.transpose() + self.r;

        // K = P @ H.T @ S^-1 (gain)
        let si = s.try_inverse().unwrap_or_else(Matrix3::identity);
        let k = self.p * self.h.transpose() * si;

        // x = x + K @ y
        self.x += k * y;

        // P = (I - K @ H) @ P
        self.p = (Matrix3::identity() - k * self.h) * self.p;

        self.x
    }

    /// Current state estimate.
    pub fn state(&self) -> &Vector3<f64> {
        &self.x
    }

    /// Current error covariance estimate.
    pub fn covariance(&self) -> &Matrix3<f64> {
        &self.p
    }
}
