//! 2D rigid motion representation.
//!
//! A [`Transform`] is a translation plus rotation `(x, y, a)`. Depending on
//! context it holds either an absolute cumulative pose or a relative
//! per-step delta; the type does not distinguish the two, the caller tracks
//! the semantics. Composition is plain component-wise addition and the
//! rotation angle is never wrapped to a canonical range, so a cumulative
//! pose can grow without bound over a long stream.

use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

use nalgebra::{Matrix2x3, Vector3};

/// A 2D rigid motion: translation `(x, y)` and rotation `a` in radians.
///
/// The identity motion is `Transform::default()`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform {
    /// Horizontal translation in pixels.
    pub x: f64,
    /// Vertical translation in pixels.
    pub y: f64,
    /// Rotation in radians.
    pub a: f64,
}

impl Transform {
    /// Create a transform from its components.
    pub fn new(x: f64, y: f64, a: f64) -> Self {
        Self { x, y, a }
    }

    /// Build the 2x3 affine matrix `[cos a, -sin a, x; sin a, cos a, y]`.
    pub fn to_affine(&self) -> Matrix2x3<f64> {
        let (sin, cos) = self.a.sin_cos();
        Matrix2x3::new(cos, -sin, self.x, sin, cos, self.y)
    }

    /// Recover a transform from a 2x3 affine matrix.
    ///
    /// The rotation is taken as `atan2(m[(1,0)], m[(0,0)])`, so any scale
    /// component of the input is discarded.
    pub fn from_affine(m: &Matrix2x3<f64>) -> Self {
        Self {
            x: m[(0, 2)],
            y: m[(1, 2)],
            a: m[(1, 0)].atan2(m[(0, 0)]),
        }
    }

    /// Flatten to a 3-element column `[x, y, a]` for filter I/O.
    pub fn to_vector(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.a)
    }

    /// Rebuild from a 3-element column `[x, y, a]`.
    pub fn from_vector(v: &Vector3<f64>) -> Self {
        Self {
            x: v[0],
            y: v[1],
            a: v[2],
        }
    }

    /// Euclidean norm of `(x, y, a)` treated as a flat 3-vector.
    ///
    /// Diagnostic only; the pipeline never branches on it.
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.a * self.a).sqrt()
    }
}

impl Add for Transform {
    type Output = Transform;

    fn add(self, t: Transform) -> Transform {
        Transform::new(self.x + t.x, self.y + t.y, self.a + t.a)
    }
}

impl AddAssign for Transform {
    fn add_assign(&mut self, t: Transform) {
        self.x += t.x;
        self.y += t.y;
        self.a += t.a;
    }
}

impl Neg for Transform {
    type Output = Transform;

    fn neg(self) -> Transform {
        Transform::new(-self.x, -self.y, -self.a)
    }
}

impl Sub for Transform {
    type Output = Transform;

    fn sub(self, t: Transform) -> Transform {
        self + -t
    }
}

impl SubAssign for Transform {
    fn sub_assign(&mut self, t: Transform) {
        *self += -t;
    }
}

impl Mul<f64> for Transform {
    type Output = Transform;

    fn mul(self, c: f64) -> Transform {
        Transform::new(c * self.x, c * self.y, c * self.a)
    }
}

impl Mul<Transform> for f64 {
    type Output = Transform;

    fn mul(self, t: Transform) -> Transform {
        t * self
    }
}

impl Div<f64> for Transform {
    type Output = Transform;

    fn div(self, c: f64) -> Transform {
        Transform::new(self.x / c, self.y / c, self.a / c)
    }
}
