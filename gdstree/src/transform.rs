//!
//! # Affine Transforms
//!
//! Placement of struct-references into their parent's coordinate space.
//!

// Local Imports
use crate::data::{GdsPoint, GdsStrans};

/// # Matrix-Vector Transformation
///
/// 2x2 transformation-matrix and two-entry translation vector,
/// used for placement of [GdsPoint]s through struct-references.
///
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Rotation / Reflection / Scaling Matrix
    /// Represented in row-major order
    pub a: [[f64; 2]; 2],
    /// X-Y Translation
    pub b: [f64; 2],
}
impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}
impl Transform {
    /// The identity transform, leaving any transformed object unmodified
    pub fn identity() -> Self {
        Self {
            a: [[1., 0.], [0., 1.]],
            b: [0., 0.],
        }
    }
    /// Translation by (x,y)
    pub fn translate(x: f64, y: f64) -> Self {
        Self {
            a: [[1., 0.], [0., 1.]],
            b: [x, y],
        }
    }
    /// A transform to rotate by `angle` degrees, counter-clockwise
    pub fn rotate(angle: f64) -> Self {
        let (sin, cos) = angle.to_radians().sin_cos();
        Self {
            a: [[cos, -sin], [sin, cos]],
            b: [0., 0.],
        }
    }
    /// A transform to uniformly scale by `mag`
    pub fn scale(mag: f64) -> Self {
        Self {
            a: [[mag, 0.], [0., mag]],
            b: [0., 0.],
        }
    }
    /// A transform to reflect about the x-axis
    pub fn reflect_vert() -> Self {
        Self {
            a: [[1., 0.], [0., -1.]],
            b: [0., 0.],
        }
    }
    /// Create a transform from reference fields.
    ///
    /// Applied to a point, the result reflects it about the x-axis (if `reflected`),
    /// then scales it by `mag`, rotates it by `angle` degrees, and finally translates it to `origin`.
    pub fn from_strans(origin: &GdsPoint, reflected: bool, mag: f64, angle: f64) -> Self {
        let mut trans = Self::scale(mag);
        if reflected {
            trans = Self::cascade(&trans, &Self::reflect_vert());
        }
        let trans = Self::cascade(&Self::rotate(angle), &trans);
        Self::cascade(
            &Self::translate(f64::from(origin.x), f64::from(origin.y)),
            &trans,
        )
    }
    /// Create the transform of a reference with location `origin`, flags `strans`, `mag` and `angle`
    pub fn from_ref(origin: &GdsPoint, strans: &GdsStrans, mag: f64, angle: f64) -> Self {
        Self::from_strans(origin, strans.reflected, mag, angle)
    }
    /// Create a new [Transform] that is the cascade of `parent` and `child`.
    ///
    /// "Parents" and "children" refer to typical layout-instance hierarchies,
    /// in which each layer of instance has a nested set of transformations relative to its top-level parent.
    /// The child's transformation is applied first.
    ///
    /// Note this operation *is not* commutative.
    ///
    pub fn cascade(parent: &Transform, child: &Transform) -> Transform {
        // The result-transform's origin is the parent's origin,
        // plus the parent-transformed child's origin
        let mut b = matvec(&parent.a, &child.b);
        b[0] += parent.b[0];
        b[1] += parent.b[1];
        // And the cascade-matrix is the product of the parent's and child's
        let a = matmul(&parent.a, &child.a);
        Self { a, b }
    }
    /// Apply to point `pt`, rounding to the nearest integer coordinates
    pub fn apply(&self, pt: &GdsPoint) -> GdsPoint {
        let [x, y] = matvec(&self.a, &[f64::from(pt.x), f64::from(pt.y)]);
        GdsPoint::new(
            (x + self.b[0]).round() as i32,
            (y + self.b[1]).round() as i32,
        )
    }
}
/// Multiply 2x2 matrices, returning a new 2x2 matrix
fn matmul(a: &[[f64; 2]; 2], b: &[[f64; 2]; 2]) -> [[f64; 2]; 2] {
    [
        [
            a[0][0] * b[0][0] + a[0][1] * b[1][0],
            a[0][0] * b[0][1] + a[0][1] * b[1][1],
        ],
        [
            a[1][0] * b[0][0] + a[1][1] * b[1][0],
            a[1][0] * b[0][1] + a[1][1] * b[1][1],
        ],
    ]
}
/// Multiply a 2x2 matrix by a 2-entry vector, returning a new 2-entry vector
fn matvec(a: &[[f64; 2]; 2], b: &[f64; 2]) -> [f64; 2] {
    [
        a[0][0] * b[0] + a[0][1] * b[1],
        a[1][0] * b[0] + a[1][1] * b[1],
    ]
}
