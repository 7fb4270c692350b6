//! Rigid marker pose and the geometry derived from it
//!
//! Poses live in the camera frame: the camera sits at the origin, units are
//! millimetres. Euler angles use one fixed decomposition for every marker:
//!
//! ```text
//! R = Rz(roll) * Ry(pitch) * Rx(yaw)
//! ```
//!
//! so yaw turns about X, pitch about Y and roll about Z.

use glam::{DAffine3, DMat3, DMat4, DVec2, DVec3};

/// Below this distance from +-1, `r20` is treated as gimbal lock
const GIMBAL_EPSILON: f64 = 1e-9;

/// A marker's rigid transform relative to the camera
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    affine: DAffine3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        affine: DAffine3::IDENTITY,
    };

    pub fn new(rotation: DMat3, translation: DVec3) -> Self {
        Self {
            affine: DAffine3::from_mat3_translation(rotation, translation),
        }
    }

    pub fn from_translation(translation: DVec3) -> Self {
        Self::new(DMat3::IDENTITY, translation)
    }

    /// Build from the detector's row-major 3x4 `[R | t]` matrix
    pub fn from_rows(rows: &[[f64; 4]; 3]) -> Self {
        let rotation = DMat3::from_cols(
            DVec3::new(rows[0][0], rows[1][0], rows[2][0]),
            DVec3::new(rows[0][1], rows[1][1], rows[2][1]),
            DVec3::new(rows[0][2], rows[1][2], rows[2][2]),
        );
        let translation = DVec3::new(rows[0][3], rows[1][3], rows[2][3]);
        Self::new(rotation, translation)
    }

    /// Row-major 3x4 `[R | t]`, the inverse of [`Transform::from_rows`]
    pub fn to_rows(&self) -> [[f64; 4]; 3] {
        let r = self.affine.matrix3;
        let t = self.affine.translation;
        [
            [r.x_axis.x, r.y_axis.x, r.z_axis.x, t.x],
            [r.x_axis.y, r.y_axis.y, r.z_axis.y, t.y],
            [r.x_axis.z, r.y_axis.z, r.z_axis.z, t.z],
        ]
    }

    pub fn rotation(&self) -> DMat3 {
        self.affine.matrix3
    }

    /// Translation component, camera frame
    #[inline]
    pub fn location(&self) -> DVec3 {
        self.affine.translation
    }

    /// Rotation about X, degrees
    pub fn yaw(&self) -> f64 {
        let r = self.affine.matrix3;
        if self.gimbal_locked() {
            // roll is pinned to zero, so R = Ry(pitch) * Rx(yaw)
            (-r.z_axis.y).atan2(r.y_axis.y).to_degrees()
        } else {
            r.y_axis.z.atan2(r.z_axis.z).to_degrees()
        }
    }

    /// Rotation about Y, degrees
    pub fn pitch(&self) -> f64 {
        (-self.affine.matrix3.x_axis.z).clamp(-1.0, 1.0).asin().to_degrees()
    }

    /// Rotation about Z, degrees
    pub fn roll(&self) -> f64 {
        if self.gimbal_locked() {
            return 0.0;
        }
        let r = self.affine.matrix3;
        r.x_axis.y.atan2(r.x_axis.x).to_degrees()
    }

    /// Euclidean distance between the two translations, millimetres
    pub fn distance_to(&self, other: &Transform) -> f64 {
        self.location().distance(other.location())
    }

    /// Distance from the camera origin, millimetres
    pub fn distance_to_camera(&self) -> f64 {
        self.location().length()
    }

    /// Pose of a composite pattern's origin, given this pose belongs to a
    /// sub-pattern whose centre sits at `offset` in the composite's plane.
    pub fn displaced(&self, offset: DVec2) -> Self {
        if offset == DVec2::ZERO {
            return *self;
        }
        let shift = DAffine3::from_translation(DVec3::new(-offset.x, -offset.y, 0.0));
        Self {
            affine: self.affine * shift,
        }
    }

    /// Column-major 4x4 model-view matrix, as OpenGL expects it
    pub fn gl_matrix(&self) -> [f64; 16] {
        DMat4::from(self.affine).to_cols_array()
    }

    fn gimbal_locked(&self) -> bool {
        self.affine.matrix3.x_axis.z.abs() >= 1.0 - GIMBAL_EPSILON
    }
}
