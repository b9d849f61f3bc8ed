//! Position, rotation and scale of an entity and the model matrix they compose to.

use cgmath::{Matrix4, Rad, SquareMatrix, Vector3};

/// Per-entity placement in world space.
///
/// Rotation is stored as Euler angles in radians: `x` is pitch, `y` is yaw and
/// `z` is roll. The model matrix is recomputed on every [`Transform::update`]
/// call from whatever the fields hold at that moment.
#[derive(Clone, Debug, PartialEq)]
pub struct Transform {
    pub position: Vector3<f32>,
    pub rotation: Vector3<f32>,
    pub scale: Vector3<f32>,
    matrix: Matrix4<f32>,
}

impl Transform {
    /// Identity transform: origin, no rotation, unit scale.
    pub fn new() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            rotation: Vector3::new(0.0, 0.0, 0.0),
            scale: Vector3::new(1.0, 1.0, 1.0),
            matrix: Matrix4::identity(),
        }
    }

    pub fn set_transform(
        &mut self,
        position: Vector3<f32>,
        rotation: Vector3<f32>,
        scale: Vector3<f32>,
    ) {
        self.position = position;
        self.rotation = rotation;
        self.scale = scale;
    }

    /// Scale first, then roll, pitch and yaw, then translate.
    pub fn to_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position)
            * Self::rotation_matrix(self.rotation)
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }

    pub fn rotation_matrix(rotation: Vector3<f32>) -> Matrix4<f32> {
        Matrix4::from_angle_y(Rad(rotation.y))
            * Matrix4::from_angle_x(Rad(rotation.x))
            * Matrix4::from_angle_z(Rad(rotation.z))
    }

    pub fn update(&mut self, _delta_time: f32) {
        self.matrix = self.to_matrix();
    }

    /// The matrix computed by the last [`Transform::update`].
    pub fn matrix(&self) -> Matrix4<f32> {
        self.matrix
    }
}

impl From<Vector3<f32>> for Transform {
    fn from(position: Vector3<f32>) -> Self {
        Transform {
            position,
            ..Default::default()
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{InnerSpace, Vector4};

    fn assert_close(a: Matrix4<f32>, b: Matrix4<f32>) {
        let (a, b): ([[f32; 4]; 4], [[f32; 4]; 4]) = (a.into(), b.into());
        for c in 0..4 {
            for r in 0..4 {
                assert!((a[c][r] - b[c][r]).abs() < 1e-5, "{a:?} != {b:?}");
            }
        }
    }

    #[test]
    fn matrix_is_stale_until_update() {
        let mut t = Transform::new();
        t.position = Vector3::new(1.0, 2.0, 3.0);
        assert_eq!(t.matrix(), Matrix4::identity());
        t.update(0.016);
        assert_eq!(t.matrix(), Matrix4::from_translation(t.position));
    }

    #[test]
    fn composes_translation_rotation_scale() {
        let mut t = Transform::new();
        let (p, r, s) = (
            Vector3::new(3.0, -1.0, 2.0),
            Vector3::new(0.3, 1.1, -0.4),
            Vector3::new(2.0, 0.5, 1.5),
        );
        t.set_transform(p, r, s);
        t.update(0.0);
        let expected = Matrix4::from_translation(p)
            * Matrix4::from_angle_y(Rad(r.y))
            * Matrix4::from_angle_x(Rad(r.x))
            * Matrix4::from_angle_z(Rad(r.z))
            * Matrix4::from_nonuniform_scale(s.x, s.y, s.z);
        assert_close(t.matrix(), expected);
    }

    #[test]
    fn yaw_turns_forward_towards_positive_x() {
        let mut t = Transform::new();
        t.rotation.y = std::f32::consts::FRAC_PI_2;
        t.update(0.0);
        let v = t.matrix() * Vector4::new(0.0, 0.0, 1.0, 0.0);
        assert!((v.truncate() - Vector3::new(1.0, 0.0, 0.0)).magnitude() < 1e-5);
    }

    #[test]
    fn scale_applies_before_translation() {
        let mut t = Transform::new();
        t.set_transform(
            Vector3::new(10.0, 0.0, 0.0),
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(2.0, 2.0, 2.0),
        );
        t.update(0.0);
        let p = t.matrix() * Vector4::new(1.0, 0.0, 0.0, 1.0);
        assert!((p.x - 12.0).abs() < 1e-5);
    }
}
