/// Camera Module
///
/// Free-look camera supplying the per-frame view/projection input to the
/// culling and raster stages. The view convention is +Z forward so the
/// symmetric projection terms can be compared directly against view-space
/// sphere centers; the projection is infinite reverse-Z (1.0 at the near
/// plane, 0.0 at infinity).

use cgmath::{Deg, InnerSpace, Matrix4, Point3, Rad, Vector3, Vector4};

#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Point3<f32>,
    pub yaw: Deg<f32>,
    pub pitch: Deg<f32>,
    pub fov_y: Deg<f32>,
    pub znear: f32,
}

impl Camera {
    pub fn new() -> Self {
        Self {
            position: Point3::new(0.0, 2.0, -8.0),
            yaw: Deg(90.0),
            pitch: Deg(0.0),
            fov_y: Deg(70.0),
            znear: 0.1,
        }
    }

    pub fn forward(&self) -> Vector3<f32> {
        let (sin_yaw, cos_yaw) = Rad::from(self.yaw).0.sin_cos();
        let (sin_pitch, cos_pitch) = Rad::from(self.pitch).0.sin_cos();

        Vector3::new(cos_pitch * cos_yaw, sin_pitch, cos_pitch * sin_yaw)
    }

    pub fn right(&self) -> Vector3<f32> {
        self.forward().cross(Vector3::unit_y()).normalize()
    }

    /// View matrix with +Z pointing into the scene.
    pub fn view_matrix(&self) -> Matrix4<f32> {
        let f = self.forward().normalize();
        let r = f.cross(Vector3::unit_y()).normalize();
        let u = r.cross(f);
        let eye = Vector3::new(self.position.x, self.position.y, self.position.z);

        Matrix4::from_cols(
            Vector4::new(r.x, u.x, f.x, 0.0),
            Vector4::new(r.y, u.y, f.y, 0.0),
            Vector4::new(r.z, u.z, f.z, 0.0),
            Vector4::new(-r.dot(eye), -u.dot(eye), -f.dot(eye), 1.0),
        )
    }

    /// Infinite reverse-Z perspective projection.
    pub fn projection_matrix(&self, aspect_w_by_h: f32) -> Matrix4<f32> {
        let f = 1.0 / (Rad::from(self.fov_y).0 / 2.0).tan();
        Matrix4::from_cols(
            Vector4::new(f / aspect_w_by_h, 0.0, 0.0, 0.0),
            Vector4::new(0.0, f, 0.0, 0.0),
            Vector4::new(0.0, 0.0, 0.0, 1.0),
            Vector4::new(0.0, 0.0, self.znear, 0.0),
        )
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalize a plane equation by the length of its normal
pub fn normalize_plane(p: Vector4<f32>) -> Vector4<f32> {
    p / Vector3::new(p.x, p.y, p.z).magnitude()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{SquareMatrix, Transform};

    #[test]
    fn reverse_z_projection_maps_near_to_one() {
        let camera = Camera::new();
        let proj = camera.projection_matrix(16.0 / 9.0);

        let near = proj * Vector4::new(0.0, 0.0, camera.znear, 1.0);
        assert!((near.z / near.w - 1.0).abs() < 1e-5);

        let far = proj * Vector4::new(0.0, 0.0, 1.0e6, 1.0);
        assert!(far.z / far.w < 1e-4);
    }

    #[test]
    fn view_matrix_puts_forward_on_positive_z() {
        let camera = Camera::new();
        let view = camera.view_matrix();
        let ahead = camera.position + camera.forward() * 5.0;
        let v = view.transform_point(ahead);
        assert!((v.z - 5.0).abs() < 1e-4);
        assert!(v.x.abs() < 1e-4 && v.y.abs() < 1e-4);
    }

    #[test]
    fn view_matrix_is_invertible() {
        let mut camera = Camera::new();
        camera.yaw = Deg(37.0);
        camera.pitch = Deg(-20.0);
        assert!(camera.view_matrix().invert().is_some());
    }
}
