//! Per-frame culling input
//!
//! `CullData` is the immutable snapshot handed to the cull shaders each
//! frame. The CPU-side mirrors of the shader tests live here too so the
//! culling math is unit-testable without a GPU.

use bytemuck::{Pod, Zeroable};
use cgmath::{InnerSpace, Matrix, Matrix4, Vector3, Vector4};

use crate::camera::{normalize_plane, Camera};
use crate::renderer::settings::RenderSettings;

/// Uniform snapshot read by instance_cull and cluster_cull.
///
/// Field order and sizes are the wire contract with the WGSL declaration;
/// the layout test below guards it.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct CullData {
    pub view: [[f32; 4]; 4],

    /// Symmetric projection terms
    pub p00: f32,
    pub p11: f32,
    pub znear: f32,
    pub zfar: f32,

    /// Left/right and top/bottom plane coefficients from the transposed projection
    pub frustum: [f32; 4],

    /// Acceptable error at unit depth for a one-pixel screen-space threshold
    pub lod_target: f32,
    pub pyramid_width: f32,
    pub pyramid_height: f32,
    pub draw_count: u32,

    pub culling_enabled: u32,
    pub lod_enabled: u32,
    pub occlusion_enabled: u32,
    pub cluster_occlusion_enabled: u32,

    pub cluster_backface_enabled: u32,
    pub post_pass: u32,
    pub _pad: [u32; 2],
}

impl CullData {
    pub fn new(
        camera: &Camera,
        settings: &RenderSettings,
        screen_width: u32,
        screen_height: u32,
        pyramid_width: u32,
        pyramid_height: u32,
        draw_count: u32,
    ) -> Self {
        let aspect = screen_width as f32 / screen_height as f32;
        let view = camera.view_matrix();
        let projection = camera.projection_matrix(aspect);
        let projection_t = projection.transpose();

        let frustum_x = normalize_plane(projection_t.w + projection_t.x); // x + w < 0
        let frustum_y = normalize_plane(projection_t.w + projection_t.y); // y + w < 0

        Self {
            view: view.into(),
            p00: projection.x.x,
            p11: projection.y.y,
            znear: camera.znear,
            zfar: settings.draw_distance,
            frustum: [frustum_x.x, frustum_x.z, frustum_y.y, frustum_y.z],
            lod_target: (2.0 / projection.y.y) / screen_height as f32 * settings.lod_target_pixels,
            pyramid_width: pyramid_width as f32,
            pyramid_height: pyramid_height as f32,
            draw_count,
            culling_enabled: settings.culling_enabled as u32,
            lod_enabled: settings.lod_enabled as u32,
            occlusion_enabled: settings.occlusion_enabled as u32,
            cluster_occlusion_enabled: settings.cluster_occlusion_enabled as u32,
            cluster_backface_enabled: settings.cluster_backface_enabled as u32,
            post_pass: 0,
            _pad: [0; 2],
        }
    }

    /// Variant dispatched for a given pass; the post pass renders
    /// double-sided geometry, so the cluster backface cone test is off there.
    pub fn for_pass(&self, post_pass: u32) -> Self {
        let mut data = *self;
        data.post_pass = post_pass;
        if post_pass != 0 {
            data.cluster_backface_enabled = 0;
        }
        data
    }

    /// The camera input is degenerate when no view volume exists; the
    /// scheduler skips the cull dispatch entirely in that case.
    pub fn is_degenerate(&self) -> bool {
        self.zfar <= self.znear || self.draw_count == 0
    }
}

/// CPU mirror of the shader's world-to-view sphere transform
pub fn view_space_sphere(
    view: &Matrix4<f32>,
    world_center: Vector3<f32>,
    radius: f32,
    scale: f32,
) -> (Vector3<f32>, f32) {
    let c = view * Vector4::new(world_center.x, world_center.y, world_center.z, 1.0);
    (Vector3::new(c.x, c.y, c.z), radius * scale)
}

/// CPU mirror of the shader frustum test: view-space sphere against the four
/// symmetric side planes and the near/far range.
pub fn frustum_visible(data: &CullData, center: Vector3<f32>, radius: f32) -> bool {
    let mut visible = true;
    visible = visible && center.z * data.frustum[1] - center.x.abs() * data.frustum[0] > -radius;
    visible = visible && center.z * data.frustum[3] - center.y.abs() * data.frustum[2] > -radius;
    visible = visible && center.z + radius > data.znear && center.z - radius < data.zfar;
    visible || data.culling_enabled == 0
}

/// CPU mirror of the shader's LOD threshold: acceptable object-space error
/// at the sphere's distance.
pub fn lod_threshold(data: &CullData, center: Vector3<f32>, radius: f32, scale: f32) -> f32 {
    let distance = (center.magnitude() - radius).max(0.0);
    distance * data.lod_target / scale
}

/// CPU mirror of the shader's sphere-to-screen projection (2D polyhedral
/// bounds of a projected sphere). Returns the UV-space AABB of the sphere in
/// the depth pyramid, or None when the sphere crosses the near plane.
pub fn project_sphere_bounds(
    center: Vector3<f32>,
    radius: f32,
    znear: f32,
    p00: f32,
    p11: f32,
) -> Option<[f32; 4]> {
    if center.z < radius + znear {
        return None;
    }

    let cr = center * radius;
    let czr2 = center.z * center.z - radius * radius;

    let vx = (center.x * center.x + czr2).sqrt();
    let min_x = (vx * center.x - cr.z) / (vx * center.z + cr.x);
    let max_x = (vx * center.x + cr.z) / (vx * center.z - cr.x);

    let vy = (center.y * center.y + czr2).sqrt();
    let min_y = (vy * center.y - cr.z) / (vy * center.z + cr.y);
    let max_y = (vy * center.y + cr.z) / (vy * center.z - cr.y);

    // clip space -> uv space
    Some([
        min_x * p00 * 0.5 + 0.5,
        max_y * p11 * -0.5 + 0.5,
        max_x * p00 * 0.5 + 0.5,
        min_y * p11 * -0.5 + 0.5,
    ])
}

/// Conservative nearest depth of a view-space sphere under reverse-Z
pub fn sphere_closest_depth(center: Vector3<f32>, radius: f32, znear: f32) -> f32 {
    znear / (center.z - radius)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::mesh::MeshLod;
    use crate::scene::select_lod;

    fn test_data(draw_distance: f32) -> CullData {
        let camera = Camera::new();
        let settings = RenderSettings {
            draw_distance,
            ..Default::default()
        };
        CullData::new(&camera, &settings, 1920, 1080, 1024, 512, 128)
    }

    #[test]
    fn layout_matches_wgsl_contract() {
        assert_eq!(std::mem::size_of::<CullData>(), 144);
        assert_eq!(std::mem::align_of::<CullData>(), 4);
    }

    #[test]
    fn sphere_on_axis_is_visible() {
        let data = test_data(200.0);
        assert!(frustum_visible(&data, Vector3::new(0.0, 0.0, 10.0), 1.0));
    }

    #[test]
    fn sphere_behind_camera_is_rejected() {
        let data = test_data(200.0);
        assert!(!frustum_visible(&data, Vector3::new(0.0, 0.0, -10.0), 1.0));
    }

    #[test]
    fn sphere_beyond_draw_distance_is_rejected() {
        let data = test_data(200.0);
        assert!(!frustum_visible(&data, Vector3::new(0.0, 0.0, 500.0), 1.0));
        // but it survives with culling disabled
        let mut off = data;
        off.culling_enabled = 0;
        assert!(frustum_visible(&off, Vector3::new(0.0, 0.0, 500.0), 1.0));
    }

    #[test]
    fn sphere_far_to_the_side_is_rejected() {
        let data = test_data(200.0);
        assert!(!frustum_visible(&data, Vector3::new(100.0, 0.0, 10.0), 1.0));
        assert!(!frustum_visible(&data, Vector3::new(0.0, -80.0, 10.0), 1.0));
    }

    #[test]
    fn degenerate_camera_is_flagged() {
        let data = test_data(0.0);
        assert!(data.is_degenerate());
        assert!(!test_data(100.0).is_degenerate());
    }

    #[test]
    fn lod_threshold_grows_with_distance() {
        let data = test_data(500.0);
        let near = lod_threshold(&data, Vector3::new(0.0, 0.0, 5.0), 1.0, 1.0);
        let far = lod_threshold(&data, Vector3::new(0.0, 0.0, 400.0), 1.0, 1.0);
        assert!(far > near);

        let lods = [
            MeshLod { error: 0.001, ..Default::default() },
            MeshLod { error: 0.01, ..Default::default() },
            MeshLod { error: 0.1, ..Default::default() },
        ];
        assert!(select_lod(&lods, 3, far) >= select_lod(&lods, 3, near));
    }

    #[test]
    fn projected_sphere_bounds_are_centered_for_on_axis_sphere() {
        let bounds = project_sphere_bounds(Vector3::new(0.0, 0.0, 10.0), 1.0, 0.1, 1.0, 1.0)
            .expect("sphere is past the near plane");
        let cx = (bounds[0] + bounds[2]) * 0.5;
        let cy = (bounds[1] + bounds[3]) * 0.5;
        assert!((cx - 0.5).abs() < 1e-4);
        assert!((cy - 0.5).abs() < 1e-4);
        assert!(bounds[2] > bounds[0] && bounds[3] > bounds[1]);
    }

    #[test]
    fn sphere_crossing_near_plane_has_no_bounds() {
        assert!(project_sphere_bounds(Vector3::new(0.0, 0.0, 0.5), 1.0, 0.1, 1.0, 1.0).is_none());
    }

    #[test]
    fn closest_depth_decreases_with_distance() {
        // reverse-Z: nearer spheres read larger depth values
        let near = sphere_closest_depth(Vector3::new(0.0, 0.0, 2.0), 0.5, 0.1);
        let far = sphere_closest_depth(Vector3::new(0.0, 0.0, 50.0), 0.5, 0.1);
        assert!(near > far);
        assert!(near <= 1.0 + 1e-5);
    }

    #[test]
    fn post_pass_variant_disables_cone_test() {
        let data = test_data(100.0);
        assert_eq!(data.for_pass(0).cluster_backface_enabled, 1);
        assert_eq!(data.for_pass(1).cluster_backface_enabled, 0);
        assert_eq!(data.for_pass(1).post_pass, 1);
    }
}
