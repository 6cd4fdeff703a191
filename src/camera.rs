use glam::{Mat4, Vec3, Vec4};

const DEFAULT_UP: Vec3 = Vec3::Y;

/// Perspective camera the shadow cascades are fitted to.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera3D {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_radians: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera3D {
    pub fn new(position: Vec3, target: Vec3, fov_y_radians: f32, near: f32, far: f32) -> Self {
        Self { position, target, up: DEFAULT_UP, fov_y_radians, aspect: 16.0 / 9.0, near, far }
    }

    pub fn with_aspect(mut self, aspect: f32) -> Self {
        self.aspect = aspect;
        self
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov_y_radians, self.aspect.max(0.0001), self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// World-space corners of the frustum slice between `near` and `far`.
    pub fn frustum_slice_corners(&self, near: f32, far: f32) -> [Vec3; 8] {
        let proj = Mat4::perspective_rh_gl(self.fov_y_radians, self.aspect.max(0.0001), near, far);
        let inv = (proj * self.view_matrix()).inverse();
        let mut corners = [Vec3::ZERO; 8];
        let mut idx = 0;
        for &x in &[-1.0, 1.0] {
            for &y in &[-1.0, 1.0] {
                for &z in &[-1.0, 1.0] {
                    let world = inv * Vec4::new(x, y, z, 1.0);
                    corners[idx] = world.truncate() / world.w;
                    idx += 1;
                }
            }
        }
        corners
    }
}
