//! The pinhole camera used to generate primary rays: a world transform
//! plus vertical FOV, and the per-pixel ray construction over it.

use crate::{math::Vec3, ray::Ray};

#[derive(Clone, Copy, Debug)]
pub struct Camera {
    eye: Vec3,
    target: Vec3,
    up: Vec3,
    vfov_deg: f32,
    transform: glam::Mat4,
}

impl Camera {
    pub fn new(eye: Vec3, target: Vec3, up: Vec3, vfov_deg: f32) -> Self {
        let mut camera = Self {
            eye,
            target,
            up,
            vfov_deg,
            transform: glam::Mat4::IDENTITY,
        };
        camera.update_transform();
        camera
    }

    pub fn eye(&self) -> Vec3 {
        self.eye
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn vfov_deg(&self) -> f32 {
        self.vfov_deg
    }

    pub fn set_eye(&mut self, eye: Vec3) {
        self.eye = eye;
        self.update_transform();
    }

    pub fn set_target(&mut self, target: Vec3) {
        self.target = target;
        self.update_transform();
    }

    fn update_transform(&mut self) {
        let view = glam::Mat4::look_at_rh(self.eye, self.target, self.up);
        self.transform = view.inverse();
    }

    /// Builds the primary ray through the center of pixel `(pixel_x,
    /// pixel_y)` of a `width`x`height` image, matching
    /// `construct_camera_ray`'s 0..1 UV convention (top-left origin, y
    /// flipped to match screen-space pixel rows) and aspect/FOV scaling.
    pub fn construct_ray(&self, pixel_x: u32, pixel_y: u32, width: u32, height: u32) -> Ray {
        let inv_width = 1.0 / width as f32;
        let inv_height = 1.0 / height as f32;
        let aspect = width as f32 / height as f32;
        let tan_fov = (self.vfov_deg.to_radians() * 0.5).tan();

        let u = (pixel_x as f32 + 0.5) * inv_width;
        let v = (pixel_y as f32 + 0.5) * inv_height;

        let mut pixel_x_view = 2.0 * u - 1.0;
        let pixel_y_view = 1.0 - 2.0 * v;
        pixel_x_view *= aspect;
        pixel_x_view *= tan_fov;
        let pixel_y_view = pixel_y_view * tan_fov;

        let to_pixel_world = self
            .transform
            .transform_vector3(Vec3::new(pixel_x_view, pixel_y_view, 1.0))
            .normalize();
        let origin_world = self.transform.transform_point3(Vec3::ZERO);

        Ray::new(origin_world, to_pixel_world)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn center_pixel_points_toward_target() {
        let camera = Camera::new(Vec3::new(0.0, 0.0, -5.0), Vec3::ZERO, Vec3::Y, 60.0);
        let ray = camera.construct_ray(400, 300, 800, 600);
        let to_target = (Vec3::ZERO - camera.eye()).normalize();
        assert!(ray.dir.dot(to_target) > 0.999);
    }

    #[test]
    fn ray_direction_is_normalized() {
        let camera = Camera::new(Vec3::new(1.0, 2.0, -5.0), Vec3::ZERO, Vec3::Y, 90.0);
        let ray = camera.construct_ray(0, 0, 1920, 1080);
        assert!((ray.dir.length() - 1.0).abs() < 1e-5);
    }
}
