//! Coordinate frames.
//!
//! Three frames show up when overlaying trajectories:
//! - **ego / trajectory frame**: x forward, y left, origin at the vehicle's
//!   rear axle at the reference frame's time;
//! - **map / global frame**: the frame of recorded ego poses and map geometry;
//! - **image frames**: BEV raster pixels and camera pixels.
//!
//! SE(2) conversions go through `nalgebra::Isometry2`, the camera through
//! an `Isometry3` extrinsic plus pinhole intrinsics.

use crate::trajectory::{normalize_angle, Pose2D, Trajectory};
use nalgebra::{
    Isometry2, Isometry3, Matrix3, Point2, Point3, Rotation3, Translation3, UnitQuaternion,
    Vector2,
};
use serde::{Deserialize, Serialize};

/// Pose as an SE(2) isometry (frame of the pose expressed in its parent frame).
pub fn pose_to_isometry(pose: &Pose2D) -> Isometry2<f64> {
    Isometry2::new(Vector2::new(pose.x, pose.y), pose.heading)
}

/// Inverse of [`pose_to_isometry`].
pub fn isometry_to_pose(iso: &Isometry2<f64>) -> Pose2D {
    Pose2D::new(
        iso.translation.vector.x,
        iso.translation.vector.y,
        normalize_angle(iso.rotation.angle()),
    )
}

/// Expresses `local` (given in the frame of `origin`) in the parent frame of `origin`.
pub fn local_to_global(origin: &Pose2D, local: &Pose2D) -> Pose2D {
    let p = pose_to_isometry(origin) * Point2::new(local.x, local.y);
    Pose2D::new(p.x, p.y, normalize_angle(origin.heading + local.heading))
}

/// Expresses `global` in the frame attached to `origin`.
pub fn global_to_local(origin: &Pose2D, global: &Pose2D) -> Pose2D {
    let p = pose_to_isometry(origin).inverse_transform_point(&Point2::new(global.x, global.y));
    Pose2D::new(p.x, p.y, normalize_angle(global.heading - origin.heading))
}

/// Pose `to` seen from pose `from` (both in the same parent frame).
pub fn relative_pose(from: &Pose2D, to: &Pose2D) -> Pose2D {
    global_to_local(from, to)
}

impl Trajectory {
    /// Re-expresses an ego-frame trajectory in the parent frame of `origin`.
    pub fn to_global(&self, origin: &Pose2D) -> Trajectory {
        self.map_poses(|p| local_to_global(origin, p))
    }

    /// Re-expresses a parent-frame trajectory in the frame of `origin`.
    pub fn to_local(&self, origin: &Pose2D) -> Trajectory {
        self.map_poses(|p| global_to_local(origin, p))
    }

    /// Moves a trajectory from the ego frame at `from` to the ego frame at `to`.
    ///
    /// `from` and `to` are ego poses in a common (map) frame.
    pub fn reframe(&self, from: &Pose2D, to: &Pose2D) -> Trajectory {
        self.to_global(from).to_local(to)
    }
}

/// Maps ego-frame metres onto a square BEV raster.
///
/// The ego sits at the raster centre with its forward axis pointing up and
/// its left axis pointing left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BevProjector {
    /// Half-width of the covered square, metres
    pub range_m: f64,

    /// Raster side length, pixels
    pub size_px: u32,
}

impl BevProjector {
    pub fn new(range_m: f64, size_px: u32) -> Self {
        Self { range_m, size_px }
    }

    /// Metres per pixel.
    pub fn resolution(&self) -> f64 {
        2.0 * self.range_m / self.size_px as f64
    }

    /// Pixel position `(column, row)` of an ego-frame point.
    pub fn to_pixel(&self, x: f64, y: f64) -> (f32, f32) {
        let half = self.size_px as f64 / 2.0;
        let res = self.resolution();
        ((half - y / res) as f32, (half - x / res) as f32)
    }

    /// Ego-frame point under a pixel.
    pub fn to_metric(&self, col: f32, row: f32) -> (f64, f64) {
        let half = self.size_px as f64 / 2.0;
        let res = self.resolution();
        ((half - row as f64) * res, (half - col as f64) * res)
    }

    /// Whether an ego-frame point falls on the raster.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x.abs() <= self.range_m && y.abs() <= self.range_m
    }
}

impl Default for BevProjector {
    /// 64 m × 64 m at 0.125 m/px
    fn default() -> Self {
        Self::new(32.0, 512)
    }
}

/// Pinhole camera rigidly mounted on the ego vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraModel {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    pub width: u32,
    pub height: u32,

    /// Camera origin in the ego frame (x forward, y left, z up), metres
    pub sensor2ego_translation: [f64; 3],

    /// Row-major rotation taking camera axes (x right, y down, z forward) to ego axes
    pub sensor2ego_rotation: [[f64; 3]; 3],
}

/// Camera axes to ego axes for a camera looking straight ahead.
const FORWARD_CAMERA_ROTATION: [[f64; 3]; 3] = [
    [0.0, 0.0, 1.0],
    [-1.0, 0.0, 0.0],
    [0.0, -1.0, 0.0],
];

/// Depth below which points count as behind the camera.
const MIN_DEPTH_M: f64 = 0.1;

impl CameraModel {
    /// Forward-looking camera with the given intrinsics and mounting position.
    pub fn forward(fx: f64, fy: f64, width: u32, height: u32, translation: [f64; 3]) -> Self {
        Self {
            fx,
            fy,
            cx: width as f64 / 2.0,
            cy: height as f64 / 2.0,
            width,
            height,
            sensor2ego_translation: translation,
            sensor2ego_rotation: FORWARD_CAMERA_ROTATION,
        }
    }

    /// The sensor-to-ego extrinsic as an isometry.
    pub fn sensor2ego(&self) -> Isometry3<f64> {
        let r = &self.sensor2ego_rotation;
        let m = Matrix3::new(
            r[0][0], r[0][1], r[0][2],
            r[1][0], r[1][1], r[1][2],
            r[2][0], r[2][1], r[2][2],
        );
        let rotation = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix(&m));
        let t = self.sensor2ego_translation;
        Isometry3::from_parts(Translation3::new(t[0], t[1], t[2]), rotation)
    }

    /// Projects an ego-frame 3D point; `None` behind the camera or off-image.
    pub fn project(&self, x: f64, y: f64, z: f64) -> Option<(f32, f32)> {
        let p_cam = self.sensor2ego().inverse_transform_point(&Point3::new(x, y, z));
        if p_cam.z < MIN_DEPTH_M {
            return None;
        }
        let u = self.fx * p_cam.x / p_cam.z + self.cx;
        let v = self.fy * p_cam.y / p_cam.z + self.cy;
        if u < 0.0 || v < 0.0 || u >= self.width as f64 || v >= self.height as f64 {
            return None;
        }
        Some((u as f32, v as f32))
    }

    /// Projects a point on the ground plane (`z = 0`).
    pub fn project_ground_point(&self, x: f64, y: f64) -> Option<(f32, f32)> {
        self.project(x, y, 0.0)
    }

    /// Same camera observed through an image resized to `width` × `height`.
    pub fn scaled_to(&self, width: u32, height: u32) -> Self {
        let sx = width as f64 / self.width as f64;
        let sy = height as f64 / self.height as f64;
        Self {
            fx: self.fx * sx,
            fy: self.fy * sy,
            cx: self.cx * sx,
            cy: self.cy * sy,
            width,
            height,
            ..self.clone()
        }
    }
}

impl Default for CameraModel {
    /// Front camera approximating the NavSim `cam_f0` rig.
    fn default() -> Self {
        Self::forward(1545.0, 1545.0, 1920, 1080, [1.7, 0.0, 1.5])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_local_to_global_rotated_origin() {
        let origin = Pose2D::new(10.0, 5.0, FRAC_PI_2);
        let g = local_to_global(&origin, &Pose2D::new(2.0, 0.0, 0.0));
        // Facing +y, so 2 m forward moves along +y
        assert_relative_eq!(g.x, 10.0, epsilon = 1e-12);
        assert_relative_eq!(g.y, 7.0, epsilon = 1e-12);
        assert_relative_eq!(g.heading, FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn test_round_trip_local_global() {
        let origin = Pose2D::new(-3.0, 8.0, 2.5);
        let p = Pose2D::new(4.0, -1.0, -0.3);
        let back = global_to_local(&origin, &local_to_global(&origin, &p));
        assert_relative_eq!(back.x, p.x, epsilon = 1e-9);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-9);
        assert_relative_eq!(back.heading, p.heading, epsilon = 1e-9);
    }

    #[test]
    fn test_isometry_round_trip() {
        let p = Pose2D::new(1.0, 2.0, -1.0);
        let q = isometry_to_pose(&pose_to_isometry(&p));
        assert_relative_eq!(q.x, 1.0);
        assert_relative_eq!(q.heading, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_reframe_trajectory() {
        // Vehicle moved 5 m forward between frames; a point 10 m ahead at
        // the first frame is 5 m ahead at the second
        let traj = Trajectory::new(vec![Pose2D::new(10.0, 0.0, 0.0)], vec![1.0]).unwrap();
        let from = Pose2D::new(100.0, 50.0, 0.3);
        let to = local_to_global(&from, &Pose2D::new(5.0, 0.0, 0.0));
        let moved = traj.reframe(&from, &to);
        assert_relative_eq!(moved.poses()[0].x, 5.0, epsilon = 1e-9);
        assert_relative_eq!(moved.poses()[0].y, 0.0, epsilon = 1e-9);
        assert_eq!(moved.timestamps(), traj.timestamps());
    }

    #[test]
    fn test_bev_forward_is_up_left_is_left() {
        let bev = BevProjector::new(32.0, 512);
        assert_eq!(bev.to_pixel(0.0, 0.0), (256.0, 256.0));

        let (col, row) = bev.to_pixel(8.0, 0.0);
        assert_relative_eq!(col, 256.0);
        assert!(row < 256.0);

        let (col, _) = bev.to_pixel(0.0, 8.0);
        assert!(col < 256.0);

        let (x, y) = bev.to_metric(bev.to_pixel(3.0, -2.0).0, bev.to_pixel(3.0, -2.0).1);
        assert_relative_eq!(x, 3.0, epsilon = 1e-4);
        assert_relative_eq!(y, -2.0, epsilon = 1e-4);

        assert!(bev.contains(31.0, -31.0));
        assert!(!bev.contains(33.0, 0.0));
    }

    #[test]
    fn test_camera_projects_ground_ahead_below_centre() {
        let cam = CameraModel::default();
        let (u, v) = cam.project_ground_point(20.0, 0.0).unwrap();
        assert_relative_eq!(u, 960.0, epsilon = 1e-3);
        // Ground is below the optical axis
        assert!(v > cam.cy as f32);

        // Points to the left land left of centre
        let (u_left, _) = cam.project_ground_point(20.0, 2.0).unwrap();
        assert!(u_left < 960.0);
    }

    #[test]
    fn test_camera_rejects_points_behind() {
        let cam = CameraModel::default();
        assert!(cam.project_ground_point(-5.0, 0.0).is_none());
        // Too close: ground point falls below the image
        assert!(cam.project_ground_point(2.0, 0.0).is_none());
    }

    #[test]
    fn test_camera_scaling_preserves_relative_position() {
        let cam = CameraModel::default();
        let small = cam.scaled_to(480, 270);
        let (u, v) = cam.project_ground_point(15.0, 1.0).unwrap();
        let (us, vs) = small.project_ground_point(15.0, 1.0).unwrap();
        assert_relative_eq!(us, u / 4.0, epsilon = 1e-2);
        assert_relative_eq!(vs, v / 4.0, epsilon = 1e-2);
    }
}
