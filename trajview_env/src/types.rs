//! Scene model shared by every scene source.
//!
//! Scenes are read-only snapshots of a recorded driving segment. Ego poses,
//! agent boxes and map geometry are stored in the map (global) frame;
//! derived trajectories are returned in the ego frame of a chosen frame.

use crate::EnvError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use trajview_core::{CameraModel, Pose2D, Trajectory};

/// Camera whose image is shown next to the BEV.
pub const FRONT_CAMERA: &str = "cam_f0";

/// Identifier of a scene within a data split.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneToken(pub String);

impl SceneToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 characters, used in file names.
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(12)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl std::fmt::Display for SceneToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SceneToken {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// High-level navigation command given to the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrivingCommand {
    Left,
    #[default]
    Straight,
    Right,
    Unknown,
}

impl std::fmt::Display for DrivingCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DrivingCommand::Left => "left",
            DrivingCommand::Straight => "straight",
            DrivingCommand::Right => "right",
            DrivingCommand::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Ego kinematic state at one frame, in the ego frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EgoStatus {
    /// [vx, vy] in m/s
    pub velocity: [f64; 2],

    /// [ax, ay] in m/s²
    #[serde(default)]
    pub acceleration: [f64; 2],

    #[serde(default)]
    pub driving_command: DrivingCommand,
}

impl EgoStatus {
    pub fn speed(&self) -> f64 {
        (self.velocity[0].powi(2) + self.velocity[1].powi(2)).sqrt()
    }
}

/// Bounding box of a surrounding road user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentBox {
    /// Box centre and heading in the map frame
    pub pose: Pose2D,
    pub length: f64,
    pub width: f64,
    #[serde(default = "default_agent_category")]
    pub category: String,
}

fn default_agent_category() -> String {
    "vehicle".to_string()
}

impl AgentBox {
    /// Box corners in the box's parent frame, counter-clockwise from front-left.
    pub fn corners(&self) -> [(f64, f64); 4] {
        let (s, c) = self.pose.heading.sin_cos();
        let hl = self.length / 2.0;
        let hw = self.width / 2.0;
        let corner = |dx: f64, dy: f64| (self.pose.x + dx * c - dy * s, self.pose.y + dx * s + dy * c);
        [corner(hl, hw), corner(-hl, hw), corner(-hl, -hw), corner(hl, -hw)]
    }
}

/// Kind of map geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapElementKind {
    Lane,
    RoadEdge,
    Crosswalk,
}

/// Map polyline in the map frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapPolyline {
    pub kind: MapElementKind,
    pub points: Vec<[f64; 2]>,
}

/// One recorded time step of a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Capture time in microseconds
    pub timestamp_us: i64,

    /// Ego pose in the map frame
    pub ego_pose: Pose2D,

    pub ego_status: EgoStatus,

    /// Camera name to image path
    #[serde(default)]
    pub cameras: BTreeMap<String, PathBuf>,

    #[serde(default)]
    pub lidar: Option<PathBuf>,

    #[serde(default)]
    pub agents: Vec<AgentBox>,
}

/// Descriptive fields of a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneMetadata {
    pub token: SceneToken,
    pub log_name: String,
    pub map_name: String,
    #[serde(default = "default_scenario_type")]
    pub scenario_type: String,
    /// Timestamp of the current frame, microseconds
    pub timestamp_us: i64,
    /// History frames, the last of which is the current frame
    pub num_history_frames: usize,
}

fn default_scenario_type() -> String {
    "unknown".to_string()
}

/// A recorded driving segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub metadata: SceneMetadata,
    pub frames: Vec<Frame>,
    #[serde(default)]
    pub map: Vec<MapPolyline>,
    /// Front camera calibration; the default rig is assumed when absent
    #[serde(default)]
    pub camera: Option<CameraModel>,
}

/// Model input for one frame: ego-frame history plus sensor references.
#[derive(Debug, Clone)]
pub struct AgentInput {
    pub token: SceneToken,
    pub frame_idx: usize,
    pub ego_status: EgoStatus,
    /// Past ego poses in the ego frame of `frame_idx`, ending with the identity at `t = 0`
    pub history: Trajectory,
    pub front_camera: Option<PathBuf>,
}

impl Scene {
    pub fn token(&self) -> &SceneToken {
        &self.metadata.token
    }

    /// Index of the last history frame (the "now" of the scene).
    pub fn current_frame_index(&self) -> usize {
        self.metadata
            .num_history_frames
            .saturating_sub(1)
            .min(self.frames.len().saturating_sub(1))
    }

    pub fn frame(&self, idx: usize) -> Result<&Frame, EnvError> {
        self.frames.get(idx).ok_or_else(|| EnvError::FrameOutOfRange {
            token: self.metadata.token.to_string(),
            frame: idx,
            available: self.frames.len(),
        })
    }

    /// Time of frame `idx` relative to the current frame, seconds.
    pub fn frame_time(&self, idx: usize) -> Option<f64> {
        let current = self.frames.get(self.current_frame_index())?;
        let frame = self.frames.get(idx)?;
        Some((frame.timestamp_us - current.timestamp_us) as f64 / 1e6)
    }

    /// Frame closest in time to `t` (seconds relative to the current frame)
    /// and the absolute time difference.
    pub fn closest_frame(&self, t: f64) -> Option<(usize, f64)> {
        (0..self.frames.len())
            .filter_map(|i| self.frame_time(i).map(|ft| (i, (ft - t).abs())))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Recorded future ego motion from `frame_idx`, in that frame's ego frame.
    ///
    /// Starts with the identity pose at `t = 0`; samples beyond `horizon`
    /// seconds are dropped when a horizon is given.
    pub fn future_trajectory(
        &self,
        frame_idx: usize,
        horizon: Option<f64>,
    ) -> Result<Trajectory, EnvError> {
        let origin = self.frame(frame_idx)?;
        let mut poses = Vec::new();
        let mut timestamps = Vec::new();
        for frame in &self.frames[frame_idx..] {
            let t = (frame.timestamp_us - origin.timestamp_us) as f64 / 1e6;
            if horizon.is_some_and(|h| t > h + 1e-9) {
                break;
            }
            poses.push(trajview_core::transform::global_to_local(&origin.ego_pose, &frame.ego_pose));
            timestamps.push(t);
        }
        Ok(Trajectory::new(poses, timestamps)?)
    }

    /// Recorded ego motion up to and including `frame_idx`, in that frame's ego frame.
    pub fn history_trajectory(&self, frame_idx: usize) -> Result<Trajectory, EnvError> {
        let origin = self.frame(frame_idx)?;
        let mut poses = Vec::new();
        let mut timestamps = Vec::new();
        for frame in &self.frames[..=frame_idx] {
            poses.push(trajview_core::transform::global_to_local(&origin.ego_pose, &frame.ego_pose));
            timestamps.push((frame.timestamp_us - origin.timestamp_us) as f64 / 1e6);
        }
        Ok(Trajectory::new(poses, timestamps)?)
    }

    /// Model input for `frame_idx`.
    pub fn agent_input(&self, frame_idx: usize) -> Result<AgentInput, EnvError> {
        let frame = self.frame(frame_idx)?;
        Ok(AgentInput {
            token: self.metadata.token.clone(),
            frame_idx,
            ego_status: frame.ego_status,
            history: self.history_trajectory(frame_idx)?,
            front_camera: frame.cameras.get(FRONT_CAMERA).cloned(),
        })
    }

    /// Front camera calibration, falling back to the default rig.
    pub fn camera_model(&self) -> CameraModel {
        self.camera.clone().unwrap_or_default()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Straight drive along +x at 5 m/s, 2 Hz, 4 history + 8 future frames.
    pub fn straight_scene(token: &str) -> Scene {
        let frames = (0..12)
            .map(|i| Frame {
                timestamp_us: 1_000_000 + i as i64 * 500_000,
                ego_pose: Pose2D::new(100.0 + 2.5 * i as f64, 20.0, 0.0),
                ego_status: EgoStatus {
                    velocity: [5.0, 0.0],
                    ..Default::default()
                },
                cameras: BTreeMap::from([(FRONT_CAMERA.to_string(), PathBuf::from(format!("cam/{i}.jpg")))]),
                lidar: Some(PathBuf::from(format!("lidar/{i}.pcd"))),
                agents: Vec::new(),
            })
            .collect();
        Scene {
            metadata: SceneMetadata {
                token: SceneToken::new(token),
                log_name: "log_a".to_string(),
                map_name: "us-nv-las-vegas-strip".to_string(),
                scenario_type: "unknown".to_string(),
                timestamp_us: 2_500_000,
                num_history_frames: 4,
            },
            frames,
            map: Vec::new(),
            camera: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::straight_scene;
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_driving_command_display_matches_serde() {
        for cmd in [DrivingCommand::Left, DrivingCommand::Straight, DrivingCommand::Right, DrivingCommand::Unknown] {
            assert_eq!(serde_json::to_string(&cmd).unwrap(), format!("\"{}\"", cmd));
        }
    }

    #[test]
    fn test_token_short() {
        let t = SceneToken::new("0123456789abcdef");
        assert_eq!(t.short(), "0123456789ab");
        assert_eq!(SceneToken::new("abc").short(), "abc");
    }

    #[test]
    fn test_frame_times_relative_to_current() {
        let scene = straight_scene("s");
        assert_eq!(scene.current_frame_index(), 3);
        assert_relative_eq!(scene.frame_time(3).unwrap(), 0.0);
        assert_relative_eq!(scene.frame_time(0).unwrap(), -1.5);
        assert_relative_eq!(scene.frame_time(11).unwrap(), 4.0);
        assert!(scene.frame_time(12).is_none());
    }

    #[test]
    fn test_closest_frame() {
        let scene = straight_scene("s");
        let (idx, diff) = scene.closest_frame(1.1).unwrap();
        assert_eq!(idx, 5);
        assert_relative_eq!(diff, 0.1, epsilon = 1e-9);
    }

    #[test]
    fn test_future_trajectory_in_ego_frame() {
        let scene = straight_scene("s");
        let gt = scene.future_trajectory(3, None).unwrap();
        assert_eq!(gt.len(), 9);
        assert_eq!(gt.poses()[0], Pose2D::identity());
        assert_relative_eq!(gt.final_pose().unwrap().x, 20.0);
        assert_relative_eq!(gt.end_time().unwrap(), 4.0);

        let short = scene.future_trajectory(3, Some(2.0)).unwrap();
        assert_relative_eq!(short.end_time().unwrap(), 2.0);
    }

    #[test]
    fn test_agent_input() {
        let scene = straight_scene("s");
        let input = scene.agent_input(3).unwrap();
        assert_eq!(input.history.len(), 4);
        assert_relative_eq!(input.history.poses()[0].x, -7.5);
        assert_eq!(input.front_camera, Some(PathBuf::from("cam/3.jpg")));

        assert!(matches!(
            scene.agent_input(40),
            Err(EnvError::FrameOutOfRange { frame: 40, .. })
        ));
    }

    #[test]
    fn test_agent_box_corners() {
        let agent = AgentBox {
            pose: Pose2D::new(0.0, 0.0, 0.0),
            length: 4.0,
            width: 2.0,
            category: "vehicle".to_string(),
        };
        let c = agent.corners();
        assert_relative_eq!(c[0].0, 2.0);
        assert_relative_eq!(c[0].1, 1.0);
        assert_relative_eq!(c[2].0, -2.0);
        assert_relative_eq!(c[2].1, -1.0);
    }
}
