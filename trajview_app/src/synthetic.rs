//! Synthetic scene generator.
//!
//! Produces complete scenes without a dataset: a curved ego drive sampled
//! at 2 Hz, a three-lane road following it, surrounding vehicles and a
//! PDM-Closed trajectory with small tracking noise. All randomness comes
//! from one ChaCha8 stream, so the same seed always yields the same scenes.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use std::collections::{BTreeMap, BTreeSet};
use trajview_core::transform::global_to_local;
use trajview_core::{normalize_angle, Pose2D, Trajectory, TrajectorySampling};
use trajview_env::{
    AgentBox, DrivingCommand, EgoStatus, EnvError, Frame, MapElementKind, MapPolyline, Scene,
    SceneMetadata, SceneSource, SceneStatistics, SceneToken,
};
use tracing::{debug, info};

/// Frames per scene: 4 history frames (the last is "now") and 16 future frames.
const NUM_HISTORY_FRAMES: usize = 4;
const NUM_FUTURE_FRAMES: usize = 16;

/// Recording interval, seconds.
const FRAME_INTERVAL: f64 = 0.5;

const LANE_WIDTH: f64 = 3.5;
const ROAD_HALF_WIDTH: f64 = 1.5 * LANE_WIDTH;

/// Map geometry extends this far beyond the ego drive, metres.
const MAP_MARGIN_M: f64 = 40.0;
const MAP_SPACING_M: f64 = 2.0;

/// Integration step of the ego motion model, seconds.
const INTEGRATION_STEP: f64 = 0.05;
const MIN_SPEED: f64 = 1.0;

/// PDM-Closed output: 40 poses at 0.1 s.
const PDM_SAMPLING: TrajectorySampling = TrajectorySampling {
    num_poses: 40,
    interval_length: 0.1,
};
const PDM_POSITION_NOISE: f64 = 0.1;
const PDM_HEADING_NOISE: f64 = 0.01;

const SCENES_PER_LOG: usize = 4;
const BASE_TIMESTAMP_US: i64 = 1_620_000_000_000_000;

const MAP_NAMES: [&str; 4] = [
    "us-nv-las-vegas-strip",
    "us-pa-pittsburgh-hazelwood",
    "us-ma-boston",
    "sg-one-north",
];

/// Ego motion: constant yaw rate, linearly changing speed.
///
/// `t` is seconds relative to the scene's current frame.
#[derive(Debug, Clone, Copy)]
struct EgoMotion {
    /// Pose at `t = 0`, map frame
    start: Pose2D,
    speed: f64,
    accel: f64,
    yaw_rate: f64,
}

impl EgoMotion {
    fn speed_at(&self, t: f64) -> f64 {
        (self.speed + self.accel * t).max(MIN_SPEED)
    }

    /// Midpoint integration from `t = 0`, forwards or backwards.
    fn pose_at(&self, t: f64) -> Pose2D {
        let steps = (t.abs() / INTEGRATION_STEP).ceil().max(1.0) as usize;
        let h = t / steps as f64;
        let mut pose = self.start;
        for k in 0..steps {
            let mid = (k as f64 + 0.5) * h;
            let heading = pose.heading + self.yaw_rate * h / 2.0;
            let ds = self.speed_at(mid) * h;
            pose.x += ds * heading.cos();
            pose.y += ds * heading.sin();
            pose.heading += self.yaw_rate * h;
        }
        pose.heading = normalize_angle(pose.heading);
        pose
    }

    fn command(&self) -> DrivingCommand {
        if self.yaw_rate > 0.03 {
            DrivingCommand::Left
        } else if self.yaw_rate < -0.03 {
            DrivingCommand::Right
        } else {
            DrivingCommand::Straight
        }
    }
}

/// Moves `pose` sideways by `offset` metres (positive to the left).
fn lateral(pose: &Pose2D, offset: f64) -> Pose2D {
    let (s, c) = pose.heading.sin_cos();
    Pose2D::new(pose.x - offset * s, pose.y + offset * c, pose.heading)
}

/// A vehicle driving along one lane of the ego road.
#[derive(Debug, Clone, Copy)]
struct SyntheticAgent {
    lane_offset: f64,
    /// Position along the road, expressed as ego time
    road_time: f64,
    /// Speed relative to the ego vehicle
    pace: f64,
    length: f64,
    width: f64,
}

impl SyntheticAgent {
    fn boxed(&self, motion: &EgoMotion, t: f64) -> AgentBox {
        let center = motion.pose_at(self.road_time + self.pace * t);
        AgentBox {
            pose: lateral(&center, self.lane_offset),
            length: self.length,
            width: self.width,
            category: "vehicle".to_string(),
        }
    }
}

/// Scene source backed by generated data.
pub struct SyntheticSource {
    seed: u64,
    scenes: BTreeMap<SceneToken, Scene>,
    order: Vec<SceneToken>,
    pdm: BTreeMap<SceneToken, Trajectory>,
}

impl SyntheticSource {
    /// Generates `num_scenes` scenes from `seed`.
    pub fn new(seed: u64, num_scenes: usize) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut scenes = BTreeMap::new();
        let mut order = Vec::with_capacity(num_scenes);
        let mut pdm = BTreeMap::new();

        for i in 0..num_scenes {
            let (scene, motion) = generate_scene(&mut rng, seed, i);
            let token = scene.token().clone();
            pdm.insert(token.clone(), pdm_closed(&mut rng, &motion));
            debug!(
                "Generated synthetic scene {} ({}, {} agents)",
                token,
                scene.metadata.scenario_type,
                scene.frames[0].agents.len()
            );
            order.push(token.clone());
            scenes.insert(token, scene);
        }

        info!("Generated {} synthetic scenes (seed={})", order.len(), seed);
        Self {
            seed,
            scenes,
            order,
            pdm,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

fn generate_scene(rng: &mut ChaCha8Rng, seed: u64, index: usize) -> (Scene, EgoMotion) {
    let token = SceneToken::new(format!("{:016x}", rng.gen::<u64>()));
    let map_name = MAP_NAMES[rng.gen_range(0..MAP_NAMES.len())];

    let yaw_rate = match rng.gen_range(0..3) {
        0 => rng.gen_range(-0.02..0.02),
        1 => rng.gen_range(0.06..0.18),
        _ => rng.gen_range(-0.18..-0.06),
    };
    let motion = EgoMotion {
        start: Pose2D::new(
            rng.gen_range(-500.0..500.0),
            rng.gen_range(-500.0..500.0),
            rng.gen_range(-std::f64::consts::PI..std::f64::consts::PI),
        ),
        speed: rng.gen_range(4.0..12.0),
        accel: rng.gen_range(-0.4..0.4),
        yaw_rate,
    };

    let agents: Vec<SyntheticAgent> = (0..rng.gen_range(3..=7))
        .map(|_| {
            let lane_offset = LANE_WIDTH * rng.gen_range(-1..=1) as f64;
            let mut road_time: f64 = rng.gen_range(-3.0..8.0);
            // keep the ego lane clear around the ego box
            if lane_offset == 0.0 && road_time.abs() < 2.0 {
                road_time += 4.0;
            }
            SyntheticAgent {
                lane_offset,
                road_time,
                pace: rng.gen_range(0.7..1.1),
                length: rng.gen_range(4.0..5.2),
                width: rng.gen_range(1.8..2.1),
            }
        })
        .collect();

    let current = NUM_HISTORY_FRAMES - 1;
    let frames = (0..NUM_HISTORY_FRAMES + NUM_FUTURE_FRAMES)
        .map(|i| {
            let t = (i as f64 - current as f64) * FRAME_INTERVAL;
            Frame {
                timestamp_us: BASE_TIMESTAMP_US + (index as i64) * 60_000_000 + (i as i64) * 500_000,
                ego_pose: motion.pose_at(t),
                ego_status: EgoStatus {
                    velocity: [motion.speed_at(t), 0.0],
                    acceleration: [motion.accel, motion.speed_at(t) * motion.yaw_rate],
                    driving_command: motion.command(),
                },
                cameras: BTreeMap::new(),
                lidar: None,
                agents: agents.iter().map(|a| a.boxed(&motion, t)).collect(),
            }
        })
        .collect::<Vec<_>>();

    let with_crosswalk = rng.gen_bool(0.5);
    let crosswalk_time = rng.gen_range(2.0..6.0);
    let map = road_map(&motion, with_crosswalk.then_some(crosswalk_time));

    let scenario_type = match motion.command() {
        DrivingCommand::Left => "left_turn",
        DrivingCommand::Right => "right_turn",
        _ => "straight",
    };
    let metadata = SceneMetadata {
        token,
        log_name: format!("synthetic_{}_{:03}", seed, index / SCENES_PER_LOG),
        map_name: map_name.to_string(),
        scenario_type: scenario_type.to_string(),
        timestamp_us: frames[current].timestamp_us,
        num_history_frames: NUM_HISTORY_FRAMES,
    };

    let scene = Scene {
        metadata,
        frames,
        map,
        camera: None,
    };
    (scene, motion)
}

/// Three lanes, two road edges and an optional crosswalk along the ego path.
fn road_map(motion: &EgoMotion, crosswalk_time: Option<f64>) -> Vec<MapPolyline> {
    let first = -(NUM_HISTORY_FRAMES as f64 - 1.0) * FRAME_INTERVAL;
    let last = NUM_FUTURE_FRAMES as f64 * FRAME_INTERVAL;
    let margin = MAP_MARGIN_M / motion.speed;
    let step = MAP_SPACING_M / motion.speed;
    let count = ((last - first + 2.0 * margin) / step).ceil() as usize + 1;
    let centerline: Vec<Pose2D> = (0..count)
        .map(|k| motion.pose_at(first - margin + k as f64 * step))
        .collect();

    let offset_line = |kind: MapElementKind, offset: f64| MapPolyline {
        kind,
        points: centerline
            .iter()
            .map(|p| {
                let q = lateral(p, offset);
                [q.x, q.y]
            })
            .collect(),
    };

    let mut map = vec![
        offset_line(MapElementKind::Lane, -LANE_WIDTH),
        offset_line(MapElementKind::Lane, 0.0),
        offset_line(MapElementKind::Lane, LANE_WIDTH),
        offset_line(MapElementKind::RoadEdge, -ROAD_HALF_WIDTH),
        offset_line(MapElementKind::RoadEdge, ROAD_HALF_WIDTH),
    ];

    if let Some(t) = crosswalk_time {
        let half_depth = 2.0 / motion.speed_at(t);
        let near = motion.pose_at(t - half_depth);
        let far = motion.pose_at(t + half_depth);
        let corners = [
            lateral(&near, -ROAD_HALF_WIDTH),
            lateral(&far, -ROAD_HALF_WIDTH),
            lateral(&far, ROAD_HALF_WIDTH),
            lateral(&near, ROAD_HALF_WIDTH),
        ];
        map.push(MapPolyline {
            kind: MapElementKind::Crosswalk,
            points: corners.iter().map(|p| [p.x, p.y]).collect(),
        });
    }
    map
}

/// Planner output tracking the true future with small Gaussian errors.
fn pdm_closed(rng: &mut ChaCha8Rng, motion: &EgoMotion) -> Trajectory {
    let mut noise = |std: f64| -> f64 { rng.sample::<f64, _>(StandardNormal) * std };
    let poses: Vec<Pose2D> = (1..=PDM_SAMPLING.num_poses)
        .map(|k| {
            let truth = global_to_local(&motion.start, &motion.pose_at(k as f64 * PDM_SAMPLING.interval_length));
            Pose2D::new(
                truth.x + noise(PDM_POSITION_NOISE),
                truth.y + noise(PDM_POSITION_NOISE),
                normalize_angle(truth.heading + noise(PDM_HEADING_NOISE)),
            )
        })
        .collect();
    Trajectory::from_sampling(poses, PDM_SAMPLING)
        .map(|t| t.with_origin())
        .unwrap_or_else(|_| Trajectory::empty())
}

impl SceneSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn tokens(&self) -> Vec<SceneToken> {
        self.order.clone()
    }

    fn load_scene(&self, token: &SceneToken) -> Result<Scene, EnvError> {
        self.scenes
            .get(token)
            .cloned()
            .ok_or_else(|| EnvError::scene_not_found(token))
    }

    fn pdm_trajectory(&self, scene: &Scene) -> Result<Option<Trajectory>, EnvError> {
        Ok(self.pdm.get(scene.token()).cloned())
    }

    fn statistics(&self) -> SceneStatistics {
        let maps: BTreeSet<&str> = self.scenes.values().map(|s| s.metadata.map_name.as_str()).collect();
        let logs: BTreeSet<&str> = self.scenes.values().map(|s| s.metadata.log_name.as_str()).collect();
        SceneStatistics {
            total_scenes: self.order.len(),
            map_locations: maps.into_iter().map(String::from).collect(),
            log_names: logs.into_iter().map(String::from).collect(),
            has_metric_cache: true,
            metric_cache_scenes: self.pdm.len(),
        }
    }
}
