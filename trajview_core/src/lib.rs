//! trajview core - trajectory alignment math
//!
//! Pure numeric building blocks for comparing trajectory sources:
//! 1. **Trajectories**: immutable time-stamped pose sequences with interpolation
//! 2. **Synchronization**: resampling many sources onto one shared time grid
//! 3. **Frames**: SE(2) ego/map conversions, BEV raster and camera projection
//! 4. **Timelines & metrics**: animation schedules, opacity fades, ADE/FDE

pub mod trajectory;
pub mod sync;
pub mod transform;
pub mod timeline;
pub mod metrics;

// Re-export key types for convenience
pub use trajectory::{normalize_angle, Pose2D, Trajectory, TrajectoryError, TrajectorySampling};
pub use sync::{synchronize, SkipReason, SyncError, SynchronizedSet};
pub use transform::{BevProjector, CameraModel};
pub use timeline::TimeWindow;
pub use metrics::{DisplacementMetrics, MetricsAggregate};
