mod footprint;
mod grid;
mod occupancy;

pub use footprint::{
    compute_footprint, local_bottom_corners, BoxBounds, Footprint, FootprintShape, Pose, Yaw,
};
pub use grid::{CellCoord, GridError, GridMapper, Vec3};
pub use occupancy::{FillReport, OccupancyError, OccupancyGrid, ReleasePolicy};
