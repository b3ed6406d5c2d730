use super::grid::{CellCoord, GridMapper, Vec3};

const QUARTER_TURN_DEGREES: f32 = 90.0;

/// Rotation about the vertical axis in 90 degree steps.
///
/// A positive quarter turn maps a local offset `(x, z)` to `(z, -x)`, which is a
/// clockwise turn when looking down the vertical axis. Rotation is applied with
/// exact integer tables so that rotated corners land on the same cells every time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Yaw {
    quarter_turns: u8,
}

impl Yaw {
    pub const fn from_quarter_turns(quarter_turns: i32) -> Self {
        Self {
            quarter_turns: quarter_turns.rem_euclid(4) as u8,
        }
    }

    /// Rounds an arbitrary yaw in degrees to the nearest quarter turn.
    pub fn from_degrees(degrees: f32) -> Self {
        if !degrees.is_finite() {
            return Self::default();
        }
        let turns = (degrees / QUARTER_TURN_DEGREES).round() as i64;
        Self {
            quarter_turns: turns.rem_euclid(4) as u8,
        }
    }

    pub fn quarter_turns(self) -> u8 {
        self.quarter_turns
    }

    pub fn degrees(self) -> f32 {
        self.quarter_turns as f32 * QUARTER_TURN_DEGREES
    }

    /// Euler angles in degrees, as stored in save files.
    pub fn euler_degrees(self) -> Vec3 {
        Vec3::new(0.0, self.degrees(), 0.0)
    }

    pub fn rotated_right(self) -> Self {
        Self::from_quarter_turns(self.quarter_turns as i32 + 1)
    }

    pub fn rotated_left(self) -> Self {
        Self::from_quarter_turns(self.quarter_turns as i32 - 1)
    }

    pub fn apply(self, local: Vec3) -> Vec3 {
        match self.quarter_turns {
            0 => local,
            1 => Vec3::new(local.z, local.y, -local.x),
            2 => Vec3::new(-local.x, local.y, -local.z),
            _ => Vec3::new(-local.z, local.y, local.x),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub yaw: Yaw,
}

impl Pose {
    pub fn new(position: Vec3, yaw: Yaw) -> Self {
        Self { position, yaw }
    }

    pub fn transform_point(&self, local: Vec3) -> Vec3 {
        self.position + self.yaw.apply(local)
    }
}

/// Local-space bounding box of a prefab.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxBounds {
    pub center: Vec3,
    pub size: Vec3,
}

impl BoxBounds {
    pub fn new(center: Vec3, size: Vec3) -> Self {
        Self { center, size }
    }
}

/// Bottom-face corners of `bounds` in the order `(-x,-z) (+x,-z) (+x,+z) (-x,+z)`.
pub fn local_bottom_corners(bounds: &BoxBounds) -> [Vec3; 4] {
    let half = Vec3::new(bounds.size.x * 0.5, bounds.size.y * 0.5, bounds.size.z * 0.5);
    let c = bounds.center;
    [
        Vec3::new(c.x - half.x, c.y - half.y, c.z - half.z),
        Vec3::new(c.x + half.x, c.y - half.y, c.z - half.z),
        Vec3::new(c.x + half.x, c.y - half.y, c.z + half.z),
        Vec3::new(c.x - half.x, c.y - half.y, c.z + half.z),
    ]
}

/// Rectangular region of cells, covering `[origin, origin + size)` on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Footprint {
    pub origin: CellCoord,
    pub width: u32,
    pub height: u32,
}

impl Footprint {
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn contains(&self, cell: CellCoord) -> bool {
        let dx = i64::from(cell.x) - i64::from(self.origin.x);
        let dy = i64::from(cell.y) - i64::from(self.origin.y);
        dx >= 0 && dy >= 0 && dx < i64::from(self.width) && dy < i64::from(self.height)
    }

    pub fn cells(&self) -> impl Iterator<Item = CellCoord> + '_ {
        let origin = self.origin;
        (0..self.height).flat_map(move |dy| {
            (0..self.width).map(move |dx| origin.offset(dx as i32, dy as i32))
        })
    }
}

/// Derives a footprint from world-transformed corners: width from the corner 0 to
/// corner 1 cell delta, height from the corner 0 to corner 3 cell delta, origin at
/// corner 0.
pub fn compute_footprint(corners: &[Vec3; 4], pose: &Pose, mapper: &GridMapper) -> Footprint {
    let cells = corners.map(|corner| mapper.world_to_cell(pose.transform_point(corner)));
    Footprint {
        origin: cells[0],
        width: cells[0].x.abs_diff(cells[1].x).max(1),
        height: cells[0].y.abs_diff(cells[3].y).max(1),
    }
}

/// Stored corner list and cell size of an object.
///
/// Derived from geometry once; each quarter turn afterwards swaps the size and
/// shifts the corner list by one instead of re-deriving it, so any asymmetry
/// beyond a rectangle is lost. The shift follows the turn direction, which keeps
/// corner 0 on the minimum-x, minimum-z corner of the turned box: the list after
/// any sequence of turns depends only on the resulting yaw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FootprintShape {
    corners: [Vec3; 4],
    width: u32,
    height: u32,
}

impl FootprintShape {
    pub fn from_geometry(bounds: &BoxBounds, pose: &Pose, mapper: &GridMapper) -> Self {
        let corners = local_bottom_corners(bounds);
        let footprint = compute_footprint(&corners, pose, mapper);
        Self {
            corners,
            width: footprint.width,
            height: footprint.height,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn corners(&self) -> &[Vec3; 4] {
        &self.corners
    }

    /// Follows a `Yaw::rotated_right` turn.
    pub fn rotate_quarter_right(&mut self) {
        std::mem::swap(&mut self.width, &mut self.height);
        self.corners.rotate_left(1);
    }

    /// Follows a `Yaw::rotated_left` turn.
    pub fn rotate_quarter_left(&mut self) {
        std::mem::swap(&mut self.width, &mut self.height);
        self.corners.rotate_right(1);
    }

    /// Turns an upright shape to `yaw`.
    pub fn turned_to(mut self, yaw: Yaw) -> Self {
        for _ in 0..yaw.quarter_turns() {
            self.rotate_quarter_right();
        }
        self
    }

    /// World position of the corner treated as reservation origin.
    pub fn start_position(&self, pose: &Pose) -> Vec3 {
        pose.transform_point(self.corners[0])
    }

    pub fn footprint_at(&self, pose: &Pose, mapper: &GridMapper) -> Footprint {
        Footprint {
            origin: mapper.world_to_cell(self.start_position(pose)),
            width: self.width,
            height: self.height,
        }
    }
}
