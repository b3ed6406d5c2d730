use std::ops::{Add, Sub};

use thiserror::Error;

/// World-space position. `y` is the vertical axis; the build grid lies in the XZ plane.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

/// Address of one cell on the occupancy grid. `x` follows world x, `y` follows world z.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellCoord {
    pub x: i32,
    pub y: i32,
}

impl CellCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum GridError {
    #[error("cell size must be finite and > 0, got {0}")]
    InvalidCellSize(f32),
    #[error("grid origin must be finite, got ({x}, {y}, {z})")]
    InvalidOrigin { x: f32, y: f32, z: f32 },
}

/// Grid origin convention:
/// - `origin` is the world position of the bottom-left corner of cell (0,0).
/// - The center of cell (x,y) is `origin + ((x + 0.5) * cell_size, 0, (y + 0.5) * cell_size)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridMapper {
    origin: Vec3,
    cell_size: f32,
}

impl Default for GridMapper {
    fn default() -> Self {
        Self {
            origin: Vec3::ZERO,
            cell_size: 1.0,
        }
    }
}

impl GridMapper {
    pub fn new(origin: Vec3, cell_size: f32) -> Result<Self, GridError> {
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(GridError::InvalidCellSize(cell_size));
        }
        if !origin.is_finite() {
            return Err(GridError::InvalidOrigin {
                x: origin.x,
                y: origin.y,
                z: origin.z,
            });
        }
        Ok(Self { origin, cell_size })
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn world_to_cell(&self, position: Vec3) -> CellCoord {
        let local = position - self.origin;
        CellCoord {
            x: (local.x / self.cell_size).floor() as i32,
            y: (local.z / self.cell_size).floor() as i32,
        }
    }

    pub fn cell_to_world_center(&self, cell: CellCoord) -> Vec3 {
        Vec3 {
            x: self.origin.x + (cell.x as f32 + 0.5) * self.cell_size,
            y: self.origin.y,
            z: self.origin.z + (cell.y as f32 + 0.5) * self.cell_size,
        }
    }

    pub fn snap(&self, position: Vec3) -> Vec3 {
        self.cell_to_world_center(self.world_to_cell(position))
    }
}
