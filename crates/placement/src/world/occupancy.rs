use thiserror::Error;

use super::footprint::Footprint;
use super::grid::CellCoord;

/// What happens to reserved cells when a placed object leaves the placed set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReleasePolicy {
    /// Cells stay reserved after removal or reselection.
    #[default]
    Retain,
    /// Cells reserved by an object are released when it is removed or reselected.
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OccupancyError {
    #[error("occupancy grid must be at least 1x1, got {width}x{height}")]
    EmptyGrid { width: u32, height: u32 },
    #[error("occupancy grid {width}x{height} exceeds the supported cell count")]
    TooLarge { width: u32, height: u32 },
}

/// Result of painting a footprint onto the grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FillReport {
    pub cells_written: u64,
    pub cells_outside: u64,
}

/// Occupancy origin convention:
/// - `origin` is the cell coordinate stored at index 0.
/// - Cell `(origin.x + i, origin.y + j)` is stored at `j * width + i`.
///
/// Each cell holds a reservation count; overlapping reservations stack and are
/// never checked against existing marks.
#[derive(Debug, Clone, PartialEq)]
pub struct OccupancyGrid {
    width: u32,
    height: u32,
    origin: CellCoord,
    counts: Vec<u16>,
}

impl OccupancyGrid {
    pub fn new(width: u32, height: u32, origin: CellCoord) -> Result<Self, OccupancyError> {
        if width == 0 || height == 0 {
            return Err(OccupancyError::EmptyGrid { width, height });
        }
        let len = (width as usize)
            .checked_mul(height as usize)
            .filter(|len| *len <= i32::MAX as usize)
            .ok_or(OccupancyError::TooLarge { width, height })?;
        Ok(Self {
            width,
            height,
            origin,
            counts: vec![0; len],
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn origin(&self) -> CellCoord {
        self.origin
    }

    pub fn index_of(&self, cell: CellCoord) -> Option<usize> {
        let dx = i64::from(cell.x) - i64::from(self.origin.x);
        let dy = i64::from(cell.y) - i64::from(self.origin.y);
        if dx < 0 || dy < 0 || dx >= i64::from(self.width) || dy >= i64::from(self.height) {
            return None;
        }
        Some(dy as usize * self.width as usize + dx as usize)
    }

    pub fn reservation_count(&self, cell: CellCoord) -> u16 {
        self.index_of(cell)
            .and_then(|index| self.counts.get(index).copied())
            .unwrap_or(0)
    }

    pub fn is_occupied(&self, cell: CellCoord) -> bool {
        self.reservation_count(cell) > 0
    }

    pub fn reserve(&mut self, footprint: &Footprint) -> FillReport {
        self.paint(footprint, |count| count.saturating_add(1))
    }

    pub fn release(&mut self, footprint: &Footprint) -> FillReport {
        self.paint(footprint, |count| count.saturating_sub(1))
    }

    pub fn occupied_cells(&self) -> Vec<CellCoord> {
        self.counts
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .map(|(index, _)| {
                let dx = (index % self.width as usize) as i32;
                let dy = (index / self.width as usize) as i32;
                self.origin.offset(dx, dy)
            })
            .collect()
    }

    pub fn occupied_count(&self) -> usize {
        self.counts.iter().filter(|count| **count > 0).count()
    }

    pub fn clear(&mut self) {
        self.counts.fill(0);
    }

    /// Only the part of `footprint` that overlaps the grid is visited; the
    /// remainder is counted, not walked.
    fn paint(&mut self, footprint: &Footprint, update: impl Fn(u16) -> u16) -> FillReport {
        let (x_start, x_end) =
            clip_span(footprint.origin.x, footprint.width, self.origin.x, self.width);
        let (y_start, y_end) =
            clip_span(footprint.origin.y, footprint.height, self.origin.y, self.height);

        let row_len = self.width as usize;
        for dy in y_start..y_end {
            let row = &mut self.counts[dy * row_len + x_start..dy * row_len + x_end];
            for count in row {
                *count = update(*count);
            }
        }

        let cells_written = ((x_end - x_start) * (y_end - y_start)) as u64;
        let total = u64::from(footprint.width) * u64::from(footprint.height);
        FillReport {
            cells_written,
            cells_outside: total - cells_written,
        }
    }
}

/// Overlap of `[start, start + len)` with `[origin, origin + extent)`, as
/// offsets from `origin`. Empty overlaps come back as `(n, n)`.
fn clip_span(start: i32, len: u32, origin: i32, extent: u32) -> (usize, usize) {
    let extent = i64::from(extent);
    let offset = i64::from(start) - i64::from(origin);
    let low = offset.clamp(0, extent);
    let high = (offset + i64::from(len)).clamp(low, extent);
    (low as usize, high as usize)
}
