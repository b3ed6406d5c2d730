use crate::world::{GridMapper, Vec3};

/// Binds an object's position to the cursor while its owner is `Following`.
///
/// Following only starts after an explicit grab. The vertical coordinate at grab
/// time is kept as the reference for precision drags.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CursorFollower {
    following: bool,
    locked_height: f32,
}

impl CursorFollower {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_following(&self) -> bool {
        self.following
    }

    pub fn locked_height(&self) -> f32 {
        self.locked_height
    }

    pub fn grab(&mut self, current_position: Vec3) {
        self.following = true;
        self.locked_height = current_position.y;
    }

    pub fn release(&mut self) {
        self.following = false;
    }

    /// Where the bound object should be this tick, or `None` when not following.
    ///
    /// Precision drag moves freely in the horizontal plane at the locked height;
    /// otherwise the cursor is snapped to the center of its cell.
    pub fn target_position(&self, cursor: Vec3, precision: bool, mapper: &GridMapper) -> Option<Vec3> {
        if !self.following {
            return None;
        }
        if precision {
            Some(Vec3::new(cursor.x, self.locked_height, cursor.z))
        } else {
            Some(mapper.snap(cursor))
        }
    }
}
