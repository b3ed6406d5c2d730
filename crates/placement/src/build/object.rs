use std::fmt;

use thiserror::Error;

use crate::content::{PrefabDef, PrefabId};
use crate::world::{BoxBounds, Footprint, FootprintShape, GridMapper, Pose, Vec3, Yaw};

use super::follow::CursorFollower;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Default)]
pub struct ObjectIdAllocator {
    next: u64,
}

impl ObjectIdAllocator {
    pub fn allocate(&mut self) -> ObjectId {
        let id = ObjectId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlacementState {
    Uninitialized,
    Following,
    Placed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Initialize,
    Place,
    Revert,
    Rotate,
    Grab,
    Shift,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("object {id} cannot {transition:?} while {state:?}")]
pub struct TransitionError {
    pub id: ObjectId,
    pub transition: Transition,
    pub state: PlacementState,
}

/// What the owning session has to do after `revert_to_initialization`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevertOutcome {
    /// The object left `Placed` and must be removed from the placed set.
    Delist,
    /// The object was already following; only its binding was re-enabled.
    AlreadyFollowing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationDirection {
    Right,
    Left,
}

impl RotationDirection {
    /// Scrolling up rotates right, scrolling down rotates left.
    pub fn from_scroll(delta: f32) -> Option<Self> {
        if delta > 0.0 {
            Some(Self::Right)
        } else if delta < 0.0 {
            Some(Self::Left)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaceableObject {
    id: ObjectId,
    prefab: PrefabId,
    prefab_name: String,
    bounds: BoxBounds,
    pose: Pose,
    initial_pose: Pose,
    shape: Option<FootprintShape>,
    material_index: usize,
    state: PlacementState,
    follow: Option<CursorFollower>,
}

impl PlaceableObject {
    pub fn new(id: ObjectId, prefab: &PrefabDef, pose: Pose) -> Self {
        Self {
            id,
            prefab: prefab.id,
            prefab_name: prefab.name.clone(),
            bounds: prefab.bounds,
            pose,
            initial_pose: pose,
            shape: None,
            material_index: 0,
            state: PlacementState::Uninitialized,
            follow: None,
        }
    }

    /// Builds an already placed object at `pose`, as a loaded save record would be.
    ///
    /// The footprint is derived at yaw 0 and then turned to the saved yaw, which
    /// reproduces an object rotated by hand in either direction before commit.
    pub fn restore_placed(
        id: ObjectId,
        prefab: &PrefabDef,
        pose: Pose,
        material_index: usize,
        mapper: &GridMapper,
    ) -> Self {
        let upright = Pose::new(pose.position, Yaw::default());
        let shape =
            FootprintShape::from_geometry(&prefab.bounds, &upright, mapper).turned_to(pose.yaw);
        Self {
            id,
            prefab: prefab.id,
            prefab_name: prefab.name.clone(),
            bounds: prefab.bounds,
            pose,
            initial_pose: pose,
            shape: Some(shape),
            material_index,
            state: PlacementState::Placed,
            follow: None,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn prefab(&self) -> PrefabId {
        self.prefab
    }

    pub fn prefab_name(&self) -> &str {
        &self.prefab_name
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn position(&self) -> Vec3 {
        self.pose.position
    }

    /// Pose captured by `initialize`.
    pub fn initial_pose(&self) -> Pose {
        self.initial_pose
    }

    pub fn state(&self) -> PlacementState {
        self.state
    }

    pub fn shape(&self) -> Option<&FootprintShape> {
        self.shape.as_ref()
    }

    pub fn size(&self) -> Option<(u32, u32)> {
        self.shape.map(|shape| shape.size())
    }

    pub fn footprint(&self, mapper: &GridMapper) -> Option<Footprint> {
        self.shape.map(|shape| shape.footprint_at(&self.pose, mapper))
    }

    pub fn material_index(&self) -> usize {
        self.material_index
    }

    pub fn follower(&self) -> Option<&CursorFollower> {
        self.follow.as_ref()
    }

    pub fn is_following_cursor(&self) -> bool {
        self.follow.is_some_and(|follow| follow.is_following())
    }

    /// `Uninitialized -> Following`. `default_material` is the palette index of the
    /// prefab's default material, if the palette has it.
    pub fn initialize(
        &mut self,
        default_material: Option<usize>,
        mapper: &GridMapper,
    ) -> Result<(), TransitionError> {
        self.expect_state(PlacementState::Uninitialized, Transition::Initialize)?;
        self.initial_pose = self.pose;
        self.shape = Some(FootprintShape::from_geometry(
            &self.bounds,
            &self.pose,
            mapper,
        ));
        self.material_index = default_material.unwrap_or(0);
        self.follow = Some(CursorFollower::new());
        self.state = PlacementState::Following;
        Ok(())
    }

    /// `Following -> Placed`. Returns the footprint to reserve.
    pub fn place(&mut self, mapper: &GridMapper) -> Result<Footprint, TransitionError> {
        self.expect_state(PlacementState::Following, Transition::Place)?;
        let footprint = self.require_footprint(mapper, Transition::Place)?;
        self.follow = None;
        self.state = PlacementState::Placed;
        Ok(footprint)
    }

    /// `Placed -> Following`, resetting the material to palette index 0.
    pub fn revert_to_initialization(&mut self) -> Result<RevertOutcome, TransitionError> {
        match self.state {
            PlacementState::Placed => {
                self.follow = Some(CursorFollower::new());
                self.state = PlacementState::Following;
                self.material_index = 0;
                Ok(RevertOutcome::Delist)
            }
            PlacementState::Following => {
                self.follow.get_or_insert_with(CursorFollower::new);
                Ok(RevertOutcome::AlreadyFollowing)
            }
            PlacementState::Uninitialized => Err(self.rejected(Transition::Revert)),
        }
    }

    pub fn rotate(&mut self, direction: RotationDirection) -> Result<(u32, u32), TransitionError> {
        self.expect_state(PlacementState::Following, Transition::Rotate)?;
        let missing_shape = self.rejected(Transition::Rotate);
        let shape = self.shape.as_mut().ok_or(missing_shape)?;
        self.pose.yaw = match direction {
            RotationDirection::Right => {
                shape.rotate_quarter_right();
                self.pose.yaw.rotated_right()
            }
            RotationDirection::Left => {
                shape.rotate_quarter_left();
                self.pose.yaw.rotated_left()
            }
        };
        Ok(shape.size())
    }

    pub fn rotate_right(&mut self) -> Result<(u32, u32), TransitionError> {
        self.rotate(RotationDirection::Right)
    }

    pub fn rotate_left(&mut self) -> Result<(u32, u32), TransitionError> {
        self.rotate(RotationDirection::Left)
    }

    /// Starts cursor following from the current position.
    pub fn grab(&mut self) -> Result<(), TransitionError> {
        self.expect_state(PlacementState::Following, Transition::Grab)?;
        let position = self.pose.position;
        self.follow
            .get_or_insert_with(CursorFollower::new)
            .grab(position);
        Ok(())
    }

    /// Moves toward the cursor if grabbed. Returns the new position when it changed.
    pub fn follow_cursor(
        &mut self,
        cursor: Vec3,
        precision: bool,
        mapper: &GridMapper,
    ) -> Option<Vec3> {
        if self.state != PlacementState::Following {
            return None;
        }
        let target = self.follow?.target_position(cursor, precision, mapper)?;
        if target == self.pose.position {
            return None;
        }
        self.pose.position = target;
        Some(target)
    }

    /// Nudges a placed object by whole cells in the grid plane.
    pub fn shift_cells(
        &mut self,
        dx: i32,
        dy: i32,
        mapper: &GridMapper,
    ) -> Result<Footprint, TransitionError> {
        self.expect_state(PlacementState::Placed, Transition::Shift)?;
        let cell = mapper.cell_size();
        self.pose.position =
            self.pose.position + Vec3::new(dx as f32 * cell, 0.0, dy as f32 * cell);
        self.require_footprint(mapper, Transition::Shift)
    }

    /// Puts a placed object back at an earlier pose with the same yaw.
    pub fn restore_position(
        &mut self,
        position: Vec3,
        mapper: &GridMapper,
    ) -> Result<Footprint, TransitionError> {
        self.expect_state(PlacementState::Placed, Transition::Shift)?;
        self.pose.position = position;
        self.require_footprint(mapper, Transition::Shift)
    }

    pub(crate) fn set_material_index(&mut self, material_index: usize) {
        self.material_index = material_index;
    }

    fn require_footprint(
        &self,
        mapper: &GridMapper,
        transition: Transition,
    ) -> Result<Footprint, TransitionError> {
        self.footprint(mapper)
            .ok_or_else(|| self.rejected(transition))
    }

    fn expect_state(
        &self,
        expected: PlacementState,
        transition: Transition,
    ) -> Result<(), TransitionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(self.rejected(transition))
        }
    }

    fn rejected(&self, transition: Transition) -> TransitionError {
        TransitionError {
            id: self.id,
            transition,
            state: self.state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::CellCoord;

    fn wall_def() -> PrefabDef {
        PrefabDef::new(
            "Wall",
            BoxBounds::new(Vec3::new(-1.0, 0.5, 0.0), Vec3::new(3.0, 1.0, 1.0)),
        )
    }

    fn new_wall() -> PlaceableObject {
        PlaceableObject::new(
            ObjectId(1),
            &wall_def(),
            Pose::new(Vec3::new(2.5, 0.0, 3.5), Yaw::default()),
        )
    }

    fn following_wall() -> PlaceableObject {
        let mut object = new_wall();
        object
            .initialize(None, &GridMapper::default())
            .expect("initialize");
        object
    }

    #[test]
    fn initialize_enters_following_with_footprint_and_default_material() {
        let mut object = new_wall();
        assert_eq!(object.state(), PlacementState::Uninitialized);
        assert_eq!(object.size(), None);

        object
            .initialize(Some(2), &GridMapper::default())
            .expect("initialize");
        assert_eq!(object.state(), PlacementState::Following);
        assert_eq!(object.size(), Some((3, 1)));
        assert_eq!(object.material_index(), 2);
        assert_eq!(object.initial_pose(), object.pose());
        assert!(object.follower().is_some());
        assert!(!object.is_following_cursor());
    }

    #[test]
    fn initialize_twice_is_rejected() {
        let mut object = following_wall();
        let err = object
            .initialize(None, &GridMapper::default())
            .expect_err("second initialize");
        assert_eq!(err.transition, Transition::Initialize);
        assert_eq!(err.state, PlacementState::Following);
    }

    #[test]
    fn four_rotations_in_either_direction_restore_size() {
        for direction in [RotationDirection::Right, RotationDirection::Left] {
            let mut object = following_wall();
            let original = object.size();
            let mut sizes = Vec::new();
            for _ in 0..4 {
                sizes.push(object.rotate(direction).expect("rotate"));
            }
            assert_eq!(sizes, vec![(1, 3), (3, 1), (1, 3), (3, 1)]);
            assert_eq!(object.size(), original);
            assert_eq!(object.pose().yaw, Yaw::default());
        }
    }

    #[test]
    fn rotation_is_rejected_once_placed() {
        let mut object = following_wall();
        object.place(&GridMapper::default()).expect("place");
        let err = object.rotate_right().expect_err("rotate placed");
        assert_eq!(
            err,
            TransitionError {
                id: ObjectId(1),
                transition: Transition::Rotate,
                state: PlacementState::Placed,
            }
        );
        assert_eq!(object.size(), Some((3, 1)));
    }

    #[test]
    fn place_detaches_follower_and_returns_footprint() {
        let mut object = following_wall();
        object.grab().expect("grab");
        object.rotate_right().expect("rotate");
        let footprint = object.place(&GridMapper::default()).expect("place");
        assert_eq!(footprint.origin, CellCoord::new(2, 3));
        assert_eq!(footprint.size(), (1, 3));
        assert_eq!(object.state(), PlacementState::Placed);
        assert!(object.follower().is_none());
    }

    #[test]
    fn place_requires_following() {
        let mut object = new_wall();
        assert!(object.place(&GridMapper::default()).is_err());
    }

    #[test]
    fn revert_from_placed_delists_and_resets_material() {
        let mut object = new_wall();
        object
            .initialize(Some(1), &GridMapper::default())
            .expect("initialize");
        object.place(&GridMapper::default()).expect("place");

        assert_eq!(
            object.revert_to_initialization(),
            Ok(RevertOutcome::Delist)
        );
        assert_eq!(object.state(), PlacementState::Following);
        assert_eq!(object.material_index(), 0);
        assert!(object.follower().is_some());
    }

    #[test]
    fn revert_while_following_only_reenables_binding() {
        let mut object = following_wall();
        object.grab().expect("grab");
        assert_eq!(
            object.revert_to_initialization(),
            Ok(RevertOutcome::AlreadyFollowing)
        );
        assert!(object.is_following_cursor());
    }

    #[test]
    fn revert_before_initialize_is_rejected() {
        let mut object = new_wall();
        assert!(object.revert_to_initialization().is_err());
    }

    #[test]
    fn follows_cursor_only_after_grab() {
        let mapper = GridMapper::default();
        let mut object = following_wall();
        assert_eq!(
            object.follow_cursor(Vec3::new(7.2, 0.0, 1.9), false, &mapper),
            None
        );

        object.grab().expect("grab");
        assert_eq!(
            object.follow_cursor(Vec3::new(7.2, 0.0, 1.9), false, &mapper),
            Some(Vec3::new(7.5, 0.0, 1.5))
        );
        assert_eq!(
            object.follow_cursor(Vec3::new(7.4, 0.0, 1.1), false, &mapper),
            None
        );
    }

    #[test]
    fn shift_moves_placed_object_by_cells() {
        let mapper = GridMapper::default();
        let mut object = following_wall();
        assert!(object.shift_cells(1, 0, &mapper).is_err());

        object.place(&mapper).expect("place");
        let footprint = object.shift_cells(2, -1, &mapper).expect("shift");
        assert_eq!(footprint.origin, CellCoord::new(2, 2));
        assert_eq!(object.position(), Vec3::new(4.5, 0.0, 2.5));

        let restored = object
            .restore_position(Vec3::new(2.5, 0.0, 3.5), &mapper)
            .expect("restore");
        assert_eq!(restored.origin, CellCoord::new(0, 3));
    }

    #[test]
    fn restore_placed_matches_hand_rotated_object() {
        let mapper = GridMapper::default();
        let mut by_hand = following_wall();
        by_hand.rotate_right().expect("rotate");
        let committed = by_hand.place(&mapper).expect("place");

        let restored = PlaceableObject::restore_placed(
            ObjectId(9),
            &wall_def(),
            by_hand.pose(),
            1,
            &mapper,
        );
        assert_eq!(restored.state(), PlacementState::Placed);
        assert_eq!(restored.footprint(&mapper), Some(committed));
        assert_eq!(restored.material_index(), 1);
    }

    #[test]
    fn restore_placed_matches_objects_turned_left_or_back_and_forth() {
        let mapper = GridMapper::default();
        let turn_sequences: [&[RotationDirection]; 3] = [
            &[RotationDirection::Left],
            &[RotationDirection::Left, RotationDirection::Right],
            &[RotationDirection::Left, RotationDirection::Left, RotationDirection::Left],
        ];
        for turns in turn_sequences {
            let mut by_hand = following_wall();
            for direction in turns {
                by_hand.rotate(*direction).expect("rotate");
            }
            let committed = by_hand.place(&mapper).expect("place");

            let restored = PlaceableObject::restore_placed(
                ObjectId(9),
                &wall_def(),
                by_hand.pose(),
                0,
                &mapper,
            );
            assert_eq!(restored.footprint(&mapper), Some(committed), "turns {turns:?}");
        }
    }

    #[test]
    fn scroll_direction_maps_to_rotation() {
        assert_eq!(
            RotationDirection::from_scroll(0.1),
            Some(RotationDirection::Right)
        );
        assert_eq!(
            RotationDirection::from_scroll(-3.0),
            Some(RotationDirection::Left)
        );
        assert_eq!(RotationDirection::from_scroll(0.0), None);
    }
}
