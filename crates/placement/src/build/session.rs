use std::collections::{BTreeMap, HashMap};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::content::{
    MaterialPalette, PersistenceError, PrefabCatalog, PrefabDef, SaveDocument, SaveStore,
};
use crate::world::{
    CellCoord, Footprint, GridError, GridMapper, OccupancyError, OccupancyGrid, Pose,
    ReleasePolicy, Vec3, Yaw,
};

use super::codec::{deserialize_placed, serialize_placed, LoadWarning};
use super::input::{InputEvent, Key};
use super::object::{
    ObjectId, ObjectIdAllocator, PlaceableObject, PlacementState, RevertOutcome,
    RotationDirection, TransitionError,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    pub cell_size: f32,
    pub grid_origin: Vec3,
    pub occupancy_origin: CellCoord,
    pub occupancy_width: u32,
    pub occupancy_height: u32,
    pub release_policy: ReleasePolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cell_size: 1.0,
            grid_origin: Vec3::ZERO,
            occupancy_origin: CellCoord::new(-64, -64),
            occupancy_width: 128,
            occupancy_height: 128,
            release_policy: ReleasePolicy::Retain,
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionSetupError {
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error(transparent)]
    Occupancy(#[from] OccupancyError),
}

/// An operation the current session state does not allow. Nothing was changed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectedOperation {
    #[error("object {0} is already following the cursor")]
    AlreadyFollowing(ObjectId),
    #[error("no object is following the cursor")]
    NoActiveObject,
    #[error("no object is selected")]
    NoSelection,
    #[error("unknown object {0}")]
    UnknownObject(ObjectId),
    #[error("object {0} is not placed")]
    NotPlaced(ObjectId),
    #[error("unknown prefab '{0}'")]
    UnknownPrefab(String),
    #[error("prefab slot {0} is empty")]
    EmptyPrefabSlot(usize),
    #[error("material palette is empty")]
    EmptyPalette,
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Rejected(#[from] RejectedOperation),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Which branch of `cancel_or_remove` fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelAction {
    RevertedPendingMoves { count: usize },
    DestroyedActive(ObjectId),
    RemovedSelected(ObjectId),
    RemovedLastPlaced(ObjectId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    NothingToLoad,
    Loaded {
        object_count: usize,
        warnings: Vec<LoadWarning>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    NoOp,
    Spawned(ObjectId),
    Grabbed(ObjectId),
    Rotated { id: ObjectId, size: (u32, u32) },
    Placed { id: ObjectId, footprint: Footprint },
    Reselected(ObjectId),
    Cancelled(CancelAction),
    Shifted { id: ObjectId, footprint: Footprint },
    MaterialApplied { id: ObjectId, material_index: usize },
    Saved { object_count: usize },
    Load(LoadOutcome),
}

/// What an outline/highlight layer needs to draw the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionVisualState {
    pub active: Option<ObjectId>,
    pub selected: Option<ObjectId>,
    pub active_following_cursor: bool,
    pub current_material_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingMove {
    id: ObjectId,
    previous_position: Vec3,
}

/// Owns every placeable object and the shared occupancy grid.
///
/// Invariants:
/// - at most one object is `Following`, and it is `active`;
/// - `placed` lists exactly the `Placed` objects, in placement order;
/// - `selected` is `None`, the active object, or an element of `placed`.
///
/// All mutation goes through `&mut self`, so a load can never interleave with a
/// placement or selection.
#[derive(Debug)]
pub struct BuildSession {
    config: SessionConfig,
    mapper: GridMapper,
    occupancy: OccupancyGrid,
    catalog: PrefabCatalog,
    palette: MaterialPalette,
    allocator: ObjectIdAllocator,
    objects: BTreeMap<ObjectId, PlaceableObject>,
    placed: Vec<ObjectId>,
    reservations: HashMap<ObjectId, Footprint>,
    active: Option<ObjectId>,
    selected: Option<ObjectId>,
    pending_moves: Vec<PendingMove>,
    current_material_index: usize,
    cursor: Vec3,
    precision_drag: bool,
}

impl BuildSession {
    pub fn new(
        config: SessionConfig,
        catalog: PrefabCatalog,
        palette: MaterialPalette,
    ) -> Result<Self, SessionSetupError> {
        let mapper = GridMapper::new(config.grid_origin, config.cell_size)?;
        let occupancy = OccupancyGrid::new(
            config.occupancy_width,
            config.occupancy_height,
            config.occupancy_origin,
        )?;
        Ok(Self {
            config,
            mapper,
            occupancy,
            catalog,
            palette,
            allocator: ObjectIdAllocator::default(),
            objects: BTreeMap::new(),
            placed: Vec::new(),
            reservations: HashMap::new(),
            active: None,
            selected: None,
            pending_moves: Vec::new(),
            current_material_index: 0,
            cursor: Vec3::ZERO,
            precision_drag: false,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn mapper(&self) -> &GridMapper {
        &self.mapper
    }

    pub fn occupancy(&self) -> &OccupancyGrid {
        &self.occupancy
    }

    pub fn catalog(&self) -> &PrefabCatalog {
        &self.catalog
    }

    pub fn palette(&self) -> &MaterialPalette {
        &self.palette
    }

    pub fn object(&self, id: ObjectId) -> Option<&PlaceableObject> {
        self.objects.get(&id)
    }

    pub fn active_object(&self) -> Option<&PlaceableObject> {
        self.active.and_then(|id| self.objects.get(&id))
    }

    pub fn selected_object(&self) -> Option<&PlaceableObject> {
        self.selected.and_then(|id| self.objects.get(&id))
    }

    pub fn placed_ids(&self) -> &[ObjectId] {
        &self.placed
    }

    /// Placed objects in placement order.
    pub fn placed_objects(&self) -> impl Iterator<Item = &PlaceableObject> + '_ {
        self.placed.iter().filter_map(|id| self.objects.get(id))
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn following_count(&self) -> usize {
        self.objects
            .values()
            .filter(|object| object.state() == PlacementState::Following)
            .count()
    }

    pub fn pending_move_count(&self) -> usize {
        self.pending_moves.len()
    }

    pub fn current_material_index(&self) -> usize {
        self.current_material_index
    }

    pub fn cursor(&self) -> Vec3 {
        self.cursor
    }

    pub fn visual_state(&self) -> SessionVisualState {
        SessionVisualState {
            active: self.active,
            selected: self.selected,
            active_following_cursor: self
                .active_object()
                .is_some_and(PlaceableObject::is_following_cursor),
            current_material_index: self.current_material_index,
        }
    }

    pub fn set_cursor(&mut self, position: Vec3) {
        self.cursor = position;
    }

    pub fn set_precision_drag(&mut self, enabled: bool) {
        self.precision_drag = enabled;
    }

    /// Advances the active object's cursor binding. Returns its new position if it moved.
    pub fn tick(&mut self) -> Option<Vec3> {
        let id = self.active?;
        let (cursor, precision) = (self.cursor, self.precision_drag);
        let object = self.objects.get_mut(&id)?;
        object.follow_cursor(cursor, precision, &self.mapper)
    }

    pub fn handle_event(
        &mut self,
        event: InputEvent,
        store: &SaveStore,
    ) -> Result<SessionOutcome, SessionError> {
        let outcome = match event {
            InputEvent::KeyPressed(Key::Slot(slot)) => self.select_prefab_slot(slot)?,
            InputEvent::KeyPressed(Key::Save) => SessionOutcome::Saved {
                object_count: self.save(store)?,
            },
            InputEvent::KeyPressed(Key::Load) => SessionOutcome::Load(self.load(store)?),
            InputEvent::KeyPressed(Key::Cancel) => self.cancel_or_remove(),
            InputEvent::PointerPrimaryPressed { target: None } => SessionOutcome::NoOp,
            InputEvent::PointerPrimaryPressed { target: Some(id) } => {
                if self.active == Some(id) {
                    self.grab_active()?
                } else {
                    self.select_existing(id)?
                }
            }
            InputEvent::PointerPrimaryReleased => SessionOutcome::NoOp,
            InputEvent::PointerSecondaryPressed => self.commit_placement()?,
            InputEvent::PointerScroll(delta) => match RotationDirection::from_scroll(delta) {
                Some(direction) => self.rotate_active(direction)?,
                None => SessionOutcome::NoOp,
            },
            InputEvent::PointerMoved(position) => {
                self.set_cursor(position);
                SessionOutcome::NoOp
            }
            InputEvent::ModifierChanged(enabled) => {
                self.set_precision_drag(enabled);
                SessionOutcome::NoOp
            }
            InputEvent::MaterialButtonPressed => self.cycle_selected_material()?,
        };
        Ok(outcome)
    }

    pub fn select_prefab(&mut self, name: &str) -> Result<SessionOutcome, RejectedOperation> {
        self.ensure_nothing_following()?;
        let prefab = self
            .catalog
            .prefab_by_name(name)
            .cloned()
            .ok_or_else(|| RejectedOperation::UnknownPrefab(name.to_string()))?;
        self.spawn_following(&prefab)
    }

    pub fn select_prefab_slot(&mut self, slot: usize) -> Result<SessionOutcome, RejectedOperation> {
        self.ensure_nothing_following()?;
        let prefab = self
            .catalog
            .slot(slot)
            .cloned()
            .ok_or(RejectedOperation::EmptyPrefabSlot(slot))?;
        self.spawn_following(&prefab)
    }

    pub fn grab_active(&mut self) -> Result<SessionOutcome, RejectedOperation> {
        let id = self.active.ok_or(RejectedOperation::NoActiveObject)?;
        self.object_mut(id)?.grab()?;
        debug!(object = %id, "object_grabbed");
        Ok(SessionOutcome::Grabbed(id))
    }

    pub fn rotate_active(
        &mut self,
        direction: RotationDirection,
    ) -> Result<SessionOutcome, RejectedOperation> {
        let Some(id) = self.active else {
            return Ok(SessionOutcome::NoOp);
        };
        let size = self.object_mut(id)?.rotate(direction)?;
        debug!(object = %id, ?direction, width = size.0, height = size.1, "object_rotated");
        Ok(SessionOutcome::Rotated { id, size })
    }

    pub fn commit_placement(&mut self) -> Result<SessionOutcome, RejectedOperation> {
        let id = self.active.ok_or(RejectedOperation::NoActiveObject)?;
        let mapper = self.mapper;
        let footprint = self.object_mut(id)?.place(&mapper)?;
        self.reserve(id, footprint);
        self.placed.push(id);
        self.active = None;
        info!(
            object = %id,
            origin_x = footprint.origin.x,
            origin_y = footprint.origin.y,
            width = footprint.width,
            height = footprint.height,
            "object_placed"
        );
        Ok(SessionOutcome::Placed { id, footprint })
    }

    pub fn select_existing(&mut self, id: ObjectId) -> Result<SessionOutcome, RejectedOperation> {
        self.ensure_nothing_following()?;
        let outcome = self.object_mut(id)?.revert_to_initialization()?;
        if outcome == RevertOutcome::Delist {
            self.delist(id);
        }
        self.object_mut(id)?.grab()?;
        self.active = Some(id);
        self.selected = Some(id);
        info!(object = %id, "object_reselected");
        Ok(SessionOutcome::Reselected(id))
    }

    /// Exactly one of: revert the pending move batch, destroy the active object,
    /// remove the selected object, remove the most recently placed object.
    pub fn cancel_or_remove(&mut self) -> SessionOutcome {
        if !self.pending_moves.is_empty() {
            let count = self.revert_pending_moves();
            return SessionOutcome::Cancelled(CancelAction::RevertedPendingMoves { count });
        }

        if let Some(id) = self.active.take() {
            self.objects.remove(&id);
            if self.selected == Some(id) {
                self.selected = None;
            }
            info!(object = %id, "active_object_destroyed");
            return SessionOutcome::Cancelled(CancelAction::DestroyedActive(id));
        }

        if let Some(id) = self.selected.take() {
            self.destroy_placed(id);
            info!(object = %id, "selected_object_removed");
            return SessionOutcome::Cancelled(CancelAction::RemovedSelected(id));
        }

        if let Some(&id) = self.placed.last() {
            self.destroy_placed(id);
            info!(object = %id, "last_placed_object_removed");
            return SessionOutcome::Cancelled(CancelAction::RemovedLastPlaced(id));
        }

        SessionOutcome::NoOp
    }

    /// Nudges a placed object by whole cells. The first nudge of each object is
    /// remembered so the next cancel can put it back.
    pub fn shift_placed(
        &mut self,
        id: ObjectId,
        dx: i32,
        dy: i32,
    ) -> Result<SessionOutcome, RejectedOperation> {
        let mapper = self.mapper;
        let object = self.object_mut(id)?;
        if object.state() != PlacementState::Placed {
            return Err(RejectedOperation::NotPlaced(id));
        }
        let previous_position = object.position();
        let footprint = object.shift_cells(dx, dy, &mapper)?;
        if !self.pending_moves.iter().any(|pending| pending.id == id) {
            self.pending_moves.push(PendingMove {
                id,
                previous_position,
            });
        }
        self.move_reservation(id, footprint);
        debug!(object = %id, dx, dy, "object_shifted");
        Ok(SessionOutcome::Shifted { id, footprint })
    }

    pub fn cycle_selected_material(&mut self) -> Result<SessionOutcome, RejectedOperation> {
        let id = self.selected.ok_or(RejectedOperation::NoSelection)?;
        if self.palette.is_empty() {
            return Err(RejectedOperation::EmptyPalette);
        }
        let next = (self.current_material_index + 1) % self.palette.len();
        self.object_mut(id)?.set_material_index(next);
        self.current_material_index = next;
        debug!(object = %id, material_index = next, "material_applied");
        Ok(SessionOutcome::MaterialApplied {
            id,
            material_index: next,
        })
    }

    pub fn save_document(&self) -> SaveDocument {
        serialize_placed(self.placed_objects())
    }

    pub fn save(&self, store: &SaveStore) -> Result<usize, PersistenceError> {
        let document = self.save_document();
        store.write(&document)?;
        Ok(document.placed_objects.len())
    }

    /// Replaces the layout with the stored one. A missing save is not an error; an
    /// unreadable or corrupt one leaves the session untouched.
    pub fn load(&mut self, store: &SaveStore) -> Result<LoadOutcome, PersistenceError> {
        match store.read()? {
            Some(document) => Ok(self.apply_save_document(&document)),
            None => {
                info!(path = %store.path().display(), "no_saved_game");
                Ok(LoadOutcome::NothingToLoad)
            }
        }
    }

    /// Destroys every object (placed, active and selected) and rebuilds the layout
    /// and occupancy grid from `document`.
    pub fn apply_save_document(&mut self, document: &SaveDocument) -> LoadOutcome {
        let report = deserialize_placed(
            document,
            &self.catalog,
            &self.palette,
            &self.mapper,
            &mut self.allocator,
        );

        self.objects.clear();
        self.placed.clear();
        self.reservations.clear();
        self.pending_moves.clear();
        self.active = None;
        self.selected = None;
        self.occupancy.clear();

        let object_count = report.objects.len();
        for object in report.objects {
            let id = object.id();
            if let Some(footprint) = object.footprint(&self.mapper) {
                self.reserve(id, footprint);
            }
            self.placed.push(id);
            self.objects.insert(id, object);
        }
        if let Some(material_index) = report.last_applied_material {
            self.current_material_index = material_index;
        }

        info!(
            object_count,
            warning_count = report.warnings.len(),
            "game_loaded"
        );
        LoadOutcome::Loaded {
            object_count,
            warnings: report.warnings,
        }
    }

    fn spawn_following(&mut self, prefab: &PrefabDef) -> Result<SessionOutcome, RejectedOperation> {
        let id = self.allocator.allocate();
        let position = self.mapper.snap(self.cursor);
        let mut object = PlaceableObject::new(id, prefab, Pose::new(position, Yaw::default()));
        let default_material = prefab
            .default_material
            .as_deref()
            .and_then(|name| self.palette.index_of(name));
        object.initialize(default_material, &self.mapper)?;
        self.objects.insert(id, object);
        self.active = Some(id);
        info!(object = %id, prefab = %prefab.name, label = %prefab.label, "object_spawned");
        Ok(SessionOutcome::Spawned(id))
    }

    fn ensure_nothing_following(&self) -> Result<(), RejectedOperation> {
        match self.active {
            Some(active) => Err(RejectedOperation::AlreadyFollowing(active)),
            None => Ok(()),
        }
    }

    fn object_mut(&mut self, id: ObjectId) -> Result<&mut PlaceableObject, RejectedOperation> {
        self.objects
            .get_mut(&id)
            .ok_or(RejectedOperation::UnknownObject(id))
    }

    /// Takes `id` out of the placed set without destroying it.
    fn delist(&mut self, id: ObjectId) {
        self.placed.retain(|placed| *placed != id);
        self.pending_moves.retain(|pending| pending.id != id);
        let footprint = self.reservations.remove(&id);
        if self.config.release_policy == ReleasePolicy::Release {
            if let Some(footprint) = footprint {
                self.occupancy.release(&footprint);
            }
        }
    }

    fn destroy_placed(&mut self, id: ObjectId) {
        self.delist(id);
        self.objects.remove(&id);
        if self.selected == Some(id) {
            self.selected = None;
        }
    }

    fn reserve(&mut self, id: ObjectId, footprint: Footprint) {
        let report = self.occupancy.reserve(&footprint);
        if report.cells_outside > 0 {
            warn!(
                object = %id,
                cells_outside = report.cells_outside,
                "footprint_outside_occupancy_grid"
            );
        }
        self.reservations.insert(id, footprint);
    }

    fn move_reservation(&mut self, id: ObjectId, footprint: Footprint) {
        if self.config.release_policy == ReleasePolicy::Release {
            if let Some(previous) = self.reservations.get(&id).copied() {
                self.occupancy.release(&previous);
            }
        }
        self.reserve(id, footprint);
    }

    fn revert_pending_moves(&mut self) -> usize {
        let mapper = self.mapper;
        let pending = std::mem::take(&mut self.pending_moves);
        let mut reverted = 0;
        for PendingMove {
            id,
            previous_position,
        } in pending
        {
            let Some(object) = self.objects.get_mut(&id) else {
                continue;
            };
            match object.restore_position(previous_position, &mapper) {
                Ok(footprint) => {
                    self.move_reservation(id, footprint);
                    reverted += 1;
                }
                Err(error) => warn!(error = %error, "pending_move_not_reverted"),
            }
        }
        info!(count = reverted, "pending_moves_reverted");
        reverted
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::content::{Material, SavedObject, SavedVec3};
    use crate::world::BoxBounds;

    fn catalog() -> PrefabCatalog {
        PrefabCatalog::from_prefabs(vec![
            PrefabDef::new(
                "Wall",
                BoxBounds::new(Vec3::new(-1.0, 0.5, 0.0), Vec3::new(3.0, 1.0, 1.0)),
            ),
            PrefabDef::new("Tower", BoxBounds::new(Vec3::ZERO, Vec3::new(1.0, 4.0, 1.0)))
                .with_default_material("Blue"),
        ])
    }

    fn palette() -> MaterialPalette {
        MaterialPalette::new(vec![
            Material::new("Red", [255, 0, 0]),
            Material::new("Blue", [0, 0, 255]),
        ])
    }

    fn session_with(release_policy: ReleasePolicy) -> BuildSession {
        let config = SessionConfig {
            release_policy,
            ..SessionConfig::default()
        };
        BuildSession::new(config, catalog(), palette()).expect("session")
    }

    fn session() -> BuildSession {
        session_with(ReleasePolicy::Retain)
    }

    fn place_wall_at(session: &mut BuildSession, cursor: Vec3) -> ObjectId {
        session.set_cursor(cursor);
        let SessionOutcome::Spawned(id) = session.select_prefab("Wall").expect("spawn") else {
            panic!("expected spawn");
        };
        session.commit_placement().expect("commit");
        id
    }

    fn cells(list: &[(i32, i32)]) -> Vec<CellCoord> {
        list.iter().map(|&(x, y)| CellCoord::new(x, y)).collect()
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = SessionConfig {
            cell_size: 0.0,
            ..SessionConfig::default()
        };
        assert!(matches!(
            BuildSession::new(config, catalog(), palette()),
            Err(SessionSetupError::Grid(_))
        ));

        let config = SessionConfig {
            occupancy_width: 0,
            ..SessionConfig::default()
        };
        assert!(matches!(
            BuildSession::new(config, catalog(), palette()),
            Err(SessionSetupError::Occupancy(_))
        ));
    }

    #[test]
    fn only_one_object_follows_at_a_time() {
        let mut session = session();
        let first = session.select_prefab("Wall").expect("spawn");
        let SessionOutcome::Spawned(first) = first else {
            panic!("expected spawn");
        };

        assert_eq!(
            session.select_prefab("Tower"),
            Err(RejectedOperation::AlreadyFollowing(first))
        );
        assert_eq!(
            session.select_prefab_slot(1),
            Err(RejectedOperation::AlreadyFollowing(first))
        );
        assert_eq!(session.following_count(), 1);
        assert_eq!(session.object_count(), 1);
    }

    #[test]
    fn unknown_prefab_and_empty_slot_are_rejected() {
        let mut session = session();
        assert_eq!(
            session.select_prefab("Statue"),
            Err(RejectedOperation::UnknownPrefab("Statue".to_string()))
        );
        assert_eq!(
            session.select_prefab_slot(2),
            Err(RejectedOperation::EmptyPrefabSlot(2))
        );
        assert_eq!(session.object_count(), 0);
    }

    #[test]
    fn spawned_object_takes_prefab_default_material() {
        let mut session = session();
        let SessionOutcome::Spawned(id) = session.select_prefab_slot(1).expect("spawn") else {
            panic!("expected spawn");
        };
        let tower = session.object(id).expect("tower");
        assert_eq!(tower.prefab_name(), "Tower");
        assert_eq!(tower.material_index(), 1);
        assert_eq!(tower.state(), PlacementState::Following);
    }

    #[test]
    fn rotated_wall_reserves_three_cells_in_a_column() {
        let mut session = session();
        session.set_cursor(Vec3::new(2.2, 0.0, 3.7));
        let SessionOutcome::Spawned(id) = session.select_prefab("Wall").expect("spawn") else {
            panic!("expected spawn");
        };
        assert_eq!(
            session.object(id).map(PlaceableObject::position),
            Some(Vec3::new(2.5, 0.0, 3.5))
        );

        assert_eq!(
            session.rotate_active(RotationDirection::Right),
            Ok(SessionOutcome::Rotated { id, size: (1, 3) })
        );
        let SessionOutcome::Placed { footprint, .. } = session.commit_placement().expect("commit")
        else {
            panic!("expected placement");
        };

        assert_eq!(footprint.origin, CellCoord::new(2, 3));
        assert_eq!(
            session.occupancy().occupied_cells(),
            cells(&[(2, 3), (2, 4), (2, 5)])
        );
        assert_eq!(session.placed_ids(), &[id]);
        assert_eq!(session.following_count(), 0);
    }

    #[test]
    fn rotate_without_active_object_does_nothing() {
        let mut session = session();
        assert_eq!(
            session.rotate_active(RotationDirection::Left),
            Ok(SessionOutcome::NoOp)
        );
    }

    #[test]
    fn commit_without_active_object_is_rejected() {
        let mut session = session();
        assert_eq!(
            session.commit_placement(),
            Err(RejectedOperation::NoActiveObject)
        );
    }

    #[test]
    fn grab_then_tick_follows_the_cursor() {
        let mut session = session();
        let store = SaveStore::new("unused.json");
        let SessionOutcome::Spawned(id) = session.select_prefab("Wall").expect("spawn") else {
            panic!("expected spawn");
        };
        session.set_cursor(Vec3::new(5.3, 0.0, 1.2));
        assert_eq!(session.tick(), None);

        let outcome = session
            .handle_event(InputEvent::PointerPrimaryPressed { target: Some(id) }, &store)
            .expect("grab");
        assert_eq!(outcome, SessionOutcome::Grabbed(id));
        assert_eq!(session.tick(), Some(Vec3::new(5.5, 0.0, 1.5)));
        assert!(session.visual_state().active_following_cursor);

        session
            .handle_event(InputEvent::ModifierChanged(true), &store)
            .expect("modifier");
        session
            .handle_event(InputEvent::PointerMoved(Vec3::new(6.1, 3.0, 2.2)), &store)
            .expect("move");
        assert_eq!(session.tick(), Some(Vec3::new(6.1, 0.0, 2.2)));
    }

    #[test]
    fn reselecting_placed_object_makes_it_active_again() {
        let mut session = session();
        let id = place_wall_at(&mut session, Vec3::new(2.5, 0.0, 3.5));

        assert_eq!(session.select_existing(id), Ok(SessionOutcome::Reselected(id)));
        assert!(session.placed_ids().is_empty());
        assert_eq!(
            session.visual_state(),
            SessionVisualState {
                active: Some(id),
                selected: Some(id),
                active_following_cursor: true,
                current_material_index: 0,
            }
        );

        let other = session.select_existing(id);
        assert_eq!(other, Err(RejectedOperation::AlreadyFollowing(id)));
    }

    #[test]
    fn cancel_removes_last_placed_when_nothing_else_applies() {
        let mut session = session();
        let first = place_wall_at(&mut session, Vec3::new(0.5, 0.0, 0.5));
        let second = place_wall_at(&mut session, Vec3::new(0.5, 0.0, 5.5));

        assert_eq!(
            session.cancel_or_remove(),
            SessionOutcome::Cancelled(CancelAction::RemovedLastPlaced(second))
        );
        assert_eq!(session.placed_ids(), &[first]);
        assert!(session.object(second).is_none());
    }

    #[test]
    fn cancel_destroys_active_before_touching_placed() {
        let mut session = session();
        let placed = place_wall_at(&mut session, Vec3::new(0.5, 0.0, 0.5));
        let SessionOutcome::Spawned(active) = session.select_prefab("Tower").expect("spawn") else {
            panic!("expected spawn");
        };

        assert_eq!(
            session.cancel_or_remove(),
            SessionOutcome::Cancelled(CancelAction::DestroyedActive(active))
        );
        assert_eq!(session.placed_ids(), &[placed]);
        assert_eq!(session.visual_state().active, None);
    }

    #[test]
    fn cancel_of_reselected_object_clears_selection() {
        let mut session = session();
        let id = place_wall_at(&mut session, Vec3::new(0.5, 0.0, 0.5));
        session.select_existing(id).expect("reselect");

        assert_eq!(
            session.cancel_or_remove(),
            SessionOutcome::Cancelled(CancelAction::DestroyedActive(id))
        );
        assert_eq!(session.visual_state().selected, None);
        assert_eq!(session.object_count(), 0);
        assert_eq!(session.cancel_or_remove(), SessionOutcome::NoOp);
    }

    #[test]
    fn cancel_removes_selected_placed_object() {
        let mut session = session();
        let first = place_wall_at(&mut session, Vec3::new(0.5, 0.0, 0.5));
        let second = place_wall_at(&mut session, Vec3::new(0.5, 0.0, 5.5));
        session.select_existing(first).expect("reselect");
        session.commit_placement().expect("commit");
        assert_eq!(session.placed_ids(), &[second, first]);

        assert_eq!(
            session.cancel_or_remove(),
            SessionOutcome::Cancelled(CancelAction::RemovedSelected(first))
        );
        assert_eq!(session.placed_ids(), &[second]);
        assert_eq!(session.visual_state().selected, None);
    }

    #[test]
    fn cancel_reverts_pending_moves_and_keeps_objects_placed() {
        let mut session = session_with(ReleasePolicy::Release);
        let id = place_wall_at(&mut session, Vec3::new(2.5, 0.0, 3.5));

        session.shift_placed(id, 1, 0).expect("shift");
        session.shift_placed(id, 0, 2).expect("shift again");
        assert_eq!(session.pending_move_count(), 1);
        assert_eq!(
            session.occupancy().occupied_cells(),
            cells(&[(1, 5), (2, 5), (3, 5)])
        );

        assert_eq!(
            session.cancel_or_remove(),
            SessionOutcome::Cancelled(CancelAction::RevertedPendingMoves { count: 1 })
        );
        let wall = session.object(id).expect("wall");
        assert_eq!(wall.position(), Vec3::new(2.5, 0.0, 3.5));
        assert_eq!(wall.state(), PlacementState::Placed);
        assert_eq!(session.placed_ids(), &[id]);
        assert_eq!(
            session.occupancy().occupied_cells(),
            cells(&[(0, 3), (1, 3), (2, 3)])
        );
        assert_eq!(session.pending_move_count(), 0);
    }

    #[test]
    fn shift_requires_placed_object() {
        let mut session = session();
        let SessionOutcome::Spawned(id) = session.select_prefab("Wall").expect("spawn") else {
            panic!("expected spawn");
        };
        assert_eq!(
            session.shift_placed(id, 1, 0),
            Err(RejectedOperation::NotPlaced(id))
        );
        assert_eq!(
            session.shift_placed(ObjectId(99), 1, 0),
            Err(RejectedOperation::UnknownObject(ObjectId(99)))
        );
    }

    #[test]
    fn retain_policy_keeps_cells_reserved_after_removal() {
        let mut session = session_with(ReleasePolicy::Retain);
        place_wall_at(&mut session, Vec3::new(2.5, 0.0, 3.5));
        session.cancel_or_remove();
        assert_eq!(
            session.occupancy().occupied_cells(),
            cells(&[(0, 3), (1, 3), (2, 3)])
        );
    }

    #[test]
    fn release_policy_frees_cells_on_removal_and_reselect() {
        let mut session = session_with(ReleasePolicy::Release);
        let first = place_wall_at(&mut session, Vec3::new(2.5, 0.0, 3.5));
        place_wall_at(&mut session, Vec3::new(2.5, 0.0, 6.5));

        session.cancel_or_remove();
        assert_eq!(
            session.occupancy().occupied_cells(),
            cells(&[(0, 3), (1, 3), (2, 3)])
        );

        session.select_existing(first).expect("reselect");
        assert_eq!(session.occupancy().occupied_count(), 0);
    }

    #[test]
    fn material_button_cycles_selected_object_through_palette() {
        let mut session = session();
        let store = SaveStore::new("unused.json");
        assert!(matches!(
            session.handle_event(InputEvent::MaterialButtonPressed, &store),
            Err(SessionError::Rejected(RejectedOperation::NoSelection))
        ));

        let id = place_wall_at(&mut session, Vec3::new(0.5, 0.0, 0.5));
        session.select_existing(id).expect("reselect");
        let outcome = session
            .handle_event(InputEvent::MaterialButtonPressed, &store)
            .expect("material");
        assert_eq!(
            outcome,
            SessionOutcome::MaterialApplied {
                id,
                material_index: 1
            }
        );
        session.cycle_selected_material().expect("material");
        assert_eq!(session.object(id).map(PlaceableObject::material_index), Some(0));
        assert_eq!(session.current_material_index(), 0);
    }

    #[test]
    fn blue_wall_survives_save_and_load() {
        let temp = TempDir::new().expect("temp");
        let store = SaveStore::in_dir(temp.path());
        let mut session = session();
        let id = place_wall_at(&mut session, Vec3::new(2.5, 0.0, 3.5));
        session.select_existing(id).expect("reselect");
        session.rotate_active(RotationDirection::Right).expect("rotate");
        session.cycle_selected_material().expect("blue");
        session.commit_placement().expect("commit");

        let saved = session
            .handle_event(InputEvent::KeyPressed(Key::Save), &store)
            .expect("save");
        assert_eq!(saved, SessionOutcome::Saved { object_count: 1 });

        let mut restored = session_with(ReleasePolicy::Retain);
        let outcome = restored
            .handle_event(InputEvent::KeyPressed(Key::Load), &store)
            .expect("load");
        assert_eq!(
            outcome,
            SessionOutcome::Load(LoadOutcome::Loaded {
                object_count: 1,
                warnings: Vec::new(),
            })
        );

        let wall = restored.placed_objects().next().expect("wall");
        assert_eq!(wall.prefab_name(), "Wall");
        assert_eq!(wall.material_index(), 1);
        assert_eq!(wall.pose().yaw, Yaw::from_quarter_turns(1));
        assert_eq!(restored.current_material_index(), 1);
        assert_eq!(
            restored.occupancy().occupied_cells(),
            cells(&[(2, 3), (2, 4), (2, 5)])
        );
        assert_eq!(restored.save_document(), session.save_document());
    }

    #[test]
    fn left_turned_wall_reloads_onto_the_same_cells() {
        let mut session = session();
        session.set_cursor(Vec3::new(2.5, 0.0, 3.5));
        session.select_prefab("Wall").expect("spawn");
        session.rotate_active(RotationDirection::Left).expect("rotate");
        let SessionOutcome::Placed { footprint, .. } = session.commit_placement().expect("commit")
        else {
            panic!("expected placement");
        };
        assert_eq!(footprint.origin, CellCoord::new(2, 1));
        assert_eq!(
            session.occupancy().occupied_cells(),
            cells(&[(2, 1), (2, 2), (2, 3)])
        );

        let mut restored = session_with(ReleasePolicy::Retain);
        restored.apply_save_document(&session.save_document());
        assert_eq!(
            restored.occupancy().occupied_cells(),
            session.occupancy().occupied_cells()
        );
    }

    #[test]
    fn load_replaces_everything_including_the_active_object() {
        let mut session = session_with(ReleasePolicy::Retain);
        place_wall_at(&mut session, Vec3::new(0.5, 0.0, 0.5));
        let id = place_wall_at(&mut session, Vec3::new(0.5, 0.0, 9.5));
        session.shift_placed(id, 1, 0).expect("shift");
        session.select_prefab("Tower").expect("spawn");

        let document = SaveDocument {
            placed_objects: vec![
                SavedObject {
                    prefab_name: "Tower".to_string(),
                    position: SavedVec3 {
                        x: 4.5,
                        y: 0.0,
                        z: 4.5,
                    },
                    rotation: SavedVec3::default(),
                    material_index: 0,
                },
                SavedObject {
                    prefab_name: "Statue".to_string(),
                    position: SavedVec3::default(),
                    rotation: SavedVec3::default(),
                    material_index: 0,
                },
            ],
        };
        let outcome = session.apply_save_document(&document);

        let LoadOutcome::Loaded {
            object_count,
            warnings,
        } = outcome
        else {
            panic!("expected load");
        };
        assert_eq!(object_count, 1);
        assert_eq!(warnings.len(), 1);
        assert_eq!(session.object_count(), 1);
        assert_eq!(session.following_count(), 0);
        assert_eq!(session.pending_move_count(), 0);
        assert_eq!(session.visual_state().active, None);
        assert_eq!(session.occupancy().occupied_cells(), cells(&[(4, 4)]));
    }

    #[test]
    fn missing_save_is_a_no_op() {
        let temp = TempDir::new().expect("temp");
        let store = SaveStore::in_dir(temp.path());
        let mut session = session();
        let id = place_wall_at(&mut session, Vec3::new(0.5, 0.0, 0.5));

        assert_eq!(session.load(&store).expect("load"), LoadOutcome::NothingToLoad);
        assert_eq!(session.placed_ids(), &[id]);
    }

    #[test]
    fn corrupt_save_leaves_session_untouched() {
        let temp = TempDir::new().expect("temp");
        let store = SaveStore::in_dir(temp.path());
        fs::write(store.path(), "{\"placedObjects\": [{\"prefabName\": 3}]}").expect("write");

        let mut session = session();
        let id = place_wall_at(&mut session, Vec3::new(2.5, 0.0, 3.5));
        let before = session.occupancy().clone();

        let err = session.load(&store).expect_err("corrupt");
        assert!(matches!(err, PersistenceError::Corrupt { .. }));
        assert_eq!(session.placed_ids(), &[id]);
        assert_eq!(session.occupancy(), &before);
    }

    #[test]
    fn empty_save_round_trips() {
        let temp = TempDir::new().expect("temp");
        let store = SaveStore::in_dir(temp.path());
        let mut session = session();
        assert_eq!(session.save(&store).expect("save"), 0);
        assert_eq!(
            session.load(&store).expect("load"),
            LoadOutcome::Loaded {
                object_count: 0,
                warnings: Vec::new(),
            }
        );
    }
}
