mod codec;
mod follow;
mod input;
mod object;
mod session;

pub use codec::{deserialize_placed, serialize_placed, LoadReport, LoadWarning};
pub use follow::CursorFollower;
pub use input::{InputEvent, Key};
pub use object::{
    ObjectId, ObjectIdAllocator, PlaceableObject, PlacementState, RevertOutcome,
    RotationDirection, Transition, TransitionError,
};
pub use session::{
    BuildSession, CancelAction, LoadOutcome, RejectedOperation, SessionConfig, SessionError,
    SessionOutcome, SessionSetupError, SessionVisualState,
};
