use crate::world::Vec3;

use super::object::ObjectId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// Hotbar slot, zero based (`1` on the keyboard is slot 0).
    Slot(usize),
    Save,
    Load,
    Cancel,
}

impl Key {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "1" | "2" | "3" => token
                .parse::<usize>()
                .ok()
                .map(|digit| Self::Slot(digit - 1)),
            "s" | "S" | "save" => Some(Self::Save),
            "l" | "L" | "load" => Some(Self::Load),
            "esc" | "escape" | "cancel" => Some(Self::Cancel),
            _ => None,
        }
    }
}

/// Already-resolved input, one event per discrete action. Raycasts are done by the
/// caller: a primary press carries the object under the pointer, if any.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    KeyPressed(Key),
    PointerPrimaryPressed { target: Option<ObjectId> },
    PointerPrimaryReleased,
    PointerSecondaryPressed,
    PointerScroll(f32),
    PointerMoved(Vec3),
    ModifierChanged(bool),
    MaterialButtonPressed,
}
