mod atomic_io;
mod catalog;
mod loader;
mod save;

pub use catalog::{Material, MaterialPalette, PrefabCatalog, PrefabDef, PrefabId};
pub use loader::{
    load_content, parse_content_document, ContentError, ContentErrorCode, ContentSet,
    SourceLocation,
};
pub use save::{
    encode_save_document, parse_save_document, PersistenceError, SaveDocument, SaveStore,
    SavedObject, SavedVec3, SAVE_FILE_NAME,
};
