use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::world::Vec3;

use super::atomic_io::replace_file_contents;

pub const SAVE_FILE_NAME: &str = "saved_game.json";

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SavedVec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl SavedVec3 {
    pub fn from_vec3(value: Vec3) -> Self {
        Self {
            x: value.x,
            y: value.y,
            z: value.z,
        }
    }

    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }
}

/// One placed object. Identifies the prefab kind by name, never the instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedObject {
    pub prefab_name: String,
    pub position: SavedVec3,
    pub rotation: SavedVec3,
    pub material_index: i32,
}

/// Whole-layout save. Loading replaces the placed set entirely; there is no version field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveDocument {
    #[serde(default)]
    pub placed_objects: Vec<SavedObject>,
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to read save file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write save file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode save document: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("save file {path} is corrupt at {json_path}: {source}")]
    Corrupt {
        path: PathBuf,
        json_path: String,
        #[source]
        source: serde_json::Error,
    },
}

pub fn encode_save_document(document: &SaveDocument) -> Result<String, PersistenceError> {
    serde_json::to_string_pretty(document).map_err(PersistenceError::Encode)
}

pub fn parse_save_document(path: &Path, raw: &str) -> Result<SaveDocument, PersistenceError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, SaveDocument>(&mut deserializer).map_err(|error| {
        let json_path = match error.path().to_string() {
            segments if segments.is_empty() || segments == "." => "<root>".to_string(),
            segments => segments,
        };
        PersistenceError::Corrupt {
            path: path.to_path_buf(),
            json_path,
            source: error.into_inner(),
        }
    })
}

/// File-backed home of the save document.
#[derive(Debug, Clone)]
pub struct SaveStore {
    path: PathBuf,
}

impl SaveStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(SAVE_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn write(&self, document: &SaveDocument) -> Result<(), PersistenceError> {
        let json = encode_save_document(document)?;
        replace_file_contents(&self.path, &json).map_err(|source| PersistenceError::Write {
            path: self.path.clone(),
            source,
        })?;
        info!(
            path = %self.path.display(),
            object_count = document.placed_objects.len(),
            "save_written"
        );
        Ok(())
    }

    /// `Ok(None)` when no save exists yet.
    pub fn read(&self) -> Result<Option<SaveDocument>, PersistenceError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(PersistenceError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        parse_save_document(&self.path, &raw).map(Some)
    }
}
