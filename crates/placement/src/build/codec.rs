use thiserror::Error;
use tracing::warn;

use crate::content::{MaterialPalette, PrefabCatalog, SaveDocument, SavedObject, SavedVec3};
use crate::world::{GridMapper, Pose, Yaw};

use super::object::{ObjectIdAllocator, PlaceableObject};

/// Non-fatal problems found while restoring a save document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadWarning {
    #[error("placedObjects[{record}]: prefab not found: {prefab_name}")]
    PrefabNotFound { record: usize, prefab_name: String },
    #[error(
        "placedObjects[{record}]: material index {material_index} outside palette of {palette_len}; keeping default material"
    )]
    MaterialIndexOutOfRange {
        record: usize,
        material_index: i32,
        palette_len: usize,
    },
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub objects: Vec<PlaceableObject>,
    pub warnings: Vec<LoadWarning>,
    /// Palette index applied by the last record that carried a valid one.
    pub last_applied_material: Option<usize>,
}

pub fn serialize_placed<'a>(objects: impl IntoIterator<Item = &'a PlaceableObject>) -> SaveDocument {
    SaveDocument {
        placed_objects: objects
            .into_iter()
            .map(|object| SavedObject {
                prefab_name: object.prefab_name().to_string(),
                position: SavedVec3::from_vec3(object.position()),
                rotation: SavedVec3::from_vec3(object.pose().yaw.euler_degrees()),
                material_index: i32::try_from(object.material_index()).unwrap_or(i32::MAX),
            })
            .collect(),
    }
}

/// Rebuilds placed objects from `document`. Records naming an unknown prefab are
/// skipped; out-of-range material indices fall back to the prefab default.
pub fn deserialize_placed(
    document: &SaveDocument,
    catalog: &PrefabCatalog,
    palette: &MaterialPalette,
    mapper: &GridMapper,
    ids: &mut ObjectIdAllocator,
) -> LoadReport {
    let mut report = LoadReport::default();

    for (record, saved) in document.placed_objects.iter().enumerate() {
        let Some(prefab) = catalog.prefab_by_name(&saved.prefab_name) else {
            let warning = LoadWarning::PrefabNotFound {
                record,
                prefab_name: saved.prefab_name.clone(),
            };
            warn!(warning = %warning, "save_record_skipped");
            report.warnings.push(warning);
            continue;
        };

        let default_material = prefab
            .default_material
            .as_deref()
            .and_then(|name| palette.index_of(name))
            .unwrap_or(0);
        let material_index = match usize::try_from(saved.material_index) {
            Ok(index) if palette.contains_index(index) => {
                report.last_applied_material = Some(index);
                index
            }
            _ => {
                let warning = LoadWarning::MaterialIndexOutOfRange {
                    record,
                    material_index: saved.material_index,
                    palette_len: palette.len(),
                };
                warn!(warning = %warning, "save_material_ignored");
                report.warnings.push(warning);
                default_material
            }
        };

        let pose = Pose::new(
            saved.position.to_vec3(),
            Yaw::from_degrees(saved.rotation.y),
        );
        report.objects.push(PlaceableObject::restore_placed(
            ids.allocate(),
            prefab,
            pose,
            material_index,
            mapper,
        ));
    }

    report
}
