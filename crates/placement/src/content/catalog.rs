use std::collections::HashMap;

use crate::world::BoxBounds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrefabId(pub u32);

#[derive(Debug, Clone, PartialEq)]
pub struct PrefabDef {
    pub id: PrefabId,
    pub name: String,
    pub label: String,
    pub bounds: BoxBounds,
    pub default_material: Option<String>,
}

impl PrefabDef {
    pub fn new(name: impl Into<String>, bounds: BoxBounds) -> Self {
        let name = name.into();
        Self {
            id: PrefabId(0),
            label: name.clone(),
            name,
            bounds,
            default_material: None,
        }
    }

    pub fn with_default_material(mut self, material: impl Into<String>) -> Self {
        self.default_material = Some(material.into());
        self
    }
}

/// Ordered prefab list. Position in the list is both the id and the hotbar slot.
#[derive(Debug, Default, Clone)]
pub struct PrefabCatalog {
    prefabs: Vec<PrefabDef>,
    ids_by_name: HashMap<String, PrefabId>,
}

impl PrefabCatalog {
    pub fn from_prefabs(mut prefabs: Vec<PrefabDef>) -> Self {
        let mut ids_by_name = HashMap::with_capacity(prefabs.len());
        for (idx, def) in prefabs.iter_mut().enumerate() {
            let id = PrefabId(idx as u32);
            def.id = id;
            ids_by_name.entry(def.name.clone()).or_insert(id);
        }
        Self {
            prefabs,
            ids_by_name,
        }
    }

    pub fn prefab_id_by_name(&self, name: &str) -> Option<PrefabId> {
        self.ids_by_name.get(name).copied()
    }

    pub fn prefab(&self, id: PrefabId) -> Option<&PrefabDef> {
        self.prefabs.get(id.0 as usize)
    }

    pub fn prefab_by_name(&self, name: &str) -> Option<&PrefabDef> {
        self.prefab_id_by_name(name).and_then(|id| self.prefab(id))
    }

    pub fn slot(&self, slot: usize) -> Option<&PrefabDef> {
        self.prefabs.get(slot)
    }

    pub fn prefabs(&self) -> &[PrefabDef] {
        &self.prefabs
    }

    pub fn len(&self) -> usize {
        self.prefabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefabs.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Material {
    pub name: String,
    pub color: [u8; 3],
}

impl Material {
    pub fn new(name: impl Into<String>, color: [u8; 3]) -> Self {
        Self {
            name: name.into(),
            color,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MaterialPalette {
    materials: Vec<Material>,
}

impl MaterialPalette {
    pub fn new(materials: Vec<Material>) -> Self {
        Self { materials }
    }

    pub fn get(&self, index: usize) -> Option<&Material> {
        self.materials.get(index)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.materials
            .iter()
            .position(|material| material.name == name)
    }

    pub fn contains_index(&self, index: usize) -> bool {
        index < self.materials.len()
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}
