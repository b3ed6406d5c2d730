use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};
use tracing::info;

use crate::world::{BoxBounds, Vec3};

use super::catalog::{Material, MaterialPalette, PrefabCatalog, PrefabDef, PrefabId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentErrorCode {
    ReadFile,
    XmlMalformed,
    InvalidRoot,
    UnknownElement,
    UnknownField,
    DuplicateField,
    MissingField,
    InvalidValue,
    DuplicateName,
    UnknownMaterial,
}

#[derive(Debug, Clone)]
pub struct ContentError {
    pub code: ContentErrorCode,
    pub message: String,
    pub file_path: PathBuf,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for ContentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(
                f,
                "{:?}: {} (file={}, line={}, column={})",
                self.code,
                self.message,
                self.file_path.display(),
                loc.line,
                loc.column
            ),
            None => write!(
                f,
                "{:?}: {} (file={})",
                self.code,
                self.message,
                self.file_path.display()
            ),
        }
    }
}

impl std::error::Error for ContentError {}

/// Prefab catalog and material palette loaded together from one content file.
#[derive(Debug, Clone, Default)]
pub struct ContentSet {
    pub catalog: PrefabCatalog,
    pub palette: MaterialPalette,
}

pub fn load_content(path: &Path) -> Result<ContentSet, ContentError> {
    let raw = fs::read_to_string(path).map_err(|source| ContentError {
        code: ContentErrorCode::ReadFile,
        message: format!("failed to read content file: {source}"),
        file_path: path.to_path_buf(),
        location: None,
    })?;
    let content = parse_content_document(path, &raw)?;
    info!(
        path = %path.display(),
        prefab_count = content.catalog.len(),
        material_count = content.palette.len(),
        "content_loaded"
    );
    Ok(content)
}

pub fn parse_content_document(file_path: &Path, raw: &str) -> Result<ContentSet, ContentError> {
    let doc = Document::parse(raw).map_err(|error| ContentError {
        code: ContentErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
    })?;

    let root = doc.root_element();
    if root.tag_name().name() != "Content" {
        return Err(error_at_node(
            ContentErrorCode::InvalidRoot,
            "root element must be <Content>".to_string(),
            file_path,
            &doc,
            root,
        ));
    }

    let mut prefabs = Vec::<(PrefabDef, Node<'_, '_>)>::new();
    let mut materials = Vec::<Material>::new();
    let mut prefab_names = HashSet::<String>::new();
    let mut material_names = HashSet::<String>::new();

    for child in root.children().filter(|node| node.is_element()) {
        match child.tag_name().name() {
            "Prefab" => {
                let def = parse_prefab(file_path, &doc, child)?;
                if !prefab_names.insert(def.name.clone()) {
                    return Err(error_at_node(
                        ContentErrorCode::DuplicateName,
                        format!("duplicate Prefab '{}'", def.name),
                        file_path,
                        &doc,
                        child,
                    ));
                }
                prefabs.push((def, child));
            }
            "Material" => {
                let material = parse_material(file_path, &doc, child)?;
                if !material_names.insert(material.name.clone()) {
                    return Err(error_at_node(
                        ContentErrorCode::DuplicateName,
                        format!("duplicate Material '{}'", material.name),
                        file_path,
                        &doc,
                        child,
                    ));
                }
                materials.push(material);
            }
            other => {
                return Err(error_at_node(
                    ContentErrorCode::UnknownElement,
                    format!("unsupported element <{other}>; expected <Prefab> or <Material>"),
                    file_path,
                    &doc,
                    child,
                ))
            }
        }
    }

    // Materials may be declared after the prefabs that reference them.
    for (def, node) in &prefabs {
        if let Some(material) = &def.default_material {
            if !material_names.contains(material) {
                return Err(error_at_node(
                    ContentErrorCode::UnknownMaterial,
                    format!(
                        "Prefab '{}' references unknown material '{material}'",
                        def.name
                    ),
                    file_path,
                    &doc,
                    *node,
                ));
            }
        }
    }

    Ok(ContentSet {
        catalog: PrefabCatalog::from_prefabs(prefabs.into_iter().map(|(def, _)| def).collect()),
        palette: MaterialPalette::new(materials),
    })
}

fn parse_prefab(
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
) -> Result<PrefabDef, ContentError> {
    let mut seen_fields = HashSet::<String>::new();
    let mut name: Option<String> = None;
    let mut label: Option<String> = None;
    let mut center: Option<Vec3> = None;
    let mut size: Option<Vec3> = None;
    let mut default_material: Option<String> = None;

    for field in node.children().filter(|child| child.is_element()) {
        let field_name = field.tag_name().name().to_string();
        if !seen_fields.insert(field_name.clone()) {
            return Err(error_at_node(
                ContentErrorCode::DuplicateField,
                format!("duplicate field <{field_name}> in <Prefab>"),
                file_path,
                doc,
                field,
            ));
        }

        match field_name.as_str() {
            "name" => name = Some(required_text(file_path, doc, field, "name")?),
            "label" => label = Some(required_text(file_path, doc, field, "label")?),
            "center" => center = Some(parse_vec3(file_path, doc, field, "center")?),
            "size" => {
                let value = parse_vec3(file_path, doc, field, "size")?;
                if value.x <= 0.0 || value.y <= 0.0 || value.z <= 0.0 {
                    return Err(error_at_node(
                        ContentErrorCode::InvalidValue,
                        "size components must be > 0".to_string(),
                        file_path,
                        doc,
                        field,
                    ));
                }
                size = Some(value);
            }
            "defaultMaterial" => {
                default_material = Some(required_text(file_path, doc, field, "defaultMaterial")?)
            }
            _ => {
                return Err(error_at_node(
                    ContentErrorCode::UnknownField,
                    format!("unknown field <{field_name}> in <Prefab>"),
                    file_path,
                    doc,
                    field,
                ))
            }
        }
    }

    let Some(name) = name else {
        return Err(missing_field(file_path, doc, node, "name", "Prefab"));
    };
    let Some(size) = size else {
        return Err(missing_field(file_path, doc, node, "size", "Prefab"));
    };

    Ok(PrefabDef {
        id: PrefabId(0),
        label: label.unwrap_or_else(|| name.clone()),
        name,
        bounds: BoxBounds::new(center.unwrap_or(Vec3::ZERO), size),
        default_material,
    })
}

fn parse_material(
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
) -> Result<Material, ContentError> {
    let mut seen_fields = HashSet::<String>::new();
    let mut name: Option<String> = None;
    let mut color: Option<[u8; 3]> = None;

    for field in node.children().filter(|child| child.is_element()) {
        let field_name = field.tag_name().name().to_string();
        if !seen_fields.insert(field_name.clone()) {
            return Err(error_at_node(
                ContentErrorCode::DuplicateField,
                format!("duplicate field <{field_name}> in <Material>"),
                file_path,
                doc,
                field,
            ));
        }
        match field_name.as_str() {
            "name" => name = Some(required_text(file_path, doc, field, "name")?),
            "color" => {
                let value = required_text(file_path, doc, field, "color")?;
                let parsed = parse_hex_color(&value).ok_or_else(|| {
                    error_at_node(
                        ContentErrorCode::InvalidValue,
                        format!("color '{value}' must look like #rrggbb"),
                        file_path,
                        doc,
                        field,
                    )
                })?;
                color = Some(parsed);
            }
            _ => {
                return Err(error_at_node(
                    ContentErrorCode::UnknownField,
                    format!("unknown field <{field_name}> in <Material>"),
                    file_path,
                    doc,
                    field,
                ))
            }
        }
    }

    let Some(name) = name else {
        return Err(missing_field(file_path, doc, node, "name", "Material"));
    };
    Ok(Material {
        name,
        color: color.unwrap_or([255, 255, 255]),
    })
}

fn parse_vec3(
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
    field_name: &str,
) -> Result<Vec3, ContentError> {
    let value = required_text(file_path, doc, node, field_name)?;
    let parts = value
        .split_whitespace()
        .map(str::parse::<f32>)
        .collect::<Result<Vec<_>, _>>()
        .ok()
        .filter(|parts| parts.len() == 3 && parts.iter().all(|part| part.is_finite()));
    match parts.as_deref() {
        Some([x, y, z]) => Ok(Vec3::new(*x, *y, *z)),
        _ => Err(error_at_node(
            ContentErrorCode::InvalidValue,
            format!("{field_name} '{value}' must be three finite numbers"),
            file_path,
            doc,
            node,
        )),
    }
}

fn parse_hex_color(value: &str) -> Option<[u8; 3]> {
    let hex = value.strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
    Some([channel(0..2)?, channel(2..4)?, channel(4..6)?])
}

fn required_text(
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
    field_name: &str,
) -> Result<String, ContentError> {
    let value = node.text().map(str::trim).unwrap_or_default().to_string();
    if value.is_empty() {
        return Err(error_at_node(
            ContentErrorCode::MissingField,
            format!("field <{field_name}> must not be empty"),
            file_path,
            doc,
            node,
        ));
    }
    Ok(value)
}

fn missing_field(
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
    field_name: &str,
    element: &str,
) -> ContentError {
    error_at_node(
        ContentErrorCode::MissingField,
        format!("missing required field <{field_name}> in <{element}>"),
        file_path,
        doc,
        node,
    )
}

fn error_at_node(
    code: ContentErrorCode,
    message: String,
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
) -> ContentError {
    let pos = doc.text_pos_at(node.range().start);
    ContentError {
        code,
        message,
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: pos.row as usize,
            column: pos.col as usize,
        }),
    }
}
