//! Binary glTF (GLB) writer.

use meshcrop_scene::{Attribute, Geometry, Material, NodeKind, SceneNode, POSITION};
use serde_json::{json, Map, Value};

use crate::error::ExportError;

/// GLB magic number: "glTF"
const GLB_MAGIC: u32 = 0x4654_6C67;
/// GLB version 2
const GLB_VERSION: u32 = 2;
/// JSON chunk type
const CHUNK_TYPE_JSON: u32 = 0x4E4F_534A;
/// BIN chunk type
const CHUNK_TYPE_BIN: u32 = 0x004E_4942;

/// glTF component types
const FLOAT: u32 = 5126;
const UNSIGNED_SHORT: u32 = 5123;
const UNSIGNED_INT: u32 = 5125;

/// glTF buffer view targets
const ARRAY_BUFFER: u32 = 34962;
const ELEMENT_ARRAY_BUFFER: u32 = 34963;

/// Serializes a scene graph.
pub trait MeshExporter {
    /// Encode the tree under `root`, root transform included.
    fn export(&self, root: &SceneNode) -> Result<Vec<u8>, ExportError>;
}

/// Writes a single-scene GLB whose only root node is the exported root.
#[derive(Debug, Clone)]
pub struct GlbExporter {
    generator: String,
}

impl GlbExporter {
    /// Exporter stamping `generator` into the asset block.
    pub fn new(generator: impl Into<String>) -> Self {
        Self {
            generator: generator.into(),
        }
    }
}

impl Default for GlbExporter {
    fn default() -> Self {
        Self::new(concat!("meshcrop ", env!("CARGO_PKG_VERSION")))
    }
}

impl MeshExporter for GlbExporter {
    fn export(&self, root: &SceneNode) -> Result<Vec<u8>, ExportError> {
        let mut doc = DocumentBuilder::default();
        let root_index = doc.push_node(root);

        let mut gltf = json!({
            "asset": {
                "version": "2.0",
                "generator": self.generator
            },
            "scene": 0,
            "scenes": [{ "nodes": [root_index] }],
            "nodes": doc.nodes,
        });
        if !doc.meshes.is_empty() {
            gltf["meshes"] = Value::Array(doc.meshes);
            gltf["accessors"] = Value::Array(doc.accessors);
            gltf["bufferViews"] = Value::Array(doc.buffer_views);
            gltf["buffers"] = json!([{ "byteLength": doc.bin.len() }]);
        }
        if !doc.materials.is_empty() {
            gltf["materials"] = Value::Array(doc.materials);
        }

        let glb = assemble(serde_json::to_vec(&gltf)?, doc.bin)?;
        tracing::info!(bytes = glb.len(), nodes = root.node_count(), "exported GLB");
        Ok(glb)
    }
}

#[derive(Default)]
struct DocumentBuilder {
    bin: Vec<u8>,
    nodes: Vec<Value>,
    meshes: Vec<Value>,
    materials: Vec<Value>,
    accessors: Vec<Value>,
    buffer_views: Vec<Value>,
}

impl DocumentBuilder {
    /// Append `node` and its subtree; returns its index.
    fn push_node(&mut self, node: &SceneNode) -> usize {
        let index = self.nodes.len();
        self.nodes.push(Value::Null);

        let mut out = Map::new();
        if let Some(name) = &node.name {
            out.insert("name".into(), json!(name));
        }
        let local = node.local_transform();
        if !local.is_identity(1e-12) {
            out.insert("matrix".into(), json!(local.to_column_major()));
        }
        if let NodeKind::Mesh(mesh) = &node.kind {
            if let Some(mesh_index) = self.push_mesh(node.name.as_deref(), &mesh.geometry, mesh.material.as_ref()) {
                out.insert("mesh".into(), json!(mesh_index));
            }
        }

        let children: Vec<usize> = node.children.iter().map(|child| self.push_node(child)).collect();
        if !children.is_empty() {
            out.insert("children".into(), json!(children));
        }

        self.nodes[index] = Value::Object(out);
        index
    }

    /// Append a mesh; `None` when the geometry has nothing to draw.
    fn push_mesh(
        &mut self,
        name: Option<&str>,
        geometry: &Geometry,
        material: Option<&Material>,
    ) -> Option<usize> {
        if geometry.vertex_count() == 0 || geometry.triangle_count() == 0 {
            return None;
        }

        let mut attributes = Map::new();
        for (channel, attribute) in geometry.attributes() {
            let Some(kind) = accessor_type(attribute.item_size()) else {
                tracing::warn!(channel, item_size = attribute.item_size(), "skipping channel with no glTF accessor type");
                continue;
            };
            // Joint indices must be integers for readers to accept them.
            let (bytes, component_type) = if channel.starts_with("JOINTS_") && attribute.item_size() == 4 {
                (joints_to_bytes(attribute.values()), UNSIGNED_SHORT)
            } else {
                (floats_to_bytes(attribute.values()), FLOAT)
            };
            let view = self.push_view(&bytes, ARRAY_BUFFER);
            let mut accessor = json!({
                "bufferView": view,
                "byteOffset": 0,
                "componentType": component_type,
                "count": attribute.count(),
                "type": kind
            });
            if channel == POSITION {
                let (min, max) = position_bounds(attribute);
                accessor["min"] = json!(min);
                accessor["max"] = json!(max);
            }
            self.accessors.push(accessor);
            attributes.insert(semantic_name(channel), json!(self.accessors.len() - 1));
        }

        let mut primitive = json!({ "attributes": attributes });
        if let Some(indices) = geometry.indices() {
            let view = self.push_view(&u32s_to_bytes(indices), ELEMENT_ARRAY_BUFFER);
            self.accessors.push(json!({
                "bufferView": view,
                "byteOffset": 0,
                "componentType": UNSIGNED_INT,
                "count": indices.len(),
                "type": "SCALAR"
            }));
            primitive["indices"] = json!(self.accessors.len() - 1);
        }
        if let Some(material) = material {
            let mut out = json!({
                "pbrMetallicRoughness": { "baseColorFactor": material.base_color }
            });
            if let Some(name) = &material.name {
                out["name"] = json!(name);
            }
            self.materials.push(out);
            primitive["material"] = json!(self.materials.len() - 1);
        }

        let mut mesh = json!({ "primitives": [primitive] });
        if let Some(name) = name {
            mesh["name"] = json!(name);
        }
        self.meshes.push(mesh);
        Some(self.meshes.len() - 1)
    }

    fn push_view(&mut self, bytes: &[u8], target: u32) -> usize {
        let offset = self.bin.len();
        self.bin.extend_from_slice(bytes);
        while self.bin.len() % 4 != 0 {
            self.bin.push(0);
        }
        self.buffer_views.push(json!({
            "buffer": 0,
            "byteOffset": offset,
            "byteLength": bytes.len(),
            "target": target
        }));
        self.buffer_views.len() - 1
    }
}

fn accessor_type(item_size: usize) -> Option<&'static str> {
    match item_size {
        1 => Some("SCALAR"),
        2 => Some("VEC2"),
        3 => Some("VEC3"),
        4 => Some("VEC4"),
        9 => Some("MAT3"),
        16 => Some("MAT4"),
        _ => None,
    }
}

/// glTF reserves bare names for its own semantics; anything else is
/// written as an application-specific `_NAME`.
fn semantic_name(channel: &str) -> String {
    const PREFIXES: [&str; 5] = ["TEXCOORD_", "COLOR_", "JOINTS_", "WEIGHTS_", "_"];
    let standard = matches!(channel, "POSITION" | "NORMAL" | "TANGENT")
        || PREFIXES.iter().any(|p| channel.starts_with(p));
    if standard {
        channel.to_string()
    } else {
        format!("_{channel}")
    }
}

fn position_bounds(positions: &Attribute) -> ([f32; 3], [f32; 3]) {
    let mut min = [f32::MAX; 3];
    let mut max = [f32::MIN; 3];
    for chunk in positions.values().chunks(positions.item_size()) {
        for axis in 0..3 {
            let v = chunk.get(axis).copied().unwrap_or(0.0);
            min[axis] = min[axis].min(v);
            max[axis] = max[axis].max(v);
        }
    }
    (min, max)
}

fn assemble(mut json_bytes: Vec<u8>, mut bin: Vec<u8>) -> Result<Vec<u8>, ExportError> {
    // JSON pads with spaces, BIN with zeros
    while json_bytes.len() % 4 != 0 {
        json_bytes.push(b' ');
    }
    while bin.len() % 4 != 0 {
        bin.push(0);
    }

    let json_len = u32::try_from(json_bytes.len()).map_err(|_| ExportError::TooLarge)?;
    let bin_len = u32::try_from(bin.len()).map_err(|_| ExportError::TooLarge)?;
    let bin_chunk = if bin.is_empty() { Some(0) } else { bin_len.checked_add(8) };
    let total = bin_chunk
        .and_then(|bin_chunk| [8, json_len, bin_chunk].iter().try_fold(12u32, |acc, n| acc.checked_add(*n)))
        .ok_or(ExportError::TooLarge)?;

    let mut glb = Vec::with_capacity(total as usize);
    glb.extend_from_slice(&GLB_MAGIC.to_le_bytes());
    glb.extend_from_slice(&GLB_VERSION.to_le_bytes());
    glb.extend_from_slice(&total.to_le_bytes());

    glb.extend_from_slice(&json_len.to_le_bytes());
    glb.extend_from_slice(&CHUNK_TYPE_JSON.to_le_bytes());
    glb.extend_from_slice(&json_bytes);

    if !bin.is_empty() {
        glb.extend_from_slice(&bin_len.to_le_bytes());
        glb.extend_from_slice(&CHUNK_TYPE_BIN.to_le_bytes());
        glb.extend_from_slice(&bin);
    }
    Ok(glb)
}

fn floats_to_bytes(data: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(data.len() * 4);
    for &f in data {
        bytes.extend_from_slice(&f.to_le_bytes());
    }
    bytes
}

fn joints_to_bytes(data: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(data.len() * 2);
    for &f in data {
        let joint = f.round().clamp(0.0, f32::from(u16::MAX)) as u16;
        bytes.extend_from_slice(&joint.to_le_bytes());
    }
    bytes
}

fn u32s_to_bytes(data: &[u32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(data.len() * 4);
    for &v in data {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{sniff_model_format, ModelFormat};
    use crate::gltf_import::GltfParser;
    use crate::parser::MeshParser;
    use approx::assert_relative_eq;
    use meshcrop_math::{Point3, Transform};
    use meshcrop_scene::{Mesh, NORMAL};

    fn quad() -> Geometry {
        Geometry::new()
            .with_attribute(
                POSITION,
                Attribute::new(
                    3,
                    vec![0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 2.0, 1.0, 0.0, 0.0, 1.0, 0.0],
                ),
            )
            .with_attribute("TEXCOORD_0", Attribute::new(2, vec![0.0; 8]))
            .with_attribute("weight", Attribute::new(1, vec![0.5; 4]))
            .with_indices(vec![0, 1, 2, 0, 2, 3])
    }

    fn chunk_header(glb: &[u8], at: usize) -> (u32, u32) {
        let word = |i: usize| u32::from_le_bytes([glb[i], glb[i + 1], glb[i + 2], glb[i + 3]]);
        (word(at), word(at + 4))
    }

    #[test]
    fn test_container_layout() {
        let root = SceneNode::group("root").with_child(SceneNode::mesh("quad", Mesh::new(quad())));
        let glb = GlbExporter::default().export(&root).unwrap();

        assert_eq!(sniff_model_format(&glb), ModelFormat::Glb);
        assert_eq!(glb.len() % 4, 0);
        let (version, total) = chunk_header(&glb, 4);
        assert_eq!(version, 2);
        assert_eq!(total as usize, glb.len());

        let (json_len, json_type) = chunk_header(&glb, 12);
        assert_eq!(json_type, CHUNK_TYPE_JSON);
        let json: Value = serde_json::from_slice(&glb[20..20 + json_len as usize]).unwrap();
        assert_eq!(json["accessors"][0]["max"], json!([2.0, 1.0, 0.0]));
        assert!(json["meshes"][0]["primitives"][0]["attributes"]["_weight"].is_number());

        let (bin_len, bin_type) = chunk_header(&glb, 20 + json_len as usize);
        assert_eq!(bin_type, CHUNK_TYPE_BIN);
        assert_eq!(28 + json_len as usize + bin_len as usize, glb.len());
    }

    #[test]
    fn test_reimport_preserves_hierarchy_and_triangles() {
        let mut root = SceneNode::group("model")
            .with_transform(Transform::translation(0.0, 0.0, 3.0))
            .with_child(SceneNode::mesh("quad", Mesh::new(quad())).with_transform(Transform::scale(2.0, 2.0, 2.0)));
        let glb = GlbExporter::default().export(&root).unwrap();

        let mut roots = GltfParser.parse(&glb, &mut |_| {}).unwrap();
        assert_eq!(roots.len(), 1);
        let back = &mut roots[0];
        assert_eq!(back.triangle_count(), 2);
        assert_eq!(back.children[0].name.as_deref(), Some("quad"));
        let geometry = back.children[0].geometry().unwrap();
        assert!(geometry.attribute("TEXCOORD_0").is_some());
        assert!(geometry.attribute(NORMAL).is_none());

        root.update_world_transforms();
        back.update_world_transforms();
        let (a, b) = (root.world_bounds(), back.world_bounds());
        assert_relative_eq!(a.min, b.min, epsilon = 1e-6);
        assert_relative_eq!(b.max, Point3::new(4.0, 2.0, 3.0), epsilon = 1e-6);
    }

    #[test]
    fn test_skin_and_custom_channels_survive_reimport() {
        let geometry = quad()
            .with_attribute("JOINTS_0", Attribute::new(4, [0.0, 1.0, 2.0, 3.0].repeat(4)))
            .with_attribute("WEIGHTS_0", Attribute::new(4, [0.25; 4].repeat(4)))
            .with_attribute("_FLOW", Attribute::new(3, vec![1.5; 12]));
        let root = SceneNode::mesh("skinned", Mesh::new(geometry));
        let glb = GlbExporter::default().export(&root).unwrap();

        let (json_len, _) = chunk_header(&glb, 12);
        let json: Value = serde_json::from_slice(&glb[20..20 + json_len as usize]).unwrap();
        let joints = &json["meshes"][0]["primitives"][0]["attributes"]["JOINTS_0"];
        let joints_accessor = &json["accessors"][joints.as_u64().unwrap() as usize];
        assert_eq!(joints_accessor["componentType"], UNSIGNED_SHORT);

        let roots = GltfParser.parse(&glb, &mut |_| {}).unwrap();
        let back = roots[0].geometry().unwrap();
        assert_eq!(back.attribute("JOINTS_0").unwrap().values()[..4], [0.0, 1.0, 2.0, 3.0]);
        assert_eq!(back.attribute("WEIGHTS_0").unwrap().values(), &[0.25; 16][..]);
        assert_eq!(back.attribute("weight").unwrap().values(), &[0.5; 4][..]);
        let flow = back.attribute("FLOW").unwrap();
        assert_eq!(flow.item_size(), 3);
        assert_eq!(flow.count(), 4);
    }

    #[test]
    fn test_empty_geometry_becomes_meshless_node() {
        let empty = Geometry::new()
            .with_attribute(POSITION, Attribute::new(3, Vec::new()))
            .with_indices(Vec::new());
        let root = SceneNode::group("root").with_child(SceneNode::mesh("gone", Mesh::new(empty)));
        let glb = GlbExporter::default().export(&root).unwrap();

        let (json_len, _) = chunk_header(&glb, 12);
        assert_eq!(20 + json_len as usize, glb.len());
        let json: Value = serde_json::from_slice(&glb[20..]).unwrap();
        assert!(json.get("meshes").is_none());
        assert_eq!(json["nodes"][1]["name"], "gone");

        let roots = GltfParser.parse(&glb, &mut |_| {}).unwrap();
        assert_eq!(roots[0].mesh_count(), 0);
        assert_eq!(roots[0].node_count(), 2);
    }

    #[test]
    fn test_materials_are_written() {
        let mut mesh = Mesh::new(quad());
        mesh.material = Some(Material {
            name: Some("paint".into()),
            base_color: [0.2, 0.4, 0.6, 1.0],
        });
        let root = SceneNode::mesh("quad", mesh);
        let glb = GlbExporter::new("test").export(&root).unwrap();
        let roots = GltfParser.parse(&glb, &mut |_| {}).unwrap();
        let NodeKind::Mesh(back) = &roots[0].kind else {
            panic!("expected mesh root");
        };
        let material = back.material.as_ref().unwrap();
        assert_eq!(material.name.as_deref(), Some("paint"));
        assert_relative_eq!(material.base_color[1], 0.4);
    }
}
