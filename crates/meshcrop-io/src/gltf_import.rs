//! glTF 2.0 and GLB parser built on the `gltf` crate.

use std::collections::HashSet;

use gltf::accessor::{DataType, Dimensions};
use gltf::buffer::Source;
use gltf::mesh::Semantic;
use meshcrop_math::Transform;
use meshcrop_scene::{Attribute, Geometry, Material, Mesh, NodeKind, SceneNode, NORMAL, POSITION};

use crate::error::ParseError;
use crate::parser::{ByteProgress, ExternalResources, MeshParser};
use crate::source::decode_data_url;

/// Extensions that change how vertex data is stored.
const UNSUPPORTED_EXTENSIONS: [&str; 3] = [
    "KHR_draco_mesh_compression",
    "EXT_meshopt_compression",
    "KHR_mesh_quantization",
];

/// Parser for both glTF containers.
///
/// Reads the default scene, or every parentless node when the file declares
/// no scene. Buffers come from the GLB binary chunk, `data:` URIs, or the
/// external resources handed to [`MeshParser::parse_with_resources`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GltfParser;

impl MeshParser for GltfParser {
    fn name(&self) -> &'static str {
        "gltf"
    }

    fn parse(
        &self,
        bytes: &[u8],
        progress: &mut dyn FnMut(ByteProgress),
    ) -> Result<Vec<SceneNode>, ParseError> {
        self.parse_with_resources(bytes, &ExternalResources::new(), progress)
    }

    fn external_references(&self, bytes: &[u8]) -> Result<Vec<String>, ParseError> {
        let gltf = gltf::Gltf::from_slice(bytes)?;
        let mut references: Vec<String> = Vec::new();
        for buffer in gltf.document.buffers() {
            if let Source::Uri(uri) = buffer.source() {
                if !uri.starts_with("data:") && !references.iter().any(|r| r == uri) {
                    references.push(uri.to_string());
                }
            }
        }
        Ok(references)
    }

    fn parse_with_resources(
        &self,
        bytes: &[u8],
        resources: &ExternalResources,
        progress: &mut dyn FnMut(ByteProgress),
    ) -> Result<Vec<SceneNode>, ParseError> {
        let total = bytes.len() as u64;
        progress(ByteProgress {
            loaded: 0,
            total: Some(total),
        });

        let gltf::Gltf { document, blob } = gltf::Gltf::from_slice(bytes)?;
        if let Some(ext) = document
            .extensions_required()
            .find(|ext| UNSUPPORTED_EXTENSIONS.contains(ext))
        {
            return Err(ParseError::Unsupported(format!(
                "required extension {ext}"
            )));
        }
        let buffers = load_buffers(&document, blob, resources)?;

        let roots = match document.default_scene().or_else(|| document.scenes().next()) {
            Some(scene) => scene
                .nodes()
                .map(|node| convert_node(&node, &buffers))
                .collect::<Result<Vec<_>, _>>()?,
            None => {
                let children: HashSet<usize> = document
                    .nodes()
                    .flat_map(|node| node.children().map(|child| child.index()))
                    .collect();
                document
                    .nodes()
                    .filter(|node| !children.contains(&node.index()))
                    .map(|node| convert_node(&node, &buffers))
                    .collect::<Result<Vec<_>, _>>()?
            }
        };

        progress(ByteProgress {
            loaded: total,
            total: Some(total),
        });
        tracing::debug!(roots = roots.len(), bytes = total, "parsed glTF");
        Ok(roots)
    }
}

fn load_buffers(
    document: &gltf::Document,
    mut blob: Option<Vec<u8>>,
    resources: &ExternalResources,
) -> Result<Vec<Vec<u8>>, ParseError> {
    let mut buffers = Vec::with_capacity(document.buffers().len());
    for buffer in document.buffers() {
        let index = buffer.index();
        let mut data = match buffer.source() {
            Source::Bin => blob.take().ok_or_else(|| ParseError::Buffer {
                index,
                reason: "GLB binary chunk is missing".to_string(),
            })?,
            Source::Uri(uri) if uri.starts_with("data:") => decode_data_url(uri)
                .map(|(_, bytes)| bytes)
                .map_err(|err| ParseError::Buffer {
                    index,
                    reason: err.to_string(),
                })?,
            Source::Uri(uri) => resources
                .get(uri)
                .ok_or_else(|| ParseError::MissingResource(uri.to_string()))?
                .to_vec(),
        };
        if data.len() < buffer.length() {
            return Err(ParseError::Buffer {
                index,
                reason: format!("{} bytes, {} declared", data.len(), buffer.length()),
            });
        }
        while data.len() % 4 != 0 {
            data.push(0);
        }
        buffers.push(data);
    }
    Ok(buffers)
}

fn convert_node(node: &gltf::Node, buffers: &[Vec<u8>]) -> Result<SceneNode, ParseError> {
    let name = node.name().map(str::to_string);
    let mut kind = NodeKind::Group;
    let mut children = Vec::new();

    if let Some(mesh) = node.mesh() {
        let mut primitives = mesh
            .primitives()
            .map(|primitive| convert_primitive(&primitive, buffers))
            .collect::<Result<Vec<_>, _>>()?;
        if primitives.len() == 1 {
            kind = primitives.remove(0);
        } else {
            let mesh_name = mesh.name().unwrap_or("mesh");
            children.extend(primitives.into_iter().enumerate().map(|(i, kind)| {
                SceneNode::new(Some(format!("{mesh_name}.{i}")), kind)
            }));
        }
    } else if node.camera().is_some() {
        kind = NodeKind::Other;
    }

    for child in node.children() {
        children.push(convert_node(&child, buffers)?);
    }

    let mut out = SceneNode::new(name, kind).with_transform(node_transform(node));
    out.children = children;
    Ok(out)
}

fn node_transform(node: &gltf::Node) -> Transform {
    let columns = node.transform().matrix();
    let mut values = [0.0f64; 16];
    for (c, column) in columns.iter().enumerate() {
        for (r, v) in column.iter().enumerate() {
            values[c * 4 + r] = f64::from(*v);
        }
    }
    Transform::from_column_major(&values)
}

fn convert_primitive(
    primitive: &gltf::Primitive,
    buffers: &[Vec<u8>],
) -> Result<NodeKind, ParseError> {
    if primitive.mode() != gltf::mesh::Mode::Triangles {
        tracing::warn!(mode = ?primitive.mode(), "keeping non-triangle primitive as an inert node");
        return Ok(NodeKind::Other);
    }

    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
    let mut geometry = Geometry::new();

    for (semantic, accessor) in primitive.attributes() {
        let normalized_ints = matches!(accessor.data_type(), DataType::U8 | DataType::U16);
        let (name, attribute) = match &semantic {
            Semantic::Positions => (
                POSITION.to_string(),
                reader
                    .read_positions()
                    .map(|it| Attribute::new(3, it.flatten().collect())),
            ),
            Semantic::Normals => (
                NORMAL.to_string(),
                reader
                    .read_normals()
                    .map(|it| Attribute::new(3, it.flatten().collect())),
            ),
            Semantic::Tangents => (
                "TANGENT".to_string(),
                reader
                    .read_tangents()
                    .map(|it| Attribute::new(4, it.flatten().collect())),
            ),
            Semantic::TexCoords(set) => (
                format!("TEXCOORD_{set}"),
                (normalized_ints || accessor.data_type() == DataType::F32)
                    .then(|| reader.read_tex_coords(*set))
                    .flatten()
                    .map(|it| Attribute::new(2, it.into_f32().flatten().collect())),
            ),
            Semantic::Colors(set) => (
                format!("COLOR_{set}"),
                (normalized_ints || accessor.data_type() == DataType::F32)
                    .then(|| reader.read_colors(*set))
                    .flatten()
                    .map(|it| Attribute::new(4, it.into_rgba_f32().flatten().collect())),
            ),
            Semantic::Joints(set) => (
                format!("JOINTS_{set}"),
                normalized_ints
                    .then(|| reader.read_joints(*set))
                    .flatten()
                    .map(|it| Attribute::new(4, it.into_u16().flatten().map(f32::from).collect())),
            ),
            Semantic::Weights(set) => (
                format!("WEIGHTS_{set}"),
                (normalized_ints || accessor.data_type() == DataType::F32)
                    .then(|| reader.read_weights(*set))
                    .flatten()
                    .map(|it| Attribute::new(4, it.into_f32().flatten().collect())),
            ),
            Semantic::Extras(name) => (
                name.trim_start_matches('_').to_string(),
                read_float_channel(&accessor, buffers),
            ),
            #[allow(unreachable_patterns)]
            _ => continue,
        };
        match attribute {
            Some(attribute) => geometry.set_attribute(name, attribute),
            None => tracing::warn!(
                channel = %name,
                data_type = ?accessor.data_type(),
                "skipping unreadable vertex channel"
            ),
        }
    }
    if let Some(indices) = reader.read_indices() {
        geometry = geometry.with_indices(indices.into_u32().collect());
    }

    let material = primitive.material();
    let material = material.index().map(|_| Material {
        name: material.name().map(str::to_string),
        base_color: material.pbr_metallic_roughness().base_color_factor(),
    });

    Ok(NodeKind::Mesh(Mesh { geometry, material }))
}

/// Application channel stored as plain floats.
fn read_float_channel(accessor: &gltf::Accessor, buffers: &[Vec<u8>]) -> Option<Attribute> {
    use gltf::accessor::Iter;

    if accessor.data_type() != DataType::F32 {
        return None;
    }
    let data = |buffer: gltf::Buffer| buffers.get(buffer.index()).map(Vec::as_slice);
    match accessor.dimensions() {
        Dimensions::Scalar => Iter::<f32>::new(accessor.clone(), data)
            .map(|it| Attribute::new(1, it.collect())),
        Dimensions::Vec2 => Iter::<[f32; 2]>::new(accessor.clone(), data)
            .map(|it| Attribute::new(2, it.flatten().collect())),
        Dimensions::Vec3 => Iter::<[f32; 3]>::new(accessor.clone(), data)
            .map(|it| Attribute::new(3, it.flatten().collect())),
        Dimensions::Vec4 => Iter::<[f32; 4]>::new(accessor.clone(), data)
            .map(|it| Attribute::new(4, it.flatten().collect())),
        _ => None,
    }
}
