//! glTF 2.0 import via the gltf crate.
//!
//! Handles `.gltf` (with external buffers resolved by relative URI) and
//! binary `.glb`. Only triangle primitives are consumed; everything else is
//! skipped with a warning.

use crate::error::{AssetError, Result};
use crate::model::{ImportFlags, ImportTransform, ModelData, ModelPart, SourceVertex, VertexEmitter};
use glam::{Vec2, Vec3, Vec4};
use kiln_core::Aabb;
use kiln_gpu::VertexLayout;
use std::path::Path;

/// Import a glTF/GLB file from disk.
pub(crate) fn import_file(
    path: &Path,
    layout: &VertexLayout,
    transform: &ImportTransform,
    flags: ImportFlags,
) -> Result<ModelData> {
    let (document, buffers, _images) =
        gltf::import(path).map_err(|e| AssetError::Import {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

    import(&document, &buffers, layout, transform, flags)
}

/// Import all meshes of a parsed document.
pub(crate) fn import(
    document: &gltf::Document,
    buffers: &[gltf::buffer::Data],
    layout: &VertexLayout,
    transform: &ImportTransform,
    flags: ImportFlags,
) -> Result<ModelData> {
    let emitter = VertexEmitter::new(layout, transform, flags);
    let mut data = ModelData {
        layout: layout.clone(),
        vertices: Vec::new(),
        indices: Vec::new(),
        parts: Vec::new(),
        bounds: Aabb::empty(),
    };

    for mesh in document.meshes() {
        let mesh_name = mesh.name().unwrap_or("mesh").to_string();

        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                tracing::warn!(
                    mesh = %mesh_name,
                    mode = ?primitive.mode(),
                    "skipping non-triangle primitive"
                );
                continue;
            }

            let reader =
                primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| &**data));

            let Some(positions) = reader.read_positions() else {
                tracing::warn!(mesh = %mesh_name, "skipping primitive without positions");
                continue;
            };
            let positions: Vec<[f32; 3]> = positions.collect();

            let normals: Option<Vec<[f32; 3]>> = reader.read_normals().map(Iterator::collect);
            let uvs: Option<Vec<[f32; 2]>> = reader
                .read_tex_coords(0)
                .map(|iter| iter.into_f32().collect());
            let colors: Option<Vec<[f32; 3]>> = reader
                .read_colors(0)
                .map(|iter| iter.into_rgb_f32().collect());
            let tangents: Option<Vec<[f32; 4]>> = reader.read_tangents().map(Iterator::collect);

            let vertex_count = positions.len() as u32;
            let vertex_base = data.vertices.len() as u32 / layout.float_count();
            let index_base = data.indices.len() as u32;

            for (i, position) in positions.iter().enumerate() {
                let position = Vec3::from_array(*position);
                let normal = normals.as_ref().and_then(|n| n.get(i)).map(|n| Vec3::from_array(*n));

                // glTF tangents are vec4 with a handedness sign in w; the
                // bitangent is reconstructed from it when a normal exists.
                let tangent4 = tangents.as_ref().and_then(|t| t.get(i)).map(|t| Vec4::from_array(*t));
                let tangent = tangent4.map(|t| Vec3::new(t.x, t.y, t.z));
                let bitangent = match (normal, tangent4) {
                    (Some(n), Some(t)) => Some(n.cross(Vec3::new(t.x, t.y, t.z)) * t.w),
                    _ => None,
                };

                emitter.emit(
                    &SourceVertex {
                        position,
                        normal,
                        uv: uvs.as_ref().and_then(|uv| uv.get(i)).map(|uv| Vec2::from_array(*uv)),
                        color: colors.as_ref().and_then(|c| c.get(i)).map(|c| Vec3::from_array(*c)),
                        tangent,
                        bitangent,
                    },
                    &mut data.vertices,
                    &mut data.bounds,
                );
            }

            let mut indices: Vec<u32> = match reader.read_indices() {
                Some(read) => read.into_u32().collect(),
                // Non-indexed primitive: sequential indices
                None => (0..vertex_count).collect(),
            };

            let remainder = indices.len() % 3;
            if remainder != 0 {
                tracing::warn!(
                    mesh = %mesh_name,
                    dropped = remainder,
                    "non-triangle indices skipped"
                );
                indices.truncate(indices.len() - remainder);
            }

            let index_count = indices.len() as u32;
            data.indices.extend(indices.into_iter().map(|i| i + vertex_base));

            data.parts.push(ModelPart {
                name: mesh_name.clone(),
                vertex_base,
                vertex_count,
                index_base,
                index_count,
            });
        }
    }

    Ok(data)
}
