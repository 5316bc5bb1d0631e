//! Wavefront OBJ import via tobj.

use crate::error::{AssetError, Result};
use crate::model::{ImportFlags, ImportTransform, ModelData, ModelPart, SourceVertex, VertexEmitter};
use glam::{Vec2, Vec3};
use kiln_core::Aabb;
use kiln_gpu::VertexLayout;
use std::io::BufRead;
use std::path::Path;

/// Import an OBJ file from disk.
pub(crate) fn import_file(
    path: &Path,
    layout: &VertexLayout,
    transform: &ImportTransform,
    flags: ImportFlags,
) -> Result<ModelData> {
    let file = std::fs::File::open(path).map_err(|source| kiln_core::Error::Io {
        path: path.display().to_string(),
        source,
    })?;
    let mut reader = std::io::BufReader::new(file);
    import(&mut reader, layout, transform, flags).map_err(|e| match e {
        AssetError::Import { message, .. } => AssetError::Import {
            path: path.display().to_string(),
            message,
        },
        other => other,
    })
}

/// Import OBJ data from any reader.
///
/// Loads with triangulation and a single unified index so every attribute
/// array is aligned per vertex. Materials are ignored.
pub(crate) fn import(
    reader: &mut impl BufRead,
    layout: &VertexLayout,
    transform: &ImportTransform,
    flags: ImportFlags,
) -> Result<ModelData> {
    let (models, _materials) = tobj::load_obj_buf(
        reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
        |_| Ok(Default::default()),
    )
    .map_err(|e| AssetError::Import {
        path: "<buffer>".to_string(),
        message: e.to_string(),
    })?;

    let emitter = VertexEmitter::new(layout, transform, flags);
    let mut data = ModelData {
        layout: layout.clone(),
        vertices: Vec::new(),
        indices: Vec::new(),
        parts: Vec::new(),
        bounds: Aabb::empty(),
    };

    for model in &models {
        let mesh = &model.mesh;
        let vertex_count = (mesh.positions.len() / 3) as u32;
        if vertex_count == 0 {
            continue;
        }

        let vertex_base = data.vertices.len() as u32 / layout.float_count();
        let index_base = data.indices.len() as u32;

        for i in 0..vertex_count as usize {
            let position = Vec3::new(
                mesh.positions[i * 3],
                mesh.positions[i * 3 + 1],
                mesh.positions[i * 3 + 2],
            );
            let normal = mesh.normals.get(i * 3..i * 3 + 3).map(Vec3::from_slice);
            let uv = mesh.texcoords.get(i * 2..i * 2 + 2).map(Vec2::from_slice);
            let color = mesh
                .vertex_color
                .get(i * 3..i * 3 + 3)
                .map(Vec3::from_slice);

            emitter.emit(
                &SourceVertex {
                    position,
                    normal,
                    uv,
                    color,
                    tangent: None,
                    bitangent: None,
                },
                &mut data.vertices,
                &mut data.bounds,
            );
        }

        // Triangulation is forced above; drop any trailing partial face so
        // the index stream stays a whole number of triangles.
        let mut index_count = mesh.indices.len();
        let remainder = index_count % 3;
        if remainder != 0 {
            tracing::warn!(
                mesh = %model.name,
                dropped = remainder,
                "non-triangle indices skipped"
            );
            index_count -= remainder;
        }

        data.indices
            .extend(mesh.indices[..index_count].iter().map(|&i| i + vertex_base));

        data.parts.push(ModelPart {
            name: model.name.clone(),
            vertex_base,
            vertex_count,
            index_base,
            index_count: index_count as u32,
        });
    }

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_gpu::VertexComponent;
    use std::io::Cursor;

    const QUAD_OBJ: &str = "\
o quad
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 1.0 1.0 0.0
v 0.0 1.0 0.0
vt 0.0 0.0
vt 1.0 0.0
vt 1.0 1.0
vt 0.0 1.0
vn 0.0 0.0 1.0
f 1/1/1 2/2/1 3/3/1 4/4/1
";

    fn import_quad(layout: &VertexLayout, transform: &ImportTransform) -> ModelData {
        let mut cursor = Cursor::new(QUAD_OBJ.as_bytes());
        import(&mut cursor, layout, transform, ImportFlags::default()).unwrap()
    }

    #[test]
    fn quad_triangulates_into_two_triangles() {
        let layout = VertexLayout::new([VertexComponent::Position]);
        let data = import_quad(&layout, &ImportTransform::default());

        assert_eq!(data.parts.len(), 1);
        assert_eq!(data.index_count() % 3, 0);
        assert_eq!(data.index_count(), 6);
        // Position-only layout: exactly 3 floats per vertex.
        assert_eq!(
            data.vertices.len(),
            data.vertex_count() as usize * 3
        );
    }

    #[test]
    fn positions_are_y_flipped() {
        let layout = VertexLayout::new([VertexComponent::Position]);
        let transform = ImportTransform {
            scale: 2.0,
            ..Default::default()
        };
        let data = import_quad(&layout, &transform);

        // Source vertex (1, 1, 0) must land at (2, -2, 0).
        let floats = &data.vertices;
        let found = (0..data.vertex_count() as usize)
            .any(|i| floats[i * 3] == 2.0 && floats[i * 3 + 1] == -2.0 && floats[i * 3 + 2] == 0.0);
        assert!(found);
    }

    #[test]
    fn bounds_cover_the_quad() {
        let layout = VertexLayout::new([VertexComponent::Position]);
        let data = import_quad(&layout, &ImportTransform::default());
        assert_eq!(data.bounds.min.y, -1.0);
        assert_eq!(data.bounds.max.y, 0.0);
        assert_eq!(data.bounds.size().x, 1.0);
    }

    #[test]
    fn full_layout_falls_back_to_zero_for_missing_channels() {
        let layout = VertexLayout::new([
            VertexComponent::Position,
            VertexComponent::Normal,
            VertexComponent::Uv,
            VertexComponent::Color,
            VertexComponent::Tangent,
        ]);
        let data = import_quad(&layout, &ImportTransform::default());
        let stride = layout.float_count() as usize;
        assert_eq!(data.vertices.len(), data.vertex_count() as usize * stride);

        // Tangent channel (last 3 floats of each vertex) is absent in OBJ.
        for i in 0..data.vertex_count() as usize {
            let tangent = &data.vertices[i * stride + stride - 3..(i + 1) * stride];
            assert!(tangent.iter().all(|&f| f == 0.0));
        }
    }

    #[test]
    fn garbage_input_is_an_import_error() {
        let layout = VertexLayout::new([VertexComponent::Position]);
        let mut cursor = Cursor::new(&b"v 1.0 abc 0.0\nf 1 2 3\n"[..]);
        let result = import(
            &mut cursor,
            &layout,
            &ImportTransform::default(),
            ImportFlags::default(),
        );
        assert!(matches!(result, Err(AssetError::Import { .. })));
    }
}
