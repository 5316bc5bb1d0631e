//! Mesh import and upload.
//!
//! Importers parse a scene file into a [`ModelData`] CPU intermediate,
//! emitting exactly the components of the caller's [`VertexLayout`] for
//! every vertex, then [`Model::upload`] materializes it into device-local
//! vertex/index buffers.

use crate::error::{AssetError, Result};
use crate::{gltf_import, obj};
use glam::{Vec2, Vec3};
use kiln_core::Aabb;
use kiln_gpu::{GpuBuffer, GpuContext, VertexComponent, VertexLayout};
use std::path::Path;

bitflags::bitflags! {
    /// Importer behavior flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ImportFlags: u32 {
        /// Negate the Y axis of positions, normals, and tangent-frame
        /// vectors to convert from the importer's Y-up convention.
        const FLIP_Y = 1 << 0;
        /// Flip the V texture coordinate (`v' = 1 - v`).
        const FLIP_UV = 1 << 1;
    }
}

impl Default for ImportFlags {
    fn default() -> Self {
        Self::FLIP_Y
    }
}

/// Uniform transform applied to every imported vertex.
#[derive(Debug, Clone, Copy)]
pub struct ImportTransform {
    /// Uniform position scale.
    pub scale: f32,
    /// Texture coordinate scale.
    pub uv_scale: Vec2,
    /// Offset added to scaled positions.
    pub center: Vec3,
}

impl Default for ImportTransform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            uv_scale: Vec2::ONE,
            center: Vec3::ZERO,
        }
    }
}

/// Per-submesh range into the shared vertex/index streams.
#[derive(Debug, Clone)]
pub struct ModelPart {
    pub name: String,
    pub vertex_base: u32,
    pub vertex_count: u32,
    pub index_base: u32,
    pub index_count: u32,
}

/// One source vertex as produced by an importer; optional channels fall
/// back to zero vectors when absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceVertex {
    pub position: Vec3,
    pub normal: Option<Vec3>,
    pub uv: Option<Vec2>,
    pub color: Option<Vec3>,
    pub tangent: Option<Vec3>,
    pub bitangent: Option<Vec3>,
}

/// Emits interleaved floats for a vertex layout, applying the import
/// transform and Y-flip.
pub(crate) struct VertexEmitter<'a> {
    layout: &'a VertexLayout,
    transform: &'a ImportTransform,
    flags: ImportFlags,
}

impl<'a> VertexEmitter<'a> {
    pub fn new(layout: &'a VertexLayout, transform: &'a ImportTransform, flags: ImportFlags) -> Self {
        Self {
            layout,
            transform,
            flags,
        }
    }

    fn flip(&self, v: Vec3) -> Vec3 {
        if self.flags.contains(ImportFlags::FLIP_Y) {
            Vec3::new(v.x, -v.y, v.z)
        } else {
            v
        }
    }

    /// Append one vertex to `out` and grow `bounds` by its position.
    pub fn emit(&self, vertex: &SourceVertex, out: &mut Vec<f32>, bounds: &mut Aabb) {
        for component in self.layout.components() {
            match component {
                VertexComponent::Position => {
                    let scaled = self.flip(vertex.position * self.transform.scale);
                    let position = scaled + self.transform.center;
                    bounds.extend(position);
                    out.extend_from_slice(&position.to_array());
                }
                VertexComponent::Normal => {
                    let normal = self.flip(vertex.normal.unwrap_or(Vec3::ZERO));
                    out.extend_from_slice(&normal.to_array());
                }
                VertexComponent::Uv => {
                    let raw = vertex.uv.unwrap_or(Vec2::ZERO);
                    let v = if self.flags.contains(ImportFlags::FLIP_UV) {
                        1.0 - raw.y
                    } else {
                        raw.y
                    };
                    out.push(raw.x * self.transform.uv_scale.x);
                    out.push(v * self.transform.uv_scale.y);
                }
                VertexComponent::Color => {
                    let color = vertex.color.unwrap_or(Vec3::ZERO);
                    out.extend_from_slice(&color.to_array());
                }
                VertexComponent::Tangent => {
                    let tangent = self.flip(vertex.tangent.unwrap_or(Vec3::ZERO));
                    out.extend_from_slice(&tangent.to_array());
                }
                VertexComponent::Bitangent => {
                    let bitangent = self.flip(vertex.bitangent.unwrap_or(Vec3::ZERO));
                    out.extend_from_slice(&bitangent.to_array());
                }
                VertexComponent::PadFloat => out.push(0.0),
                VertexComponent::PadVec4 => out.extend_from_slice(&[0.0; 4]),
            }
        }
    }
}

/// CPU-side import result: interleaved vertices, rebased indices, part
/// table, and the accumulated bounding box.
#[derive(Debug, Clone)]
pub struct ModelData {
    pub layout: VertexLayout,
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
    pub parts: Vec<ModelPart>,
    pub bounds: Aabb,
}

impl ModelData {
    /// Number of vertices in the interleaved stream.
    pub fn vertex_count(&self) -> u32 {
        (self.vertices.len() / self.layout.float_count() as usize) as u32
    }

    /// Number of indices.
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Parse a scene file into model data without touching the GPU.
    ///
    /// Dispatches on extension: `obj` via tobj, `gltf`/`glb` via the gltf
    /// crate. Anything else is an unsupported format.
    pub fn load_from_file(
        path: impl AsRef<Path>,
        layout: &VertexLayout,
        transform: &ImportTransform,
        flags: ImportFlags,
    ) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let data = match extension.as_str() {
            "obj" => obj::import_file(path, layout, transform, flags)?,
            "gltf" | "glb" => gltf_import::import_file(path, layout, transform, flags)?,
            other => {
                return Err(AssetError::UnsupportedFormat(format!(
                    "model container '{other}' ({})",
                    path.display()
                )))
            }
        };

        if data.parts.is_empty() {
            return Err(AssetError::Import {
                path: path.display().to_string(),
                message: "scene contains no meshes".to_string(),
            });
        }

        tracing::info!(
            path = %path.display(),
            parts = data.parts.len(),
            vertices = data.vertex_count(),
            indices = data.index_count(),
            "imported model"
        );
        Ok(data)
    }
}

/// A mesh materialized on the device: one shared vertex/index buffer pair
/// plus the per-submesh ranges into them.
pub struct Model {
    pub vertex_buffer: GpuBuffer,
    pub index_buffer: GpuBuffer,
    pub parts: Vec<ModelPart>,
    pub vertex_count: u32,
    pub index_count: u32,
    pub bounds: Aabb,
}

impl Model {
    /// Resolve a relative path through the resolver, import, and upload.
    pub fn load(
        ctx: &GpuContext,
        resolver: &crate::resolver::AssetResolver,
        relative: impl AsRef<Path>,
        layout: &VertexLayout,
        transform: &ImportTransform,
        flags: ImportFlags,
    ) -> Result<Self> {
        let path = resolver.resolve(relative)?;
        Self::load_from_file(ctx, path, layout, transform, flags)
    }

    /// Import a scene file and upload it.
    pub fn load_from_file(
        ctx: &GpuContext,
        path: impl AsRef<Path>,
        layout: &VertexLayout,
        transform: &ImportTransform,
        flags: ImportFlags,
    ) -> Result<Self> {
        let path = path.as_ref();
        let data = ModelData::load_from_file(path, layout, transform, flags)?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("model");
        Self::upload(ctx, &data, name)
    }

    /// Upload parsed model data into device-local buffers.
    pub fn upload(ctx: &GpuContext, data: &ModelData, name: &str) -> Result<Self> {
        let vertex_buffer = ctx.stage_to_device_buffer(
            ash::vk::BufferUsageFlags::VERTEX_BUFFER,
            bytemuck::cast_slice(&data.vertices),
            &format!("{name}.vertices"),
        )?;

        let index_buffer = match ctx.stage_to_device_buffer(
            ash::vk::BufferUsageFlags::INDEX_BUFFER,
            bytemuck::cast_slice(&data.indices),
            &format!("{name}.indices"),
        ) {
            Ok(buffer) => buffer,
            Err(e) => {
                let mut vertex_buffer = vertex_buffer;
                let _ = ctx.allocator().lock().free_buffer(&mut vertex_buffer);
                return Err(e.into());
            }
        };

        Ok(Self {
            vertex_buffer,
            index_buffer,
            parts: data.parts.clone(),
            vertex_count: data.vertex_count(),
            index_count: data.index_count(),
            bounds: data.bounds,
        })
    }

    /// Free both buffers.
    pub fn destroy(mut self, ctx: &GpuContext) -> Result<()> {
        let mut allocator = ctx.allocator().lock();
        allocator.free_buffer(&mut self.vertex_buffer)?;
        allocator.free_buffer(&mut self.index_buffer)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_layout() -> VertexLayout {
        VertexLayout::new([VertexComponent::Position])
    }

    #[test]
    fn y_axis_is_flipped_and_scaled() {
        let layout = unit_layout();
        let transform = ImportTransform {
            scale: 2.0,
            ..Default::default()
        };
        let emitter = VertexEmitter::new(&layout, &transform, ImportFlags::default());

        let mut out = Vec::new();
        let mut bounds = Aabb::empty();
        emitter.emit(
            &SourceVertex {
                position: Vec3::new(1.0, 1.0, 1.0),
                ..Default::default()
            },
            &mut out,
            &mut bounds,
        );

        assert_eq!(out.len(), 3);
        assert_relative_eq!(out[0], 2.0);
        assert_relative_eq!(out[1], -2.0);
        assert_relative_eq!(out[2], 2.0);
    }

    #[test]
    fn center_offset_applies_after_flip() {
        let layout = unit_layout();
        let transform = ImportTransform {
            scale: 1.0,
            center: Vec3::new(0.0, 10.0, 0.0),
            ..Default::default()
        };
        let emitter = VertexEmitter::new(&layout, &transform, ImportFlags::default());

        let mut out = Vec::new();
        let mut bounds = Aabb::empty();
        emitter.emit(
            &SourceVertex {
                position: Vec3::new(0.0, 1.0, 0.0),
                ..Default::default()
            },
            &mut out,
            &mut bounds,
        );
        assert_relative_eq!(out[1], 9.0);
    }

    #[test]
    fn absent_channels_emit_zeros() {
        let layout = VertexLayout::new([
            VertexComponent::Position,
            VertexComponent::Normal,
            VertexComponent::Uv,
            VertexComponent::Tangent,
            VertexComponent::PadVec4,
        ]);
        let transform = ImportTransform::default();
        let emitter = VertexEmitter::new(&layout, &transform, ImportFlags::default());

        let mut out = Vec::new();
        let mut bounds = Aabb::empty();
        emitter.emit(
            &SourceVertex {
                position: Vec3::ONE,
                ..Default::default()
            },
            &mut out,
            &mut bounds,
        );

        assert_eq!(out.len(), layout.float_count() as usize);
        // Everything after the position is a missing channel or padding.
        assert!(out[3..].iter().all(|&f| f == 0.0));
    }

    #[test]
    fn uv_scale_applies() {
        let layout = VertexLayout::new([VertexComponent::Uv]);
        let transform = ImportTransform {
            uv_scale: Vec2::new(2.0, 4.0),
            ..Default::default()
        };
        let emitter = VertexEmitter::new(&layout, &transform, ImportFlags::default());

        let mut out = Vec::new();
        let mut bounds = Aabb::empty();
        emitter.emit(
            &SourceVertex {
                uv: Some(Vec2::new(0.5, 0.25)),
                ..Default::default()
            },
            &mut out,
            &mut bounds,
        );
        assert_relative_eq!(out[0], 1.0);
        assert_relative_eq!(out[1], 1.0);
    }

    #[test]
    fn bounds_track_transformed_positions() {
        let layout = unit_layout();
        let transform = ImportTransform {
            scale: 2.0,
            ..Default::default()
        };
        let emitter = VertexEmitter::new(&layout, &transform, ImportFlags::default());

        let mut out = Vec::new();
        let mut bounds = Aabb::empty();
        for p in [Vec3::new(-1.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 1.0)] {
            emitter.emit(
                &SourceVertex {
                    position: p,
                    ..Default::default()
                },
                &mut out,
                &mut bounds,
            );
        }
        assert_relative_eq!(bounds.min.x, -2.0);
        assert_relative_eq!(bounds.min.y, -2.0);
        assert_relative_eq!(bounds.max.x, 2.0);
        assert_relative_eq!(bounds.size().x, 4.0);
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let layout = unit_layout();
        let err = ModelData::load_from_file(
            "mesh.fbx2020",
            &layout,
            &ImportTransform::default(),
            ImportFlags::default(),
        )
        .unwrap_err();
        assert!(matches!(err, AssetError::UnsupportedFormat(_)));
    }
}
