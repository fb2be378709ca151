use std::f32::consts::PI;
use std::fmt;
use std::sync::Arc;

use glam::Vec3;

use crate::renderer::material::MaterialRef;
use crate::scene::bounds::Aabb;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VertexSemantic {
    Position,
    TexCoord(u8),
}

/// One interleaving-free vertex stream exposed by a mesh source.
#[derive(Clone, Copy, Debug)]
pub struct VertexStream<'a> {
    pub semantic: VertexSemantic,
    pub format: wgpu::VertexFormat,
    pub stride: u32,
    pub data: &'a [u8],
}

impl VertexStream<'_> {
    pub fn vertex_count(&self) -> usize {
        if self.stride == 0 {
            0
        } else {
            self.data.len() / self.stride as usize
        }
    }
}

/// Read-only mesh data the deform mesh pulls its sections from. Only the first
/// submesh is ever used.
pub trait MeshSource: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;
    fn index_data(&self) -> &[u32];
    fn vertex_streams(&self) -> Vec<VertexStream<'_>>;
    fn bounds(&self) -> Aabb;
    fn material(&self, submesh: usize) -> Option<MaterialRef>;
}

pub type MeshHandle = Arc<dyn MeshSource>;

/// Identity of a shared mesh, used to upload its streams once per proxy build.
pub(crate) fn mesh_key(mesh: &MeshHandle) -> usize {
    Arc::as_ptr(mesh) as *const () as usize
}

/// CPU-side mesh with a position stream and any number of UV channels.
#[derive(Clone, Debug)]
pub struct StaticMesh {
    name: String,
    positions: Vec<[f32; 3]>,
    tex_coords: Vec<Vec<[f32; 2]>>,
    indices: Vec<u32>,
    bounds: Aabb,
    material: Option<MaterialRef>,
}

impl StaticMesh {
    pub fn new(name: impl Into<String>, positions: Vec<[f32; 3]>, indices: Vec<u32>) -> Self {
        let bounds = Aabb::from_points(positions.iter().map(|p| Vec3::from_array(*p)));
        Self {
            name: name.into(),
            positions,
            tex_coords: Vec::new(),
            indices,
            bounds,
            material: None,
        }
    }

    pub fn with_tex_coords(mut self, channel: Vec<[f32; 2]>) -> Self {
        self.tex_coords.push(channel);
        self
    }

    pub fn with_material(mut self, material: MaterialRef) -> Self {
        self.material = Some(material);
        self
    }

    pub fn into_handle(self) -> MeshHandle {
        Arc::new(self)
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn tex_coord_channels(&self) -> usize {
        self.tex_coords.len()
    }

    /// Unit cube centered on the origin, one UV channel.
    pub fn cube(name: impl Into<String>) -> Self {
        // (normal axis, u axis, v axis) per face
        let faces = [
            (Vec3::X, Vec3::Z, Vec3::Y),
            (Vec3::NEG_X, Vec3::NEG_Z, Vec3::Y),
            (Vec3::Y, Vec3::X, Vec3::Z),
            (Vec3::NEG_Y, Vec3::X, Vec3::NEG_Z),
            (Vec3::Z, Vec3::NEG_X, Vec3::Y),
            (Vec3::NEG_Z, Vec3::X, Vec3::Y),
        ];

        let mut positions = Vec::with_capacity(24);
        let mut uvs = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);

        for (normal, u, v) in faces {
            let base = positions.len() as u32;
            for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                let p = (normal + u * su + v * sv) * 0.5;
                positions.push(p.to_array());
                uvs.push([(su + 1.0) * 0.5, 1.0 - (sv + 1.0) * 0.5]);
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        Self::new(name, positions, indices).with_tex_coords(uvs)
    }

    /// Unit sphere, one UV channel.
    pub fn sphere(name: impl Into<String>, segments: u32, rings: u32) -> Self {
        let segments = segments.max(3);
        let rings = rings.max(2);
        let mut positions = Vec::new();
        let mut uvs = Vec::new();
        let mut indices = Vec::new();

        for ring in 0..=rings {
            let phi = PI * ring as f32 / rings as f32;
            let y = phi.cos();
            let ring_radius = phi.sin();

            for segment in 0..=segments {
                let theta = 2.0 * PI * segment as f32 / segments as f32;
                positions.push([ring_radius * theta.cos(), y, ring_radius * theta.sin()]);
                uvs.push([
                    segment as f32 / segments as f32,
                    ring as f32 / rings as f32,
                ]);
            }
        }

        for ring in 0..rings {
            for segment in 0..segments {
                let current = ring * (segments + 1) + segment;
                let next = current + segments + 1;

                indices.extend_from_slice(&[current, next, current + 1]);
                indices.extend_from_slice(&[current + 1, next, next + 1]);
            }
        }

        Self::new(name, positions, indices).with_tex_coords(uvs)
    }
}

impl MeshSource for StaticMesh {
    fn name(&self) -> &str {
        &self.name
    }

    fn index_data(&self) -> &[u32] {
        &self.indices
    }

    fn vertex_streams(&self) -> Vec<VertexStream<'_>> {
        if self.positions.is_empty() {
            return Vec::new();
        }

        let mut streams = Vec::with_capacity(1 + self.tex_coords.len());
        streams.push(VertexStream {
            semantic: VertexSemantic::Position,
            format: wgpu::VertexFormat::Float32x3,
            stride: std::mem::size_of::<[f32; 3]>() as u32,
            data: bytemuck::cast_slice(&self.positions),
        });
        for (channel, uvs) in self.tex_coords.iter().enumerate() {
            streams.push(VertexStream {
                semantic: VertexSemantic::TexCoord(channel as u8),
                format: wgpu::VertexFormat::Float32x2,
                stride: std::mem::size_of::<[f32; 2]>() as u32,
                data: bytemuck::cast_slice(uvs),
            });
        }
        streams
    }

    fn bounds(&self) -> Aabb {
        self.bounds
    }

    fn material(&self, submesh: usize) -> Option<MaterialRef> {
        if submesh == 0 {
            self.material.clone()
        } else {
            None
        }
    }
}
