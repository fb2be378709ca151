//! Vertex layouts for section rendering.
//!
//! Each section gets two layouts: a position-only one for depth and shadow
//! passes, and a default one carrying the position plus a full set of UV
//! channels. Missing UV channels repeat the last real one so that no slot the
//! shaders read is ever unbound.

use crate::asset::{VertexSemantic, VertexStream};
use crate::error::RenderError;
use crate::renderer::gpu::{BufferDescriptor, GpuBackend, GpuBuffer};

pub const MAX_TEXCOORDS: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LayoutId(pub u32);

/// What the GPU needs to know to reuse a vertex declaration.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LayoutSignature(Vec<(u32, wgpu::VertexFormat)>);

impl LayoutSignature {
    pub fn from_parts(parts: &[(u32, wgpu::VertexFormat)]) -> Self {
        Self(parts.to_vec())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A vertex stream that has been uploaded for one proxy build.
#[derive(Clone, Debug)]
pub struct UploadedStream {
    pub semantic: VertexSemantic,
    pub buffer: GpuBuffer,
    pub stride: u32,
    pub format: wgpu::VertexFormat,
}

#[derive(Clone, Debug)]
pub struct UploadedStreams {
    pub position: UploadedStream,
    pub tex_coords: Vec<UploadedStream>,
    pub vertex_count: u32,
}

impl UploadedStreams {
    /// Uploads the mesh's streams. UV channels are sorted by channel index.
    pub fn upload(
        backend: &dyn GpuBackend,
        section: usize,
        streams: &[VertexStream<'_>],
    ) -> Result<Self, RenderError> {
        if streams.is_empty() {
            return Err(RenderError::NoVertexStreams { section });
        }

        let position = streams
            .iter()
            .find(|s| s.semantic == VertexSemantic::Position && s.vertex_count() > 0)
            .ok_or(RenderError::MissingPositionStream { section })?;
        let vertex_count = position.vertex_count();

        let mut uv_streams: Vec<_> = streams
            .iter()
            .filter_map(|s| match s.semantic {
                VertexSemantic::TexCoord(channel) => Some((channel, s)),
                VertexSemantic::Position => None,
            })
            .collect();
        uv_streams.sort_by_key(|(channel, _)| *channel);

        let position = upload_stream(backend, position, vertex_count)?;
        let tex_coords = uv_streams
            .into_iter()
            .map(|(_, stream)| upload_stream(backend, stream, vertex_count))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            position,
            tex_coords,
            vertex_count: vertex_count as u32,
        })
    }
}

fn upload_stream(
    backend: &dyn GpuBackend,
    stream: &VertexStream<'_>,
    vertex_count: usize,
) -> Result<UploadedStream, RenderError> {
    if stream.vertex_count() != vertex_count {
        return Err(RenderError::MismatchedStreamLength {
            stream: format!("{:?}", stream.semantic),
            expected: vertex_count,
            actual: stream.vertex_count(),
        });
    }

    let label = match stream.semantic {
        VertexSemantic::Position => "PositionStream".to_string(),
        VertexSemantic::TexCoord(channel) => format!("TexCoordStream{channel}"),
    };
    let buffer = backend.create_buffer(&BufferDescriptor {
        label: &label,
        usage: wgpu::BufferUsages::VERTEX,
        contents: stream.data,
    })?;

    Ok(UploadedStream {
        semantic: stream.semantic,
        buffer,
        stride: stream.stride,
        format: stream.format,
    })
}

#[derive(Clone, Debug)]
pub struct VertexBinding {
    pub semantic: VertexSemantic,
    pub buffer: GpuBuffer,
    pub stride: u32,
    attribute: [wgpu::VertexAttribute; 1],
}

impl VertexBinding {
    fn new(stream: &UploadedStream, shader_location: u32) -> Self {
        Self {
            semantic: stream.semantic,
            buffer: stream.buffer.clone(),
            stride: stream.stride,
            attribute: [wgpu::VertexAttribute {
                format: stream.format,
                offset: 0,
                shader_location,
            }],
        }
    }

    pub fn format(&self) -> wgpu::VertexFormat {
        self.attribute[0].format
    }

    pub fn shader_location(&self) -> u32 {
        self.attribute[0].shader_location
    }
}

#[derive(Clone, Debug)]
pub struct VertexLayout {
    pub id: LayoutId,
    pub bindings: Vec<VertexBinding>,
}

impl VertexLayout {
    fn register(backend: &dyn GpuBackend, bindings: Vec<VertexBinding>) -> Self {
        let signature = signature_of(&bindings);
        let id = backend.register_vertex_layout(&signature);
        Self { id, bindings }
    }

    pub fn signature(&self) -> LayoutSignature {
        signature_of(&self.bindings)
    }

    pub fn tex_coord_slots(&self) -> usize {
        self.bindings
            .iter()
            .filter(|b| matches!(b.semantic, VertexSemantic::TexCoord(_)))
            .count()
    }

    /// One `wgpu` buffer layout per binding, in shader location order.
    pub fn buffer_layouts(&self) -> Vec<wgpu::VertexBufferLayout<'_>> {
        self.bindings
            .iter()
            .map(|binding| wgpu::VertexBufferLayout {
                array_stride: binding.stride as wgpu::BufferAddress,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &binding.attribute,
            })
            .collect()
    }
}

fn signature_of(bindings: &[VertexBinding]) -> LayoutSignature {
    LayoutSignature(bindings.iter().map(|b| (b.stride, b.format())).collect())
}

/// Position-only bindings for depth/shadow passes.
pub fn position_only_bindings(streams: &UploadedStreams) -> Vec<VertexBinding> {
    vec![VertexBinding::new(&streams.position, 0)]
}

/// Position followed by exactly `max_texcoords` UV slots, or position alone
/// when the mesh has no UVs at all.
pub fn default_bindings(streams: &UploadedStreams, max_texcoords: usize) -> Vec<VertexBinding> {
    let max_texcoords = max_texcoords.clamp(1, MAX_TEXCOORDS);
    let mut bindings = vec![VertexBinding::new(&streams.position, 0)];

    let Some(last) = streams.tex_coords.last() else {
        return bindings;
    };
    if streams.tex_coords.len() > max_texcoords {
        log::debug!(
            "Mesh has {} UV channels, binding the first {}",
            streams.tex_coords.len(),
            max_texcoords
        );
    }

    for slot in 0..max_texcoords {
        let stream = streams.tex_coords.get(slot).unwrap_or(last);
        bindings.push(VertexBinding::new(stream, 1 + slot as u32));
    }
    bindings
}

/// Per-section vertex setup: the two layouts plus the slot of the section's
/// deform transform in the proxy's transform buffer.
#[derive(Clone, Debug)]
pub struct VertexFactory {
    pub position_only: VertexLayout,
    pub default: VertexLayout,
    pub transform_index: u32,
    pub vertex_count: u32,
}

impl VertexFactory {
    pub fn new(
        backend: &dyn GpuBackend,
        streams: &UploadedStreams,
        max_texcoords: usize,
        transform_index: u32,
    ) -> Self {
        Self {
            position_only: VertexLayout::register(backend, position_only_bindings(streams)),
            default: VertexLayout::register(backend, default_bindings(streams, max_texcoords)),
            transform_index,
            vertex_count: streams.vertex_count,
        }
    }
}
