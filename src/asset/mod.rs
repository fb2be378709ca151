pub mod mesh;

pub use mesh::{MeshHandle, MeshSource, StaticMesh, VertexSemantic, VertexStream};
