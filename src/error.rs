use thiserror::Error;

/// Errors raised while building render-thread resources for a deform mesh.
///
/// None of these are recoverable inside the proxy: the owning component simply
/// skips rendering until the next structural rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("mesh for section {section} has no index data")]
    EmptyIndexData { section: usize },

    #[error("mesh for section {section} exposes no vertex streams")]
    NoVertexStreams { section: usize },

    #[error("mesh for section {section} has no position stream")]
    MissingPositionStream { section: usize },

    #[error("vertex stream {stream} has {actual} elements, expected {expected}")]
    MismatchedStreamLength {
        stream: String,
        expected: usize,
        actual: usize,
    },

    #[error("buffer '{label}' needs {size} bytes, device limit is {limit}")]
    BufferTooLarge { label: String, size: u64, limit: u64 },

    #[error("GPU allocation failed for '{label}': {reason}")]
    Allocation { label: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_the_section() {
        let err = RenderError::EmptyIndexData { section: 3 };
        assert_eq!(err.to_string(), "mesh for section 3 has no index data");

        let err = RenderError::BufferTooLarge {
            label: "DeformTransforms".into(),
            size: 128,
            limit: 64,
        };
        assert_eq!(
            err.to_string(),
            "buffer 'DeformTransforms' needs 128 bytes, device limit is 64"
        );
    }
}
