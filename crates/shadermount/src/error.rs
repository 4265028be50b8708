use crate::gl::ShaderStage;

/// Fatal construction errors; no mount is produced and nothing stays allocated.
#[derive(Debug, thiserror::Error)]
pub enum MountError {
    #[error("host element is not connected to a document")]
    HostDisconnected,
    #[error("hardware-accelerated rendering context is unavailable")]
    ContextUnavailable,
}

/// Program builder failures. The mount logs these and keeps running without a
/// program.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("{stage} shader failed to compile: {log}")]
    Compile { stage: ShaderStage, log: String },
    #[error("shader program failed to link: {log}")]
    Link { log: String },
    #[error("failed to allocate {resource}: {reason}")]
    Allocation {
        resource: &'static str,
        reason: String,
    },
}

/// Per-uniform failures. Each one skips a single uniform update; the rest of
/// the batch still applies.
#[derive(Debug, thiserror::Error)]
pub enum UniformError {
    #[error("uniform '{name}' has no location in the linked program")]
    MissingLocation { name: String },
    #[error("uniform '{name}' has unsupported component count {len}")]
    UnsupportedLength { name: String, len: usize },
    #[error("uniform '{name}' mixes vectors of different lengths")]
    MismatchedChildren { name: String },
    #[error("uniform '{name}' was declared as {declared} but received {received}")]
    ShapeChanged {
        name: String,
        declared: String,
        received: String,
    },
    #[error("image for uniform '{name}' must be fully loaded")]
    ImageNotLoaded { name: String },
    #[error("texture upload for uniform '{name}' failed with GL error {code:#06x}")]
    Upload { name: String, code: u32 },
    #[error("failed to allocate texture for uniform '{name}': {reason}")]
    Allocation { name: String, reason: String },
}
