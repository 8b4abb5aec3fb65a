//! Modelos neutrales (Artifact, ExecutionContext).

pub mod artifact;
pub mod context;

pub use artifact::{Artifact, ArtifactKind};
pub use context::ExecutionContext;
