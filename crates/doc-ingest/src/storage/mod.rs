//! Artifact storage
//!
//! Artifacts are plain `.txt` files in a flat output directory. Their
//! provenance header is the only record of what has been converted.

mod artifact_store;
mod conflict;

pub use artifact_store::{ArtifactEntry, ArtifactStore};
pub use conflict::{ConflictDecision, ConflictResolver, MatchKind};
