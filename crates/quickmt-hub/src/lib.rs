//! # quickmt-hub
//!
//! Discovery and materialization of translation models:
//!
//! - [`Registry`] enumerates available models from the remote catalogue
//!   and resolves `(src, tgt)` pairs to descriptors
//! - [`ArtifactStore`] turns a descriptor into a local artifact directory,
//!   preferring the on-disk cache and falling back to a remote fetch

#![deny(unsafe_code)]

pub mod artifact;
pub mod errors;
pub mod registry;

pub use artifact::{ArtifactStore, HubArtifactStore, StaticArtifactStore};
pub use errors::{HubError, Result};
pub use registry::{ModelDescriptor, Registry, parse_model_id};
