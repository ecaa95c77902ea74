//! Foundation types for Strata.
//!
//! This crate provides the identifiers every other Strata crate speaks in.
//! All of them validate on construction, so a value of one of these types is
//! always safe to embed in a storage path.
//!
//! # Key Types
//!
//! - [`Digest`] -- Content identity (`<algorithm>:<hex>`)
//! - [`Digester`] -- Incremental hasher producing a [`Digest`]
//! - [`RepositoryName`] -- Namespace scoping layer ownership and tombstones
//! - [`UploadId`] -- Opaque token naming one resumable upload session

pub mod digest;
pub mod error;
pub mod name;
pub mod upload;

pub use digest::{Algorithm, Digest, Digester};
pub use error::TypeError;
pub use name::RepositoryName;
pub use upload::UploadId;
