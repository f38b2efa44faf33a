//! pyshelf-core: the engine behind the pyshelf package index.
//!
//! Three pieces, composed by the server:
//! - `package_name`: derives a canonical package name from an archive filename
//! - `store`: blob storage behind the `PackageStore` trait (S3 or in-memory)
//! - `index`: groups raw stored filenames into the simple-index listings
//!
//! The engine is stateless: every listing is a fresh read against the store
//! followed by pure in-memory computation. Configuration is an explicit value
//! (`config::IndexConfig`) passed in by callers, never ambient state.

pub mod config;
pub mod index;
pub mod package_name;
pub mod store;
