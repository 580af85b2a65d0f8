//! bucket-fs: a directory tree over a flat object store
//!
//! Object stores only know keys. This library emulates files and
//! directories on top of them, so callers can list, copy, move and delete
//! trees as if the bucket were a filesystem.
//!
//! # Architecture
//!
//! - **Connectors**: wire-level object store access (`Connector` trait), with
//!   an S3 implementation and an in-process store for tests.
//! - **Driver**: hierarchy emulation for one bucket; directories are marker
//!   objects plus key prefixes.
//! - **Nodes**: `File` and `Directory` handles sharing a driver, plus local-disk
//!   handles that copies can be staged through.
//! - **Storage**: a mounted root directory with an access policy and URL
//!   synthesis for public content.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use bucket_fs::config::Configuration;
//! use bucket_fs::connector::s3::S3ConnectorFactory;
//! use bucket_fs::driver::Driver;
//! use bucket_fs::node::Directory;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let configuration = Configuration::new("access", "secret");
//! let driver = Arc::new(Driver::connect(configuration, "media", &S3ConnectorFactory).await?);
//!
//! let uploads = Directory::new("uploads").with_driver(driver);
//! for file in uploads.files(true).await? {
//!     println!("{}", file.path());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connector;
pub mod driver;
pub mod env;
pub mod error;
pub mod node;
pub mod path;
pub mod storage;

pub use error::{BucketFsError, Result};
