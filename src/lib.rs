//! resvfs: read-only virtual filesystem over mounted resource containers
//!
//! This library implements a compact binary resource container and a
//! registry that overlays any number of them into one path namespace:
//! - Container parsing with header checksum and table bounds validation
//! - Directory tree reconstruction with locale variants per file
//! - Zlib/Zstd block decompression with size and CRC verification
//! - Most-recent-wins overlay of mounted containers
//! - An encoder and TOML manifests for producing containers
//!
//! # Example
//!
//! ```no_run
//! use resvfs::{ContainerWriter, MountRegistry};
//!
//! // Build a container
//! let mut writer = ContainerWriter::new();
//! writer.add_file("/images/logo.png", b"...png bytes...")?;
//! writer.add_file("/text/readme.txt", b"Hello, World!")?;
//! let image = writer.finish()?;
//!
//! // Mount it and read back through the virtual namespace
//! let mut registry = MountRegistry::new();
//! registry.mount(image)?;
//! let data = registry.read(":/text/readme.txt", None)?;
//! for entry in registry.list("/", true)? {
//!     println!("{} {}", if entry.is_directory { "d" } else { "f" }, entry.path);
//! }
//! # let _ = data;
//! # Ok::<(), resvfs::error::ResourceError>(())
//! ```

// Core modules
pub mod container;
pub mod decompress;
pub mod error;
pub mod manifest;
pub mod path;
pub mod query;
pub mod registry;
pub mod tree;

// Re-export commonly used types
pub use container::{
    CompressionMethod, ContainerHeader, ContainerWriter, RawContainer, WriterOptions,
    CURRENT_FORMAT_VERSION, FORMAT_VERSION_1, FORMAT_VERSION_2, HEADER_SIZE, MAGIC_NUMBER,
};
pub use error::{ErrorKind, ResourceError, Result};
pub use manifest::{ResourceFile, ResourceGroup, ResourceManifest};
pub use query::{ListEntry, ListIter, Stat, PRIVATE_NAMESPACE};
pub use registry::{Container, MountHandle, MountRegistry, ResolvedEntry};
pub use tree::{DirectoryTree, EntryId, FileNode, TreeEntry, VariantSet};
