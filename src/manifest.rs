//! Resource manifests: TOML descriptions of what goes into a container
//!
//! A manifest lists files on disk grouped under a virtual prefix and,
//! optionally, a locale. [`ContainerWriter::from_manifest`] turns one into a
//! ready-to-finish writer.
//!
//! # Example
//!
//! ```toml
//! format_version = 2
//! compression = "zstd"
//!
//! [[resource]]
//! prefix = "/images"
//!
//! [[resource.file]]
//! path = "art/logo.png"
//! alias = "logo.png"
//!
//! [[resource]]
//! prefix = "/text"
//! locale = "de"
//!
//! [[resource.file]]
//! path = "strings/de/greeting.txt"
//! alias = "greeting.txt"
//! ```
//!
//! ```no_run
//! use resvfs::{ContainerWriter, ResourceManifest};
//! # use resvfs::error::Result;
//!
//! # fn main() -> Result<()> {
//! let manifest = ResourceManifest::load("resources.toml")?;
//! let writer = ContainerWriter::from_manifest(&manifest, "assets")?;
//! writer.write_to_path("resources.rcv")?;
//! # Ok(())
//! # }
//! ```

use crate::container::{
    CompressionMethod, ContainerWriter, WriterOptions, FORMAT_VERSION_1, FORMAT_VERSION_2,
};
use crate::error::{ResourceError, Result};
use crate::path;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Top-level manifest document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceManifest {
    /// Container format version (defaults to the current version)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_version: Option<u32>,

    /// Default compression for files without an override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression: Option<CompressionMethod>,

    /// Files smaller than this are stored uncompressed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression_threshold: Option<usize>,

    #[serde(default, rename = "resource")]
    pub resources: Vec<ResourceGroup>,
}

/// Files sharing a virtual prefix and locale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceGroup {
    #[serde(default = "default_prefix")]
    pub prefix: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,

    #[serde(default, rename = "file")]
    pub files: Vec<ResourceFile>,
}

/// One file entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceFile {
    /// Path on disk, relative to the manifest's base directory
    pub path: String,

    /// Name inside the container (defaults to `path`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression: Option<CompressionMethod>,
}

fn default_prefix() -> String {
    "/".to_string()
}

impl ResourceFile {
    /// Virtual path of this file under `prefix`
    pub fn virtual_path(&self, prefix: &str) -> String {
        let name = self.alias.as_deref().unwrap_or(&self.path);
        path::display(&path::key(&format!("{prefix}/{name}")))
    }
}

impl ResourceManifest {
    /// Parse and validate a manifest
    pub fn from_toml(text: &str) -> Result<Self> {
        let manifest: Self = toml::from_str(text)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Read a manifest file
    pub fn load<P: AsRef<Path>>(manifest_path: P) -> Result<Self> {
        let text = std::fs::read_to_string(manifest_path)?;
        Self::from_toml(&text)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Encoder settings implied by the manifest's top-level keys
    pub fn writer_options(&self) -> WriterOptions {
        let mut options = WriterOptions::default();
        if let Some(version) = self.format_version {
            options.format_version = version;
        }
        if let Some(compression) = self.compression {
            options.compression = compression;
        }
        if let Some(threshold) = self.compression_threshold {
            options.compression_threshold = threshold;
        }
        options
    }

    /// Total number of file entries across all groups
    pub fn file_count(&self) -> usize {
        self.resources.iter().map(|group| group.files.len()).sum()
    }

    fn validate(&self) -> Result<()> {
        if let Some(version) = self.format_version {
            if version != FORMAT_VERSION_1 && version != FORMAT_VERSION_2 {
                return Err(ResourceError::InvalidManifest(format!(
                    "format_version must be {FORMAT_VERSION_1} or {FORMAT_VERSION_2}, got {version}"
                )));
            }
        }

        for group in &self.resources {
            if group.locale.as_deref() == Some("") {
                return Err(ResourceError::InvalidManifest(format!(
                    "empty locale in resource group {}",
                    group.prefix
                )));
            }
            for file in &group.files {
                if file.path.is_empty() {
                    return Err(ResourceError::InvalidManifest(format!(
                        "file entry without a path in resource group {}",
                        group.prefix
                    )));
                }
                if path::key(&file.virtual_path(&group.prefix)).is_empty() {
                    return Err(ResourceError::InvalidManifest(format!(
                        "{} maps onto the container root",
                        file.path
                    )));
                }
            }
        }
        Ok(())
    }
}

impl ContainerWriter {
    /// Create a writer populated with every file a manifest names
    ///
    /// Disk paths are resolved against `base_dir`.
    pub fn from_manifest<P: AsRef<Path>>(manifest: &ResourceManifest, base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref();
        let mut writer = ContainerWriter::with_options(manifest.writer_options());

        for group in &manifest.resources {
            let locale = group.locale.as_deref().unwrap_or("");
            for file in &group.files {
                let target = file.virtual_path(&group.prefix);
                let data = std::fs::read(base_dir.join(&file.path))?;
                let method = match file.compression {
                    Some(method) => method,
                    None => writer.select_compression(&target, data.len()),
                };
                writer.add_localized_file(&target, locale, &data, method)?;
            }
        }

        debug!(
            files = manifest.file_count(),
            groups = manifest.resources.len(),
            "populated writer from manifest"
        );
        Ok(writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::registry::MountRegistry;
    use std::fs;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
format_version = 2
compression = "zlib"
compression_threshold = 16

[[resource]]
prefix = "/text"

[[resource.file]]
path = "en/greeting.txt"
alias = "greeting.txt"

[[resource]]
prefix = "/text"
locale = "de"

[[resource.file]]
path = "de/greeting.txt"
alias = "greeting.txt"
compression = "none"
"#;

    #[test]
    fn test_parse_manifest() {
        let manifest = ResourceManifest::from_toml(SAMPLE).unwrap();
        assert_eq!(manifest.resources.len(), 2);
        assert_eq!(manifest.file_count(), 2);
        assert_eq!(manifest.resources[1].locale.as_deref(), Some("de"));
        assert_eq!(
            manifest.resources[1].files[0].compression,
            Some(CompressionMethod::None)
        );

        let options = manifest.writer_options();
        assert_eq!(options.compression, CompressionMethod::Zlib);
        assert_eq!(options.compression_threshold, 16);
    }

    #[test]
    fn test_defaults() {
        let manifest =
            ResourceManifest::from_toml("[[resource]]\n[[resource.file]]\npath = \"a.txt\"\n")
                .unwrap();
        assert_eq!(manifest.resources[0].prefix, "/");
        assert_eq!(manifest.writer_options(), WriterOptions::default());
        assert_eq!(manifest.resources[0].files[0].virtual_path("/"), "/a.txt");
    }

    #[test]
    fn test_invalid_manifests() {
        let err = ResourceManifest::from_toml("format_version = 7").unwrap_err();
        assert!(matches!(err, ResourceError::InvalidManifest(_)));

        let err = ResourceManifest::from_toml("compression = \"lz4\"").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);

        let err = ResourceManifest::from_toml("[[resource]]\nlocale = \"\"\n").unwrap_err();
        assert!(matches!(err, ResourceError::InvalidManifest(_)));
    }

    #[test]
    fn test_toml_roundtrip() {
        let manifest = ResourceManifest::from_toml(SAMPLE).unwrap();
        let text = manifest.to_toml().unwrap();
        assert_eq!(ResourceManifest::from_toml(&text).unwrap(), manifest);
    }

    #[test]
    fn test_build_from_manifest() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("en")).unwrap();
        fs::create_dir_all(dir.path().join("de")).unwrap();
        fs::write(dir.path().join("en/greeting.txt"), b"Hello, hello, hello, hello!").unwrap();
        fs::write(dir.path().join("de/greeting.txt"), b"Hallo").unwrap();

        let manifest = ResourceManifest::from_toml(SAMPLE).unwrap();
        let writer = ContainerWriter::from_manifest(&manifest, dir.path()).unwrap();

        let mut registry = MountRegistry::new();
        registry.mount(writer.finish().unwrap()).unwrap();

        assert_eq!(
            &registry.read("/text/greeting.txt", None).unwrap()[..],
            b"Hello, hello, hello, hello!"
        );
        assert_eq!(
            &registry.read("/text/greeting.txt", Some("de")).unwrap()[..],
            b"Hallo"
        );
        assert!(registry.stat("/text/greeting.txt").unwrap().has_locale_variants);
    }

    #[test]
    fn test_missing_input_file() {
        let dir = TempDir::new().unwrap();
        let manifest = ResourceManifest::from_toml(SAMPLE).unwrap();
        let err = ContainerWriter::from_manifest(&manifest, dir.path()).err().unwrap();
        assert!(matches!(err, ResourceError::Io(_)));
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
