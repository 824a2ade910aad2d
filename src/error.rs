use std::path::{Path, PathBuf};

use thiserror::Error;

/// Everything that can go wrong while reading or rewriting a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("{}: invalid manifest, could not find the <{element}> element", path.display())]
    MissingElement { path: PathBuf, element: &'static str },

    #[error("{}: {source}", path.display())]
    Xml {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: {source}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("{}: package archive has no .nuspec document", path.display())]
    MissingPackageMetadata { path: PathBuf },

    #[error("{}: {message}", path.display())]
    Solution { path: PathBuf, message: String },

    #[error("{}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

pub type Result<T, E = ManifestError> = std::result::Result<T, E>;

impl ManifestError {
    pub(crate) fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io { path: path.as_ref().to_path_buf(), source }
    }

    pub(crate) fn xml(path: impl AsRef<Path>, source: roxmltree::Error) -> Self {
        Self::Xml { path: path.as_ref().to_path_buf(), source }
    }

    /// Errors confined to a single manifest. Workspace-wide passes record
    /// these and carry on with the next project; everything else aborts.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::MissingElement { .. }
                | Self::Xml { .. }
                | Self::Solution { .. }
                | Self::MissingPackageMetadata { .. }
        )
    }
}
