use std::{
    collections::HashMap,
    fmt, fs,
    path::{Path, PathBuf},
};

use bastion_core::{CreepKind, HealthBarBucket, HealthBarThresholds, TowerKind};
use thiserror::Error;

const SUPPORTED_MANIFEST_VERSION: u32 = 1;

/// Symbolic key naming a visual template.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TemplateKey {
    /// Projectile fired by any tower.
    Bullet,
    /// Tower body of the provided kind.
    Tower(TowerKind),
    /// Troop deployed by a barracks.
    Troop,
    /// Creep body of the provided kind.
    Creep(CreepKind),
    /// Health-bar child for the provided bucket.
    HealthBar(HealthBarBucket),
}

impl TemplateKey {
    /// Every key a presenter needs when health bars use `bucket_count` buckets.
    #[must_use]
    pub fn required(bucket_count: usize) -> Vec<Self> {
        let mut keys = vec![Self::Bullet, Self::Troop];
        keys.extend(TowerKind::ALL.into_iter().map(Self::Tower));
        keys.extend(CreepKind::ALL.into_iter().map(Self::Creep));
        keys.extend(
            (0..bucket_count)
                .filter_map(|index| u8::try_from(index).ok())
                .map(|index| Self::HealthBar(HealthBarBucket::new(index))),
        );
        keys
    }

    fn parse(name: &str) -> Option<Self> {
        match name.split_once('.') {
            None => match name {
                "Bullet" => Some(Self::Bullet),
                "Troop" => Some(Self::Troop),
                _ => None,
            },
            Some(("Tower", kind)) => TowerKind::ALL
                .into_iter()
                .find(|candidate| format!("{candidate:?}") == kind)
                .map(Self::Tower),
            Some(("Creep", kind)) => CreepKind::ALL
                .into_iter()
                .find(|candidate| format!("{candidate:?}") == kind)
                .map(Self::Creep),
            Some(("HealthBar", index)) => index
                .parse()
                .ok()
                .map(|index| Self::HealthBar(HealthBarBucket::new(index))),
            Some(_) => None,
        }
    }
}

impl fmt::Display for TemplateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bullet => f.write_str("Bullet"),
            Self::Troop => f.write_str("Troop"),
            Self::Tower(kind) => write!(f, "Tower.{kind:?}"),
            Self::Creep(kind) => write!(f, "Creep.{kind:?}"),
            Self::HealthBar(bucket) => write!(f, "HealthBar.{}", bucket.index()),
        }
    }
}

/// Asset reference a scene instantiates a visual from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Template {
    asset: String,
}

impl Template {
    /// Creates a template referring to the provided asset.
    #[must_use]
    pub fn new(asset: impl Into<String>) -> Self {
        Self {
            asset: asset.into(),
        }
    }

    /// Asset the template refers to.
    #[must_use]
    pub fn asset(&self) -> &str {
        &self.asset
    }
}

/// Errors raised while assembling a template library.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// A template required by the presenter is absent.
    #[error("template {0} missing from library")]
    Missing(TemplateKey),
    /// The manifest could not be read from disk.
    #[error("failed to read template manifest at {path}")]
    Io {
        /// Path of the manifest.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The manifest is not valid TOML or has the wrong shape.
    #[error("failed to parse template manifest")]
    Parse(#[from] toml::de::Error),
    /// The manifest declares a version this build cannot read.
    #[error("unsupported template manifest version {found}; expected {expected}")]
    UnsupportedVersion {
        /// Version declared by the manifest.
        found: u32,
        /// Version understood by this build.
        expected: u32,
    },
    /// The manifest names a key that does not exist.
    #[error("unknown template key `{0}` in manifest")]
    UnknownKey(String),
    /// The manifest names the same key twice.
    #[error("template manifest contains duplicate entry for {0}")]
    Duplicate(TemplateKey),
}

#[derive(Debug, serde::Deserialize)]
struct Manifest {
    version: u32,
    templates: HashMap<String, String>,
}

/// Templates indexed by symbolic key.
#[derive(Clone, Debug, Default)]
pub struct TemplateLibrary {
    templates: HashMap<TemplateKey, Template>,
}

impl TemplateLibrary {
    /// Creates an empty library.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a library that names every required template after its key.
    #[must_use]
    pub fn with_defaults(thresholds: &HealthBarThresholds) -> Self {
        let mut library = Self::new();
        for key in TemplateKey::required(thresholds.bucket_count()) {
            let _ = library.insert(key, Template::new(key.to_string()));
        }
        library
    }

    /// Loads a library from the TOML manifest at `path`.
    pub fn from_manifest_path(path: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| TemplateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_manifest_str(&contents)
    }

    /// Parses a library from TOML manifest contents.
    pub fn from_manifest_str(contents: &str) -> Result<Self, TemplateError> {
        let manifest: Manifest = toml::from_str(contents)?;
        if manifest.version != SUPPORTED_MANIFEST_VERSION {
            return Err(TemplateError::UnsupportedVersion {
                found: manifest.version,
                expected: SUPPORTED_MANIFEST_VERSION,
            });
        }

        let mut library = Self::new();
        for (name, asset) in manifest.templates {
            let key = TemplateKey::parse(&name).ok_or(TemplateError::UnknownKey(name))?;
            if library.insert(key, Template::new(asset)).is_some() {
                return Err(TemplateError::Duplicate(key));
            }
        }
        Ok(library)
    }

    /// Registers `template` under `key`, returning the template it replaced.
    pub fn insert(&mut self, key: TemplateKey, template: Template) -> Option<Template> {
        self.templates.insert(key, template)
    }

    /// Looks up the template registered under `key`.
    #[must_use]
    pub fn get(&self, key: TemplateKey) -> Option<&Template> {
        self.templates.get(&key)
    }

    /// Number of registered templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Reports whether the library holds no templates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Fails with the first required key that has no template.
    pub fn validate(&self, thresholds: &HealthBarThresholds) -> Result<(), TemplateError> {
        match TemplateKey::required(thresholds.bucket_count())
            .into_iter()
            .find(|key| !self.templates.contains_key(key))
        {
            Some(key) => Err(TemplateError::Missing(key)),
            None => Ok(()),
        }
    }
}
