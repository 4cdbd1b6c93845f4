//! K8s-style manifest types consumed and produced by the tree walker.
//!
//! Only the fields this tool reads or rewrites are typed. Everything else in a
//! manifest is carried through `extra` maps so a rewritten file keeps the
//! fields it arrived with.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GraftError, Result};

/// The `kind` of an Application manifest.
pub const APPLICATION_KIND: &str = "Application";

/// Namespace assumed for Applications that do not declare one.
pub const DEFAULT_NAMESPACE: &str = "argocd";

/// Kustomize file names, in the order kustomize itself looks for them.
pub const KUSTOMIZATION_FILES: &[&str] = &["kustomization.yaml", "kustomization.yml", "Kustomization"];

/// Unknown fields preserved across a parse/serialize cycle.
pub type Extra = BTreeMap<String, serde_yaml::Value>;

/// Metadata for a resource, following K8s conventions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl ObjectMeta {
    /// Creates a new ObjectMeta with just a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Adds a label to the metadata.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// Minimal discriminator read before committing to a typed parse.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceHeader {
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
}

/// An ArgoCD-style Application manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ApplicationSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ApplicationStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ApplicationSource>,

    #[serde(flatten)]
    pub extra: Extra,
}

/// Where the controller syncs the Application from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSource {
    #[serde(rename = "repoURL", default)]
    pub repo_url: String,

    #[serde(default)]
    pub path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_revision: Option<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

/// Controller-reported state of an Application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync: Option<SyncStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthStatus>,

    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub revision: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    #[serde(default)]
    pub status: String,
}

impl Application {
    /// Builds a minimal Application pointing at `path` in `repo_url`.
    pub fn new(name: impl Into<String>, repo_url: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            api_version: "argoproj.io/v1alpha1".to_string(),
            kind: APPLICATION_KIND.to_string(),
            metadata: ObjectMeta::new(name),
            spec: ApplicationSpec {
                source: Some(ApplicationSource {
                    repo_url: repo_url.into(),
                    path: path.into(),
                    ..Default::default()
                }),
                extra: Extra::new(),
            },
            status: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Namespace the Application object lives in.
    pub fn namespace(&self) -> &str {
        self.metadata
            .namespace
            .as_deref()
            .unwrap_or(DEFAULT_NAMESPACE)
    }

    /// The desired sync directory, relative to the repository root.
    ///
    /// `None` when the manifest has no single source or an empty path.
    pub fn source_path(&self) -> Option<&str> {
        self.spec
            .source
            .as_ref()
            .map(|s| s.path.as_str())
            .filter(|p| !p.is_empty())
    }

    /// Points the Application at a new sync directory.
    pub fn set_source_path(&mut self, path: impl Into<String>) {
        self.spec.source.get_or_insert_with(Default::default).path = path.into();
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.metadata.labels.get(key).map(String::as_str)
    }

    /// Reported sync state, if the controller has published one.
    pub fn sync_status(&self) -> Option<&SyncStatus> {
        self.status.as_ref().and_then(|s| s.sync.as_ref())
    }
}

/// Outcome of interpreting the first document of a manifest file.
#[derive(Debug, Clone)]
pub enum ManifestDocument {
    Application(Box<Application>),
    /// A well-formed document of some other kind, or no kind at all.
    Other { kind: Option<String> },
}

/// Interprets the first `---`-separated document of `content`.
///
/// Later documents are ignored. A document that is not an Application is an
/// expected outcome, not an error; malformed YAML is an error.
pub fn parse_first_document(content: &str, path: &Path) -> Result<ManifestDocument> {
    let parse_err = |e: serde_yaml::Error| GraftError::ParseYaml {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let Some(document) = serde_yaml::Deserializer::from_str(content).next() else {
        return Ok(ManifestDocument::Other { kind: None });
    };
    let value = serde_yaml::Value::deserialize(document).map_err(parse_err)?;

    if !value.is_mapping() {
        return Ok(ManifestDocument::Other { kind: None });
    }

    let header: ResourceHeader = serde_yaml::from_value(value.clone()).map_err(parse_err)?;
    if header.kind.as_deref() != Some(APPLICATION_KIND) {
        return Ok(ManifestDocument::Other { kind: header.kind });
    }

    let app: Application =
        serde_yaml::from_value(value).map_err(|e| GraftError::InvalidManifest {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    Ok(ManifestDocument::Application(Box::new(app)))
}

/// Rewrites the first document of `path` with `app`, keeping later documents.
pub fn write_application(path: &Path, app: &Application) -> Result<()> {
    let existing = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => {
            return Err(GraftError::ReadFile {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    let mut documents = Vec::new();
    documents.push(serde_yaml::to_string(app).map_err(|e| GraftError::SerializeYaml(e.to_string()))?);

    for document in serde_yaml::Deserializer::from_str(&existing).skip(1) {
        let value = serde_yaml::Value::deserialize(document).map_err(|e| GraftError::ParseYaml {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        documents.push(
            serde_yaml::to_string(&value).map_err(|e| GraftError::SerializeYaml(e.to_string()))?,
        );
    }

    fs::write(path, documents.join("---\n")).map_err(|e| GraftError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })
}

/// The subset of a kustomization file used to locate shared bases.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Kustomization {
    #[serde(default)]
    pub resources: Vec<String>,
}

impl Kustomization {
    /// Loads the kustomization file in `dir`.
    pub fn load(dir: &Path) -> Result<(Kustomization, PathBuf)> {
        let path = KUSTOMIZATION_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|p| p.is_file())
            .unwrap_or_else(|| dir.join(KUSTOMIZATION_FILES[0]));

        let content = fs::read_to_string(&path).map_err(|e| GraftError::ReadFile {
            path: path.clone(),
            source: e,
        })?;
        let kustomization = serde_yaml::from_str(&content).map_err(|e| GraftError::ParseYaml {
            path: path.clone(),
            message: e.to_string(),
        })?;
        Ok((kustomization, path))
    }

    /// The first listed resource, taken as the shared base location.
    pub fn base(&self) -> Option<&str> {
        self.resources.first().map(String::as_str)
    }
}

/// A resource along with its file path.
#[derive(Debug, Clone)]
pub struct ResourceWithPath<T> {
    /// The resource.
    pub resource: T,
    /// Absolute path of the file the resource was read from.
    pub path: PathBuf,
}

impl<T> ResourceWithPath<T> {
    pub fn new(resource: T, path: impl Into<PathBuf>) -> Self {
        Self {
            resource,
            path: path.into(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
