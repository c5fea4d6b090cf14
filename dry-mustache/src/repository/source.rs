//! Where template text comes from
//!
//! A [`TemplateSource`] maps names found in partial tags to [`TemplateId`]s
//! and loads the text behind an id. Three sources are provided:
//!
//! - [`MapSource`]: an in-memory table of names and texts
//! - [`DirectorySource`]: files below a root directory
//! - [`BundleSource`]: a table produced by [`bundle!`](crate::bundle) at build time
//!
//! The directory and bundle sources resolve names like paths: `header`
//! referenced from `pages/home` is `pages/header`, `../header` is `header`, and
//! a leading `/` starts from the root. Names that would leave the root do not
//! resolve.

use std::collections::HashMap;
use std::fmt::{self, Debug, Display};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::TemplateNotFoundError;

/// Identity of a template within a repository, used as the cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TemplateId(Arc<str>);

impl TemplateId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TemplateId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TemplateId {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

/// Supplies template text to a [`TemplateRepository`](crate::TemplateRepository)
pub trait TemplateSource: Send + Sync {
    /// Resolves a partial name, relative to the template that references it
    fn resolve(&self, name: &str, relative_to: Option<&TemplateId>) -> Option<TemplateId>;

    /// Loads the text of a resolved template
    fn load(&self, id: &TemplateId) -> Result<String, TemplateNotFoundError>;
}

/// Resolves `name` as a `/`-separated path
///
/// Returns `None` for empty results and for paths escaping the root.
pub fn resolve_path(name: &str, relative_to: Option<&TemplateId>) -> Option<TemplateId> {
    let mut components: Vec<&str> = Vec::new();
    if !name.starts_with('/') {
        if let Some(base) = relative_to {
            components.extend(base.as_str().split('/'));
            components.pop();
        }
    }
    for component in name.split('/') {
        match component {
            "" | "." => (),
            ".." => {
                components.pop()?;
            }
            component => components.push(component),
        }
    }
    components.retain(|component| !component.is_empty());
    if components.is_empty() {
        return None;
    }
    Some(TemplateId::from(components.join("/")))
}

/// Templates held in memory, looked up by exact name
#[derive(Debug, Clone, Default)]
pub struct MapSource {
    templates: HashMap<String, String>,
}

impl MapSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.templates.insert(name.into(), source.into());
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapSource {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            templates: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl TemplateSource for MapSource {
    fn resolve(&self, name: &str, _relative_to: Option<&TemplateId>) -> Option<TemplateId> {
        self.templates.contains_key(name).then(|| TemplateId::from(name))
    }

    fn load(&self, id: &TemplateId) -> Result<String, TemplateNotFoundError> {
        self.templates
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| TemplateNotFoundError::new(id.as_str(), None))
    }
}

/// Template files below a root directory
///
/// Ids are paths relative to the root without the file extension.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
    extension: Option<String>,
}

impl DirectorySource {
    /// Serves `*.mustache` files below `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: Some("mustache".to_string()),
        }
    }

    /// Changes the file extension; `None` uses names as they are
    pub fn with_extension(mut self, extension: Option<&str>) -> Self {
        self.extension = extension.map(|extension| extension.trim_start_matches('.').to_string());
        self
    }

    fn path(&self, id: &TemplateId) -> PathBuf {
        let mut path = self.root.clone();
        path.extend(id.as_str().split('/'));
        if let Some(extension) = &self.extension {
            let mut file_name = path.file_name().map(|name| name.to_os_string()).unwrap_or_default();
            file_name.push(".");
            file_name.push(extension);
            path.set_file_name(file_name);
        }
        path
    }
}

impl TemplateSource for DirectorySource {
    fn resolve(&self, name: &str, relative_to: Option<&TemplateId>) -> Option<TemplateId> {
        resolve_path(name, relative_to)
    }

    fn load(&self, id: &TemplateId) -> Result<String, TemplateNotFoundError> {
        let path = self.path(id);
        fs::read_to_string(&path).map_err(|err| {
            TemplateNotFoundError::new(id.as_str(), None).with_reason(format!("{}: {}", path.display(), err))
        })
    }
}

/// Templates compiled into the binary with [`bundle!`](crate::bundle)
#[derive(Clone, Copy)]
pub struct BundleSource {
    templates: &'static [(&'static str, &'static str)],
}

impl Debug for BundleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.templates.iter().map(|(name, _)| name)).finish()
    }
}

impl BundleSource {
    pub fn new(templates: &'static [(&'static str, &'static str)]) -> Self {
        Self { templates }
    }

    fn find(&self, id: &str) -> Option<&'static str> {
        self.templates
            .iter()
            .find(|(name, _)| *name == id)
            .map(|(_, source)| *source)
    }
}

impl TemplateSource for BundleSource {
    fn resolve(&self, name: &str, relative_to: Option<&TemplateId>) -> Option<TemplateId> {
        resolve_path(name, relative_to).filter(|id| self.find(id.as_str()).is_some())
    }

    fn load(&self, id: &TemplateId) -> Result<String, TemplateNotFoundError> {
        self.find(id.as_str())
            .map(str::to_string)
            .ok_or_else(|| TemplateNotFoundError::new(id.as_str(), None))
    }
}
