//! Template repositories
//!
//! A [`TemplateRepository`] resolves the names used by partial tags, compiles
//! templates on first use and keeps the compiled trees until [`reload`] is
//! called. Partials stay named references in the tree and are looked up here
//! while rendering, so templates can include each other, or themselves.
//!
//! The repository is a cheap handle: clones share one cache. A template is
//! compiled at most once even when many threads ask for it at the same time.
//!
//! [`reload`]: TemplateRepository::reload
//!
//! # Examples
//!
//! ```rust
//! use dry_mustache::TemplateRepository;
//! use serde_json::json;
//!
//! let repository = TemplateRepository::from_map([
//!     ("page", "<h1>{{title}}</h1>{{>footer}}"),
//!     ("footer", "<p>{{copyright}}</p>"),
//! ]);
//! let page = repository.template_named("page").unwrap();
//! let html = page.render(json!({"title": "Home", "copyright": "(c) me"})).unwrap();
//! assert_eq!(html, "<h1>Home</h1><p>(c) me</p>");
//! ```

mod source;

use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

pub use source::{resolve_path, BundleSource, DirectorySource, MapSource, TemplateId, TemplateSource};

use crate::ast::Ast;
use crate::config::Configuration;
use crate::error::{ParseError, TemplateNotFoundError};
use crate::parser::compiler::Compiler;
use crate::template::Template;

/// A cache entry; the inner lock is held while the template compiles
type Slot = Arc<Mutex<Option<Ast>>>;

struct Inner {
    source: Option<Arc<dyn TemplateSource>>,
    configuration: Configuration,
    cache: RwLock<HashMap<TemplateId, Slot>>,
}

/// Resolves, compiles and caches templates
#[derive(Clone)]
pub struct TemplateRepository {
    inner: Arc<Inner>,
}

impl Debug for TemplateRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateRepository")
            .field("has_source", &self.inner.source.is_some())
            .field("cached", &self.inner.cache.read().len())
            .finish()
    }
}

impl Default for TemplateRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRepository {
    fn build(source: Option<Arc<dyn TemplateSource>>, configuration: Configuration) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                configuration,
                cache: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// A repository without templates; partial tags fail to resolve
    pub fn new() -> Self {
        Self::build(None, Configuration::shared().clone())
    }

    pub fn with_source(source: impl TemplateSource + 'static) -> Self {
        Self::build(Some(Arc::new(source)), Configuration::shared().clone())
    }

    pub fn from_map<K: Into<String>, V: Into<String>>(templates: impl IntoIterator<Item = (K, V)>) -> Self {
        Self::with_source(templates.into_iter().collect::<MapSource>())
    }

    /// Serves `*.mustache` files below `root`
    pub fn from_directory(root: impl Into<PathBuf>) -> Self {
        Self::with_source(DirectorySource::new(root))
    }

    /// Serves templates embedded with [`bundle!`](crate::bundle)
    pub fn from_bundle(bundle: &'static [(&'static str, &'static str)]) -> Self {
        Self::with_source(BundleSource::new(bundle))
    }

    /// Returns a repository over the same source with another configuration
    ///
    /// The returned repository starts with an empty cache.
    pub fn with_configuration(self, configuration: Configuration) -> Self {
        Self::build(self.inner.source.clone(), configuration)
    }

    pub fn configuration(&self) -> &Configuration {
        &self.inner.configuration
    }

    /// Resolves a partial name relative to the template referencing it
    pub fn resolve(&self, name: &str, relative_to: Option<&TemplateId>) -> Result<TemplateId, TemplateNotFoundError> {
        self.inner
            .source
            .as_ref()
            .and_then(|source| source.resolve(name, relative_to))
            .ok_or_else(|| {
                tracing::debug!(name, relative_to = ?relative_to, "template not found");
                TemplateNotFoundError::new(name, relative_to)
            })
    }

    /// Returns the compiled template for `id`, compiling it on first use
    ///
    /// Failed compilations are not cached.
    pub fn template_for(&self, id: &TemplateId) -> crate::Result<Ast> {
        let slot = {
            let cache = self.inner.cache.read();
            cache.get(id).cloned()
        };
        let slot = match slot {
            Some(slot) => slot,
            None => {
                let mut cache = self.inner.cache.write();
                cache.entry(id.clone()).or_default().clone()
            }
        };
        let mut compiled = slot.lock();
        if let Some(ast) = compiled.as_ref() {
            tracing::trace!(%id, "template cache hit");
            return Ok(ast.clone());
        }
        tracing::debug!(%id, "compiling template");
        let source = match &self.inner.source {
            Some(source) => source.load(id)?,
            None => return Err(TemplateNotFoundError::new(id.as_str(), None).into()),
        };
        let ast = Compiler::new(&self.inner.configuration)
            .for_template(Some(id))
            .compile(&source)?;
        *compiled = Some(ast.clone());
        Ok(ast)
    }

    /// Resolves and compiles a template referenced from another one
    pub(crate) fn partial(&self, name: &str, relative_to: Option<&TemplateId>) -> crate::Result<(TemplateId, Ast)> {
        let id = self.resolve(name, relative_to)?;
        let ast = self.template_for(&id)?;
        Ok((id, ast))
    }

    /// Loads a template by name
    pub fn template_named(&self, name: &str) -> crate::Result<Template> {
        let (id, ast) = self.partial(name, None)?;
        Ok(Template::new(ast, Some(id), self.clone()))
    }

    /// Compiles a template that is not part of the source
    ///
    /// Its partial tags resolve through this repository.
    pub fn template_from_str(&self, src: &str) -> Result<Template, ParseError> {
        let ast = Compiler::new(&self.inner.configuration).compile(src)?;
        Ok(Template::new(ast, None, self.clone()))
    }

    /// Drops every compiled template
    ///
    /// Renderings in progress finish with the trees they already hold; later
    /// lookups load and compile again.
    pub fn reload(&self) {
        let mut cache = self.inner.cache.write();
        tracing::debug!(dropped = cache.len(), "reloading templates");
        cache.clear();
    }
}
