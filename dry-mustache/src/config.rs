//! Compilation and rendering defaults
//!
//! A [`Configuration`] is a plain value: repositories take a copy of it and
//! nothing ever changes a configuration that is in use. [`Configuration::shared`]
//! is a process-wide default for the convenience constructors.
//!
//! # Examples
//!
//! ```rust
//! use dry_mustache::{Configuration, ContentType, Delimiters, TemplateRepository};
//! use serde_json::json;
//!
//! let configuration = Configuration::default()
//!     .with_content_type(ContentType::Text)
//!     .with_delimiters(Delimiters::new("<%", "%>"))
//!     .register_key("site", "example.com");
//! let repository = TemplateRepository::new().with_configuration(configuration);
//! let template = repository.template_from_str("<% site %>: <% title %>").unwrap();
//! assert_eq!(template.render(json!({"title": "a < b"})).unwrap(), "example.com: a < b");
//! ```

use std::sync::OnceLock;

use crate::ast::ContentType;
use crate::context::Context;
use crate::parser::tokenizer::Delimiters;
use crate::value::Boxed;

/// Defaults applied to every template of a repository
#[derive(Debug, Clone, Default)]
pub struct Configuration {
    /// Content type of templates without a content type pragma
    pub content_type: ContentType,
    /// Delimiters templates start with
    pub delimiters: Delimiters,
    /// Bottom of every rendering context
    pub base_context: Context,
}

static SHARED: OnceLock<Configuration> = OnceLock::new();

impl Configuration {
    /// The process-wide default configuration
    pub fn shared() -> &'static Configuration {
        SHARED.get_or_init(Configuration::default)
    }

    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }

    pub fn with_delimiters(mut self, delimiters: Delimiters) -> Self {
        self.delimiters = delimiters;
        self
    }

    pub fn with_base_context(mut self, base_context: Context) -> Self {
        self.base_context = base_context;
        self
    }

    /// Pushes `value` on top of the base context
    pub fn extend_base_context(mut self, value: impl Into<Boxed>) -> Self {
        self.base_context = self.base_context.extend(value);
        self
    }

    /// Makes `key` resolve to `value` in every rendering
    pub fn register_key(mut self, key: impl Into<String>, value: impl Into<Boxed>) -> Self {
        self.base_context = self.base_context.with_registered_key(key, value);
        self
    }
}
