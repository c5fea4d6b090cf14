//! Compiled templates ready to render

use crate::ast::{Ast, ContentType};
use crate::context::Context;
use crate::error::{ParseError, Result};
use crate::render::Renderer;
use crate::repository::{TemplateId, TemplateRepository};
use crate::value::{Boxed, Rendering};

/// A compiled template together with the repository its partials come from
#[derive(Debug, Clone)]
pub struct Template {
    ast: Ast,
    id: Option<TemplateId>,
    repository: TemplateRepository,
    base_context: Context,
}

impl Template {
    pub(crate) fn new(ast: Ast, id: Option<TemplateId>, repository: TemplateRepository) -> Self {
        let base_context = repository.configuration().base_context.clone();
        Self {
            ast,
            id,
            repository,
            base_context,
        }
    }

    /// Compiles a standalone template with the shared configuration
    pub fn parse(src: &str) -> std::result::Result<Self, ParseError> {
        TemplateRepository::new().template_from_str(src)
    }

    pub fn ast(&self) -> &Ast {
        &self.ast
    }

    pub fn id(&self) -> Option<&TemplateId> {
        self.id.as_ref()
    }

    pub fn content_type(&self) -> ContentType {
        self.ast.content_type()
    }

    pub fn repository(&self) -> &TemplateRepository {
        &self.repository
    }

    /// Context that `render` extends with its data
    pub fn base_context(&self) -> &Context {
        &self.base_context
    }

    pub fn with_base_context(mut self, base_context: Context) -> Self {
        self.base_context = base_context;
        self
    }

    pub fn extend_base_context(mut self, value: impl Into<Boxed>) -> Self {
        self.base_context = self.base_context.extend(value);
        self
    }

    pub fn register_key(mut self, key: impl Into<String>, value: impl Into<Boxed>) -> Self {
        self.base_context = self.base_context.with_registered_key(key, value);
        self
    }

    /// Renders `data` on top of the base context
    pub fn render(&self, data: impl Into<Boxed>) -> Result<String> {
        let context = self.base_context.extend(data);
        Ok(self.render_with_context(&context)?.string)
    }

    /// Renders in `context`, ignoring the base context
    #[tracing::instrument(level = "debug", skip_all, fields(template = ?self.id))]
    pub fn render_with_context(&self, context: &Context) -> Result<Rendering> {
        let result = Renderer::new(&self.repository, self.id.clone()).render(&self.ast, context);
        if let Err(err) = &result {
            tracing::debug!(%err, "rendering failed");
        }
        result
    }
}
