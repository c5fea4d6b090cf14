//! Rendering engine
//!
//! Walks a compiled [`Ast`] against a [`Context`]. The rules, per node:
//!
//! - text is copied as is
//! - a variable renders its value, or lets the value's render function do it,
//!   and escapes the result when text lands in an HTML template
//! - a section renders its body once per item of a sequence, once for any
//!   other truthy value, and never for falsy ones; inverted sections do the
//!   opposite and never iterate
//! - partials render in the caller's context with their own content type
//! - partial overrides render their parent with the overriding blocks applied
//!
//! Hooks found in the context run around every variable and section tag.

use crate::ast::{self, Ast, ContentType, Node, Tag};
use crate::context::Context;
use crate::error::{Error, RenderError};
use crate::escape::escape_html;
use crate::parser::compiler::Compiler;
use crate::parser::expression::Expression;
use crate::repository::{TemplateId, TemplateRepository};
use crate::value::{Boxed, Rendering};

/// What a custom render function gets to see
///
/// Besides the tag and the context, it can render the section body, or any
/// template text, without leaving the current rendering.
pub struct RenderingInfo<'r> {
    tag: &'r Tag,
    context: &'r Context,
    content_type: ContentType,
    inner: Option<&'r Ast>,
    renderer: &'r Renderer<'r>,
}

impl<'r> RenderingInfo<'r> {
    pub fn tag(&self) -> &Tag {
        self.tag
    }

    pub fn context(&self) -> &Context {
        self.context
    }

    /// Content type of the template containing the tag
    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    /// Renders the section body in `context`
    ///
    /// Variable tags have no body and render the empty string.
    pub fn render_inner(&self, context: &Context) -> crate::Result<Rendering> {
        match self.inner {
            Some(inner) => self.renderer.render(inner, context),
            None => Ok(Rendering::new("", self.content_type)),
        }
    }

    /// Compiles `source` with the delimiters of the tag and renders it in the
    /// current context
    pub fn render_template(&self, source: &str) -> crate::Result<Rendering> {
        self.render_template_as(source, self.content_type)
    }

    /// Like [`render_template`](Self::render_template), with `source`
    /// compiled as `content_type`
    pub fn render_template_as(&self, source: &str, content_type: ContentType) -> crate::Result<Rendering> {
        let ast = Compiler::new(self.renderer.repository.configuration())
            .for_template(self.tag.template.as_ref())
            .compile_with(source, self.tag.delimiters.clone(), content_type)?;
        self.renderer.render(&ast, self.context)
    }
}

/// Wraps an evaluation failure with the location of its tag
fn in_tag(tag: &Tag, err: RenderError) -> RenderError {
    match err {
        err @ RenderError::InTag { .. } => err,
        err => RenderError::InTag {
            tag: tag.source.to_string(),
            position: tag.position,
            template: tag.template.clone(),
            source: Box::new(err),
        },
    }
}

/// Turns a rendering into text for a template of `content_type`
fn embed(rendering: Rendering, content_type: ContentType, escapes: bool) -> String {
    if escapes && content_type == ContentType::Html && rendering.content_type == ContentType::Text {
        escape_html(&rendering.string).into_owned()
    } else {
        rendering.string
    }
}

/// Renders the trees of one template
pub(crate) struct Renderer<'r> {
    repository: &'r TemplateRepository,
    template: Option<TemplateId>,
    /// Overrides of the enclosing partial overrides, outermost first
    overrides: Vec<Ast>,
}

impl<'r> Renderer<'r> {
    pub(crate) fn new(repository: &'r TemplateRepository, template: Option<TemplateId>) -> Self {
        Self {
            repository,
            template,
            overrides: Vec::new(),
        }
    }

    pub(crate) fn render(&self, ast: &Ast, context: &Context) -> crate::Result<Rendering> {
        let mut buffer = String::new();
        self.render_nodes(ast, context, &mut buffer)?;
        Ok(Rendering::new(buffer, ast.content_type()))
    }

    /// Renders `ast` into a template of `content_type`
    fn render_embedded(
        &self,
        ast: &Ast,
        context: &Context,
        content_type: ContentType,
        buffer: &mut String,
    ) -> crate::Result<()> {
        if ast.content_type() == content_type {
            return self.render_nodes(ast, context, buffer);
        }
        let rendering = self.render(ast, context)?;
        buffer.push_str(&embed(rendering, content_type, true));
        Ok(())
    }

    fn render_nodes(&self, ast: &Ast, context: &Context, buffer: &mut String) -> crate::Result<()> {
        let content_type = ast.content_type();
        for node in ast.nodes() {
            match node {
                Node::Text(text) => buffer.push_str(text),
                Node::Variable {
                    expression,
                    escapes,
                    tag,
                } => self.render_tag(tag, expression, context, buffer, |value| {
                    self.variable(tag, value, *escapes, context, content_type)
                })?,
                Node::Section {
                    expression,
                    inverted,
                    inner,
                    tag,
                } => self.render_tag(tag, expression, context, buffer, |value| {
                    self.section(tag, value, *inverted, inner, context)
                })?,
                Node::Partial { name } => {
                    let (id, partial) = self.repository.partial(name, self.template.as_ref())?;
                    tracing::trace!(%id, "rendering partial");
                    Renderer::new(self.repository, Some(id)).render_embedded(&partial, context, content_type, buffer)?
                }
                Node::Block { inner, .. } => self.render_embedded(inner, context, content_type, buffer)?,
                Node::Parent { name, overrides } => {
                    let (id, parent) = self.repository.partial(name, self.template.as_ref())?;
                    let resolved = self
                        .overrides
                        .iter()
                        .rev()
                        .fold(ast::resolve(overrides, &parent), |resolved, enclosing| {
                            ast::resolve(enclosing, &resolved)
                        });
                    let mut chain = self.overrides.clone();
                    chain.push(overrides.clone());
                    let renderer = Renderer {
                        repository: self.repository,
                        template: Some(id),
                        overrides: chain,
                    };
                    renderer.render_embedded(&resolved, context, content_type, buffer)?
                }
            }
        }
        Ok(())
    }

    /// Evaluates a tag and runs the context hooks around `render`
    fn render_tag(
        &self,
        tag: &Tag,
        expression: &Expression,
        context: &Context,
        buffer: &mut String,
        render: impl FnOnce(&Boxed) -> crate::Result<String>,
    ) -> crate::Result<()> {
        let value = context.lookup(expression).map_err(|err| in_tag(tag, err))?;
        let value = context.will_render_hooks().fold(value, |value, hook| hook(tag, value));
        let result = render(&value).map_err(|err| match err {
            Error::Render(err) => Error::Render(in_tag(tag, err)),
            err => err,
        });
        for hook in context.did_render_hooks() {
            hook(tag, &value, result.as_deref().ok());
        }
        buffer.push_str(&result?);
        Ok(())
    }

    fn variable(
        &self,
        tag: &Tag,
        value: &Boxed,
        escapes: bool,
        context: &Context,
        content_type: ContentType,
    ) -> crate::Result<String> {
        let rendering = match value.render_fn() {
            Some(render) => render(&RenderingInfo {
                tag,
                context,
                content_type,
                inner: None,
                renderer: self,
            })?,
            None => Rendering::text(value.to_text()),
        };
        Ok(embed(rendering, content_type, escapes))
    }

    fn section(
        &self,
        tag: &Tag,
        value: &Boxed,
        inverted: bool,
        inner: &Ast,
        context: &Context,
    ) -> crate::Result<String> {
        let content_type = inner.content_type();
        if inverted {
            if value.is_truthy() {
                return Ok(String::new());
            }
            return Ok(self.render(inner, context)?.string);
        }
        let custom = |value: &Boxed| {
            value.render_fn().map(|render| {
                render(&RenderingInfo {
                    tag,
                    context,
                    content_type,
                    inner: Some(inner),
                    renderer: self,
                })
                .map(|rendering| embed(rendering, content_type, true))
            })
        };
        if let Some(result) = custom(value) {
            return result;
        }
        if let Some(items) = value.as_seq() {
            let mut buffer = String::new();
            for item in items {
                match custom(item) {
                    Some(result) => buffer.push_str(&result?),
                    None => self.render_nodes(inner, &context.extend(item.clone()), &mut buffer)?,
                }
            }
            return Ok(buffer);
        }
        if !value.is_truthy() {
            return Ok(String::new());
        }
        Ok(self.render(inner, &context.extend(value.clone()))?.string)
    }
}
