//! Compiled template trees
//!
//! An [`Ast`] is the immutable output of the compiler: an ordered list of
//! [`Node`]s and the [`ContentType`] the template was compiled with. Trees are
//! shared through `Arc`s, so cloning an `Ast` is cheap and a compiled template
//! can be rendered from many threads at once.
//!
//! This module also holds [`resolve`], the block override algorithm used by
//! template inheritance.

use std::sync::Arc;

use crate::error::Position;
use crate::parser::expression::Expression;
use crate::parser::tokenizer::Delimiters;
use crate::repository::TemplateId;

/// Governs HTML escaping of variable tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ContentType {
    Text,
    #[default]
    Html,
}

/// Whether a tag renders a value or a section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Variable,
    Section,
}

/// Source information about a variable or section tag
///
/// Custom render functions receive this through
/// [`RenderingInfo`](crate::RenderingInfo).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub kind: TagKind,
    /// The tag as written, e.g. `{{# items }}`
    pub source: Arc<str>,
    /// Template text between the opening and closing tags of a section
    pub inner_source: Option<Arc<str>>,
    pub position: Position,
    pub template: Option<TemplateId>,
    /// Delimiters in effect at the tag, needed to compile `inner_source`
    pub delimiters: Delimiters,
}

/// A node of a compiled template
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Literal text
    Text(String),
    /// `{{name}}`, `{{{name}}}` or `{{&name}}`
    Variable {
        expression: Expression,
        escapes: bool,
        tag: Arc<Tag>,
    },
    /// `{{#name}}...{{/name}}` or `{{^name}}...{{/name}}`
    Section {
        expression: Expression,
        inverted: bool,
        inner: Ast,
        tag: Arc<Tag>,
    },
    /// `{{>name}}`
    Partial { name: String },
    /// `{{$name}}...{{/name}}`
    Block { name: String, inner: Ast },
    /// `{{<name}}...{{/name}}`
    Parent { name: String, overrides: Ast },
}

/// A compiled template: nodes plus the content type they were compiled with
#[derive(Debug, Clone, PartialEq)]
pub struct Ast {
    nodes: Arc<[Node]>,
    content_type: ContentType,
}

impl Ast {
    pub fn new(nodes: Vec<Node>, content_type: ContentType) -> Self {
        Self {
            nodes: nodes.into(),
            content_type,
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    /// Whether two handles point at the very same tree
    pub fn ptr_eq(&self, other: &Ast) -> bool {
        Arc::ptr_eq(&self.nodes, &other.nodes)
    }

    /// Finds the override for block `name`, looking through nested blocks
    ///
    /// The last definition wins. Partials and partial overrides are not
    /// searched.
    pub fn find_block(&self, name: &str) -> Option<&Ast> {
        let mut found = None;
        for node in self.nodes.iter() {
            if let Node::Block { name: block, inner } = node {
                if block == name {
                    found = Some(inner);
                } else if let Some(nested) = inner.find_block(name) {
                    found = Some(nested);
                }
            }
        }
        found
    }
}

/// Applies the blocks defined in `overrides` to `parent`
///
/// Every block of `parent` that `overrides` defines is replaced by the
/// overriding body; other blocks keep their own body. Section and block bodies
/// are searched so that nested blocks can be overridden too. Neither argument
/// is modified.
///
/// Multi-level inheritance applies this step by step: the result of one level
/// becomes the parent of the next, so the most specific definition wins.
pub fn resolve(overrides: &Ast, parent: &Ast) -> Ast {
    let nodes = parent
        .nodes
        .iter()
        .map(|node| match node {
            Node::Block { name, inner } => Node::Block {
                name: name.clone(),
                inner: match overrides.find_block(name) {
                    Some(found) => found.clone(),
                    None => resolve(overrides, inner),
                },
            },
            Node::Section {
                expression,
                inverted,
                inner,
                tag,
            } => Node::Section {
                expression: expression.clone(),
                inverted: *inverted,
                inner: resolve(overrides, inner),
                tag: tag.clone(),
            },
            node => node.clone(),
        })
        .collect::<Vec<_>>();
    Ast::new(nodes, parent.content_type)
}
