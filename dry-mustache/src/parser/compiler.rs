//! Template compilation
//!
//! Consumes the token stream, checks that every section, block and partial
//! override is closed by a matching tag, and builds the [`Ast`].
//!
//! # Examples
//!
//! ```rust
//! use dry_mustache::{Configuration, Node};
//! use dry_mustache::parser::compiler::Compiler;
//!
//! let configuration = Configuration::default();
//! let ast = Compiler::new(&configuration).compile("{{#items}}- {{.}}\n{{/items}}").unwrap();
//! assert!(matches!(ast.nodes()[0], Node::Section { inverted: false, .. }));
//!
//! assert!(Compiler::new(&configuration).compile("{{#a}}body{{/b}}").is_err());
//! ```

use std::sync::Arc;

use crate::ast::{Ast, ContentType, Node, Tag, TagKind};
use crate::config::Configuration;
use crate::error::{ParseError, Position};
use crate::parser::expression::{Expression, ExpressionError};
use crate::parser::tokenizer::{Delimiters, TagToken, TagType, Token, Tokenizer};
use crate::repository::TemplateId;

/// What opened a scope
enum Opened<'a> {
    Root,
    Section {
        expression: Expression,
        inverted: bool,
        token: TagToken<'a>,
    },
    Block {
        name: String,
        token: TagToken<'a>,
    },
    Parent {
        name: String,
        token: TagToken<'a>,
    },
}

/// An open scope and the nodes collected in it so far
struct Scope<'a> {
    opened: Opened<'a>,
    nodes: Vec<Node>,
}

impl<'a> Scope<'a> {
    fn new(opened: Opened<'a>) -> Self {
        Self {
            opened,
            nodes: Vec::new(),
        }
    }
}

/// State of a single compilation
struct Compile<'a, 't> {
    src: &'a str,
    template: Option<&'t TemplateId>,
    open_stack: Vec<Scope<'a>>,
}

fn parse_expression(token: &TagToken<'_>) -> Result<Expression, ParseError> {
    Expression::parse(token.content).map_err(|err| ParseError::new(err.to_string(), token.position))
}

/// Validates a partial, parent or block name
fn parse_name(token: &TagToken<'_>, missing: &str, invalid: &str) -> Result<String, ParseError> {
    let name = token.content.trim();
    if name.is_empty() {
        return Err(ParseError::new(missing, token.position));
    }
    if name.contains(char::is_whitespace) {
        return Err(ParseError::new(format!("{} `{}`", invalid, name), token.position));
    }
    Ok(name.to_string())
}

impl<'a, 't> Compile<'a, 't> {
    fn new(src: &'a str, template: Option<&'t TemplateId>) -> Self {
        Self {
            src,
            template,
            open_stack: vec![Scope::new(Opened::Root)],
        }
    }

    fn push(&mut self, node: Node) {
        if let Some(scope) = self.open_stack.last_mut() {
            scope.nodes.push(node);
        }
    }

    fn tag(&self, kind: TagKind, token: &TagToken<'a>, inner_source: Option<&str>) -> Arc<Tag> {
        Arc::new(Tag {
            kind,
            source: Arc::from(token.raw),
            inner_source: inner_source.map(Arc::from),
            position: token.position,
            template: self.template.cloned(),
            delimiters: token.delimiters.clone(),
        })
    }

    fn variable(&mut self, token: &TagToken<'a>) -> Result<(), ParseError> {
        let expression = parse_expression(token)?;
        let tag = self.tag(TagKind::Variable, token, None);
        self.push(Node::Variable {
            expression,
            escapes: token.tag_type == TagType::HtmlEscaped,
            tag,
        });
        Ok(())
    }

    /// Handles `{{#x}}` and `{{^x}}`, including `{{#x}}...{{^x}}...{{/x}}`
    fn open_section(&mut self, token: TagToken<'a>, content_type: ContentType) -> Result<(), ParseError> {
        let inverted = token.tag_type == TagType::Inverted;
        let expression = match Expression::parse(token.content) {
            Ok(expression) => Some(expression),
            Err(ExpressionError::Empty) => None,
            Err(err) => return Err(ParseError::new(err.to_string(), token.position)),
        };
        let is_else = match self.open_stack.last() {
            Some(Scope {
                opened:
                    Opened::Section {
                        expression: open,
                        inverted: open_inverted,
                        ..
                    },
                ..
            }) => *open_inverted != inverted && expression.as_ref().is_none_or(|e| e == open),
            _ => false,
        };
        let expression = if is_else {
            let open = self.close_section(&token, content_type)?;
            expression.unwrap_or(open)
        } else {
            expression.ok_or_else(|| ParseError::new(ExpressionError::Empty.to_string(), token.position))?
        };
        self.open_stack.push(Scope::new(Opened::Section {
            expression,
            inverted,
            token,
        }));
        Ok(())
    }

    /// Pops the innermost section, returning its expression
    fn close_section(&mut self, closing: &TagToken<'a>, content_type: ContentType) -> Result<Expression, ParseError> {
        let scope = self
            .open_stack
            .pop()
            .ok_or_else(|| ParseError::new("Unmatched closing tag", closing.position))?;
        let Opened::Section {
            expression,
            inverted,
            token,
        } = scope.opened
        else {
            return Err(ParseError::new("Unmatched closing tag", closing.position));
        };
        let tag = self.tag(
            TagKind::Section,
            &token,
            Some(&self.src[token.end..closing.start]),
        );
        self.push(Node::Section {
            expression: expression.clone(),
            inverted,
            inner: Ast::new(scope.nodes, content_type),
            tag,
        });
        Ok(expression)
    }

    /// Handles `{{/x}}`
    fn close(&mut self, token: &TagToken<'a>, content_type: ContentType) -> Result<(), ParseError> {
        let unmatched = || ParseError::new("Unmatched closing tag", token.position);
        let name = token.content.trim();
        match self.open_stack.last().map(|scope| &scope.opened) {
            None | Some(Opened::Root) => Err(unmatched()),
            Some(Opened::Section { expression, .. }) => {
                match Expression::parse(token.content) {
                    Ok(closing) if &closing != expression => return Err(unmatched()),
                    Ok(_) | Err(ExpressionError::Empty) => (),
                    Err(err) => return Err(ParseError::new(err.to_string(), token.position)),
                }
                self.close_section(token, content_type).map(|_| ())
            }
            Some(Opened::Block { name: open, .. }) | Some(Opened::Parent { name: open, .. }) => {
                if !name.is_empty() && name != open {
                    return Err(unmatched());
                }
                let scope = self.open_stack.pop().ok_or_else(unmatched)?;
                let inner = Ast::new(scope.nodes, content_type);
                let node = match scope.opened {
                    Opened::Block { name, .. } => Node::Block { name, inner },
                    Opened::Parent { name, .. } => Node::Parent {
                        name,
                        overrides: inner,
                    },
                    _ => return Err(unmatched()),
                };
                self.push(node);
                Ok(())
            }
        }
    }

    fn handle(&mut self, token: TagToken<'a>, content_type: ContentType) -> Result<(), ParseError> {
        match token.tag_type {
            TagType::Comment | TagType::Delimiters | TagType::Pragma => Ok(()),
            TagType::HtmlEscaped | TagType::Raw => self.variable(&token),
            TagType::Open | TagType::Inverted => self.open_section(token, content_type),
            TagType::Close => self.close(&token, content_type),
            TagType::Partial => {
                let name = parse_name(&token, "Missing template name", "Invalid template name")?;
                self.push(Node::Partial { name });
                Ok(())
            }
            TagType::Parent => {
                let name = parse_name(&token, "Missing template name", "Invalid template name")?;
                self.open_stack.push(Scope::new(Opened::Parent { name, token }));
                Ok(())
            }
            TagType::Block => {
                let name = parse_name(
                    &token,
                    "Missing inheritable section name",
                    "Invalid inheritable section name",
                )?;
                self.open_stack.push(Scope::new(Opened::Block { name, token }));
                Ok(())
            }
        }
    }

    fn finish(mut self, content_type: ContentType) -> Result<Ast, ParseError> {
        let root = self
            .open_stack
            .pop()
            .ok_or_else(|| ParseError::unclosed(Position::new(1, 1)))?;
        match root.opened {
            Opened::Root => Ok(Ast::new(root.nodes, content_type)),
            Opened::Section { token, .. } | Opened::Block { token, .. } | Opened::Parent { token, .. } => {
                Err(ParseError::new(
                    format!("Unclosed `{}` tag", token.raw),
                    token.position,
                ))
            }
        }
    }
}

fn consume<'a>(compile: &mut Compile<'a, '_>, tokenizer: &mut Tokenizer<'a>) -> Result<(), ParseError> {
    while let Some(token) = tokenizer.next() {
        match token? {
            Token::Text(text) => compile.push(Node::Text(text.to_string())),
            Token::Tag(tag) => compile.handle(tag, tokenizer.content_type())?,
        }
    }
    Ok(())
}

/// Compiles template text into an [`Ast`]
pub struct Compiler<'c> {
    configuration: &'c Configuration,
    template: Option<TemplateId>,
}

impl<'c> Compiler<'c> {
    pub fn new(configuration: &'c Configuration) -> Self {
        Self {
            configuration,
            template: None,
        }
    }

    /// Names the template being compiled in tags and errors
    pub fn for_template(mut self, template: Option<&TemplateId>) -> Self {
        self.template = template.cloned();
        self
    }

    /// Compiles a template with the configured delimiters and content type
    pub fn compile(&self, src: &str) -> Result<Ast, ParseError> {
        self.compile_with(
            src,
            self.configuration.delimiters.clone(),
            self.configuration.content_type,
        )
    }

    /// Compiles a template fragment, such as the body of a section, that
    /// starts with the given delimiters and content type
    #[tracing::instrument(level = "debug", skip_all, fields(template = ?self.template))]
    pub fn compile_with(
        &self,
        src: &str,
        delimiters: Delimiters,
        content_type: ContentType,
    ) -> Result<Ast, ParseError> {
        let template = self.template.as_ref();
        let mut compile = Compile::new(src, template);
        let mut tokenizer = Tokenizer::new(src, delimiters, content_type);
        let ast = consume(&mut compile, &mut tokenizer).and_then(|_| compile.finish(tokenizer.content_type()));
        match ast {
            Ok(ast) => {
                tracing::debug!(nodes = ast.nodes().len(), content_type = ?ast.content_type(), "compiled template");
                Ok(ast)
            }
            Err(err) => {
                tracing::debug!(%err, "template failed to compile");
                Err(err.in_template(template))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn compile(src: &str) -> Result<Ast, ParseError> {
        Compiler::new(&Configuration::default()).compile(src)
    }

    fn error(src: &str) -> String {
        compile(src).unwrap_err().message
    }

    #[test]
    fn variables_record_escaping() {
        let ast = compile("{{a}}{{{b}}}{{&c}}").unwrap();
        let escapes: Vec<bool> = ast
            .nodes()
            .iter()
            .map(|node| match node {
                Node::Variable { escapes, .. } => *escapes,
                node => panic!("unexpected {:?}", node),
            })
            .collect();
        assert_eq!(escapes, vec![true, false, false]);
    }

    #[test]
    fn comments_are_dropped() {
        let ast = compile("a{{! hidden }}b").unwrap();
        assert_eq!(
            ast.nodes(),
            &[Node::Text("a".to_string()), Node::Text("b".to_string())]
        );
    }

    #[test]
    fn sections_nest() {
        let ast = compile("{{#a}}{{^b}}x{{/b}}{{/a}}").unwrap();
        match &ast.nodes()[0] {
            Node::Section { inverted, inner, tag, .. } => {
                assert!(!inverted);
                assert_eq!(tag.inner_source.as_deref(), Some("{{^b}}x{{/b}}"));
                assert!(matches!(inner.nodes()[0], Node::Section { inverted: true, .. }));
            }
            node => panic!("unexpected {:?}", node),
        }
    }

    #[test]
    fn mismatched_sections_are_rejected() {
        assert_eq!(error("{{#a}}body{{/b}}"), "Unmatched closing tag");
        assert_eq!(error("{{/a}}"), "Unmatched closing tag");
        assert_eq!(error("{{$a}}{{/b}}"), "Unmatched closing tag");
        assert_eq!(error("{{#a}}\n{{b}}"), "Unclosed `{{#a}}` tag");
    }

    #[test]
    fn sections_compare_expressions_structurally() {
        assert!(compile("{{#a.b}}x{{/ a.b }}").is_ok());
        assert!(compile("{{#f(x)}}x{{/f(x)}}").is_ok());
        assert!(compile("{{#a.b}}x{{/b.a}}").is_err());
    }

    #[test]
    fn empty_closing_tags() {
        assert!(compile("{{#a}}x{{/}}").is_ok());
        assert!(compile("{{$a}}x{{/}}").is_ok());
        assert!(compile("{{<a}}x{{/}}").is_ok());
        assert!(compile("{{<layouts/base}}x{{/layouts/base}}").is_ok());
    }

    #[test]
    fn else_shorthand() {
        for src in ["{{#a}}yes{{^a}}no{{/a}}", "{{#a}}yes{{^}}no{{/}}"] {
            let ast = compile(src).unwrap();
            let kinds: Vec<bool> = ast
                .nodes()
                .iter()
                .map(|node| match node {
                    Node::Section { inverted, .. } => *inverted,
                    node => panic!("unexpected {:?}", node),
                })
                .collect();
            assert_eq!(kinds, vec![false, true], "{}", src);
        }
        assert_eq!(error("{{^}}x{{/}}"), "Missing expression");
    }

    #[test]
    fn partials_and_blocks() {
        let ast = compile("{{>header}}{{<layout}}{{$title}}T{{/title}}{{/layout}}").unwrap();
        assert_eq!(ast.nodes()[0], Node::Partial { name: "header".to_string() });
        match &ast.nodes()[1] {
            Node::Parent { name, overrides } => {
                assert_eq!(name, "layout");
                assert!(overrides.find_block("title").is_some());
            }
            node => panic!("unexpected {:?}", node),
        }
        assert_eq!(error("{{>}}"), "Missing template name");
        assert_eq!(error("{{>a b}}"), "Invalid template name `a b`");
        assert_eq!(error("{{$}}{{/}}"), "Missing inheritable section name");
    }

    #[test]
    fn content_type_pragma() {
        assert_eq!(compile("{{x}}").unwrap().content_type(), ContentType::Html);
        let ast = compile("{{%CONTENT_TYPE:TEXT}}\n{{#a}}{{x}}{{/a}}").unwrap();
        assert_eq!(ast.content_type(), ContentType::Text);
        match &ast.nodes()[0] {
            Node::Section { inner, .. } => assert_eq!(inner.content_type(), ContentType::Text),
            node => panic!("unexpected {:?}", node),
        }
        assert!(compile("{{%CONTENT_TYPE:XML}}").is_err());
        assert!(compile("{{%UNKNOWN_PRAGMA}}{{x}}").is_ok());
    }

    #[test]
    fn configured_defaults() {
        let configuration = Configuration::default()
            .with_content_type(ContentType::Text)
            .with_delimiters(Delimiters::new("<%", "%>"));
        let ast = Compiler::new(&configuration).compile("<%x%>{{y}}").unwrap();
        assert_eq!(ast.content_type(), ContentType::Text);
        assert_eq!(ast.nodes()[1], Node::Text("{{y}}".to_string()));
    }

    #[test]
    fn configured_empty_delimiters() {
        let configuration = Configuration::default().with_delimiters(Delimiters::new("", ""));
        let err = Compiler::new(&configuration).compile("abc").unwrap_err();
        assert_eq!(err.message, "Invalid set delimiters ` `");
    }

    #[test]
    fn errors_name_their_template() {
        let id = TemplateId::from("page");
        let err = Compiler::new(&Configuration::default())
            .for_template(Some(&id))
            .compile("{{#a}}")
            .unwrap_err();
        assert_eq!(err.template, Some(id));
        assert_eq!(err.position, Position::new(1, 1));
    }

    #[test]
    fn invalid_expression() {
        assert!(error("{{a.}}").starts_with("Invalid expression `a.`"));
    }
}
