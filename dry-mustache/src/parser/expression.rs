//! Mustache expression parsing
//!
//! Parses the inner text of a tag into an [`Expression`] tree. The grammar is
//! deliberately small:
//!
//! ```text
//! .               implicit iterator
//! name            identifier
//! a.b.c           scoped lookups, left to right
//! .name           scoped lookup on the implicit iterator
//! f(x)            filter application
//! f(x)(y), f(x,y) curried filter application
//! ```
//!
//! # Examples
//!
//! ```rust
//! use dry_mustache::Expression;
//!
//! let expr = Expression::parse("user.name").unwrap();
//! assert_eq!(expr.to_string(), "user.name");
//! ```

use std::fmt::Display;

/// A parsed tag expression
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expression {
    /// `.`
    ImplicitIterator,
    /// `name`
    Identifier(String),
    /// `base.name`
    Scoped { base: Box<Expression>, name: String },
    /// `filter(argument)`
    Filter {
        filter: Box<Expression>,
        argument: Box<Expression>,
        curried: bool,
    },
}

/// Why an expression could not be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpressionError {
    /// Nothing but white space. Closing tags accept this.
    Empty,
    Invalid(String),
}

impl Display for ExpressionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExpressionError::Empty => f.write_str("Missing expression"),
            ExpressionError::Invalid(message) => f.write_str(message),
        }
    }
}

/// Characters that can never appear in an identifier
const RESERVED: &str = ".(),{}#^/<>$&!%";

fn is_identifier_char(c: char) -> bool {
    !c.is_whitespace() && !RESERVED.contains(c)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn skip_white_space(&mut self) {
        let rest = &self.src[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn unexpected(&self) -> String {
        match self.peek() {
            Some(c) => format!("Unexpected character `{}` at index {}", c, self.pos),
            None => format!("Unexpected end of expression at index {}", self.pos),
        }
    }

    /// Reads an identifier, failing if none starts here
    fn identifier(&mut self) -> Result<String, String> {
        let rest = &self.src[self.pos..];
        let end = rest
            .char_indices()
            .find(|(_, c)| !is_identifier_char(*c))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        if end == 0 {
            return Err(match self.peek() {
                Some(_) => self.unexpected(),
                None => format!("Missing identifier at index {}", self.pos),
            });
        }
        self.pos += end;
        Ok(rest[..end].to_string())
    }

    fn primary(&mut self) -> Result<Expression, String> {
        self.skip_white_space();
        match self.peek() {
            Some('.') => {
                self.pos += 1;
                match self.peek() {
                    Some(c) if is_identifier_char(c) => Ok(Expression::Scoped {
                        base: Box::new(Expression::ImplicitIterator),
                        name: self.identifier()?,
                    }),
                    _ => Ok(Expression::ImplicitIterator),
                }
            }
            Some(c) if is_identifier_char(c) => Ok(Expression::Identifier(self.identifier()?)),
            Some(_) => Err(self.unexpected()),
            None => Err(format!("Missing expression at index {}", self.pos)),
        }
    }

    /// Parses the argument list following a filter, the opening `(` included
    fn application(&mut self, mut filter: Expression) -> Result<Expression, String> {
        self.pos += 1;
        loop {
            let argument = self.expression()?;
            self.skip_white_space();
            match self.peek() {
                Some(',') => {
                    self.pos += 1;
                    filter = Expression::Filter {
                        filter: Box::new(filter),
                        argument: Box::new(argument),
                        curried: true,
                    };
                }
                Some(')') => {
                    self.pos += 1;
                    return Ok(Expression::Filter {
                        filter: Box::new(filter),
                        argument: Box::new(argument),
                        curried: false,
                    });
                }
                Some(_) => return Err(self.unexpected()),
                None => return Err(format!("Missing `)` character at index {}", self.pos)),
            }
        }
    }

    fn expression(&mut self) -> Result<Expression, String> {
        let mut expression = self.primary()?;
        loop {
            match self.peek() {
                Some('.') => {
                    if let Expression::ImplicitIterator = expression {
                        return Err(self.unexpected());
                    }
                    self.pos += 1;
                    expression = Expression::Scoped {
                        base: Box::new(expression),
                        name: self.identifier()?,
                    };
                }
                _ => {
                    // "a (b)" is accepted, "a .b" is not
                    let save = self.pos;
                    self.skip_white_space();
                    if self.peek() != Some('(') {
                        self.pos = save;
                        return Ok(expression);
                    }
                    if let Expression::Filter { curried, .. } = &mut expression {
                        *curried = true;
                    }
                    expression = self.application(expression)?;
                }
            }
        }
    }
}

impl Expression {
    /// Parses the inner text of a tag
    pub fn parse(src: &str) -> Result<Expression, ExpressionError> {
        if src.trim().is_empty() {
            return Err(ExpressionError::Empty);
        }
        let mut parser = Parser { src, pos: 0 };
        let invalid = |message: String| ExpressionError::Invalid(format!("Invalid expression `{}`: {}", src.trim(), message));
        let expression = parser.expression().map_err(invalid)?;
        parser.skip_white_space();
        if parser.pos < src.len() {
            return Err(invalid(parser.unexpected()));
        }
        Ok(expression)
    }

    /// The leftmost identifier of a path, used to name missing filters
    pub fn root_name(&self) -> Option<&str> {
        match self {
            Expression::ImplicitIterator => None,
            Expression::Identifier(name) => Some(name),
            Expression::Scoped { base, name } => base.root_name().or(Some(name)),
            Expression::Filter { filter, .. } => filter.root_name(),
        }
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expression::ImplicitIterator => f.write_str("."),
            Expression::Identifier(name) => f.write_str(name),
            Expression::Scoped { base, name } => match base.as_ref() {
                Expression::ImplicitIterator => write!(f, ".{}", name),
                base => write!(f, "{}.{}", base, name),
            },
            Expression::Filter {
                filter, argument, ..
            } => write!(f, "{}({})", filter, argument),
        }
    }
}
