//! Mustache tag scanning
//!
//! Splits template text into text spans and tags. The scanner honours
//! `{{=<% %>=}}` delimiter changes and `{{%CONTENT_TYPE:TEXT}}` pragmas as it
//! goes, and removes the surrounding white space of standalone tags (a section,
//! partial, comment or pragma tag alone on its line leaves no blank line
//! behind).
//!
//! # Examples
//!
//! ```rust
//! use dry_mustache::parser::tokenizer::{Token, Tokenizer, TagType};
//! use dry_mustache::{ContentType, Delimiters};
//!
//! let mut tokens = Tokenizer::new("Hello {{name}}!", Delimiters::default(), ContentType::Html);
//! assert!(matches!(tokens.next(), Some(Ok(Token::Text("Hello ")))));
//! match tokens.next() {
//!     Some(Ok(Token::Tag(tag))) => assert_eq!(tag.tag_type, TagType::HtmlEscaped),
//!     _ => unreachable!(),
//! }
//! ```

use std::sync::LazyLock;

use regex::Regex;

use crate::ast::ContentType;
use crate::error::{ParseError, Position};

static CONTENT_TYPE_PRAGMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^CONTENT_TYPE\s*:\s*(\S*)$").expect("valid pragma pattern"));

/// The pair of strings that open and close tags
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Delimiters {
    pub start: String,
    pub end: String,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self::new("{{", "}}")
    }
}

impl Delimiters {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    fn is_default(&self) -> bool {
        self.start == "{{" && self.end == "}}"
    }

    fn is_empty(&self) -> bool {
        self.start.is_empty() || self.end.is_empty()
    }

    /// Reads the inside of a `{{=start end=}}` tag
    fn parse(content: &str) -> Option<Self> {
        let parts: Vec<&str> = content.split_whitespace().collect();
        match parts.as_slice() {
            [start, end] if !start.contains('=') && !end.contains('=') => Some(Self::new(*start, *end)),
            _ => None,
        }
    }
}

/// Kinds of tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagType {
    /// `{{! comment }}`
    Comment,
    /// `{{name}}`
    HtmlEscaped,
    /// `{{{name}}}` or `{{&name}}`
    Raw,
    /// `{{#name}}`
    Open,
    /// `{{^name}}`
    Inverted,
    /// `{{/name}}`
    Close,
    /// `{{>name}}`
    Partial,
    /// `{{<name}}`
    Parent,
    /// `{{$name}}`
    Block,
    /// `{{=<% %>=}}`
    Delimiters,
    /// `{{%PRAGMA}}`
    Pragma,
}

impl TagType {
    fn from_sigil(c: Option<char>) -> Self {
        match c {
            Some('!') => TagType::Comment,
            Some('&') => TagType::Raw,
            Some('#') => TagType::Open,
            Some('^') => TagType::Inverted,
            Some('/') => TagType::Close,
            Some('>') => TagType::Partial,
            Some('<') => TagType::Parent,
            Some('$') => TagType::Block,
            Some('%') => TagType::Pragma,
            _ => TagType::HtmlEscaped,
        }
    }

    /// Whether a tag of this type alone on its line swallows that line
    fn can_stand_alone(self) -> bool {
        !matches!(self, TagType::HtmlEscaped | TagType::Raw)
    }

    /// Tags after which a content type pragma is refused
    fn locks_content_type(self) -> bool {
        !matches!(
            self,
            TagType::Comment | TagType::Close | TagType::Delimiters | TagType::Pragma
        )
    }
}

/// A scanned tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagToken<'a> {
    pub tag_type: TagType,
    /// Text between the sigil and the closing delimiter
    pub content: &'a str,
    /// The complete tag including delimiters
    pub raw: &'a str,
    /// Byte offset of the tag in the source
    pub start: usize,
    /// Byte offset just past the tag
    pub end: usize,
    pub position: Position,
    pub standalone: bool,
    /// Delimiters in effect when the tag was read
    pub delimiters: Delimiters,
}

/// An item of the token stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    Text(&'a str),
    Tag(TagToken<'a>),
}

/// Lazy token stream over a template source
pub struct Tokenizer<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    line_start: usize,
    delimiters: Delimiters,
    content_type: ContentType,
    locked: bool,
    pending: Option<TagToken<'a>>,
    failed: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(src: &'a str, delimiters: Delimiters, content_type: ContentType) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
            line_start: 0,
            delimiters,
            content_type,
            locked: false,
            pending: None,
            failed: false,
        }
    }

    /// Content type in effect after the tokens read so far
    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    /// Line and column of a byte offset at or after the current position
    fn position(&self, offset: usize) -> Position {
        let skipped = &self.src[self.pos..offset];
        match skipped.rfind('\n') {
            Some(last) => Position::new(
                self.line + skipped.matches('\n').count(),
                skipped[last + 1..].chars().count() + 1,
            ),
            None => Position::new(
                self.line,
                self.src[self.line_start..offset].chars().count() + 1,
            ),
        }
    }

    fn advance(&mut self, offset: usize) {
        let skipped = &self.src[self.pos..offset];
        if let Some(last) = skipped.rfind('\n') {
            self.line += skipped.matches('\n').count();
            self.line_start = self.pos + last + 1;
        }
        self.pos = offset;
    }

    /// Finds the end of the tag starting at `start`
    fn scan_tag(&self, start: usize) -> Result<TagToken<'a>, ParseError> {
        let src = self.src;
        let open = &self.delimiters.start;
        let after_open = start + open.len();
        let (tag_type, content_start, close) = if self.delimiters.is_default() && src[start..].starts_with("{{{") {
            (TagType::Raw, start + 3, "}}}".to_string())
        } else if src[after_open..].starts_with('=') {
            (TagType::Delimiters, after_open + 1, format!("={}", self.delimiters.end))
        } else {
            let tag_type = TagType::from_sigil(src[after_open..].chars().next());
            let content_start = match tag_type {
                TagType::HtmlEscaped => after_open,
                _ => after_open + 1,
            };
            (tag_type, content_start, self.delimiters.end.clone())
        };
        let content_end = src[content_start..]
            .find(close.as_str())
            .map(|i| content_start + i)
            .ok_or_else(|| ParseError::unclosed(self.position(start)))?;
        let end = content_end + close.len();
        Ok(TagToken {
            tag_type,
            content: &src[content_start..content_end],
            raw: &src[start..end],
            start,
            end,
            position: self.position(start),
            standalone: false,
            delimiters: self.delimiters.clone(),
        })
    }

    /// Returns where the preceding text ends and where scanning resumes
    fn standalone_bounds(&self, tag: &TagToken<'a>) -> Option<(usize, usize)> {
        if !tag.tag_type.can_stand_alone() {
            return None;
        }
        let line_start = self.src[..tag.start].rfind('\n').map(|i| i + 1).unwrap_or(0);
        if line_start < self.pos {
            return None;
        }
        let indent = &self.src[line_start..tag.start];
        if !indent.chars().all(|c| c == ' ' || c == '\t') {
            return None;
        }
        let rest = &self.src[tag.end..];
        let (trailing, resume) = match rest.find('\n') {
            Some(i) => (&rest[..i], tag.end + i + 1),
            None => (rest, self.src.len()),
        };
        if !trailing.chars().all(|c| c == ' ' || c == '\t' || c == '\r') {
            return None;
        }
        Some((line_start, resume))
    }

    /// Applies delimiter and pragma tags to the scanner state
    fn apply(&mut self, tag: &TagToken<'a>) -> Result<(), ParseError> {
        match tag.tag_type {
            TagType::Delimiters => {
                self.delimiters = Delimiters::parse(tag.content)
                    .ok_or_else(|| ParseError::new("Invalid set delimiters tag", tag.position))?;
            }
            TagType::Pragma => {
                if let Some(captures) = CONTENT_TYPE_PRAGMA.captures(tag.content.trim()) {
                    let content_type = match &captures[1] {
                        "TEXT" => ContentType::Text,
                        "HTML" => ContentType::Html,
                        other => {
                            return Err(ParseError::new(
                                format!("Invalid content type `{}`", other),
                                tag.position,
                            ));
                        }
                    };
                    if self.locked {
                        return Err(ParseError::new(
                            format!(
                                "CONTENT_TYPE:{} pragma tag must prepend any Mustache variable, section, or partial tag",
                                &captures[1]
                            ),
                            tag.position,
                        ));
                    }
                    self.content_type = content_type;
                }
            }
            tag_type if tag_type.locks_content_type() => self.locked = true,
            _ => (),
        }
        Ok(())
    }

    fn next_token(&mut self) -> Result<Option<Token<'a>>, ParseError> {
        if let Some(tag) = self.pending.take() {
            return Ok(Some(Token::Tag(tag)));
        }
        if self.delimiters.is_empty() {
            return Err(ParseError::new(
                format!("Invalid set delimiters `{} {}`", self.delimiters.start, self.delimiters.end),
                Tokenizer::position(self, self.pos),
            ));
        }
        let src = self.src;
        if self.pos >= src.len() {
            return Ok(None);
        }
        let rest = &src[self.pos..];
        let start = match rest.find(self.delimiters.start.as_str()) {
            Some(offset) => self.pos + offset,
            None => {
                self.advance(src.len());
                return Ok(Some(Token::Text(rest)));
            }
        };
        let mut tag = self.scan_tag(start)?;
        let (text_end, resume) = match self.standalone_bounds(&tag) {
            Some(bounds) => {
                tag.standalone = true;
                bounds
            }
            None => (start, tag.end),
        };
        self.apply(&tag)?;
        let text = &src[self.pos..text_end];
        self.advance(resume);
        if text.is_empty() {
            return Ok(Some(Token::Tag(tag)));
        }
        self.pending = Some(tag);
        Ok(Some(Token::Text(text)))
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Result<Token<'a>, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_token() {
            Ok(token) => token.map(Ok),
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}
