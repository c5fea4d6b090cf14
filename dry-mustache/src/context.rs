//! Rendering contexts
//!
//! A [`Context`] is an immutable stack of frames. Extending it returns a new
//! handle that shares the unchanged tail, so one base context can serve any
//! number of concurrent renderings.
//!
//! Frames hold either a value, against which tag expressions are looked up,
//! or a hook that runs around every tag that renders a value.
//!
//! # Examples
//!
//! ```rust
//! use dry_mustache::{Context, Expression};
//! use serde_json::json;
//!
//! let context = Context::new().extend(json!({"name": "outer", "a": 1})).extend(json!({"name": "inner"}));
//! let name = context.lookup(&Expression::parse("name").unwrap()).unwrap();
//! assert_eq!(name.to_text(), "inner");
//! let a = context.lookup(&Expression::parse("a").unwrap()).unwrap();
//! assert_eq!(a.to_text(), "1");
//! ```

use std::collections::BTreeMap;
use std::fmt::{self, Debug};
use std::sync::Arc;

use crate::ast::Tag;
use crate::error::RenderError;
use crate::parser::expression::Expression;
use crate::value::Boxed;

/// Runs before a tag renders and may replace the value
pub type WillRenderFn = Arc<dyn Fn(&Tag, Boxed) -> Boxed + Send + Sync>;

/// Runs after a tag rendered, with its output or `None` when rendering failed
pub type DidRenderFn = Arc<dyn Fn(&Tag, &Boxed, Option<&str>) + Send + Sync>;

enum Frame {
    Value(Boxed),
    WillRender(WillRenderFn),
    DidRender(DidRenderFn),
}

struct Link {
    frame: Frame,
    next: Option<Arc<Link>>,
}

/// Scope stack used to resolve tag expressions
#[derive(Clone, Default)]
pub struct Context {
    top: Option<Arc<Link>>,
    registered: Arc<BTreeMap<String, Boxed>>,
}

impl Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("depth", &self.frames().count())
            .field("registered", &self.registered.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, frame: Frame) -> Self {
        Self {
            top: Some(Arc::new(Link {
                frame,
                next: self.top.clone(),
            })),
            registered: self.registered.clone(),
        }
    }

    /// Frames from the top of the stack down
    fn frames(&self) -> impl Iterator<Item = &Frame> {
        std::iter::successors(self.top.as_deref(), |link| link.next.as_deref()).map(|link| &link.frame)
    }

    /// Returns a context with `value` on top
    pub fn extend(&self, value: impl Into<Boxed>) -> Self {
        self.push(Frame::Value(value.into()))
    }

    /// Returns a context with a hook that runs before each tag renders
    pub fn extend_will_render(&self, hook: impl Fn(&Tag, Boxed) -> Boxed + Send + Sync + 'static) -> Self {
        self.push(Frame::WillRender(Arc::new(hook)))
    }

    /// Returns a context with a hook that runs after each tag rendered
    pub fn extend_did_render(&self, hook: impl Fn(&Tag, &Boxed, Option<&str>) + Send + Sync + 'static) -> Self {
        self.push(Frame::DidRender(Arc::new(hook)))
    }

    /// Returns a context where `key` always resolves to `value`
    ///
    /// Registered keys are looked up before the stack and survive any later
    /// extension.
    pub fn with_registered_key(&self, key: impl Into<String>, value: impl Into<Boxed>) -> Self {
        let mut registered = self.registered.as_ref().clone();
        registered.insert(key.into(), value.into());
        Self {
            top: self.top.clone(),
            registered: Arc::new(registered),
        }
    }

    /// The value on top of the stack
    pub fn top_value(&self) -> Boxed {
        self.frames()
            .find_map(|frame| match frame {
                Frame::Value(value) => Some(value.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// Resolves a single key, innermost frame first
    pub fn get(&self, key: &str) -> Boxed {
        if let Some(value) = self.registered.get(key) {
            return value.clone();
        }
        self.frames()
            .find_map(|frame| match frame {
                Frame::Value(value) => Some(value.get(key)).filter(|found| !found.is_missing()),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// Evaluates an expression
    ///
    /// Unknown names resolve to a missing value. Only filter applications
    /// fail: when the filter is missing, is not a filter, or rejects its
    /// argument.
    pub fn lookup(&self, expression: &Expression) -> Result<Boxed, RenderError> {
        match expression {
            Expression::ImplicitIterator => Ok(self.top_value()),
            Expression::Identifier(name) => Ok(self.get(name)),
            Expression::Scoped { base, name } => {
                let base = self.lookup(base)?;
                Ok(if base.is_missing() { base } else { base.get(name) })
            }
            Expression::Filter {
                filter,
                argument,
                curried,
            } => {
                let function = self.lookup(filter)?;
                if function.is_missing() {
                    return Err(RenderError::MissingFilter(filter.to_string()));
                }
                let apply = function
                    .filter_fn()
                    .ok_or_else(|| RenderError::NotAFilter(filter.to_string()))?;
                let argument = self.lookup(argument)?;
                apply(argument, *curried)
            }
        }
    }

    /// Hooks that run before a tag renders, innermost first
    pub(crate) fn will_render_hooks(&self) -> impl Iterator<Item = &WillRenderFn> {
        self.frames().filter_map(|frame| match frame {
            Frame::WillRender(hook) => Some(hook),
            _ => None,
        })
    }

    /// Hooks that run after a tag rendered, innermost first
    pub(crate) fn did_render_hooks(&self) -> impl Iterator<Item = &DidRenderFn> {
        self.frames().filter_map(|frame| match frame {
            Frame::DidRender(hook) => Some(hook),
            _ => None,
        })
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        // Unlink long chains iteratively
        let mut next = self.top.take();
        while let Some(link) = next {
            match Arc::try_unwrap(link) {
                Ok(mut link) => next = link.next.take(),
                Err(_) => break,
            }
        }
    }
}
