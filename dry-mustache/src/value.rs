//! Boxed values
//!
//! The renderer never looks at host data directly. Everything it renders goes
//! through [`Boxed`], which can answer keyed lookups, tell whether it is truthy,
//! produce a default string, and optionally carry a custom render function or a
//! filter function.
//!
//! # Examples
//!
//! ```rust
//! use dry_mustache::Boxed;
//! use serde_json::json;
//!
//! let value = Boxed::from(json!({"user": {"name": "Ann"}, "tags": []}));
//! assert_eq!(value.get("user").get("name").to_text(), "Ann");
//! assert!(!value.get("tags").is_truthy());
//! assert!(value.get("nope").is_missing());
//! ```

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Debug};
use std::sync::Arc;

use crate::ast::{ContentType, TagKind};
use crate::error::RenderError;
use crate::render::RenderingInfo;

/// Answers keyed lookups on a value
pub type KeyFn = Arc<dyn Fn(&str) -> Boxed + Send + Sync>;

/// Renders a value in place of the default rendering
pub type RenderFn = Arc<dyn Fn(&RenderingInfo<'_>) -> crate::Result<Rendering> + Send + Sync>;

/// Applies a filter to one argument. The flag tells whether more arguments
/// follow.
pub type FilterFn = Arc<dyn Fn(Boxed, bool) -> Result<Boxed, RenderError> + Send + Sync>;

/// Rendered text and the content type it is in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendering {
    pub string: String,
    pub content_type: ContentType,
}

impl Rendering {
    pub fn new(string: impl Into<String>, content_type: ContentType) -> Self {
        Self {
            string: string.into(),
            content_type,
        }
    }

    /// Text that will be escaped when it lands in an HTML template
    pub fn text(string: impl Into<String>) -> Self {
        Self::new(string, ContentType::Text)
    }

    /// Markup that is never escaped
    pub fn html(string: impl Into<String>) -> Self {
        Self::new(string, ContentType::Html)
    }
}

/// The data wrapped by a [`Boxed`]
#[derive(Clone)]
pub enum Raw {
    /// Lookup failed
    Missing,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    Seq(Arc<[Boxed]>),
    Map(Arc<BTreeMap<String, Boxed>>),
    /// A value known only through its functions, such as a lambda or a filter
    Callable,
    /// Host data, reachable through [`Boxed::downcast_ref`]
    Opaque(Arc<dyn Any + Send + Sync>),
}

/// A value as seen by the renderer
#[derive(Clone)]
pub struct Boxed {
    raw: Raw,
    keyed: Option<KeyFn>,
    render: Option<RenderFn>,
    filter: Option<FilterFn>,
}

impl Default for Boxed {
    fn default() -> Self {
        Self::missing()
    }
}

impl Debug for Boxed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Boxed");
        match &self.raw {
            Raw::Missing => debug.field("raw", &"missing"),
            Raw::Null => debug.field("raw", &"null"),
            Raw::Bool(value) => debug.field("raw", value),
            Raw::Int(value) => debug.field("raw", value),
            Raw::Float(value) => debug.field("raw", value),
            Raw::Str(value) => debug.field("raw", value),
            Raw::Seq(items) => debug.field("raw", items),
            Raw::Map(map) => debug.field("raw", map),
            Raw::Callable => debug.field("raw", &"callable"),
            Raw::Opaque(_) => debug.field("raw", &"opaque"),
        };
        debug
            .field("keyed", &self.keyed.is_some())
            .field("render", &self.render.is_some())
            .field("filter", &self.filter.is_some())
            .finish()
    }
}

impl Boxed {
    fn from_raw(raw: Raw) -> Self {
        Self {
            raw,
            keyed: None,
            render: None,
            filter: None,
        }
    }

    /// The result of a failed lookup
    pub fn missing() -> Self {
        Self::from_raw(Raw::Missing)
    }

    pub fn null() -> Self {
        Self::from_raw(Raw::Null)
    }

    /// Wraps host data that is only reachable through custom functions
    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        Self::from_raw(Raw::Opaque(Arc::new(value)))
    }

    pub fn raw(&self) -> &Raw {
        &self.raw
    }

    pub fn is_missing(&self) -> bool {
        matches!(self.raw, Raw::Missing)
    }

    /// Whether a section renders for this value
    ///
    /// Missing, null, `false`, zero, the empty string and the empty sequence
    /// are falsy. Everything else, empty maps included, is truthy.
    pub fn is_truthy(&self) -> bool {
        match &self.raw {
            Raw::Missing | Raw::Null => false,
            Raw::Bool(value) => *value,
            Raw::Int(value) => *value != 0,
            Raw::Float(value) => *value != 0.0,
            Raw::Str(value) => !value.is_empty(),
            Raw::Seq(items) => !items.is_empty(),
            Raw::Map(_) | Raw::Callable | Raw::Opaque(_) => true,
        }
    }

    pub fn as_seq(&self) -> Option<&[Boxed]> {
        match &self.raw {
            Raw::Seq(items) => Some(items.as_ref()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.raw {
            Raw::Str(value) => Some(value.as_ref()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self.raw {
            Raw::Int(value) => Some(value),
            _ => None,
        }
    }

    /// Numeric value of integers and floats
    pub fn as_f64(&self) -> Option<f64> {
        match self.raw {
            Raw::Int(value) => Some(value as f64),
            Raw::Float(value) => Some(value),
            _ => None,
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match &self.raw {
            Raw::Opaque(value) => value.downcast_ref(),
            _ => None,
        }
    }

    /// Looks up `key` on this value
    ///
    /// A custom key function answers first. Maps answer with their entries and
    /// sequences answer `count`, `first` and `last`.
    pub fn get(&self, key: &str) -> Boxed {
        if let Some(keyed) = &self.keyed {
            let found = keyed(key);
            if !found.is_missing() {
                return found;
            }
        }
        match &self.raw {
            Raw::Map(map) => map.get(key).cloned().unwrap_or_default(),
            Raw::Seq(items) => match key {
                "count" => Boxed::from(items.len()),
                "first" => items.first().cloned().unwrap_or_default(),
                "last" => items.last().cloned().unwrap_or_default(),
                _ => Boxed::missing(),
            },
            _ => Boxed::missing(),
        }
    }

    /// The default string form of the value
    pub fn to_text(&self) -> String {
        match &self.raw {
            Raw::Missing | Raw::Null | Raw::Callable | Raw::Opaque(_) | Raw::Map(_) => String::new(),
            Raw::Bool(value) => value.to_string(),
            Raw::Int(value) => value.to_string(),
            Raw::Float(value) => value.to_string(),
            Raw::Str(value) => value.to_string(),
            Raw::Seq(items) => items.iter().map(Boxed::to_text).collect(),
        }
    }

    pub fn render_fn(&self) -> Option<&RenderFn> {
        self.render.as_ref()
    }

    pub fn filter_fn(&self) -> Option<&FilterFn> {
        self.filter.as_ref()
    }

    /// Adds a key function, consulted before the value's own keys
    pub fn with_keys(mut self, keyed: impl Fn(&str) -> Boxed + Send + Sync + 'static) -> Self {
        self.keyed = Some(Arc::new(keyed));
        self
    }

    /// Replaces the default rendering of this value
    pub fn with_render(
        mut self,
        render: impl Fn(&RenderingInfo<'_>) -> crate::Result<Rendering> + Send + Sync + 'static,
    ) -> Self {
        self.render = Some(Arc::new(render));
        self
    }

    /// A value that renders through `render`
    pub fn renderer(
        render: impl Fn(&RenderingInfo<'_>) -> crate::Result<Rendering> + Send + Sync + 'static,
    ) -> Self {
        Self::from_raw(Raw::Callable).with_render(render)
    }

    /// A mustache lambda
    ///
    /// In a section, the function receives the unrendered section body and the
    /// returned text is rendered as a template in the current context. As a
    /// variable, it receives the empty string and the returned text is
    /// rendered as a text template, then escaped like any other text.
    pub fn lambda(lambda: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self::renderer(move |info: &RenderingInfo<'_>| {
            let source = lambda(info.tag().inner_source.as_deref().unwrap_or(""));
            match info.tag().kind {
                TagKind::Variable => info.render_template_as(&source, ContentType::Text),
                TagKind::Section => info.render_template(&source),
            }
        })
    }

    /// A filter taking a single argument
    ///
    /// Applying it to more than one argument, as in `f(a, b)`, is an error.
    pub fn filter(filter: impl Fn(Boxed) -> Result<Boxed, RenderError> + Send + Sync + 'static) -> Self {
        let filter = move |argument: Boxed, curried: bool| {
            if curried {
                return Err(RenderError::rejected("Too many arguments"));
            }
            filter(argument)
        };
        Self {
            filter: Some(Arc::new(filter)),
            ..Self::from_raw(Raw::Callable)
        }
    }

    /// A filter taking any number of arguments: `f(a, b)` or `f(a)(b)`
    pub fn variadic_filter(
        filter: impl Fn(Vec<Boxed>) -> Result<Boxed, RenderError> + Send + Sync + 'static,
    ) -> Self {
        variadic(Vec::new(), Arc::new(filter))
    }
}

type VariadicFn = Arc<dyn Fn(Vec<Boxed>) -> Result<Boxed, RenderError> + Send + Sync>;

fn variadic(arguments: Vec<Boxed>, filter: VariadicFn) -> Boxed {
    let apply = move |argument: Boxed, curried: bool| {
        let mut arguments = arguments.clone();
        arguments.push(argument);
        if curried {
            Ok(variadic(arguments, filter.clone()))
        } else {
            filter(arguments)
        }
    };
    Boxed {
        filter: Some(Arc::new(apply)),
        ..Boxed::from_raw(Raw::Callable)
    }
}

impl From<bool> for Boxed {
    fn from(value: bool) -> Self {
        Self::from_raw(Raw::Bool(value))
    }
}

macro_rules! from_int {
    ($($t:ty),*) => {$(
        impl From<$t> for Boxed {
            fn from(value: $t) -> Self {
                Self::from_raw(Raw::Int(value as i64))
            }
        }
    )*};
}

from_int!(i8, i16, i32, i64, u8, u16, u32);

macro_rules! from_wide_int {
    ($($t:ty),*) => {$(
        impl From<$t> for Boxed {
            fn from(value: $t) -> Self {
                match i64::try_from(value) {
                    Ok(value) => Self::from_raw(Raw::Int(value)),
                    Err(_) => Self::from_raw(Raw::Float(value as f64)),
                }
            }
        }
    )*};
}

from_wide_int!(u64, usize, isize);

impl From<f32> for Boxed {
    fn from(value: f32) -> Self {
        Self::from_raw(Raw::Float(value as f64))
    }
}

impl From<f64> for Boxed {
    fn from(value: f64) -> Self {
        Self::from_raw(Raw::Float(value))
    }
}

impl From<&str> for Boxed {
    fn from(value: &str) -> Self {
        Self::from_raw(Raw::Str(Arc::from(value)))
    }
}

impl From<String> for Boxed {
    fn from(value: String) -> Self {
        Self::from_raw(Raw::Str(Arc::from(value)))
    }
}

impl<T: Into<Boxed>> From<Vec<T>> for Boxed {
    fn from(items: Vec<T>) -> Self {
        Self::from_raw(Raw::Seq(items.into_iter().map(Into::into).collect()))
    }
}

impl<T: Into<Boxed>> From<Option<T>> for Boxed {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_else(Boxed::null)
    }
}

impl<K: Into<String>, V: Into<Boxed>> From<BTreeMap<K, V>> for Boxed {
    fn from(map: BTreeMap<K, V>) -> Self {
        Self::from_raw(Raw::Map(Arc::new(
            map.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        )))
    }
}

impl<K: Into<String>, V: Into<Boxed>> From<HashMap<K, V>> for Boxed {
    fn from(map: HashMap<K, V>) -> Self {
        Self::from_raw(Raw::Map(Arc::new(
            map.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        )))
    }
}

impl From<serde_json::Value> for Boxed {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::null(),
            Value::Bool(value) => value.into(),
            Value::Number(number) => match (number.as_i64(), number.as_f64()) {
                (Some(value), _) => value.into(),
                (None, Some(value)) => value.into(),
                (None, None) => Self::null(),
            },
            Value::String(value) => value.into(),
            Value::Array(items) => items.into(),
            Value::Object(map) => Self::from_raw(Raw::Map(Arc::new(
                map.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ))),
        }
    }
}

impl From<&serde_json::Value> for Boxed {
    fn from(value: &serde_json::Value) -> Self {
        value.clone().into()
    }
}
