//! Logic-less Mustache templates
//!
//! Templates are compiled once into an immutable [`Ast`] and rendered against
//! data wrapped in [`Boxed`] values. Variables are HTML-escaped unless the
//! template is plain text or the value renders as HTML. Partials, template
//! inheritance, filters and lambdas are supported.
//!
//! # Examples
//!
//! ```rust
//! use dry_mustache::Template;
//! use serde_json::json;
//!
//! let template = Template::parse("Hello {{name}}!{{#admin}} (admin){{/admin}}").unwrap();
//! let text = template.render(json!({"name": "<Ann>", "admin": true})).unwrap();
//! assert_eq!(text, "Hello &lt;Ann&gt;! (admin)");
//! ```
//!
//! Templates that include each other live in a [`TemplateRepository`]:
//!
//! ```rust
//! use dry_mustache::TemplateRepository;
//! use serde_json::json;
//!
//! let repository = TemplateRepository::from_map([
//!     ("layout", "<title>{{$title}}Default{{/title}}</title>"),
//!     ("page", "{{<layout}}{{$title}}{{name}}{{/title}}{{/layout}}"),
//! ]);
//! let page = repository.template_named("page").unwrap();
//! assert_eq!(page.render(json!({"name": "Home"})).unwrap(), "<title>Home</title>");
//! ```
//!
//! Overrides reach the blocks of the parent template and of the parents it
//! overrides in turn, but not the templates it includes with plain partial
//! tags. A layout that pulls its header in with `{{>header}}` keeps the
//! header's own blocks. To let pages override them, the layout includes the
//! header with `{{<header}}{{/header}}` instead:
//!
//! ```rust
//! use dry_mustache::TemplateRepository;
//! use serde_json::json;
//!
//! let repository = TemplateRepository::from_map([
//!     ("header", "<h1>{{$title}}Default{{/title}}</h1>"),
//!     ("layout", "{{<header}}{{/header}}<p>{{$body}}{{/body}}</p>"),
//!     ("page", "{{<layout}}{{$title}}Home{{/title}}{{$body}}Hi{{/body}}{{/layout}}"),
//! ]);
//! let page = repository.template_named("page").unwrap();
//! assert_eq!(page.render(json!({})).unwrap(), "<h1>Home</h1><p>Hi</p>");
//! ```

pub mod ast;
pub mod config;
pub mod context;
pub mod error;
pub mod escape;
pub mod parser;
pub mod render;
pub mod repository;
pub mod template;
pub mod value;

pub use ast::{Ast, ContentType, Node, Tag, TagKind};
pub use config::Configuration;
pub use context::Context;
pub use error::{Error, ParseError, Position, RenderError, Result, TemplateNotFoundError};
pub use escape::escape_html;
pub use parser::expression::Expression;
pub use parser::tokenizer::Delimiters;
pub use render::RenderingInfo;
pub use repository::{BundleSource, DirectorySource, MapSource, TemplateId, TemplateRepository, TemplateSource};
pub use template::Template;
pub use value::{Boxed, Rendering};

/// Embeds a directory of templates at build time
///
/// Expands to a `&'static [(&'static str, &'static str)]` of template names
/// (paths relative to the directory, without extension) and sources. The path
/// is relative to the manifest of the calling crate. An optional second
/// argument selects the file extension, `"mustache"` by default.
///
/// ```rust,ignore
/// static TEMPLATES: &[(&str, &str)] = dry_mustache::bundle!("templates");
/// let repository = dry_mustache::TemplateRepository::from_bundle(TEMPLATES);
/// ```
pub use dry_mustache_macros::bundle;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn basic_usage() {
        let template = Template::parse("<p>{{firstname}} {{lastname}}</p>").unwrap();
        assert_eq!(
            template.render(json!({"firstname": "King", "lastname": "Tubby"})).unwrap(),
            "<p>King Tubby</p>"
        );
    }

    #[test]
    fn path_expressions() {
        let template = Template::parse("{{person.firstname}} {{person.lastname}}").unwrap();
        let data = json!({"person": {"firstname": "King", "lastname": "Tubby"}});
        assert_eq!(template.render(data).unwrap(), "King Tubby");
    }

    #[test]
    fn section_with_bool() {
        let template = Template::parse(
            //language=mustache
            "<div>{{#has_author}}<h1>{{first_name}} {{last_name}}</h1>{{/has_author}}</div>",
        )
        .unwrap();
        let author = json!({"first_name": "King", "last_name": "Tubby"});
        let mut with = author.clone();
        with["has_author"] = json!(true);
        let mut without = author;
        without["has_author"] = json!(false);
        assert_eq!(template.render(with).unwrap(), "<div><h1>King Tubby</h1></div>");
        assert_eq!(template.render(without).unwrap(), "<div></div>");
    }

    #[test]
    fn section_with_else() {
        let template = Template::parse(
            //language=mustache
            "<div>{{#author}}<h1>{{first_name}}</h1>{{^}}<h1>Unknown</h1>{{/}}</div>",
        )
        .unwrap();
        assert_eq!(
            template.render(json!({"author": {"first_name": "King"}})).unwrap(),
            "<div><h1>King</h1></div>"
        );
        assert_eq!(template.render(json!({"author": null})).unwrap(), "<div><h1>Unknown</h1></div>");
    }

    #[test]
    fn triple_mustache_is_raw() {
        let template = Template::parse("Hello {{{name}}}!").unwrap();
        assert_eq!(template.render(json!({"name": "<i>King</i>"})).unwrap(), "Hello <i>King</i>!");
    }

    #[test]
    fn template_base_context() {
        let template = Template::parse("{{greeting}}, {{name}}")
            .unwrap()
            .extend_base_context(json!({"greeting": "Hi", "name": "nobody"}));
        assert_eq!(template.render(json!({"name": "King"})).unwrap(), "Hi, King");
        assert_eq!(template.content_type(), ContentType::Html);
        assert!(template.id().is_none());
    }
}
