//! Template parsing
//!
//! - `tokenizer.rs`: splits template text into text spans and tags
//! - `expression.rs`: parses the inside of a tag
//! - `compiler.rs`: checks tag nesting and builds the [`Ast`](crate::Ast)

pub mod compiler;
pub mod expression;
pub mod tokenizer;
