use proc_macro::TokenStream;
use quote::quote;
use std::path::{Path, PathBuf};
use syn::{LitStr, Token, parse::Parse, parse::ParseStream, parse_macro_input};
use walkdir::WalkDir;

struct BundleInput {
    dir: LitStr,
    extension: Option<LitStr>,
}

impl Parse for BundleInput {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let dir: LitStr = input.parse()?;
        let extension = if input.parse::<Option<Token![,]>>()?.is_some() && !input.is_empty() {
            Some(input.parse()?)
        } else {
            None
        };
        Ok(BundleInput { dir, extension })
    }
}

/// Name of a template file: its path below `root`, `/`-separated, without extension
fn template_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?.with_extension("");
    let components = relative
        .components()
        .map(|component| component.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?;
    Some(components.join("/"))
}

/// Template files below `root` with `extension`, sorted by path
fn template_files(root: &Path, extension: &str) -> Vec<(String, PathBuf)> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == extension))
        .filter_map(|entry| {
            let path = entry.into_path();
            template_name(root, &path).map(|name| (name, path))
        })
        .collect()
}

fn expand(input: BundleInput) -> syn::Result<proc_macro2::TokenStream> {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR")
        .map_err(|_| syn::Error::new(input.dir.span(), "CARGO_MANIFEST_DIR not set"))?;
    let root_path = Path::new(&manifest_dir).join(input.dir.value());
    if !root_path.is_dir() {
        return Err(syn::Error::new(
            input.dir.span(),
            format!("Directory not found: {:?}", root_path),
        ));
    }
    let extension = input
        .extension
        .map(|extension| extension.value())
        .unwrap_or_else(|| "mustache".to_string());

    let mut entries = Vec::new();
    for (name, path) in template_files(&root_path, &extension) {
        let path_str = path.to_str().ok_or_else(|| {
            syn::Error::new(input.dir.span(), format!("Path is not valid UTF-8: {:?}", path))
        })?;
        // include_str! ties the output to the file so edits trigger recompilation
        entries.push(quote! { (#name, include_str!(#path_str)) });
    }

    Ok(quote! {
        &[#(#entries),*]
    })
}

/// Embeds every template file of a directory
///
/// `bundle!("templates")` expands to a `&'static [(&'static str, &'static str)]`
/// of `(name, source)` pairs for the `*.mustache` files below `templates`,
/// relative to the calling crate's manifest. Names are relative paths without
/// extension, like `partials/header`. `bundle!("templates", "html")` selects
/// another extension.
#[proc_macro]
pub fn bundle(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as BundleInput);
    match expand(input) {
        Ok(expanded) => TokenStream::from(expanded),
        Err(err) => err.to_compile_error().into(),
    }
}
