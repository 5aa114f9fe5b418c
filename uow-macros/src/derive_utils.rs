use quote::ToTokens;
use syn::punctuated::Punctuated;
use syn::{Attribute, Path, Token};

// 去重用的 derive 标识：取路径末段，serde 派生统一前缀
fn derive_key(path: &Path) -> String {
    match path.segments.last() {
        Some(last) if last.ident == "Serialize" || last.ident == "Deserialize" => {
            format!("serde::{}", last.ident)
        }
        Some(last) => last.ident.to_string(),
        None => path.to_token_stream().to_string(),
    }
}

/// 把所需派生与用户已写的派生合并为单个 `#[derive(..)]`，置于属性首位。
///
/// 所需派生在前；用户重复声明的同名派生被忽略，其余属性保持原有顺序。
pub(crate) fn apply_derives(attrs: &mut Vec<Attribute>, required: Vec<Path>) -> syn::Result<()> {
    let mut retained = Vec::with_capacity(attrs.len());
    let mut merged: Vec<Path> = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for path in required {
        if seen.insert(derive_key(&path)) {
            merged.push(path);
        }
    }

    for attr in attrs.drain(..) {
        if !attr.path().is_ident("derive") {
            retained.push(attr);
            continue;
        }
        let list = attr.parse_args_with(Punctuated::<Path, Token![,]>::parse_terminated)?;
        for path in list {
            if seen.insert(derive_key(&path)) {
                merged.push(path);
            }
        }
    }

    attrs.push(syn::parse_quote!(#[derive(#(#merged),*)]));
    attrs.extend(retained);
    Ok(())
}
