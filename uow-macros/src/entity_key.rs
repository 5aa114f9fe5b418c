use crate::derive_utils::apply_derives;
use proc_macro::TokenStream;
use quote::quote;
use syn::spanned::Spanned;
use syn::{Item, Path, parse_macro_input};

/// #[entity_key] 宏实现
/// 仅支持单字段 tuple struct，将其作为实体主键的强类型包装：
/// - 合并/追加派生：Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize
/// - 序列化形态与内部值一致（`#[serde(transparent)]`），存储中的规范主键不受包装影响
/// - 提供 new(value)、Display、FromStr、AsRef、From 等便捷实现
/// - 支持参数 `#[entity_key(debug = false)]` 以便自定义 Debug
pub(crate) fn expand(attr: TokenStream, item: TokenStream) -> TokenStream {
    let derive_debug = match parse_debug_flag(attr) {
        Ok(flag) => flag,
        Err(err) => return err.to_compile_error().into(),
    };
    let input = parse_macro_input!(item as Item);

    let mut st = match input {
        Item::Struct(s) => s,
        other => {
            return syn::Error::new(other.span(), "#[entity_key] only on struct")
                .to_compile_error()
                .into();
        }
    };

    let inner_ty = match &st.fields {
        syn::Fields::Unnamed(f) if f.unnamed.len() == 1 => f.unnamed[0].ty.clone(),
        syn::Fields::Unnamed(f) => {
            return syn::Error::new(
                f.span(),
                "#[entity_key] requires a tuple struct with exactly one field",
            )
            .to_compile_error()
            .into();
        }
        _ => {
            return syn::Error::new(
                st.span(),
                "#[entity_key] supports only tuple struct, e.g., struct X(String);",
            )
            .to_compile_error()
            .into();
        }
    };

    let mut required: Vec<Path> = vec![
        syn::parse_quote!(Clone),
        syn::parse_quote!(PartialEq),
        syn::parse_quote!(Eq),
        syn::parse_quote!(Hash),
        syn::parse_quote!(PartialOrd),
        syn::parse_quote!(Ord),
        syn::parse_quote!(serde::Serialize),
        syn::parse_quote!(serde::Deserialize),
    ];
    if derive_debug {
        required.insert(1, syn::parse_quote!(Debug));
    }
    if let Err(err) = apply_derives(&mut st.attrs, required) {
        return err.to_compile_error().into();
    }
    if !st.attrs.iter().any(|a| a.path().is_ident("serde")) {
        st.attrs.push(syn::parse_quote!(#[serde(transparent)]));
    }

    let ident = &st.ident;
    let (impl_generics, ty_generics, where_clause) = st.generics.split_for_impl();

    let out = quote! {
        #st

        impl #impl_generics #ident #ty_generics #where_clause {
            pub fn new(value: #inner_ty) -> Self { Self(value) }

            pub fn into_inner(self) -> #inner_ty { self.0 }
        }

        impl #impl_generics ::std::str::FromStr for #ident #ty_generics #where_clause
        where #inner_ty: ::std::str::FromStr
        {
            type Err = <#inner_ty as ::std::str::FromStr>::Err;
            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                let inner: #inner_ty = s.parse()?;
                ::std::result::Result::Ok(Self(inner))
            }
        }

        impl #impl_generics ::std::fmt::Display for #ident #ty_generics #where_clause
        where #inner_ty: ::std::fmt::Display
        {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::write!(f, "{}", self.0)
            }
        }

        impl #impl_generics ::core::convert::AsRef<#inner_ty> for #ident #ty_generics #where_clause {
            fn as_ref(&self) -> &#inner_ty { &self.0 }
        }

        impl #impl_generics ::core::convert::From<#inner_ty> for #ident #ty_generics #where_clause {
            fn from(value: #inner_ty) -> Self { Self(value) }
        }
    };

    TokenStream::from(out)
}

// 仅接受空参数或 `debug = <bool>`
fn parse_debug_flag(attr: TokenStream) -> syn::Result<bool> {
    if attr.is_empty() {
        return Ok(true);
    }
    let assign: syn::MetaNameValue = syn::parse(attr)?;
    if !assign.path.is_ident("debug") {
        return Err(syn::Error::new(
            assign.path.span(),
            "unknown key in attribute; expected 'debug'",
        ));
    }
    match assign.value {
        syn::Expr::Lit(syn::ExprLit {
            lit: syn::Lit::Bool(b),
            ..
        }) => Ok(b.value()),
        other => Err(syn::Error::new(
            other.span(),
            "expected boolean literal for 'debug'",
        )),
    }
}
