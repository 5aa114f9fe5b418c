use crate::derive_utils::apply_derives;
use crate::field_utils::{snake_case, take_key_fields};
use proc_macro::TokenStream;
use quote::quote;
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::{Item, LitStr, Path, Result, Token, parse::Parse, parse::ParseStream, parse_macro_input};

/// #[entity] 宏实现
/// - 以 `#[key]` 标记主键字段（至少一个）；多个 `#[key]` 组成元组形式的复合主键
/// - 自动实现 `::uow_domain::entity::Entity`（TYPE/KEY_MEMBERS/Key/key/validate）
/// - 支持参数：`#[entity(name = "...", validate = path::to::fn, debug = true|false)]`；
///   - `name` 默认取结构体名的 snake_case
///   - `validate` 指向 `fn(&Self) -> Result<(), String>`，缺省不校验
///   - `debug` 默认 `true`（派生 Debug）。当为 `false` 时不派生 Debug，便于用户自定义实现。
pub(crate) fn expand(attr: TokenStream, item: TokenStream) -> TokenStream {
    let cfg = parse_macro_input!(attr as EntityAttrConfig);
    let input = parse_macro_input!(item as Item);

    let mut st = match input {
        Item::Struct(s) => s,
        other => {
            return syn::Error::new(other.span(), "#[entity] only on struct")
                .to_compile_error()
                .into();
        }
    };

    let fields_named = match &mut st.fields {
        syn::Fields::Named(f) => f,
        _ => {
            return syn::Error::new(st.span(), "only supports named-field struct")
                .to_compile_error()
                .into();
        }
    };

    let keys = match take_key_fields(fields_named) {
        Ok(keys) if keys.is_empty() => {
            return syn::Error::new(
                st.ident.span(),
                "#[entity] requires at least one #[key] field",
            )
            .to_compile_error()
            .into();
        }
        Ok(keys) => keys,
        Err(err) => return err.to_compile_error().into(),
    };

    // 默认派生 Debug（可通过 debug=false 关闭）、Clone、Serialize、Deserialize
    let mut required: Vec<Path> = vec![
        syn::parse_quote!(Clone),
        syn::parse_quote!(serde::Serialize),
        syn::parse_quote!(serde::Deserialize),
    ];
    if cfg.derive_debug.unwrap_or(true) {
        required.insert(0, syn::parse_quote!(Debug));
    }
    if let Err(err) = apply_derives(&mut st.attrs, required) {
        return err.to_compile_error().into();
    }

    let ident = &st.ident;
    let (impl_generics, ty_generics, where_clause) = st.generics.split_for_impl();

    let type_name = cfg
        .name
        .map(|lit| lit.value())
        .unwrap_or_else(|| snake_case(ident));
    let members: Vec<String> = keys.iter().map(|k| k.ident.to_string()).collect();
    let key_idents: Vec<_> = keys.iter().map(|k| &k.ident).collect();
    let key_types: Vec<_> = keys.iter().map(|k| &k.ty).collect();

    let (key_ty, key_expr) = if keys.len() == 1 {
        let (ty, id) = (key_types[0], key_idents[0]);
        (quote!(#ty), quote!(::core::clone::Clone::clone(&self.#id)))
    } else {
        (
            quote!((#(#key_types),*)),
            quote!((#(::core::clone::Clone::clone(&self.#key_idents)),*)),
        )
    };

    let validate_fn = cfg.validate.map(|path| {
        quote! {
            fn validate(&self) -> ::std::result::Result<(), ::std::string::String> {
                #path(self)
            }
        }
    });

    let expanded = quote! {
        #st

        impl #impl_generics ::uow_domain::entity::Entity for #ident #ty_generics #where_clause {
            const TYPE: &'static str = #type_name;
            const KEY_MEMBERS: &'static [&'static str] = &[#(#members),*];

            type Key = #key_ty;

            fn key(&self) -> Self::Key { #key_expr }

            #validate_fn
        }
    };

    TokenStream::from(expanded)
}

// -------- parsing --------

struct EntityAttrConfig {
    name: Option<LitStr>,
    validate: Option<Path>,
    derive_debug: Option<bool>,
}

impl Parse for EntityAttrConfig {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut cfg = Self {
            name: None,
            validate: None,
            derive_debug: None,
        };

        if input.is_empty() {
            return Ok(cfg);
        }

        let elems: Punctuated<EntityAttrElem, Token![,]> =
            Punctuated::<EntityAttrElem, Token![,]>::parse_terminated(input)?;

        for elem in elems.into_iter() {
            match elem {
                EntityAttrElem::Name(lit) => {
                    if cfg.name.is_some() {
                        return Err(syn::Error::new(lit.span(), "duplicate key 'name' in attribute"));
                    }
                    if lit.value().is_empty() {
                        return Err(syn::Error::new(lit.span(), "'name' must not be empty"));
                    }
                    cfg.name = Some(lit);
                }
                EntityAttrElem::Validate(path) => {
                    if cfg.validate.is_some() {
                        return Err(syn::Error::new(
                            path.span(),
                            "duplicate key 'validate' in attribute",
                        ));
                    }
                    cfg.validate = Some(path);
                }
                EntityAttrElem::Debug(b) => {
                    if cfg.derive_debug.is_some() {
                        return Err(syn::Error::new(
                            proc_macro2::Span::call_site(),
                            "duplicate key 'debug' in attribute",
                        ));
                    }
                    cfg.derive_debug = Some(b);
                }
            }
        }

        Ok(cfg)
    }
}

enum EntityAttrElem {
    Name(LitStr),
    Validate(Path),
    Debug(bool),
}

impl Parse for EntityAttrElem {
    fn parse(input: ParseStream) -> Result<Self> {
        let key: syn::Ident = input.parse()?;
        let _eq: Token![=] = input.parse()?;
        if key == "name" {
            Ok(EntityAttrElem::Name(input.parse()?))
        } else if key == "validate" {
            Ok(EntityAttrElem::Validate(input.parse()?))
        } else if key == "debug" {
            let expr: syn::Expr = input.parse()?;
            match expr {
                syn::Expr::Lit(syn::ExprLit {
                    lit: syn::Lit::Bool(b),
                    ..
                }) => Ok(EntityAttrElem::Debug(b.value())),
                other => Err(syn::Error::new(
                    other.span(),
                    "expected boolean literal for 'debug'",
                )),
            }
        } else {
            Err(syn::Error::new(
                key.span(),
                "unknown key in attribute; expected 'name', 'validate' or 'debug'",
            ))
        }
    }
}
