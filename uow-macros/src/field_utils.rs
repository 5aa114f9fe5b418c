use syn::{FieldsNamed, Ident, Type};

/// 标记为主键的字段
pub(crate) struct KeyField {
    pub(crate) ident: Ident,
    pub(crate) ty: Type,
}

/// 收集带 `#[key]` 的字段（按声明顺序），并从字段上移除该标记
pub(crate) fn take_key_fields(fields_named: &mut FieldsNamed) -> syn::Result<Vec<KeyField>> {
    let mut keys = Vec::new();

    for field in fields_named.named.iter_mut() {
        let before = field.attrs.len();
        let mut marker = None;
        field.attrs.retain(|attr| {
            if attr.path().is_ident("key") {
                marker.get_or_insert_with(|| attr.clone());
                false
            } else {
                true
            }
        });

        let Some(marker) = marker else { continue };
        marker.meta.require_path_only()?;
        if before - field.attrs.len() > 1 {
            return Err(syn::Error::new_spanned(marker, "duplicate #[key] on field"));
        }

        // 具名字段结构体的字段必有名字
        if let Some(ident) = field.ident.clone() {
            keys.push(KeyField {
                ident,
                ty: field.ty.clone(),
            });
        }
    }

    Ok(keys)
}

/// `OrderLine` -> `order_line`
pub(crate) fn snake_case(ident: &Ident) -> String {
    let raw = ident.to_string();
    let mut out = String::with_capacity(raw.len() + 4);
    let mut prev_lower = false;
    for ch in raw.chars() {
        if ch.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
            prev_lower = false;
        } else {
            out.push(ch);
            prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        }
    }
    out
}
