//! 实体声明宏（uow-macros）
//!
//! - `#[entity]`：以 `#[key]` 字段声明主键，并实现 `uow_domain::entity::Entity`；
//! - `#[entity_key]`：为单字段 tuple struct 生成强类型主键包装。
//!
//! 生成代码通过 `::uow_domain` 与 `serde` 路径引用，使用方需同时依赖二者。
//!
use proc_macro::TokenStream;

mod derive_utils;
mod entity;
mod entity_key;
mod field_utils;

/// 实体宏
///
/// ```ignore
/// #[entity(name = "order_line", validate = check_line)]
/// struct OrderLine {
///     #[key]
///     order_id: String,
///     #[key]
///     line_no: u32,
///     qty: u32,
/// }
/// ```
#[proc_macro_attribute]
pub fn entity(attr: TokenStream, item: TokenStream) -> TokenStream {
    entity::expand(attr, item)
}

/// 主键包装宏
#[proc_macro_attribute]
pub fn entity_key(attr: TokenStream, item: TokenStream) -> TokenStream {
    entity_key::expand(attr, item)
}
