//! 二进制状态编解码（BinaryCodec）
//!
//! 将任意可序列化对象图编码为不透明字节序列（例如 Web 会话负载），并可原样还原。
//! 字节格式：`UOWB` 魔数 + 格式版本 + 负载类型名 + CBOR 负载。
//! CBOR 自描述，内部标记枚举、`serde_json::Value`、`skip_serializing_if` 等依赖
//! `deserialize_any` 或字段名的形状都能原样还原。
//! 该格式仅用于同一部署内的往返，不承诺跨版本或跨语言兼容。
//!
//! 编解码失败属于可恢复情况：统一返回 `None` 并记录告警，调用方需检查返回值。
//!
use serde::{Serialize, de::DeserializeOwned};
use tracing::warn;

const MAGIC: &[u8; 4] = b"UOWB";
const FORMAT_VERSION: u8 = 2;
const HEADER_LEN: usize = MAGIC.len() + 1 + 2;

/// 将对象编码为字节；对象的 `Serialize` 实现拒绝序列化时返回 `None`
pub fn serialize<T>(value: &T) -> Option<Vec<u8>>
where
    T: Serialize + ?Sized,
{
    let type_name = std::any::type_name::<T>();
    let Ok(name_len) = u16::try_from(type_name.len()) else {
        warn!(type_name, "type name too long for state header");
        return None;
    };

    let mut payload = Vec::new();
    if let Err(err) = ciborium::ser::into_writer(value, &mut payload) {
        warn!(type_name, error = %err, "value is not serializable");
        return None;
    }

    let mut out = Vec::with_capacity(HEADER_LEN + type_name.len() + payload.len());
    out.extend_from_slice(MAGIC);
    out.push(FORMAT_VERSION);
    out.extend_from_slice(&name_len.to_le_bytes());
    out.extend_from_slice(type_name.as_bytes());
    out.extend_from_slice(&payload);
    Some(out)
}

/// 从字节还原对象；空输入、格式不符、类型不符或解码失败时返回 `None`
pub fn deserialize<T>(bytes: Option<&[u8]>) -> Option<T>
where
    T: DeserializeOwned,
{
    let bytes = bytes.filter(|b| !b.is_empty())?;
    let expected = std::any::type_name::<T>();

    let payload = match split_header(bytes) {
        Some((found, payload)) if found == expected => payload,
        Some((found, _)) => {
            warn!(expected, found, "state payload type mismatch");
            return None;
        }
        None => {
            warn!(len = bytes.len(), "unrecognised state header");
            return None;
        }
    };

    let mut reader = payload;
    match ciborium::de::from_reader::<T, _>(&mut reader) {
        Ok(value) if reader.is_empty() => Some(value),
        Ok(_) => {
            warn!(
                type_name = expected,
                trailing = reader.len(),
                len = payload.len(),
                "trailing bytes after state payload"
            );
            None
        }
        Err(err) => {
            warn!(type_name = expected, error = %err, "state payload decode failed");
            None
        }
    }
}

/// 读取头部中记录的负载类型名（不解码负载）
pub fn payload_type(bytes: &[u8]) -> Option<&str> {
    split_header(bytes).map(|(name, _)| name)
}

fn split_header(bytes: &[u8]) -> Option<(&str, &[u8])> {
    if bytes.len() < HEADER_LEN || &bytes[..MAGIC.len()] != MAGIC {
        return None;
    }
    if bytes[MAGIC.len()] != FORMAT_VERSION {
        return None;
    }

    let len_at = MAGIC.len() + 1;
    let name_len = u16::from_le_bytes([bytes[len_at], bytes[len_at + 1]]) as usize;
    let rest = &bytes[HEADER_LEN..];
    if rest.len() < name_len {
        return None;
    }

    let (name, payload) = rest.split_at(name_len);
    let name = std::str::from_utf8(name).ok()?;
    Some((name, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde::{Deserialize, Serializer};
    use std::collections::{BTreeMap, HashMap};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Cart {
        user: String,
        items: Vec<CartItem>,
        coupon: Option<String>,
        attributes: HashMap<String, i64>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    enum CartItem {
        Product { sku: String, qty: u32 },
        GiftCard(u64),
        Note,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "kind")]
    enum Flash {
        Info { text: String },
        Warn { text: String, code: u16 },
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Checkout {
        step: u8,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        coupon: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        flashes: Vec<Flash>,
        total: f64,
    }

    // 运行期拒绝序列化的类型
    struct Socket;

    impl Serialize for Socket {
        fn serialize<S: Serializer>(&self, _s: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("socket handles are not serializable"))
        }
    }

    fn cart() -> Cart {
        Cart {
            user: "u-1".into(),
            items: vec![
                CartItem::Product {
                    sku: "sku-1".into(),
                    qty: 2,
                },
                CartItem::GiftCard(50),
                CartItem::Note,
            ],
            coupon: None,
            attributes: HashMap::from([("visits".to_string(), 3)]),
        }
    }

    #[test]
    fn object_graph_round_trips() {
        let bytes = serialize(&cart()).unwrap();
        assert_eq!(&bytes[..4], b"UOWB");
        assert_eq!(payload_type(&bytes), Some(std::any::type_name::<Cart>()));

        let restored: Cart = deserialize(Some(bytes.as_slice())).unwrap();
        assert_eq!(restored, cart());
    }

    #[test]
    fn self_describing_shapes_round_trip() {
        let flash = Flash::Warn {
            text: "low stock".into(),
            code: 409,
        };
        let bytes = serialize(&flash).unwrap();
        assert_eq!(deserialize::<Flash>(Some(bytes.as_slice())), Some(flash));

        let value = serde_json::json!({"a": 1, "b": [true, null, -2.5], "c": {"d": "e"}});
        let bytes = serialize(&value).unwrap();
        assert_eq!(deserialize::<serde_json::Value>(Some(bytes.as_slice())), Some(value));

        let checkout = Checkout {
            step: 2,
            coupon: None,
            flashes: Vec::new(),
            total: 19.99,
        };
        let bytes = serialize(&checkout).unwrap();
        assert_eq!(deserialize::<Checkout>(Some(bytes.as_slice())), Some(checkout));
    }

    #[test]
    fn non_serializable_value_yields_none() {
        assert!(serialize(&Socket).is_none());
        assert!(serialize(&vec![Socket]).is_none());
    }

    #[test]
    fn missing_or_empty_input_yields_none() {
        assert_eq!(deserialize::<Cart>(None), None);
        assert_eq!(deserialize::<Cart>(Some(&[][..])), None);
    }

    #[test]
    fn foreign_or_mismatched_bytes_yield_none() {
        assert_eq!(deserialize::<Cart>(Some(&b"not a state blob"[..])), None);

        let bytes = serialize(&42u32).unwrap();
        assert_eq!(deserialize::<Cart>(Some(bytes.as_slice())), None);
        assert_eq!(deserialize::<u32>(Some(bytes.as_slice())), Some(42));

        let mut truncated = serialize(&cart()).unwrap();
        truncated.truncate(truncated.len() - 1);
        assert_eq!(deserialize::<Cart>(Some(truncated.as_slice())), None);

        let mut padded = serialize(&7u64).unwrap();
        padded.push(0);
        assert_eq!(deserialize::<u64>(Some(padded.as_slice())), None);
    }

    fn flash() -> impl Strategy<Value = Flash> {
        prop_oneof![
            ".{0,12}".prop_map(|text| Flash::Info { text }),
            (".{0,12}", any::<u16>()).prop_map(|(text, code)| Flash::Warn { text, code }),
        ]
    }

    proptest! {
        #[test]
        fn round_trip_law(
            user in ".{0,16}",
            qtys in proptest::collection::vec(any::<u32>(), 0..8),
            coupon in proptest::option::of("[A-Z]{4}"),
            attrs in proptest::collection::btree_map(".{0,6}", any::<i64>(), 0..4),
        ) {
            let value = (
                user,
                qtys,
                coupon,
                attrs.into_iter().collect::<BTreeMap<String, i64>>(),
            );
            let bytes = serialize(&value).unwrap();
            let restored = deserialize::<(String, Vec<u32>, Option<String>, BTreeMap<String, i64>)>(Some(bytes.as_slice()));
            prop_assert_eq!(restored, Some(value));
        }

        #[test]
        fn round_trip_law_for_tagged_and_sparse_shapes(
            step in any::<u8>(),
            coupon in proptest::option::of("[A-Z]{4}"),
            flashes in proptest::collection::vec(flash(), 0..4),
            total in -1.0e6f64..1.0e6,
            extra in proptest::collection::btree_map("[a-z]{1,6}", any::<i64>(), 0..4),
        ) {
            let checkout = Checkout { step, coupon, flashes, total };
            let bytes = serialize(&checkout).unwrap();
            prop_assert_eq!(deserialize::<Checkout>(Some(bytes.as_slice())), Some(checkout));

            let value = serde_json::to_value(&extra).unwrap();
            let bytes = serialize(&value).unwrap();
            prop_assert_eq!(deserialize::<serde_json::Value>(Some(bytes.as_slice())), Some(value));
        }
    }
}
