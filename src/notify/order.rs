// Order and snapshot types as delivered by the order source
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

use super::table_key::TableKey;
use crate::error::NotifyError;

/// A string-or-integer value, as order ids and table names arrive in JSON.
///
/// Deserialization never fails: values that are neither a string nor an
/// integer land in `Other`, so one bad field costs only its own order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ident {
    Int(i64),
    /// Integers above `i64::MAX`
    Uint(u64),
    Text(String),
    /// Anything else (null, a fractional number, a bool, a nested value),
    /// kept as its JSON text. Never a valid table.
    Other(String),
}

impl Ident {
    /// Normalize this value as a table identifier
    pub fn table_key(&self) -> Result<TableKey, NotifyError> {
        match self {
            Ident::Int(n) => TableKey::parse(&n.to_string()),
            Ident::Uint(n) => TableKey::parse(&n.to_string()),
            Ident::Text(s) => TableKey::parse(s),
            Ident::Other(raw) => Err(NotifyError::Validation { input: raw.clone() }),
        }
    }

    /// Stand-in for a table field the order source left out
    fn missing() -> Self {
        Ident::Other("missing".to_string())
    }

    fn from_json(value: Value) -> Self {
        match value {
            Value::String(s) => Ident::Text(s),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ident::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Ident::Uint(u)
                } else {
                    match n.as_f64() {
                        // 7.0 from a JavaScript source is table 7
                        Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ident::Int(f as i64),
                        _ => Ident::Other(n.to_string()),
                    }
                }
            }
            other => Ident::Other(other.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for Ident {
    fn deserialize<D>(d: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(d).map(Ident::from_json)
    }
}

impl Serialize for Ident {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Ident::Int(n) => s.serialize_i64(*n),
            Ident::Uint(n) => s.serialize_u64(*n),
            Ident::Text(v) | Ident::Other(v) => s.serialize_str(v),
        }
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ident::Int(n) => write!(f, "{}", n),
            Ident::Uint(n) => write!(f, "{}", n),
            Ident::Text(s) | Ident::Other(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Ident {
    fn from(n: i64) -> Self {
        Ident::Int(n)
    }
}

impl From<i32> for Ident {
    fn from(n: i32) -> Self {
        Ident::Int(n.into())
    }
}

impl From<u32> for Ident {
    fn from(n: u32) -> Self {
        Ident::Int(n.into())
    }
}

impl From<&str> for Ident {
    fn from(s: &str) -> Self {
        Ident::Text(s.to_string())
    }
}

impl From<String> for Ident {
    fn from(s: String) -> Self {
        Ident::Text(s)
    }
}

/// A live order. The engine only reads `id` and `table_identifier`;
/// anything else the order source sends is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Ident,
    #[serde(alias = "table", default = "Ident::missing")]
    pub table_identifier: Ident,
}

impl Order {
    pub fn new(id: impl Into<Ident>, table_identifier: impl Into<Ident>) -> Self {
        Self {
            id: id.into(),
            table_identifier: table_identifier.into(),
        }
    }
}

/// All currently live orders at one poll instant, in source order.
pub type Snapshot = Vec<Order>;

/// Parse a JSON array of orders.
///
/// Only a document that is not an array fails. An element that is not an
/// order at all (not an object, no `id`) is logged and left out; the rest
/// of the snapshot stands.
pub fn parse_snapshot(json: &str) -> serde_json::Result<Snapshot> {
    let items: Vec<Value> = serde_json::from_str(json)?;
    let snapshot = items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value::<Order>(item) {
            Ok(order) => Some(order),
            Err(e) => {
                tracing::warn!(index, "skipping malformed order: {}", e);
                None
            }
        })
        .collect();
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mixed_identifiers() {
        let json = r#"[
            {"id": 1, "tableIdentifier": "5", "status": "new"},
            {"id": "ord-2", "table": 12}
        ]"#;
        let snapshot: Snapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot[0], Order::new(1, "5"));
        assert_eq!(snapshot[1], Order::new("ord-2", 12));
    }

    #[test]
    fn test_int_and_text_ids_differ() {
        assert_ne!(Ident::from(1), Ident::from("1"));
    }

    #[test]
    fn test_bad_table_costs_only_its_order() {
        let json = r#"[{"id":1,"tableIdentifier":"5"},{"id":2,"tableIdentifier":null}]"#;
        let snapshot = parse_snapshot(json).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].table_identifier.table_key().unwrap().as_str(), "5");
        match snapshot[1].table_identifier.table_key() {
            Err(NotifyError::Validation { input }) => assert_eq!(input, "null"),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_odd_table_values() {
        let json = r#"[
            {"id": 1, "tableIdentifier": 7.0},
            {"id": 2, "tableIdentifier": 7.5},
            {"id": 3},
            {"id": 4, "table": true},
            {"id": 5, "table": {"name": "patio"}}
        ]"#;
        let snapshot = parse_snapshot(json).unwrap();
        assert_eq!(snapshot.len(), 5);
        assert_eq!(snapshot[0].table_identifier, Ident::Int(7));
        assert_eq!(snapshot[0].table_identifier.table_key().unwrap().as_str(), "7");
        for order in &snapshot[1..] {
            assert!(order.table_identifier.table_key().is_err(), "order {}", order.id);
        }
    }

    #[test]
    fn test_large_and_float_ids() {
        let json = r#"[
            {"id": 18446744073709551615, "table": 1},
            {"id": 42.0, "table": 2},
            {"id": 0.5, "table": 3}
        ]"#;
        let snapshot = parse_snapshot(json).unwrap();
        assert_eq!(snapshot[0].id, Ident::Uint(u64::MAX));
        assert_eq!(snapshot[1].id, Ident::Int(42));
        assert_eq!(snapshot[2].id, Ident::Other("0.5".into()));
        assert_eq!(
            Ident::Uint(u64::MAX).table_key().unwrap().as_str(),
            "18446744073709551615"
        );
    }

    #[test]
    fn test_non_orders_are_left_out() {
        let json = r#"[{"id": 1, "table": 3}, "junk", {"table": 4}, {"id": 2, "table": 5}]"#;
        let snapshot = parse_snapshot(json).unwrap();
        assert_eq!(snapshot, vec![Order::new(1, 3), Order::new(2, 5)]);
        assert!(parse_snapshot(r#"{"id": 1}"#).is_err());
    }

    #[test]
    fn test_serialize_keeps_shape() {
        let json = serde_json::to_string(&vec![Ident::from(3), Ident::from("a"), Ident::Uint(u64::MAX)]).unwrap();
        assert_eq!(json, r#"[3,"a",18446744073709551615]"#);
    }

    #[test]
    fn test_table_key_from_int() {
        assert_eq!(Ident::from(7).table_key().unwrap().as_str(), "7");
        assert_eq!(Ident::from(-7).table_key().unwrap().as_str(), "7");
    }
}
