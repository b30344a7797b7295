//! Visited-set keys for the cascade walk.

use nestmodel_core::Value;
use std::hash::{Hash, Hasher};

/// Unique key for one row identity during a single top-level call.
///
/// The orchestrator tracks visited `(table, id)` pairs to bound recursion
/// over accidentally cyclic graphs: a repeated visit becomes a no-op
/// reference instead of an infinite walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VisitKey {
    table: &'static str,
    pk_hash: u64,
}

impl VisitKey {
    /// Build a key from a table name and primary key value.
    #[must_use]
    pub fn new(table: &'static str, id: &Value) -> Self {
        let mut hasher = std::hash::DefaultHasher::new();
        hash_value(id, &mut hasher);
        Self {
            table,
            pk_hash: hasher.finish(),
        }
    }
}

/// Hash a dynamic value with a stable per-variant discriminant.
fn hash_value<H: Hasher>(value: &Value, state: &mut H) {
    match value {
        Value::Null => state.write_u8(0),
        Value::Bool(v) => {
            state.write_u8(1);
            v.hash(state);
        }
        Value::BigInt(v) => {
            state.write_u8(2);
            v.hash(state);
        }
        Value::Double(v) => {
            state.write_u8(3);
            v.to_bits().hash(state);
        }
        Value::Text(v) => {
            state.write_u8(4);
            v.hash(state);
        }
        Value::Bytes(v) => {
            state.write_u8(5);
            v.hash(state);
        }
        Value::Timestamp(v) => {
            state.write_u8(6);
            v.hash(state);
        }
        Value::Json(v) => {
            state.write_u8(7);
            v.to_string().hash(state);
        }
        Value::Array(items) => {
            state.write_u8(8);
            state.write_usize(items.len());
            for item in items {
                hash_value(item, state);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_identity_same_key() {
        let a = VisitKey::new("countries", &Value::BigInt(1));
        let b = VisitKey::new("countries", &Value::BigInt(1));
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_ids_differ() {
        let a = VisitKey::new("countries", &Value::BigInt(1));
        let b = VisitKey::new("countries", &Value::BigInt(2));
        assert_ne!(a, b);
    }

    #[test]
    fn test_different_tables_differ() {
        let a = VisitKey::new("countries", &Value::BigInt(1));
        let b = VisitKey::new("cities", &Value::BigInt(1));
        assert_ne!(a, b);
    }

    #[test]
    fn test_value_types_do_not_collide() {
        let a = VisitKey::new("countries", &Value::BigInt(1));
        let b = VisitKey::new("countries", &Value::Text("1".into()));
        assert_ne!(a, b);
    }
}
