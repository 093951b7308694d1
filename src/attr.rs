use serde::ser::{Serialize, SerializeMap, Serializer};

/// A single key/value pair attached to a log record.
///
/// Keys are not required to be unique within a list; ordering is the
/// only thing this crate guarantees about sibling attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Attr {
    pub key: String,
    pub value: Value,
}

/// Value carried by an [`Attr`].
///
/// `Group` nests an ordered attribute list under the owning key.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
    Group(Vec<Attr>),
}

impl Attr {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Attr {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Build an attribute whose value is a group holding `attrs`.
    pub fn group(key: impl Into<String>, attrs: Vec<Attr>) -> Self {
        Attr {
            key: key.into(),
            value: Value::Group(attrs),
        }
    }
}

impl Value {
    /// Members of a group value, `None` for scalars.
    pub fn as_group(&self) -> Option<&[Attr]> {
        match self {
            Value::Group(attrs) => Some(attrs),
            _ => None,
        }
    }

    /// Lossy JSON view of the value.
    ///
    /// Groups become objects, so a duplicated key keeps only its last value.
    /// Use the `Serialize` impl when duplicates must be preserved.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::I64(v) => serde_json::Value::from(*v),
            Value::U64(v) => serde_json::Value::from(*v),
            Value::F64(v) => serde_json::Value::from(*v),
            Value::Bool(v) => serde_json::Value::from(*v),
            Value::Group(attrs) => attrs_to_json(attrs),
        }
    }
}

/// Lossy JSON object built from an attribute list, see [`Value::to_json`].
pub fn attrs_to_json(attrs: &[Attr]) -> serde_json::Value {
    let mut map = serde_json::Map::with_capacity(attrs.len());
    for attr in attrs {
        map.insert(attr.key.clone(), attr.value.to_json());
    }
    serde_json::Value::Object(map)
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I64(v.into())
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::U64(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::U64(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<Vec<Attr>> for Value {
    fn from(v: Vec<Attr>) -> Self {
        Value::Group(v)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Str(s) => serializer.serialize_str(s),
            Value::I64(v) => serializer.serialize_i64(*v),
            Value::U64(v) => serializer.serialize_u64(*v),
            Value::F64(v) => serializer.serialize_f64(*v),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::Group(attrs) => serialize_attrs(attrs, serializer),
        }
    }
}

/// Serialize an attribute list as a map, in list order, keeping duplicates.
pub fn serialize_attrs<S: Serializer>(attrs: &[Attr], serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(attrs.len()))?;
    for attr in attrs {
        map.serialize_entry(&attr.key, &attr.value)?;
    }
    map.end()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_serializes_as_ordered_map() {
        let attr = Attr::group(
            "req",
            vec![Attr::new("status", 200), Attr::new("method", "GET")],
        );
        let out = serde_json::to_string(&attr.value).unwrap();
        assert_eq!(out, r#"{"status":200,"method":"GET"}"#);
    }

    #[test]
    fn serialization_keeps_duplicate_keys() {
        let value = Value::Group(vec![Attr::new("a", 1), Attr::new("a", 2)]);
        let out = serde_json::to_string(&value).unwrap();
        assert_eq!(out, r#"{"a":1,"a":2}"#);
    }

    #[test]
    fn json_view_nests_groups() {
        let value = Value::Group(vec![
            Attr::new("ok", true),
            Attr::group("inner", vec![Attr::new("n", 1.5)]),
        ]);
        assert_eq!(
            value.to_json(),
            serde_json::json!({ "ok": true, "inner": { "n": 1.5 } })
        );
    }

    #[test]
    fn as_group_only_for_groups() {
        assert!(Value::from("x").as_group().is_none());
        assert_eq!(Value::Group(vec![]).as_group(), Some(&[][..]));
    }
}
