//! Schema-driven codec between typed records and generic JSON maps.
//!
//! Every record kind declares a static [`Shape`]: its fields in declaration order,
//! a [`TypeDesc`] per field and a rename table mapping field names to wire names.
//! Typed values only know how to flatten themselves into positional [`Slot`]s;
//! wire names, enum tags, base64 for bytes and recursion all live here, in one
//! `encode`/`decode` pair.
//!
//! Wire contract: absent optional fields are omitted on encode. On decode a
//! missing key and an explicit `null` mean the same thing.

use axum::body::Bytes;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64_STANDARD;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("{path}: missing required field '{field}'")]
    MissingField { path: String, field: &'static str },

    #[error("{path}: expected {expected}, found {found}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        found: String,
    },

    #[error("{path}: '{value}' is not a valid {enum_name}")]
    InvalidEnumValue {
        path: String,
        enum_name: &'static str,
        value: String,
    },
}

/// Declared type of a record field.
#[derive(Debug, Clone, Copy)]
pub enum TypeDesc {
    String,
    /// Raw bytes, carried as a standard base64 string on the wire.
    Bytes,
    /// Arbitrary JSON, passed through untouched.
    Any,
    Enum(&'static EnumDesc),
    Record(&'static Shape),
    List(&'static TypeDesc),
    Map(&'static TypeDesc, &'static TypeDesc),
    Optional(&'static TypeDesc),
}

impl TypeDesc {
    pub const fn is_optional(&self) -> bool {
        matches!(self, TypeDesc::Optional(_))
    }

    fn kind(&self) -> &'static str {
        match self {
            TypeDesc::String => "string",
            TypeDesc::Bytes => "base64 string",
            TypeDesc::Any => "any",
            TypeDesc::Enum(desc) => desc.name,
            TypeDesc::Record(shape) => shape.name,
            TypeDesc::List(_) => "array",
            TypeDesc::Map(_, _) => "object",
            TypeDesc::Optional(inner) => inner.kind(),
        }
    }
}

/// String-tagged enumeration.
#[derive(Debug)]
pub struct EnumDesc {
    pub name: &'static str,
    pub tags: &'static [&'static str],
}

#[derive(Debug)]
pub struct FieldDesc {
    pub name: &'static str,
    pub ty: TypeDesc,
}

/// Static schema of one record kind.
#[derive(Debug)]
pub struct Shape {
    pub name: &'static str,
    pub fields: &'static [FieldDesc],
    /// `(field name, wire name)` pairs; unlisted fields keep their own name.
    pub renames: &'static [(&'static str, &'static str)],
}

impl Shape {
    pub fn wire_name(&self, field: &'static str) -> &'static str {
        self.renames
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, wire)| *wire)
            .unwrap_or(field)
    }
}

/// Positional, untagged form of a typed value.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Absent,
    Str(String),
    Bytes(Bytes),
    Any(Value),
    Tag(&'static str),
    /// Field values in the owning shape's declaration order.
    Record(Vec<Slot>),
    List(Vec<Slot>),
    Map(Vec<(Slot, Slot)>),
}

impl Slot {
    fn kind(&self) -> &'static str {
        match self {
            Slot::Absent => "absent",
            Slot::Str(_) => "string",
            Slot::Bytes(_) => "bytes",
            Slot::Any(_) => "any",
            Slot::Tag(_) => "enum tag",
            Slot::Record(_) => "record",
            Slot::List(_) => "list",
            Slot::Map(_) => "map",
        }
    }
}

/// A typed record with a static shape.
///
/// Implemented by the `record!` macro; `to_slots`/`from_slots` follow the order
/// of `SHAPE.fields`.
pub trait Record: Sized {
    const SHAPE: &'static Shape;

    fn to_slots(&self) -> Vec<Slot>;

    fn from_slots(slots: Vec<Slot>) -> Result<Self, CodecError>;
}

pub trait ToSlot {
    fn to_slot(&self) -> Slot;
}

pub trait FromSlot: Sized {
    fn from_slot(slot: Slot) -> Option<Self>;
}

impl ToSlot for String {
    fn to_slot(&self) -> Slot {
        Slot::Str(self.clone())
    }
}

impl FromSlot for String {
    fn from_slot(slot: Slot) -> Option<Self> {
        match slot {
            Slot::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl ToSlot for Bytes {
    fn to_slot(&self) -> Slot {
        Slot::Bytes(self.clone())
    }
}

impl FromSlot for Bytes {
    fn from_slot(slot: Slot) -> Option<Self> {
        match slot {
            Slot::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

// JSON null is the wire form of "absent", so it never survives as a value.
impl ToSlot for Value {
    fn to_slot(&self) -> Slot {
        match self {
            Value::Null => Slot::Absent,
            other => Slot::Any(other.clone()),
        }
    }
}

impl FromSlot for Value {
    fn from_slot(slot: Slot) -> Option<Self> {
        match slot {
            Slot::Any(v) => Some(v),
            _ => None,
        }
    }
}

impl ToSlot for Map<String, Value> {
    fn to_slot(&self) -> Slot {
        Slot::Map(
            self.iter()
                .map(|(k, v)| (Slot::Str(k.clone()), Slot::Any(v.clone())))
                .collect(),
        )
    }
}

impl FromSlot for Map<String, Value> {
    fn from_slot(slot: Slot) -> Option<Self> {
        let Slot::Map(entries) = slot else {
            return None;
        };
        entries
            .into_iter()
            .map(|(k, v)| Some((String::from_slot(k)?, Value::from_slot(v)?)))
            .collect()
    }
}

impl<T: ToSlot> ToSlot for Option<T> {
    fn to_slot(&self) -> Slot {
        match self {
            Some(v) => v.to_slot(),
            None => Slot::Absent,
        }
    }
}

impl<T: FromSlot> FromSlot for Option<T> {
    fn from_slot(slot: Slot) -> Option<Self> {
        match slot {
            Slot::Absent => Some(None),
            other => T::from_slot(other).map(Some),
        }
    }
}

impl<T: ToSlot> ToSlot for Vec<T> {
    fn to_slot(&self) -> Slot {
        Slot::List(self.iter().map(ToSlot::to_slot).collect())
    }
}

impl<T: FromSlot> FromSlot for Vec<T> {
    fn from_slot(slot: Slot) -> Option<Self> {
        match slot {
            Slot::List(items) => items.into_iter().map(T::from_slot).collect(),
            _ => None,
        }
    }
}

/// Rebuilds one field of `shape` from its slot; used by `record!`.
pub fn take_field<T: FromSlot>(
    shape: &'static Shape,
    field: &'static str,
    slot: Option<Slot>,
) -> Result<T, CodecError> {
    let slot = slot.unwrap_or(Slot::Absent);
    let found = slot.kind();
    T::from_slot(slot).ok_or_else(|| {
        let wire = shape.wire_name(field);
        if found == "absent" {
            CodecError::MissingField {
                path: shape.name.to_string(),
                field: wire,
            }
        } else {
            CodecError::TypeMismatch {
                path: format!("{}.{}", shape.name, wire),
                expected: shape
                    .fields
                    .iter()
                    .find(|f| f.name == field)
                    .map_or("value", |f| f.ty.kind()),
                found: found.to_string(),
            }
        }
    })
}

/// Encodes a record into a generic map keyed by wire names, in declaration order.
pub fn encode<R: Record>(record: &R) -> Result<Map<String, Value>, CodecError> {
    encode_record(R::SHAPE, record.to_slots(), R::SHAPE.name)
}

/// Same as [`encode`], wrapped as a JSON value.
pub fn encode_value<R: Record>(record: &R) -> Result<Value, CodecError> {
    encode(record).map(Value::Object)
}

/// Decodes a generic map into a record of shape `R::SHAPE`.
pub fn decode<R: Record>(map: &Map<String, Value>) -> Result<R, CodecError> {
    let slots = decode_record(R::SHAPE, map, R::SHAPE.name)?;
    R::from_slots(slots)
}

/// Decodes any JSON value; anything but an object is a type mismatch.
pub fn decode_value<R: Record>(value: &Value) -> Result<R, CodecError> {
    match value {
        Value::Object(map) => decode(map),
        other => Err(mismatch(R::SHAPE.name, "object", other)),
    }
}

fn encode_record(
    shape: &'static Shape,
    slots: Vec<Slot>,
    path: &str,
) -> Result<Map<String, Value>, CodecError> {
    let mut map = Map::new();
    for (field, slot) in shape.fields.iter().zip(slots) {
        let wire = shape.wire_name(field.name);
        if slot == Slot::Absent {
            if field.ty.is_optional() {
                continue;
            }
            return Err(CodecError::MissingField {
                path: path.to_string(),
                field: wire,
            });
        }
        let value = encode_slot(&field.ty, slot, &format!("{path}.{wire}"))?;
        map.insert(wire.to_string(), value);
    }
    Ok(map)
}

fn encode_slot(ty: &TypeDesc, slot: Slot, path: &str) -> Result<Value, CodecError> {
    match (ty, slot) {
        (TypeDesc::Optional(_), Slot::Absent) => Ok(Value::Null),
        (TypeDesc::Optional(inner), slot) => encode_slot(inner, slot, path),
        (TypeDesc::String, Slot::Str(s)) => Ok(Value::String(s)),
        (TypeDesc::Bytes, Slot::Bytes(b)) => Ok(Value::String(B64_STANDARD.encode(&b))),
        (TypeDesc::Any, Slot::Any(v)) => Ok(v),
        (TypeDesc::Enum(_), Slot::Tag(tag)) => Ok(Value::String(tag.to_string())),
        (TypeDesc::Record(shape), Slot::Record(slots)) => {
            encode_record(shape, slots, path).map(Value::Object)
        }
        (TypeDesc::List(item), Slot::List(items)) => items
            .into_iter()
            .enumerate()
            .map(|(i, s)| encode_slot(item, s, &format!("{path}[{i}]")))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        (TypeDesc::Map(key_ty, value_ty), Slot::Map(entries)) => {
            let mut map = Map::new();
            for (k, v) in entries {
                let key = match encode_slot(key_ty, k, path)? {
                    Value::String(key) => key,
                    other => return Err(mismatch(path, "string key", &other)),
                };
                let value = encode_slot(value_ty, v, &format!("{path}.{key}"))?;
                map.insert(key, value);
            }
            Ok(Value::Object(map))
        }
        (ty, slot) => Err(CodecError::TypeMismatch {
            path: path.to_string(),
            expected: ty.kind(),
            found: slot.kind().to_string(),
        }),
    }
}

fn decode_record(
    shape: &'static Shape,
    map: &Map<String, Value>,
    path: &str,
) -> Result<Vec<Slot>, CodecError> {
    shape
        .fields
        .iter()
        .map(|field| {
            let wire = shape.wire_name(field.name);
            match map.get(wire) {
                None | Some(Value::Null) if field.ty.is_optional() => Ok(Slot::Absent),
                None | Some(Value::Null) => Err(CodecError::MissingField {
                    path: path.to_string(),
                    field: wire,
                }),
                Some(value) => decode_slot(&field.ty, value, &format!("{path}.{wire}")),
            }
        })
        .collect()
}

fn decode_slot(ty: &TypeDesc, value: &Value, path: &str) -> Result<Slot, CodecError> {
    match ty {
        TypeDesc::Optional(_) if value.is_null() => Ok(Slot::Absent),
        TypeDesc::Optional(inner) => decode_slot(inner, value, path),
        TypeDesc::String => match value {
            Value::String(s) => Ok(Slot::Str(s.clone())),
            other => Err(mismatch(path, "string", other)),
        },
        TypeDesc::Bytes => match value {
            Value::String(s) => B64_STANDARD
                .decode(s)
                .map(|b| Slot::Bytes(Bytes::from(b)))
                .map_err(|e| CodecError::TypeMismatch {
                    path: path.to_string(),
                    expected: "base64 string",
                    found: format!("invalid base64 ({e})"),
                }),
            other => Err(mismatch(path, "base64 string", other)),
        },
        TypeDesc::Any => Ok(Slot::Any(value.clone())),
        TypeDesc::Enum(desc) => value
            .as_str()
            .and_then(|raw| desc.tags.iter().find(|tag| **tag == raw).copied())
            .map(Slot::Tag)
            .ok_or_else(|| CodecError::InvalidEnumValue {
                path: path.to_string(),
                enum_name: desc.name,
                value: value
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| value.to_string()),
            }),
        TypeDesc::Record(shape) => match value {
            Value::Object(map) => decode_record(shape, map, path).map(Slot::Record),
            other => Err(mismatch(path, "object", other)),
        },
        TypeDesc::List(item) => match value {
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| decode_slot(item, v, &format!("{path}[{i}]")))
                .collect::<Result<Vec<_>, _>>()
                .map(Slot::List),
            other => Err(mismatch(path, "array", other)),
        },
        TypeDesc::Map(key_ty, value_ty) => match value {
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| {
                    let key = decode_slot(key_ty, &Value::String(k.clone()), path)?;
                    let value = decode_slot(value_ty, v, &format!("{path}.{k}"))?;
                    Ok((key, value))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Slot::Map),
            other => Err(mismatch(path, "object", other)),
        },
    }
}

fn mismatch(path: &str, expected: &'static str, found: &Value) -> CodecError {
    let found = match found {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    CodecError::TypeMismatch {
        path: path.to_string(),
        expected,
        found: found.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    static ITEM: Shape = Shape {
        name: "Item",
        fields: &[
            FieldDesc {
                name: "item_id",
                ty: TypeDesc::String,
            },
            FieldDesc {
                name: "tags",
                ty: TypeDesc::Optional(&TypeDesc::List(&TypeDesc::String)),
            },
        ],
        renames: &[("item_id", "itemId")],
    };

    #[test]
    fn wire_name_defaults_to_field_name() {
        assert_eq!(ITEM.wire_name("item_id"), "itemId");
        assert_eq!(ITEM.wire_name("tags"), "tags");
    }

    #[test]
    fn decode_record_reads_renamed_keys_and_skips_null_optionals() {
        let map = json!({"itemId": "a", "tags": null});
        let slots = decode_record(&ITEM, map.as_object().unwrap(), "Item").unwrap();
        assert_eq!(slots, vec![Slot::Str("a".into()), Slot::Absent]);
    }

    #[test]
    fn decode_record_rejects_original_field_name() {
        let map = json!({"item_id": "a"});
        let err = decode_record(&ITEM, map.as_object().unwrap(), "Item").unwrap_err();
        assert_eq!(
            err,
            CodecError::MissingField {
                path: "Item".into(),
                field: "itemId"
            }
        );
    }

    #[test]
    fn list_elements_keep_order_and_report_index_on_mismatch() {
        let list = TypeDesc::List(&TypeDesc::String);
        let slot = decode_slot(&list, &json!(["x", "y"]), "p").unwrap();
        assert_eq!(
            slot,
            Slot::List(vec![Slot::Str("x".into()), Slot::Str("y".into())])
        );

        let err = decode_slot(&list, &json!(["x", 3]), "p").unwrap_err();
        assert_eq!(
            err,
            CodecError::TypeMismatch {
                path: "p[1]".into(),
                expected: "string",
                found: "number".into()
            }
        );
    }

    #[test]
    fn scalars_are_not_coerced() {
        let err = decode_slot(&TypeDesc::String, &json!(true), "flag").unwrap_err();
        assert!(matches!(err, CodecError::TypeMismatch { .. }));
    }

    #[test]
    fn bytes_use_standard_base64() {
        let value = encode_slot(&TypeDesc::Bytes, Slot::Bytes(Bytes::from_static(b"hi")), "b")
            .unwrap();
        assert_eq!(value, json!("aGk="));
        let err = decode_slot(&TypeDesc::Bytes, &json!("not base64!"), "b").unwrap_err();
        assert!(err.to_string().starts_with("b: expected base64 string"));
    }

    #[test]
    fn absent_required_field_fails_encode() {
        let err = encode_record(&ITEM, vec![Slot::Absent, Slot::Absent], "Item").unwrap_err();
        assert_eq!(
            err,
            CodecError::MissingField {
                path: "Item".into(),
                field: "itemId"
            }
        );
    }

    #[test]
    fn take_field_reports_wire_names_and_schema_kinds() {
        let err = take_field::<String>(&ITEM, "item_id", None).unwrap_err();
        assert_eq!(
            err,
            CodecError::MissingField {
                path: "Item".into(),
                field: "itemId"
            }
        );

        let err = take_field::<String>(&ITEM, "item_id", Some(Slot::Bytes(Bytes::new())))
            .unwrap_err();
        assert_eq!(
            err,
            CodecError::TypeMismatch {
                path: "Item.itemId".into(),
                expected: "string",
                found: "bytes".into()
            }
        );
    }

    #[test]
    fn encode_omits_absent_optionals() {
        let map = encode_record(&ITEM, vec![Slot::Str("a".into()), Slot::Absent], "Item").unwrap();
        assert_eq!(Value::Object(map), json!({"itemId": "a"}));
    }
}
