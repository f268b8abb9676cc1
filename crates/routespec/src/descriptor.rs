/*!
Compile-time type descriptors.

Types describe their own shape through [`ApiSchema`]; the synthesizer in
[`crate::schema`] walks the resulting [`TypeDescriptor`] tree. Structs get
their implementation from `#[derive(ApiSchema)]`, the common std, chrono,
uuid and serde_json types are covered here.
*/

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Trait for types that can describe their structural shape
pub trait ApiSchema {
    /// Describe this type
    fn describe() -> TypeDescriptor;
}

/// Language-neutral description of a type's shape
#[derive(Debug, Clone)]
pub enum TypeDescriptor {
    /// No type at all (`()`)
    Absent,
    /// Optional or indirect wrapper around another type
    Optional(Box<TypeDescriptor>),
    String,
    Boolean,
    Integer { bits: u8, signed: bool },
    Float { bits: u8 },
    /// Opaque byte buffer
    Bytes,
    /// Wall-clock timestamp, with a sample value for the schema example
    DateTime { example: DateTime<Utc> },
    /// Calendar date without time
    Date,
    Uuid,
    Sequence(Box<TypeDescriptor>),
    /// String-keyed map with the given value type
    Map(Box<TypeDescriptor>),
    /// Arbitrary JSON value
    Any,
    /// String enumeration
    Enum(Vec<&'static str>),
    Struct(StructDescriptor),
    /// Anything else; synthesized as a plain string
    Unsupported(&'static str),
}

impl TypeDescriptor {
    /// Whether this describes an unsigned 8-bit integer (a byte)
    pub(crate) fn is_byte(&self) -> bool {
        matches!(self, Self::Integer { bits: 8, signed: false })
    }
}

/// Fields of a struct-like type, in declaration order
#[derive(Debug, Clone)]
pub struct StructDescriptor {
    pub name: &'static str,
    pub fields: Vec<FieldDescriptor>,
}

/// A single struct field
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// Rust identifier of the field
    pub ident: &'static str,
    pub annotations: FieldAnnotations,
    /// Resolved lazily so self-referencing types can be described
    pub ty: fn() -> TypeDescriptor,
}

impl FieldDescriptor {
    /// Field exposed under its own identifier
    pub fn new(ident: &'static str, ty: fn() -> TypeDescriptor) -> Self {
        Self {
            ident,
            annotations: FieldAnnotations::named(ident),
            ty,
        }
    }

    pub fn with_annotations(mut self, annotations: FieldAnnotations) -> Self {
        self.annotations = annotations;
        self
    }
}

/// Declarative metadata attached to a field
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldAnnotations {
    /// External name; `None` hides the field
    pub name: Option<&'static str>,
    /// Field may be left out of the payload
    pub omit_empty: bool,
    /// Comma separated validation markers, e.g. `"required,min=3"`
    pub validate: Option<&'static str>,
    pub doc: Option<&'static str>,
    pub example: Option<&'static str>,
    pub format: Option<&'static str>,
}

impl FieldAnnotations {
    pub fn named(name: &'static str) -> Self {
        Self {
            name: Some(name),
            ..Default::default()
        }
    }

    /// Required unless omitted when empty; a `required` validation marker wins.
    pub fn is_required(&self) -> bool {
        let marked = self
            .validate
            .map(|markers| markers.split(',').any(|m| m.trim() == "required"))
            .unwrap_or(false);
        marked || !self.omit_empty
    }
}

/// Fixed example for timestamp schemas, so repeated synthesis is byte-identical
pub fn sample_timestamp() -> DateTime<Utc> {
    DateTime::from_timestamp(1_704_067_200, 0).unwrap_or_default()
}

/// Types that can produce a representative timestamp of themselves
pub trait TimeValue {
    fn time(&self) -> DateTime<Utc>;
}

/// Implement [`ApiSchema`] as a date-time for a type implementing
/// [`TimeValue`] and `Default`.
#[macro_export]
macro_rules! impl_time_schema {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::ApiSchema for $ty {
                fn describe() -> $crate::TypeDescriptor {
                    $crate::TypeDescriptor::DateTime {
                        example: $crate::TimeValue::time(&<$ty as ::std::default::Default>::default()),
                    }
                }
            }
        )+
    };
}

macro_rules! impl_scalar {
    ($descriptor:expr => $($ty:ty),+) => {
        $(
            impl ApiSchema for $ty {
                fn describe() -> TypeDescriptor {
                    $descriptor
                }
            }
        )+
    };
}

impl_scalar!(TypeDescriptor::String => String, str, char);
impl_scalar!(TypeDescriptor::Boolean => bool);
impl_scalar!(TypeDescriptor::Integer { bits: 8, signed: true } => i8);
impl_scalar!(TypeDescriptor::Integer { bits: 16, signed: true } => i16);
impl_scalar!(TypeDescriptor::Integer { bits: 32, signed: true } => i32);
impl_scalar!(TypeDescriptor::Integer { bits: 64, signed: true } => i64, isize);
impl_scalar!(TypeDescriptor::Integer { bits: 128, signed: true } => i128);
impl_scalar!(TypeDescriptor::Integer { bits: 8, signed: false } => u8);
impl_scalar!(TypeDescriptor::Integer { bits: 16, signed: false } => u16);
impl_scalar!(TypeDescriptor::Integer { bits: 32, signed: false } => u32);
impl_scalar!(TypeDescriptor::Integer { bits: 64, signed: false } => u64, usize);
impl_scalar!(TypeDescriptor::Integer { bits: 128, signed: false } => u128);
impl_scalar!(TypeDescriptor::Float { bits: 32 } => f32);
impl_scalar!(TypeDescriptor::Float { bits: 64 } => f64);
impl_scalar!(TypeDescriptor::Bytes => axum::body::Bytes);
impl_scalar!(TypeDescriptor::Uuid => uuid::Uuid);
impl_scalar!(TypeDescriptor::Date => NaiveDate);
impl_scalar!(TypeDescriptor::Any => serde_json::Value);
impl_scalar!(TypeDescriptor::Absent => ());

impl<Tz: TimeZone> ApiSchema for DateTime<Tz> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::DateTime { example: sample_timestamp() }
    }
}

impl ApiSchema for NaiveDateTime {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::DateTime { example: sample_timestamp() }
    }
}

impl ApiSchema for std::time::SystemTime {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::DateTime { example: sample_timestamp() }
    }
}

impl<T: ApiSchema> ApiSchema for Option<T> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::Optional(Box::new(T::describe()))
    }
}

impl<T: ApiSchema + ?Sized> ApiSchema for Box<T> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::Optional(Box::new(T::describe()))
    }
}

impl<T: ApiSchema + ?Sized> ApiSchema for Arc<T> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::Optional(Box::new(T::describe()))
    }
}

impl<T: ApiSchema + ?Sized> ApiSchema for &T {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::Optional(Box::new(T::describe()))
    }
}

impl<T: ApiSchema> ApiSchema for Vec<T> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::Sequence(Box::new(T::describe()))
    }
}

impl<T: ApiSchema> ApiSchema for [T] {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::Sequence(Box::new(T::describe()))
    }
}

impl<T: ApiSchema, const N: usize> ApiSchema for [T; N] {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::Sequence(Box::new(T::describe()))
    }
}

impl<K, V: ApiSchema, S> ApiSchema for HashMap<K, V, S> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::Map(Box::new(V::describe()))
    }
}

impl<K, V: ApiSchema> ApiSchema for BTreeMap<K, V> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::Map(Box::new(V::describe()))
    }
}

impl ApiSchema for serde_json::Map<String, serde_json::Value> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::Map(Box::new(TypeDescriptor::Any))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Epoch;

    impl TimeValue for Epoch {
        fn time(&self) -> DateTime<Utc> {
            Utc.timestamp_opt(0, 0).unwrap()
        }
    }

    impl_time_schema!(Epoch);

    #[test]
    fn test_required_rules() {
        let plain = FieldAnnotations::named("id");
        assert!(plain.is_required());

        let omitted = FieldAnnotations {
            omit_empty: true,
            ..FieldAnnotations::named("nick")
        };
        assert!(!omitted.is_required());

        let forced = FieldAnnotations {
            omit_empty: true,
            validate: Some("min=3, required"),
            ..FieldAnnotations::named("email")
        };
        assert!(forced.is_required());
    }

    #[test]
    fn test_wrappers_describe_as_optional() {
        assert!(matches!(Option::<i32>::describe(), TypeDescriptor::Optional(_)));
        assert!(matches!(Box::<String>::describe(), TypeDescriptor::Optional(_)));
        assert!(matches!(Vec::<u8>::describe(), TypeDescriptor::Sequence(inner) if inner.is_byte()));
        assert!(matches!(
            HashMap::<String, f64>::describe(),
            TypeDescriptor::Map(inner) if matches!(*inner, TypeDescriptor::Float { bits: 64 })
        ));
    }

    #[test]
    fn test_time_value_macro() {
        match Epoch::describe() {
            TypeDescriptor::DateTime { example } => assert_eq!(example.timestamp(), 0),
            other => panic!("unexpected descriptor: {:?}", other),
        }
    }
}
