//! prefcache Core - Value Types
//!
//! Pure data structures with no behavior. All other crates depend on this.
//! This crate contains ONLY data types, conversions and validation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

mod config;
mod error;

pub use config::StoreConfig;
pub use error::{ConfigError, PrefError, PrefResult, StorageError, StorageResult};

// ============================================================================
// RESERVED KEYS
// ============================================================================

/// Key holding the last persisted schema version of a preference set.
///
/// Consumers must not read or write it through the typed accessors.
pub const VERSION_KEY: &str = "file_version";

/// Version assumed for a store that has never recorded one.
pub const DEFAULT_VERSION: i32 = 1;

/// Returns true if `key` collides with a reserved key.
pub fn is_reserved_key(key: &str) -> bool {
    key == VERSION_KEY
}

// ============================================================================
// VALUE TYPES
// ============================================================================

/// Set-of-text payload. Ordered so encodings are stable.
pub type TextSet = BTreeSet<String>;

/// Discriminant of a [`PrefValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrefKind {
    Bool,
    Int,
    Long,
    Float,
    Text,
    TextSet,
}

/// A single preference value. The set of kinds is closed.
///
/// Floats are encoded and compared by bit pattern, so NaN and the
/// infinities are stored like any other value and a NaN equals itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PrefValue {
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(#[serde(with = "float_bits")] f32),
    Text(String),
    TextSet(TextSet),
}

impl PartialEq for PrefValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PrefValue::Bool(a), PrefValue::Bool(b)) => a == b,
            (PrefValue::Int(a), PrefValue::Int(b)) => a == b,
            (PrefValue::Long(a), PrefValue::Long(b)) => a == b,
            (PrefValue::Float(a), PrefValue::Float(b)) => a.to_bits() == b.to_bits(),
            (PrefValue::Text(a), PrefValue::Text(b)) => a == b,
            (PrefValue::TextSet(a), PrefValue::TextSet(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for PrefValue {}

/// Serde helper writing an `f32` as its IEEE-754 bits.
mod float_bits {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f32, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(value.to_bits())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f32, D::Error> {
        u32::deserialize(deserializer).map(f32::from_bits)
    }
}

impl PrefValue {
    /// Kind of this value.
    pub fn kind(&self) -> PrefKind {
        match self {
            PrefValue::Bool(_) => PrefKind::Bool,
            PrefValue::Int(_) => PrefKind::Int,
            PrefValue::Long(_) => PrefKind::Long,
            PrefValue::Float(_) => PrefKind::Float,
            PrefValue::Text(_) => PrefKind::Text,
            PrefValue::TextSet(_) => PrefKind::TextSet,
        }
    }

    /// Extract as `T`, or `None` if the kinds differ.
    pub fn get<T: PrefType>(&self) -> Option<T> {
        T::from_value(self)
    }
}

/// Rust types that can be stored as a preference.
pub trait PrefType: Sized {
    /// Kind this type is stored as.
    const KIND: PrefKind;

    /// Extract from a value of the matching kind.
    fn from_value(value: &PrefValue) -> Option<Self>;

    /// Wrap into a value.
    fn into_value(self) -> PrefValue;
}

macro_rules! impl_pref_type {
    ($ty:ty, $variant:ident) => {
        impl PrefType for $ty {
            const KIND: PrefKind = PrefKind::$variant;

            fn from_value(value: &PrefValue) -> Option<Self> {
                match value {
                    PrefValue::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }

            fn into_value(self) -> PrefValue {
                PrefValue::$variant(self)
            }
        }

        impl From<$ty> for PrefValue {
            fn from(v: $ty) -> Self {
                PrefValue::$variant(v)
            }
        }
    };
}

impl_pref_type!(bool, Bool);
impl_pref_type!(i32, Int);
impl_pref_type!(i64, Long);
impl_pref_type!(f32, Float);
impl_pref_type!(String, Text);
impl_pref_type!(TextSet, TextSet);

impl From<&str> for PrefValue {
    fn from(v: &str) -> Self {
        PrefValue::Text(v.to_string())
    }
}

// ============================================================================
// TESTS
// ============================================================================


// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn any_value() -> impl Strategy<Value = PrefValue> {
        prop_oneof![
            any::<bool>().prop_map(PrefValue::Bool),
            any::<i32>().prop_map(PrefValue::Int),
            any::<i64>().prop_map(PrefValue::Long),
            any::<f32>().prop_map(PrefValue::Float),
            ".{0,16}".prop_map(PrefValue::Text),
            proptest::collection::btree_set(".{0,8}", 0..4).prop_map(PrefValue::TextSet),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Exactly one typed extraction succeeds for any value.
        #[test]
        fn prop_single_kind_extracts(value in any_value()) {
            let hits = [
                value.get::<bool>().is_some(),
                value.get::<i32>().is_some(),
                value.get::<i64>().is_some(),
                value.get::<f32>().is_some(),
                value.get::<String>().is_some(),
                value.get::<TextSet>().is_some(),
            ];
            prop_assert_eq!(hits.iter().filter(|h| **h).count(), 1);
        }

        /// JSON encoding preserves kind and payload.
        #[test]
        fn prop_json_preserves_value(value in any_value()) {
            let bytes = serde_json::to_vec(&value).unwrap();
            let decoded: PrefValue = serde_json::from_slice(&bytes).unwrap();
            prop_assert_eq!(decoded.kind(), value.kind());
            prop_assert_eq!(decoded, value);
        }
    }
}
