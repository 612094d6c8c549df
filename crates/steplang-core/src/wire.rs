//! The wire representation of runtime values, and its decode side.
//!
//! Runtime values cross the isolation boundary as [`WireValue`] trees: a
//! JSON-safe, text-storable encoding produced by the harness-side encoder.
//! Cycles are broken with integer-id back-references, callables and host
//! values become opaque markers, and anything that defeats structural
//! encoding degrades to a raw string form.
//!
//! [`decode`] reconstructs a [`DisplayValue`] for interactive inspection on
//! the host side. Decoding never resurrects the opaque classes: a function
//! marker decodes to a placeholder, not a callable, and a back-reference
//! decodes to a distinct cycle marker rather than an alias of the
//! referenced node.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire-encoded runtime value.
///
/// `Array` and `Object` nodes carry the identity id assigned during
/// encoding; a `Ref` node points back at one of those ids to mark a cyclic
/// (or shared) occurrence. Ids are unique within one encoded tree only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WireValue {
    Null,
    Bool {
        value: bool,
    },
    /// A finite number. Non-finite numbers encode as [`WireValue::Opaque`]
    /// so the wire form stays valid JSON.
    Num {
        value: f64,
    },
    Str {
        value: String,
    },
    Array {
        id: u32,
        items: Vec<WireValue>,
    },
    Object {
        id: u32,
        entries: IndexMap<String, WireValue>,
    },
    /// Back-reference to an already-encoded container in the same tree.
    Ref {
        id: u32,
    },
    /// A callable value, reduced to its display name.
    Function {
        name: String,
    },
    /// A host or otherwise non-structural value: a type tag plus a display
    /// string (e.g. `number` / `"NaN"`).
    Opaque {
        type_tag: String,
        display: String,
    },
    /// A declared-but-uninitialized binding.
    Uninit,
    /// String fallback for values that defeated structural encoding.
    Raw {
        display: String,
    },
}

/// A decoded value suitable for rendering and inspection.
///
/// Opaque wire markers decode to placeholder variants; they do not
/// reconstruct the original runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayValue {
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    Array { id: u32, items: Vec<DisplayValue> },
    Object {
        id: u32,
        entries: IndexMap<String, DisplayValue>,
    },
    /// A cyclic back-reference, rendered as `<ref #id>`.
    CycleRef { id: u32 },
    Function { name: String },
    Opaque { type_tag: String, display: String },
    Uninit,
    Raw(String),
}

/// Decodes a wire value into its display form. Never fails.
pub fn decode(wire: &WireValue) -> DisplayValue {
    match wire {
        WireValue::Null => DisplayValue::Null,
        WireValue::Bool { value } => DisplayValue::Bool(*value),
        WireValue::Num { value } => DisplayValue::Num(*value),
        WireValue::Str { value } => DisplayValue::Str(value.clone()),
        WireValue::Array { id, items } => DisplayValue::Array {
            id: *id,
            items: items.iter().map(decode).collect(),
        },
        WireValue::Object { id, entries } => DisplayValue::Object {
            id: *id,
            entries: entries
                .iter()
                .map(|(k, v)| (k.clone(), decode(v)))
                .collect(),
        },
        WireValue::Ref { id } => DisplayValue::CycleRef { id: *id },
        WireValue::Function { name } => DisplayValue::Function { name: name.clone() },
        WireValue::Opaque { type_tag, display } => DisplayValue::Opaque {
            type_tag: type_tag.clone(),
            display: display.clone(),
        },
        WireValue::Uninit => DisplayValue::Uninit,
        WireValue::Raw { display } => DisplayValue::Raw(display.clone()),
    }
}

impl DisplayValue {
    /// Converts the JSON-safe subset back to a plain JSON value.
    ///
    /// Returns `None` when the value contains anything outside that subset
    /// (functions, opaque markers, cycles, uninitialized bindings).
    pub fn as_json(&self) -> Option<serde_json::Value> {
        match self {
            DisplayValue::Null => Some(serde_json::Value::Null),
            DisplayValue::Bool(b) => Some(serde_json::Value::Bool(*b)),
            DisplayValue::Num(n) => serde_json::Number::from_f64(*n).map(serde_json::Value::Number),
            DisplayValue::Str(s) => Some(serde_json::Value::String(s.clone())),
            DisplayValue::Array { items, .. } => items
                .iter()
                .map(DisplayValue::as_json)
                .collect::<Option<Vec<_>>>()
                .map(serde_json::Value::Array),
            DisplayValue::Object { entries, .. } => entries
                .iter()
                .map(|(k, v)| v.as_json().map(|v| (k.clone(), v)))
                .collect::<Option<serde_json::Map<_, _>>>()
                .map(serde_json::Value::Object),
            _ => None,
        }
    }
}

impl fmt::Display for DisplayValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayValue::Null => f.write_str("null"),
            DisplayValue::Bool(b) => write!(f, "{}", b),
            DisplayValue::Num(n) => write!(f, "{}", n),
            DisplayValue::Str(s) => write!(f, "{:?}", s),
            DisplayValue::Array { items, .. } => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            DisplayValue::Object { entries, .. } => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                f.write_str("}")
            }
            DisplayValue::CycleRef { id } => write!(f, "<ref #{}>", id),
            DisplayValue::Function { name } => write!(f, "<function {}>", name),
            DisplayValue::Opaque { display, .. } => f.write_str(display),
            DisplayValue::Uninit => f.write_str("<uninitialized>"),
            DisplayValue::Raw(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arr(id: u32, items: Vec<WireValue>) -> WireValue {
        WireValue::Array { id, items }
    }

    #[test]
    fn decode_primitives() {
        assert_eq!(decode(&WireValue::Null), DisplayValue::Null);
        assert_eq!(decode(&WireValue::Bool { value: true }), DisplayValue::Bool(true));
        assert_eq!(decode(&WireValue::Num { value: 1.5 }), DisplayValue::Num(1.5));
    }

    #[test]
    fn decode_back_reference_is_distinct_marker() {
        let wire = arr(0, vec![WireValue::Ref { id: 0 }]);
        match decode(&wire) {
            DisplayValue::Array { items, .. } => {
                assert_eq!(items, vec![DisplayValue::CycleRef { id: 0 }]);
            }
            other => panic!("expected array, got {:?}", other),
        }
    }

    #[test]
    fn decode_function_is_placeholder() {
        let wire = WireValue::Function { name: "fib".into() };
        assert_eq!(
            decode(&wire),
            DisplayValue::Function { name: "fib".into() }
        );
    }

    #[test]
    fn display_rendering() {
        let mut entries = IndexMap::new();
        entries.insert("a".to_string(), WireValue::Num { value: 1.0 });
        entries.insert("b".to_string(), WireValue::Str { value: "x".into() });
        let wire = WireValue::Object { id: 0, entries };
        assert_eq!(decode(&wire).to_string(), "{a: 1, b: \"x\"}");
        assert_eq!(decode(&WireValue::Uninit).to_string(), "<uninitialized>");
    }

    #[test]
    fn as_json_rejects_opaque() {
        let wire = arr(0, vec![WireValue::Function { name: "f".into() }]);
        assert!(decode(&wire).as_json().is_none());
    }

    #[test]
    fn as_json_preserves_entry_order() {
        let mut entries = IndexMap::new();
        entries.insert("z".to_string(), WireValue::Num { value: 1.0 });
        entries.insert("a".to_string(), WireValue::Num { value: 2.0 });
        let json = decode(&WireValue::Object { id: 0, entries })
            .as_json()
            .unwrap();
        let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a"]);
    }

    #[test]
    fn serde_wire_tagging() {
        let json = serde_json::to_value(WireValue::Num { value: 3.0 }).unwrap();
        assert_eq!(json["kind"], "num");
        assert_eq!(json["value"], 3.0);

        let json = serde_json::to_value(WireValue::Uninit).unwrap();
        assert_eq!(json["kind"], "uninit");
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// Strategy producing arbitrary wire trees (without Ref consistency --
    /// the text round-trip property doesn't depend on it).
    fn wire_strategy() -> impl Strategy<Value = WireValue> {
        let leaf = prop_oneof![
            Just(WireValue::Null),
            any::<bool>().prop_map(|value| WireValue::Bool { value }),
            (-1.0e9..1.0e9f64).prop_map(|value| WireValue::Num { value }),
            "[a-z]{0,8}".prop_map(|value| WireValue::Str { value }),
            Just(WireValue::Uninit),
            "[a-z]{1,8}".prop_map(|name| WireValue::Function { name }),
        ];
        leaf.prop_recursive(4, 32, 4, |inner| {
            prop_oneof![
                (any::<u32>(), prop::collection::vec(inner.clone(), 0..4))
                    .prop_map(|(id, items)| WireValue::Array { id, items }),
                (
                    any::<u32>(),
                    prop::collection::vec(("[a-z]{1,6}", inner), 0..4)
                )
                    .prop_map(|(id, pairs)| {
                        let entries: IndexMap<String, WireValue> = pairs.into_iter().collect();
                        WireValue::Object { id, entries }
                    }),
            ]
        })
    }

    proptest! {
        /// Wire values must be safe to store as text: serializing to JSON
        /// and back yields the same tree.
        #[test]
        fn wire_text_roundtrip(wire in wire_strategy()) {
            let text = serde_json::to_string(&wire).unwrap();
            let back: WireValue = serde_json::from_str(&text).unwrap();
            prop_assert_eq!(wire, back);
        }
    }
}
