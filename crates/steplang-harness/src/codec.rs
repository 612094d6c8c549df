//! Encode side of the value codec: runtime values to wire values.
//!
//! Encoding walks the value graph with an identity-keyed visited map
//! (container pointer -> assigned integer id); a container seen a second
//! time -- cyclic or merely shared -- becomes a back-reference marker
//! instead of recursing. Identity, not structural equality, is what breaks
//! cycles: two structurally equal arrays are two nodes, the same array
//! twice is one node and one `Ref`.
//!
//! `encode` never fails. Non-finite numbers become opaque number
//! descriptors (keeping the wire form JSON-clean), callables become named
//! function markers, and a container whose storage is unavailable (already
//! mutably borrowed at snapshot time) degrades to a raw string fallback.
//! Degradation is a diagnostic event only, logged at `debug`; it is never
//! surfaced to the caller as an error.

use std::collections::HashMap;
use std::rc::Rc;

use steplang_core::step::ScopeFrame;
use steplang_core::wire::{decode, WireValue};

use crate::interpreter::env::{Binding, EnvRef};
use crate::interpreter::value::Value;

/// Encodes one runtime value into its wire form.
pub fn encode(value: &Value) -> WireValue {
    Encoder::default().encode(value)
}

/// Renders a runtime value for messages and the `str(..)` builtin.
/// Cycle-safe because it goes through the codec.
pub fn display(value: &Value) -> String {
    match value {
        // Top-level strings render raw (no quotes), like string coercion.
        Value::Str(s) => s.clone(),
        other => decode(&encode(other)).to_string(),
    }
}

/// Snapshots the scope chain visible from `env`, innermost frame first,
/// skipping the hidden builtin root. Reads stored values only: no script
/// code runs during capture. Uninitialized (hoisted) bindings encode as the
/// distinct uninitialized marker rather than being omitted.
pub fn snapshot_scopes(env: &EnvRef) -> Vec<ScopeFrame> {
    let mut frames = Vec::new();
    let mut current = Some(Rc::clone(env));
    while let Some(frame_ref) = current {
        let frame = frame_ref.borrow();
        if !frame.is_hidden() {
            let mut snapshot = ScopeFrame::new();
            for (name, binding) in frame.bindings() {
                let wire = match binding {
                    Binding::Uninitialized => WireValue::Uninit,
                    Binding::Init(value) => encode(value),
                };
                snapshot.insert(name.clone(), wire);
            }
            frames.push(snapshot);
        }
        current = frame.parent();
    }
    frames
}

#[derive(Default)]
struct Encoder {
    /// Container identity -> assigned id.
    seen: HashMap<usize, u32>,
    next_id: u32,
}

impl Encoder {
    fn encode(&mut self, value: &Value) -> WireValue {
        match value {
            Value::Null => WireValue::Null,
            Value::Bool(b) => WireValue::Bool { value: *b },
            Value::Num(n) if n.is_finite() => WireValue::Num { value: *n },
            Value::Num(n) => WireValue::Opaque {
                type_tag: "number".to_string(),
                display: render_nonfinite(*n),
            },
            Value::Str(s) => WireValue::Str { value: s.clone() },
            Value::Array(cells) => {
                let key = Rc::as_ptr(cells) as usize;
                if let Some(&id) = self.seen.get(&key) {
                    return WireValue::Ref { id };
                }
                let id = self.assign(key);
                match cells.try_borrow() {
                    Ok(items) => WireValue::Array {
                        id,
                        items: items.iter().map(|item| self.encode(item)).collect(),
                    },
                    Err(_) => degrade("array"),
                }
            }
            Value::Object(cells) => {
                let key = Rc::as_ptr(cells) as usize;
                if let Some(&id) = self.seen.get(&key) {
                    return WireValue::Ref { id };
                }
                let id = self.assign(key);
                match cells.try_borrow() {
                    Ok(entries) => WireValue::Object {
                        id,
                        entries: entries
                            .iter()
                            .map(|(k, v)| (k.clone(), self.encode(v)))
                            .collect(),
                    },
                    Err(_) => degrade("object"),
                }
            }
            Value::Function(func) => WireValue::Function {
                name: func
                    .name
                    .clone()
                    .unwrap_or_else(|| "anonymous".to_string()),
            },
            Value::Builtin(builtin) => WireValue::Function {
                name: builtin.name().to_string(),
            },
        }
    }

    fn assign(&mut self, key: usize) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.seen.insert(key, id);
        id
    }
}

fn render_nonfinite(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n > 0.0 {
        "Infinity".to_string()
    } else {
        "-Infinity".to_string()
    }
}

/// String fallback for a container whose storage was unavailable.
fn degrade(what: &str) -> WireValue {
    tracing::debug!(container = what, "value defeated structural encoding");
    WireValue::Raw {
        display: format!("<{}>", what),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use steplang_core::DisplayValue;

    #[test]
    fn primitives_pass_through() {
        assert_eq!(encode(&Value::Null), WireValue::Null);
        assert_eq!(encode(&Value::Num(1.5)), WireValue::Num { value: 1.5 });
        assert_eq!(
            encode(&Value::Str("hi".into())),
            WireValue::Str { value: "hi".into() }
        );
    }

    #[test]
    fn nonfinite_numbers_become_opaque() {
        match encode(&Value::Num(f64::NAN)) {
            WireValue::Opaque { type_tag, display } => {
                assert_eq!(type_tag, "number");
                assert_eq!(display, "NaN");
            }
            other => panic!("expected opaque, got {:?}", other),
        }
        match encode(&Value::Num(f64::NEG_INFINITY)) {
            WireValue::Opaque { display, .. } => assert_eq!(display, "-Infinity"),
            other => panic!("expected opaque, got {:?}", other),
        }
    }

    #[test]
    fn self_referential_array_encodes_as_back_reference() {
        let arr = Value::array(vec![Value::Num(1.0)]);
        if let Value::Array(cells) = &arr {
            cells.borrow_mut().push(arr.clone());
        }
        // Must terminate and mark the cycle.
        match encode(&arr) {
            WireValue::Array { id, items } => {
                assert_eq!(items[0], WireValue::Num { value: 1.0 });
                assert_eq!(items[1], WireValue::Ref { id });
            }
            other => panic!("expected array, got {:?}", other),
        }
    }

    #[test]
    fn shared_container_uses_identity_not_structure() {
        let shared = Value::array(vec![Value::Num(1.0)]);
        let twin = Value::array(vec![Value::Num(1.0)]);
        let outer = Value::array(vec![shared.clone(), shared, twin]);
        match encode(&outer) {
            WireValue::Array { items, .. } => {
                // Same identity -> Ref; equal structure, different identity
                // -> its own node.
                let first_id = match &items[0] {
                    WireValue::Array { id, .. } => *id,
                    other => panic!("expected array, got {:?}", other),
                };
                assert_eq!(items[1], WireValue::Ref { id: first_id });
                assert!(matches!(&items[2], WireValue::Array { id, .. } if *id != first_id));
            }
            other => panic!("expected array, got {:?}", other),
        }
    }

    #[test]
    fn functions_become_named_markers() {
        assert_eq!(
            encode(&Value::Builtin(crate::interpreter::value::Builtin::Log)),
            WireValue::Function { name: "log".into() }
        );
    }

    #[test]
    fn object_entry_order_preserved() {
        let mut entries = IndexMap::new();
        entries.insert("z".to_string(), Value::Num(1.0));
        entries.insert("a".to_string(), Value::Num(2.0));
        match encode(&Value::object(entries)) {
            WireValue::Object { entries, .. } => {
                let keys: Vec<_> = entries.keys().cloned().collect();
                assert_eq!(keys, vec!["z", "a"]);
            }
            other => panic!("expected object, got {:?}", other),
        }
    }

    #[test]
    fn cyclic_value_decodes_to_cycle_marker() {
        let arr = Value::array(Vec::new());
        if let Value::Array(cells) = &arr {
            cells.borrow_mut().push(arr.clone());
        }
        match decode(&encode(&arr)) {
            DisplayValue::Array { id, items } => {
                assert_eq!(items[0], DisplayValue::CycleRef { id });
            }
            other => panic!("expected array, got {:?}", other),
        }
    }

    #[test]
    fn display_is_cycle_safe() {
        let arr = Value::array(Vec::new());
        if let Value::Array(cells) = &arr {
            cells.borrow_mut().push(arr.clone());
        }
        assert_eq!(display(&arr), "[<ref #0>]");
    }

    #[test]
    fn display_of_string_is_raw() {
        assert_eq!(display(&Value::Str("hi".into())), "hi");
        assert_eq!(display(&Value::Num(3.0)), "3");
    }
}
