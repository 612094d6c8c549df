//! Lexical environments.
//!
//! Environments form a parent chain: one frame per block, function call, or
//! `for` header, plus the hidden root frame holding builtins and the
//! reporting namespace. Bindings keep declaration order (`IndexMap`) so
//! scope snapshots render stably in the viewer.
//!
//! `let` and `function` declarations are hoisted to their block's entry in
//! an [`Binding::Uninitialized`] state; reading one before its declaration
//! statement runs is a `ReferenceError`, and snapshots show it as a
//! distinct uninitialized marker rather than omitting it.

use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::Rc;

use super::value::Value;

/// Shared handle to an environment frame.
pub type EnvRef = Rc<RefCell<Environment>>;

/// The state of one binding.
#[derive(Debug, Clone)]
pub enum Binding {
    /// Declared (hoisted) but not yet initialized.
    Uninitialized,
    /// Initialized to a value.
    Init(Value),
}

/// One lexical scope frame.
pub struct Environment {
    bindings: IndexMap<String, Binding>,
    parent: Option<EnvRef>,
    /// Hidden frames (the builtin root) are skipped by scope snapshots.
    hidden: bool,
}

impl Environment {
    /// Creates the hidden root frame.
    pub fn root() -> EnvRef {
        Rc::new(RefCell::new(Environment {
            bindings: IndexMap::new(),
            parent: None,
            hidden: true,
        }))
    }

    /// Creates a child frame of `parent`.
    pub fn child(parent: &EnvRef) -> EnvRef {
        Rc::new(RefCell::new(Environment {
            bindings: IndexMap::new(),
            parent: Some(Rc::clone(parent)),
            hidden: false,
        }))
    }

    /// Declares `name` in this frame as uninitialized (hoisting).
    /// Redeclaration in the same frame resets the binding.
    pub fn declare(&mut self, name: &str) {
        self.bindings
            .insert(name.to_string(), Binding::Uninitialized);
    }

    /// Defines `name` in this frame with a value.
    pub fn define(&mut self, name: &str, value: Value) {
        self.bindings.insert(name.to_string(), Binding::Init(value));
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn parent(&self) -> Option<EnvRef> {
        self.parent.clone()
    }

    /// Iterates this frame's bindings in declaration order.
    pub fn bindings(&self) -> impl Iterator<Item = (&String, &Binding)> {
        self.bindings.iter()
    }
}

/// Looks `name` up through the chain, innermost frame first.
///
/// Returns the binding state of the nearest declaration, or `None` when the
/// name is unbound everywhere.
pub fn lookup(env: &EnvRef, name: &str) -> Option<Binding> {
    let mut current = Some(Rc::clone(env));
    while let Some(frame) = current {
        let frame = frame.borrow();
        if let Some(binding) = frame.bindings.get(name) {
            return Some(binding.clone());
        }
        current = frame.parent.clone();
    }
    None
}

/// Assigns to the nearest declaration of `name`. Returns `false` when the
/// name is unbound everywhere (the caller raises a `ReferenceError`;
/// assignment never creates implicit globals).
pub fn assign(env: &EnvRef, name: &str, value: Value) -> bool {
    let mut current = Some(Rc::clone(env));
    while let Some(frame) = current {
        let mut frame = frame.borrow_mut();
        if frame.bindings.contains_key(name) {
            frame.bindings.insert(name.to_string(), Binding::Init(value));
            return true;
        }
        current = frame.parent.clone();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_the_chain() {
        let root = Environment::root();
        let outer = Environment::child(&root);
        outer.borrow_mut().define("x", Value::Num(1.0));
        let inner = Environment::child(&outer);

        match lookup(&inner, "x") {
            Some(Binding::Init(Value::Num(n))) => assert_eq!(n, 1.0),
            other => panic!("expected init binding, got {:?}", other),
        }
        assert!(lookup(&inner, "missing").is_none());
    }

    #[test]
    fn inner_declaration_shadows_outer() {
        let root = Environment::root();
        let outer = Environment::child(&root);
        outer.borrow_mut().define("x", Value::Num(1.0));
        let inner = Environment::child(&outer);
        inner.borrow_mut().define("x", Value::Num(2.0));

        match lookup(&inner, "x") {
            Some(Binding::Init(Value::Num(n))) => assert_eq!(n, 2.0),
            _ => panic!("expected shadowing binding"),
        }
    }

    #[test]
    fn assign_targets_nearest_declaration() {
        let root = Environment::root();
        let outer = Environment::child(&root);
        outer.borrow_mut().define("x", Value::Num(1.0));
        let inner = Environment::child(&outer);

        assert!(assign(&inner, "x", Value::Num(5.0)));
        match lookup(&outer, "x") {
            Some(Binding::Init(Value::Num(n))) => assert_eq!(n, 5.0),
            _ => panic!("expected outer binding updated"),
        }
        assert!(!assign(&inner, "nope", Value::Null));
    }

    #[test]
    fn hoisted_binding_is_distinct_from_unbound() {
        let root = Environment::root();
        let env = Environment::child(&root);
        env.borrow_mut().declare("later");
        assert!(matches!(
            lookup(&env, "later"),
            Some(Binding::Uninitialized)
        ));
    }
}
