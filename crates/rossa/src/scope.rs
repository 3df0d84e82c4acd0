//! Scopes: lexical environments *and* the runtime representation of
//! objects (§3.3, §4.8, §9).
//!
//! A [`ScopeRef`] is a reference-counted handle to a [`ScopeData`]. The
//! parent link is a *weak* reference (§9 design notes): Scope → bindings
//! hold strong [`Value`]s, captured closures hold a weak pointer back to
//! their defining scope, so the only cycle in the graph (a captured
//! `this` pointing back through a method's closure to the instance that
//! owns the method) is broken without a tracing collector.

use std::cell::RefCell;
use std::collections::hash_map::Entry;
use std::rc::{Rc, Weak};

use ahash::{AHashMap, AHashSet};

use crate::instruction::Instruction;
use crate::intern::{hash, NameId};
use crate::value::Value;

/// The five scope flavors of §3.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// A plain block scope (let/if/while body). Ephemeral.
    Bounded,
    /// A class definition usable as a constructor (`new Foo(...)`).
    Struct,
    /// A class whose body runs once at declaration; no `new`.
    Static,
    /// Produced by `new` on a Struct.
    Instance,
    /// An abstract class: may be extended, never instantiated directly.
    Virtual,
}

struct ScopeData {
    parent: Option<Weak<RefCell<ScopeData>>>,
    kind: ScopeKind,
    /// Class-body layers evaluated on instantiation, oldest ancestor first
    /// (§4.5 `Class`/`New`): `extend_from` prepends the parent's layers so
    /// a subclass instance runs every ancestor's field/method
    /// declarations, in MRO order, before its own. Each layer is the
    /// statement list of one `class` body, shared (not copied) from the
    /// declaring `Class` instruction.
    bodies: Vec<Rc<Vec<Instruction>>>,
    class_name: NameId,
    name_trace: Vec<NameId>,
    extensions: AHashSet<NameId>,
    bindings: AHashMap<NameId, Value>,
    /// Names declared with `:=` (§3.2, §4.8). A binding found here makes
    /// *reads* of it alias rather than deep-copy when used to initialize
    /// another Array/Dictionary binding (invariant 4, §8.1).
    consts: AHashSet<NameId>,
}

thread_local! {
    static REM: NameId = hash("rem");
    static THIS: NameId = hash("this");
}

/// A handle to a [`ScopeData`]. Cloning bumps the strong count; the
/// parent link held internally is always weak.
#[derive(Clone)]
pub struct ScopeRef(Rc<RefCell<ScopeData>>);

impl ScopeRef {
    #[must_use]
    pub fn new(kind: ScopeKind, parent: Option<&ScopeRef>, class_name: NameId) -> Self {
        let name_trace = parent.map(ScopeRef::name_trace_for_child).unwrap_or_default();
        ScopeRef(Rc::new(RefCell::new(ScopeData {
            parent: parent.map(|p| Rc::downgrade(&p.0)),
            kind,
            bodies: Vec::new(),
            class_name,
            name_trace,
            extensions: AHashSet::new(),
            bindings: AHashMap::new(),
            consts: AHashSet::new(),
        })))
    }

    fn name_trace_for_child(parent: &ScopeRef) -> Vec<NameId> {
        let mut trace = parent.0.borrow().name_trace.clone();
        trace.push(parent.0.borrow().class_name);
        trace
    }

    #[must_use]
    pub fn root() -> Self {
        ScopeRef::new(ScopeKind::Bounded, None, NameId::from_index(0))
    }

    #[must_use]
    pub fn kind(&self) -> ScopeKind {
        self.0.borrow().kind
    }

    #[must_use]
    pub fn class_name(&self) -> NameId {
        self.0.borrow().class_name
    }

    pub fn set_body(&self, body: Rc<Vec<Instruction>>) {
        self.0.borrow_mut().bodies.push(body);
    }

    #[must_use]
    pub fn bodies(&self) -> Vec<Rc<Vec<Instruction>>> {
        self.0.borrow().bodies.clone()
    }

    /// Creates a fresh child scope, its extension list seeded from
    /// `extends` (an existing class Object) and/or a builtin type code
    /// added directly (`Class(name, kind, body, extends?)`, §4.5).
    #[must_use]
    pub fn child(&self, kind: ScopeKind, class_name: NameId) -> Self {
        ScopeRef::new(kind, Some(self), class_name)
    }

    /// Clones the Struct body into a fresh Instance scope (`new Foo(...)`, §4.5).
    /// The Instance's parent is the Struct's own parent (the defining
    /// scope), not the Struct scope itself — the Struct handle is just a
    /// template.
    #[must_use]
    pub fn instantiate(&self) -> Self {
        let data = self.0.borrow();
        let parent = data.parent.as_ref().and_then(Weak::upgrade).map(ScopeRef);
        let instance = ScopeRef::new(ScopeKind::Instance, parent.as_ref(), data.class_name);
        instance.0.borrow_mut().extensions = data.extensions.clone();
        instance.0.borrow_mut().name_trace = data.name_trace.clone();
        instance.0.borrow_mut().bodies = data.bodies.clone();
        instance
    }

    pub fn add_extension(&self, name: NameId) {
        self.0.borrow_mut().extensions.insert(name);
    }

    /// Folds a parent class's extension list and body layers into this
    /// (still-being-declared) class scope (§4.5 `Class`). Body layers are
    /// prepended so ancestor initialization always runs before the
    /// subclass's own.
    pub fn extend_from(&self, other: &ScopeRef) {
        let mut exts = other.0.borrow().extensions.clone();
        exts.insert(other.class_name());
        self.0.borrow_mut().extensions.extend(exts);
        let mut layers = other.0.borrow().bodies.clone();
        layers.append(&mut self.0.borrow_mut().bodies);
        self.0.borrow_mut().bodies = layers;
    }

    /// `Scope.extends(h)`: true iff `h` is in the extension list (§4.8).
    #[must_use]
    pub fn extends(&self, name: NameId) -> bool {
        self.0.borrow().extensions.contains(&name)
    }

    /// Declares/overwrites a binding in *this* frame only. If an existing
    /// Function binding is replaced by another Function value, the
    /// overload tables merge instead of one replacing the other (§3.4,
    /// §4.8).
    pub fn create_variable(&self, name: NameId, value: Value) {
        let mut data = self.0.borrow_mut();
        match data.bindings.entry(name) {
            Entry::Occupied(mut slot) => {
                if let (Value::Function(existing), Value::Function(incoming)) = (&*slot.get(), &value) {
                    existing.merge_from(incoming);
                } else {
                    slot.insert(value);
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
        }
    }

    /// Declares/overwrites a binding in this frame, recording whether it
    /// was introduced with `:=` (§3.2, §4.8).
    pub fn declare(&self, name: NameId, value: Value, is_const: bool) {
        self.create_variable(name, value);
        let mut data = self.0.borrow_mut();
        if is_const {
            data.consts.insert(name);
        } else {
            data.consts.remove(&name);
        }
    }

    /// Whether `name`'s nearest binding in the chain was declared `:=`.
    #[must_use]
    pub fn is_const(&self, name: NameId) -> bool {
        if self.0.borrow().bindings.contains_key(&name) {
            return self.0.borrow().consts.contains(&name);
        }
        match self.0.borrow().parent.as_ref().and_then(Weak::upgrade) {
            Some(parent) => ScopeRef(parent).is_const(name),
            None => false,
        }
    }

    /// Walks the parent chain looking for `name` (§4.8).
    #[must_use]
    pub fn get_variable(&self, name: NameId) -> Option<Value> {
        if let Some(v) = self.0.borrow().bindings.get(&name) {
            return Some(v.clone());
        }
        let parent = self.0.borrow().parent.as_ref().and_then(Weak::upgrade)?;
        ScopeRef(parent).get_variable(name)
    }

    /// Assignment at statement level: mutate the deepest existing binding
    /// with this name (captured lexical environment), walking up through
    /// parents until found. Returns `false` if no binding exists anywhere.
    #[must_use]
    pub fn set_variable(&self, name: NameId, value: Value) -> bool {
        if self.0.borrow().bindings.contains_key(&name) {
            self.0.borrow_mut().bindings.insert(name, value);
            return true;
        }
        match self.0.borrow().parent.as_ref().and_then(Weak::upgrade) {
            Some(parent) => ScopeRef(parent).set_variable(name, value),
            None => false,
        }
    }

    /// Clears all bindings in this frame. Used between loop iterations and
    /// by creators that want to release bindings early (§3.3).
    pub fn clear(&self) {
        self.0.borrow_mut().bindings.clear();
    }

    /// `this` resolves to the nearest enclosing Instance/Static object
    /// scope (§4.8).
    #[must_use]
    pub fn resolve_this(&self) -> Option<ScopeRef> {
        if matches!(self.kind(), ScopeKind::Instance | ScopeKind::Static) {
            return Some(self.clone());
        }
        let parent = self.0.borrow().parent.as_ref().and_then(Weak::upgrade)?;
        ScopeRef(parent).resolve_this()
    }

    /// `.`-access lookup used by `Inner` (§4.5): looks only in this
    /// scope's own bindings, not the parent chain.
    #[must_use]
    pub fn get_own(&self, name: NameId) -> Option<Value> {
        self.0.borrow().bindings.get(&name).cloned()
    }

    pub fn set_own(&self, name: NameId, value: Value) {
        self.0.borrow_mut().bindings.insert(name, value);
    }

    #[must_use]
    pub fn own_names(&self) -> Vec<NameId> {
        self.0.borrow().bindings.keys().copied().collect()
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &ScopeRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for ScopeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ScopeRef({:?} @ {:p})", self.kind(), Rc::as_ptr(&self.0))
    }
}

/// A weak handle to a scope. [`crate::function::Overload::defining_scope`]
/// holds one of these rather than a [`ScopeRef`] so a closure captured by a
/// method does not keep its own defining instance alive forever (§9 design
/// notes, the captured-`this` cycle).
#[derive(Clone)]
pub struct ScopeWeak(Weak<RefCell<ScopeData>>);

impl ScopeWeak {
    #[must_use]
    pub fn upgrade(&self) -> Option<ScopeRef> {
        self.0.upgrade().map(ScopeRef)
    }
}

impl std::fmt::Debug for ScopeWeak {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ScopeWeak({})", if self.0.strong_count() > 0 { "live" } else { "dead" })
    }
}

impl ScopeRef {
    #[must_use]
    pub fn downgrade(&self) -> ScopeWeak {
        ScopeWeak(Rc::downgrade(&self.0))
    }
}

/// Deleters (`rem`) run exactly once, when the last strong reference to
/// an object's scope drops (§3.3, §5, invariant 6 of §8.1).
///
/// The trick: `Drop::drop` runs *before* the `Rc` field itself is
/// actually deallocated, so `Rc::strong_count` is still `1` (this handle)
/// at the moment we check. If a deleter exists we temporarily clone the
/// `Rc` to hand the deleter a genuine `ScopeRef` for `this` — that bumps
/// the count to 2, so when the temporary clone is dropped at the end of
/// the call it goes back to 1, not 0, and this `Drop` impl is not
/// re-entered.
impl Drop for ScopeRef {
    fn drop(&mut self) {
        if Rc::strong_count(&self.0) != 1 {
            return;
        }
        let deleter = REM.with(|rem| self.0.borrow().bindings.get(rem).cloned());
        if let Some(Value::Function(f)) = deleter {
            let this = ScopeRef(self.0.clone());
            let _ = crate::eval::invoke_deleter(&f, this);
        }
    }
}

#[must_use]
pub fn this_name() -> NameId {
    THIS.with(|t| *t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::hash;

    #[test]
    fn child_inherits_lookup_through_parent() {
        let root = ScopeRef::root();
        root.create_variable(hash("x"), Value::Number(crate::number::Number::Integer(1)));
        let child = root.child(ScopeKind::Bounded, NameId::from_index(0));
        assert!(child.get_variable(hash("x")).is_some());
    }

    #[test]
    fn set_variable_mutates_the_defining_frame() {
        let root = ScopeRef::root();
        root.create_variable(hash("y"), Value::Number(crate::number::Number::Integer(1)));
        let child = root.child(ScopeKind::Bounded, NameId::from_index(0));
        assert!(child.set_variable(hash("y"), Value::Number(crate::number::Number::Integer(2))));
        assert!(child.get_own(hash("y")).is_none());
        match root.get_variable(hash("y")) {
            Some(Value::Number(n)) => assert_eq!(n, crate::number::Number::Integer(2)),
            _ => panic!("expected updated binding on root"),
        }
    }

    #[test]
    fn loop_hygiene_clear_removes_iteration_bindings() {
        let scope = ScopeRef::root();
        scope.create_variable(hash("temp"), Value::Nil);
        scope.clear();
        assert!(scope.get_own(hash("temp")).is_none());
    }
}
