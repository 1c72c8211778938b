//! Layered scope environments
//!
//! Every compiled widget owns one [`ScopeEnv`]. Scopes chain to the scope of
//! the nearest ancestor widget, and the root chains to the session builtins.
//! Lua code sees a scope through a [`ScopeHandle`], whose `__index` and
//! `__newindex` land in [`ScopeEnv::get`] and [`ScopeEnv::assign`].

use super::value::is_callable;
use crate::renderer::WidgetId;
use mlua::{IntoLua, MetaMethod, UserData, UserDataMethods, Value};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Shared handle to a scope
pub type ScopeRef = Rc<ScopeEnv>;

static NEXT_SCOPE_ID: AtomicUsize = AtomicUsize::new(1);

/// Read-only values visible from every scope
#[derive(Default)]
pub struct Builtins {
    values: BTreeMap<String, Value>,
}

impl Builtins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.values.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

/// A committed write that may need to notify listeners
#[derive(Debug, Clone)]
pub struct Change {
    /// Scope that holds the binding
    pub owner: ScopeRef,
    pub name: String,
    pub old: Value,
    pub new: Value,
}

impl Change {
    /// Call every interested listener with `(new, old)`
    pub fn notify(&self) -> mlua::Result<()> {
        for (scope, listener) in ScopeEnv::listeners_for(self) {
            log::debug!("change of '{}' notifies listener in scope {}", self.name, scope.id());
            if let Value::Function(listener) = listener {
                listener.call::<()>((self.new.clone(), self.old.clone()))?;
            }
        }
        Ok(())
    }
}

/// Name → value bindings of one widget
pub struct ScopeEnv {
    id: usize,
    bindings: RefCell<Vec<(String, Value)>>,
    parent: Option<ScopeRef>,
    builtins: Rc<Builtins>,
    listeners: RefCell<Vec<(String, Value)>>,
    children: RefCell<Vec<Weak<ScopeEnv>>>,
    widget: Cell<Option<WidgetId>>,
}

impl std::fmt::Debug for ScopeEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeEnv")
            .field("id", &self.id)
            .field("widget", &self.widget.get())
            .field(
                "bindings",
                &self
                    .bindings
                    .borrow()
                    .iter()
                    .map(|(name, _)| name.clone())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl ScopeEnv {
    /// A scope with no parent, backed by the builtins
    pub fn root(builtins: Rc<Builtins>) -> ScopeRef {
        Rc::new(Self::with_parent(None, builtins))
    }

    /// A scope chained to `parent`
    pub fn child(parent: &ScopeRef) -> ScopeRef {
        let scope = Rc::new(Self::with_parent(
            Some(parent.clone()),
            parent.builtins.clone(),
        ));
        parent.adopt(&scope);
        scope
    }

    fn with_parent(parent: Option<ScopeRef>, builtins: Rc<Builtins>) -> Self {
        Self {
            id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
            bindings: RefCell::new(Vec::new()),
            parent,
            builtins,
            listeners: RefCell::new(Vec::new()),
            children: RefCell::new(Vec::new()),
            widget: Cell::new(None),
        }
    }

    fn adopt(&self, child: &ScopeRef) {
        let mut children = self.children.borrow_mut();
        children.retain(|weak| weak.strong_count() > 0);
        children.push(Rc::downgrade(child));
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn parent(&self) -> Option<&ScopeRef> {
        self.parent.as_ref()
    }

    pub fn builtins(&self) -> &Rc<Builtins> {
        &self.builtins
    }

    /// Widget owning this scope
    pub fn widget(&self) -> Option<WidgetId> {
        self.widget.get()
    }

    pub fn set_widget(&self, widget: WidgetId) {
        self.widget.set(Some(widget));
    }

    /// Live child scopes
    pub fn children(&self) -> Vec<ScopeRef> {
        self.children
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// Read a name: local, then ancestors, then builtins
    pub fn get(&self, name: &str) -> Option<Value> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if let Some(value) = current.get_own(name) {
                return Some(value);
            }
            scope = current.parent.as_deref();
        }

        self.builtins.get(name)
    }

    pub fn get_own(&self, name: &str) -> Option<Value> {
        self.bindings
            .borrow()
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    }

    pub fn has_own(&self, name: &str) -> bool {
        self.bindings.borrow().iter().any(|(key, _)| key == name)
    }

    /// Own bindings in definition order
    pub fn own_bindings(&self) -> Vec<(String, Value)> {
        self.bindings.borrow().clone()
    }

    /// Create or update a binding in this scope
    pub fn define(self: &Rc<Self>, name: &str, value: Value) -> Option<Change> {
        self.commit(self, name, value)
    }

    /// Write a name.
    ///
    /// Updates the local binding if there is one; otherwise the nearest
    /// ancestor binding of that name when it is not callable; otherwise a
    /// local binding is created. Builtins are shadowed, never written.
    pub fn assign(self: &Rc<Self>, name: &str, value: Value) -> Option<Change> {
        let owner = self.resolve_owner(name);
        self.commit(&owner, name, value)
    }

    fn resolve_owner(self: &Rc<Self>, name: &str) -> ScopeRef {
        if self.has_own(name) {
            return self.clone();
        }

        let mut ancestor = self.parent.clone();
        while let Some(scope) = ancestor {
            if let Some(existing) = scope.get_own(name) {
                if is_callable(&existing) {
                    break;
                }
                return scope;
            }
            ancestor = scope.parent.clone();
        }

        self.clone()
    }

    fn commit(&self, owner: &ScopeRef, name: &str, value: Value) -> Option<Change> {
        let old = owner.get_own(name).unwrap_or(Value::Nil);

        {
            let mut bindings = owner.bindings.borrow_mut();
            let slot = bindings.iter().position(|(key, _)| key == name);
            match (slot, value.is_nil()) {
                (Some(idx), true) => {
                    bindings.remove(idx);
                }
                (Some(idx), false) => bindings[idx].1 = value.clone(),
                (None, true) => {}
                (None, false) => bindings.push((name.to_string(), value.clone())),
            }
        }

        if old == value {
            return None;
        }

        Some(Change {
            owner: owner.clone(),
            name: name.to_string(),
            old,
            new: value,
        })
    }

    /// Register a change listener for `name` on this scope
    pub fn on_change(&self, name: &str, listener: Value) {
        self.listeners
            .borrow_mut()
            .push((name.to_string(), listener));
    }

    fn own_listeners(&self, name: &str) -> Vec<Value> {
        self.listeners
            .borrow()
            .iter()
            .filter(|(key, _)| key == name)
            .map(|(_, listener)| listener.clone())
            .collect()
    }

    /// Listeners to notify for a change, each paired with the scope it was
    /// registered on: the owner's, then those of every descendant that does
    /// not shadow the name, parents before children.
    pub fn listeners_for(change: &Change) -> Vec<(ScopeRef, Value)> {
        let mut found = Vec::new();
        let mut pending = vec![change.owner.clone()];

        while let Some(scope) = pending.pop() {
            for listener in scope.own_listeners(&change.name) {
                found.push((scope.clone(), listener));
            }

            let mut children = scope.children();
            children.retain(|child| !child.has_own(&change.name));
            children.reverse();
            pending.extend(children);
        }

        found
    }

    /// Callables owned by this scope whose names start with `on` or `pre`
    pub fn event_handlers(&self) -> Vec<(String, Value)> {
        self.bindings
            .borrow()
            .iter()
            .filter(|(name, value)| is_event_name(name) && is_callable(value))
            .cloned()
            .collect()
    }
}

/// Names that bind to widget events
pub fn is_event_name(name: &str) -> bool {
    name.starts_with("on") || name.starts_with("pre")
}

/// A scope as seen from Lua.
///
/// Holds the scope weakly: functions defined in a scope keep their handle
/// alive, and must not keep the scope (and with it the functions) alive.
#[derive(Clone)]
pub struct ScopeHandle(Weak<ScopeEnv>);

impl ScopeHandle {
    pub fn new(scope: &ScopeRef) -> Self {
        Self(Rc::downgrade(scope))
    }

    pub fn scope(&self) -> mlua::Result<ScopeRef> {
        self.0
            .upgrade()
            .ok_or_else(|| mlua::Error::RuntimeError("scope no longer exists".to_string()))
    }
}

impl UserData for ScopeHandle {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        // `outer` names the parent scope
        methods.add_meta_method(MetaMethod::Index, |lua, this, name: String| {
            let scope = this.scope()?;
            if name == "outer" {
                return match scope.parent() {
                    Some(parent) => ScopeHandle::new(parent).into_lua(lua),
                    None => Ok(Value::Nil),
                };
            }
            Ok(scope.get(&name).unwrap_or(Value::Nil))
        });

        methods.add_meta_method(MetaMethod::NewIndex, |_, this, (name, value): (String, Value)| {
            let scope = this.scope()?;
            match scope.assign(&name, value) {
                Some(change) => change.notify(),
                None => Ok(()),
            }
        });

        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| {
            Ok(match this.0.upgrade() {
                Some(scope) => format!("scope: {}", scope.id()),
                None => "scope: <gone>".to_string(),
            })
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlua::Lua;

    fn chain() -> (ScopeRef, ScopeRef, ScopeRef) {
        let root = ScopeEnv::root(Rc::new(Builtins::new()));
        let middle = ScopeEnv::child(&root);
        let leaf = ScopeEnv::child(&middle);
        (root, middle, leaf)
    }

    fn noop(lua: &Lua) -> Value {
        Value::Function(lua.create_function(|_, ()| Ok(())).unwrap())
    }

    #[test]
    fn test_lookup_walks_ancestors_then_builtins() {
        let mut builtins = Builtins::new();
        builtins.define("pi", Value::Number(2.5));
        let root = ScopeEnv::root(Rc::new(builtins));
        let child = ScopeEnv::child(&root);

        root.define("count", Value::Integer(1));
        assert_eq!(child.get("count"), Some(Value::Integer(1)));
        assert_eq!(child.get("pi"), Some(Value::Number(2.5)));
        assert_eq!(child.get("missing"), None);
    }

    #[test]
    fn test_assign_updates_ancestor_binding() {
        let (root, _, leaf) = chain();
        root.define("count", Value::Integer(0));

        let change = leaf.assign("count", Value::Integer(5)).unwrap();
        assert!(Rc::ptr_eq(&change.owner, &root));
        assert_eq!(change.old, Value::Integer(0));
        assert_eq!(root.get_own("count"), Some(Value::Integer(5)));
        assert!(!leaf.has_own("count"));
    }

    #[test]
    fn test_assign_shadows_callable_and_builtin() {
        let lua = Lua::new();
        let mut builtins = Builtins::new();
        builtins.define("print", noop(&lua));
        let root = ScopeEnv::root(Rc::new(builtins));
        let child = ScopeEnv::child(&root);
        root.define("handler", noop(&lua));

        child.assign("handler", Value::Integer(1));
        child.assign("print", Value::Integer(2));
        assert_eq!(child.get_own("handler"), Some(Value::Integer(1)));
        assert!(is_callable(&root.get_own("handler").unwrap()));
        assert_eq!(child.get("print"), Some(Value::Integer(2)));
        assert!(is_callable(&root.get("print").unwrap()));
    }

    #[test]
    fn test_local_binding_wins() {
        let (root, middle, _) = chain();
        root.define("x", Value::Integer(1));
        middle.define("x", Value::Integer(2));
        let change = middle.assign("x", Value::Integer(3)).unwrap();
        assert!(Rc::ptr_eq(&change.owner, &middle));
        assert_eq!(root.get_own("x"), Some(Value::Integer(1)));
    }

    #[test]
    fn test_unchanged_write_has_no_change() {
        let (root, _, _) = chain();
        root.define("x", Value::Integer(1));
        assert!(root.assign("x", Value::Integer(1)).is_none());
    }

    #[test]
    fn test_nil_removes_binding() {
        let (root, _, _) = chain();
        root.define("x", Value::Integer(1));
        assert!(root.assign("x", Value::Nil).is_some());
        assert!(!root.has_own("x"));
    }

    #[test]
    fn test_listeners_skip_shadowing_descendants() {
        let lua = Lua::new();
        let (root, middle, leaf) = chain();
        let sibling = ScopeEnv::child(&root);

        root.define("count", Value::Integer(0));
        middle.define("count", Value::Integer(10));
        root.on_change("count", noop(&lua));
        middle.on_change("count", noop(&lua));
        leaf.on_change("count", noop(&lua));
        sibling.on_change("count", noop(&lua));

        let change = root.assign("count", Value::Integer(1)).unwrap();
        let notified: Vec<usize> = ScopeEnv::listeners_for(&change)
            .iter()
            .map(|(scope, _)| scope.id())
            .collect();

        assert_eq!(notified, vec![root.id(), sibling.id()]);
    }

    #[test]
    fn test_event_handlers_only_callables() {
        let lua = Lua::new();
        let (root, _, _) = chain();
        root.define("on_press", noop(&lua));
        root.define("one", Value::Integer(1));
        root.define("onward", Value::Integer(2));

        let handlers = root.event_handlers();
        assert_eq!(handlers.len(), 1);
        assert_eq!(handlers[0].0, "on_press");
    }

    #[test]
    fn test_handle_reads_and_writes_through_scope() {
        let lua = Lua::new();
        let (root, middle, _) = chain();
        root.define("count", Value::Integer(1));

        let env: mlua::Table = lua
            .load("local scope = ... return setmetatable({}, { __index = scope, __newindex = scope })")
            .call(ScopeHandle::new(&middle))
            .unwrap();
        lua.load("count = count + 1; fresh = outer.count * 10")
            .set_environment(env)
            .exec()
            .unwrap();

        assert_eq!(root.get_own("count"), Some(Value::Integer(2)));
        assert_eq!(middle.get_own("fresh"), Some(Value::Integer(20)));
    }

    #[test]
    fn test_handle_outlived_by_scope_errors() {
        let scope = ScopeEnv::root(Rc::new(Builtins::new()));
        let handle = ScopeHandle::new(&scope);
        drop(scope);
        assert!(handle.scope().is_err());
    }
}
