//! Embedded Lua runtime
//!
//! One [`ScriptRuntime`] serves a whole session. Chunks and handlers run
//! with a scope proxy as their `_ENV`, so global reads and writes go through
//! the widget's [`ScopeEnv`](super::ScopeEnv). Builtins that touch the
//! session reach it through the host operations installed by
//! [`ScriptRuntime::enter`], which only live for the duration of one call
//! into Lua.

use super::builtins;
use super::scope::{Builtins, ScopeHandle, ScopeRef};
use super::value::{display, to_attr, to_style, to_words, widget_field, WidgetRef};
use crate::dsl::{self, Instruction, DESCRIPTOR_PREFIX};
use crate::markup::StyleValue;
use crate::renderer::{AttrValue, EventBinding, Selector, Widget, WidgetId, WidgetKind, WidgetTree};
use crate::utils::error::{ScriptError, SelectionError};
use mlua::{AnyUserData, Function, IntoLua, IntoLuaMulti, Lua, Table, UserData, Value};
use regex::Regex;
use std::cell::{RefCell, RefMut};
use std::rc::Rc;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Chunk name shown in Lua error positions
const CHUNK_NAME: &str = "celx";

/// Registry slot holding the host operations of the active call
const HOST_OPS: &str = "celx.host";

pub(crate) const GET_FIELD: &str = "get";
pub(crate) const SET_FIELD: &str = "set";
pub(crate) const FIND: &str = "find";
pub(crate) const ALERT: &str = "alert";
pub(crate) const STYLE: &str = "style";
pub(crate) const SCHEDULE: &str = "schedule";
pub(crate) const RUN_ACTIONS: &str = "run";
pub(crate) const BUILD: &str = "build";
pub(crate) const PIN: &str = "pin";
pub(crate) const DISMISS: &str = "dismiss";
pub(crate) const APPEND: &str = "append";

/// What scripts may do to the session
pub trait ScriptHost {
    /// The live widget tree
    fn tree(&self) -> &WidgetTree;

    /// Write a widget field (`content`, an attribute, ...)
    fn set_widget_field(&mut self, widget: WidgetId, field: &str, value: &Value)
    -> Result<(), ScriptError>;

    /// Record a message shown to the user
    fn alert(&mut self, message: &str);

    /// Start an action-DSL run on behalf of `caller`
    fn run_actions(&mut self, actions: Arc<Vec<Instruction>>, caller: WidgetId)
    -> Result<(), ScriptError>;

    /// Override one style property of a widget
    fn set_style(&mut self, widget: WidgetId, property: &str, value: StyleValue)
    -> Result<(), ScriptError>;

    /// Call `callback` in `scope` once `delay` has passed
    fn schedule(&mut self, delay: Duration, callback: Function, scope: ScopeRef)
    -> Result<(), ScriptError>;

    /// Construct a detached widget
    fn build_widget(&mut self, spec: WidgetSpec) -> Result<WidgetId, ScriptError>;

    /// Show a widget above the document
    fn pin(&mut self, widget: WidgetId) -> Result<(), ScriptError>;

    /// Remove the pinned widget holding `widget`
    fn dismiss(&mut self, widget: WidgetId) -> Result<(), ScriptError>;

    /// Move `child` to the end of `parent`'s children
    fn append_child(&mut self, parent: WidgetId, child: WidgetId) -> Result<(), ScriptError>;

    /// Widgets of the document matching a selector
    fn find(&self, selector: &str) -> Result<Vec<WidgetId>, ScriptError> {
        let selector = Selector::parse(selector).map_err(|e| ScriptError::new(e.to_string()))?;
        let tree = self.tree();
        Ok(tree.find_all(&selector, &tree.layers()))
    }
}

/// A widget described by a script, as passed to `w.<Kind>{...}`
pub struct WidgetSpec {
    pub kind: WidgetKind,
    pub content: Option<String>,
    pub eid: Option<String>,
    pub groups: Vec<String>,
    pub attributes: Vec<(String, AttrValue)>,
    pub children: Vec<WidgetId>,
    pub handlers: Vec<(String, EventBinding)>,
}

impl WidgetSpec {
    pub fn new(kind: WidgetKind) -> Self {
        Self {
            kind,
            content: None,
            eid: None,
            groups: Vec::new(),
            attributes: Vec::new(),
            children: Vec::new(),
            handlers: Vec::new(),
        }
    }

    /// Read a spec table.
    ///
    /// Positional widgets become children and positional text becomes the
    /// content. `on_*`/`pre_*` keys holding a function or a `:` descriptor
    /// become event bindings; other keys are attributes.
    pub fn from_table(kind: WidgetKind, table: &Table) -> Result<Self, ScriptError> {
        let mut spec = Self::new(kind);

        for item in table.clone().sequence_values::<Value>() {
            let item = item?;
            match super::value::widget_of(&item) {
                Some(child) => spec.children.push(child),
                None => spec.content.get_or_insert_with(String::new).push_str(&display(&item)),
            }
        }

        for pair in table.clone().pairs::<Value, Value>() {
            let (key, value) = pair?;
            let Value::String(key) = key else {
                continue;
            };
            let key = String::from(key.to_string_lossy());

            match (key.as_str(), &value) {
                ("eid", _) => spec.eid = Some(display(&value)),
                ("groups", _) => spec.groups = to_words(&value)?,
                ("content", _) => spec.content = Some(display(&value)),
                (name, Value::Function(handler)) if super::is_event_name(name) => {
                    spec.handlers.push((key.clone(), EventBinding::Script(handler.clone())));
                }
                (name, Value::String(text)) if super::is_event_name(name) && text.to_string_lossy().starts_with(DESCRIPTOR_PREFIX) => {
                    let text = String::from(text.to_string_lossy());
                    let actions = dsl::compile(&text[DESCRIPTOR_PREFIX.len_utf8()..])
                        .map_err(|e| ScriptError::new(e.to_string()))?;
                    spec.handlers.push((key.clone(), EventBinding::Actions(Arc::new(actions))));
                }
                (name, _) => {
                    let attr = to_attr(&value).ok_or_else(|| {
                        ScriptError::new(format!(
                            "cannot store a {} value in attribute '{}'",
                            value.type_name(),
                            name
                        ))
                    })?;
                    spec.attributes.push((key.clone(), attr));
                }
            }
        }

        Ok(spec)
    }

    /// Construct the widget and adopt its children
    pub fn build(self, tree: &mut WidgetTree) -> Result<WidgetId, SelectionError> {
        let mut widget = Widget::new(self.kind);
        widget.set_eid(self.eid);
        widget.set_groups(self.groups);
        widget.set_content(self.content);
        for (name, value) in self.attributes {
            widget.set_attribute(name, Some(value));
        }
        for (event, binding) in self.handlers {
            widget.bind(event, binding);
        }

        let id = tree.construct(widget);
        for child in self.children {
            if let Err(err) = tree.append(id, child) {
                tree.remove(id);
                return Err(err);
            }
        }
        Ok(id)
    }
}

/// A compiled action list travelling through Lua
pub(crate) struct ActionList(pub Arc<Vec<Instruction>>);

impl UserData for ActionList {}

/// Bookkeeping shared with the builtins
#[derive(Default)]
pub(crate) struct RuntimeState {
    entered: RefCell<Vec<ScopeRef>>,
}

impl RuntimeState {
    /// Scope of the innermost call into Lua
    pub fn current(&self) -> mlua::Result<ScopeRef> {
        self.entered
            .borrow()
            .last()
            .cloned()
            .ok_or_else(|| runtime_error("called outside of any scope"))
    }
}

/// The session's Lua state
pub struct ScriptRuntime {
    lua: Lua,
    builtins: Rc<Builtins>,
    make_env: Function,
    state: Rc<RuntimeState>,
}

impl ScriptRuntime {
    pub fn new() -> Result<Self, ScriptError> {
        let lua = Lua::new();
        let state = Rc::new(RuntimeState::default());
        let builtins = Rc::new(builtins::install(&lua, &state)?);
        let make_env = lua
            .load("local scope = ... return setmetatable({}, { __index = scope, __newindex = scope })")
            .set_name("=env")
            .into_function()?;

        Ok(Self {
            lua,
            builtins,
            make_env,
            state,
        })
    }

    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    /// Values every root scope falls back to
    pub fn builtins(&self) -> &Rc<Builtins> {
        &self.builtins
    }

    /// Script handle to a widget
    pub fn widget(&self, id: WidgetId) -> Result<Value, ScriptError> {
        Ok(WidgetRef(id).into_lua(&self.lua)?)
    }

    /// Run a chunk with `scope` as its environment
    pub fn exec(&self, host: &mut dyn ScriptHost, scope: &ScopeRef, source: &str) -> Result<(), ScriptError> {
        let env: Table = self.make_env.call(ScopeHandle::new(scope))?;
        self.enter(host, scope, |lua| {
            lua.load(source)
                .set_name(format!("={}", CHUNK_NAME))
                .set_environment(env)
                .exec()
        })
    }

    /// Call a function on behalf of `scope`; returns its first result
    pub fn call(
        &self,
        host: &mut dyn ScriptHost,
        scope: &ScopeRef,
        func: &Function,
        args: impl IntoLuaMulti,
    ) -> Result<Value, ScriptError> {
        self.enter(host, scope, |_| func.call::<Value>(args))
    }

    /// Run `body` with the host operations installed
    fn enter<R>(
        &self,
        host: &mut dyn ScriptHost,
        scope: &ScopeRef,
        body: impl FnOnce(&Lua) -> mlua::Result<R>,
    ) -> Result<R, ScriptError> {
        let host = RefCell::new(host);
        let previous: Value = self.lua.named_registry_value(HOST_OPS)?;
        self.state.entered.borrow_mut().push(scope.clone());

        let outcome = self.lua.scope(|lua_scope| {
            let ops = self.lua.create_table()?;

            ops.set(
                GET_FIELD,
                lua_scope.create_function(|_, (id, field): (usize, String)| {
                    let host = borrow(&host)?;
                    widget_field(host.tree(), WidgetId(id), &field).map_err(lua_error)
                })?,
            )?;
            ops.set(
                SET_FIELD,
                lua_scope.create_function(|_, (id, field, value): (usize, String, Value)| {
                    borrow(&host)?
                        .set_widget_field(WidgetId(id), &field, &value)
                        .map_err(lua_error)
                })?,
            )?;
            ops.set(
                FIND,
                lua_scope.create_function(|lua, (selector, all): (String, bool)| {
                    let found = borrow(&host)?.find(&selector).map_err(lua_error)?;
                    if all {
                        return lua
                            .create_sequence_from(found.into_iter().map(WidgetRef))
                            .map(Value::Table);
                    }
                    match found.first() {
                        Some(id) => WidgetRef(*id).into_lua(lua),
                        None => Ok(Value::Nil),
                    }
                })?,
            )?;
            ops.set(
                ALERT,
                lua_scope.create_function(|_, message: String| {
                    borrow(&host)?.alert(&message);
                    Ok(())
                })?,
            )?;
            ops.set(
                STYLE,
                lua_scope.create_function(|_, (id, property, value): (usize, String, Value)| {
                    borrow(&host)?
                        .set_style(WidgetId(id), &property, to_style(&value))
                        .map_err(lua_error)
                })?,
            )?;
            ops.set(
                SCHEDULE,
                lua_scope.create_function(|_, (callback, millis): (Function, f64)| {
                    let scope = self.state.current()?;
                    let delay = Duration::from_secs_f64(millis.max(0.0) / 1000.0);
                    borrow(&host)?
                        .schedule(delay, callback, scope)
                        .map_err(lua_error)
                })?,
            )?;
            ops.set(
                RUN_ACTIONS,
                lua_scope.create_function(|_, (actions, caller): (AnyUserData, usize)| {
                    let actions = actions.borrow::<ActionList>()?.0.clone();
                    borrow(&host)?
                        .run_actions(actions, WidgetId(caller))
                        .map_err(lua_error)
                })?,
            )?;
            ops.set(
                BUILD,
                lua_scope.create_function(|_, (kind, spec): (String, Table)| {
                    let kind = WidgetKind::from_tag(&kind)
                        .ok_or_else(|| runtime_error(format!("unknown widget kind '{}'", kind)))?;
                    let spec = WidgetSpec::from_table(kind, &spec).map_err(lua_error)?;
                    let id = borrow(&host)?.build_widget(spec).map_err(lua_error)?;
                    Ok(WidgetRef(id))
                })?,
            )?;
            ops.set(
                PIN,
                lua_scope.create_function(|_, id: usize| {
                    borrow(&host)?.pin(WidgetId(id)).map_err(lua_error)
                })?,
            )?;
            ops.set(
                DISMISS,
                lua_scope.create_function(|_, id: usize| {
                    borrow(&host)?.dismiss(WidgetId(id)).map_err(lua_error)
                })?,
            )?;

            ops.set(
                APPEND,
                lua_scope.create_function(|_, (parent, child): (usize, usize)| {
                    borrow(&host)?
                        .append_child(WidgetId(parent), WidgetId(child))
                        .map_err(lua_error)
                })?,
            )?;

            self.lua.set_named_registry_value(HOST_OPS, ops)?;
            body(&self.lua)
        });

        self.state.entered.borrow_mut().pop();
        self.lua.set_named_registry_value(HOST_OPS, previous)?;
        Ok(outcome?)
    }
}

type HostCell<'a, 'h> = RefCell<&'a mut (dyn ScriptHost + 'h)>;

fn borrow<'c, 'a, 'h>(host: &'c HostCell<'a, 'h>) -> mlua::Result<RefMut<'c, &'a mut (dyn ScriptHost + 'h)>> {
    host.try_borrow_mut()
        .map_err(|_| runtime_error("the session is busy"))
}

/// Host operation `name` of the active call
pub(crate) fn host_op(lua: &Lua, name: &str) -> mlua::Result<Function> {
    let ops: Option<Table> = lua.named_registry_value(HOST_OPS)?;
    let ops = ops.ok_or_else(|| runtime_error("no session to run against"))?;
    ops.get::<Function>(name)
}

pub(crate) fn runtime_error(message: impl Into<String>) -> mlua::Error {
    mlua::Error::RuntimeError(message.into())
}

pub(crate) fn lua_error(err: ScriptError) -> mlua::Error {
    mlua::Error::RuntimeError(err.message)
}

fn chunk_position() -> &'static Regex {
    static POSITION: OnceLock<Regex> = OnceLock::new();
    POSITION.get_or_init(|| {
        Regex::new(r"(?s)^celx:(\d+): (.*)$").expect("position pattern is valid")
    })
}

fn root_message(err: &mlua::Error) -> String {
    match err {
        mlua::Error::CallbackError { cause, .. } => root_message(cause),
        mlua::Error::RuntimeError(message) => message.clone(),
        mlua::Error::SyntaxError { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

impl From<mlua::Error> for ScriptError {
    fn from(err: mlua::Error) -> Self {
        let message = root_message(&err);
        let message = match message.find("\nstack traceback:") {
            Some(end) => message[..end].to_string(),
            None => message,
        };

        let position = chunk_position().captures(&message).and_then(|captures| {
            let line = captures.get(1)?.as_str().parse::<usize>().ok()?;
            Some((line, captures.get(2)?.as_str().to_string()))
        });
        match position {
            Some((line, text)) => ScriptError::at(line, text),
            None => ScriptError::new(message),
        }
    }
}
