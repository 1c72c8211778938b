//! Builtin functions and libraries available to every scope

use super::runtime::{
    host_op, runtime_error, ActionList, RuntimeState, ALERT, BUILD, DISMISS, FIND, PIN, RUN_ACTIONS,
    SCHEDULE, STYLE,
};
use super::scope::Builtins;
use super::value::{display, widget_of};
use crate::dsl;
use crate::renderer::WidgetKind;
use mlua::{Function, Lua, Table, Value, Variadic};
use std::rc::Rc;
use std::sync::Arc;

/// Base functions copied from the Lua standard library
const BASE: &[&str] = &[
    "assert", "error", "getmetatable", "ipairs", "next", "pairs", "pcall", "rawequal", "rawget",
    "rawlen", "rawset", "select", "setmetatable", "tonumber", "tostring", "type", "xpcall",
];

const STRING: &[&str] = &[
    "byte", "char", "find", "format", "gmatch", "gsub", "len", "lower", "match", "rep", "reverse",
    "sub", "upper",
];

const TABLE: &[&str] = &["concat", "insert", "remove", "sort", "unpack"];

const MATH: &[&str] = &[
    "abs", "ceil", "cos", "deg", "exp", "floor", "fmod", "huge", "log", "max", "maxinteger", "min",
    "mininteger", "modf", "pi", "rad", "random", "sin", "sqrt", "tan", "tointeger", "type", "ult",
];

const OS: &[&str] = &["clock", "date", "difftime", "time"];

const READ_ONLY: &str = r#"
local lib = ...
return setmetatable({}, {
    __index = lib,
    __newindex = function() error("attempt to modify a read-only table", 2) end,
    __pairs = function() return next, lib, nil end,
    __len = function() return #lib end,
    __metatable = false,
})
"#;

/// Build the session builtins inside `lua`
pub(crate) fn install(lua: &Lua, state: &Rc<RuntimeState>) -> mlua::Result<Builtins> {
    let mut builtins = Builtins::new();
    let globals = lua.globals();
    let read_only = lua.load(READ_ONLY).set_name("=read_only").into_function()?;

    for name in BASE {
        builtins.define(*name, globals.get::<Value>(*name)?);
    }
    builtins.define("unpack", globals.get::<Table>("table")?.get::<Value>("unpack")?);
    builtins.define(
        "print",
        Value::Function(lua.create_function(|_, args: Variadic<Value>| {
            let line: Vec<String> = args.iter().map(display).collect();
            log::info!("[script] {}", line.join("\t"));
            Ok(())
        })?),
    );

    for (name, members) in [("string", STRING), ("table", TABLE), ("math", MATH), ("os", OS)] {
        let source: Table = globals.get(name)?;
        let copy = lua.create_table()?;
        for member in members {
            copy.set(*member, source.get::<Value>(*member)?)?;
        }
        builtins.define(name, read_only.call::<Value>(copy)?);
    }

    let current = state.clone();
    builtins.define(
        "on_change",
        Value::Function(lua.create_function(move |_, (name, listener): (String, Function)| {
            current.current()?.on_change(&name, Value::Function(listener));
            Ok(())
        })?),
    );
    builtins.define(
        "find",
        Value::Function(lua.create_function(|lua, (selector, all): (String, Option<bool>)| {
            host_op(lua, FIND)?.call::<Value>((selector, all.unwrap_or(false)))
        })?),
    );
    builtins.define(
        "style",
        Value::Function(lua.create_function(|lua, (widget, property, value): (Value, String, Value)| {
            let widget = widget_of(&widget).ok_or_else(|| {
                runtime_error(format!(
                    "bad argument #1 to 'style' (widget expected, got {})",
                    widget.type_name()
                ))
            })?;
            host_op(lua, STYLE)?.call::<()>((widget.index(), property, value))
        })?),
    );
    builtins.define(
        "timeout",
        Value::Function(lua.create_function(|lua, (callback, millis): (Function, Option<f64>)| {
            host_op(lua, SCHEDULE)?.call::<()>((callback, millis.unwrap_or(0.0)))
        })?),
    );
    builtins.define("chocl", Value::Function(chocl(lua, state.clone())?));
    builtins.define("alert", Value::Function(lua.create_function(alert)?));
    builtins.define("confirm", Value::Function(lua.create_function(confirm)?));
    builtins.define("prompt", Value::Function(lua.create_function(prompt)?));

    let factory = lua.create_table()?;
    for kind in WidgetKind::ALL {
        factory.set(
            kind.name(),
            lua.create_function(move |lua, spec: Option<Table>| {
                let spec = match spec {
                    Some(spec) => spec,
                    None => lua.create_table()?,
                };
                host_op(lua, BUILD)?.call::<Value>((kind.name(), spec))
            })?,
        )?;
    }
    builtins.define("w", read_only.call::<Value>(factory)?);

    Ok(builtins)
}

/// `chocl(descriptor)` compiles an action descriptor into a callable that
/// runs it on behalf of a widget (the argument, or the defining widget)
fn chocl(lua: &Lua, state: Rc<RuntimeState>) -> mlua::Result<Function> {
    lua.create_function(move |lua, descriptor: String| {
        let actions = dsl::compile(&descriptor).map_err(|e| runtime_error(e.to_string()))?;
        let actions = Arc::new(actions);
        let owner = state.current()?.widget();

        lua.create_function(move |lua, caller: Option<Value>| {
            let caller = caller
                .as_ref()
                .and_then(widget_of)
                .or(owner)
                .ok_or_else(|| runtime_error("no widget to run actions for"))?;
            host_op(lua, RUN_ACTIONS)?.call::<()>((ActionList(actions.clone()), caller.index()))?;
            Ok(true)
        })
    })
}

fn alert(lua: &Lua, message: Value) -> mlua::Result<()> {
    let text = display(&message);
    host_op(lua, ALERT)?.call::<()>(text.clone())?;

    let body = make(lua, WidgetKind::Text, |spec| {
        spec.set(1, text)?;
        spec.set("groups", "body")
    })?;
    let close = button(lua, "Close", dismisser(lua, None)?)?;
    dialogue(lua, vec![body], vec![close])
}

fn confirm(lua: &Lua, (title, body, callback): (String, String, Function)) -> mlua::Result<()> {
    let heading = heading(lua, title)?;
    let body = make(lua, WidgetKind::Text, |spec| {
        spec.set(1, body)?;
        spec.set("groups", "body")
    })?;
    let accept = button(lua, "Confirm", dismisser(lua, Some((callback.clone(), Value::Boolean(true))))?)?;
    let deny = button(lua, "Deny", dismisser(lua, Some((callback, Value::Boolean(false))))?)?;
    dialogue(lua, vec![heading, body], vec![accept, deny])
}

fn prompt(lua: &Lua, (title, widgets, callback): (String, Table, Function)) -> mlua::Result<()> {
    let heading = heading(lua, title)?;
    let body = make(lua, WidgetKind::Tower, |spec| {
        for widget in widgets.clone().sequence_values::<Value>() {
            spec.push(widget?)?;
        }
        spec.set("groups", "body")
    })?;
    let submit = button(lua, "Submit", dismisser(lua, Some((callback, body.clone())))?)?;
    dialogue(lua, vec![heading, body], vec![submit])
}

fn make(lua: &Lua, kind: WidgetKind, fill: impl FnOnce(&Table) -> mlua::Result<()>) -> mlua::Result<Value> {
    let spec = lua.create_table()?;
    fill(&spec)?;
    host_op(lua, BUILD)?.call::<Value>((kind.name(), spec))
}

fn heading(lua: &Lua, title: String) -> mlua::Result<Value> {
    make(lua, WidgetKind::Text, |spec| {
        spec.set(1, title)?;
        spec.set("groups", "title")
    })
}

fn button(lua: &Lua, label: &str, on_submit: Function) -> mlua::Result<Value> {
    make(lua, WidgetKind::Button, |spec| {
        spec.set(1, label)?;
        spec.set("on_submit", on_submit)
    })
}

/// Submit handler that runs the dialogue callback, then closes the dialogue
fn dismisser(lua: &Lua, callback: Option<(Function, Value)>) -> mlua::Result<Function> {
    lua.create_function(move |lua, button: Value| {
        let button = widget_of(&button)
            .ok_or_else(|| runtime_error("dialogue button called without its widget"))?;
        if let Some((callback, argument)) = &callback {
            callback.call::<()>(argument.clone())?;
        }
        host_op(lua, DISMISS)?.call::<()>(button.index())?;
        Ok(false)
    })
}

/// Assemble and pin a dialogue
fn dialogue(lua: &Lua, content: Vec<Value>, buttons: Vec<Value>) -> mlua::Result<()> {
    let input = make(lua, WidgetKind::Row, |spec| {
        for button in buttons {
            spec.push(button)?;
        }
        spec.set("groups", "input")
    })?;
    let dialogue = make(lua, WidgetKind::Dialogue, |spec| {
        for widget in content {
            spec.push(widget)?;
        }
        spec.push(input)
    })?;
    let id = widget_of(&dialogue).ok_or_else(|| runtime_error("dialogue was not built"))?;
    host_op(lua, PIN)?.call::<()>(id.index())
}
