//! Browsing session
//!
//! The [`Browser`] owns the widget tree, the rule book, the component
//! registry and every script scope. It lives on one thread; remote calls and
//! instruction lists run on workers that ship their tree work back through
//! [`OwnerHandle`]s, which the owner drains in [`Browser::pump`] and
//! [`Browser::run_until_idle`].
//!
//! Navigation:
//! 1. Fetch the document on a worker and join it
//! 2. Inline every `src` on `style`, `script` and `complib`
//! 3. Compile the page and stage it as the live root
//! 4. Run page scripts, bind widget scopes and apply rules
//! 5. Commit: cancel running lists, drop the old page and its dialogues
//!
//! A failure in steps 3-4 restores the previous page untouched.

mod navigator;
mod page;
mod worker;

pub use navigator::{inline_sources, resolve_endpoint, History};
pub use page::Page;
pub use worker::{OwnerHandle, OwnerTask, RunRegistry, WorkerHost};

use crate::dsl::Instruction;
use crate::markup::{
    compile_fragment, compile_page, CompiledPage, ComponentRegistry, MarkupParser, Node, PropertyMap,
    StyleValue,
};
use crate::network::{NetworkClient, Request, Response, Transport};
use crate::renderer::{
    ComputedStyle, Edit, EventBinding, InterpolatedContent, RuleBook, Selector, WidgetId, WidgetTree,
    DOCUMENT_PRIORITY, SCRIPT_PRIORITY,
};
use crate::script::value::{to_attr, to_words};
use crate::script::{
    display, is_event_name, is_truthy, ScopeEnv, ScopeRef, ScriptHost, ScriptRuntime, WidgetSpec,
};
use crate::utils::error::{CelxError, CompileError, NetworkError, Result, ScriptError, SelectionError};
use crate::utils::BrowserConfig;
use mlua::{Function, IntoLuaMulti, Value};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// How long the owner waits for worker tasks before re-checking timers
const IDLE_POLL: Duration = Duration::from_millis(5);

/// Handler name reported for page scripts and widget script blocks
const SCRIPT_HANDLER: &str = "<script>";

struct Timer {
    due: Instant,
    callback: Function,
    scope: ScopeRef,
}

/// What a page install replaces, kept until the new page is committed
struct Outgoing {
    root: Option<WidgetId>,
    rules: RuleBook,
    document: ScopeRef,
    timers: Vec<Timer>,
    pinned: Vec<WidgetId>,
    loose: usize,
}

/// A browsing session
pub struct Browser {
    config: BrowserConfig,
    transport: Arc<dyn Transport>,
    tree: WidgetTree,
    rules: RuleBook,
    registry: ComponentRegistry,
    runtime: Rc<ScriptRuntime>,
    document: ScopeRef,
    page: Option<Page>,
    history: History,
    current_url: Url,
    title: String,
    generation: Arc<AtomicU64>,
    runs: Arc<RunRegistry>,
    active: Arc<AtomicUsize>,
    sender: Sender<OwnerTask>,
    tasks: Receiver<OwnerTask>,
    /// Fragments waiting for their first placement, by root
    pending: HashMap<WidgetId, Vec<WidgetId>>,
    /// Detached widgets built by scripts
    loose: Vec<WidgetId>,
    /// Lists started while a page is being installed
    deferred: Option<Vec<(Arc<Vec<Instruction>>, WidgetId)>>,
    timers: Vec<Timer>,
    alerts: Vec<String>,
    errors: Vec<CelxError>,
    halted: bool,
}

impl Browser {
    /// Create a session over a transport; nothing is fetched yet
    pub fn new(config: BrowserConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        let current_url = Url::parse(&config.endpoint)
            .map_err(|_| NetworkError::InvalidUrl(config.endpoint.clone()))?;
        let runtime = Rc::new(ScriptRuntime::new()?);
        let document = ScopeEnv::root(runtime.builtins().clone());
        let (sender, tasks) = mpsc::channel();

        Ok(Self {
            history: History::new(config.history_limit),
            title: config.title.clone(),
            config,
            transport,
            tree: WidgetTree::new(),
            rules: RuleBook::new(),
            registry: ComponentRegistry::new(),
            runtime,
            document,
            page: None,
            current_url,
            generation: Arc::new(AtomicU64::new(0)),
            runs: Arc::new(RunRegistry::new()),
            active: Arc::new(AtomicUsize::new(0)),
            sender,
            tasks,
            pending: HashMap::new(),
            loose: Vec::new(),
            deferred: None,
            timers: Vec::new(),
            alerts: Vec::new(),
            errors: Vec::new(),
            halted: false,
        })
    }

    /// Create a session using the HTTP client
    pub fn connect(config: BrowserConfig) -> Result<Self> {
        let client = NetworkClient::new(&config)?;
        Self::new(config, Arc::new(client))
    }

    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }

    pub fn tree(&self) -> &WidgetTree {
        &self.tree
    }

    pub fn rules(&self) -> &RuleBook {
        &self.rules
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn page(&self) -> Option<&Page> {
        self.page.as_ref()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Window title
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn current_url(&self) -> &Url {
        &self.current_url
    }

    /// Scope page scripts run in
    pub fn document_scope(&self) -> &ScopeRef {
        &self.document
    }

    /// Bumped on every page change
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Messages passed to `alert`
    pub fn alerts(&self) -> &[String] {
        &self.alerts
    }

    /// Errors reported to the sink
    pub fn errors(&self) -> &[CelxError] {
        &self.errors
    }

    pub fn take_errors(&mut self) -> Vec<CelxError> {
        std::mem::take(&mut self.errors)
    }

    /// Whether interaction stopped after an error
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Instruction lists still running
    pub fn running(&self) -> usize {
        self.runs.len()
    }

    /// Dialogues shown above the document
    pub fn dialogues(&self) -> &[WidgetId] {
        self.tree.pinned()
    }

    /// Fragments loaded but not yet placed
    pub fn pending_fragments(&self) -> usize {
        self.pending.len()
    }

    /// First widget of the document or its dialogues matching `selector`
    pub fn find(&self, selector: &str) -> Result<Option<WidgetId>> {
        Ok(self.select(selector, None)?.into_iter().next())
    }

    /// Resting style of a widget
    pub fn style_of(&self, widget: WidgetId) -> ComputedStyle {
        self.rules.compute(&self.tree, widget)
    }

    /// Text outline of the document
    pub fn outline(&self) -> Result<String> {
        match self.tree.root() {
            Some(root) => self.tree.outline(root),
            None => Ok(String::new()),
        }
    }

    /// Navigate to `destination`
    pub fn route(&mut self, destination: &str, suppress_history: bool) -> Result<()> {
        if !suppress_history {
            self.history.push(destination);
        }

        let url = resolve_endpoint(&self.current_url, destination)?;
        log::info!("routing to {}", url);

        let response = self.fetch_document(&url)?;
        let mut document = MarkupParser::parse(response.body())?;
        inline_sources(&mut document, &mut |src| {
            let resource = resolve_endpoint(&url, src)?;
            self.fetch_document(&resource).map(Response::into_body)
        })?;

        self.install_page(url, &document)
    }

    /// Go one step back in history
    pub fn back(&mut self) -> Result<()> {
        match self.history.back().map(str::to_string) {
            Some(destination) => self.route(&destination, true),
            None => Ok(()),
        }
    }

    /// Go one step forward in history
    pub fn forward(&mut self) -> Result<()> {
        match self.history.forward().map(str::to_string) {
            Some(destination) => self.route(&destination, true),
            None => Ok(()),
        }
    }

    /// Reload the current URL
    pub fn refresh(&mut self) -> Result<()> {
        let current = self.current_url.to_string();
        self.route(&current, true)
    }

    /// GET a document or resource on a worker and wait for it
    fn fetch_document(&self, url: &Url) -> Result<Response> {
        let response = worker::fetch_joined(&self.transport, Request::get(url.as_str())?)?;
        if !response.is_success() {
            return Err(NetworkError::Http {
                status: response.status(),
                url: response.url().to_string(),
            }
            .into());
        }
        Ok(response)
    }

    /// Replace the shown page with a compiled document
    fn install_page(&mut self, url: Url, document: &Node) -> Result<()> {
        let compiled = compile_page(document, &mut self.registry, &mut self.tree)?;
        let outgoing = self.stage_page(compiled.content.as_ref().map(|content| content.root));

        match self.run_page(&compiled) {
            Ok(()) => {
                self.commit_page(outgoing, url, compiled);
                log::info!("showing '{}' ({} widgets)", self.title, self.tree.len());
                Ok(())
            }
            Err(err) => {
                self.rollback_page(outgoing);
                log::warn!("{} failed to load, keeping '{}'", url, self.title);
                Err(err)
            }
        }
    }

    /// Show `root` with a fresh document scope, keeping the old page aside
    fn stage_page(&mut self, root: Option<WidgetId>) -> Outgoing {
        let document = ScopeEnv::root(self.runtime.builtins().clone());
        let outgoing = Outgoing {
            root: self.tree.take_root(),
            rules: std::mem::take(&mut self.rules),
            document: std::mem::replace(&mut self.document, document),
            timers: std::mem::take(&mut self.timers),
            pinned: self.tree.pinned().to_vec(),
            loose: self.loose.len(),
        };
        self.tree.set_root(root);
        self.deferred = Some(Vec::new());
        outgoing
    }

    fn run_page(&mut self, compiled: &CompiledPage) -> Result<()> {
        let document_scope = self.document.clone();
        for script in &compiled.scripts {
            self.run_source(script, &document_scope, "Page")?;
        }

        self.rules.apply_map(&compiled.rules, DOCUMENT_PRIORITY)?;
        if let Some(content) = &compiled.content {
            self.bind_scripts(&content.widgets)?;
        }
        Ok(())
    }

    fn commit_page(&mut self, outgoing: Outgoing, url: Url, compiled: CompiledPage) {
        self.cancel_in_flight();

        if let Some(old) = outgoing.root {
            self.tree.remove(old);
        }
        for dialogue in outgoing.pinned {
            self.tree.remove(dialogue);
        }
        let stale: Vec<WidgetId> = self.loose.drain(..outgoing.loose).collect();
        self.drop_loose(stale);

        let title = match compiled.title {
            Some(title) if url.path() != "/" => title,
            _ => self.config.title.clone(),
        };
        self.title = title.clone();
        self.page = Some(Page::new(url.clone(), title, compiled.properties, self.document.clone()));
        self.current_url = url;

        for (actions, caller) in self.deferred.take().unwrap_or_default() {
            self.start_actions(actions, caller);
        }
    }

    fn rollback_page(&mut self, outgoing: Outgoing) {
        self.deferred = None;
        // the first call removes the staged root
        self.tree.set_root(None);
        self.tree.set_root(outgoing.root);
        self.rules = outgoing.rules;
        self.document = outgoing.document;
        self.timers = outgoing.timers;

        for dialogue in self.tree.pinned().to_vec() {
            if !outgoing.pinned.contains(&dialogue) {
                self.tree.remove(dialogue);
            }
        }
        let built = self.loose.split_off(outgoing.loose);
        self.drop_loose(built);
    }

    /// Remove script-built widgets that never got a parent
    fn drop_loose(&mut self, widgets: Vec<WidgetId>) {
        for id in widgets {
            if self.tree.parent(id).is_none() && !self.tree.pinned().contains(&id) {
                self.tree.remove(id);
            }
        }
    }

    /// Invalidate the running lists and unplaced fragments of the page
    fn cancel_in_flight(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let cancelled = self.runs.cancel_all();
        if cancelled > 0 {
            log::debug!("cancelled {} running instruction lists", cancelled);
        }
        for (root, _) in self.pending.drain() {
            self.tree.remove(root);
        }
    }

    /// Create, populate and wire the scopes of freshly placed widgets.
    ///
    /// `widgets` must list parents before children. Every scope chains to the
    /// nearest ancestor scope, or to the document scope.
    fn bind_scripts(&mut self, widgets: &[WidgetId]) -> Result<()> {
        for &id in widgets {
            let parent_scope = self
                .tree
                .ancestors(id)
                .into_iter()
                .find_map(|ancestor| self.tree.get(ancestor).and_then(|w| w.scope().cloned()))
                .unwrap_or_else(|| self.document.clone());

            let scope = ScopeEnv::child(&parent_scope);
            scope.set_widget(id);
            scope.define("self", self.runtime.widget(id)?);

            let widget = self.tree.widget_mut(id)?;
            widget.set_scope(scope.clone());
            widget.set_content_provider(Box::new(InterpolatedContent::new(scope)));
        }

        for &id in widgets {
            let widget = self.tree.widget(id)?;
            let (Some(source), Some(scope)) = (widget.script().map(str::to_string), widget.scope().cloned())
            else {
                continue;
            };
            let query = self.tree.query(id);
            self.run_source(&source, &scope, &query)?;
        }

        // children first, so a parent's init sees initialized children
        for &id in widgets.iter().rev() {
            let widget = self.tree.widget(id)?;
            let Some(scope) = widget.scope().cloned() else {
                continue;
            };
            let source = widget.script().unwrap_or_default().to_string();
            let query = self.tree.query(id);

            for (name, value) in scope.own_bindings() {
                let Value::Function(value) = value else {
                    continue;
                };
                if name == "init" {
                    self.call_handler(&value, (), &scope, "init", &query, &source)?;
                    continue;
                }
                if is_event_name(&name) {
                    if !is_valid_event(&name) {
                        return Err(CompileError::InvalidEventHandler(name).into());
                    }
                    log::debug!("binding {} on {}", name, query);
                    self.tree
                        .widget_mut(id)?
                        .bind(name, EventBinding::Script(value));
                }
            }
        }

        Ok(())
    }

    fn run_source(&mut self, source: &str, scope: &ScopeRef, widget: &str) -> Result<()> {
        let runtime = self.runtime.clone();
        runtime
            .exec(self, scope, source)
            .map_err(|err| err.with_origin(SCRIPT_HANDLER, widget, source).into())
    }

    fn call_handler(
        &mut self,
        func: &Function,
        args: impl IntoLuaMulti,
        scope: &ScopeRef,
        handler: &str,
        widget: &str,
        source: &str,
    ) -> Result<Value> {
        let runtime = self.runtime.clone();
        runtime
            .call(self, scope, func, args)
            .map_err(|err| err.with_origin(handler, widget, source).into())
    }

    /// Scope a widget's handlers run in: its own, the nearest ancestor's, or
    /// the document scope
    fn scope_for(&self, widget: WidgetId) -> ScopeRef {
        std::iter::once(widget)
            .chain(self.tree.ancestors(widget))
            .find_map(|id| self.tree.get(id).and_then(|w| w.scope().cloned()))
            .unwrap_or_else(|| self.document.clone())
    }

    /// Fire `event` on `widget`; returns whether a handler took it
    pub fn dispatch(&mut self, widget: WidgetId, event: &str) -> Result<bool> {
        if self.halted {
            log::warn!("session halted, ignoring {} on {}", event, self.tree.query(widget));
            return Ok(false);
        }

        let binding = self.tree.widget(widget)?.binding(event).cloned();
        log::debug!("dispatch {} on {}", event, self.tree.query(widget));

        match binding {
            None => Ok(false),
            Some(EventBinding::Actions(actions)) => {
                self.start_actions(actions, widget);
                Ok(true)
            }
            Some(EventBinding::Script(handler)) => {
                let scope = self.scope_for(widget);
                let source = self.tree.widget(widget)?.script().unwrap_or_default().to_string();
                let query = self.tree.query(widget);
                let argument = self.runtime.widget(widget)?;
                match self.call_handler(&handler, argument, &scope, event, &query, &source) {
                    Ok(value) => Ok(is_truthy(&value)),
                    Err(err) => {
                        self.report(err);
                        Ok(false)
                    }
                }
            }
        }
    }

    /// Start an instruction list on a worker; returns its run id
    pub fn start_actions(&mut self, actions: Arc<Vec<Instruction>>, caller: WidgetId) -> u64 {
        log::debug!("starting {} instructions for {}", actions.len(), self.tree.query(caller));
        let owner = OwnerHandle::new(self.sender.clone(), self.generation.clone());
        let host = WorkerHost::new(owner, self.transport.clone(), self.current_url.clone());
        worker::spawn_run(host, self.runs.clone(), &self.active, &actions, caller)
    }

    /// Serialized request body: the widget matching `selector`, or the
    /// caller's parent (the caller itself when it has none)
    pub(crate) fn request_body(&self, caller: WidgetId, selector: Option<&str>) -> Result<serde_json::Value> {
        let source = match selector {
            Some(selector) => self
                .find(selector)?
                .ok_or_else(|| SelectionError::NoMatch(selector.to_string()))?,
            None => self.tree.parent(caller).unwrap_or(caller),
        };
        Ok(serde_json::Value::Object(self.tree.serialize(source)))
    }

    /// Compile a response into a detached fragment and apply its rules
    pub(crate) fn load_fragment(&mut self, response: Response) -> Result<WidgetId> {
        let base = Url::parse(response.url()).unwrap_or_else(|_| self.current_url.clone());

        let mut node = if response.is_markup() {
            MarkupParser::parse(response.body())?
        } else {
            Node::new("text").with_text(response.into_body())
        };
        inline_sources(&mut node, &mut |src| {
            let resource = resolve_endpoint(&base, src)?;
            self.fetch_document(&resource).map(Response::into_body)
        })?;

        let compiled = compile_fragment(&node, &mut self.registry, &mut self.tree)?;
        self.rules.apply_map(&compiled.rules, DOCUMENT_PRIORITY)?;
        log::debug!("loaded fragment {}", self.tree.query(compiled.root));
        self.pending.insert(compiled.root, compiled.widgets);
        Ok(compiled.root)
    }

    /// Matches of `selector` among `scope`, or the document and its dialogues
    pub(crate) fn select(&self, selector: &str, scope: Option<&[WidgetId]>) -> Result<Vec<WidgetId>> {
        let selector = Selector::parse(selector)?;
        let roots: Vec<WidgetId> = match scope {
            Some(scope) => scope.to_vec(),
            None => self.tree.layers(),
        };
        Ok(self.tree.find_all(&selector, &roots))
    }

    /// Place a fragment, or the part of one picked by SELECT, binding its
    /// scripts once it is in position. The rest of the fragment is dropped.
    pub(crate) fn apply_edit(&mut self, result: WidgetId, target: WidgetId, edit: Edit) -> Result<()> {
        let fragment = std::iter::once(result)
            .chain(self.tree.ancestors(result))
            .find(|id| self.pending.contains_key(id));
        let placed = self.tree.descendants(result);

        self.tree.place(result, target, edit)?;
        log::debug!("{:?} {} at {}", edit, self.tree.query(result), self.tree.query(target));

        let Some(fragment) = fragment else {
            return Ok(());
        };
        let widgets: Vec<WidgetId> = self
            .pending
            .remove(&fragment)
            .unwrap_or_default()
            .into_iter()
            .filter(|id| placed.contains(id))
            .collect();
        if fragment != result {
            self.tree.remove(fragment);
        }
        self.bind_scripts(&widgets)
    }

    /// Drop fragments a finished list loaded but never placed
    pub(crate) fn release_fragments(&mut self, fragments: &[WidgetId]) {
        for root in fragments {
            if self.pending.remove(root).is_some() {
                log::debug!("dropping unplaced fragment {}", self.tree.query(*root));
                self.tree.remove(*root);
            }
        }
    }

    /// Error sink. Cancellations are dropped; anything else is recorded and,
    /// in fail-fast mode, halts interaction.
    pub fn report(&mut self, error: CelxError) {
        if error.is_cancellation() {
            log::warn!("{}", error);
            return;
        }

        log::error!("{}", error);
        self.errors.push(error);

        if self.config.fail_fast && !self.halted {
            self.halted = true;
            self.cancel_in_flight();
            self.timers.clear();
        }
    }

    /// Run queued worker tasks and due timers without blocking
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(task) = self.tasks.try_recv() {
            task(self);
            handled += 1;
        }
        handled + self.fire_timers()
    }

    /// Pump until no worker is running and no timer is pending
    pub fn run_until_idle(&mut self) {
        loop {
            self.pump();

            if self.active.load(Ordering::SeqCst) == 0 && self.timers.is_empty() {
                if self.pump() == 0 {
                    break;
                }
                continue;
            }

            match self.tasks.recv_timeout(IDLE_POLL) {
                Ok(task) => task(self),
                Err(RecvTimeoutError::Timeout) => {}
                // the browser holds a sender itself
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    fn fire_timers(&mut self) -> usize {
        if self.halted {
            self.timers.clear();
            return 0;
        }

        let now = Instant::now();
        let (due, waiting): (Vec<Timer>, Vec<Timer>) =
            std::mem::take(&mut self.timers).into_iter().partition(|timer| timer.due <= now);
        self.timers = waiting;

        let fired = due.len();
        for timer in due {
            let query = match timer.scope.widget() {
                Some(widget) => self.tree.query(widget),
                None => "Page".to_string(),
            };
            if let Err(err) = self.call_handler(&timer.callback, (), &timer.scope, "timeout", &query, "") {
                self.report(err);
            }
        }
        fired
    }
}

/// `on_<event>` or `pre_<event>`
fn is_valid_event(name: &str) -> bool {
    let event = name.strip_prefix("on_").or_else(|| name.strip_prefix("pre_"));
    event.is_some_and(|event| !event.is_empty() && event.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'))
}

fn script_error(err: impl std::fmt::Display) -> ScriptError {
    ScriptError::new(err.to_string())
}

impl ScriptHost for Browser {
    fn tree(&self) -> &WidgetTree {
        &self.tree
    }

    fn set_widget_field(&mut self, widget: WidgetId, field: &str, value: &Value) -> std::result::Result<(), ScriptError> {
        let text = match value {
            Value::Nil => None,
            other => Some(display(other)),
        };
        let target = self.tree.widget_mut(widget).map_err(script_error)?;

        match field {
            "content" => target.set_content(text),
            "eid" => target.set_eid(text),
            "groups" => target.set_groups(to_words(value)?),
            "kind" | "parent" | "children" | "selector" | "scope" => {
                return Err(ScriptError::new(format!("widget field '{}' is read-only", field)));
            }
            name if name.starts_with('_') => {
                return Err(ScriptError::new(format!("access to attribute '{}' is denied", name)));
            }
            name => match value {
                Value::Nil => target.set_attribute(name, None),
                other => {
                    let attr = to_attr(other).ok_or_else(|| {
                        ScriptError::new(format!(
                            "cannot store a {} value in attribute '{}'",
                            other.type_name(),
                            name
                        ))
                    })?;
                    target.set_attribute(name, Some(attr));
                }
            },
        }
        Ok(())
    }

    fn alert(&mut self, message: &str) {
        log::info!("alert: {}", message);
        self.alerts.push(message.to_string());
    }

    fn run_actions(&mut self, actions: Arc<Vec<Instruction>>, caller: WidgetId) -> std::result::Result<(), ScriptError> {
        if self.halted {
            return Err(ScriptError::new("session halted"));
        }
        match self.deferred.as_mut() {
            Some(deferred) => deferred.push((actions, caller)),
            None => {
                self.start_actions(actions, caller);
            }
        }
        Ok(())
    }

    fn set_style(&mut self, widget: WidgetId, property: &str, value: StyleValue) -> std::result::Result<(), ScriptError> {
        let query = self.tree.query(widget);
        let mut properties = PropertyMap::new();
        properties.insert(property.to_string(), value);
        self.rules
            .apply(&query, properties, SCRIPT_PRIORITY)
            .map_err(script_error)
    }

    fn schedule(&mut self, delay: Duration, callback: Function, scope: ScopeRef) -> std::result::Result<(), ScriptError> {
        self.timers.push(Timer {
            due: Instant::now() + delay,
            callback,
            scope,
        });
        Ok(())
    }

    fn build_widget(&mut self, spec: WidgetSpec) -> std::result::Result<WidgetId, ScriptError> {
        if let Some((event, _)) = spec.handlers.iter().find(|(event, _)| !is_valid_event(event)) {
            return Err(ScriptError::new(CompileError::InvalidEventHandler(event.clone()).to_string()));
        }
        let children = spec.children.clone();
        let id = spec.build(&mut self.tree).map_err(script_error)?;
        self.loose.retain(|loose| !children.contains(loose));
        self.loose.push(id);
        Ok(id)
    }

    fn pin(&mut self, widget: WidgetId) -> std::result::Result<(), ScriptError> {
        self.tree.pin(widget).map_err(script_error)?;
        self.loose.retain(|loose| *loose != widget);
        log::debug!("pinned {}", self.tree.query(widget));
        Ok(())
    }

    fn dismiss(&mut self, widget: WidgetId) -> std::result::Result<(), ScriptError> {
        if !self.tree.dismiss(widget) {
            log::warn!("{} is not inside a dialogue", self.tree.query(widget));
        }
        Ok(())
    }

    fn append_child(&mut self, parent: WidgetId, child: WidgetId) -> std::result::Result<(), ScriptError> {
        self.tree.append(parent, child).map_err(script_error)?;
        self.loose.retain(|loose| *loose != child);
        Ok(())
    }
}
