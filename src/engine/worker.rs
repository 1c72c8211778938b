//! Worker threads
//!
//! Remote calls and instruction lists run on their own threads. Workers never
//! touch the widget tree: every read or write is shipped to the thread owning
//! the [`Browser`] through an [`OwnerHandle`], and the worker blocks until
//! the owner has run it.

use super::navigator::resolve_endpoint;
use super::Browser;
use crate::dsl::{ActionHost, Instruction, InstructionInterpreter, RunHandle, Verb};
use crate::network::{Method, Request, Response, Transport};
use crate::renderer::{Edit, WidgetId};
use crate::utils::error::{CelxError, NetworkError, Result};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use url::Url;

/// Work shipped to the owning thread
pub type OwnerTask = Box<dyn FnOnce(&mut Browser) + Send>;

/// A worker's channel to the thread owning the tree
#[derive(Clone)]
pub struct OwnerHandle {
    sender: Sender<OwnerTask>,
    generation: Arc<AtomicU64>,
    started: u64,
}

impl OwnerHandle {
    pub(crate) fn new(sender: Sender<OwnerTask>, generation: Arc<AtomicU64>) -> Self {
        let started = generation.load(Ordering::SeqCst);
        Self {
            sender,
            generation,
            started,
        }
    }

    /// Whether the page this worker was started for is still shown
    pub fn is_current(&self) -> bool {
        self.generation.load(Ordering::SeqCst) == self.started
    }

    /// Run `task` on the owning thread and wait for its result.
    ///
    /// Fails with [`NetworkError::Cancelled`] once the page changed or the
    /// owner went away.
    pub fn call<R, F>(&self, task: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut Browser) -> Result<R> + Send + 'static,
    {
        let (reply, outcome) = std::sync::mpsc::channel();
        let started = self.started;

        let task: OwnerTask = Box::new(move |browser: &mut Browser| {
            let result = if browser.generation() == started {
                task(browser)
            } else {
                Err(NetworkError::Cancelled.into())
            };
            // the worker may have gone away; nothing to report then
            let _ = reply.send(result);
        });

        self.sender
            .send(task)
            .map_err(|_| CelxError::from(NetworkError::Cancelled))?;
        outcome
            .recv()
            .map_err(|_| CelxError::from(NetworkError::Cancelled))?
    }

    /// Queue `task` on the owning thread without waiting
    pub fn post<F>(&self, task: F)
    where
        F: FnOnce(&mut Browser) + Send + 'static,
    {
        if self.sender.send(Box::new(task)).is_err() {
            log::warn!("owner went away, dropping task");
        }
    }
}

/// Instruction lists currently executing
#[derive(Debug, Default)]
pub struct RunRegistry {
    runs: Mutex<Vec<Arc<RunHandle>>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<RunHandle>>> {
        match self.runs.lock() {
            Ok(runs) => runs,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn register(&self, handle: Arc<RunHandle>) {
        self.lock().push(handle);
    }

    pub fn unregister(&self, id: u64) {
        self.lock().retain(|handle| handle.id() != id);
    }

    /// Clear the remaining steps of every running list
    pub fn cancel_all(&self) -> usize {
        let runs = self.lock();
        for handle in runs.iter() {
            handle.clear();
        }
        runs.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Counts live workers; decremented when the worker ends, even by panic
struct ActiveGuard(Arc<AtomicUsize>);

impl ActiveGuard {
    fn enter(active: &Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::SeqCst);
        Self(active.clone())
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// [`ActionHost`] used by worker threads
pub struct WorkerHost {
    owner: OwnerHandle,
    transport: Arc<dyn Transport>,
    base: Url,
    /// Fragments this run loaded
    loaded: Vec<WidgetId>,
}

impl WorkerHost {
    pub fn new(owner: OwnerHandle, transport: Arc<dyn Transport>, base: Url) -> Self {
        Self {
            owner,
            transport,
            base,
            loaded: Vec::new(),
        }
    }
}

impl ActionHost for WorkerHost {
    fn request_body(&mut self, caller: WidgetId, selector: Option<&str>) -> Result<serde_json::Value> {
        let selector = selector.map(str::to_string);
        self.owner
            .call(move |browser| browser.request_body(caller, selector.as_deref()))
    }

    fn fetch(&mut self, verb: Verb, endpoint: &str, body: serde_json::Value) -> Result<Response> {
        let method = Method::from_verb(verb)
            .ok_or_else(|| NetworkError::Transport(format!("{} is not a remote call", verb)))?;
        let url = resolve_endpoint(&self.base, endpoint)?;
        let request = Request::new(method, url.as_str())?.with_data(&body);

        let response = self.transport.send(request)?;
        if !self.owner.is_current() {
            log::warn!("page changed while {} {} was in flight", verb, url);
            return Err(NetworkError::Cancelled.into());
        }
        Ok(response)
    }

    fn load_fragment(&mut self, response: Response) -> Result<WidgetId> {
        let fragment = self.owner.call(move |browser| browser.load_fragment(response))?;
        self.loaded.push(fragment);
        Ok(fragment)
    }

    fn select(&mut self, selector: &str, scope: Option<&[WidgetId]>) -> Result<Vec<WidgetId>> {
        let selector = selector.to_string();
        let scope = scope.map(<[WidgetId]>::to_vec);
        self.owner
            .call(move |browser| browser.select(&selector, scope.as_deref()))
    }

    fn is_container(&mut self, widget: WidgetId) -> Result<bool> {
        self.owner
            .call(move |browser| Ok(browser.tree().widget(widget)?.is_container()))
    }

    fn query(&mut self, widget: WidgetId) -> Result<String> {
        self.owner.call(move |browser| Ok(browser.tree().query(widget)))
    }

    fn edit(&mut self, result: WidgetId, target: WidgetId, edit: Edit) -> Result<()> {
        self.owner
            .call(move |browser| browser.apply_edit(result, target, edit))
    }
}

/// Start an instruction list on its own thread
pub(crate) fn spawn_run(
    host: WorkerHost,
    runs: Arc<RunRegistry>,
    active: &Arc<AtomicUsize>,
    actions: &[Instruction],
    caller: WidgetId,
) -> u64 {
    let handle = RunHandle::new(actions);
    let id = handle.id();
    runs.register(handle.clone());
    let guard = ActiveGuard::enter(active);

    thread::spawn(move || {
        let _guard = guard;
        let mut host = host;
        let outcome = InstructionInterpreter::new(&mut host, caller).run(&handle);
        runs.unregister(handle.id());

        let loaded = std::mem::take(&mut host.loaded);
        if !loaded.is_empty() {
            host.owner.post(move |browser| browser.release_fragments(&loaded));
        }
        if let Err(err) = outcome {
            host.owner.post(move |browser| browser.report(err));
        }
    });

    id
}

/// Send one request from a worker thread and join it
pub(crate) fn fetch_joined(transport: &Arc<dyn Transport>, request: Request) -> Result<Response> {
    let transport = transport.clone();
    let worker = thread::spawn(move || transport.send(request));
    worker
        .join()
        .map_err(|_| NetworkError::Transport("request worker panicked".into()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::compile;

    #[test]
    fn test_registry_cancel_all() {
        let registry = RunRegistry::new();
        let first = RunHandle::new(&compile("GET /a; SWAP #b").unwrap());
        let second = RunHandle::new(&compile("GET /c").unwrap());
        registry.register(first.clone());
        registry.register(second.clone());

        assert_eq!(registry.cancel_all(), 2);
        assert_eq!(first.remaining(), 0);
        assert_eq!(second.remaining(), 0);

        registry.unregister(first.id());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_active_guard_counts() {
        let active = Arc::new(AtomicUsize::new(0));
        {
            let _guard = ActiveGuard::enter(&active);
            assert_eq!(active.load(Ordering::SeqCst), 1);
        }
        assert_eq!(active.load(Ordering::SeqCst), 0);
    }
}
