//! Instruction interpreter
//!
//! Runs one instruction list against the live tree through an
//! [`ActionHost`]. The run carries one register, `result`: the last fragment
//! produced by a remote call, or the part of it picked by SELECT. Tree edits
//! resolve their targets in the live document.

use super::instruction::{Instruction, Placement, Verb};
use crate::network::Response;
use crate::renderer::{Edit, WidgetId};
use crate::utils::error::{CelxError, DslError, NetworkError, Result, SelectionError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Tree and network services an instruction list runs against
pub trait ActionHost {
    /// Serialize the request body source: the widget matching `selector`, or
    /// the caller's parent
    fn request_body(&mut self, caller: WidgetId, selector: Option<&str>) -> Result<serde_json::Value>;

    /// Issue a remote call and wait for the response
    fn fetch(&mut self, verb: Verb, endpoint: &str, body: serde_json::Value) -> Result<Response>;

    /// Compile a response into a detached fragment and apply its rules
    fn load_fragment(&mut self, response: Response) -> Result<WidgetId>;

    /// Matches of `selector` inside `scope`, or the live document if `None`
    fn select(&mut self, selector: &str, scope: Option<&[WidgetId]>) -> Result<Vec<WidgetId>>;

    /// Whether a widget can hold children
    fn is_container(&mut self, widget: WidgetId) -> Result<bool>;

    /// Unique selector of a widget, for diagnostics
    fn query(&mut self, widget: WidgetId) -> Result<String>;

    /// Place `result` relative to `target`, then bind its scripts and drop
    /// whatever else of its fragment stayed unplaced
    fn edit(&mut self, result: WidgetId, target: WidgetId, edit: Edit) -> Result<()>;
}

static NEXT_RUN_ID: AtomicU64 = AtomicU64::new(1);

/// Remaining steps of a running instruction list.
///
/// Shared with the run registry so navigation can clear every pending list.
#[derive(Debug)]
pub struct RunHandle {
    id: u64,
    steps: Mutex<VecDeque<Instruction>>,
}

impl RunHandle {
    pub fn new(instructions: &[Instruction]) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_RUN_ID.fetch_add(1, Ordering::Relaxed),
            steps: Mutex::new(instructions.iter().cloned().collect()),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Take the next step
    pub fn next_step(&self) -> Option<Instruction> {
        self.steps.lock().ok()?.pop_front()
    }

    /// Drop every remaining step
    pub fn clear(&self) {
        if let Ok(mut steps) = self.steps.lock() {
            steps.clear();
        }
    }

    pub fn remaining(&self) -> usize {
        self.steps.lock().map(|steps| steps.len()).unwrap_or(0)
    }
}

/// Executes instruction lists for one triggering widget
pub struct InstructionInterpreter<'a, H: ActionHost + ?Sized> {
    host: &'a mut H,
    caller: WidgetId,
    result: Option<WidgetId>,
}

impl<'a, H: ActionHost + ?Sized> InstructionInterpreter<'a, H> {
    pub fn new(host: &'a mut H, caller: WidgetId) -> Self {
        Self {
            host,
            caller,
            result: None,
        }
    }

    /// Widget the next tree edit places
    pub fn result(&self) -> Option<WidgetId> {
        self.result
    }

    /// Run until the list is exhausted or cleared, stopping at the first error
    pub fn run(&mut self, handle: &RunHandle) -> Result<()> {
        while let Some(instruction) = handle.next_step() {
            log::debug!("run {}: {}", handle.id(), instruction);
            self.step(&instruction)?;
        }
        Ok(())
    }

    /// Run a whole list without a registry handle
    pub fn run_all(&mut self, instructions: &[Instruction]) -> Result<()> {
        self.run(&RunHandle::new(instructions))
    }

    /// Execute one instruction
    pub fn step(&mut self, instruction: &Instruction) -> Result<()> {
        match instruction.verb {
            verb if verb.is_remote() => self.remote_call(verb, instruction),
            Verb::Select => self.select(instruction),
            _ => self.tree_edit(instruction),
        }
    }

    fn remote_call(&mut self, verb: Verb, instruction: &Instruction) -> Result<()> {
        let body = self
            .host
            .request_body(self.caller, instruction.modifier.as_deref())?;
        let response = self.host.fetch(verb, &instruction.arg, body)?;

        if !response.is_success() {
            return Err(NetworkError::Http {
                status: response.status(),
                url: response.url().to_string(),
            }
            .into());
        }

        let fragment = self.host.load_fragment(response)?;
        self.result = Some(fragment);
        Ok(())
    }

    fn tree_edit(&mut self, instruction: &Instruction) -> Result<()> {
        let result = self.result.ok_or(SelectionError::NoResult)?;
        let target = self.resolve(&instruction.arg)?;
        let edit = edit_for(instruction)?;

        if edit.edits_children_of_target() && !self.host.is_container(target)? {
            let query = self.host.query(target)?;
            return Err(SelectionError::NotContainer(query).into());
        }

        self.host.edit(result, target, edit)
    }

    /// Narrow `result` to its first widget matching the selector
    fn select(&mut self, instruction: &Instruction) -> Result<()> {
        let result = self.result.ok_or(SelectionError::NoResult)?;
        let picked = self
            .host
            .select(&instruction.arg, Some(std::slice::from_ref(&result)))?
            .into_iter()
            .next()
            .ok_or_else(|| SelectionError::NoMatch(instruction.arg.clone()))?;

        self.result = Some(picked);
        Ok(())
    }

    fn resolve(&mut self, selector: &str) -> Result<WidgetId> {
        self.host
            .select(selector, None)?
            .into_iter()
            .next()
            .ok_or_else(|| SelectionError::NoMatch(selector.to_string()).into())
    }
}

/// Map a tree-edit instruction to the structural edit it performs
pub fn edit_for(instruction: &Instruction) -> Result<Edit> {
    let illegal = || -> CelxError {
        DslError::UnknownModifier {
            verb: instruction.verb.to_string(),
            modifier: instruction.modifier.clone().unwrap_or_default(),
        }
        .into()
    };
    let placement = instruction.placement().ok_or_else(illegal)?;

    let edit = match (instruction.verb, placement) {
        (Verb::Swap, Placement::Replace) => Edit::Replace,
        (Verb::Swap, Placement::In) => Edit::ReplaceChildren,
        (Verb::Swap | Verb::Insert, Placement::Before) => Edit::Before,
        (Verb::Swap | Verb::Insert, Placement::After) => Edit::After,
        (Verb::Insert, Placement::In) => Edit::Prepend,
        (Verb::Insert, Placement::Replace) => {
            return Err(DslError::MissingModifier(instruction.verb.to_string()).into());
        }
        (Verb::Append, Placement::In | Placement::Replace) => Edit::Append,
        _ => return Err(illegal()),
    };

    Ok(edit)
}
