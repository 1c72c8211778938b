//! Widget tree arena

use super::selector::Selector;
use super::widget::{Widget, WidgetId, WidgetKind};
use crate::utils::error::{CelxError, SelectionError};

/// Structural edit placing a widget relative to a target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edit {
    /// Take the target's place in its parent
    Replace,
    /// Become the target's only child
    ReplaceChildren,
    /// Insert into the target's parent at the target's index
    Before,
    /// Insert into the target's parent at the target's index + 1
    After,
    /// Become the target's first child
    Prepend,
    /// Become the target's last child
    Append,
}

impl Edit {
    /// Whether the edit changes the target's own children
    pub fn edits_children_of_target(&self) -> bool {
        matches!(self, Self::ReplaceChildren | Self::Prepend | Self::Append)
    }
}

/// Owns every widget; parent/child links are ids into the arena.
///
/// Ids are never reused, so a stale id resolves to nothing instead of to a
/// different widget.
#[derive(Debug, Default)]
pub struct WidgetTree {
    slots: Vec<Option<Widget>>,
    root: Option<WidgetId>,
    pinned: Vec<WidgetId>,
}

impl WidgetTree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a detached widget
    pub fn construct(&mut self, widget: Widget) -> WidgetId {
        self.slots.push(Some(widget));
        WidgetId(self.slots.len() - 1)
    }

    pub fn get(&self, id: WidgetId) -> Option<&Widget> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: WidgetId) -> Option<&mut Widget> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Like [`get`](Self::get), failing for removed widgets
    pub fn widget(&self, id: WidgetId) -> Result<&Widget, SelectionError> {
        self.get(id).ok_or(SelectionError::Detached(id.0))
    }

    pub fn widget_mut(&mut self, id: WidgetId) -> Result<&mut Widget, SelectionError> {
        self.get_mut(id).ok_or(SelectionError::Detached(id.0))
    }

    pub fn contains(&self, id: WidgetId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live widgets
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn root(&self) -> Option<WidgetId> {
        self.root
    }

    /// Install a new document root, removing the previous one
    pub fn set_root(&mut self, root: Option<WidgetId>) {
        if let Some(new) = root {
            self.detach(new);
            self.pinned.retain(|id| *id != new);
        }
        if let Some(old) = self.root.take() {
            if Some(old) != root {
                self.remove(old);
            }
        }
        self.root = root;
    }

    /// Unset the document root, keeping its subtree alive and detached
    pub fn take_root(&mut self) -> Option<WidgetId> {
        self.root.take()
    }

    /// Show a widget above the document, detaching it from any parent
    pub fn pin(&mut self, id: WidgetId) -> Result<(), SelectionError> {
        self.widget(id)?;
        self.detach(id);
        if !self.pinned.contains(&id) && Some(id) != self.root {
            self.pinned.push(id);
        }
        Ok(())
    }

    /// Pinned widgets, oldest first
    pub fn pinned(&self) -> &[WidgetId] {
        &self.pinned
    }

    /// Remove the pinned widget that is or holds `id`
    pub fn dismiss(&mut self, id: WidgetId) -> bool {
        let holder = std::iter::once(id)
            .chain(self.ancestors(id))
            .find(|widget| self.pinned.contains(widget));
        match holder {
            Some(holder) => {
                self.remove(holder);
                true
            }
            None => false,
        }
    }

    /// Remove every pinned widget
    pub fn clear_pinned(&mut self) {
        for id in std::mem::take(&mut self.pinned) {
            self.remove(id);
        }
    }

    /// The document root followed by the pinned widgets
    pub fn layers(&self) -> Vec<WidgetId> {
        self.root.into_iter().chain(self.pinned.iter().copied()).collect()
    }

    pub fn parent(&self, id: WidgetId) -> Option<WidgetId> {
        self.get(id).and_then(Widget::parent)
    }

    pub fn children(&self, id: WidgetId) -> &[WidgetId] {
        self.get(id).map(Widget::children).unwrap_or(&[])
    }

    /// Position of a widget among its parent's children
    pub fn index_of(&self, id: WidgetId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|child| *child == id)
    }

    /// Whether `id` is connected to the document root or a pinned widget
    pub fn is_attached(&self, id: WidgetId) -> bool {
        let mut current = Some(id);
        while let Some(widget) = current {
            if Some(widget) == self.root || self.pinned.contains(&widget) {
                return true;
            }
            current = self.parent(widget);
        }
        false
    }

    /// Ancestors from the parent up to the topmost widget
    pub fn ancestors(&self, id: WidgetId) -> Vec<WidgetId> {
        let mut found = Vec::new();
        let mut current = self.parent(id);
        while let Some(widget) = current {
            found.push(widget);
            current = self.parent(widget);
        }
        found
    }

    /// `id` and every descendant, parents first
    pub fn descendants(&self, id: WidgetId) -> Vec<WidgetId> {
        let mut found = Vec::new();
        let mut pending = vec![id];
        while let Some(widget) = pending.pop() {
            if !self.contains(widget) {
                continue;
            }
            found.push(widget);
            pending.extend(self.children(widget).iter().rev().copied());
        }
        found
    }

    /// Unique selector: `Kind#eid` when the widget has an eid, else `Kind@N`
    pub fn query(&self, id: WidgetId) -> String {
        match self.get(id) {
            Some(widget) => match widget.eid() {
                Some(eid) => format!("{}#{}", widget.kind().name(), eid),
                None => format!("{}@{}", widget.kind().name(), id.0),
            },
            None => format!("@{}", id.0),
        }
    }

    /// Append `child` as the last child of `parent`
    pub fn append(&mut self, parent: WidgetId, child: WidgetId) -> Result<(), SelectionError> {
        let len = self.children(parent).len();
        self.insert(parent, len, child)
    }

    /// Insert `child` among `parent`'s children at `index` (clamped)
    pub fn insert(&mut self, parent: WidgetId, index: usize, child: WidgetId) -> Result<(), SelectionError> {
        if !self.widget(parent)?.is_container() {
            return Err(SelectionError::NotContainer(self.query(parent)));
        }
        self.widget(child)?;
        if child == parent || self.ancestors(parent).contains(&child) {
            return Err(SelectionError::NotContainer(self.query(parent)));
        }

        self.detach(child);
        self.pinned.retain(|id| *id != child);
        let parent_widget = self.widget_mut(parent)?;
        let index = index.min(parent_widget.children.len());
        parent_widget.children.insert(index, child);
        self.widget_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Put `with` at `target`'s position and remove `target`'s subtree
    pub fn replace(&mut self, target: WidgetId, with: WidgetId) -> Result<(), SelectionError> {
        if target == with {
            return Ok(());
        }

        if Some(target) == self.root {
            self.set_root(Some(with));
            return Ok(());
        }

        let parent = self
            .parent(target)
            .ok_or_else(|| SelectionError::ParentNotContainer(self.query(target)))?;
        self.widget(with)?;
        if self.ancestors(target).contains(&with) {
            return Err(SelectionError::NotContainer(self.query(parent)));
        }

        // `with` may live inside the subtree about to be removed
        self.detach(with);
        let index = self
            .index_of(target)
            .ok_or_else(|| SelectionError::ParentNotContainer(self.query(target)))?;
        self.remove(target);
        self.insert(parent, index, with)
    }

    /// Replace all children of `parent`, removing the previous ones
    pub fn set_children(&mut self, parent: WidgetId, children: Vec<WidgetId>) -> Result<(), SelectionError> {
        if !self.widget(parent)?.is_container() {
            return Err(SelectionError::NotContainer(self.query(parent)));
        }

        let previous: Vec<WidgetId> = self.children(parent).to_vec();
        for old in previous {
            if !children.contains(&old) {
                self.remove(old);
            }
        }
        for child in children {
            self.append(parent, child)?;
        }
        Ok(())
    }

    /// Unlink a widget from its parent, keeping its subtree alive
    pub fn detach(&mut self, id: WidgetId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        if let Some(parent_widget) = self.get_mut(parent) {
            parent_widget.children.retain(|child| *child != id);
        }
        if let Some(widget) = self.get_mut(id) {
            widget.parent = None;
        }
    }

    /// Drop a widget and its whole subtree
    pub fn remove(&mut self, id: WidgetId) {
        self.detach(id);
        for widget in self.descendants(id) {
            if let Some(slot) = self.slots.get_mut(widget.0) {
                *slot = None;
            }
        }
        if self.root == Some(id) {
            self.root = None;
        }
        self.pinned.retain(|widget| *widget != id);
    }

    /// Apply a structural edit placing `widget` relative to `target`
    pub fn place(&mut self, widget: WidgetId, target: WidgetId, edit: Edit) -> Result<(), SelectionError> {
        match edit {
            Edit::Replace => self.replace(target, widget),
            Edit::ReplaceChildren => self.set_children(target, vec![widget]),
            Edit::Prepend => self.insert(target, 0, widget),
            Edit::Append => self.append(target, widget),
            Edit::Before | Edit::After => {
                let parent = self
                    .parent(target)
                    .filter(|parent| self.get(*parent).is_some_and(Widget::is_container))
                    .ok_or_else(|| SelectionError::ParentNotContainer(self.query(target)))?;
                self.widget(widget)?;
                if widget == target || self.ancestors(target).contains(&widget) {
                    return Err(SelectionError::NotContainer(self.query(parent)));
                }
                // detach first so the target index is measured without `widget`
                self.detach(widget);
                let index = self
                    .index_of(target)
                    .ok_or_else(|| SelectionError::ParentNotContainer(self.query(target)))?;
                let offset = usize::from(edit == Edit::After);
                self.insert(parent, index + offset, widget)
            }
        }
    }

    /// First match of `selector` among `roots` and their descendants
    pub fn find(&self, selector: &Selector, roots: &[WidgetId]) -> Option<WidgetId> {
        roots
            .iter()
            .flat_map(|root| self.descendants(*root))
            .find(|id| selector.matches(self, *id))
    }

    /// Every match of `selector` among `roots` and their descendants
    pub fn find_all(&self, selector: &Selector, roots: &[WidgetId]) -> Vec<WidgetId> {
        let mut found: Vec<WidgetId> = Vec::new();
        for root in roots {
            for id in self.descendants(*root) {
                if selector.matches(self, id) && !found.contains(&id) {
                    found.push(id);
                }
            }
        }
        found
    }

    /// Serialize the `name`d descendants of a widget.
    ///
    /// Fields contribute their text, checkboxes their checked state, sliders
    /// their value; other named widgets their content.
    pub fn serialize(&self, id: WidgetId) -> serde_json::Map<String, serde_json::Value> {
        let mut data = serde_json::Map::new();

        for widget_id in self.descendants(id) {
            let Some(widget) = self.get(widget_id) else {
                continue;
            };
            let Some(name) = widget.attribute("name").map(ToString::to_string) else {
                continue;
            };

            let value = match widget.kind() {
                WidgetKind::Checkbox => serde_json::Value::Bool(widget.is_checked()),
                WidgetKind::Slider => widget
                    .attribute("value")
                    .map(|value| value.to_json())
                    .unwrap_or(serde_json::Value::Null),
                _ => widget
                    .content()
                    .map(|content| serde_json::Value::String(content.to_string()))
                    .unwrap_or(serde_json::Value::Null),
            };
            data.insert(name, value);
        }

        data
    }

    /// Content of a widget after its content provider ran
    pub fn render_content(&self, id: WidgetId) -> Result<Option<String>, CelxError> {
        let widget = self.widget(id)?;
        match widget.content_provider() {
            Some(provider) => provider.render(self, id),
            None => Ok(widget.content().map(str::to_string)),
        }
    }

    /// Indented text outline of a subtree with rendered content
    pub fn outline(&self, id: WidgetId) -> Result<String, CelxError> {
        let mut out = String::new();
        self.outline_into(id, 0, &mut out)?;
        Ok(out)
    }

    fn outline_into(&self, id: WidgetId, depth: usize, out: &mut String) -> Result<(), CelxError> {
        out.push_str(&"  ".repeat(depth));
        out.push_str(&self.query(id));
        if let Some(content) = self.render_content(id)? {
            out.push_str(": ");
            out.push_str(&content.replace('\n', " "));
        }
        out.push('\n');

        for child in self.children(id).to_vec() {
            self.outline_into(child, depth + 1, out)?;
        }
        Ok(())
    }
}
