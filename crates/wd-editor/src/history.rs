//! Undo/Redo history over reducer snapshots.
//!
//! Every committed action records the snapshot it was applied to, so undo is
//! a pointer swap rather than an inverse computation. Snapshots share
//! untouched diagrams and items through `Arc`; each entry still costs one
//! re-indexed item map for the diagram it edited, so long sessions should
//! set a depth cap.
//!
//! The actions folded into the baseline plus the actions on the undo stack
//! always replay to `present`; that sequence is the session's Action Log.

use std::collections::VecDeque;
use std::sync::Arc;
use wd_core::Reduce;

/// Linear undo/redo history. There is no redo branching: committing after an
/// undo discards the redo stack.
#[derive(Debug, Clone, PartialEq)]
pub struct UndoableState<T, A> {
    /// Actions folded into the baseline; not undoable.
    base_actions: Vec<A>,
    /// `(state before, action)` pairs, oldest first.
    past: VecDeque<(Arc<T>, A)>,
    present: Arc<T>,
    /// `(state after, action)` pairs, next redo last.
    future: Vec<(Arc<T>, A)>,
    /// Maximum undo depth; `None` = unbounded.
    max_depth: Option<usize>,
}

impl<T, A> UndoableState<T, A>
where
    T: Reduce<Action = A>,
    A: Clone,
{
    /// Seed a history whose baseline is `initial`, produced by `initial_action`.
    pub fn create(initial: impl Into<Arc<T>>, initial_action: A) -> Self {
        Self {
            base_actions: vec![initial_action],
            past: VecDeque::new(),
            present: initial.into(),
            future: Vec::new(),
            max_depth: None,
        }
    }

    /// A history whose baseline is a whole replayed log. `present` must be
    /// the result of folding `base_actions`; nothing is undoable.
    pub fn from_replayed(base_actions: Vec<A>, present: impl Into<Arc<T>>) -> Self {
        Self {
            base_actions,
            past: VecDeque::new(),
            present: present.into(),
            future: Vec::new(),
            max_depth: None,
        }
    }

    /// Cap the undo stack. When it overflows, the oldest entry's action moves
    /// into the baseline: it can no longer be undone but stays in `actions()`.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self.evict();
        self
    }

    pub fn present(&self) -> &Arc<T> {
        &self.present
    }

    /// Apply `action` to the present. Returns `false` (history untouched)
    /// when the reducer reports no change.
    pub fn commit(&mut self, action: A) -> bool {
        let next = T::reduce(&self.present, &action);
        if Arc::ptr_eq(&next, &self.present) {
            return false;
        }
        let prior = std::mem::replace(&mut self.present, next);
        self.past.push_back((prior, action));
        self.future.clear();
        self.evict();
        true
    }

    /// Step back one action. Returns `false` if there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some((prior, action)) = self.past.pop_back() else {
            return false;
        };
        let current = std::mem::replace(&mut self.present, prior);
        self.future.push((current, action));
        true
    }

    /// Re-apply the last undone action. Returns `false` if there is nothing to redo.
    pub fn redo(&mut self) -> bool {
        let Some((next, action)) = self.future.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut self.present, next);
        self.past.push_back((current, action));
        true
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.past.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.future.len()
    }

    /// The full sequence of actions that replays to `present`.
    pub fn actions(&self) -> impl Iterator<Item = &A> {
        self.base_actions
            .iter()
            .chain(self.past.iter().map(|(_, action)| action))
    }

    /// The action that produced `present`.
    pub fn last_action(&self) -> Option<&A> {
        self.past
            .back()
            .map(|(_, action)| action)
            .or_else(|| self.base_actions.last())
    }

    /// Fold the whole undo stack into the baseline and drop the redo stack.
    /// `present` and `actions()` are unchanged; only undo depth resets.
    pub fn rebase(&mut self) {
        self.base_actions
            .extend(self.past.drain(..).map(|(_, action)| action));
        self.future.clear();
    }

    fn evict(&mut self) {
        let Some(max_depth) = self.max_depth else {
            return;
        };
        while self.past.len() > max_depth {
            if let Some((_, action)) = self.past.pop_front() {
                self.base_actions.push(action);
            }
        }
    }
}
