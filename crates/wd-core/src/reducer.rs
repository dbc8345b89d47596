//! The pure editor reducer.
//!
//! `reduce` maps a state snapshot and an action to the next snapshot. It never
//! fails: an action whose preconditions do not hold returns the *same* `Arc`,
//! which callers detect with `Arc::ptr_eq` to skip recording history. The
//! reducer reads no clock, randomness, or I/O, so folding the same log always
//! yields structurally equal states.

use crate::action::Action;
use crate::id::{DiagramId, ItemId};
use crate::model::{Appearance, AppearanceValue, Diagram, EditorState, Geometry, Item, ItemKind};
use crate::selection;
use std::collections::HashSet;
use std::sync::Arc;

/// A state type that can be driven by a log of actions.
pub trait Reduce: Sized {
    type Action: Clone;

    /// Apply `action`. Returns `state` itself (same `Arc`) when nothing changed.
    fn reduce(state: &Arc<Self>, action: &Self::Action) -> Arc<Self>;
}

impl Reduce for EditorState {
    type Action = Action;

    fn reduce(state: &Arc<Self>, action: &Action) -> Arc<Self> {
        self::reduce(state, action)
    }
}

/// Apply `action` to `state`.
pub fn reduce(state: &Arc<EditorState>, action: &Action) -> Arc<EditorState> {
    let mut next = EditorState::clone(state);
    if apply(&mut next, action) {
        Arc::new(next)
    } else {
        log::debug!("{} had no effect", action.kind());
        Arc::clone(state)
    }
}

/// Replay `actions` from `EditorState::empty()`.
pub fn fold<'a>(actions: impl IntoIterator<Item = &'a Action>) -> Arc<EditorState> {
    actions
        .into_iter()
        .fold(Arc::new(EditorState::empty()), |state, action| reduce(&state, action))
}

fn apply(state: &mut EditorState, action: &Action) -> bool {
    match action {
        Action::AddDiagram { diagram_id } => add_diagram(state, *diagram_id),
        Action::SelectDiagram { diagram_id } => {
            if !state.diagrams.contains_key(diagram_id)
                || state.selected_diagram_id == Some(*diagram_id)
            {
                return false;
            }
            state.selected_diagram_id = Some(*diagram_id);
            true
        }
        Action::RemoveDiagram { diagram_id } => {
            if state.diagrams.remove(diagram_id).is_none() {
                return false;
            }
            state.diagram_order.retain(|id| id != diagram_id);
            if state.selected_diagram_id == Some(*diagram_id) {
                state.selected_diagram_id = None;
            }
            true
        }
        Action::AddItem {
            diagram_id,
            item_id,
            renderer,
            geometry,
            appearance,
        } => edit_diagram(state, *diagram_id, |d| {
            add_item(d, *item_id, renderer, *geometry, appearance)
        }),
        Action::MoveItems {
            diagram_id,
            item_ids,
            dx,
            dy,
        } => edit_diagram(state, *diagram_id, |d| move_items(d, item_ids, *dx, *dy)),
        Action::ResizeItem {
            diagram_id,
            item_id,
            width,
            height,
        } => edit_diagram(state, *diagram_id, |d| {
            resize_item(d, *item_id, *width, *height)
        }),
        Action::ChangeAppearance {
            diagram_id,
            item_ids,
            key,
            value,
        } => edit_diagram(state, *diagram_id, |d| {
            change_appearance(d, item_ids, key, value)
        }),
        Action::RemoveItems {
            diagram_id,
            item_ids,
        } => edit_diagram(state, *diagram_id, |d| remove_items(d, item_ids)),
        Action::GroupItems {
            diagram_id,
            item_ids,
            group_id,
        } => edit_diagram(state, *diagram_id, |d| group_items(d, item_ids, *group_id)),
        Action::UngroupItems {
            diagram_id,
            group_ids,
        } => edit_diagram(state, *diagram_id, |d| ungroup_items(d, group_ids)),
        Action::SelectItems {
            diagram_id,
            item_ids,
        } => edit_diagram(state, *diagram_id, |d| {
            let next = selection::resolve(d, item_ids.iter().copied());
            if next == d.selected_ids {
                return false;
            }
            d.selected_ids = next;
            true
        }),
        Action::ChangeSize { width, height } => {
            let valid = width.is_finite() && height.is_finite() && *width > 0.0 && *height > 0.0;
            if !valid || (state.size.width == *width && state.size.height == *height) {
                return false;
            }
            state.size.width = *width;
            state.size.height = *height;
            true
        }
        Action::ChangeColor { color } => {
            if state.color == *color {
                return false;
            }
            state.color = *color;
            true
        }
    }
}

// ─── Diagram-level handlers ──────────────────────────────────────────────

fn add_diagram(state: &mut EditorState, id: DiagramId) -> bool {
    if state.diagrams.contains_key(&id) {
        return false;
    }
    state.diagrams.insert(id, Arc::new(Diagram::empty(id)));
    state.diagram_order.push(id);
    if state.selected_diagram_id.is_none() {
        state.selected_diagram_id = Some(id);
    }
    true
}

/// Run `edit` on a copy of the diagram and keep the copy only if it changed.
fn edit_diagram(
    state: &mut EditorState,
    id: DiagramId,
    edit: impl FnOnce(&mut Diagram) -> bool,
) -> bool {
    let Some(current) = state.diagrams.get(&id) else {
        return false;
    };
    let mut diagram = Diagram::clone(current);
    if !edit(&mut diagram) {
        return false;
    }
    state.diagrams.insert(id, Arc::new(diagram));
    true
}

// ─── Item-level handlers ─────────────────────────────────────────────────

fn add_item(
    d: &mut Diagram,
    id: ItemId,
    renderer: &str,
    geometry: Geometry,
    appearance: &Appearance,
) -> bool {
    if d.contains(id) {
        return false;
    }
    let mut item = Item::shape(id, renderer, geometry);
    item.appearance = appearance.clone();
    d.insert_item(item);
    d.root_ids.push(id);
    true
}

/// Existing ids from `ids` plus all of their descendants.
fn with_descendants(d: &Diagram, ids: &[ItemId]) -> HashSet<ItemId> {
    let mut out = HashSet::new();
    for &id in ids {
        if d.contains(id) && out.insert(id) {
            out.extend(d.descendants(id));
        }
    }
    out
}

fn move_items(d: &mut Diagram, ids: &[ItemId], dx: f32, dy: f32) -> bool {
    if !dx.is_finite() || !dy.is_finite() || (dx == 0.0 && dy == 0.0) {
        return false;
    }
    let targets = with_descendants(d, ids);
    if targets.is_empty() {
        return false;
    }
    for id in targets {
        if let Some(item) = d.item_mut(id) {
            item.geometry.x += dx;
            item.geometry.y += dy;
        }
    }
    true
}

fn resize_item(d: &mut Diagram, id: ItemId, width: f32, height: f32) -> bool {
    let valid = width.is_finite() && height.is_finite() && width >= 0.0 && height >= 0.0;
    let unchanged = |item: &Item| item.geometry.width == width && item.geometry.height == height;
    match d.item(id) {
        Some(item) if valid && !item.is_group() && !unchanged(item) => {}
        _ => return false,
    }
    let Some(item) = d.item_mut(id) else {
        return false;
    };
    item.geometry.width = width;
    item.geometry.height = height;
    true
}

fn change_appearance(d: &mut Diagram, ids: &[ItemId], key: &str, value: &AppearanceValue) -> bool {
    let mut leaves: Vec<ItemId> = Vec::new();
    for &id in ids {
        for leaf in d.leaves(id) {
            if !leaves.contains(&leaf) {
                leaves.push(leaf);
            }
        }
    }

    let mut changed = false;
    for leaf in leaves {
        if d.item(leaf).is_some_and(|item| item.appearance.get(key) != Some(value))
            && let Some(item) = d.item_mut(leaf)
        {
            item.appearance.insert(key.to_string(), value.clone());
            changed = true;
        }
    }
    changed
}

/// Drop `id` from the child list of `parent`.
fn detach(d: &mut Diagram, parent: Option<ItemId>, id: ItemId) {
    if let Some(children) = d.children_mut(parent) {
        children.retain(|child| *child != id);
    }
}

fn remove_items(d: &mut Diagram, ids: &[ItemId]) -> bool {
    let targets = with_descendants(d, ids);
    if targets.is_empty() {
        return false;
    }

    let mut emptied = Vec::new();
    for &id in &targets {
        let parent = d.parent_of(id);
        if parent.is_none_or(|p| !targets.contains(&p)) {
            detach(d, parent, id);
            emptied.extend(parent);
        }
    }
    for id in &targets {
        d.items.remove(id);
        d.selected_ids.remove(id);
    }

    // Groups left without children go too, walking upward.
    while let Some(group) = emptied.pop() {
        if d.contains(group) && d.children_of(Some(group)).is_empty() {
            let parent = d.parent_of(group);
            detach(d, parent, group);
            d.items.remove(&group);
            d.selected_ids.remove(&group);
            emptied.extend(parent);
        }
    }
    true
}

fn group_items(d: &mut Diagram, ids: &[ItemId], group_id: ItemId) -> bool {
    let mut members: Vec<ItemId> = Vec::with_capacity(ids.len());
    for &id in ids {
        if !members.contains(&id) {
            members.push(id);
        }
    }
    if members.len() < 2 || d.contains(group_id) || !members.iter().all(|id| d.contains(*id)) {
        return false;
    }

    let parent = d.parent_of(members[0]);
    if members.iter().any(|id| d.parent_of(*id) != parent) {
        return false;
    }

    // Keep members in their existing z-order; the group takes the slot of the
    // backmost member.
    let siblings = d.children_of(parent);
    let insert_at = siblings
        .iter()
        .position(|id| members.contains(id))
        .unwrap_or(siblings.len());
    let ordered: Vec<ItemId> = siblings
        .iter()
        .copied()
        .filter(|id| members.contains(id))
        .collect();

    let bounds = ordered
        .iter()
        .filter_map(|id| d.item(*id).map(|item| item.geometry))
        .reduce(|acc, g| acc.union(&g))
        .unwrap_or_default();

    let Some(children) = d.children_mut(parent) else {
        return false;
    };
    children.retain(|id| !members.contains(id));
    children.insert(insert_at.min(children.len()), group_id);

    for &id in &ordered {
        if let Some(item) = d.item_mut(id) {
            item.parent_group_id = Some(group_id);
        }
    }
    d.insert_item(Item {
        id: group_id,
        kind: ItemKind::Group { child_ids: ordered },
        geometry: bounds,
        appearance: Appearance::new(),
        parent_group_id: parent,
    });
    d.selected_ids = selection::resolve(d, [group_id]);
    true
}

fn ungroup_items(d: &mut Diagram, group_ids: &[ItemId]) -> bool {
    let mut freed = Vec::new();
    for &group_id in group_ids {
        let (parent, children) = match d.item(group_id) {
            Some(item) if item.is_group() => (item.parent_group_id, item.child_ids().to_vec()),
            _ => continue,
        };

        let Some(siblings) = d.children_mut(parent) else {
            continue;
        };
        let Some(at) = siblings.iter().position(|id| *id == group_id) else {
            continue;
        };
        siblings.splice(at..=at, children.iter().copied());

        for &child in &children {
            if let Some(item) = d.item_mut(child) {
                item.parent_group_id = parent;
            }
        }
        d.items.remove(&group_id);
        d.selected_ids.remove(&group_id);
        freed.retain(|id| *id != group_id);
        freed.extend(children);
    }

    if freed.is_empty() {
        return false;
    }
    d.selected_ids = selection::resolve(d, freed);
    true
}
