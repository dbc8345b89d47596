//! Core data model for WireDraft editing sessions.
//!
//! An `EditorState` holds an ordered set of diagrams plus global canvas
//! settings. Each `Diagram` owns its items as a forest: root items are listed
//! in `root_ids`, group items list their children, and every child points
//! back at its group through `parent_group_id`. The state is never mutated
//! in place by callers; the reducer produces new snapshots.

use crate::id::{DiagramId, ItemId};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

// ─── Colors ──────────────────────────────────────────────────────────────

/// RGBA color. Stored as 4 × f32 [0.0, 1.0], serialized as a hex string.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

/// Helper to parse a single hex digit.
fn hex_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

impl Color {
    pub const WHITE: Color = Color::rgba(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgba(0.0, 0.0, 0.0, 1.0);

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Parse a hex color string: `#RGB`, `#RGBA`, `#RRGGBB`, `#RRGGBBAA`.
    /// The leading `#` is optional.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        let bytes = hex.as_bytes();

        let channel = |i: usize| -> Option<f32> {
            match bytes.len() {
                3 | 4 => Some((hex_val(bytes[i])? * 17) as f32 / 255.0),
                _ => Some((hex_val(bytes[i * 2])? << 4 | hex_val(bytes[i * 2 + 1])?) as f32 / 255.0),
            }
        };

        match bytes.len() {
            3 | 6 => Some(Self::rgba(channel(0)?, channel(1)?, channel(2)?, 1.0)),
            4 | 8 => Some(Self::rgba(channel(0)?, channel(1)?, channel(2)?, channel(3)?)),
            _ => None,
        }
    }

    /// Emit as `#RRGGBB`, or `#RRGGBBAA` when not fully opaque.
    pub fn to_hex(&self) -> String {
        let to_byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        let (r, g, b, a) = (to_byte(self.r), to_byte(self.g), to_byte(self.b), to_byte(self.a));

        if a == 255 {
            format!("#{r:02X}{g:02X}{b:02X}")
        } else {
            format!("#{r:02X}{g:02X}{b:02X}{a:02X}")
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Color::from_hex(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid color `{s}`")))
    }
}

// ─── Geometry ────────────────────────────────────────────────────────────

/// Canvas size of the editor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

impl Default for Size {
    fn default() -> Self {
        Size::new(1000.0, 1000.0)
    }
}

/// Position, size, and rotation (degrees) of an item.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Geometry {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub rotation: f32,
}

impl Geometry {
    pub const fn rect(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            rotation: 0.0,
        }
    }

    /// Axis-aligned bounding box of both geometries (rotation ignored).
    pub fn union(&self, other: &Geometry) -> Geometry {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = (self.x + self.width).max(other.x + other.width);
        let bottom = (self.y + self.height).max(other.y + other.height);
        Geometry::rect(x, y, right - x, bottom - y)
    }
}

// ─── Appearance ──────────────────────────────────────────────────────────

/// A single appearance property value (`BACKGROUND_COLOR`, `TEXT`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AppearanceValue {
    Flag(bool),
    Number(f32),
    Text(String),
}

impl From<&str> for AppearanceValue {
    fn from(s: &str) -> Self {
        AppearanceValue::Text(s.to_string())
    }
}

impl From<f32> for AppearanceValue {
    fn from(n: f32) -> Self {
        AppearanceValue::Number(n)
    }
}

impl From<bool> for AppearanceValue {
    fn from(b: bool) -> Self {
        AppearanceValue::Flag(b)
    }
}

/// Keyed appearance properties. Ordered so structural equality and
/// serialization are deterministic.
pub type Appearance = BTreeMap<String, AppearanceValue>;

// ─── Items ───────────────────────────────────────────────────────────────

/// What an item is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ItemKind {
    /// A leaf shape drawn by the named renderer (`Button`, `Label`, ...).
    Shape { renderer: String },
    /// A container whose children are selected and moved as one unit.
    Group { child_ids: Vec<ItemId> },
}

/// A single item in a diagram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub kind: ItemKind,
    pub geometry: Geometry,
    pub appearance: Appearance,
    /// The group this item belongs to; `None` for root items.
    pub parent_group_id: Option<ItemId>,
}

impl Item {
    pub fn shape(id: ItemId, renderer: impl Into<String>, geometry: Geometry) -> Self {
        Self {
            id,
            kind: ItemKind::Shape {
                renderer: renderer.into(),
            },
            geometry,
            appearance: Appearance::new(),
            parent_group_id: None,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, ItemKind::Group { .. })
    }

    /// Direct children (empty for shapes).
    pub fn child_ids(&self) -> &[ItemId] {
        match &self.kind {
            ItemKind::Group { child_ids } => child_ids,
            ItemKind::Shape { .. } => &[],
        }
    }
}

// ─── Invariants ──────────────────────────────────────────────────────────

/// A structural defect found by `check_invariants`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("item {id} is referenced but does not exist")]
    MissingItem { id: ItemId },
    #[error("item {id} claims parent {found:?} but is listed under {expected:?}")]
    WrongParent {
        id: ItemId,
        expected: Option<ItemId>,
        found: Option<ItemId>,
    },
    #[error("item {id} is listed more than once")]
    Duplicate { id: ItemId },
    #[error("item {id} is not reachable from the root list")]
    Unreachable { id: ItemId },
    #[error("selected item {id} does not exist")]
    DanglingSelection { id: ItemId },
    #[error("diagram {id} is ordered but missing, or stored but unordered")]
    DiagramOrder { id: DiagramId },
    #[error("selected diagram {id} does not exist")]
    DanglingDiagram { id: DiagramId },
}

// ─── Diagrams ────────────────────────────────────────────────────────────

/// A single page of the session: an item forest plus the current selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagram {
    pub id: DiagramId,
    /// Items sit behind `Arc`; an edit copies only the items it changes.
    pub items: HashMap<ItemId, Arc<Item>>,
    /// Top-level items in z-order (back to front).
    pub root_ids: Vec<ItemId>,
    pub selected_ids: HashSet<ItemId>,
}

impl Diagram {
    pub fn empty(id: DiagramId) -> Self {
        Self {
            id,
            items: HashMap::new(),
            root_ids: Vec::new(),
            selected_ids: HashSet::new(),
        }
    }

    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.items.get(&id).map(Arc::as_ref)
    }

    /// Mutable access to one item, copying it first if a snapshot shares it.
    pub(crate) fn item_mut(&mut self, id: ItemId) -> Option<&mut Item> {
        self.items.get_mut(&id).map(Arc::make_mut)
    }

    pub(crate) fn insert_item(&mut self, item: Item) {
        self.items.insert(item.id, Arc::new(item));
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.items.contains_key(&id)
    }

    /// The group `id` belongs to, if any.
    pub fn parent_of(&self, id: ItemId) -> Option<ItemId> {
        self.items.get(&id).and_then(|item| item.parent_group_id)
    }

    /// Children listed under `parent` (`None` = the root list).
    pub fn children_of(&self, parent: Option<ItemId>) -> &[ItemId] {
        match parent {
            None => &self.root_ids,
            Some(group) => self.item(group).map(Item::child_ids).unwrap_or(&[]),
        }
    }

    /// Mutable access to the child list under `parent`.
    pub(crate) fn children_mut(&mut self, parent: Option<ItemId>) -> Option<&mut Vec<ItemId>> {
        match parent {
            None => Some(&mut self.root_ids),
            Some(group) => match self.item_mut(group).map(|item| &mut item.kind) {
                Some(ItemKind::Group { child_ids }) => Some(child_ids),
                _ => None,
            },
        }
    }

    /// Walk up the group chain to the root-level item containing `id`.
    /// Returns `None` when `id` is unknown.
    pub fn top_level_ancestor(&self, id: ItemId) -> Option<ItemId> {
        let mut current = self.item(id)?;
        // Bounded by item count so a corrupted parent chain cannot loop.
        for _ in 0..self.items.len() {
            match current.parent_group_id.and_then(|p| self.item(p)) {
                Some(parent) => current = parent,
                None => return Some(current.id),
            }
        }
        Some(current.id)
    }

    /// All transitive descendants of `id` in depth-first order, excluding `id`.
    pub fn descendants(&self, id: ItemId) -> Vec<ItemId> {
        let mut out = Vec::new();
        let mut stack: Vec<ItemId> = self.children_of(Some(id)).iter().rev().copied().collect();
        let mut seen = HashSet::new();
        while let Some(next) = stack.pop() {
            if !seen.insert(next) {
                continue;
            }
            out.push(next);
            stack.extend(self.children_of(Some(next)).iter().rev().copied());
        }
        out
    }

    /// Leaf shapes reachable from `id` (the item itself if it is a shape).
    pub fn leaves(&self, id: ItemId) -> Vec<ItemId> {
        match self.items.get(&id) {
            Some(item) if !item.is_group() => vec![id],
            Some(_) => self
                .descendants(id)
                .into_iter()
                .filter(|d| self.items.get(d).is_some_and(|i| !i.is_group()))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Verify the forest structure and the selection.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let mut visited = HashSet::with_capacity(self.items.len());
        self.check_children(None, &mut visited)?;

        if let Some(id) = self.items.keys().find(|id| !visited.contains(*id)) {
            return Err(InvariantViolation::Unreachable { id: *id });
        }
        if let Some(id) = self.selected_ids.iter().find(|id| !self.items.contains_key(*id)) {
            return Err(InvariantViolation::DanglingSelection { id: *id });
        }
        Ok(())
    }

    fn check_children(
        &self,
        parent: Option<ItemId>,
        visited: &mut HashSet<ItemId>,
    ) -> Result<(), InvariantViolation> {
        for &id in self.children_of(parent) {
            let item = self
                .items
                .get(&id)
                .ok_or(InvariantViolation::MissingItem { id })?;
            if item.parent_group_id != parent {
                return Err(InvariantViolation::WrongParent {
                    id,
                    expected: parent,
                    found: item.parent_group_id,
                });
            }
            if !visited.insert(id) {
                return Err(InvariantViolation::Duplicate { id });
            }
            if item.is_group() {
                self.check_children(Some(id), visited)?;
            }
        }
        Ok(())
    }
}

// ─── Editor state ────────────────────────────────────────────────────────

/// The complete snapshot of an editing session.
///
/// Diagrams sit behind `Arc` so a transition only copies the diagram it
/// touches; untouched diagrams are shared between history snapshots. Inside
/// the touched diagram the item map is re-indexed but unchanged items are
/// shared as well.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EditorState {
    pub diagrams: HashMap<DiagramId, Arc<Diagram>>,
    /// Diagram ids in creation order.
    pub diagram_order: Vec<DiagramId>,
    pub selected_diagram_id: Option<DiagramId>,
    pub size: Size,
    pub color: Color,
}

impl EditorState {
    /// A state with no diagrams and default canvas settings.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn diagram(&self, id: DiagramId) -> Option<&Diagram> {
        self.diagrams.get(&id).map(Arc::as_ref)
    }

    pub fn selected_diagram(&self) -> Option<&Diagram> {
        self.selected_diagram_id.and_then(|id| self.diagram(id))
    }

    pub fn first_diagram_id(&self) -> Option<DiagramId> {
        self.diagram_order.first().copied()
    }

    /// Diagrams in creation order.
    pub fn ordered_diagrams(&self) -> impl Iterator<Item = &Diagram> {
        self.diagram_order.iter().filter_map(|id| self.diagram(*id))
    }

    /// Verify ordering, the diagram selection, and every diagram's forest.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        if self.diagram_order.len() != self.diagrams.len() {
            let id = self
                .diagrams
                .keys()
                .find(|id| !self.diagram_order.contains(*id))
                .or_else(|| self.diagram_order.iter().find(|id| !self.diagrams.contains_key(*id)))
                .copied();
            if let Some(id) = id {
                return Err(InvariantViolation::DiagramOrder { id });
            }
        }
        for id in &self.diagram_order {
            let diagram = self
                .diagram(*id)
                .ok_or(InvariantViolation::DiagramOrder { id: *id })?;
            diagram.check_invariants()?;
        }
        if let Some(id) = self.selected_diagram_id
            && !self.diagrams.contains_key(&id)
        {
            return Err(InvariantViolation::DanglingDiagram { id });
        }
        Ok(())
    }
}
