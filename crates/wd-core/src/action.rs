//! The closed set of edit actions.
//!
//! Actions are the only way an `EditorState` changes. On the wire each action
//! is `{ "type": "...", "payload": { ... } }`; the `type` strings below are the
//! persisted format of `.draft` files and must stay stable.

use crate::id::{DiagramId, ItemId};
use crate::model::{Appearance, AppearanceValue, Color, Geometry};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// A list of item ids carried by an action.
pub type ItemIds = SmallVec<[ItemId; 4]>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all_fields = "camelCase")]
pub enum Action {
    #[serde(rename = "diagram/add")]
    AddDiagram { diagram_id: DiagramId },

    #[serde(rename = "diagram/select")]
    SelectDiagram { diagram_id: DiagramId },

    #[serde(rename = "diagram/remove")]
    RemoveDiagram { diagram_id: DiagramId },

    #[serde(rename = "items/add")]
    AddItem {
        diagram_id: DiagramId,
        item_id: ItemId,
        renderer: String,
        geometry: Geometry,
        #[serde(default)]
        appearance: Appearance,
    },

    /// Translate items (and their descendants) by a delta.
    #[serde(rename = "items/move")]
    MoveItems {
        diagram_id: DiagramId,
        item_ids: ItemIds,
        dx: f32,
        dy: f32,
    },

    #[serde(rename = "items/resize")]
    ResizeItem {
        diagram_id: DiagramId,
        item_id: ItemId,
        width: f32,
        height: f32,
    },

    /// Set one appearance key on every leaf reached from `item_ids`.
    #[serde(rename = "items/appearance")]
    ChangeAppearance {
        diagram_id: DiagramId,
        item_ids: ItemIds,
        key: String,
        value: AppearanceValue,
    },

    #[serde(rename = "items/remove")]
    RemoveItems {
        diagram_id: DiagramId,
        item_ids: ItemIds,
    },

    /// Wrap sibling items in a new group. The group id travels with the
    /// action so replay produces the same id every time.
    #[serde(rename = "items/group")]
    GroupItems {
        diagram_id: DiagramId,
        item_ids: ItemIds,
        group_id: ItemId,
    },

    #[serde(rename = "items/ungroup")]
    UngroupItems {
        diagram_id: DiagramId,
        group_ids: ItemIds,
    },

    #[serde(rename = "items/select")]
    SelectItems {
        diagram_id: DiagramId,
        item_ids: ItemIds,
    },

    #[serde(rename = "editor/size")]
    ChangeSize { width: f32, height: f32 },

    #[serde(rename = "editor/color")]
    ChangeColor { color: Color },
}

impl Action {
    /// A new diagram with a freshly minted id.
    pub fn add_diagram() -> Self {
        Action::AddDiagram {
            diagram_id: DiagramId::fresh(),
        }
    }

    /// A new shape with a freshly minted id.
    pub fn add_item(diagram_id: DiagramId, renderer: impl Into<String>, geometry: Geometry) -> Self {
        Action::AddItem {
            diagram_id,
            item_id: ItemId::fresh(),
            renderer: renderer.into(),
            geometry,
            appearance: Appearance::new(),
        }
    }

    /// Group `item_ids` under a freshly minted group id.
    pub fn group_items(diagram_id: DiagramId, item_ids: impl IntoIterator<Item = ItemId>) -> Self {
        Action::GroupItems {
            diagram_id,
            item_ids: item_ids.into_iter().collect(),
            group_id: ItemId::fresh(),
        }
    }

    pub fn select_items(diagram_id: DiagramId, item_ids: impl IntoIterator<Item = ItemId>) -> Self {
        Action::SelectItems {
            diagram_id,
            item_ids: item_ids.into_iter().collect(),
        }
    }

    /// The wire `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::AddDiagram { .. } => "diagram/add",
            Action::SelectDiagram { .. } => "diagram/select",
            Action::RemoveDiagram { .. } => "diagram/remove",
            Action::AddItem { .. } => "items/add",
            Action::MoveItems { .. } => "items/move",
            Action::ResizeItem { .. } => "items/resize",
            Action::ChangeAppearance { .. } => "items/appearance",
            Action::RemoveItems { .. } => "items/remove",
            Action::GroupItems { .. } => "items/group",
            Action::UngroupItems { .. } => "items/ungroup",
            Action::SelectItems { .. } => "items/select",
            Action::ChangeSize { .. } => "editor/size",
            Action::ChangeColor { .. } => "editor/color",
        }
    }

    /// The diagram this action edits, if it is diagram-scoped.
    pub fn target_diagram_id(&self) -> Option<DiagramId> {
        match self {
            Action::AddDiagram { diagram_id }
            | Action::SelectDiagram { diagram_id }
            | Action::RemoveDiagram { diagram_id }
            | Action::AddItem { diagram_id, .. }
            | Action::MoveItems { diagram_id, .. }
            | Action::ResizeItem { diagram_id, .. }
            | Action::ChangeAppearance { diagram_id, .. }
            | Action::RemoveItems { diagram_id, .. }
            | Action::GroupItems { diagram_id, .. }
            | Action::UngroupItems { diagram_id, .. }
            | Action::SelectItems { diagram_id, .. } => Some(*diagram_id),
            Action::ChangeSize { .. } | Action::ChangeColor { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn wire_shape_is_type_and_payload() {
        let action = Action::GroupItems {
            diagram_id: DiagramId::intern("1"),
            item_ids: [ItemId::intern("A"), ItemId::intern("B")].into_iter().collect(),
            group_id: ItemId::intern("G"),
        };
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "items/group",
                "payload": { "diagramId": "1", "itemIds": ["A", "B"], "groupId": "G" }
            })
        );
        assert_eq!(value["type"], action.kind());
    }

    #[test]
    fn decodes_color_and_defaults_appearance() {
        let color: Action = serde_json::from_value(json!({
            "type": "editor/color",
            "payload": { "color": "#336699" }
        }))
        .unwrap();
        assert_eq!(
            color,
            Action::ChangeColor {
                color: Color::from_hex("#336699").unwrap()
            }
        );

        let add: Action = serde_json::from_value(json!({
            "type": "items/add",
            "payload": {
                "diagramId": "1",
                "itemId": "A",
                "renderer": "Button",
                "geometry": { "x": 1.0, "y": 2.0, "width": 3.0, "height": 4.0 }
            }
        }))
        .unwrap();
        match add {
            Action::AddItem { appearance, geometry, .. } => {
                assert!(appearance.is_empty());
                assert_eq!(geometry, Geometry::rect(1.0, 2.0, 3.0, 4.0));
            }
            other => panic!("expected AddItem, got {other:?}"),
        }
    }

    #[test]
    fn unknown_type_is_rejected() {
        let result = serde_json::from_value::<Action>(json!({
            "type": "items/lock",
            "payload": {}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn target_diagram() {
        assert_eq!(Action::ChangeSize { width: 1.0, height: 1.0 }.target_diagram_id(), None);
        let id = DiagramId::intern("page");
        assert_eq!(Action::select_items(id, std::iter::empty()).target_diagram_id(), Some(id));
    }
}
