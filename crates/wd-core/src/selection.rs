//! Selection resolution over grouped items.
//!
//! Groups are selected as a unit: asking for any member selects the
//! top-level group containing it together with everything inside it.

use crate::id::ItemId;
use crate::model::Diagram;
use std::collections::HashSet;

/// Expand `requested` into the definitive selection for `diagram`.
///
/// Each requested id is replaced by its top-level ancestor, and that ancestor
/// contributes itself plus all transitive descendants. Ids absent from the
/// diagram are ignored.
pub fn resolve(diagram: &Diagram, requested: impl IntoIterator<Item = ItemId>) -> HashSet<ItemId> {
    let mut selected = HashSet::new();
    for id in requested {
        let Some(top) = diagram.top_level_ancestor(id) else {
            continue;
        };
        if selected.insert(top) {
            selected.extend(diagram.descendants(top));
        }
    }
    selected
}

/// Select every root-level entity, including group containers.
pub fn select_all(diagram: &Diagram) -> HashSet<ItemId> {
    resolve(diagram, diagram.root_ids.iter().copied())
}

/// Shift-click behaviour: add the unit containing `id` to `current`, or remove
/// it when that unit is already selected.
pub fn toggle(diagram: &Diagram, current: &HashSet<ItemId>, id: ItemId) -> HashSet<ItemId> {
    let unit = resolve(diagram, [id]);
    let Some(top) = diagram.top_level_ancestor(id) else {
        return resolve(diagram, current.iter().copied());
    };

    let mut next = resolve(diagram, current.iter().copied());
    if next.contains(&top) {
        next.retain(|selected| !unit.contains(selected));
    } else {
        next.extend(unit);
    }
    next
}
