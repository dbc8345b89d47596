pub mod action;
pub mod action_log;
pub mod id;
pub mod model;
pub mod reducer;
pub mod selection;

pub use action::{Action, ItemIds};
pub use action_log::{ActionLog, DecodedLog, LogError};
pub use id::{DiagramId, ItemId};
pub use model::*;
pub use reducer::{Reduce, fold, reduce};
