pub mod convert;
pub mod error;
pub mod history;
pub mod ids;
pub mod model;
pub mod patch;
pub mod time;

pub use error::CoreError;
pub use history::{ActionType, Activity, HistoryEntry, UserHistory};
pub use ids::*;
pub use model::*;
