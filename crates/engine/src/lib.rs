pub mod auto_filter;
pub mod cell;
pub mod clipboard;
pub mod cols;
pub mod data_proxy;
pub mod error;
pub mod events;
pub mod formula;
pub mod history;
pub mod merges;
pub mod rows;
pub mod selector;
pub mod settings;
pub mod snapshot;
pub mod style;
pub mod validation;

pub use data_proxy::{CellAttr, DataProxy, EditState, Viewport};
pub use error::GridError;
pub use merges::Axis;
pub use settings::SheetSettings;
pub use snapshot::SheetData;
