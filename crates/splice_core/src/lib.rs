pub mod config;
pub mod editing;
pub mod error;
pub mod graph;
pub mod history;
pub mod progress;
pub mod provider;
pub mod session;
pub mod types;
pub mod validate;

#[cfg(test)]
pub(crate) mod testing;

pub use config::EditorConfig;
pub use editing::{EditOutcome, EditPlan, Editor};
pub use error::{CoreError, Result};
pub use history::CacheHandler;
pub use provider::{MediaProvider, RenderRequest};
pub use session::EditSession;
