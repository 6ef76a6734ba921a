//! Admin command handlers.
//!
//! Plain async functions over [`AppState`](crate::state::AppState) for
//! whatever admin surface embeds the worker.

pub mod jobs;
pub mod metrics;
pub mod sources;

use crate::error::CommandError;
use eventide_core::SourceId;

pub(crate) fn parse_source_id(id: &str) -> Result<SourceId, CommandError> {
    SourceId::new(id).map_err(CommandError::from)
}
