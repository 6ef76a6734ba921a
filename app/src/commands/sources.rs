//! Source management commands.

use super::parse_source_id;
use crate::error::CommandError;
use crate::state::AppState;
use eventide_sources::{
    EventSource, ImportSummary, SourceDefinition, SourceFilter, SourceLoader, SourceUpdate,
};
use std::path::Path;
use tracing::info;

/// List sources matching `filter`, ordered by id.
pub fn list_sources(state: &AppState, filter: SourceFilter) -> Vec<EventSource> {
    state.registry.list(&filter)
}

/// Get one source.
pub fn get_source(state: &AppState, source_id: &str) -> Result<EventSource, CommandError> {
    let id = parse_source_id(source_id)?;
    Ok(state.registry.get(&id)?)
}

/// Create a source from a definition.
pub async fn create_source(
    state: &AppState,
    definition: SourceDefinition,
) -> Result<EventSource, CommandError> {
    let source = state.registry.create(definition).await?;
    info!(source_id = %source.id, "source created");
    Ok(source)
}

/// Apply a partial update.
pub async fn update_source(
    state: &AppState,
    source_id: &str,
    update: SourceUpdate,
) -> Result<EventSource, CommandError> {
    let id = parse_source_id(source_id)?;
    Ok(state.registry.update(&id, update).await?)
}

/// Delete a source. Its stored events are kept.
pub async fn delete_source(state: &AppState, source_id: &str) -> Result<(), CommandError> {
    let id = parse_source_id(source_id)?;
    state.registry.delete(&id).await?;
    info!(source_id = %id, "source deleted");
    Ok(())
}

/// Reactivate a source.
pub async fn activate_source(state: &AppState, source_id: &str) -> Result<EventSource, CommandError> {
    let id = parse_source_id(source_id)?;
    Ok(state.registry.activate(&id).await?)
}

/// Deactivate a source.
pub async fn deactivate_source(state: &AppState, source_id: &str) -> Result<EventSource, CommandError> {
    let id = parse_source_id(source_id)?;
    Ok(state.registry.deactivate(&id).await?)
}

/// Clear a source's error count. Does not reactivate it.
pub async fn reset_source_errors(state: &AppState, source_id: &str) -> Result<EventSource, CommandError> {
    let id = parse_source_id(source_id)?;
    Ok(state.registry.reset_error_count(&id).await?)
}

/// Import definition files from `dir`, or from the configured directory.
pub async fn import_sources(state: &AppState, dir: Option<&Path>) -> Result<ImportSummary, CommandError> {
    let loader = match dir.or(state.config.sources.definitions_dir.as_deref()) {
        Some(dir) => SourceLoader::new(dir)?,
        None => SourceLoader::with_default_dir()?,
    };
    Ok(state.registry.import(&loader).await?)
}
