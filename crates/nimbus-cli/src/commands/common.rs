use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use nimbus_core::display::{DisplaySink, JsonFileDisplay, LogDisplay};
use nimbus_core::models::{MutationId, PendingMutation, SyncState};
use nimbus_core::remote::RemoteStore;
use nimbus_core::util::format_relative_time;
use nimbus_core::{LocalStore, SyncConfig};
use serde::Serialize;

use crate::error::CliError;

/// Resolved invocation settings shared by every command.
pub struct Context {
    pub db_path: PathBuf,
    pub config: SyncConfig,
}

#[derive(Debug, Serialize)]
pub struct MutationListItem {
    pub id: String,
    pub state: SyncState,
    pub location: String,
    pub condition: String,
    pub intensity: u8,
    pub created_at: i64,
    pub relative_time: String,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub synced_at: Option<i64>,
}

pub fn open_store(ctx: &Context) -> Result<LocalStore, CliError> {
    Ok(LocalStore::open_path(&ctx.db_path)?.with_max_attempts(ctx.config.max_attempts))
}

pub fn remote_store(ctx: &Context) -> Result<Option<Arc<dyn RemoteStore>>, CliError> {
    Ok(ctx
        .config
        .http_remote()?
        .map(|remote| Arc::new(remote) as Arc<dyn RemoteStore>))
}

pub fn require_remote(
    ctx: &Context,
    command: &'static str,
) -> Result<Arc<dyn RemoteStore>, CliError> {
    remote_store(ctx)?.ok_or(CliError::RemoteNotConfigured(command))
}

pub fn display_sink(ctx: &Context) -> Arc<dyn DisplaySink> {
    match &ctx.config.display_path {
        Some(path) => Arc::new(JsonFileDisplay::new(path.clone())),
        None => Arc::new(LogDisplay),
    }
}

/// Resolve a full report ID or a unique ID prefix.
pub async fn resolve_mutation(
    query: &str,
    store: &LocalStore,
) -> Result<PendingMutation, CliError> {
    if let Ok(id) = query.parse::<MutationId>() {
        if let Some(mutation) = store.get_mutation(&id).await? {
            return Ok(mutation);
        }
    }

    let matching_ids = store.list_ids_by_prefix(query, 3).await?;
    match matching_ids.as_slice() {
        [] => Err(CliError::MutationNotFound(query.to_string())),
        [id] => store
            .get_mutation(id)
            .await?
            .ok_or_else(|| CliError::MutationNotFound(query.to_string())),
        ids => {
            let options = ids
                .iter()
                .map(|id| short_id(id))
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousMutationId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn normalize_mutation_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyMutationId)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn short_id(id: &MutationId) -> String {
    id.to_string().chars().take(13).collect()
}

pub fn format_mutation_lines(mutations: &[PendingMutation]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    mutations
        .iter()
        .map(|mutation| {
            let short_id = short_id(&mutation.id);
            let state = mutation.state.as_str();
            let summary = report_summary(mutation, 32);
            let relative_time = format_relative_time(mutation.created_at(), now_ms);

            match mutation.last_error.as_deref() {
                Some(error) if mutation.state != SyncState::Synced => format!(
                    "{short_id:<13}  {state:<7}  {summary:<32}  {relative_time:<10}  [{} attempt(s)] {error}",
                    mutation.attempts
                ),
                _ => format!("{short_id:<13}  {state:<7}  {summary:<32}  {relative_time}"),
            }
        })
        .collect()
}

pub fn mutation_to_list_item(mutation: &PendingMutation) -> MutationListItem {
    let now_ms = Utc::now().timestamp_millis();
    MutationListItem {
        id: mutation.id.to_string(),
        state: mutation.state,
        location: mutation.payload.location_label.clone(),
        condition: mutation.payload.condition.clone(),
        intensity: mutation.payload.intensity,
        created_at: mutation.created_at(),
        relative_time: format_relative_time(mutation.created_at(), now_ms),
        attempts: mutation.attempts,
        last_error: mutation.last_error.clone(),
        synced_at: mutation.synced_at,
    }
}

/// "Lisbon: rain (3/5)", truncated to `max_chars`.
pub fn report_summary(mutation: &PendingMutation, max_chars: usize) -> String {
    let payload = &mutation.payload;
    let summary = format!(
        "{}: {} ({}/5)",
        payload.location_label, payload.condition, payload.intensity
    );

    if summary.chars().count() <= max_chars {
        summary
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = summary.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| env::var_os("NIMBUS_DB_PATH").map(PathBuf::from)) {
        return Ok(path);
    }
    default_db_path()
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("nimbus").join("nimbus.db"))
        .ok_or(CliError::DataDirUnavailable)
}
