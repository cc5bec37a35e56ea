use nimbus_core::models::{PendingMutation, SyncState};

use crate::commands::common::{
    format_mutation_lines, mutation_to_list_item, normalize_mutation_identifier, open_store,
    resolve_mutation, Context, MutationListItem,
};
use crate::error::CliError;

pub async fn run_queue(
    all: bool,
    limit: usize,
    as_json: bool,
    ctx: &Context,
) -> Result<(), CliError> {
    let store = open_store(ctx)?;
    let mutations = if all {
        store.list_mutations(limit).await?
    } else {
        store.list_pending().await?.into_iter().take(limit).collect()
    };

    if as_json {
        let json_items = mutations
            .iter()
            .map(mutation_to_list_item)
            .collect::<Vec<MutationListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if mutations.is_empty() {
        println!("{}", empty_queue_message(all));
        return Ok(());
    }

    for line in format_mutation_lines(&mutations) {
        println!("{line}");
    }
    Ok(())
}

pub const fn empty_queue_message(all: bool) -> &'static str {
    if all {
        "No reports recorded."
    } else {
        "No reports waiting to sync."
    }
}

pub async fn run_discard(id: &str, ctx: &Context) -> Result<(), CliError> {
    let normalized_id = normalize_mutation_identifier(id)?;
    let store = open_store(ctx)?;
    let mutation = discard_mutation(&normalized_id, &store).await?;

    println!("{}", mutation.id);
    Ok(())
}

pub async fn discard_mutation(
    query: &str,
    store: &nimbus_core::LocalStore,
) -> Result<PendingMutation, CliError> {
    let mutation = resolve_mutation(query, store).await?;
    if mutation.state == SyncState::Synced {
        return Err(CliError::MutationNotFound(format!(
            "{query} (already synced)"
        )));
    }
    store.discard(&mutation.id).await?;
    Ok(mutation)
}

pub async fn run_retry_failed(ctx: &Context) -> Result<(), CliError> {
    let store = open_store(ctx)?;
    let requeued = store.requeue_failed().await?;
    println!("Requeued {requeued} report(s)");
    Ok(())
}
