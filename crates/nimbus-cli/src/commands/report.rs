use chrono::Utc;
use nimbus_core::models::ReportPayload;
use nimbus_core::{ReportService, SubmitOutcome};

use crate::cli::ReportArgs;
use crate::commands::common::{open_store, remote_store, Context};
use crate::error::CliError;

pub fn payload_from_args(args: ReportArgs, created_at: i64) -> ReportPayload {
    ReportPayload {
        user_id: args.user,
        location_id: args.location_id,
        location_label: args.label,
        latitude: args.lat,
        longitude: args.lon,
        condition: args.condition,
        intensity: args.intensity,
        temperature_c: args.temperature,
        humidity_pct: args.humidity,
        wind_speed_kmh: args.wind,
        note: args.note,
        created_at,
    }
}

pub async fn run_report(args: ReportArgs, ctx: &Context) -> Result<(), CliError> {
    let store = open_store(ctx)?;
    let service = ReportService::new(store, remote_store(ctx)?);

    let payload = payload_from_args(args, Utc::now().timestamp_millis());
    match service.submit(payload).await? {
        SubmitOutcome::Delivered(id) => println!("{id}  delivered"),
        SubmitOutcome::Queued { id, reason } => println!("{id}  queued ({reason})"),
    }
    Ok(())
}
