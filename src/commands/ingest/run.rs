use anyhow::Result;
use chrono::Utc;
use tracing::{info, warn};

use crate::cli::IngestArgs;
use crate::model::{IngestPaths, IngestRunManifest};
use crate::store::default_staging_path;
use crate::util::{ensure_directory, now_utc_string, utc_compact_string, write_json_pretty};

use super::context::{PipelineConfig, PipelineContext};
use super::db_setup::DB_SCHEMA_VERSION;

pub fn run(args: IngestArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let db_path = args.store.resolved_db_path();
    if let Some(parent) = db_path.parent() {
        ensure_directory(parent)?;
    }
    let staging_db_path = args
        .staging_db_path
        .clone()
        .unwrap_or_else(|| default_staging_path(&db_path));
    let manifest_path = args.manifest_path.clone().unwrap_or_else(|| {
        args.store
            .cache_root
            .join("manifests")
            .join(format!("ingest_run_{}.json", utc_compact_string(started_ts)))
    });

    info!(
        run_id = %run_id,
        files_dir = %args.files_dir.display(),
        db_path = %db_path.display(),
        workers = args.workers,
        "starting ingest"
    );

    let mut context = PipelineContext::open(PipelineConfig {
        files_dir: args.files_dir.clone(),
        db_path,
        staging_db_path,
        workers: args.workers.max(1),
    })?;

    let outcome = context.run();
    let failure_reason = outcome.as_ref().err().map(|err| format!("{err:#}"));

    let config = context.config();
    let manifest = IngestRunManifest {
        manifest_version: 1,
        run_id: run_id.clone(),
        db_schema_version: DB_SCHEMA_VERSION.to_string(),
        status: if outcome.is_ok() { "completed" } else { "failed" }.to_string(),
        started_at,
        updated_at: now_utc_string(),
        failure_reason,
        workers: config.workers,
        paths: IngestPaths {
            files_dir: config.files_dir.display().to_string(),
            db_path: config.db_path.display().to_string(),
            staging_db_path: config.staging_db_path.display().to_string(),
        },
        staged_files: context.staged_files().to_vec(),
        transform_steps: context.transform_steps().to_vec(),
        counts: context.counts().cloned(),
    };
    drop(context);

    let written = write_json_pretty(&manifest_path, &manifest);
    match (&outcome, written) {
        (_, Ok(())) => info!(path = %manifest_path.display(), "wrote ingest run manifest"),
        // The run's own failure is the one worth returning.
        (Err(_), Err(err)) => warn!(
            path = %manifest_path.display(),
            error = %format!("{err:#}"),
            "failed to write ingest run manifest"
        ),
        (Ok(()), Err(err)) => return Err(err),
    }

    outcome?;
    info!(run_id = %run_id, "ingest completed");
    Ok(())
}
