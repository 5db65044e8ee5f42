use std::path::PathBuf;

use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

use crate::model::{SanityCounts, StagedFile, TransformStep};
use crate::store::{count_rows, open_store};

use super::db_setup::ensure_schema;
use super::staging::{STAGING_JOBS, StagingJob, load_staging_tables};
use super::transform::transform;

#[derive(Debug, Clone)]
pub(crate) struct PipelineConfig {
    pub files_dir: PathBuf,
    pub db_path: PathBuf,
    pub staging_db_path: PathBuf,
    pub workers: usize,
}

/// State of one ingest run. Owns the store connection for the run; dropping
/// the context closes it whichever phase the run stopped in. Results of the
/// phases that completed stay readable after a failure.
pub(crate) struct PipelineContext {
    connection: Connection,
    config: PipelineConfig,
    jobs: &'static [StagingJob],
    staged_files: Vec<StagedFile>,
    transform_steps: Vec<TransformStep>,
    counts: Option<SanityCounts>,
}

impl PipelineContext {
    pub(crate) fn open(config: PipelineConfig) -> Result<Self> {
        let connection = open_store(&config.db_path, &config.staging_db_path)?;
        Ok(Self {
            connection,
            config,
            jobs: STAGING_JOBS,
            staged_files: Vec::new(),
            transform_steps: Vec::new(),
            counts: None,
        })
    }

    /// Schema, staging, transform, then sanity counts. Each phase starts only
    /// after the previous one finished in full.
    pub(crate) fn run(&mut self) -> Result<()> {
        ensure_schema(&mut self.connection, self.jobs)?;

        self.staged_files = load_staging_tables(
            &mut self.connection,
            &self.config.files_dir,
            self.jobs,
            self.config.workers,
        )?;

        self.transform_steps = transform(&mut self.connection)?;

        let counts = sanity_counts(&self.connection)?;
        info!(
            enterprises = counts.enterprises,
            establishments = counts.establishments,
            addresses = counts.addresses,
            contacts = counts.contacts,
            activities = counts.activities,
            "sanity counts"
        );
        self.counts = Some(counts);

        Ok(())
    }

    pub(crate) fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub(crate) fn staged_files(&self) -> &[StagedFile] {
        &self.staged_files
    }

    pub(crate) fn transform_steps(&self) -> &[TransformStep] {
        &self.transform_steps
    }

    pub(crate) fn counts(&self) -> Option<&SanityCounts> {
        self.counts.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.connection
    }
}

pub(crate) fn sanity_counts(connection: &Connection) -> Result<SanityCounts> {
    Ok(SanityCounts {
        enterprises: count_rows(connection, "enterprise")?,
        establishments: count_rows(connection, "establishment")?,
        addresses: count_rows(connection, "address")?,
        contacts: count_rows(connection, "contact")?,
        activities: count_rows(connection, "activity")?,
    })
}
