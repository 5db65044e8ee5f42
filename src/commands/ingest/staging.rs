use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

use anyhow::{Context, Result, bail};
use crossbeam_channel::{Receiver, Sender, bounded};
use rusqlite::{Connection, TransactionBehavior, params_from_iter};
use tracing::{debug, info};

use crate::error::RegistryError;
use crate::model::StagedFile;
use crate::store::STAGING_SCHEMA;
use crate::util::sha256_file;

const ROWS_PER_BATCH: usize = 1_000;

/// One source file and the staging table it is copied into. `columns` is the
/// exact header the file must carry, in order.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StagingJob {
    pub table: &'static str,
    pub file: &'static str,
    pub columns: &'static [&'static str],
}

pub(crate) const STAGING_JOBS: &[StagingJob] = &[
    StagingJob {
        table: "code",
        file: "code.csv",
        columns: &["Category", "Code", "Language", "Description"],
    },
    StagingJob {
        table: "enterprise",
        file: "enterprise.csv",
        columns: &[
            "EnterpriseNumber",
            "Status",
            "JuridicalSituation",
            "TypeOfEnterprise",
            "JuridicalForm",
            "JuridicalFormCAC",
            "StartDate",
        ],
    },
    StagingJob {
        table: "establishment",
        file: "establishment.csv",
        columns: &["EstablishmentNumber", "StartDate", "EnterpriseNumber"],
    },
    StagingJob {
        table: "branch",
        file: "branch.csv",
        columns: &["Id", "StartDate", "EnterpriseNumber"],
    },
    StagingJob {
        table: "denomination",
        file: "denomination.csv",
        columns: &[
            "EntityNumber",
            "Language",
            "TypeOfDenomination",
            "Denomination",
        ],
    },
    StagingJob {
        table: "address",
        file: "address.csv",
        columns: &[
            "EntityNumber",
            "TypeOfAddress",
            "CountryNL",
            "CountryFR",
            "Zipcode",
            "MunicipalityNL",
            "MunicipalityFR",
            "StreetNL",
            "StreetFR",
            "HouseNumber",
            "Box",
            "ExtraAddressInfo",
            "DateStrikingOff",
        ],
    },
    StagingJob {
        table: "contact",
        file: "contact.csv",
        columns: &["EntityNumber", "EntityContact", "ContactType", "Value"],
    },
    StagingJob {
        table: "activity",
        file: "activity.csv",
        columns: &[
            "EntityNumber",
            "ActivityGroup",
            "NaceVersion",
            "NaceCode",
            "Classification",
        ],
    },
    StagingJob {
        table: "meta",
        file: "meta.csv",
        columns: &["Variable", "Value"],
    },
    StagingJob {
        table: "nacebel2025",
        file: "NACEBEL_2025.csv",
        columns: &[
            "LEVEL",
            "CODE",
            "NATIONAL_TITLE_BE_NL",
            "NATIONAL_TITLE_BE_FR",
            "NATIONAL_TITLE_BE_DE",
            "NATIONAL_TITLE_BE_EN",
        ],
    },
];

impl StagingJob {
    fn qualified_table(&self) -> String {
        format!("{STAGING_SCHEMA}.{}", self.table)
    }

    fn insert_sql(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|column| format!("\"{column}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=self.columns.len())
            .map(|index| format!("?{index}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO {}({columns}) VALUES({placeholders})",
            self.qualified_table()
        )
    }
}

enum StagingBatch {
    Rows {
        job: usize,
        rows: Vec<Vec<String>>,
    },
    Finished {
        job: usize,
        sha256: String,
        rows_loaded: u64,
    },
}

/// Fails on the first missing file, before any staging table is touched.
pub(crate) fn verify_sources(files_dir: &Path, jobs: &[StagingJob]) -> Result<Vec<PathBuf>> {
    jobs.iter()
        .map(|job| {
            let path = files_dir.join(job.file);
            if !path.is_file() {
                return Err(RegistryError::MissingSourceFile { path }.into());
            }
            Ok(path)
        })
        .collect()
}

/// Truncates and refills every staging table inside one write transaction.
///
/// Files are read and parsed by up to `workers` threads; their rows reach the
/// single SQLite writer through a bounded channel so a fast reader cannot
/// buffer more than a few batches ahead of the store. Any failure rolls the
/// whole staging phase back.
pub(crate) fn load_staging_tables(
    connection: &mut Connection,
    files_dir: &Path,
    jobs: &[StagingJob],
    workers: usize,
) -> Result<Vec<StagedFile>> {
    let paths = verify_sources(files_dir, jobs)?;
    let worker_count = workers.clamp(1, jobs.len().max(1));

    let tx = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;
    for job in jobs {
        info!(table = %job.qualified_table(), "truncating staging table");
        tx.execute(&format!("DELETE FROM {}", job.qualified_table()), [])
            .with_context(|| format!("failed to truncate {}", job.qualified_table()))?;
    }

    let next_job = AtomicUsize::new(0);
    let cancelled = AtomicBool::new(false);
    let (sender, receiver) = bounded::<StagingBatch>(worker_count * 2);

    let (write_result, reader_results) = thread::scope(|scope| {
        let handles = (0..worker_count)
            .map(|_| {
                let sender = sender.clone();
                let next_job = &next_job;
                let cancelled = &cancelled;
                let paths = &paths;
                scope.spawn(move || read_jobs(jobs, paths, next_job, cancelled, sender))
            })
            .collect::<Vec<_>>();
        drop(sender);

        let write_result = write_batches(&tx, jobs, receiver);
        if write_result.is_err() {
            cancelled.store(true, Ordering::Relaxed);
        }

        let reader_results = handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|_| Err(anyhow::anyhow!("staging reader thread panicked")))
            })
            .collect::<Vec<_>>();
        (write_result, reader_results)
    });

    for result in reader_results {
        result?;
    }
    let staged = write_result?;

    tx.commit().context("failed to commit staging load")?;
    Ok(staged)
}

fn read_jobs(
    jobs: &[StagingJob],
    paths: &[PathBuf],
    next_job: &AtomicUsize,
    cancelled: &AtomicBool,
    sender: Sender<StagingBatch>,
) -> Result<()> {
    loop {
        if cancelled.load(Ordering::Relaxed) {
            return Ok(());
        }
        let index = next_job.fetch_add(1, Ordering::Relaxed);
        let Some(job) = jobs.get(index) else {
            return Ok(());
        };

        if let Err(err) = stream_file(index, job, &paths[index], cancelled, &sender) {
            cancelled.store(true, Ordering::Relaxed);
            return Err(err);
        }
    }
}

fn stream_file(
    index: usize,
    job: &StagingJob,
    path: &Path,
    cancelled: &AtomicBool,
    sender: &Sender<StagingBatch>,
) -> Result<()> {
    info!(file = job.file, table = %job.qualified_table(), "copying source file");

    let sha256 = sha256_file(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(b',')
        .quote(b'"')
        .double_quote(true)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let headers = reader
        .headers()
        .map_err(|err| staging_row_error(job, &err))?
        .clone();
    check_header(job, &headers)?;

    let mut batch = Vec::with_capacity(ROWS_PER_BATCH);
    let mut rows_loaded = 0_u64;
    for record in reader.records() {
        let record = record.map_err(|err| staging_row_error(job, &err))?;
        batch.push(record.iter().map(str::to_string).collect::<Vec<_>>());
        rows_loaded += 1;

        if batch.len() == ROWS_PER_BATCH {
            if cancelled.load(Ordering::Relaxed) {
                return Ok(());
            }
            let rows = std::mem::replace(&mut batch, Vec::with_capacity(ROWS_PER_BATCH));
            if sender.send(StagingBatch::Rows { job: index, rows }).is_err() {
                return Ok(());
            }
        }
    }

    if !batch.is_empty() && sender.send(StagingBatch::Rows { job: index, rows: batch }).is_err() {
        return Ok(());
    }
    let _ = sender.send(StagingBatch::Finished {
        job: index,
        sha256,
        rows_loaded,
    });
    Ok(())
}

fn check_header(job: &StagingJob, headers: &csv::StringRecord) -> Result<()> {
    let found = headers
        .iter()
        .enumerate()
        .map(|(position, name)| {
            // A BOM ahead of an opening quote leaves the quotes in the field.
            let name = if position == 0 {
                name.trim_start_matches('\u{feff}').trim_matches('"')
            } else {
                name
            };
            name.trim().to_string()
        })
        .collect::<Vec<_>>();

    if found.iter().map(String::as_str).ne(job.columns.iter().copied()) {
        return Err(RegistryError::HeaderMismatch {
            file: job.file.to_string(),
            expected: job.columns.join(","),
            found: found.join(","),
        }
        .into());
    }
    Ok(())
}

fn staging_row_error(job: &StagingJob, err: &csv::Error) -> anyhow::Error {
    let line = err.position().map(|position| position.line()).unwrap_or(0);
    RegistryError::StagingRow {
        file: job.file.to_string(),
        line,
        message: err.to_string(),
    }
    .into()
}

fn write_batches(
    connection: &Connection,
    jobs: &[StagingJob],
    receiver: Receiver<StagingBatch>,
) -> Result<Vec<StagedFile>> {
    let mut finished: Vec<Option<StagedFile>> = vec![None; jobs.len()];

    for batch in receiver {
        match batch {
            StagingBatch::Rows { job, rows } => {
                let staging_job = &jobs[job];
                let mut statement = connection.prepare_cached(&staging_job.insert_sql())?;
                for row in &rows {
                    statement
                        .execute(params_from_iter(row.iter()))
                        .with_context(|| {
                            format!("failed to stage row into {}", staging_job.qualified_table())
                        })?;
                }
                debug!(table = %staging_job.qualified_table(), rows = rows.len(), "staged batch");
            }
            StagingBatch::Finished {
                job,
                sha256,
                rows_loaded,
            } => {
                let staging_job = &jobs[job];
                info!(
                    file = staging_job.file,
                    table = %staging_job.qualified_table(),
                    rows = rows_loaded,
                    "staging table loaded"
                );
                finished[job] = Some(StagedFile {
                    file: staging_job.file.to_string(),
                    table: staging_job.qualified_table(),
                    sha256,
                    rows_loaded,
                });
            }
        }
    }

    let mut staged = Vec::with_capacity(jobs.len());
    for (job, entry) in jobs.iter().zip(finished) {
        match entry {
            Some(entry) => staged.push(entry),
            None => bail!("staging of {} did not complete", job.file),
        }
    }
    Ok(staged)
}
