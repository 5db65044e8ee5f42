use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct StagedFile {
    pub file: String,
    pub table: String,
    pub sha256: String,
    pub rows_loaded: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransformStep {
    pub step: String,
    pub rows_written: u64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SanityCounts {
    pub enterprises: i64,
    pub establishments: i64,
    pub addresses: i64,
    pub contacts: i64,
    pub activities: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestPaths {
    pub files_dir: String,
    pub db_path: String,
    pub staging_db_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub db_schema_version: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub failure_reason: Option<String>,
    pub workers: usize,
    pub paths: IngestPaths,
    pub staged_files: Vec<StagedFile>,
    pub transform_steps: Vec<TransformStep>,
    pub counts: Option<SanityCounts>,
}
