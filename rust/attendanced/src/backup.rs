use anyhow::{anyhow, Context};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const DB_ENTRY: &str = "db/attendance.sqlite3";
const META_WORKSPACE_ENTRY: &str = "meta/workspace.json";
const DB_FILE: &str = "attendance.sqlite3";
const STAGED_DB_FILE: &str = "attendance.sqlite3.importing";
const SQLITE_HEADER: &[u8] = b"SQLite format 3\0";
pub const BUNDLE_FORMAT_V1: &str = "attendance-workspace-v1";
pub const LEGACY_SQLITE_FORMAT: &str = "legacy-sqlite3";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub bundle_files: usize,
    pub db_sha256: String,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
}

fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

pub fn export_workspace_bundle(
    workspace_path: &Path,
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    let db_path = workspace_path.join(DB_FILE);
    if !db_path.is_file() {
        return Err(anyhow!(
            "workspace database not found: {}",
            db_path.to_string_lossy()
        ));
    }

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }

    let db_bytes = std::fs::read(&db_path)
        .with_context(|| format!("failed to read database {}", db_path.to_string_lossy()))?;
    let db_sha256 = sha256_hex(&db_bytes);

    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": chrono::Utc::now().to_rfc3339(),
        "dbSha256": db_sha256,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.start_file(DB_ENTRY, opts)
        .context("failed to start database entry")?;
    zip.write_all(&db_bytes)
        .context("failed to write database entry")?;

    let workspace_meta = json!({
        "sourceWorkspace": workspace_path.to_string_lossy(),
    });
    zip.start_file(META_WORKSPACE_ENTRY, opts)
        .context("failed to start workspace metadata entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&workspace_meta)
            .context("failed to serialize workspace metadata")?
            .as_bytes(),
    )
    .context("failed to write workspace metadata entry")?;

    zip.finish().context("failed to finalize zip bundle")?;
    info!(out = %out_path.to_string_lossy(), "workspace bundle exported");

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        bundle_files: 3,
        db_sha256,
    })
}

/// A validated database waiting in the workspace to replace the live file.
#[derive(Debug)]
pub struct StagedImport {
    staged: PathBuf,
    dst: PathBuf,
    bundle_format_detected: String,
}

impl StagedImport {
    /// Moves the staged database over the workspace database.
    pub fn commit(self) -> anyhow::Result<ImportSummary> {
        if self.dst.exists() {
            std::fs::remove_file(&self.dst).with_context(|| {
                format!(
                    "failed to remove existing database {}",
                    self.dst.to_string_lossy()
                )
            })?;
        }
        std::fs::rename(&self.staged, &self.dst).with_context(|| {
            format!(
                "failed to move imported database to {}",
                self.dst.to_string_lossy()
            )
        })?;
        info!(
            dst = %self.dst.to_string_lossy(),
            format = %self.bundle_format_detected,
            "workspace database restored"
        );
        Ok(ImportSummary {
            bundle_format_detected: self.bundle_format_detected,
        })
    }
}

/// Reads and checks a bundle (or bare SQLite file) and writes the database
/// next to the live one. The live database is not modified.
pub fn stage_import(in_path: &Path, workspace_path: &Path) -> anyhow::Result<StagedImport> {
    let (db_bytes, format) = if is_zip_file(in_path)? {
        (read_bundle_db(in_path)?, BUNDLE_FORMAT_V1)
    } else {
        let bytes = std::fs::read(in_path)
            .with_context(|| format!("failed to read {}", in_path.to_string_lossy()))?;
        (bytes, LEGACY_SQLITE_FORMAT)
    };
    if !db_bytes.starts_with(SQLITE_HEADER) {
        return Err(anyhow!(
            "{} does not contain a SQLite database",
            in_path.to_string_lossy()
        ));
    }

    std::fs::create_dir_all(workspace_path).with_context(|| {
        format!(
            "failed to create workspace {}",
            workspace_path.to_string_lossy()
        )
    })?;
    let staged = workspace_path.join(STAGED_DB_FILE);
    if staged.exists() {
        let _ = std::fs::remove_file(&staged);
    }
    let mut db_out = File::create(&staged).with_context(|| {
        format!("failed to create temp database {}", staged.to_string_lossy())
    })?;
    db_out
        .write_all(&db_bytes)
        .and_then(|_| db_out.flush())
        .context("failed to write staged database")?;

    Ok(StagedImport {
        staged,
        dst: workspace_path.join(DB_FILE),
        bundle_format_detected: format.to_string(),
    })
}

pub fn import_workspace_bundle(
    in_path: &Path,
    workspace_path: &Path,
) -> anyhow::Result<ImportSummary> {
    stage_import(in_path, workspace_path)?.commit()
}

fn read_bundle_db(in_path: &Path) -> anyhow::Result<Vec<u8>> {
    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: serde_json::Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT_V1 {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }
    let expected = manifest
        .get("dbSha256")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("manifest.json is missing dbSha256"))?;

    let mut db_bytes = Vec::new();
    archive
        .by_name(DB_ENTRY)
        .context("bundle missing db/attendance.sqlite3")?
        .read_to_end(&mut db_bytes)
        .context("failed to extract database entry")?;
    let actual = sha256_hex(&db_bytes);
    if actual != expected {
        return Err(anyhow!(
            "database checksum mismatch: manifest {}, bundle {}",
            expected,
            actual
        ));
    }
    Ok(db_bytes)
}

fn is_zip_file(path: &Path) -> anyhow::Result<bool> {
    let mut f = File::open(path)
        .with_context(|| format!("failed to open input file {}", path.to_string_lossy()))?;
    let mut sig = [0u8; 4];
    let read = f.read(&mut sig).context("failed to read file signature")?;
    if read < 4 {
        return Ok(false);
    }
    Ok(sig == [0x50, 0x4B, 0x03, 0x04])
}
