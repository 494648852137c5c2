//! Routine synchronization: replace the on-disk snapshot of a schema's
//! routines with what the catalog currently reports.
//!
//! A run moves through fixed steps. Each step resolves its own failures by
//! logging them and recording them in the [`SyncReport`]; nothing is
//! returned as an error.
//!
//! 1. Validate the configuration. Invalid settings stop the run before any
//!    connection or filesystem access.
//! 2. Read the catalog. Zero routines stop the run before any filesystem
//!    access.
//! 3. Replace the kind directories and write one file per routine.
//!
//! # Replacement modes
//!
//! In **direct** mode every kind directory is deleted, recreated, and then
//! filled. A crash between deletion and the last write leaves a partial
//! snapshot.
//!
//! In **staged** mode each kind directory is built in a hidden sibling
//! staging directory and renamed into place. The previous directory is
//! removed only after the swap succeeded, so a failure while staging one kind
//! leaves that kind's previous snapshot intact.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use routine_sync_core::{Routine, RoutineKind};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::catalog::RoutineCatalog;
use crate::config::ContextConfig;
use crate::error::SyncError;
use crate::executor::Connector;
use crate::layout::{SchemaLayout, file_name};

const MSG_NO_ROUTINES: &str = "There are no routines associated with the schema.";

/// How a synchronization run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Routines were read and the snapshot was replaced. Individual file
    /// failures may still be listed in the report.
    Completed,
    /// The catalog returned no routines; the filesystem was not touched.
    #[default]
    NoRoutines,
    /// The catalog could not be read or its query was rejected; the
    /// filesystem was not touched.
    CatalogUnavailable,
    /// The configuration failed validation; nothing was attempted.
    InvalidConfig,
}

/// Number of routines read per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct KindCounts {
    pub procedures: usize,
    pub scalar_functions: usize,
    pub table_functions: usize,
    pub unmapped: usize,
}

impl KindCounts {
    pub fn tally(routines: &[Routine]) -> Self {
        routines.iter().fold(Self::default(), |mut counts, routine| {
            match routine.kind {
                Some(RoutineKind::Procedure) => counts.procedures += 1,
                Some(RoutineKind::ScalarFunction) => counts.scalar_functions += 1,
                Some(RoutineKind::TableFunction) => counts.table_functions += 1,
                None => counts.unmapped += 1,
            }
            counts
        })
    }

    pub fn total(&self) -> usize {
        self.procedures + self.scalar_functions + self.table_functions + self.unmapped
    }
}

/// A routine file written by a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenFile {
    pub path: PathBuf,
    pub kind: Option<RoutineKind>,
    pub bytes: usize,
    /// Lowercase hex SHA-256 of the file contents.
    pub sha256: String,
}

/// Summary of one synchronization run.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub status: SyncStatus,
    pub message: String,
    pub counts: KindCounts,
    pub written: Vec<WrittenFile>,
    pub failures: Vec<SyncError>,
}

impl SyncReport {
    fn stopped(status: SyncStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            ..Self::default()
        }
    }

    /// `true` when the run completed without any recorded failure.
    pub fn is_clean(&self) -> bool {
        self.status == SyncStatus::Completed && self.failures.is_empty()
    }

    /// Files written for `kind`, in catalog order.
    pub fn files_for(&self, kind: Option<RoutineKind>) -> impl Iterator<Item = &WrittenFile> {
        self.written.iter().filter(move |file| file.kind == kind)
    }
}

/// Re-materializes every routine of one data context as a source file.
#[derive(Debug)]
pub struct Synchronizer<C> {
    config: ContextConfig,
    catalog: RoutineCatalog<C>,
    layout: SchemaLayout,
}

impl<C: Connector> Synchronizer<C> {
    /// Creates a synchronizer that reads routines with `catalog_query`.
    pub fn new(config: ContextConfig, connector: C, catalog_query: impl Into<String>) -> Self {
        let catalog = RoutineCatalog::new(connector, catalog_query);
        Self::with_catalog(config, catalog)
    }

    /// Creates a synchronizer around an existing catalog reader. The
    /// configured command timeout replaces the reader's.
    pub fn with_catalog(config: ContextConfig, catalog: RoutineCatalog<C>) -> Self {
        let catalog = catalog.with_timeout(config.command_timeout());
        let layout = SchemaLayout::new(&config.schema_directory);
        Self {
            config,
            catalog,
            layout,
        }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn layout(&self) -> &SchemaLayout {
        &self.layout
    }

    /// Replaces the on-disk routine snapshot with the catalog's contents.
    pub fn synchronize(&self) -> SyncReport {
        if let Err(error) = self.config.validate() {
            warn!(%error, "Invalid configuration");
            return SyncReport::stopped(SyncStatus::InvalidConfig, error.to_string());
        }

        let outcome = self.catalog.fetch();
        if let Some(error) = outcome.error() {
            warn!(%error, "Could not read the routine catalog");
            return SyncReport::stopped(SyncStatus::CatalogUnavailable, outcome.message());
        }
        if outcome.is_rejected() {
            warn!(message = outcome.message(), "Catalog query was rejected");
            return SyncReport::stopped(SyncStatus::CatalogUnavailable, outcome.message());
        }

        let routines = outcome.into_items();
        let counts = KindCounts::tally(&routines);
        info!(
            scalar_functions = counts.scalar_functions,
            table_functions = counts.table_functions,
            procedures = counts.procedures,
            unmapped = counts.unmapped,
            "Read routine catalog"
        );

        if routines.is_empty() {
            info!("{MSG_NO_ROUTINES}");
            return SyncReport::stopped(SyncStatus::NoRoutines, MSG_NO_ROUTINES);
        }

        let mut report = SyncReport {
            status: SyncStatus::Completed,
            counts,
            ..SyncReport::default()
        };

        if self.config.staged_writes {
            self.replace_staged(&routines, &mut report);
        } else {
            self.replace_direct(&routines, &mut report);
        }

        report.message = format!(
            "Wrote {} of {} routines to {}.",
            report.written.len(),
            counts.total(),
            self.layout.root().display()
        );
        info!(
            written = report.written.len(),
            failures = report.failures.len(),
            root = %self.layout.root().display(),
            "Synchronization finished"
        );
        report
    }

    /// Reads the catalog and logs each routine without touching the
    /// filesystem.
    pub fn list_routines(&self) -> Vec<Routine> {
        let routines = self.catalog.list_routines();
        for routine in &routines {
            info!(
                routine = %routine.qualified_name(),
                kind = routine.kind.map(RoutineKind::label).unwrap_or("unmapped"),
                created = %routine.created,
                modified = %routine.modified,
                "Routine"
            );
        }
        routines
    }

    fn replace_direct(&self, routines: &[Routine], report: &mut SyncReport) {
        for dir in self.layout.kind_dirs() {
            match fs::remove_dir_all(&dir) {
                Ok(()) => debug!(path = %dir.display(), "Removed previous routines"),
                Err(source) if source.kind() == io::ErrorKind::NotFound => {}
                Err(source) => {
                    warn!(path = %dir.display(), error = %source, "Could not remove previous routines");
                    report.failures.push(SyncError::Delete { path: dir, source });
                }
            }
        }

        for dir in self.layout.required_dirs() {
            if let Err(source) = fs::create_dir_all(&dir) {
                warn!(path = %dir.display(), error = %source, "Could not create directory");
                report.failures.push(SyncError::Create { path: dir, source });
            }
        }

        for routine in routines {
            let path = self.layout.file_path(routine);
            match write_routine(&path, routine) {
                Ok(file) => report.written.push(file),
                Err(source) => {
                    warn!(path = %path.display(), error = %source, "Could not write routine");
                    report.failures.push(SyncError::Write { path, source });
                }
            }
        }
    }

    fn replace_staged(&self, routines: &[Routine], report: &mut SyncReport) {
        for kind in RoutineKind::ALL {
            let members: Vec<&Routine> = routines.iter().filter(|r| r.kind == Some(kind)).collect();
            let target = self.layout.kind_dir(kind);
            match stage_kind(&target, &members) {
                Ok(files) => {
                    debug!(path = %target.display(), files = files.len(), "Swapped staged routines");
                    report.written.extend(files);
                }
                Err(error) => {
                    warn!(%error, "Kept previous routines");
                    report.failures.push(error);
                }
            }
        }

        let root = self.layout.root();
        for routine in routines.iter().filter(|r| r.kind.is_none()) {
            let path = root.join(file_name(routine));
            match write_routine(&path, routine) {
                Ok(file) => report.written.push(file),
                Err(source) => {
                    warn!(path = %path.display(), error = %source, "Could not write routine");
                    report.failures.push(SyncError::Write { path, source });
                }
            }
        }
    }
}

/// Writes the definition bytes verbatim, overwriting any existing file.
fn write_routine(path: &Path, routine: &Routine) -> io::Result<WrittenFile> {
    let bytes = routine.definition.as_bytes();
    fs::write(path, bytes)?;
    Ok(WrittenFile {
        path: path.to_path_buf(),
        kind: routine.kind,
        bytes: bytes.len(),
        sha256: format!("{:x}", Sha256::digest(bytes)),
    })
}

/// Builds `target` from scratch next to itself and swaps it into place.
///
/// Reported paths are the final paths under `target`.
fn stage_kind(target: &Path, routines: &[&Routine]) -> Result<Vec<WrittenFile>, SyncError> {
    let stage_err = |source: io::Error| SyncError::Stage {
        path: target.to_path_buf(),
        source,
    };

    let parent = target
        .parent()
        .ok_or_else(|| stage_err(io::Error::other("directory has no parent")))?;
    fs::create_dir_all(parent).map_err(stage_err)?;

    let stage = tempfile::Builder::new()
        .prefix(".stage-")
        .tempdir_in(parent)
        .map_err(stage_err)?;
    let fresh = stage.path().join("fresh");
    fs::create_dir(&fresh).map_err(stage_err)?;

    let mut files = Vec::with_capacity(routines.len());
    for routine in routines {
        let name = file_name(routine);
        let mut file = write_routine(&fresh.join(&name), routine).map_err(stage_err)?;
        file.path = target.join(name);
        files.push(file);
    }

    let previous = stage.path().join("previous");
    let had_previous = match fs::rename(target, &previous) {
        Ok(()) => true,
        Err(source) if source.kind() == io::ErrorKind::NotFound => false,
        Err(source) => return Err(stage_err(source)),
    };

    if let Err(source) = fs::rename(&fresh, target) {
        if had_previous {
            if let Err(error) = fs::rename(&previous, target) {
                warn!(path = %target.display(), %error, "Could not restore previous routines");
            }
        }
        return Err(stage_err(source));
    }

    // Dropping the stage removes the previous snapshot.
    if let Err(error) = stage.close() {
        debug!(path = %target.display(), %error, "Could not remove staging directory");
    }
    Ok(files)
}
