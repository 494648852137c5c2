//! Directory layout of the materialized schema.
//!
//! ```text
//! <schema_directory>/
//! ├── Procedures/
//! │   └── [dbo].[GetUsers].sql
//! ├── Functions/
//! │   ├── Scalar/
//! │   └── Table/
//! └── [dbo].[Unmapped].sql
//! ```

use std::path::{Path, PathBuf};

use routine_sync_core::{Routine, RoutineKind};

pub const PROCEDURES_DIR: &str = "Procedures";
pub const FUNCTIONS_DIR: &str = "Functions";
pub const SCALAR_DIR: &str = "Scalar";
pub const TABLE_DIR: &str = "Table";
pub const FILE_EXTENSION: &str = "sql";

/// Resolves where each routine kind is written under a schema directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaLayout {
    root: PathBuf,
}

impl SchemaLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory owned by `kind`. These are the directories a run replaces.
    pub fn kind_dir(&self, kind: RoutineKind) -> PathBuf {
        match kind {
            RoutineKind::Procedure => self.root.join(PROCEDURES_DIR),
            RoutineKind::ScalarFunction => self.root.join(FUNCTIONS_DIR).join(SCALAR_DIR),
            RoutineKind::TableFunction => self.root.join(FUNCTIONS_DIR).join(TABLE_DIR),
        }
    }

    /// Directory a routine is written to; unmapped kinds go to the root.
    pub fn dir_for(&self, kind: Option<RoutineKind>) -> PathBuf {
        match kind {
            Some(kind) => self.kind_dir(kind),
            None => self.root.clone(),
        }
    }

    /// `<dir>/<file name>` for `routine`.
    pub fn file_path(&self, routine: &Routine) -> PathBuf {
        self.dir_for(routine.kind).join(file_name(routine))
    }

    /// Kind directories in deletion order.
    pub fn kind_dirs(&self) -> [PathBuf; 3] {
        RoutineKind::ALL.map(|kind| self.kind_dir(kind))
    }

    /// Every directory that must exist after a reset, parents first.
    pub fn required_dirs(&self) -> [PathBuf; 4] {
        [
            self.kind_dir(RoutineKind::Procedure),
            self.root.join(FUNCTIONS_DIR),
            self.kind_dir(RoutineKind::ScalarFunction),
            self.kind_dir(RoutineKind::TableFunction),
        ]
    }
}

/// File name of a materialized routine, e.g. `[dbo].[GetUsers].sql`.
pub fn file_name(routine: &Routine) -> String {
    format!("{}.{FILE_EXTENSION}", routine.file_stem())
}
