//! File mailbox for unit → coordinator handoff.
//!
//! Each execution unit writes its report to an artifact name no other unit
//! uses, so no locking is needed. The coordinator only reads after every
//! unit has finished, then deletes what it consumed.

use std::fs;
use std::path::{Path, PathBuf};

use cutshot_core::{Error, Result};
use tracing::{debug, warn};

use crate::types::UnitReport;

#[derive(Debug, Clone)]
pub struct Mailbox {
    dir: PathBuf,
    run_id: String,
}

impl Mailbox {
    /// Open the scratch directory, creating it if absent.
    pub fn open(dir: impl AsRef<Path>, run_id: impl Into<String>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .map_err(|e| Error::Mailbox(format!("cannot create {}: {}", dir.display(), e)))?;
        Ok(Self {
            dir,
            run_id: run_id.into(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Artifact path for unit `index` of `attempt`.
    pub fn artifact_path(&self, attempt: u32, index: usize) -> PathBuf {
        self.dir
            .join(format!("{}-{}-{}.json", self.run_id, attempt, index))
    }

    /// Serialize `report` to `path`. Called from inside a unit.
    pub fn deposit(path: &Path, report: &UnitReport) -> Result<()> {
        let data = serde_json::to_vec(report)?;
        fs::write(path, data)
            .map_err(|e| Error::Mailbox(format!("cannot write {}: {}", path.display(), e)))?;
        debug!("Deposited {} results at {}", report.results.len(), path.display());
        Ok(())
    }

    /// Read back every artifact, deleting each once consumed.
    pub fn collect(&self, paths: &[PathBuf]) -> Result<Vec<UnitReport>> {
        let mut reports = Vec::with_capacity(paths.len());
        for path in paths {
            let data = fs::read(path)
                .map_err(|e| Error::Mailbox(format!("cannot read {}: {}", path.display(), e)))?;
            reports.push(serde_json::from_slice(&data)?);
            fs::remove_file(path)?;
        }
        Ok(reports)
    }

    /// Remove leftovers of a failed or discarded attempt.
    pub fn discard(&self, paths: &[PathBuf]) {
        for path in paths {
            Self::withdraw(path);
        }
    }

    /// Remove one artifact if present. Called from inside a unit whose
    /// attempt was abandoned after it deposited.
    pub fn withdraw(path: &Path) {
        match fs::remove_file(path) {
            Ok(()) => debug!("Withdrew stale artifact {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove stale artifact {}: {}", path.display(), e),
        }
    }
}
