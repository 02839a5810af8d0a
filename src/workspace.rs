use crate::errors::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::info;

/// Ephemeral scratch directory holding symlinked copies of the run inputs.
///
/// The directory is uniquely named under the system temp root and is removed
/// recursively when the workspace is dropped, so teardown happens on every
/// exit path once creation has succeeded. The happy path calls [`Self::close`]
/// so a removal error surfaces instead of being swallowed by `Drop`.
pub struct ScratchWorkspace {
    dir: TempDir,
}

impl ScratchWorkspace {
    pub fn create() -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("sam_pileup_").tempdir()?;
        info!(path = %dir.path().display(), "created scratch workspace");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn stage_alignment(&self, source: &Path) -> Result<PathBuf> {
        self.stage(source, "alignment.bam")
    }

    pub fn stage_alignment_index(&self, source: &Path) -> Result<PathBuf> {
        self.stage(source, "alignment.bam.bai")
    }

    pub fn stage_reference(&self, source: &Path) -> Result<PathBuf> {
        self.stage(source, "reference.fa")
    }

    /// Links `source` into the workspace under `link_name`. The original file
    /// stays with its owner; only a symlink is created. The source is
    /// canonicalized first so the link resolves regardless of the working
    /// directory the external tool runs in.
    fn stage(&self, source: &Path, link_name: &str) -> Result<PathBuf> {
        let resolved = fs::canonicalize(source)?;
        let link = self.dir.path().join(link_name);
        std::os::unix::fs::symlink(&resolved, &link)?;
        info!(
            source = %resolved.display(),
            link = %link.display(),
            "staged input into workspace"
        );
        Ok(link)
    }

    pub fn close(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close()?;
        info!(path = %path.display(), "removed scratch workspace");
        Ok(())
    }
}
