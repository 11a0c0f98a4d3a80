use std::path::{Path, PathBuf};

use tempfile::TempDir;
use walkdir::WalkDir;

/// A private copy of a module directory, removed on drop.
///
/// Apply writes lock files and plan artifacts next to the module, so scenarios that run
/// concurrently each get their own copy instead of sharing the source directory.
#[derive(Debug)]
pub struct ModuleWorkspace {
    dir: TempDir,
    source: PathBuf,
}

impl ModuleWorkspace {
    /// Copies `module_dir` without `.terraform/` or any `*.tfstate*` files.
    ///
    /// Symlinks are followed, so linked files and directories land in the copy as real ones.
    pub fn copy_of(module_dir: &Path) -> std::io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("tfharness-").tempdir()?;

        let entries = WalkDir::new(module_dir)
            .min_depth(1)
            .follow_links(true)
            .into_iter()
            .filter_entry(|entry| !is_excluded(entry.path()));

        let mut copied = 0usize;
        for entry in entries {
            let entry = entry.map_err(std::io::Error::other)?;
            let relative = entry
                .path()
                .strip_prefix(module_dir)
                .map_err(std::io::Error::other)?;
            let target = dir.path().join(relative);

            if entry.file_type().is_dir() {
                std::fs::create_dir_all(&target)?;
            } else {
                std::fs::copy(entry.path(), &target)?;
                copied += 1;
            }
        }

        tracing::debug!(
            source = %module_dir.display(),
            workspace = %dir.path().display(),
            files = copied,
            "module workspace created"
        );

        Ok(Self {
            dir,
            source: module_dir.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn source(&self) -> &Path {
        &self.source
    }
}

fn is_excluded(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy())
        .is_some_and(|name| name == ".terraform" || name.contains(".tfstate"))
}
