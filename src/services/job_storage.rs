use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

const TIFFS_DIR: &str = "1_Bit_Tiffs";
const LOCKED_MODE: u32 = 0o555;
const UNLOCKED_MODE: u32 = 0o777;

/// Filesystem operations on job folders under JobStorage.
#[derive(Debug, Clone)]
pub struct JobStorage {
    root: PathBuf,
}

impl JobStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `<root>/<job number zero-padded to 5>`
    pub fn job_folder(&self, job_num: u32) -> PathBuf {
        self.root.join(format!("{:05}", job_num))
    }

    /// Make a job folder read-only for everyone, recursively.
    pub fn lock_job_folder(&self, job_num: u32) -> Result<(), JobStorageError> {
        recursive_chmod(&self.job_folder(job_num), LOCKED_MODE)
    }

    pub fn unlock_job_folder(&self, job_num: u32) -> Result<(), JobStorageError> {
        recursive_chmod(&self.job_folder(job_num), UNLOCKED_MODE)
    }

    /// Create `1_Bit_Tiffs/<job>-<item> <name>`; Backstage expects it to exist
    /// before a beverage workflow ticket runs.
    pub fn create_tiff_folder(
        &self,
        job_num: i64,
        item_num: i32,
        item_name: &str,
    ) -> Result<PathBuf, JobStorageError> {
        let folder = self
            .tiffs_root(job_num)?
            .join(format!("{}-{} {}", job_num, item_num, item_name));
        fs::create_dir_all(&folder).map_err(|source| JobStorageError::Io {
            path: folder.clone(),
            source,
        })?;
        Ok(folder)
    }

    /// `.tif` and `.len` files in the item's tiff folder. No folder, no tiffs.
    pub fn list_item_tiffs(
        &self,
        job_num: i64,
        item_num: i32,
    ) -> Result<Vec<PathBuf>, JobStorageError> {
        let tiffs_root = self.tiffs_root(job_num)?;
        let Some(folder) = find_item_subfolder(&tiffs_root, job_num, item_num)? else {
            return Ok(Vec::new());
        };

        let entries = fs::read_dir(&folder).map_err(|source| JobStorageError::Io {
            path: folder.clone(),
            source,
        })?;

        let mut tiffs: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| {
                matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("tif") | Some("tiff") | Some("len")
                )
            })
            .collect();
        tiffs.sort();
        Ok(tiffs)
    }

    fn tiffs_root(&self, job_num: i64) -> Result<PathBuf, JobStorageError> {
        let job_num = u32::try_from(job_num).map_err(|_| JobStorageError::InvalidJob(job_num))?;
        Ok(self.job_folder(job_num).join(TIFFS_DIR))
    }
}

/// Sub-folder named `<job>-<item>` optionally followed by a space and a name.
fn find_item_subfolder(
    parent: &Path,
    job_num: i64,
    item_num: i32,
) -> Result<Option<PathBuf>, JobStorageError> {
    let entries = match fs::read_dir(parent) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(JobStorageError::Io {
                path: parent.to_path_buf(),
                source,
            })
        }
    };

    let prefix = format!("{}-{}", job_num, item_num);
    let mut matches: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter(|e| {
            e.file_name()
                .to_str()
                .and_then(|name| name.strip_prefix(prefix.as_str()))
                .is_some_and(|rest| rest.is_empty() || rest.starts_with(' '))
        })
        .map(|e| e.path())
        .collect();
    matches.sort();
    Ok(matches.into_iter().next())
}

/// chmod the root (errors propagate) and then everything below it (errors
/// are logged and skipped).
fn recursive_chmod(root: &Path, mode: u32) -> Result<(), JobStorageError> {
    set_mode(root, mode).map_err(|source| JobStorageError::Io {
        path: root.to_path_buf(),
        source,
    })?;

    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(path = %dir.display(), error = %e, "Skipping unreadable folder");
                continue;
            }
        };
        for entry in entries.filter_map(Result::ok) {
            let path = entry.path();
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            // Directories are opened before they are locked so the walk can
            // still descend when the new mode drops the write bit.
            if is_dir {
                stack.push(path.clone());
            }
            if let Err(e) = set_mode(&path, mode) {
                tracing::warn!(path = %path.display(), error = %e, "chmod failed, continuing");
            }
        }
    }
    Ok(())
}

fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[derive(Debug, thiserror::Error)]
pub enum JobStorageError {
    #[error("Invalid job number: {0}")]
    InvalidJob(i64),

    #[error("Filesystem error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
