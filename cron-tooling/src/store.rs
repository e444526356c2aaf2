//! Access to the live schedule store.
//!
//! Two backends share the fetch / install / delete contract: the per-user
//! crontab, reached through the `crontab` binary, and a named drop-in file
//! under a scheduler directory such as `/etc/cron.d`, accessed directly.

use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;

use tempfile::Builder;
use tracing::debug;

use crate::CronToolingError;

/// Directory holding drop-in schedule files.
pub const DEFAULT_DROP_IN_DIR: &str = "/etc/cron.d";

/// Binary used to read and write per-user tables.
pub const DEFAULT_CRONTAB_BIN: &str = "crontab";

/// Stderr text the crontab reader emits for an absent table. A non-zero exit
/// carrying this message is the benign empty-store signal, not a failure.
const NO_CRONTAB_SIGNAL: &str = "no crontab for";

/// One schedule store, either a per-user table or a drop-in file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CronStore {
    /// The crontab of `principal`, or of the invoking user when `None`.
    UserTab {
        principal: Option<String>,
        crontab_bin: PathBuf,
    },
    /// The drop-in file at `path`.
    DropIn { path: PathBuf },
}

impl CronStore {
    /// Store backed by a per-user table.
    pub fn user_tab(principal: Option<String>, crontab_bin: PathBuf) -> Self {
        Self::UserTab {
            principal,
            crontab_bin,
        }
    }

    /// Store backed by the drop-in file `name` under `dir`.
    pub fn drop_in(dir: &Path, name: &str) -> Self {
        Self::DropIn {
            path: dir.join(name),
        }
    }

    /// Whether this store is a drop-in file, the only backend that supports
    /// deleting the store outright.
    pub fn is_drop_in(&self) -> bool {
        matches!(self, Self::DropIn { .. })
    }

    /// Reads the current schedule content.
    ///
    /// An absent table or file is a normal outcome and yields empty content;
    /// any other read failure is fatal.
    pub fn fetch(&self) -> Result<String, CronToolingError> {
        match self {
            Self::UserTab {
                principal,
                crontab_bin,
            } => {
                let mut args: Vec<OsString> = Vec::new();
                if let Some(user) = principal {
                    args.extend([OsString::from("-u"), OsString::from(user)]);
                }
                args.push(OsString::from("-l"));
                let command_string = build_command_string(crontab_bin, &args);
                let output = Command::new(crontab_bin).args(&args).output()?;
                if output.status.success() {
                    let content = String::from_utf8(output.stdout).map_err(|source| {
                        CronToolingError::CrontabOutputUtf8 {
                            command: command_string,
                            source,
                        }
                    })?;
                    debug!(bytes = content.len(), "fetched user table");
                    Ok(content)
                } else {
                    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
                    if stderr.contains(NO_CRONTAB_SIGNAL) {
                        debug!("user table absent, treating as empty");
                        Ok(String::new())
                    } else {
                        Err(CronToolingError::CrontabCommand {
                            command: command_string,
                            status: output.status,
                            stderr,
                        })
                    }
                }
            }
            Self::DropIn { path } => match fs::read_to_string(path) {
                Ok(content) => {
                    debug!(path = ?path, bytes = content.len(), "fetched drop-in file");
                    Ok(content)
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    debug!(path = ?path, "drop-in file absent, treating as empty");
                    Ok(String::new())
                }
                Err(err) => Err(err.into()),
            },
        }
    }

    /// Commits the scratch file at `scratch` as the new live schedule.
    pub fn install(&self, scratch: &Path) -> Result<(), CronToolingError> {
        match self {
            Self::UserTab {
                principal,
                crontab_bin,
            } => {
                let mut args: Vec<OsString> = Vec::new();
                if let Some(user) = principal {
                    args.extend([OsString::from("-u"), OsString::from(user)]);
                }
                args.push(scratch.as_os_str().to_os_string());
                let command_string = build_command_string(crontab_bin, &args);
                let output = Command::new(crontab_bin).args(&args).output()?;
                if !output.status.success() {
                    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
                    return Err(CronToolingError::CrontabCommand {
                        command: command_string,
                        status: output.status,
                        stderr,
                    });
                }
                debug!("installed user table");
                Ok(())
            }
            Self::DropIn { path } => {
                let content = fs::read(scratch)?;
                let dir = path.parent().ok_or_else(|| {
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("drop-in path {} has no parent directory", path.display()),
                    )
                })?;
                // Stage a sibling and rename so readers never observe a
                // partially written file.
                let mut staged = Builder::new().prefix(".cronctl-install-").tempfile_in(dir)?;
                staged.write_all(&content)?;
                staged.flush()?;
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    // Cron daemons refuse drop-in files that are group or
                    // world writable.
                    staged
                        .as_file()
                        .set_permissions(fs::Permissions::from_mode(0o644))?;
                }
                staged.persist(path).map_err(|err| err.error)?;
                debug!(path = ?path, bytes = content.len(), "installed drop-in file");
                Ok(())
            }
        }
    }

    /// Removes the store file entirely. Only meaningful for the drop-in
    /// backend; a per-user table is never deleted, an empty table is
    /// installed instead.
    pub fn delete(&self) -> Result<(), CronToolingError> {
        match self {
            Self::UserTab { .. } => Ok(()),
            Self::DropIn { path } => match fs::remove_file(path) {
                Ok(()) => {
                    debug!(path = ?path, "deleted drop-in file");
                    Ok(())
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(err) => Err(err.into()),
            },
        }
    }
}

/// Builds a printable command string for diagnostics.
fn build_command_string(bin: &Path, args: &[OsString]) -> String {
    let mut parts = vec![bin.display().to_string()];
    parts.extend(args.iter().map(|arg| arg.to_string_lossy().into_owned()));
    parts.join(" ")
}
