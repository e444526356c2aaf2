//! Reconciliation of one desired entry against the live schedule store.
//!
//! One invocation is a pure pass-through: fetch the current state, decide
//! add / update / remove / no-op, apply the decision to a working copy, and
//! commit it. Two scratch files are held for the duration: a working copy
//! that is mutated and eventually installed, and a pristine snapshot used
//! for the lookup and optionally retained as a backup. Both are RAII-scoped
//! so they are released on every exit path unless the snapshot is
//! deliberately kept.

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Serialize;
use tempfile::Builder;
use tracing::debug;

use crate::CronToolingError;
use crate::codec::append_entry;
use crate::codec::parse_entries;
use crate::codec::remove_entry;
use crate::codec::replace_entry;
use crate::store::CronStore;
use crate::store::DEFAULT_CRONTAB_BIN;
use crate::store::DEFAULT_DROP_IN_DIR;

/// Whether the entry should exist after reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DesiredState {
    Present,
    Absent,
}

/// The desired entry, as supplied by the caller.
///
/// Schedule fields are opaque strings passed through to the rendered entry
/// line; nothing here validates cron expression semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileRequest {
    pub name: String,
    pub state: DesiredState,
    pub command: Option<String>,
    pub principal: Option<String>,
    pub drop_in_file: Option<String>,
    pub minute: String,
    pub hour: String,
    pub day: String,
    pub month: String,
    pub weekday: String,
    pub reboot: bool,
    pub backup: bool,
}

impl ReconcileRequest {
    /// Request for the named entry with every other field at its default.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Rejects contradictory or incomplete desired state before any store
    /// access.
    fn validate(&self) -> Result<(), CronToolingError> {
        if self.reboot && self.has_explicit_time_fields() {
            return Err(CronToolingError::RebootWithTimeFields);
        }
        if let Some(file) = &self.drop_in_file
            && self.principal.is_none()
        {
            return Err(CronToolingError::DropInRequiresPrincipal { file: file.clone() });
        }
        if self.state == DesiredState::Present
            && self.command.as_deref().map(str::trim).unwrap_or("").is_empty()
        {
            return Err(CronToolingError::MissingCommand);
        }
        Ok(())
    }

    fn has_explicit_time_fields(&self) -> bool {
        [&self.minute, &self.hour, &self.day, &self.month, &self.weekday]
            .iter()
            .any(|field| field.as_str() != "*")
    }

    /// Renders the entry line that gets written below the marker. Drop-in
    /// files carry the principal between the schedule and the command.
    fn entry_line(&self) -> String {
        let command = self.command.as_deref().unwrap_or_default();
        let principal = self.principal.as_deref().unwrap_or_default();
        if self.reboot {
            if self.drop_in_file.is_some() {
                format!("@reboot {principal} {command}")
            } else {
                format!("@reboot {command}")
            }
        } else {
            let schedule = format!(
                "{} {} {} {} {}",
                self.minute, self.hour, self.day, self.month, self.weekday
            );
            if self.drop_in_file.is_some() {
                format!("{schedule} {principal} {command}")
            } else {
                format!("{schedule} {command}")
            }
        }
    }
}

impl Default for ReconcileRequest {
    fn default() -> Self {
        Self {
            name: String::new(),
            state: DesiredState::Present,
            command: None,
            principal: None,
            drop_in_file: None,
            minute: "*".to_string(),
            hour: "*".to_string(),
            day: "*".to_string(),
            month: "*".to_string(),
            weekday: "*".to_string(),
            reboot: false,
            backup: false,
        }
    }
}

/// Result of one reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileOutcome {
    /// Whether the live store was modified.
    pub changed: bool,
    pub state: DesiredState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drop_in_file: Option<String>,
    /// Every recognized entry name present after the operation, in file
    /// order.
    pub jobs: Vec<String>,
    /// Where the pre-modification snapshot was retained, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Add,
    Update,
    Remove,
    Noop,
}

/// Applies a desired entry to the schedule store it targets.
#[derive(Debug, Clone)]
pub struct Reconciler {
    drop_in_dir: PathBuf,
    crontab_bin: PathBuf,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self {
            drop_in_dir: PathBuf::from(DEFAULT_DROP_IN_DIR),
            crontab_bin: PathBuf::from(DEFAULT_CRONTAB_BIN),
        }
    }
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the directory holding drop-in schedule files.
    pub fn drop_in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.drop_in_dir = dir.into();
        self
    }

    /// Overrides the binary used to read and write per-user tables.
    pub fn crontab_bin(mut self, bin: impl Into<PathBuf>) -> Self {
        self.crontab_bin = bin.into();
        self
    }

    /// Reconciles the live store with the desired entry.
    pub fn reconcile(
        &self,
        request: &ReconcileRequest,
    ) -> Result<ReconcileOutcome, CronToolingError> {
        request.validate()?;
        let store = self.store_for(request);

        // The pristine snapshot and the working copy are fetched
        // independently so the lookup set can never be contaminated by this
        // invocation's own writes.
        let snapshot_content = store.fetch()?;
        let snapshot = Builder::new().prefix("cronctl-snapshot-").tempfile()?;
        fs::write(snapshot.path(), &snapshot_content)?;

        let working_content = store.fetch()?;
        let working = Builder::new().prefix("cronctl-working-").tempfile()?;
        fs::write(working.path(), &working_content)?;

        let entries = parse_entries(&snapshot_content);
        let found = entries.iter().find(|entry| entry.name == request.name);
        let desired_line = match request.state {
            DesiredState::Present => Some(request.entry_line()),
            DesiredState::Absent => None,
        };

        let decision = match (&desired_line, found) {
            (Some(_), None) => Decision::Add,
            (Some(line), Some(entry)) if entry.line == *line => Decision::Noop,
            (Some(_), Some(_)) => Decision::Update,
            (None, Some(_)) => Decision::Remove,
            (None, None) => Decision::Noop,
        };
        debug!(name = %request.name, ?decision, "reconcile decision");

        let mut changed = false;
        let final_content = match decision {
            Decision::Noop => working_content,
            Decision::Add => {
                let line = desired_line.unwrap_or_default();
                let content = append_entry(&working_content, &request.name, &line);
                commit(&store, working.path(), &content)?;
                changed = true;
                content
            }
            Decision::Update => {
                let line = desired_line.unwrap_or_default();
                let content = replace_entry(&working_content, &request.name, &line);
                commit(&store, working.path(), &content)?;
                changed = true;
                content
            }
            Decision::Remove => {
                let content = remove_entry(&working_content, &request.name);
                if content.is_empty() && store.is_drop_in() {
                    // Deleting the drop-in file beats installing an empty
                    // one; a per-user table is still installed empty.
                    store.delete()?;
                } else {
                    commit(&store, working.path(), &content)?;
                }
                changed = true;
                content
            }
        };

        let jobs = parse_entries(&final_content)
            .into_iter()
            .map(|entry| entry.name)
            .collect();

        // When a backup was requested the snapshot outlives this invocation,
        // even on a no-op; its lifecycle then belongs to the caller.
        let backup = if request.backup {
            let (_file, path) = snapshot.keep().map_err(|err| {
                let path = err.file.path().to_path_buf();
                CronToolingError::BackupRetention {
                    path,
                    source: err.error,
                }
            })?;
            Some(path)
        } else {
            None
        };

        Ok(ReconcileOutcome {
            changed,
            state: request.state,
            drop_in_file: request.drop_in_file.clone(),
            jobs,
            backup,
        })
    }

    fn store_for(&self, request: &ReconcileRequest) -> CronStore {
        match &request.drop_in_file {
            Some(file) => CronStore::drop_in(&self.drop_in_dir, file),
            None => CronStore::user_tab(request.principal.clone(), self.crontab_bin.clone()),
        }
    }
}

/// Writes the rewritten content to the working copy and installs it.
fn commit(store: &CronStore, working: &Path, content: &str) -> Result<(), CronToolingError> {
    fs::write(working, content)?;
    store.install(working)
}
