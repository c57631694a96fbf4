use crate::error::{ClusterError, Result};
use log::{debug, info};
use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Every cluster identifier known to the pipeline, past and present.
///
/// Fresh identifiers are always above the largest numeric id seen, so an
/// identifier is never handed out twice, retired or not. Retirements are kept
/// in memory until [`persist`](IdRegistry::persist) appends them to the
/// denylist file. The highest identifier ever issued is stored next to the
/// denylist (`<denylist>.issued`), which covers successors that never reach a
/// membership table.
#[derive(Debug, Default)]
pub struct IdRegistry {
    issued: BTreeSet<String>,
    denylisted: BTreeSet<String>,
    retired: Vec<String>,
    persisted: usize,
    next: u64,
    denylist_path: Option<PathBuf>,
    // Loaded entries still to be written to a new denylist file.
    carried: Vec<String>,
}

/// Sidecar holding the high-water mark for the denylist at `denylist`.
pub fn high_water_path(denylist: &Path) -> PathBuf {
    let mut name = denylist.file_name().unwrap_or_default().to_os_string();
    name.push(".issued");
    denylist.with_file_name(name)
}

impl IdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the retired identifiers from `path`. A missing file is an empty
    /// denylist; it is created on the first [`persist`](IdRegistry::persist).
    pub fn with_denylist(path: &Path) -> Result<Self> {
        let mut registry = Self {
            denylist_path: Some(path.to_path_buf()),
            ..Self::default()
        };
        registry.load(path)?;
        Ok(registry)
    }

    /// Load the denylist at `source` and write it, plus this run's
    /// retirements, to a new denylist at `target`. `source` is left as is.
    pub fn carried_forward(source: &Path, target: &Path) -> Result<Self> {
        if target.exists() {
            return Err(ClusterError::ArtifactExists(target.to_path_buf()));
        }
        let mut registry = Self {
            denylist_path: Some(target.to_path_buf()),
            ..Self::default()
        };
        registry.carried = registry.load(source)?;
        if !registry.carried.is_empty() {
            info!(
                "Carrying {} retired identifiers from {} to {}",
                registry.carried.len(),
                source.display(),
                target.display()
            );
        }
        Ok(registry)
    }

    /// Read the denylist and its high-water mark; returns the entries in file order.
    fn load(&mut self, path: &Path) -> Result<Vec<String>> {
        let mut entries = Vec::new();
        if path.exists() {
            for line in fs::read_to_string(path)?.lines() {
                let id = line.trim();
                if id.is_empty() || id.starts_with('#') {
                    continue;
                }
                if self.denylisted.insert(id.to_string()) {
                    entries.push(id.to_string());
                }
                self.reserve(id);
            }
            info!(
                "Loaded {} retired identifiers from {}",
                self.denylisted.len(),
                path.display()
            );
        }

        let sidecar = high_water_path(path);
        if sidecar.exists() {
            let text = fs::read_to_string(&sidecar)?;
            let highest = text.trim().parse::<u64>().map_err(|_| {
                ClusterError::MalformedTable(format!(
                    "{} does not hold an identifier: '{}'",
                    sidecar.display(),
                    text.trim()
                ))
            })?;
            self.next = self.next.max(highest.saturating_add(1));
            debug!("Highest issued identifier so far: {:06}", highest);
        }
        Ok(entries)
    }

    /// Mark `id` as issued so it is never allocated again.
    pub fn reserve(&mut self, id: &str) {
        if let Ok(n) = id.parse::<u64>() {
            self.next = self.next.max(n.saturating_add(1));
        }
        self.issued.insert(id.to_string());
    }

    pub fn contains(&self, id: &str) -> bool {
        self.issued.contains(id)
    }

    pub fn is_retired(&self, id: &str) -> bool {
        self.denylisted.contains(id)
    }

    /// Next never-issued identifier, zero-padded to six digits.
    pub fn allocate(&mut self) -> String {
        self.next = self.next.max(1);
        loop {
            let candidate = format!("{:06}", self.next);
            self.next += 1;
            if !self.issued.contains(&candidate) {
                self.issued.insert(candidate.clone());
                return candidate;
            }
        }
    }

    /// Retire `id`. Retiring an already denylisted id is a no-op.
    pub fn retire(&mut self, id: &str) {
        self.reserve(id);
        if self.denylisted.insert(id.to_string()) {
            self.retired.push(id.to_string());
        }
    }

    /// Identifiers retired since the denylist was loaded.
    pub fn retired_this_run(&self) -> &[String] {
        &self.retired
    }

    /// Append pending retirements to the denylist file and record the
    /// high-water mark, if a denylist is configured.
    pub fn persist(&mut self) -> Result<()> {
        let Some(path) = &self.denylist_path else {
            return Ok(());
        };
        let pending = &self.retired[self.persisted..];
        if pending.is_empty() && self.carried.is_empty() {
            debug!("No new retired identifiers for {}", path.display());
        } else {
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            for id in self.carried.iter().chain(pending) {
                writeln!(file, "{}", id)?;
            }
            file.flush()?;
            info!(
                "Appended {} retired identifier(s) to {}",
                pending.len(),
                path.display()
            );
            self.persisted = self.retired.len();
            self.carried.clear();
        }

        if self.next > 1 {
            let sidecar = high_water_path(path);
            fs::write(&sidecar, format!("{:06}\n", self.next - 1))?;
        }
        Ok(())
    }
}
