use anyhow::{bail, Context, Result};
use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::process::Command;

/// One finalized cluster to cut out of the input tree.
#[derive(Debug, Clone)]
pub struct SubtreeRequest<'a> {
    pub tree: &'a Path,
    pub sample_list: &'a Path,
    pub output_stem: &'a Path,
    pub min_tree_size: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubtreeOutcome {
    Written { tree: PathBuf, json: Option<PathBuf> },
    Failed { reason: String },
}

/// Produces a subtree for each finalized cluster.
pub trait SubtreeExtractor {
    fn extract(&self, request: &SubtreeRequest<'_>) -> SubtreeOutcome;
}

/// Runs an external extraction program as
/// `<program> extract -i <tree> -s <samples> -N <min> -t <out>.nwk -j <out>.json`.
#[derive(Debug, Clone)]
pub struct CommandExtractor {
    program: String,
}

impl CommandExtractor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Fails early when the program cannot be started at all.
    pub fn check(&self) -> Result<()> {
        Command::new(&self.program)
            .arg("--version")
            .output()
            .with_context(|| {
                format!(
                    "{} not found. Install it or point `extractor` at the right executable",
                    self.program
                )
            })
            .map(|_| ())
    }

    fn run(&self, request: &SubtreeRequest<'_>) -> Result<SubtreeOutcome> {
        let tree_out = request.output_stem.with_extension("nwk");
        let json_out = request.output_stem.with_extension("json");
        if tree_out.exists() {
            bail!("Refusing to overwrite existing subtree {}", tree_out.display());
        }

        let output = Command::new(&self.program)
            .arg("extract")
            .arg("-i")
            .arg(request.tree)
            .arg("-s")
            .arg(request.sample_list)
            .arg("-N")
            .arg(request.min_tree_size.to_string())
            .arg("-t")
            .arg(&tree_out)
            .arg("-j")
            .arg(&json_out)
            .output()
            .with_context(|| format!("Failed to run {}", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Ok(SubtreeOutcome::Failed {
                reason: format!("{} exited with {}: {}", self.program, output.status, stderr.trim()),
            });
        }
        if !tree_out.exists() {
            return Ok(SubtreeOutcome::Failed {
                reason: format!("{} did not write {}", self.program, tree_out.display()),
            });
        }
        Ok(SubtreeOutcome::Written {
            tree: tree_out,
            json: json_out.exists().then_some(json_out),
        })
    }
}

impl SubtreeExtractor for CommandExtractor {
    fn extract(&self, request: &SubtreeRequest<'_>) -> SubtreeOutcome {
        match self.run(request) {
            Ok(outcome) => {
                if let SubtreeOutcome::Failed { reason } = &outcome {
                    warn!("Subtree extraction failed for {}: {}", request.sample_list.display(), reason);
                } else {
                    debug!("Extracted subtree for {}", request.sample_list.display());
                }
                outcome
            }
            Err(e) => {
                warn!("Subtree extraction failed for {}: {:#}", request.sample_list.display(), e);
                SubtreeOutcome::Failed {
                    reason: format!("{:#}", e),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_program_is_reported() {
        let extractor = CommandExtractor::new("definitely-not-an-installed-extractor");
        assert!(extractor.check().is_err());

        let dir = tempdir().unwrap();
        let list = dir.path().join("samples.txt");
        let stem = dir.path().join("c00001_d20");
        let outcome = extractor.extract(&SubtreeRequest {
            tree: Path::new("tree.nwk"),
            sample_list: &list,
            output_stem: &stem,
            min_tree_size: 10,
        });
        assert!(matches!(outcome, SubtreeOutcome::Failed { .. }));
    }

    #[test]
    fn existing_subtree_is_not_overwritten() {
        let dir = tempdir().unwrap();
        let stem = dir.path().join("c00002_d10");
        std::fs::write(stem.with_extension("nwk"), "(A,B);").unwrap();

        let extractor = CommandExtractor::new("true");
        let outcome = extractor.extract(&SubtreeRequest {
            tree: Path::new("tree.nwk"),
            sample_list: Path::new("samples.txt"),
            output_stem: &stem,
            min_tree_size: 2,
        });
        match outcome {
            SubtreeOutcome::Failed { reason } => assert!(reason.contains("overwrite")),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
