// run.rs: scrub a whole file set and collect the run-wide mappings
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};

use crate::category::Category;
use crate::config::ScrubConfig;
use crate::error::{Result, ScrubError};
use crate::file::process_file;
use crate::mapper::Mapping;
use crate::scrubber::{Deltas, ScrubEngine};

/// Union of the per-file mappings of one run, one table per category.
#[derive(Debug, Clone)]
pub struct RunTotals {
    mappings: BTreeMap<Category, Mapping>,
}

impl Default for RunTotals {
    fn default() -> Self {
        let mappings = Category::ORDER.into_iter().map(|c| (c, Mapping::new(c))).collect();
        Self { mappings }
    }
}

impl RunTotals {
    /// Snapshot of every table the engine holds, seeded pairs included.
    pub fn from_engine(engine: &ScrubEngine) -> Self {
        let mut totals = RunTotals::default();
        for category in engine.categories() {
            if let Some(mapping) = engine.mapping(category) {
                totals.mappings.insert(category, mapping.clone());
            }
        }
        totals
    }

    pub fn merge(&mut self, deltas: &Deltas) -> Result<()> {
        for (category, pairs) in deltas.iter() {
            let mapping = self.mappings.entry(category).or_insert_with(|| Mapping::new(category));
            for (original, fake) in pairs {
                mapping.insert(original, fake)?;
            }
        }
        Ok(())
    }

    /// Folds the totals of another run into these.
    pub fn absorb(&mut self, other: &RunTotals) -> Result<()> {
        for mapping in other.iter() {
            let into = self.mappings.entry(mapping.category()).or_insert_with(|| Mapping::new(mapping.category()));
            for (original, fake) in mapping.iter() {
                into.insert(original, fake)?;
            }
        }
        Ok(())
    }

    pub fn mapping(&self, category: Category) -> &Mapping {
        // every category is present from construction
        &self.mappings[&category]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mapping> {
        self.mappings.values()
    }

    /// Writes one JSON document per category into `dir` and returns the paths.
    pub fn persist(&self, dir: &Path, cfg: &ScrubConfig) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir).map_err(|e| ScrubError::io(dir, e))?;
        let mut written = Vec::with_capacity(self.mappings.len());
        for (category, mapping) in &self.mappings {
            let path = dir.join(cfg.translation_file(*category));
            mapping.save(&path)?;
            written.push(path);
        }
        info!("Translation files saved to {}", dir.display());
        Ok(written)
    }
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub totals: RunTotals,
    /// Files rewritten with the banner.
    pub scrubbed: Vec<PathBuf>,
    /// Files read but left untouched.
    pub clean: Vec<PathBuf>,
    /// Files skipped by name.
    pub excluded: Vec<PathBuf>,
    /// Files that could not be processed; the run went on without them.
    pub failures: Vec<(PathBuf, ScrubError)>,
}

impl RunReport {
    /// 0 when every file was handled, 1 when some files failed.
    pub fn exit_code(&self) -> i32 {
        if self.failures.is_empty() { 0 } else { 1 }
    }
}

fn is_excluded(path: &Path, exclusions: &[String]) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |name| exclusions.iter().any(|e| e == name))
}

/// Scrubs every file in `paths` with the shared `engine`.
///
/// Files whose base name is listed in `exclusions` are never opened. Read,
/// write and decoding failures are logged and recorded per file; engine
/// failures (exhausted fake space, broken mapping invariants) abort the run.
///
/// The totals start from the engine's current tables, so pairs seeded from an
/// earlier run are persisted again even when no file mentions them.
pub fn run<P: AsRef<Path>>(engine: &mut ScrubEngine, paths: &[P], exclusions: &[String]) -> Result<RunReport> {
    let mut report = RunReport { totals: RunTotals::from_engine(engine), ..RunReport::default() };
    for path in paths {
        let path = path.as_ref();
        if is_excluded(path, exclusions) {
            info!("Skipping file: {} (Excluded)", path.display());
            report.excluded.push(path.to_path_buf());
            continue;
        }
        info!("Scrubbing file: {}", path.display());
        match process_file(engine, path) {
            Ok(outcome) => {
                for (category, pairs) in outcome.deltas.iter() {
                    debug!("{} mappings for {}: {:?}", category, path.display(), pairs);
                }
                report.totals.merge(&outcome.deltas)?;
                if outcome.modified {
                    report.scrubbed.push(path.to_path_buf());
                } else {
                    report.clean.push(path.to_path_buf());
                }
            }
            Err(e) if !e.is_fatal() => {
                match &e {
                    ScrubError::NotText { .. } => warn!("Error processing file {}: {}", path.display(), e),
                    _ => error!("Error processing file {}: {}", path.display(), e),
                }
                report.failures.push((path.to_path_buf(), e));
            }
            Err(e) => return Err(e),
        }
    }
    Ok(report)
}

/// Regular files below `dir`, sorted by path.
pub fn collect_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let entries = fs::read_dir(&current).map_err(|e| ScrubError::io(&current, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| ScrubError::io(&current, e))?;
            let file_type = entry.file_type().map_err(|e| ScrubError::io(entry.path(), e))?;
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                out.push(entry.path());
            }
        }
    }
    out.sort();
    Ok(out)
}
