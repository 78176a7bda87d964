//! Compile strategies.
//!
//! A strategy decides how the tasks of a [`CompilePlan`] are run: one after
//! another, or on a bounded rayon pool. Both return the plan's object list
//! unchanged, so callers cannot tell them apart by their output.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use rustc_hash::FxHashSet;

use crate::error::{Error, Result};

use super::toolchain::Toolchain;
use super::types::CompilePlan;

/// How translation units are compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileStrategy {
    /// One unit at a time, in manifest order, stopping at the first failure.
    Sequential,
    /// A dedicated pool of `jobs` worker threads.
    Parallel { jobs: usize },
}

/// Number of available processing units.
pub fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZero::get)
        .unwrap_or(1)
}

impl CompileStrategy {
    /// Parallel strategy sized to the machine.
    pub fn parallel() -> Self {
        CompileStrategy::Parallel {
            jobs: default_jobs(),
        }
    }

    /// Compile every pending task of `plan` and return all object paths in
    /// manifest order.
    ///
    /// Objects without a task are skipped. The parallel strategy lets every
    /// dispatched task finish before returning the first failure in manifest
    /// order.
    pub fn compile(&self, plan: &CompilePlan, toolchain: &dyn Toolchain) -> Result<Vec<PathBuf>> {
        match *self {
            CompileStrategy::Sequential => compile_sequential(plan, toolchain),
            CompileStrategy::Parallel { jobs } => match build_pool(jobs) {
                Ok(pool) => compile_parallel(&pool, plan, toolchain),
                Err(e) => {
                    tracing::warn!("{e}, compiling sequentially");
                    compile_sequential(plan, toolchain)
                }
            },
        }
    }
}

fn build_pool(jobs: usize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .thread_name(|i| format!("extbuild-cc-{i}"))
        .build()
        .map_err(Error::from)
}

/// Compile the task for `object`, or skip it when the plan has none.
fn compile_one(plan: &CompilePlan, toolchain: &dyn Toolchain, object: &Path) -> Result<()> {
    match plan.task(object) {
        Some(task) => toolchain.compile(task),
        None => {
            tracing::debug!("no task for {}, skipping", object.display());
            Ok(())
        }
    }
}

/// Objects to dispatch: each distinct object once, in manifest order.
fn dispatch_order(plan: &CompilePlan) -> Vec<(usize, &Path)> {
    let mut seen = FxHashSet::default();
    plan.objects()
        .iter()
        .map(PathBuf::as_path)
        .enumerate()
        .filter(|&(_, object)| seen.insert(object))
        .collect()
}

fn compile_sequential(plan: &CompilePlan, toolchain: &dyn Toolchain) -> Result<Vec<PathBuf>> {
    for (_, object) in dispatch_order(plan) {
        compile_one(plan, toolchain, object)?;
    }
    Ok(plan.objects().to_vec())
}

fn compile_parallel(
    pool: &rayon::ThreadPool,
    plan: &CompilePlan,
    toolchain: &dyn Toolchain,
) -> Result<Vec<PathBuf>> {
    tracing::info!(
        "Compiling {} unit(s) on {} worker(s)",
        plan.pending(),
        pool.current_num_threads()
    );

    let failures: Mutex<Vec<(usize, Error)>> = Mutex::new(Vec::new());

    // Tasks are queued FIFO in manifest order; the scope returns only after
    // every queued task has finished.
    pool.scope_fifo(|scope| {
        for (index, object) in dispatch_order(plan) {
            let failures = &failures;
            scope.spawn_fifo(move |_| {
                if let Err(e) = compile_one(plan, toolchain, object) {
                    failures
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push((index, e));
                }
            });
        }
    });

    let mut failures = failures.into_inner().unwrap_or_else(PoisonError::into_inner);
    if failures.is_empty() {
        return Ok(plan.objects().to_vec());
    }

    tracing::warn!("{} translation unit(s) failed to compile", failures.len());
    failures.sort_by_key(|(index, _)| *index);
    let (_, first) = failures.swap_remove(0);
    Err(first)
}
