//! Batch processing of order files.
//!
//! A producer reads and parses inputs and hands them one at a time to the
//! solving worker through a [`LatestSlot`]. Results travel over a channel to a
//! writer that puts `optimized_<stem>.out` (or `.err`) next to each input.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;

use crate::error::{Error, Result};
use crate::parse::parse_order;
use crate::render::render_solution;
use crate::solver::Solver;
use crate::types::{Order, Solution};

pub const OUTPUT_PREFIX: &str = "optimized_";

/// Single-value handoff: `put` replaces whatever is waiting, `take` blocks
/// until a value is present. Once closed, `wait_vacant` no longer blocks.
#[derive(Debug)]
pub struct LatestSlot<T> {
    state: Mutex<SlotState<T>>,
    filled: Condvar,
    vacated: Condvar,
}

#[derive(Debug)]
struct SlotState<T> {
    value: Option<T>,
    closed: bool,
}

impl<T> Default for LatestSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LatestSlot<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                value: None,
                closed: false,
            }),
            filled: Condvar::new(),
            vacated: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `value`, returning the one it displaced if the slot was full.
    pub fn put(&self, value: T) -> Option<T> {
        let displaced = self.lock().value.replace(value);
        self.filled.notify_one();
        displaced
    }

    pub fn take(&self) -> T {
        let mut guard = self.lock();
        loop {
            if let Some(value) = guard.value.take() {
                self.vacated.notify_one();
                return value;
            }
            guard = self
                .filled
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Blocks until the slot is empty or closed.
    pub fn wait_vacant(&self) {
        let _guard = self
            .vacated
            .wait_while(self.lock(), |state| state.value.is_some() && !state.closed)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Marks the consumer as gone and wakes everyone waiting for vacancy.
    pub fn close(&self) {
        self.lock().closed = true;
        self.vacated.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

/// Puts [`Job::End`] on drop, so the worker stops even if the producer unwinds.
struct EndOnDrop<'a>(&'a LatestSlot<Job>);

impl Drop for EndOnDrop<'_> {
    fn drop(&mut self) {
        self.0.put(Job::End);
    }
}

/// Closes the slot on drop, releasing a producer blocked on a dead worker.
struct CloseOnDrop<'a, T>(&'a LatestSlot<T>);

impl<T> Drop for CloseOnDrop<'_, T> {
    fn drop(&mut self) {
        self.0.close();
    }
}

#[derive(Debug)]
pub enum Job {
    Order {
        source: PathBuf,
        order: Result<Order>,
    },
    /// No more input follows.
    End,
}

#[derive(Debug)]
pub enum Report {
    Solved(Solution),
    Unsatisfiable(Order),
    Rejected(Error),
}

#[derive(Debug)]
pub enum Outcome {
    Done { source: PathBuf, report: Report },
    End,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub solved: usize,
    pub unsatisfiable: usize,
    pub rejected: usize,
    pub write_failures: usize,
}

impl Summary {
    pub fn has_failures(&self) -> bool {
        self.write_failures > 0
    }
}

/// Path of the sidecar written for `input`, e.g. `dir/optimized_order.out`.
pub fn output_path(input: &Path, extension: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = format!("{OUTPUT_PREFIX}{stem}.{extension}");
    match input.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

fn already_processed(input: &Path) -> bool {
    output_path(input, "out").exists() || output_path(input, "err").exists()
}

/// Collects the order files under `path`: the file itself, or the regular
/// files directly inside a directory. Our own outputs are never inputs, and
/// inputs with an existing sidecar are skipped unless `force` is set.
pub fn discover_inputs(path: &Path, force: bool) -> Result<Vec<PathBuf>> {
    let metadata = fs::metadata(path).map_err(|e| Error::io(path, e))?;
    let mut candidates = Vec::new();
    if metadata.is_dir() {
        for entry in fs::read_dir(path).map_err(|e| Error::io(path, e))? {
            let entry = entry.map_err(|e| Error::io(path, e))?;
            let candidate = entry.path();
            let is_output = entry
                .file_name()
                .to_string_lossy()
                .to_lowercase()
                .starts_with(OUTPUT_PREFIX);
            if candidate.is_file() && !is_output {
                candidates.push(candidate);
            }
        }
        candidates.sort();
    } else {
        candidates.push(path.to_path_buf());
    }

    Ok(candidates
        .into_iter()
        .filter(|input| {
            let skip = !force && already_processed(input);
            if skip {
                tracing::info!(input = %input.display(), "output exists, skipping");
            }
            !skip
        })
        .collect())
}

pub fn read_job(source: &Path) -> Job {
    tracing::debug!(input = %source.display(), "reading order file");
    let order = fs::read_to_string(source)
        .map_err(|e| Error::io(source, e))
        .and_then(|text| parse_order(&text).map_err(Error::from));
    Job::Order {
        source: source.to_path_buf(),
        order,
    }
}

/// Solves every input and writes its sidecar. Runs one producer (the calling
/// thread), one solving worker and one writer.
pub fn run(inputs: &[PathBuf], solver: &Solver) -> Summary {
    let slot = LatestSlot::new();
    let (tx, rx) = mpsc::channel();

    thread::scope(|s| {
        let slot = &slot;
        let worker = s.spawn(move || solve_worker(slot, solver, tx));
        let writer = s.spawn(move || write_worker(rx));

        {
            let _end = EndOnDrop(slot);
            for input in inputs {
                let job = read_job(input);
                slot.wait_vacant();
                if let Some(Job::Order { source, .. }) = slot.put(job) {
                    tracing::warn!(input = %source.display(), "order displaced before it was solved");
                }
            }
            slot.wait_vacant();
        }

        worker
            .join()
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
        writer
            .join()
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
    })
}

pub fn solve_worker(slot: &LatestSlot<Job>, solver: &Solver, tx: Sender<Outcome>) {
    let _close = CloseOnDrop(slot);
    let mut seen: HashSet<PathBuf> = HashSet::new();
    loop {
        let outcome = match slot.take() {
            Job::End => Outcome::End,
            Job::Order { source, order } => {
                if !seen.insert(source.clone()) {
                    tracing::debug!(input = %source.display(), "already solved in this run");
                    continue;
                }
                let report = match order {
                    Ok(order) => match solver.solve(&order) {
                        Some(solution) => Report::Solved(solution),
                        None => Report::Unsatisfiable(order),
                    },
                    Err(e) => Report::Rejected(e),
                };
                Outcome::Done { source, report }
            }
        };
        let done = matches!(outcome, Outcome::End);
        if tx.send(outcome).is_err() {
            tracing::error!("result writer stopped early");
            return;
        }
        if done {
            return;
        }
    }
}

pub fn write_worker(rx: Receiver<Outcome>) -> Summary {
    let mut summary = Summary::default();
    for outcome in rx {
        let Outcome::Done { source, report } = outcome else {
            break;
        };
        let (path, content) = match &report {
            Report::Solved(solution) => {
                summary.solved += 1;
                (output_path(&source, "out"), render_solution(solution))
            }
            Report::Unsatisfiable(order) => {
                summary.unsatisfiable += 1;
                let message = format!(
                    "{}\nOrder cannot be cut from the available stock lengths\n",
                    order.customer()
                );
                (output_path(&source, "err"), message)
            }
            Report::Rejected(e) => {
                summary.rejected += 1;
                (output_path(&source, "err"), format!("{e}\n"))
            }
        };
        match fs::write(&path, content) {
            Ok(()) => tracing::info!(output = %path.display(), "wrote result"),
            Err(e) => {
                summary.write_failures += 1;
                tracing::error!(error = %Error::io(&path, e), "could not write result");
            }
        }
    }
    summary
}
