use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use crossbeam_channel::unbounded;
use log::{debug, error, info, warn};
use serde::Serialize;

use super::{DispatchError, PlateLog};
use crate::manifest::{PlateRun, RunInput};

/// Image-processing engine executable
pub const DEFAULT_ENGINE: &str = "cellprofiler";

/// Outcome of one plate's engine run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunResult {
    /// Plate name
    pub plate: String,
    /// Exit code; `None` if the process could not start, could not be
    /// waited on, or was killed by a signal
    pub status: Option<i32>,
    /// Process id written to the run log
    pub pid: u32,
    /// Run log of the plate
    pub log_path: PathBuf,
    /// Why the run or its log failed, when it did not reach an exit code or
    /// the log could not be written
    pub error: Option<String>,
}

impl RunResult {
    /// Returns true if the engine exited with status 0 and its log was written
    pub fn succeeded(&self) -> bool {
        self.status == Some(0) && self.error.is_none()
    }
}

/// Results of a batch, in job order
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// One result per job
    pub results: Vec<RunResult>,
}

impl RunSummary {
    /// Runs that exited with status 0
    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.succeeded()).count()
    }

    /// Runs that did not
    pub fn failures(&self) -> impl Iterator<Item = &RunResult> {
        self.results.iter().filter(|r| !r.succeeded())
    }
}

/// Runs the engine once per plate, all plates at the same time
#[derive(Debug, Clone)]
pub struct EngineRunner {
    program: String,
    log_dir: PathBuf,
    run_name: String,
    max_workers: Option<usize>,
}

impl EngineRunner {
    /// Runner logging to `log_dir`; `run_name` tags the log file names
    pub fn new<P: AsRef<Path>>(log_dir: P, run_name: impl Into<String>) -> Self {
        Self {
            program: DEFAULT_ENGINE.to_string(),
            log_dir: log_dir.as_ref().to_path_buf(),
            run_name: run_name.into(),
            max_workers: None,
        }
    }

    /// Use another engine executable
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Cap the batch size below the machine's available parallelism
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = Some(max_workers);
        self
    }

    /// Workers available to a batch
    pub fn available_workers(&self) -> usize {
        self.max_workers.unwrap_or_else(|| {
            thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(1)
        })
    }

    /// Command-line arguments for one run
    pub fn arguments(run: &PlateRun) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-c".into(),
            "-r".into(),
            "-p".into(),
            run.pipeline.clone().into_os_string(),
            "-o".into(),
            run.output_dir.clone().into_os_string(),
        ];
        match &run.input {
            RunInput::LoadData(csv) => {
                args.push("--data-file".into());
                args.push(csv.clone().into_os_string());
            }
            RunInput::Images(dir) => {
                args.push("-i".into());
                args.push(dir.clone().into_os_string());
            }
        }
        args
    }

    /// Check every job before anything is launched
    ///
    /// Fails on a missing pipeline, an image input that is not a directory,
    /// or a batch larger than the available workers. Creates the output and
    /// log directories once every check has passed.
    pub fn validate(&self, runs: &[PlateRun]) -> Result<(), DispatchError> {
        for run in runs {
            if !run.pipeline.is_file() {
                return Err(DispatchError::MissingPath(run.pipeline.clone()));
            }
            if let RunInput::Images(dir) = &run.input {
                if !dir.is_dir() {
                    return Err(DispatchError::MissingPath(dir.clone()));
                }
            }
        }

        let available = self.available_workers();
        if runs.len() > available {
            return Err(DispatchError::TooManyWorkers {
                requested: runs.len(),
                available,
            });
        }

        for run in runs {
            fs::create_dir_all(&run.output_dir)?;
        }
        fs::create_dir_all(&self.log_dir)?;
        Ok(())
    }

    /// Run every plate in its own process and wait for all of them
    ///
    /// A run that exits non-zero, cannot be started, or cannot write its log
    /// is logged and reported in the summary; it does not stop the other
    /// runs.
    pub fn run_parallel(&self, runs: &[PlateRun]) -> Result<RunSummary, DispatchError> {
        self.validate(runs)?;
        info!("Starting {} {} run(s)", runs.len(), self.program);

        let (sender, receiver) = unbounded();
        let joined: Vec<Result<(), String>> = thread::scope(|scope| {
            let handles: Vec<_> = runs
                .iter()
                .enumerate()
                .map(|(index, run)| {
                    let sender = sender.clone();
                    let handle = scope.spawn(move || {
                        let result = self.run_one(run);
                        // The receiver outlives the scope
                        let _ = sender.send((index, result));
                    });
                    (run.plate.clone(), handle)
                })
                .collect();
            handles
                .into_iter()
                .map(|(plate, handle)| handle.join().map_err(|_| plate))
                .collect()
        });
        drop(sender);

        if let Some(Err(plate)) = joined.into_iter().find(Result::is_err) {
            return Err(DispatchError::WorkerPanicked(plate));
        }

        let mut collected: Vec<(usize, RunResult)> = receiver.iter().collect();
        collected.sort_by_key(|(index, _)| *index);
        let results: Vec<RunResult> = collected.into_iter().map(|(_, result)| result).collect();
        info!("All processes have been completed!");

        for result in &results {
            if !result.succeeded() {
                let outcome = match (&result.error, result.status) {
                    (Some(err), _) => err.clone(),
                    (None, Some(code)) => format!("exit code {}", code),
                    (None, None) => "no exit code".to_string(),
                };
                error!(
                    "{} failed for {} ({}); see {}",
                    self.program,
                    result.plate,
                    outcome,
                    result.log_path.display()
                );
            }
        }
        Ok(RunSummary { results })
    }

    fn run_one(&self, run: &PlateRun) -> RunResult {
        let log_path = PlateLog::path_for(&self.log_dir, &run.plate, &self.run_name);
        debug!("{}: {} {:?}", run.plate, self.program, Self::arguments(run));

        let (pid, status, message, mut error) = match self.execute(run) {
            Ok((pid, status, stderr)) => (pid, status, format!("Output String: {}", stderr), None),
            Err(err) => (std::process::id(), None, err.to_string(), Some(err.to_string())),
        };

        if let Err(err) = Self::write_log(&log_path, pid, &run.plate, &message) {
            warn!("{}: cannot write {}: {}", run.plate, log_path.display(), err);
            error.get_or_insert_with(|| format!("run log not written: {}", err));
        }

        RunResult {
            plate: run.plate.clone(),
            status,
            pid,
            log_path,
            error,
        }
    }

    /// Run the engine to completion; returns pid, exit code and stderr
    fn execute(&self, run: &PlateRun) -> Result<(u32, Option<i32>, String), DispatchError> {
        let child = Command::new(&self.program)
            .args(Self::arguments(run))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| DispatchError::SpawnFailed {
                program: self.program.clone(),
                source,
            })?;

        let pid = child.id();
        let output = child.wait_with_output()?;
        Ok((
            pid,
            output.status.code(),
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ))
    }

    fn write_log(path: &Path, pid: u32, plate: &str, message: &str) -> std::io::Result<()> {
        let mut log = PlateLog::create(path, pid)?;
        log.log(&format!("Plate Name: {}", plate))?;
        log.log(message)?;
        log.finish()?;
        Ok(())
    }
}
