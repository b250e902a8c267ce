use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::thread;

use crate::config::{ParserConfig, Schedule};
use crate::error::{ConfigError, ParseError};
use crate::interval::Interval;
use crate::metadata::FileMetadata;
use crate::parser::LogParser;
use crate::walker::{self, WalkOptions};

/// Result for one discovered file, or for the root when the walk itself failed.
#[derive(Debug)]
pub enum ParseOutcome<T> {
    Success { file: PathBuf, value: T },
    Failure { file: PathBuf, error: ParseError },
}

impl<T> ParseOutcome<T> {
    pub fn from_result(file: PathBuf, result: Result<T, ParseError>) -> Self {
        match result {
            Ok(value) => ParseOutcome::Success { file, value },
            Err(error) => ParseOutcome::Failure { file, error },
        }
    }

    pub fn file(&self) -> &Path {
        match self {
            ParseOutcome::Success { file, .. } | ParseOutcome::Failure { file, .. } => file,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ParseOutcome::Success { .. })
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            ParseOutcome::Success { value, .. } => Some(value),
            ParseOutcome::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&ParseError> {
        match self {
            ParseOutcome::Success { .. } => None,
            ParseOutcome::Failure { error, .. } => Some(error),
        }
    }
}

/// Anything with a coverage interval that a query window can test.
pub trait Covered {
    fn coverage(&self) -> Interval;
}

impl Covered for Interval {
    fn coverage(&self) -> Interval {
        *self
    }
}

impl Covered for FileMetadata {
    fn coverage(&self) -> Interval {
        self.interval()
    }
}

/// Keep failures and the successes whose coverage overlaps `window`.
pub fn filter_by_window<T: Covered>(outcomes: Vec<ParseOutcome<T>>, window: &Interval) -> Vec<ParseOutcome<T>> {
    outcomes
        .into_iter()
        .filter(|outcome| match outcome {
            ParseOutcome::Success { value, .. } => window.overlaps(&value.coverage()),
            ParseOutcome::Failure { .. } => true,
        })
        .collect()
}

/// Applies a [`LogParser`] to every log file under a root.
///
/// Outcomes always come back in enumeration order, one per file, whichever
/// schedule runs them. A failed walk yields a single failure for the root.
#[derive(Debug)]
pub struct FileParseCoordinator {
    parser: LogParser,
    walk: WalkOptions,
    schedule: Schedule,
    max_workers: Option<usize>,
}

impl FileParseCoordinator {
    pub fn new(parser: LogParser, walk: WalkOptions, schedule: Schedule) -> Self {
        Self {
            parser,
            walk,
            schedule,
            max_workers: None,
        }
    }

    pub fn from_config(config: &ParserConfig) -> Result<Self, ConfigError> {
        let coordinator = Self::new(
            LogParser::from_config(config)?,
            config.walk_options(),
            config.schedule,
        );
        Ok(coordinator.with_max_workers(config.max_workers))
    }

    /// Bound the parallel schedule to a fixed number of workers.
    pub fn with_max_workers(mut self, max_workers: Option<usize>) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn parse_interval(&self, root: &Path) -> Vec<ParseOutcome<Interval>> {
        self.run(root, LogParser::parse_interval)
    }

    pub fn parse_metadata(&self, root: &Path) -> Vec<ParseOutcome<FileMetadata>> {
        self.run(root, LogParser::parse_metadata)
    }

    fn run<T, F>(&self, root: &Path, job: F) -> Vec<ParseOutcome<T>>
    where
        T: Send,
        F: Fn(&LogParser, &Path) -> Result<T, ParseError> + Sync,
    {
        let files = match walker::enumerate(root, &self.walk) {
            Ok(files) => files,
            Err(error) => {
                tracing::warn!(root = %root.display(), %error, "cannot enumerate files");
                return vec![ParseOutcome::Failure {
                    file: root.to_path_buf(),
                    error,
                }];
            }
        };

        let results = match (self.schedule, self.max_workers) {
            (Schedule::Sequential, _) => files
                .iter()
                .map(|file| job(&self.parser, file.as_path()))
                .collect(),
            (Schedule::Parallel, None) => self.run_per_file(&files, &job),
            (Schedule::Parallel, Some(workers)) => self.run_pooled(&files, &job, workers),
        };

        files
            .into_iter()
            .zip(results)
            .map(|(file, result)| {
                if let Err(error) = &result {
                    tracing::debug!(file = %file.display(), %error, "file failed");
                }
                ParseOutcome::from_result(file, result)
            })
            .collect()
    }

    /// One scoped thread per file, joined in submission order.
    fn run_per_file<T, F>(&self, files: &[PathBuf], job: &F) -> Vec<Result<T, ParseError>>
    where
        T: Send,
        F: Fn(&LogParser, &Path) -> Result<T, ParseError> + Sync,
    {
        let parser = &self.parser;
        thread::scope(|scope| {
            let handles: Vec<_> = files
                .iter()
                .map(|file| {
                    let spawned = thread::Builder::new()
                        .name(thread_name(file))
                        .spawn_scoped(scope, move || job(parser, file.as_path()));
                    match spawned {
                        Ok(handle) => Some(handle),
                        Err(error) => {
                            tracing::warn!(file = %file.display(), %error, "spawn failed, parsing on caller");
                            None
                        }
                    }
                })
                .collect();
            tracing::debug!(tasks = handles.len(), "dispatched files");

            files
                .iter()
                .zip(handles)
                .map(|(file, handle)| match handle {
                    Some(handle) => handle
                        .join()
                        .unwrap_or_else(|_| Err(ParseError::WorkerPanicked(file.clone()))),
                    None => job(parser, file.as_path()),
                })
                .collect()
        })
    }

    /// A fixed set of workers pulling files from a queue. Results carry their
    /// submission index and are put back in order after every worker is done.
    fn run_pooled<T, F>(&self, files: &[PathBuf], job: &F, workers: usize) -> Vec<Result<T, ParseError>>
    where
        T: Send,
        F: Fn(&LogParser, &Path) -> Result<T, ParseError> + Sync,
    {
        let parser = &self.parser;
        let workers = workers.clamp(1, files.len().max(1));
        let (task_send, task_recv) = crossbeam_channel::unbounded::<(usize, &PathBuf)>();
        let (result_send, result_recv) = crossbeam_channel::unbounded();
        for task in files.iter().enumerate() {
            let _ = task_send.send(task);
        }
        drop(task_send);

        thread::scope(|scope| {
            for _ in 0..workers {
                let task_recv = task_recv.clone();
                let result_send = result_send.clone();
                scope.spawn(move || {
                    for (index, file) in task_recv {
                        let result = panic::catch_unwind(AssertUnwindSafe(|| job(parser, file.as_path())))
                            .unwrap_or_else(|_| Err(ParseError::WorkerPanicked(file.clone())));
                        if result_send.send((index, result)).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(result_send);
        tracing::debug!(workers, files = files.len(), "worker pool joined");

        let mut slots: Vec<Option<Result<T, ParseError>>> = files.iter().map(|_| None).collect();
        for (index, result) in result_recv.try_iter() {
            slots[index] = Some(result);
        }
        slots
            .into_iter()
            .zip(files)
            .map(|(slot, file)| slot.unwrap_or_else(|| Err(ParseError::WorkerPanicked(file.clone()))))
            .collect()
    }
}

fn thread_name(file: &Path) -> String {
    file.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "logspan-worker".to_string())
}
