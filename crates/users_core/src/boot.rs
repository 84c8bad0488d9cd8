//! Ordered startup and shutdown of process subsystems.
//!
//! # Responsibility
//! - Run registered start steps in registration order.
//! - Keep the stop closure each started step hands back.
//! - Stop started steps in reverse order and report every failure by name.
//!
//! # Invariants
//! - A step is started at most once.
//! - When a start fails, every step started before it is stopped before the
//!   error is returned.

use crate::db::Database;
use log::{error, info};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Tears down what a start step brought up.
pub type StopFn = Box<dyn FnOnce() -> Result<(), BoxError>>;

type StartFn = Box<dyn FnOnce() -> Result<StopFn, BoxError>>;

#[derive(Debug)]
pub enum BootError {
    Start { step: &'static str, source: BoxError },
    Stop { step: &'static str, source: BoxError },
}

impl BootError {
    pub fn step(&self) -> &'static str {
        match self {
            Self::Start { step, .. } | Self::Stop { step, .. } => step,
        }
    }
}

impl Display for BootError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start { step, source } => write!(f, "{step} failed to start: {source}"),
            Self::Stop { step, source } => write!(f, "{step} failed to stop: {source}"),
        }
    }
}

impl Error for BootError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Start { source, .. } | Self::Stop { source, .. } => Some(&**source),
        }
    }
}

/// Explicit, ordered list of named subsystems.
#[derive(Default)]
pub struct Lifecycle {
    pending: Vec<(&'static str, StartFn)>,
    started: Vec<(&'static str, StopFn)>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a step; `start` returns the closure that stops it again.
    pub fn register<F>(&mut self, name: &'static str, start: F) -> &mut Self
    where
        F: FnOnce() -> Result<StopFn, BoxError> + 'static,
    {
        self.pending.push((name, Box::new(start)));
        self
    }

    /// Names of started steps, in start order.
    pub fn started(&self) -> Vec<&'static str> {
        self.started.iter().map(|(name, _)| *name).collect()
    }

    /// Starts every pending step in registration order.
    ///
    /// On failure the steps already started are stopped in reverse order;
    /// their stop errors are logged, the start error is returned.
    pub fn connect(&mut self) -> Result<(), BootError> {
        let pending = std::mem::take(&mut self.pending);
        for (name, start) in pending {
            match start() {
                Ok(stop) => {
                    info!("event=boot_start module=boot status=ok step=\"{name}\"");
                    self.started.push((name, stop));
                }
                Err(source) => {
                    error!(
                        "event=boot_start module=boot status=error step=\"{name}\" error={source}"
                    );
                    for err in self.shutdown() {
                        error!("event=boot_unwind module=boot status=error error={err}");
                    }
                    return Err(BootError::Start { step: name, source });
                }
            }
        }
        Ok(())
    }

    /// Stops every started step, last started first.
    pub fn shutdown(&mut self) -> Vec<BootError> {
        let mut errors = Vec::new();
        while let Some((name, stop)) = self.started.pop() {
            match stop() {
                Ok(()) => info!("event=boot_stop module=boot status=ok step=\"{name}\""),
                Err(source) => {
                    error!(
                        "event=boot_stop module=boot status=error step=\"{name}\" error={source}"
                    );
                    errors.push(BootError::Stop { step: name, source });
                }
            }
        }
        errors
    }
}

/// Registers the store connection as the `database connection` step.
pub fn register_database<'a>(lifecycle: &'a mut Lifecycle, database: &Database) -> &'a mut Lifecycle {
    let database = database.clone();
    lifecycle.register("database connection", move || {
        let close = database.connect()?;
        Ok(Box::new(move || close().map_err(BoxError::from)) as StopFn)
    })
}

impl Debug for Lifecycle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let pending: Vec<&str> = self.pending.iter().map(|(name, _)| *name).collect();
        f.debug_struct("Lifecycle")
            .field("pending", &pending)
            .field("started", &self.started())
            .finish()
    }
}
