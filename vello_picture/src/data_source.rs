// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Producers of lazily computed data, such as decoded image pixels.
//!
//! A [`SyncDataSource`] runs its producer on the thread that first asks for the data. An
//! [`AsyncDataSource`] starts producing immediately on a background task, and
//! [`get_data`](DataSource::get_data) blocks until the task delivers its one result.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use crossbeam_channel::{Receiver, Sender};
use thiserror::Error;

/// A one-shot producer of shared data.
pub trait DataSource<T>: Send + Sync {
    /// Returns the data, producing it on first use. `None` if production failed.
    fn get_data(&self) -> Option<Arc<T>>;
}

/// Errors that can occur when starting a background data source.
#[derive(Debug, Error)]
pub enum DataSourceError {
    /// The worker thread could not be started.
    #[error("failed to spawn data source worker: {0}")]
    Spawn(#[from] std::io::Error),
}

type Producer<T> = Box<dyn Fn() -> Option<T> + Send + Sync>;

/// Runs a producer on first use and caches its result.
pub struct SyncDataSource<T> {
    producer: Producer<T>,
    cache: OnceLock<Option<Arc<T>>>,
}

impl<T> SyncDataSource<T> {
    /// Wrap a producer.
    pub fn new(producer: impl Fn() -> Option<T> + Send + Sync + 'static) -> Self {
        Self {
            producer: Box::new(producer),
            cache: OnceLock::new(),
        }
    }

    /// Wrap already available data.
    pub fn ready(data: T) -> Self {
        let cache = OnceLock::new();
        let _ = cache.set(Some(Arc::new(data)));
        Self {
            producer: Box::new(|| None),
            cache,
        }
    }
}

impl<T: Send + Sync> DataSource<T> for SyncDataSource<T> {
    fn get_data(&self) -> Option<Arc<T>> {
        self.cache
            .get_or_init(|| (self.producer)().map(Arc::new))
            .clone()
    }
}

impl<T> fmt::Debug for SyncDataSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncDataSource")
            .field("ready", &self.cache.get().is_some())
            .finish_non_exhaustive()
    }
}

const PENDING: u8 = 0;
const RUNNING: u8 = 1;
const CANCELLED: u8 = 2;

/// Produces data from another source on a background task.
///
/// The task is a one-shot future: it delivers exactly one result, which the first call to
/// [`get_data`](DataSource::get_data) waits for and caches.
pub struct AsyncDataSource<T> {
    task_state: Arc<AtomicU8>,
    receiver: Receiver<Option<Arc<T>>>,
    result: OnceLock<Option<Arc<T>>>,
}

impl<T: Send + Sync + 'static> AsyncDataSource<T> {
    /// Start producing the data of `source` in the background.
    pub fn spawn(source: Arc<dyn DataSource<T>>) -> Result<Self, DataSourceError> {
        let (sender, receiver) = crossbeam_channel::bounded(1);
        let task_state = Arc::new(AtomicU8::new(PENDING));
        let task = Task {
            state: task_state.clone(),
            source,
            sender,
        };
        spawn_task(move || task.run())?;
        Ok(Self {
            task_state,
            receiver,
            result: OnceLock::new(),
        })
    }
}

impl<T> AsyncDataSource<T> {
    /// Discard the source if the task has not started yet.
    ///
    /// Returns `true` if the producer will never run. Once started the task runs to completion
    /// and its result may simply never be collected.
    pub fn cancel(&self) -> bool {
        self.task_state
            .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
            || self.task_state.load(Ordering::Acquire) == CANCELLED
    }

    /// Returns `true` if the source was discarded before its task started.
    pub fn is_cancelled(&self) -> bool {
        self.task_state.load(Ordering::Acquire) == CANCELLED
    }
}

impl<T: Send + Sync> DataSource<T> for AsyncDataSource<T> {
    fn get_data(&self) -> Option<Arc<T>> {
        self.result
            .get_or_init(|| self.receiver.recv().ok().flatten())
            .clone()
    }
}

impl<T> fmt::Debug for AsyncDataSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncDataSource")
            .field("task_state", &self.task_state.load(Ordering::Relaxed))
            .field("ready", &self.result.get().is_some())
            .finish_non_exhaustive()
    }
}

struct Task<T> {
    state: Arc<AtomicU8>,
    source: Arc<dyn DataSource<T>>,
    sender: Sender<Option<Arc<T>>>,
}

impl<T> Task<T> {
    fn run(self) {
        if self
            .state
            .compare_exchange(PENDING, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::debug!("data source cancelled before it started");
            return;
        }
        let data = self.source.get_data();
        // The receiver may already be gone.
        let _ = self.sender.send(data);
    }
}

#[cfg(feature = "multithreading")]
fn spawn_task(task: impl FnOnce() + Send + 'static) -> Result<(), DataSourceError> {
    rayon::spawn(task);
    Ok(())
}

#[cfg(not(feature = "multithreading"))]
fn spawn_task(task: impl FnOnce() + Send + 'static) -> Result<(), DataSourceError> {
    std::thread::Builder::new()
        .name("vello_picture data source".into())
        .spawn(task)?;
    Ok(())
}
