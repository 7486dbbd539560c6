//! # Pool de Workers
//! src/executor/pool.rs
//!
//! N workers persistentes que consumen tareas de una sola `WorkQueue`.
//!
//! ```text
//! execute() ──push──► [ WorkQueue ] ──pop──► pool-worker-0
//!                                   ──pop──► pool-worker-1
//!                                   ──pop──► ...
//! ```
//!
//! - `shutdown()` cierra la cola: los workers terminan lo que ya está
//!   encolado y salen.
//! - `shutdown_now()` levanta la bandera de cancelación y retira de la
//!   cola todo lo que ningún worker tomó todavía.

use super::lifecycle::{EngineState, Lifecycle};
use super::queue::{PushError, WorkQueue};
use super::{spawn_worker, CancelToken, Executor, Task, WorkerKind};
use crate::error::EngineError;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

/// Pool de tamaño fijo
pub struct ThreadPool {
    size: usize,
    kind: WorkerKind,
    name_prefix: String,
    queue: Arc<WorkQueue<Task>>,
    lifecycle: Arc<Lifecycle>,
    cancel: CancelToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ThreadPool {
    /// Crea el pool sin arrancar workers
    ///
    /// # Argumentos
    /// * `size` - Número de workers (mayor a 0)
    /// * `kind` - Tipo de thread para cada worker
    /// * `queue_capacity` - Límite de la cola (None = ilimitada)
    /// * `name_prefix` - Los workers se llaman `{prefix}-{i}`
    pub fn new(
        size: usize,
        kind: WorkerKind,
        queue_capacity: Option<usize>,
        name_prefix: &str,
    ) -> Result<Self, EngineError> {
        if size == 0 {
            return Err(EngineError::InvalidPoolSize(size));
        }

        let queue = match queue_capacity {
            Some(cap) => WorkQueue::bounded(cap),
            None => WorkQueue::unbounded(),
        };

        Ok(Self {
            size,
            kind,
            name_prefix: name_prefix.to_string(),
            queue: Arc::new(queue),
            lifecycle: Arc::new(Lifecycle::new()),
            cancel: CancelToken::default(),
            workers: Mutex::new(Vec::with_capacity(size)),
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Tareas encoladas que ningún worker ha tomado
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    fn spawn_one(&self, index: usize) -> Result<JoinHandle<()>, EngineError> {
        let name = format!("{}-{}", self.name_prefix, index);
        let queue = Arc::clone(&self.queue);
        let lifecycle = Arc::clone(&self.lifecycle);

        let body = {
            let name = name.clone();
            move || {
                tracing::debug!(worker = %name, "worker started");
                while let Some(task) = queue.pop() {
                    tracing::trace!(worker = %name, task_id = task.id(), "running task");
                    // El panic ya quedó registrado dentro de run_guarded
                    let _ = task.run_guarded();
                }
                tracing::debug!(worker = %name, "worker exiting");
                lifecycle.exit();
            }
        };

        spawn_worker(name, self.kind, self.cancel.clone(), body).map_err(EngineError::Spawn)
    }

    fn lock_workers(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.workers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Executor for ThreadPool {
    fn start(&self) -> Result<(), EngineError> {
        self.lifecycle.start(0)?;

        let mut workers = self.lock_workers();
        for i in 0..self.size {
            self.lifecycle.enter()?;
            match self.spawn_one(i) {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    tracing::error!(worker = i, "failed to spawn worker: {}", e);
                    self.lifecycle.exit();
                    let _ = self.lifecycle.begin_shutdown();
                    self.queue.close();
                    return Err(e);
                }
            }
        }

        tracing::info!(
            workers = self.size,
            kind = ?self.kind,
            capacity = ?self.queue.max_capacity(),
            "thread pool started"
        );
        Ok(())
    }

    fn execute_task(&self, task: Task) -> Result<(), EngineError> {
        self.lifecycle.ensure_accepting()?;

        self.queue.push(task).map_err(|(task, reason)| {
            tracing::warn!(task_id = task.id(), "task rejected: {}", reason);
            match reason {
                PushError::Full(_) => EngineError::Rejected(reason.to_string()),
                PushError::Closed => EngineError::Rejected("executor is shut down".to_string()),
            }
        })
    }

    fn shutdown(&self) -> Result<(), EngineError> {
        if self.lifecycle.begin_shutdown()? {
            tracing::info!(pending = self.queue.len(), "thread pool shutting down");
        }
        self.queue.close();
        Ok(())
    }

    fn shutdown_now(&self) -> Result<Vec<Task>, EngineError> {
        self.lifecycle.begin_shutdown()?;
        self.cancel.cancel();
        let drained = self.queue.close_and_drain();
        tracing::info!(drained = drained.len(), "thread pool stopped immediately");
        Ok(drained)
    }

    fn await_termination(&self, timeout: Duration) -> bool {
        if !self.lifecycle.await_terminated(timeout) {
            return false;
        }
        // Todos los workers ya llamaron exit(); el join es inmediato
        for handle in self.lock_workers().drain(..) {
            let _ = handle.join();
        }
        true
    }

    fn state(&self) -> EngineState {
        self.lifecycle.state()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        // Sin esto los workers quedarían bloqueados en pop() para siempre
        self.queue.close();
    }
}
