//! # Un Worker por Tarea
//! src/executor/per_task.rs
//!
//! Cada tarea recibe su propio thread (`task-{id}`). No hay cola ni
//! límite de concurrencia; el contador de tareas vivas del `Lifecycle`
//! decide cuándo el motor queda terminado.

use super::lifecycle::{EngineState, Lifecycle};
use super::{spawn_worker, CancelToken, Executor, Task, WorkerKind};
use crate::error::EngineError;
use std::sync::Arc;
use std::time::Duration;

pub struct PerTaskExecutor {
    kind: WorkerKind,
    lifecycle: Arc<Lifecycle>,
    cancel: CancelToken,
}

impl PerTaskExecutor {
    pub fn new(kind: WorkerKind) -> Self {
        Self {
            kind,
            lifecycle: Arc::new(Lifecycle::new()),
            cancel: CancelToken::default(),
        }
    }

    /// Tareas en ejecución en este momento
    pub fn active(&self) -> usize {
        self.lifecycle.live()
    }
}

impl Executor for PerTaskExecutor {
    fn start(&self) -> Result<(), EngineError> {
        self.lifecycle.start(0)?;
        tracing::info!(kind = ?self.kind, "per-task executor started");
        Ok(())
    }

    fn execute_task(&self, task: Task) -> Result<(), EngineError> {
        // Reserva el lugar antes de lanzar: un shutdown concurrente lo espera
        self.lifecycle.enter()?;

        let id = task.id();
        let lifecycle = Arc::clone(&self.lifecycle);
        let body = move || {
            let _ = task.run_guarded();
            lifecycle.exit();
        };

        spawn_worker(format!("task-{}", id), self.kind, self.cancel.clone(), body).map_err(|e| {
            tracing::error!(task_id = id, "failed to spawn task thread: {}", e);
            self.lifecycle.exit();
            EngineError::Spawn(e)
        })?;
        Ok(())
    }

    fn shutdown(&self) -> Result<(), EngineError> {
        if self.lifecycle.begin_shutdown()? {
            tracing::info!(active = self.lifecycle.live(), "per-task executor shutting down");
        }
        Ok(())
    }

    /// Sin cola no hay tareas pendientes que devolver
    fn shutdown_now(&self) -> Result<Vec<Task>, EngineError> {
        self.lifecycle.begin_shutdown()?;
        self.cancel.cancel();
        Ok(Vec::new())
    }

    fn await_termination(&self, timeout: Duration) -> bool {
        self.lifecycle.await_terminated(timeout)
    }

    fn state(&self) -> EngineState {
        self.lifecycle.state()
    }
}
