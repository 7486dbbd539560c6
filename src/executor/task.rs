//! # Tareas y Handles
//! src/executor/task.rs
//!
//! Una `Task` es una unidad de trabajo opaca: un closure que se ejecuta
//! a lo sumo una vez. `TaskHandle` permite esperar el resultado de una
//! tarea enviada con `submit`.

use crate::error::TaskError;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

/// Contador global para asignar IDs a las tareas
static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Unidad de trabajo enviada al motor
pub struct Task {
    id: u64,
    job: Job,
}

impl Task {
    /// Envuelve un closure en una tarea con ID único
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            id: NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed),
            job: Box::new(f),
        }
    }

    /// ID de la tarea (monótono creciente en orden de creación)
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Ejecuta la tarea en el thread actual, consumiéndola
    pub fn run(self) {
        (self.job)()
    }

    /// Ejecuta la tarea atrapando cualquier panic
    ///
    /// Retorna el mensaje del panic si lo hubo. Un worker usa esto para
    /// que una tarea fallida no lo tumbe.
    pub(crate) fn run_guarded(self) -> Result<(), String> {
        let id = self.id;
        panic::catch_unwind(AssertUnwindSafe(move || self.run())).map_err(|payload| {
            let message = panic_message(payload.as_ref());
            tracing::error!(task_id = id, "task panicked: {}", message);
            message
        })
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Extrae un mensaje legible del payload de un panic
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Handle para esperar el resultado de una tarea
///
/// Si la tarea se descarta sin ejecutarse, el canal se cierra y
/// `join()` retorna `TaskError::Cancelled`.
#[derive(Debug)]
pub struct TaskHandle<T> {
    id: u64,
    rx: Receiver<Result<T, TaskError>>,
}

impl<T: Send + 'static> TaskHandle<T> {
    /// Crea la tarea y su handle asociado
    pub(crate) fn pair<F>(f: F) -> (Task, TaskHandle<T>)
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel(1);
        let task = Task::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
                let message = panic_message(payload.as_ref());
                tracing::error!("submitted task panicked: {}", message);
                TaskError::Panicked(message)
            });
            // El receptor pudo haberse descartado (fire-and-forget)
            let _ = tx.send(outcome);
        });
        let handle = TaskHandle { id: task.id(), rx };
        (task, handle)
    }
}

impl<T> TaskHandle<T> {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Bloquea hasta que la tarea termine
    pub fn join(self) -> Result<T, TaskError> {
        self.rx.recv().unwrap_or(Err(TaskError::Cancelled))
    }

    /// Como `join`, pero con límite de tiempo
    pub fn join_timeout(&self, timeout: Duration) -> Result<T, TaskError> {
        match self.rx.recv_timeout(timeout) {
            Ok(outcome) => outcome,
            Err(RecvTimeoutError::Timeout) => Err(TaskError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(TaskError::Cancelled),
        }
    }
}
