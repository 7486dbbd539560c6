//! # Motor de Tareas
//! src/executor/mod.rs
//!
//! Pool de workers genérico productor/consumidor, sin ningún conocimiento
//! de HTTP. El servidor envía aquí el accept loop y cada conexión.
//!
//! ## Estrategias
//!
//! - **Pool acotado** (`ThreadPool`): N workers persistentes que sacan
//!   tareas de una sola cola compartida.
//! - **Una tarea, un worker** (`PerTaskExecutor`): cada tarea recibe un
//!   contexto de ejecución nuevo, sin cola y sin límite de concurrencia.
//!
//! Ambas cumplen el mismo contrato (`Executor`) y se eligen por
//! configuración con [`build`].
//!
//! ## Ejemplo
//!
//! ```
//! use file_exchange_server::executor::{self, EngineConfig, ExecutorExt};
//! use std::time::Duration;
//!
//! let engine = executor::build(&EngineConfig::default()).unwrap();
//! let handle = engine.submit(|| 2 + 2).unwrap();
//! assert_eq!(handle.join().unwrap(), 4);
//!
//! engine.shutdown().unwrap();
//! assert!(engine.await_termination(Duration::from_secs(5)));
//! ```

pub mod lifecycle;
pub mod per_task;
pub mod pool;
pub mod queue;
pub mod task;

pub use lifecycle::EngineState;
pub use per_task::PerTaskExecutor;
pub use pool::ThreadPool;
pub use queue::WorkQueue;
pub use task::{Task, TaskHandle};

use crate::error::{EngineError, TaskError};
use std::cell::RefCell;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Stack de los workers livianos
const LIGHTWEIGHT_STACK_SIZE: usize = 256 * 1024;

/// Estrategia de ejecución
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Strategy {
    /// Workers persistentes compartiendo una cola
    Pool,
    /// Un contexto de ejecución nuevo por tarea
    PerTask,
}

/// Tipo de contexto de ejecución de cada worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum WorkerKind {
    /// Thread del sistema operativo con stack por defecto
    Platform,
    /// Thread con stack pequeño y fijo
    Lightweight,
}

impl WorkerKind {
    fn stack_size(&self) -> Option<usize> {
        match self {
            WorkerKind::Platform => None,
            WorkerKind::Lightweight => Some(LIGHTWEIGHT_STACK_SIZE),
        }
    }
}

/// Parámetros de construcción del motor
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub strategy: Strategy,
    pub worker_kind: WorkerKind,

    /// Número de workers (solo estrategia `Pool`)
    pub pool_size: usize,

    /// Capacidad de la cola (None = ilimitada; solo estrategia `Pool`)
    pub queue_capacity: Option<usize>,

    /// Prefijo para los nombres de thread del pool
    pub thread_name_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Pool,
            worker_kind: WorkerKind::Platform,
            pool_size: 4,
            queue_capacity: None,
            thread_name_prefix: "pool-worker".to_string(),
        }
    }
}

/// Contrato común de ambas estrategias
pub trait Executor: Send + Sync {
    /// `NotStarted → Running`; una segunda llamada es un error
    fn start(&self) -> Result<(), EngineError>;

    /// Encola una tarea ya construida
    fn execute_task(&self, task: Task) -> Result<(), EngineError>;

    /// Apagado ordenado: termina lo que está en curso y lo encolado
    fn shutdown(&self) -> Result<(), EngineError>;

    /// Apagado forzado: cancela y retorna las tareas nunca iniciadas
    fn shutdown_now(&self) -> Result<Vec<Task>, EngineError>;

    /// Bloquea hasta que todos los workers salgan o venza el timeout
    fn await_termination(&self, timeout: Duration) -> bool;

    fn state(&self) -> EngineState;

    fn is_shutdown(&self) -> bool {
        matches!(
            self.state(),
            EngineState::ShuttingDown | EngineState::Terminated
        )
    }

    fn is_terminated(&self) -> bool {
        self.state() == EngineState::Terminated
    }
}

/// Métodos genéricos sobre cualquier `Executor`
pub trait ExecutorExt: Executor {
    /// Envía un closure sin handle (fire-and-forget)
    fn execute<F>(&self, f: F) -> Result<(), EngineError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.execute_task(Task::new(f))
    }

    /// Envía un closure y retorna un handle para esperar su valor
    fn submit<F, T>(&self, f: F) -> Result<TaskHandle<T>, EngineError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (task, handle) = TaskHandle::pair(f);
        self.execute_task(task)?;
        Ok(handle)
    }

    /// Envía todas las tareas y espera cada una
    ///
    /// Los resultados vienen en orden de envío; una tarea fallida no
    /// detiene a las demás.
    fn invoke_all<F, T, I>(&self, tasks: I) -> Result<Vec<Result<T, TaskError>>, EngineError>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let handles = tasks
            .into_iter()
            .map(|f| self.submit(f))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(handles.into_iter().map(TaskHandle::join).collect())
    }

    /// Envía todas las tareas y retorna el primer valor exitoso
    ///
    /// Gana la primera en terminar bien, no la primera enviada. Las que
    /// sigan corriendo no se interrumpen; su resultado se descarta. Si
    /// todas fallan se retorna el último error; un lote vacío es
    /// `TaskError::NoTasks`.
    fn invoke_any<F, T, I>(&self, tasks: I) -> Result<Result<T, TaskError>, EngineError>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let mut submitted = 0usize;
        for f in tasks {
            let tx = tx.clone();
            self.execute(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(f))
                    .map_err(|payload| TaskError::Panicked(task::panic_message(payload.as_ref())));
                // Después del primer éxito nadie escucha
                let _ = tx.send(outcome);
            })?;
            submitted += 1;
        }
        // Solo quedan los emisores de las tareas: el canal se cierra cuando
        // todas terminaron o fueron descartadas sin ejecutarse
        drop(tx);

        if submitted == 0 {
            return Ok(Err(TaskError::NoTasks));
        }

        let mut last_error = TaskError::Cancelled;
        for outcome in rx {
            match outcome {
                Ok(value) => return Ok(Ok(value)),
                Err(e) => last_error = e,
            }
        }
        Ok(Err(last_error))
    }
}

impl<E: Executor + ?Sized> ExecutorExt for E {}

/// Construye y arranca el motor según la configuración
pub fn build(config: &EngineConfig) -> Result<Arc<dyn Executor>, EngineError> {
    let engine: Arc<dyn Executor> = match config.strategy {
        Strategy::Pool => Arc::new(ThreadPool::new(
            config.pool_size,
            config.worker_kind,
            config.queue_capacity,
            &config.thread_name_prefix,
        )?),
        Strategy::PerTask => Arc::new(PerTaskExecutor::new(config.worker_kind)),
    };
    engine.start()?;
    Ok(engine)
}

// === Cancelación cooperativa ===

/// Bandera de cancelación compartida entre un motor y sus workers
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

thread_local! {
    static CURRENT_TOKEN: RefCell<Option<CancelToken>> = const { RefCell::new(None) };
}

/// Indica si el motor que ejecuta el thread actual pidió cancelación
///
/// Las tareas largas pueden consultarlo para cooperar con `shutdown_now()`.
/// Fuera de un worker siempre retorna `false`.
pub fn cancellation_requested() -> bool {
    CURRENT_TOKEN.with(|t| t.borrow().as_ref().is_some_and(CancelToken::is_cancelled))
}

/// Lanza un worker con nombre, tipo de stack y token de cancelación
pub(crate) fn spawn_worker<F>(
    name: String,
    kind: WorkerKind,
    token: CancelToken,
    body: F,
) -> io::Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    let mut builder = thread::Builder::new().name(name);
    if let Some(size) = kind.stack_size() {
        builder = builder.stack_size(size);
    }
    builder.spawn(move || {
        CURRENT_TOKEN.with(|t| *t.borrow_mut() = Some(token));
        body();
    })
}
