//! # Ciclo de Vida del Motor
//! src/executor/lifecycle.rs
//!
//! Máquina de estados compartida por ambas estrategias:
//!
//! ```text
//! NotStarted → Running → ShuttingDown → Terminated
//! ```
//!
//! Las transiciones son en un solo sentido. `ShuttingDown → Terminated`
//! ocurre cuando el contador de workers vivos llega a cero.

use crate::error::EngineError;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

/// Estados del motor de tareas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    NotStarted,
    Running,
    ShuttingDown,
    Terminated,
}

impl EngineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineState::NotStarted => "not_started",
            EngineState::Running => "running",
            EngineState::ShuttingDown => "shutting_down",
            EngineState::Terminated => "terminated",
        }
    }
}

struct Inner {
    state: EngineState,
    /// Workers (o tareas, en la estrategia por-tarea) aún vivos
    live: usize,
}

/// Estado + cuenta regresiva de workers, protegidos por un solo Mutex
pub struct Lifecycle {
    inner: Mutex<Inner>,
    changed: Condvar,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: EngineState::NotStarted,
                live: 0,
            }),
            changed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> EngineState {
        self.lock().state
    }

    /// `NotStarted → Running`, exactamente una vez
    pub fn start(&self, initial_live: usize) -> Result<(), EngineError> {
        let mut inner = self.lock();
        if inner.state != EngineState::NotStarted {
            return Err(EngineError::AlreadyStarted);
        }
        inner.state = EngineState::Running;
        inner.live = initial_live;
        Ok(())
    }

    /// Verifica que el motor acepte tareas nuevas
    pub fn ensure_accepting(&self) -> Result<(), EngineError> {
        Self::accepting(self.lock().state)
    }

    fn accepting(state: EngineState) -> Result<(), EngineError> {
        match state {
            EngineState::NotStarted => Err(EngineError::NotStarted),
            EngineState::Running => Ok(()),
            EngineState::ShuttingDown | EngineState::Terminated => {
                Err(EngineError::Rejected("executor is shut down".to_string()))
            }
        }
    }

    /// Registra un worker nuevo solo si el motor sigue en `Running`
    ///
    /// La verificación y el incremento ocurren bajo el mismo lock, así un
    /// shutdown concurrente nunca ve `live == 0` con una tarea en camino.
    pub fn enter(&self) -> Result<(), EngineError> {
        let mut inner = self.lock();
        Self::accepting(inner.state)?;
        inner.live += 1;
        Ok(())
    }

    /// Un worker terminó; si era el último y hay apagado en curso, el
    /// motor pasa a `Terminated`
    pub fn exit(&self) {
        let mut inner = self.lock();
        inner.live = inner.live.saturating_sub(1);
        if inner.live == 0 && inner.state == EngineState::ShuttingDown {
            inner.state = EngineState::Terminated;
        }
        self.changed.notify_all();
    }

    /// `Running → ShuttingDown`
    ///
    /// Retorna `true` si esta llamada hizo la transición, `false` si el
    /// apagado ya estaba en curso.
    pub fn begin_shutdown(&self) -> Result<bool, EngineError> {
        let mut inner = self.lock();
        match inner.state {
            EngineState::NotStarted => Err(EngineError::NotStarted),
            EngineState::Running => {
                inner.state = if inner.live == 0 {
                    EngineState::Terminated
                } else {
                    EngineState::ShuttingDown
                };
                self.changed.notify_all();
                Ok(true)
            }
            EngineState::ShuttingDown | EngineState::Terminated => Ok(false),
        }
    }

    /// Espera hasta `Terminated` o hasta que se agote el timeout
    ///
    /// Si nunca se pidió el apagado retorna `false` de inmediato.
    pub fn await_terminated(&self, timeout: Duration) -> bool {
        let inner = self.lock();
        if matches!(inner.state, EngineState::NotStarted | EngineState::Running) {
            return false;
        }
        let (inner, _) = self
            .changed
            .wait_timeout_while(inner, timeout, |i| i.state != EngineState::Terminated)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        inner.state == EngineState::Terminated
    }

    pub fn live(&self) -> usize {
        self.lock().live
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
