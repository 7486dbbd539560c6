//! # Cola de Trabajo
//! src/executor/queue.rs
//!
//! Cola FIFO thread-safe compartida entre quien envía tareas y todos
//! los workers. Puede ser acotada o ilimitada.
//!
//! - `push` nunca bloquea: si la cola está llena o cerrada, rechaza.
//! - `pop` bloquea hasta que haya trabajo o la cola se cierre y vacíe.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};

/// Motivo por el que `push` rechazó un elemento
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushError {
    /// La cola alcanzó su capacidad máxima
    Full(usize),
    /// La cola fue cerrada (apagado en curso)
    Closed,
}

impl std::fmt::Display for PushError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PushError::Full(cap) => write!(f, "queue is full (max capacity: {})", cap),
            PushError::Closed => write!(f, "queue is closed"),
        }
    }
}

struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Cola FIFO bloqueante
pub struct WorkQueue<T> {
    state: Mutex<QueueState<T>>,

    /// Condvar para despertar workers cuando hay trabajo o se cierra
    condvar: Condvar,

    /// Capacidad máxima (None = ilimitada)
    max_capacity: Option<usize>,
}

impl<T> WorkQueue<T> {
    /// Crea una cola ilimitada
    pub fn unbounded() -> Self {
        Self::with_capacity(None)
    }

    /// Crea una cola con capacidad máxima
    pub fn bounded(max_capacity: usize) -> Self {
        Self::with_capacity(Some(max_capacity))
    }

    fn with_capacity(max_capacity: Option<usize>) -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                closed: false,
            }),
            condvar: Condvar::new(),
            max_capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Encola un elemento al final
    ///
    /// Si la cola está llena o cerrada, devuelve el elemento junto al error.
    pub fn push(&self, item: T) -> Result<(), (T, PushError)> {
        let mut state = self.lock();

        if state.closed {
            return Err((item, PushError::Closed));
        }
        if let Some(cap) = self.max_capacity {
            if state.items.len() >= cap {
                return Err((item, PushError::Full(cap)));
            }
        }

        state.items.push_back(item);
        self.condvar.notify_one();
        Ok(())
    }

    /// Desencola el primer elemento
    ///
    /// Bloquea mientras la cola esté vacía y abierta. Retorna `None` solo
    /// cuando la cola está cerrada y ya no quedan elementos.
    pub fn pop(&self) -> Option<T> {
        let mut state = self.lock();

        loop {
            if let Some(item) = state.items.pop_front() {
                return Some(item);
            }
            if state.closed {
                return None;
            }
            state = self
                .condvar
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Intenta desencolar sin bloquear
    pub fn try_pop(&self) -> Option<T> {
        self.lock().items.pop_front()
    }

    /// Cierra la cola: no acepta más elementos y despierta a todos los
    /// workers bloqueados. Los elementos ya encolados siguen disponibles.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        self.condvar.notify_all();
    }

    /// Cierra la cola y retira todos los elementos pendientes en una sola
    /// operación atómica, así ningún worker puede tomar uno en medio.
    pub fn close_and_drain(&self) -> Vec<T> {
        let mut state = self.lock();
        state.closed = true;
        let drained: Vec<T> = state.items.drain(..).collect();
        self.condvar.notify_all();
        drained
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn max_capacity(&self) -> Option<usize> {
        self.max_capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_queue_fifo_order() {
        let queue = WorkQueue::unbounded();
        queue.push(1).unwrap();
        queue.push(2).unwrap();
        queue.push(3).unwrap();

        assert_eq!(queue.try_pop(), Some(1));
        assert_eq!(queue.try_pop(), Some(2));
        assert_eq!(queue.try_pop(), Some(3));
        assert_eq!(queue.try_pop(), None);
    }

    #[test]
    fn test_queue_capacity() {
        let queue = WorkQueue::bounded(2);

        assert!(queue.push("a").is_ok());
        assert!(queue.push("b").is_ok());
        let (rejected, err) = queue.push("c").unwrap_err(); // Cola llena
        assert_eq!(rejected, "c");
        assert_eq!(err, PushError::Full(2));
    }

    #[test]
    fn test_push_after_close_is_rejected() {
        let queue = WorkQueue::unbounded();
        queue.close();
        assert!(matches!(queue.push(1), Err((1, PushError::Closed))));
    }

    #[test]
    fn test_pop_drains_before_returning_none() {
        let queue = WorkQueue::unbounded();
        queue.push(10).unwrap();
        queue.close();

        assert_eq!(queue.pop(), Some(10));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_close_wakes_blocked_pop() {
        let queue: Arc<WorkQueue<u32>> = Arc::new(WorkQueue::unbounded());
        let q = Arc::clone(&queue);
        let waiter = thread::spawn(move || q.pop());

        thread::sleep(Duration::from_millis(50));
        queue.close();

        assert_eq!(waiter.join().unwrap(), None);
    }

    #[test]
    fn test_blocked_pop_receives_pushed_item() {
        let queue: Arc<WorkQueue<u32>> = Arc::new(WorkQueue::unbounded());
        let q = Arc::clone(&queue);
        let waiter = thread::spawn(move || q.pop());

        thread::sleep(Duration::from_millis(20));
        queue.push(7).unwrap();

        assert_eq!(waiter.join().unwrap(), Some(7));
    }

    #[test]
    fn test_close_and_drain() {
        let queue = WorkQueue::unbounded();
        queue.push(1).unwrap();
        queue.push(2).unwrap();

        let drained = queue.close_and_drain();
        assert_eq!(drained, vec![1, 2]);
        assert!(queue.is_empty());
        assert!(queue.is_closed());
        assert_eq!(queue.pop(), None);
    }
}
