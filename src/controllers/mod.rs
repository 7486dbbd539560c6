//! # Controladores de Demostración
//! src/controllers/mod.rs
//!
//! Colaboradores de negocio en memoria que usan el binario y los tests de
//! punta a punta. Solo conocen la interfaz de registro del dispatcher.

pub mod files;
pub mod users;

pub use files::{FileController, FileMeta};
pub use users::{User, UserController};
