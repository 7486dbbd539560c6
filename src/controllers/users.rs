//! # Controlador de Usuarios
//! src/controllers/users.rs
//!
//! CRUD en memoria bajo `/api/v1/users`.
//!
//! | Método | Path     | Body              | Respuesta          |
//! |--------|----------|-------------------|--------------------|
//! | POST   | `""`     | `{name, email}`   | usuario con `id`   |
//! | GET    | `""`     | -                 | lista de usuarios  |
//! | GET    | `/{id}`  | -                 | usuario o 404      |
//! | PUT    | `/{id}`  | `{name, email}`   | usuario o 404      |
//! | DELETE | `/{id}`  | -                 | `{status, id}`     |

use crate::dispatcher::{Args, Controller, Endpoint, ParamKind, Reply, RouteDecl};
use crate::error::HandlerError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

const EMAIL_PATTERN: &str = r"^[A-Za-z0-9+_.-]+@(.+)$";

/// Usuario almacenado
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
}

/// Body de creación y actualización
#[derive(Debug, Deserialize)]
struct UserInput {
    name: String,
    email: String,
}

#[derive(Debug, Default)]
struct UserStore {
    next_id: u64,
    users: BTreeMap<u64, User>,
}

#[derive(Debug)]
pub struct UserController {
    store: RwLock<UserStore>,
    email: Regex,
}

impl UserController {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            store: RwLock::new(UserStore::default()),
            email: Regex::new(EMAIL_PATTERN)?,
        })
    }

    pub fn len(&self) -> usize {
        self.read().users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> RwLockReadGuard<'_, UserStore> {
        self.store.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, UserStore> {
        self.store.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn validate(&self, input: &UserInput) -> Result<(), HandlerError> {
        if input.name.trim().is_empty() {
            return Err(HandlerError::client("name is required"));
        }
        if !self.email.is_match(input.email.trim()) {
            return Err(HandlerError::client(format!(
                "invalid email: {:?}",
                input.email
            )));
        }
        Ok(())
    }

    fn create(&self, args: Args) -> Result<Reply, HandlerError> {
        let input: UserInput = args.required_json("user")?;
        self.validate(&input)?;

        let mut store = self.write();
        store.next_id += 1;
        let user = User {
            id: store.next_id,
            name: input.name.trim().to_string(),
            email: input.email.trim().to_string(),
        };
        store.users.insert(user.id, user.clone());
        drop(store);

        tracing::info!(user_id = user.id, "user created");
        Reply::json(&user)
    }

    fn list(&self) -> Result<Reply, HandlerError> {
        let store = self.read();
        let users: Vec<&User> = store.users.values().collect();
        Reply::json(&users)
    }

    fn get(&self, args: Args) -> Result<Reply, HandlerError> {
        let id = user_id(&args)?;
        let store = self.read();
        let user = store.users.get(&id).ok_or_else(|| not_found(id))?;
        Reply::json(user)
    }

    fn update(&self, args: Args) -> Result<Reply, HandlerError> {
        let id = user_id(&args)?;
        let input: UserInput = args.required_json("user")?;
        self.validate(&input)?;

        let mut store = self.write();
        let user = store.users.get_mut(&id).ok_or_else(|| not_found(id))?;
        user.name = input.name.trim().to_string();
        user.email = input.email.trim().to_string();
        Reply::json(&*user)
    }

    fn delete(&self, args: Args) -> Result<Reply, HandlerError> {
        let id = user_id(&args)?;
        self.write().users.remove(&id).ok_or_else(|| not_found(id))?;

        tracing::info!(user_id = id, "user deleted");
        Reply::json(&serde_json::json!({ "status": "deleted", "id": id }))
    }
}

fn user_id(args: &Args) -> Result<u64, HandlerError> {
    let id = args.required_integer("id")?;
    u64::try_from(id).map_err(|_| HandlerError::client(format!("invalid user id: {}", id)))
}

fn not_found(id: u64) -> HandlerError {
    HandlerError::NotFound(format!("user {} not found", id))
}

impl Controller for UserController {
    fn base_path(&self) -> &str {
        "/api/v1/users"
    }

    fn endpoints(self: Arc<Self>) -> Vec<Endpoint> {
        let create = Arc::clone(&self);
        let list = Arc::clone(&self);
        let get = Arc::clone(&self);
        let update = Arc::clone(&self);
        let delete = self;

        vec![
            RouteDecl::post("")
                .body("user", ParamKind::Json)
                .handle(move |args| create.create(args)),
            RouteDecl::get("").handle(move |_| list.list()),
            RouteDecl::get("/{id}")
                .path_var("id", ParamKind::Integer)
                .handle(move |args| get.get(args)),
            RouteDecl::put("/{id}")
                .path_var("id", ParamKind::Integer)
                .body("user", ParamKind::Json)
                .handle(move |args| update.update(args)),
            RouteDecl::delete("/{id}")
                .path_var("id", ParamKind::Integer)
                .handle(move |args| delete.delete(args)),
        ]
    }
}
