//! # Controlador de Archivos
//! src/controllers/files.rs
//!
//! Intercambio de archivos en memoria bajo `/api/v1/files`. El upload llega
//! como parte multipart `file` (más un campo `description` opcional); el
//! contenido se copia a memoria, se calcula su SHA256 y el temporal se
//! libera antes de responder.

use crate::dispatcher::{Args, Controller, Endpoint, FileReply, ParamKind, Reply, RouteDecl};
use crate::error::HandlerError;
use crate::http::{mime, TempFilePart};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::Read;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Metadatos públicos de un archivo almacenado
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileMeta {
    pub id: u64,
    pub filename: String,
    pub content_type: String,
    pub size: u64,
    pub sha256: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug)]
struct StoredFile {
    meta: FileMeta,
    content: Vec<u8>,
}

#[derive(Debug, Default)]
struct FileStore {
    next_id: u64,
    files: BTreeMap<u64, StoredFile>,
}

#[derive(Debug, Default)]
pub struct FileController {
    store: RwLock<FileStore>,
}

impl FileController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.read().files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> RwLockReadGuard<'_, FileStore> {
        self.store.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, FileStore> {
        self.store.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn upload(&self, mut args: Args) -> Result<Reply, HandlerError> {
        let part = args.required_file("file")?;
        let description = args
            .text("description")
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);

        let filename = part
            .filename()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| HandlerError::client("file part has no filename"))?
            .to_string();
        let content_type = part
            .content_type()
            .unwrap_or_else(|| mime::content_type_for(&filename))
            .to_string();

        let (content, sha256) = read_and_hash(&part)?;
        if let Err(e) = part.release() {
            tracing::warn!("could not release upload: {}", e);
        }

        let mut store = self.write();
        store.next_id += 1;
        let meta = FileMeta {
            id: store.next_id,
            filename,
            content_type,
            size: content.len() as u64,
            sha256,
            description,
        };
        store.files.insert(
            meta.id,
            StoredFile {
                meta: meta.clone(),
                content,
            },
        );
        drop(store);

        tracing::info!(file_id = meta.id, size = meta.size, "file stored");
        Reply::json(&meta)
    }

    fn list(&self) -> Result<Reply, HandlerError> {
        let store = self.read();
        let metas: Vec<&FileMeta> = store.files.values().map(|f| &f.meta).collect();
        Reply::json(&metas)
    }

    fn metadata(&self, args: Args) -> Result<Reply, HandlerError> {
        let id = file_id(&args)?;
        let store = self.read();
        let file = store.files.get(&id).ok_or_else(|| not_found(id))?;
        Reply::json(&file.meta)
    }

    fn download(&self, args: Args) -> Result<Reply, HandlerError> {
        let id = file_id(&args)?;
        let store = self.read();
        let file = store.files.get(&id).ok_or_else(|| not_found(id))?;

        Ok(FileReply::from_bytes(file.content.clone())
            .with_filename(&file.meta.filename)
            .with_content_type(&file.meta.content_type)
            .into())
    }

    fn delete(&self, args: Args) -> Result<Reply, HandlerError> {
        let id = file_id(&args)?;
        self.write().files.remove(&id).ok_or_else(|| not_found(id))?;
        Reply::json(&serde_json::json!({ "status": "deleted", "id": id }))
    }
}

/// Copia el upload a memoria calculando su SHA256 en el camino
fn read_and_hash(part: &TempFilePart) -> Result<(Vec<u8>, String), HandlerError> {
    let mut file = part.open()?;
    let mut content = Vec::with_capacity(part.size() as usize);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
        content.extend_from_slice(&buffer[..n]);
    }

    Ok((content, format!("{:x}", hasher.finalize())))
}

fn file_id(args: &Args) -> Result<u64, HandlerError> {
    let id = args.required_integer("id")?;
    u64::try_from(id).map_err(|_| HandlerError::client(format!("invalid file id: {}", id)))
}

fn not_found(id: u64) -> HandlerError {
    HandlerError::NotFound(format!("file {} not found", id))
}

impl Controller for FileController {
    fn base_path(&self) -> &str {
        "/api/v1/files"
    }

    fn endpoints(self: Arc<Self>) -> Vec<Endpoint> {
        let upload = Arc::clone(&self);
        let list = Arc::clone(&self);
        let metadata = Arc::clone(&self);
        let download = Arc::clone(&self);
        let delete = self;

        vec![
            RouteDecl::post("/upload")
                .part("file", ParamKind::File)
                .part("description", ParamKind::Text)
                .handle(move |args| upload.upload(args)),
            RouteDecl::get("").handle(move |_| list.list()),
            RouteDecl::get("/{id}")
                .path_var("id", ParamKind::Integer)
                .handle(move |args| metadata.metadata(args)),
            RouteDecl::get("/{id}/download")
                .path_var("id", ParamKind::Integer)
                .handle(move |args| download.download(args)),
            RouteDecl::delete("/{id}")
                .path_var("id", ParamKind::Integer)
                .handle(move |args| delete.delete(args)),
        ]
    }
}
