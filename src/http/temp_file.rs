//! # Archivos Temporales de Upload
//! src/http/temp_file.rs
//!
//! `TempFilePart` es dueño exclusivo de un archivo temporal creado al
//! parsear una parte multipart. El archivo se borra exactamente una vez:
//! con `release()` explícito o, si nadie lo hizo, al hacer drop del handle.
//!
//! La propiedad se transfiere por movimiento (parser → request → handler),
//! así que nunca hay dos dueños leyendo o borrando a la vez.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

/// Pausa antes del único reintento de borrado
const DELETE_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Handle sobre el archivo temporal de un upload
#[derive(Debug)]
pub struct TempFilePart {
    path: PathBuf,
    filename: Option<String>,
    content_type: Option<String>,
    size: u64,
    released: bool,
}

impl TempFilePart {
    /// Crea un archivo vacío `upload-*.tmp` dentro de `dir`
    ///
    /// El directorio se crea si no existe. Retorna el handle (ya dueño del
    /// archivo) y el `File` abierto para escribir.
    pub fn create_in(
        dir: &Path,
        filename: Option<String>,
        content_type: Option<String>,
    ) -> io::Result<(Self, File)> {
        fs::create_dir_all(dir)?;

        let (file, path) = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(".tmp")
            .tempfile_in(dir)?
            .keep()?;

        let part = Self {
            path,
            filename,
            content_type,
            size: 0,
            released: false,
        };
        Ok((part, file))
    }

    pub(crate) fn set_size(&mut self, size: u64) {
        self.size = size;
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Nombre original enviado por el cliente (`filename=`)
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Bytes escritos en el archivo
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Abre el archivo para lectura
    pub fn open(&self) -> io::Result<File> {
        File::open(&self.path)
    }

    /// Lee todo el contenido a memoria
    pub fn read_to_vec(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.size as usize);
        self.open()?.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Borra el archivo temporal y consume el handle
    pub fn release(mut self) -> io::Result<()> {
        self.delete()
    }

    fn delete(&mut self) -> io::Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        match remove_if_present(&self.path) {
            Ok(()) => Ok(()),
            Err(first) => {
                tracing::warn!(
                    path = %self.path.display(),
                    "temp file deletion failed ({}), retrying once",
                    first
                );
                thread::sleep(DELETE_RETRY_DELAY);
                remove_if_present(&self.path).inspect_err(|e| {
                    tracing::warn!(path = %self.path.display(), "temp file left behind: {}", e);
                })
            }
        }
    }
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

impl Drop for TempFilePart {
    fn drop(&mut self) {
        // El error ya quedó en el log
        let _ = self.delete();
    }
}
