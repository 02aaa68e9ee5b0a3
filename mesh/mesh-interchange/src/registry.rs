//! Format registry and read dispatch.
//!
//! [`StandardMeshReader`] owns a table of [`MeshFormatReader`]s keyed by file
//! extension, the [`MeshBuilder`] they write into, and an optional warning
//! callback. Every read goes through one dispatch routine that:
//!
//! - checks the builder is set and a handler matches the extension
//!   (case-insensitive),
//! - runs the handler with the caller's [`ReadOptions`] (the numeric format is
//!   part of the options, so no ambient locale is touched),
//! - contains faults: low-level errors and panics become
//!   [`IoError::GenericReader`] carrying the original message.
//!
//! The async entry points buffer the whole source first, racing the
//! cancellation token, and check the token again before parsing.

use std::any::Any;
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, Seek};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::builder::{IndexedMeshBuilder, MeshBuilder, MeshHints, NewVertexInfo};
use crate::container::ContainerFormatReader;
use crate::error::{IoError, IoResult};
use crate::material::Material;
use crate::obj::ObjFormatReader;
use crate::off::OffFormatReader;
use crate::options::ReadOptions;
use crate::stl::StlFormatReader;
use crate::warnings::{ReadWarning, Warnings};

/// Byte source a reader consumes. Readers may rewind it.
pub trait MeshSource: BufRead + Seek {}

impl<T: BufRead + Seek + ?Sized> MeshSource for T {}

/// A format handler.
pub trait MeshFormatReader: Send + Sync {
    /// Short format name, for logs and summaries.
    fn name(&self) -> &'static str;

    /// Extensions handled, lowercase and without the dot.
    fn extensions(&self) -> &'static [&'static str];

    /// Read one source into `builder`.
    ///
    /// # Errors
    ///
    /// Returns a structural error when the content cannot produce a mesh.
    fn read(
        &self,
        source: &mut dyn MeshSource,
        builder: &mut dyn MeshBuilder,
        options: &ReadOptions,
        warnings: &mut Warnings<'_>,
    ) -> IoResult<()>;

    /// Read while observing a cancellation token.
    ///
    /// Handlers that are not cancellation-aware run to completion.
    ///
    /// # Errors
    ///
    /// As [`read`](Self::read), plus [`IoError::Cancelled`].
    fn read_cancellable(
        &self,
        source: &mut dyn MeshSource,
        builder: &mut dyn MeshBuilder,
        options: &ReadOptions,
        warnings: &mut Warnings<'_>,
        _cancel: &CancellationToken,
    ) -> IoResult<()> {
        self.read(source, builder, options, warnings)
    }
}

/// Outcome of a successful read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadSummary {
    /// Name of the handler that read the source.
    pub format: &'static str,
    /// Meshes begun on the builder.
    pub meshes: usize,
    /// Vertices appended over all meshes.
    pub vertices: usize,
    /// Triangles appended over all meshes.
    pub triangles: usize,
    /// Warnings emitted.
    pub warnings: usize,
}

/// Builder wrapper counting what a read appends.
struct CountingBuilder<'a> {
    inner: &'a mut dyn MeshBuilder,
    meshes: usize,
    vertices: usize,
    triangles: usize,
}

impl MeshBuilder for CountingBuilder<'_> {
    fn begin_mesh(&mut self, hints: MeshHints) -> usize {
        self.meshes += 1;
        self.inner.begin_mesh(hints)
    }

    fn append_vertex(&mut self, x: f64, y: f64, z: f64) -> u32 {
        self.vertices += 1;
        self.inner.append_vertex(x, y, z)
    }

    fn append_vertex_info(&mut self, info: &NewVertexInfo) -> u32 {
        self.vertices += 1;
        self.inner.append_vertex_info(info)
    }

    fn append_triangle(&mut self, a: u32, b: u32, c: u32) -> u32 {
        self.triangles += 1;
        self.inner.append_triangle(a, b, c)
    }

    fn build_material(&mut self, material: &Material) -> usize {
        self.inner.build_material(material)
    }

    fn assign_material(&mut self, material_id: usize, mesh_id: usize) {
        self.inner.assign_material(material_id, mesh_id);
    }
}

type BoxedWarningHandler = Box<dyn FnMut(&ReadWarning) + Send>;

/// Registry of format handlers plus the builder they target.
pub struct StandardMeshReader<B: MeshBuilder = IndexedMeshBuilder> {
    readers: Vec<Box<dyn MeshFormatReader>>,
    builder: Option<B>,
    warning_handler: Option<BoxedWarningHandler>,
}

impl<B: MeshBuilder> std::fmt::Debug for StandardMeshReader<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.readers.iter().map(|r| r.name()).collect();
        f.debug_struct("StandardMeshReader")
            .field("readers", &names)
            .field("has_builder", &self.builder.is_some())
            .finish_non_exhaustive()
    }
}

impl StandardMeshReader<IndexedMeshBuilder> {
    /// Reader with the default handlers (OBJ, STL, OFF, container) and an
    /// [`IndexedMeshBuilder`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_builder(IndexedMeshBuilder::new())
    }
}

impl Default for StandardMeshReader<IndexedMeshBuilder> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: MeshBuilder> StandardMeshReader<B> {
    /// Reader with the default handlers writing into `builder`.
    #[must_use]
    pub fn with_builder(builder: B) -> Self {
        let mut reader = Self::without_formats();
        reader.builder = Some(builder);
        reader.readers = vec![
            Box::new(ObjFormatReader),
            Box::new(StlFormatReader),
            Box::new(OffFormatReader),
            Box::new(ContainerFormatReader),
        ];
        reader
    }

    /// Reader with no handlers and no builder.
    #[must_use]
    pub fn without_formats() -> Self {
        Self {
            readers: Vec::new(),
            builder: None,
            warning_handler: None,
        }
    }

    /// Set the builder.
    pub fn set_builder(&mut self, builder: B) {
        self.builder = Some(builder);
    }

    /// Current builder.
    #[must_use]
    pub const fn builder(&self) -> Option<&B> {
        self.builder.as_ref()
    }

    /// Current builder, mutably.
    pub const fn builder_mut(&mut self) -> Option<&mut B> {
        self.builder.as_mut()
    }

    /// Remove and return the builder.
    pub const fn take_builder(&mut self) -> Option<B> {
        self.builder.take()
    }

    /// Register the warning callback.
    pub fn on_warning(&mut self, handler: impl FnMut(&ReadWarning) + Send + 'static) {
        self.warning_handler = Some(Box::new(handler));
    }

    /// Whether a handler accepts `extension` (case-insensitive, no dot).
    #[must_use]
    pub fn supports(&self, extension: &str) -> bool {
        self.find_reader(extension).is_some()
    }

    /// Handler for `extension`, if registered.
    #[must_use]
    pub fn find_reader(&self, extension: &str) -> Option<&dyn MeshFormatReader> {
        find_reader(&self.readers, extension)
    }

    /// Register a handler.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::DuplicateFormat`] if any of its extensions is
    /// already registered; the registry is left unchanged.
    pub fn register(&mut self, reader: impl MeshFormatReader + 'static) -> IoResult<()> {
        if let Some(ext) = reader.extensions().iter().find(|ext| self.supports(ext)) {
            return Err(IoError::DuplicateFormat {
                extension: (*ext).to_string(),
            });
        }
        debug!(format = reader.name(), "registered mesh format");
        self.readers.push(Box::new(reader));
        Ok(())
    }

    /// Read `source`, parsed as `extension`, into the builder.
    ///
    /// # Errors
    ///
    /// - [`IoError::GenericReader`] if no builder is set, or the handler faults
    /// - [`IoError::UnknownFormat`] if no handler matches
    /// - any structural error reported by the handler
    pub fn read<R: BufRead + Seek>(
        &mut self,
        source: &mut R,
        extension: &str,
        options: &ReadOptions,
    ) -> IoResult<ReadSummary> {
        self.dispatch(source, extension, options, None)
    }

    /// Read the file at `path`, choosing the handler from its extension.
    ///
    /// When materials are enabled, the file's directory is searched for
    /// material libraries after `options.material_search_paths`.
    ///
    /// # Errors
    ///
    /// [`IoError::InvalidFilename`] without an extension,
    /// [`IoError::FileAccess`] if the file cannot be opened, otherwise as
    /// [`read`](Self::read).
    pub fn read_path(
        &mut self,
        path: impl AsRef<Path>,
        options: &ReadOptions,
    ) -> IoResult<ReadSummary> {
        let path = path.as_ref();
        let extension = extension_of(path)?;
        let file = File::open(path).map_err(|e| IoError::access(path, &e))?;
        let options = with_source_dir(options, path);
        let mut source = BufReader::new(file);
        self.dispatch(&mut source, &extension, &options, None)
    }

    /// Asynchronous read with cancellation.
    ///
    /// The source is buffered completely before parsing; a cancelled token
    /// stops the read before any byte is parsed.
    ///
    /// # Errors
    ///
    /// [`IoError::Cancelled`] if the token fires before or during buffering
    /// (or between lines for cancellation-aware formats),
    /// [`IoError::FileAccess`] if the source cannot be read, otherwise as
    /// [`read`](Self::read).
    pub async fn read_async<R>(
        &mut self,
        source: &mut R,
        extension: &str,
        options: &ReadOptions,
        cancel: &CancellationToken,
    ) -> IoResult<ReadSummary>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        if cancel.is_cancelled() {
            return Err(IoError::Cancelled);
        }

        let mut buffer = Vec::new();
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(IoError::Cancelled),
            read = source.read_to_end(&mut buffer) => {
                read.map_err(|e| IoError::FileAccess {
                    message: format!("stream: {e}"),
                })?;
            }
        }
        debug!(bytes = buffer.len(), "buffered mesh source");

        if cancel.is_cancelled() {
            return Err(IoError::Cancelled);
        }
        let mut cursor = Cursor::new(buffer);
        self.dispatch(&mut cursor, extension, options, Some(cancel))
    }

    /// Asynchronous [`read_path`](Self::read_path).
    ///
    /// # Errors
    ///
    /// As [`read_path`](Self::read_path) and [`read_async`](Self::read_async).
    pub async fn read_path_async(
        &mut self,
        path: impl AsRef<Path>,
        options: &ReadOptions,
        cancel: &CancellationToken,
    ) -> IoResult<ReadSummary> {
        let path = path.as_ref();
        let extension = extension_of(path)?;
        if cancel.is_cancelled() {
            return Err(IoError::Cancelled);
        }
        let mut file = tokio::fs::File::open(path)
            .await
            .map_err(|e| IoError::access(path, &e))?;
        let options = with_source_dir(options, path);
        self.read_async(&mut file, &extension, &options, cancel)
            .await
    }

    fn dispatch(
        &mut self,
        source: &mut dyn MeshSource,
        extension: &str,
        options: &ReadOptions,
        cancel: Option<&CancellationToken>,
    ) -> IoResult<ReadSummary> {
        let Some(builder) = self.builder.as_mut() else {
            return Err(IoError::generic("mesh builder is not set"));
        };
        let Some(reader) = find_reader(&self.readers, extension) else {
            return Err(IoError::UnknownFormat {
                extension: extension.to_string(),
            });
        };

        let handler = self
            .warning_handler
            .as_deref_mut()
            .map(|h| h as &mut (dyn FnMut(&ReadWarning) + Send));
        let mut warnings = Warnings::new(handler);
        let mut counting = CountingBuilder {
            inner: builder,
            meshes: 0,
            vertices: 0,
            triangles: 0,
        };

        let outcome = catch_unwind(AssertUnwindSafe(|| match cancel {
            Some(token) => {
                reader.read_cancellable(source, &mut counting, options, &mut warnings, token)
            }
            None => reader.read(source, &mut counting, options, &mut warnings),
        }));

        match outcome {
            Ok(Ok(())) => {
                let summary = ReadSummary {
                    format: reader.name(),
                    meshes: counting.meshes,
                    vertices: counting.vertices,
                    triangles: counting.triangles,
                    warnings: warnings.emitted(),
                };
                info!(
                    format = summary.format,
                    meshes = summary.meshes,
                    vertices = summary.vertices,
                    triangles = summary.triangles,
                    warnings = summary.warnings,
                    "mesh read complete"
                );
                Ok(summary)
            }
            Ok(Err(e)) => Err(e.into_reader_fault()),
            Err(payload) => Err(IoError::generic(format!(
                "unknown error: {}",
                panic_message(payload.as_ref())
            ))),
        }
    }
}

fn find_reader<'a>(
    readers: &'a [Box<dyn MeshFormatReader>],
    extension: &str,
) -> Option<&'a dyn MeshFormatReader> {
    readers
        .iter()
        .find(|r| {
            r.extensions()
                .iter()
                .any(|ext| ext.eq_ignore_ascii_case(extension))
        })
        .map(AsRef::as_ref)
}

/// Extension of `path` without the dot.
fn extension_of(path: &Path) -> IoResult<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(str::to_string)
        .ok_or_else(|| IoError::InvalidFilename {
            path: path.to_path_buf(),
        })
}

fn with_source_dir(options: &ReadOptions, path: &Path) -> ReadOptions {
    let mut options = options.clone();
    if options.read_materials {
        if let Some(dir) = path.parent() {
            let dir = if dir.as_os_str().is_empty() {
                Path::new(".")
            } else {
                dir
            };
            options.material_search_paths.push(dir.to_path_buf());
        }
    }
    options
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("reader panicked")
}
