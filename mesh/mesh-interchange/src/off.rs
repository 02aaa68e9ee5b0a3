//! OFF (Object File Format) support.
//!
//! ```text
//! OFF
//! # comment
//! VERTEX_COUNT TRIANGLE_COUNT EDGE_COUNT
//! x y z
//! ...
//! 3 a b c
//! ...
//! ```
//!
//! Blank lines and `#` comments may appear anywhere. Only triangles are
//! supported: a polygon line uses its first three indices and warns.
//!
//! Parsing is a line-fed state machine, [`OffParser`], so the same rules
//! serve the blocking reader, the cancellable reader used by the registry's
//! async path, and [`read_off_async`], which awaits every line under a
//! cancellation token.

use std::io::{BufRead, Write};

use mesh_types::MeshTopology;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;

use crate::builder::{MeshBuilder, MeshHints};
use crate::error::{IoError, IoResult};
use crate::number::NumberFormat;
use crate::options::{ReadOptions, WriteOptions};
use crate::registry::{MeshFormatReader, MeshSource};
use crate::warnings::{WarningContext, Warnings};
use crate::writer::{single_mesh, validate_faces};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Header,
    Counts,
    Vertices,
    Triangles,
    Done,
}

/// Line-fed OFF parser.
#[derive(Debug)]
pub struct OffParser {
    format: NumberFormat,
    stage: Stage,
    line: usize,
    vertex_count: usize,
    triangle_count: usize,
    vertices_read: usize,
    triangles_read: usize,
}

impl OffParser {
    /// Parser expecting the `OFF` header.
    #[must_use]
    pub const fn new(format: NumberFormat) -> Self {
        Self {
            format,
            stage: Stage::Header,
            line: 0,
            vertex_count: 0,
            triangle_count: 0,
            vertices_read: 0,
            triangles_read: 0,
        }
    }

    /// Whether every declared triangle has been consumed.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.stage == Stage::Done
    }

    /// Consume one line.
    ///
    /// # Errors
    ///
    /// - [`IoError::FileParsing`] for a missing header, malformed counts or a
    ///   vertex line with fewer than three coordinates
    /// - [`IoError::GarbageData`] if no vertices or triangles are declared
    /// - a number parsing error for malformed coordinates
    pub fn feed(
        &mut self,
        line: &str,
        builder: &mut dyn MeshBuilder,
        warnings: &mut Warnings<'_>,
    ) -> IoResult<()> {
        self.line += 1;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.first().is_none_or(|t| t.starts_with('#')) || self.stage == Stage::Done {
            return Ok(());
        }

        match self.stage {
            Stage::Header => {
                if !tokens[0].starts_with("OFF") {
                    return Err(IoError::parsing("ascii OFF file must start with OFF header"));
                }
                self.stage = Stage::Counts;
            }
            Stage::Counts => self.read_counts(&tokens, line, builder)?,
            Stage::Vertices => self.read_vertex(&tokens, line, builder, warnings)?,
            Stage::Triangles => self.read_triangle(&tokens, line, builder, warnings)?,
            Stage::Done => {}
        }
        Ok(())
    }

    fn read_counts(
        &mut self,
        tokens: &[&str],
        line: &str,
        builder: &mut dyn MeshBuilder,
    ) -> IoResult<()> {
        if tokens.len() != 3 {
            return Err(IoError::parsing(format!(
                "first non-comment line of OFF must be vertex/tri/edge counts, found: {}",
                line.trim_end()
            )));
        }
        self.vertex_count = self.format.parse_int(tokens[0])?;
        self.triangle_count = self.format.parse_int(tokens[1])?;
        if self.vertex_count == 0 {
            return Err(IoError::garbage("OFF file declares no vertices"));
        }
        if self.triangle_count == 0 {
            return Err(IoError::garbage("OFF file declares no triangles"));
        }
        builder.begin_mesh(MeshHints::NONE);
        self.stage = Stage::Vertices;
        Ok(())
    }

    fn read_vertex(
        &mut self,
        tokens: &[&str],
        line: &str,
        builder: &mut dyn MeshBuilder,
        warnings: &mut Warnings<'_>,
    ) -> IoResult<()> {
        let [x, y, z, ..] = tokens else {
            return Err(IoError::parsing(format!(
                "invalid OFF vertex line {}: {}",
                self.line,
                line.trim_end()
            )));
        };
        if tokens.len() != 3 {
            warnings.emit_repeated(
                "off-vertex",
                format!("found invalid OFF vertex line: {}", line.trim_end()),
                Some(WarningContext::line(self.line)),
            );
        }
        builder.append_vertex(
            self.format.parse_f64(x)?,
            self.format.parse_f64(y)?,
            self.format.parse_f64(z)?,
        );
        self.vertices_read += 1;
        if self.vertices_read == self.vertex_count {
            self.stage = Stage::Triangles;
        }
        Ok(())
    }

    fn read_triangle(
        &mut self,
        tokens: &[&str],
        line: &str,
        builder: &mut dyn MeshBuilder,
        warnings: &mut Warnings<'_>,
    ) -> IoResult<()> {
        let context = Some(WarningContext::line(self.line));
        self.triangles_read += 1;
        if self.triangles_read == self.triangle_count {
            self.stage = Stage::Done;
        }

        let [count, a, b, c, ..] = tokens else {
            warnings.emit_repeated(
                "off-triangle",
                format!("found invalid OFF triangle line: {}", line.trim_end()),
                context,
            );
            return Ok(());
        };
        if *count != "3" {
            warnings.emit_repeated(
                "off-polygon",
                format!(
                    "found non-triangle polygon in OFF, currently unsupported: {}",
                    line.trim_end()
                ),
                context.clone(),
            );
        }

        let mut ids = [0u32; 3];
        for (slot, token) in ids.iter_mut().zip([a, b, c]) {
            let index = self.format.parse_int::<i64>(token)?;
            let Some(id) = checked_index(index, self.vertex_count) else {
                warnings.emit_repeated(
                    "off-index",
                    format!("OFF triangle references a missing vertex: {}", line.trim_end()),
                    context,
                );
                return Ok(());
            };
            *slot = id;
        }
        builder.append_triangle(ids[0], ids[1], ids[2]);
        Ok(())
    }

    /// Check the parse ended in a consistent state.
    ///
    /// # Errors
    ///
    /// [`IoError::FileParsing`] if the header or counts are missing, or fewer
    /// vertex lines than declared were found. Missing triangles only warn.
    pub fn finish(self, warnings: &mut Warnings<'_>) -> IoResult<()> {
        match self.stage {
            Stage::Header => Err(IoError::parsing("ascii OFF file must start with OFF header")),
            Stage::Counts => Err(IoError::parsing("OFF file has no counts line")),
            Stage::Vertices => Err(IoError::parsing(format!(
                "file specified {} vertices but only found {}",
                self.vertex_count, self.vertices_read
            ))),
            Stage::Triangles => {
                warnings.emit(
                    format!(
                        "file specified {} triangles but only found {}",
                        self.triangle_count, self.triangles_read
                    ),
                    None,
                );
                Ok(())
            }
            Stage::Done => Ok(()),
        }
    }
}

fn checked_index(index: i64, vertex_count: usize) -> Option<u32> {
    usize::try_from(index)
        .ok()
        .filter(|&i| i < vertex_count)
        .and_then(|i| u32::try_from(i).ok())
}

/// Read an OFF stream line by line.
///
/// With a token, cancellation is checked before every line.
///
/// # Errors
///
/// As [`OffParser::feed`] and [`OffParser::finish`], plus
/// [`IoError::Cancelled`].
pub fn read_off<R: BufRead + ?Sized>(
    source: &mut R,
    builder: &mut dyn MeshBuilder,
    format: NumberFormat,
    warnings: &mut Warnings<'_>,
    cancel: Option<&CancellationToken>,
) -> IoResult<()> {
    let mut parser = OffParser::new(format);
    let mut line = String::new();
    while !parser.is_done() {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(IoError::Cancelled);
        }
        line.clear();
        if source.read_line(&mut line)? == 0 {
            break;
        }
        parser.feed(&line, builder, warnings)?;
    }
    parser.finish(warnings)
}

/// Read an OFF stream asynchronously, awaiting every line under `cancel`.
///
/// # Errors
///
/// As [`read_off`]; [`IoError::Cancelled`] as soon as the token fires.
pub async fn read_off_async<R: AsyncBufRead + Unpin + ?Sized>(
    source: &mut R,
    builder: &mut dyn MeshBuilder,
    options: &ReadOptions,
    warnings: &mut Warnings<'_>,
    cancel: &CancellationToken,
) -> IoResult<()> {
    let mut parser = OffParser::new(options.number_format);
    let mut line = String::new();
    while !parser.is_done() {
        line.clear();
        let read = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(IoError::Cancelled),
            read = source.read_line(&mut line) => read?,
        };
        if read == 0 {
            break;
        }
        parser.feed(&line, builder, warnings)?;
    }
    parser.finish(warnings)
}

/// OFF handler for the registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct OffFormatReader;

impl MeshFormatReader for OffFormatReader {
    fn name(&self) -> &'static str {
        "off"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["off"]
    }

    fn read(
        &self,
        source: &mut dyn MeshSource,
        builder: &mut dyn MeshBuilder,
        options: &ReadOptions,
        warnings: &mut Warnings<'_>,
    ) -> IoResult<()> {
        read_off(source, builder, options.number_format, warnings, None)
    }

    fn read_cancellable(
        &self,
        source: &mut dyn MeshSource,
        builder: &mut dyn MeshBuilder,
        options: &ReadOptions,
        warnings: &mut Warnings<'_>,
        cancel: &CancellationToken,
    ) -> IoResult<()> {
        read_off(source, builder, options.number_format, warnings, Some(cancel))
    }
}

/// Write one mesh as OFF.
///
/// # Errors
///
/// Returns [`IoError::InvalidInput`] unless exactly one mesh is given, or a
/// face references a missing vertex.
pub fn write_off<M: MeshTopology, W: Write>(
    writer: &mut W,
    meshes: &[M],
    options: &WriteOptions,
) -> IoResult<()> {
    let mesh = single_mesh(meshes, "OFF")?;
    validate_faces(mesh)?;
    let format = options.number_format;

    writeln!(writer, "OFF")?;
    writeln!(writer, "{} {} 0", mesh.vertex_count(), mesh.face_count())?;
    for v in mesh.vertices() {
        let p = &v.position;
        writeln!(
            writer,
            "{} {} {}",
            format.format(p.x),
            format.format(p.y),
            format.format(p.z)
        )?;
    }
    for [a, b, c] in mesh.faces() {
        writeln!(writer, "3 {a} {b} {c}")?;
    }
    Ok(())
}
