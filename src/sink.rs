use crate::error::ExportError;
use crate::export::ExportDocument;
use log::{error, info};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Destination for a finished export.
pub trait DocumentSink {
    /// Writes the document. Returns the path written, if any.
    fn save(&mut self, document: &ExportDocument) -> Result<Option<PathBuf>, ExportError>;
}

/// Saves `<filename>.md` into a directory, replacing any existing file
/// atomically.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DirectorySink { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn target_path(&self, document: &ExportDocument) -> PathBuf {
        self.dir.join(format!("{}.md", document.filename))
    }
}

impl DocumentSink for DirectorySink {
    fn save(&mut self, document: &ExportDocument) -> Result<Option<PathBuf>, ExportError> {
        let target = self.target_path(document);
        let write = || -> std::io::Result<()> {
            fs::create_dir_all(&self.dir)?;
            let mut file = NamedTempFile::new_in(&self.dir)?;
            file.write_all(document.markdown_text.as_bytes())?;
            file.flush()?;
            file.persist(&target).map_err(|e| e.error)?;
            Ok(())
        };

        match write() {
            Ok(()) => {
                info!("Saved export to {}", target.display());
                Ok(Some(target))
            }
            Err(e) => {
                error!("Failed to save export to {}: {e}", target.display());
                Err(e.into())
            }
        }
    }
}

/// Writes the Markdown to any writer, typically stdout.
pub struct WriterSink<W: Write> {
    writer: W,
}

impl<W: Write> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        WriterSink { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> DocumentSink for WriterSink<W> {
    fn save(&mut self, document: &ExportDocument) -> Result<Option<PathBuf>, ExportError> {
        self.writer.write_all(document.markdown_text.as_bytes())?;
        self.writer.flush()?;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document() -> ExportDocument {
        ExportDocument {
            markdown_text: "# Title\n\nBody\n".to_string(),
            filename: "My Chat".to_string(),
        }
    }

    #[test]
    fn test_writer_sink_writes_markdown() {
        let mut sink = WriterSink::new(Vec::new());
        assert_eq!(sink.save(&document()).unwrap(), None);
        assert_eq!(sink.into_inner(), b"# Title\n\nBody\n");
    }
}
