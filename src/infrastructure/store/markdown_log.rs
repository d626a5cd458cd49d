//! Markdown file implementation of [`LogStore`].
//!
//! Two layouts are supported:
//! - `Sections`: header, then blocks separated by `\n\n---\n\n` (worker
//!   memory logs, the inter-worker event log, the snapshot).
//! - `Lines`: a fixed number of header lines, then one block per line (the
//!   task history table).
//!
//! Every mutation rewrites the file through a temporary sibling and a
//! rename, so readers never observe a half-written document.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::ports::{LogStore, StoreError};

/// Separator between sections of a markdown log.
pub const SECTION_SEPARATOR: &str = "\n\n---\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Sections,
    Lines { header_lines: usize },
}

#[derive(Debug, Default)]
struct Document {
    header: String,
    blocks: Vec<String>,
}

pub struct MarkdownLogStore {
    path: PathBuf,
    layout: Layout,
    lock: Mutex<()>,
}

impl MarkdownLogStore {
    pub fn new(path: impl Into<PathBuf>, layout: Layout) -> Self {
        Self {
            path: path.into(),
            layout,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse(&self, contents: &str) -> Document {
        match self.layout {
            Layout::Sections => {
                let mut parts = contents.split(SECTION_SEPARATOR);
                let header = parts.next().unwrap_or_default().trim_end().to_string();
                let blocks = parts
                    .map(|p| p.trim_end().to_string())
                    .filter(|p| !p.trim().is_empty())
                    .collect();
                Document { header, blocks }
            }
            Layout::Lines { header_lines } => {
                let lines: Vec<&str> = contents.lines().collect();
                let split = header_lines.min(lines.len());
                Document {
                    header: lines[..split].join("\n"),
                    blocks: lines[split..]
                        .iter()
                        .filter(|l| !l.trim().is_empty())
                        .map(|l| (*l).to_string())
                        .collect(),
                }
            }
        }
    }

    fn render(&self, doc: &Document) -> String {
        match self.layout {
            Layout::Sections => {
                let mut out = doc.header.clone();
                for block in &doc.blocks {
                    out.push_str(SECTION_SEPARATOR);
                    out.push_str(block);
                }
                out.push('\n');
                out
            }
            Layout::Lines { .. } => {
                let mut out = doc.header.clone();
                out.push('\n');
                for block in &doc.blocks {
                    out.push_str(block);
                    out.push('\n');
                }
                out
            }
        }
    }

    async fn load(&self) -> Result<Option<Document>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                let text = String::from_utf8(bytes).map_err(|e| {
                    StoreError::corrupt(self.path.display(), format!("not UTF-8: {e}"))
                })?;
                Ok(Some(self.parse(&text)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(self.path.display(), e)),
        }
    }

    async fn load_existing(&self) -> Result<Document, StoreError> {
        self.load()
            .await?
            .ok_or_else(|| StoreError::NotFound(self.path.display().to_string()))
    }

    async fn persist(&self, doc: &Document) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(parent.display(), e))?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, self.render(doc))
            .await
            .map_err(|e| StoreError::io(tmp.display(), e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StoreError::io(self.path.display(), e))
    }
}

#[async_trait]
impl LogStore for MarkdownLogStore {
    async fn read_header(&self) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.map(|doc| doc.header))
    }

    async fn overwrite_header(&self, header: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut doc = self.load().await?.unwrap_or_default();
        doc.header = header.trim_end().to_string();
        self.persist(&doc).await
    }

    async fn append(&self, block: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut doc = self.load_existing().await?;
        doc.blocks.push(block.trim_end().to_string());
        self.persist(&doc).await
    }

    async fn read_recent(&self, n: usize) -> Result<Vec<String>, StoreError> {
        let _guard = self.lock.lock().await;
        let doc = self.load().await?.unwrap_or_default();
        let skip = doc.blocks.len().saturating_sub(n);
        Ok(doc.blocks.into_iter().skip(skip).collect())
    }

    async fn replace_last(&self, block: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut doc = self.load_existing().await?;
        let last = doc.blocks.last_mut().ok_or_else(|| {
            StoreError::NotFound(format!("{}: no entry to replace", self.path.display()))
        })?;
        *last = block.trim_end().to_string();
        self.persist(&doc).await
    }

    async fn retain_recent(&self, keep: usize) -> Result<usize, StoreError> {
        let _guard = self.lock.lock().await;
        let mut doc = self.load_existing().await?;
        let dropped = doc.blocks.len().saturating_sub(keep);
        if dropped > 0 {
            doc.blocks.drain(..dropped);
            self.persist(&doc).await?;
        }
        Ok(dropped)
    }

    async fn len(&self) -> Result<usize, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.map_or(0, |doc| doc.blocks.len()))
    }

    async fn reset(&self, header: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let doc = Document {
            header: header.trim_end().to_string(),
            blocks: Vec::new(),
        };
        self.persist(&doc).await
    }
}
