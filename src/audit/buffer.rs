//! Section buffers
//!
//! Per-kind, append-only row accumulators shared by the concurrent
//! collection tasks. Each buffer serializes its appenders with its own
//! mutex, so a batch lands contiguously and rows are never torn.

use crate::resource::{ProjectionError, ResourceKind, Row};
use tokio::sync::Mutex;

/// Rows collected so far for one kind
#[derive(Debug)]
pub struct SectionBuffer {
    kind: ResourceKind,
    rows: Mutex<Vec<Row>>,
}

impl SectionBuffer {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            rows: Mutex::new(Vec::new()),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Append a batch atomically; returns the number of rows added.
    ///
    /// A batch containing a row of the wrong width is refused whole.
    pub async fn append(&self, batch: Vec<Row>) -> Result<usize, ProjectionError> {
        let expected = self.kind.columns().len();
        if let Some(bad) = batch.iter().find(|row| row.len() != expected) {
            return Err(ProjectionError::FieldCount {
                kind: self.kind,
                expected,
                actual: bad.len(),
            });
        }

        let added = batch.len();
        if added > 0 {
            self.rows.lock().await.extend(batch);
        }
        Ok(added)
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    async fn snapshot(&self) -> Vec<Row> {
        self.rows.lock().await.clone()
    }
}

/// One buffer per resource kind
#[derive(Debug)]
pub struct SectionBuffers {
    buffers: [SectionBuffer; ResourceKind::ALL.len()],
}

impl Default for SectionBuffers {
    fn default() -> Self {
        Self::new()
    }
}

impl SectionBuffers {
    pub fn new() -> Self {
        Self {
            buffers: ResourceKind::ALL.map(SectionBuffer::new),
        }
    }

    pub fn get(&self, kind: ResourceKind) -> &SectionBuffer {
        &self.buffers[kind.index()]
    }

    /// Copy out an immutable view once collection has settled
    pub async fn freeze(&self) -> FrozenSections {
        let mut rows: [Vec<Row>; ResourceKind::ALL.len()] = Default::default();
        for buffer in &self.buffers {
            rows[buffer.kind().index()] = buffer.snapshot().await;
        }
        FrozenSections { rows }
    }
}

/// Collected rows per kind, no longer mutable
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrozenSections {
    rows: [Vec<Row>; ResourceKind::ALL.len()],
}

impl FrozenSections {
    /// Build directly from rows (kinds not listed stay empty)
    pub fn from_rows(rows: impl IntoIterator<Item = (ResourceKind, Vec<Row>)>) -> Self {
        let mut frozen = Self::default();
        for (kind, kind_rows) in rows {
            frozen.rows[kind.index()].extend(kind_rows);
        }
        frozen
    }

    pub fn rows(&self, kind: ResourceKind) -> &[Row] {
        &self.rows[kind.index()]
    }

    /// Whether the kind gets a section in the report
    pub fn has_data(&self, kind: ResourceKind) -> bool {
        !self.rows[kind.index()].is_empty()
    }

    #[cfg(test)]
    pub(crate) fn total_rows(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }
}
