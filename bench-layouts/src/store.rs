//! Adapter over the columnar table engine. A parquet row group plays the
//! role of the engine's cluster: fill contexts buffer rows thread-locally,
//! and committing a cluster boundary (`write` + `flush` on the shared
//! [`ArrowWriter`]) is serialized per table behind a mutex. This is the only
//! module that touches parquet writer/reader types directly.

use std::fs::File;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, anyhow};
use arrow_array::RecordBatch;
use arrow_schema::{ArrowError, SchemaRef};
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};
use parquet::arrow::ProjectionMask;
use parquet::file::metadata::ParquetMetaData;
use parquet::file::properties::WriterProperties;

pub const BATCH_SIZE: usize = 65_536;

/// Typed serialization surface of one physical table: accumulates rows into
/// column buffers and finishes them into a record batch. One implementation
/// per physical row shape, so binding is compile-time checked.
pub trait RowBatchBuilder: Default + Send {
    type Row<'a>;

    fn schema() -> SchemaRef;
    fn push(&mut self, row: Self::Row<'_>);
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn finish(&mut self) -> Result<RecordBatch, ArrowError>;
}

/// Schema plus table name; the engine's model primitive.
#[derive(Clone, Debug)]
pub struct TableModel {
    name: String,
    schema: SchemaRef,
}

impl TableModel {
    pub fn new(name: impl Into<String>, schema: SchemaRef) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Shared write handle for one physical table. The mutex around the writer is
/// the single synchronization point on the write path: column buffering
/// happens in per-thread [`FillContext`]s, only cluster commits serialize.
pub struct TableWriter {
    name: String,
    writer: Mutex<Option<ArrowWriter<File>>>,
}

impl TableWriter {
    /// Creates `<container>/<name>.parquet` and the writer behind it. The
    /// automatic row-group cap is disabled so explicit flushes alone decide
    /// cluster boundaries.
    pub fn open(model: TableModel, container: &Path) -> anyhow::Result<Arc<Self>> {
        std::fs::create_dir_all(container)
            .with_context(|| format!("creating container {}", container.display()))?;
        let path = container.join(format!("{}.parquet", model.name));
        let file = File::create(&path)
            .with_context(|| format!("creating table file {}", path.display()))?;
        let props = WriterProperties::builder()
            .set_max_row_group_size(usize::MAX)
            .build();
        let writer = ArrowWriter::try_new(file, model.schema, Some(props))
            .with_context(|| format!("opening writer for table {}", model.name))?;
        Ok(Arc::new(Self {
            name: model.name,
            writer: Mutex::new(Some(writer)),
        }))
    }

    pub fn fill_context<B: RowBatchBuilder>(
        self: &Arc<Self>,
        rows_per_cluster: usize,
    ) -> FillContext<B> {
        FillContext {
            table: Arc::clone(self),
            builder: B::default(),
            pending: Vec::new(),
            rows_per_cluster,
        }
    }

    /// Writes the footer. Must only be called after every fill context for
    /// this table has finished.
    pub fn close(&self) -> anyhow::Result<()> {
        let writer = self
            .writer
            .lock()
            .expect("table writer lock poisoned")
            .take();
        if let Some(writer) = writer {
            writer
                .close()
                .with_context(|| format!("closing table {}", self.name))?;
        }
        Ok(())
    }
}

/// Returned by [`FillContext::fill`] to tell the caller whether a cluster
/// boundary should now be committed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use]
pub enum FlushSignal {
    Continue,
    ClusterFull,
}

/// Per-thread, non-shared write handle bound to one physical table. Owns the
/// row buffers; nothing here is synchronized except [`FillContext::flush_cluster`].
pub struct FillContext<B: RowBatchBuilder> {
    table: Arc<TableWriter>,
    builder: B,
    pending: Vec<RecordBatch>,
    rows_per_cluster: usize,
}

impl<B: RowBatchBuilder> FillContext<B> {
    /// Binds one row into the column buffers and reports whether the context
    /// has accumulated a full cluster.
    pub fn fill(&mut self, row: B::Row<'_>) -> FlushSignal {
        self.builder.push(row);
        if self.builder.len() >= self.rows_per_cluster {
            FlushSignal::ClusterFull
        } else {
            FlushSignal::Continue
        }
    }

    /// Seals the buffered columns into a pending batch. Thread-local, no lock.
    pub fn flush_columns(&mut self) -> anyhow::Result<()> {
        if !self.builder.is_empty() {
            let batch = self
                .builder
                .finish()
                .with_context(|| format!("sealing columns for table {}", self.table.name))?;
            self.pending.push(batch);
        }
        Ok(())
    }

    /// Commits the pending batches as one cluster, serialized per table.
    pub fn flush_cluster(&mut self) -> anyhow::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let mut guard = self.table.writer.lock().expect("table writer lock poisoned");
        let writer = guard
            .as_mut()
            .ok_or_else(|| anyhow!("table {} is already closed", self.table.name))?;
        for batch in self.pending.drain(..) {
            writer.write(&batch)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// The full fill protocol: bind + commit one row, closing a cluster when
    /// the context asks for it.
    pub fn commit(&mut self, row: B::Row<'_>) -> anyhow::Result<()> {
        if self.fill(row) == FlushSignal::ClusterFull {
            self.flush_columns()?;
            self.flush_cluster()?;
        }
        Ok(())
    }

    /// Flushes whatever is still buffered as a final, possibly short cluster.
    pub fn finish(&mut self) -> anyhow::Result<()> {
        self.flush_columns()?;
        self.flush_cluster()
    }
}

/// Physical commit unit of the table: entry range metadata for one cluster.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClusterInfo {
    pub first_entry: u64,
    pub num_entries: u64,
}

/// Read handle for one physical table. Opening parses footer metadata only;
/// each scan opens its own file handle, so handles are cheap to create per
/// worker and never shared.
pub struct TableReader {
    path: PathBuf,
    schema: SchemaRef,
    metadata: Arc<ParquetMetaData>,
}

impl TableReader {
    pub fn open(container: &Path, name: &str) -> anyhow::Result<Self> {
        let path = container.join(format!("{name}.parquet"));
        let file = File::open(&path)
            .with_context(|| format!("opening table file {}", path.display()))?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .with_context(|| format!("reading table metadata {}", path.display()))?;
        Ok(Self {
            path,
            schema: builder.schema().clone(),
            metadata: builder.metadata().clone(),
        })
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn entry_count(&self) -> u64 {
        self.metadata.file_metadata().num_rows() as u64
    }

    /// Cluster descriptors in entry order.
    pub fn clusters(&self) -> Vec<ClusterInfo> {
        let mut first_entry = 0;
        (0..self.metadata.num_row_groups())
            .map(|i| {
                let num_entries = self.metadata.row_group(i).num_rows() as u64;
                let info = ClusterInfo {
                    first_entry,
                    num_entries,
                };
                first_entry += num_entries;
                info
            })
            .collect()
    }

    /// Full-width scan of a run of clusters.
    pub fn scan(&self, clusters: Range<usize>) -> anyhow::Result<ParquetRecordBatchReader> {
        self.scan_builder(clusters)?
            .build()
            .with_context(|| format!("scanning table {}", self.path.display()))
    }

    /// Column-view scan: like [`TableReader::scan`] but restricted to the
    /// named top-level columns.
    pub fn scan_columns(
        &self,
        clusters: Range<usize>,
        columns: &[&str],
    ) -> anyhow::Result<ParquetRecordBatchReader> {
        let builder = self.scan_builder(clusters)?;
        let roots: Vec<usize> = columns
            .iter()
            .map(|name| {
                self.schema
                    .index_of(name)
                    .with_context(|| format!("table {} has no column {name}", self.path.display()))
            })
            .collect::<anyhow::Result<_>>()?;
        let mask = ProjectionMask::roots(builder.parquet_schema(), roots);
        builder
            .with_projection(mask)
            .build()
            .with_context(|| format!("scanning table {}", self.path.display()))
    }

    fn scan_builder(
        &self,
        clusters: Range<usize>,
    ) -> anyhow::Result<ParquetRecordBatchReaderBuilder<File>> {
        let file = File::open(&self.path)
            .with_context(|| format!("reopening table file {}", self.path.display()))?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?
            .with_row_groups(clusters.collect())
            .with_batch_size(BATCH_SIZE);
        Ok(builder)
    }
}
