use std::path::PathBuf;

use tokio::{
    fs::File,
    io::{AsyncWriteExt, BufWriter},
};
use tracing::debug;

use super::{Component, Sstable, SstableInfo};
use crate::{
    memtable::Memtable,
    metrics::{MetricsStorage, GLOBAL_STORAGE},
};

/// Deletion info of a live partition.
const LIVE_LOCAL_DELETION_TIME: i32 = i32::MAX;
const LIVE_MARKED_FOR_DELETE_AT: i64 = i64::MIN;
const END_OF_PARTITION: u16 = 0;

#[derive(Debug, thiserror::Error)]
#[error("writing {component} to {path:?}")]
pub struct WriteError {
    pub component: Component,
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

struct ComponentWriter {
    component: Component,
    path: PathBuf,
    out: BufWriter<File>,
    offset: u64,
}

impl ComponentWriter {
    async fn create(sst: &Sstable, component: Component) -> Result<Self, WriteError> {
        let path = sst.filename(component);
        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .await
            .map_err(|source| WriteError {
                component,
                path: path.clone(),
                source,
            })?;
        Ok(ComponentWriter {
            component,
            path,
            out: BufWriter::with_capacity(sst.opts.buffer_size, file),
            offset: 0,
        })
    }

    fn err(&self, source: std::io::Error) -> WriteError {
        WriteError {
            component: self.component,
            path: self.path.clone(),
            source,
        }
    }

    async fn write_all(&mut self, buf: &[u8]) -> Result<(), WriteError> {
        match self.out.write_all(buf).await {
            Ok(()) => {
                self.offset += buf.len() as u64;
                Ok(())
            }
            Err(e) => Err(self.err(e)),
        }
    }

    async fn write_key(&mut self, key: &[u8]) -> Result<(), WriteError> {
        // keys are bounded by MAX_PARTITION_KEY_SIZE when the mutation is built
        let len = u16::try_from(key.len()).map_err(|_| {
            self.err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "partition key too large",
            ))
        })?;
        self.write_all(&len.to_be_bytes()).await?;
        self.write_all(key).await
    }

    /// Flush buffered bytes and fsync. Returns the component size.
    async fn finish(mut self) -> Result<(PathBuf, u64), WriteError> {
        if let Err(e) = self.out.flush().await {
            return Err(self.err(e));
        }
        if let Err(e) = self.out.get_ref().sync_all().await {
            return Err(self.err(e));
        }
        Ok((self.path, self.offset))
    }
}

impl Sstable {
    /// Write the data, index and TOC components for a snapshot of `memtable`.
    ///
    /// Existing files with the same names are truncated. The memtable is not modified.
    pub async fn write_components(self, memtable: &Memtable) -> Result<SstableInfo, WriteError> {
        self.write_components_with_metrics(memtable, &GLOBAL_STORAGE)
            .await
    }

    #[tracing::instrument(skip_all, level = "debug", fields(dir = %self.opts.dir.display(), generation = self.opts.generation))]
    pub(crate) async fn write_components_with_metrics(
        self,
        memtable: &Memtable,
        metrics: &MetricsStorage,
    ) -> Result<SstableInfo, WriteError> {
        scopeguard::defer_on_unwind! {tracing::error!("sstable write panic")};

        let mut data = ComponentWriter::create(&self, Component::Data).await?;
        let mut index = ComponentWriter::create(&self, Component::Index).await?;

        let mut partitions = 0;
        for (key, _partition) in memtable.partitions() {
            let position = data.offset;

            data.write_key(key.as_bytes()).await?;
            data.write_all(&LIVE_LOCAL_DELETION_TIME.to_be_bytes())
                .await?;
            data.write_all(&LIVE_MARKED_FOR_DELETE_AT.to_be_bytes())
                .await?;
            data.write_all(&END_OF_PARTITION.to_be_bytes()).await?;

            index.write_key(key.as_bytes()).await?;
            index.write_all(&position.to_be_bytes()).await?;
            // no promoted index
            index.write_all(&0u32.to_be_bytes()).await?;

            partitions += 1;
        }

        let ((data_path, data_size), (index_path, index_size)) =
            futures::try_join!(data.finish(), index.finish())?;

        // The TOC goes last: its presence marks the sstable as complete.
        let mut toc = ComponentWriter::create(&self, Component::Toc).await?;
        for component in [Component::Data, Component::Index, Component::Toc] {
            toc.write_all(component.file_name().as_bytes()).await?;
            toc.write_all(b"\n").await?;
        }
        let (toc_path, _) = toc.finish().await?;

        let info = SstableInfo {
            generation: self.opts.generation,
            partitions,
            data_size,
            index_size,
            components: vec![data_path, index_path, toc_path],
        };
        metrics.record_sstable(info.bytes_written());
        debug!(
            partitions,
            data_size, index_size, "sstable written"
        );
        Ok(info)
    }
}
