use std::sync::atomic::{AtomicU64, Ordering};

#[non_exhaustive]
pub struct Metrics {
    pub sstables_written: u64,
    pub bytes_written: u64,
}

pub(crate) struct MetricsStorage {
    pub(crate) sstables_written: AtomicU64,
    pub(crate) bytes_written: AtomicU64,
}

impl MetricsStorage {
    pub(crate) const fn new_const() -> Self {
        MetricsStorage {
            sstables_written: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_sstable(&self, bytes: u64) {
        self.sstables_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    fn make_pub(&self) -> Metrics {
        Metrics {
            sstables_written: self.sstables_written.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
        }
    }
}

pub(crate) static GLOBAL_STORAGE: MetricsStorage = MetricsStorage::new_const();

pub fn global() -> Metrics {
    GLOBAL_STORAGE.make_pub()
}
