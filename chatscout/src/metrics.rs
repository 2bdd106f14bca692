use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

use crate::search::processor::{LARGE_FILE_THRESHOLD, SMALL_FILE_THRESHOLD};

/// Tracks scan and pattern cache counters
///
/// Clones share the same counters, so a clone handed to a worker reports into
/// the engine's totals.
#[derive(Debug, Clone)]
pub struct ScanMetrics {
    chats_scanned: Arc<AtomicU64>,
    chats_skipped: Arc<AtomicU64>,
    bytes_read: Arc<AtomicU64>,

    // Cache metrics
    cache_hits: Arc<AtomicU64>,
    cache_misses: Arc<AtomicU64>,

    // Transcript read strategies
    small_reads: Arc<AtomicU64>,
    buffered_reads: Arc<AtomicU64>,
    mmap_reads: Arc<AtomicU64>,
}

impl ScanMetrics {
    pub fn new() -> Self {
        Self {
            chats_scanned: Arc::new(AtomicU64::new(0)),
            chats_skipped: Arc::new(AtomicU64::new(0)),
            bytes_read: Arc::new(AtomicU64::new(0)),
            cache_hits: Arc::new(AtomicU64::new(0)),
            cache_misses: Arc::new(AtomicU64::new(0)),
            small_reads: Arc::new(AtomicU64::new(0)),
            buffered_reads: Arc::new(AtomicU64::new(0)),
            mmap_reads: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn record_chat_scanned(&self, bytes: u64) {
        self.chats_scanned.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_chat_skipped(&self) {
        self.chats_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_operation(&self, hit: bool) {
        if hit {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.cache_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records which read strategy a transcript file of `size` bytes uses
    pub fn record_file_read(&self, size: u64) {
        if size < SMALL_FILE_THRESHOLD {
            self.small_reads.fetch_add(1, Ordering::Relaxed);
        } else if size >= LARGE_FILE_THRESHOLD {
            self.mmap_reads.fetch_add(1, Ordering::Relaxed);
        } else {
            self.buffered_reads.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> u64 {
        self.cache_misses.load(Ordering::Relaxed)
    }

    pub fn get_stats(&self) -> ScanStats {
        ScanStats {
            chats_scanned: self.chats_scanned.load(Ordering::Relaxed),
            chats_skipped: self.chats_skipped.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            cache_hits: self.cache_hits(),
            cache_misses: self.cache_misses(),
            small_reads: self.small_reads.load(Ordering::Relaxed),
            buffered_reads: self.buffered_reads.load(Ordering::Relaxed),
            mmap_reads: self.mmap_reads.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Scan stats:\n\
             Chats scanned/skipped: {}/{}\n\
             Bytes read: {}\n\
             Pattern cache hits/misses: {}/{}\n\
             Transcript reads (small/buffered/mmap): {}/{}/{}",
            stats.chats_scanned,
            stats.chats_skipped,
            stats.bytes_read,
            stats.cache_hits,
            stats.cache_misses,
            stats.small_reads,
            stats.buffered_reads,
            stats.mmap_reads
        );
    }
}

impl Default for ScanMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of the counters in [`ScanMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanStats {
    pub chats_scanned: u64,
    pub chats_skipped: u64,
    pub bytes_read: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub small_reads: u64,
    pub buffered_reads: u64,
    pub mmap_reads: u64,
}
