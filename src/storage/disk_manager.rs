//! Disk Manager - low-level file I/O for database pages.
//!
//! The [`DiskManager`] handles all direct file operations:
//! - Reading and writing pages
//! - Reserving space for newly allocated pages
//! - Managing the database file

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::common::config::PAGE_SIZE;
use crate::common::{PageId, Result};
use crate::storage::{Page, PageStore};

/// Manages disk I/O for a single database file.
///
/// # File Layout
/// The database is stored as a single file with pages laid out sequentially:
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Page 0  │ Page 1  │ Page 2  │  ...    │ Page N  │
/// │ (4KB)   │ (4KB)   │ (4KB)   │         │ (4KB)   │
/// └─────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:  0      4096     8192    ...    N×4096
/// ```
///
/// Page N is located at file offset `N × PAGE_SIZE`. Shards allocate ids out
/// of order, so the file may contain holes; those read back as zeroes.
///
/// # Thread Safety
/// The file handle sits behind a mutex, so one `DiskManager` can be shared
/// by every shard of a parallel pool.
///
/// # Durability
/// All writes are followed by `fsync()`.
pub struct DiskManager {
    inner: Mutex<DiskFile>,
}

struct DiskFile {
    file: File,
    /// Number of page slots covered by the file.
    page_count: u32,
}

impl DiskManager {
    /// Create a new database file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        Ok(Self::from_parts(file, 0))
    }

    /// Open an existing database file.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        let file_size = file.metadata()?.len();
        let page_count = DiskFile::page_count_for(file_size)?;
        debug!(page_count, "opened database file");

        Ok(Self::from_parts(file, page_count))
    }

    /// Open an existing database file, or create if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    fn from_parts(file: File, page_count: u32) -> Self {
        Self {
            inner: Mutex::new(DiskFile { file, page_count }),
        }
    }

    /// Number of page slots covered by the file (highest allocated id + 1).
    #[inline]
    pub fn page_count(&self) -> u32 {
        self.inner.lock().page_count
    }

    /// Get the total size of the database file in bytes.
    #[inline]
    pub fn file_size(&self) -> u64 {
        (self.page_count() as u64) * (PAGE_SIZE as u64)
    }
}

impl DiskFile {
    fn offset(page_id: PageId) -> u64 {
        (page_id.0 as u64) * (PAGE_SIZE as u64)
    }

    /// Page slots covered by a file of `file_size` bytes.
    ///
    /// A file with more slots than page ids is not one of ours.
    fn page_count_for(file_size: u64) -> Result<u32> {
        let slots = file_size / PAGE_SIZE as u64;
        u32::try_from(slots).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("database file holds {} pages, more than the page id space", slots),
            )
            .into()
        })
    }

    /// Grow the file so it covers `page_id`.
    fn ensure_covers(&mut self, page_id: PageId) -> Result<()> {
        if page_id.0 < self.page_count {
            return Ok(());
        }
        let new_count = page_id.0 + 1;
        self.file.set_len(Self::offset(PageId::new(new_count)))?;
        self.file.sync_all()?;
        self.page_count = new_count;
        Ok(())
    }

    fn write_at(&mut self, page_id: PageId, bytes: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(Self::offset(page_id)))?;
        self.file.write_all(bytes)?;
        self.file.sync_all()?; // fsync for durability
        Ok(())
    }
}

impl PageStore for DiskManager {
    fn read_page(&self, page_id: PageId, page: &mut Page) -> Result<()> {
        let mut disk = self.inner.lock();

        if page_id.0 >= disk.page_count {
            trace!(%page_id, "read past end of file, returning zeroes");
            page.reset();
            return Ok(());
        }

        disk.file.seek(SeekFrom::Start(DiskFile::offset(page_id)))?;
        disk.file.read_exact(page.as_mut_slice())?;
        Ok(())
    }

    fn write_page(&self, page_id: PageId, page: &Page) -> Result<()> {
        let mut disk = self.inner.lock();
        disk.ensure_covers(page_id)?;
        disk.write_at(page_id, page.as_slice())
    }

    fn allocate_page(&self, page_id: PageId) -> Result<()> {
        self.inner.lock().ensure_covers(page_id)
    }

    fn deallocate_page(&self, page_id: PageId) -> Result<()> {
        let mut disk = self.inner.lock();
        if page_id.0 >= disk.page_count {
            return Ok(());
        }
        // Zero the slot so a later reuse of the id cannot see stale bytes.
        let zeros = [0u8; PAGE_SIZE];
        disk.write_at(page_id, &zeros)
    }
}
