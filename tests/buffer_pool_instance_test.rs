//! Buffer Pool Instance Tests
//!
//! Scenario tests for a single disk-backed instance: pinning, eviction
//! order, write-back and latching under concurrency.

use std::sync::Arc;

use shardpool::{BufferPoolInstance, DiskManager, Error, PageId};
use tempfile::tempdir;

const FRAMES: usize = 10;

fn create_bpm(pool_size: usize) -> (BufferPoolInstance, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.db");
    let dm = DiskManager::create(&path).unwrap();
    (BufferPoolInstance::new(pool_size, Arc::new(dm)), dir)
}

/// Helper to write a string to page data.
fn copy_string(data: &mut [u8], s: &str) {
    let bytes = s.as_bytes();
    data[..bytes.len()].copy_from_slice(bytes);
    data[bytes.len()] = 0; // null terminator
}

/// Helper to read a null-terminated string from page data.
fn read_string(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).to_string()
}

// ============================================================================
// Basic
// ============================================================================

#[test]
fn test_very_basic() {
    let (bpm, _dir) = create_bpm(FRAMES);
    let str_data = "Hello, world!";

    let handle = bpm.new_page().unwrap();
    let pid = handle.page_id();
    assert_eq!(pid, PageId::new(0));

    {
        let mut page = handle.write();
        copy_string(page.as_mut_slice(), str_data);
        assert_eq!(read_string(page.as_slice()), str_data);
    }
    bpm.unpin_page(pid, true).unwrap();

    // Read it back twice through guards.
    for _ in 0..2 {
        let guard = bpm.fetch_page_read(pid).unwrap();
        assert_eq!(read_string(guard.as_slice()), str_data);
    }

    assert!(bpm.delete_page(pid).is_ok());
    assert!(!bpm.is_resident(pid));
    bpm.check_invariants();
}

#[test]
fn test_page_pin_easy() {
    let (bpm, _dir) = create_bpm(2);

    let str0 = "page0";
    let str1 = "page1";
    let str0_updated = "page0updated";
    let str1_updated = "page1updated";

    let page0 = bpm.new_page().unwrap();
    let page1 = bpm.new_page().unwrap();
    let pageid0 = page0.page_id();
    let pageid1 = page1.page_id();

    copy_string(page0.write().as_mut_slice(), str0);
    copy_string(page1.write().as_mut_slice(), str1);

    assert_eq!(bpm.pin_count(pageid0), Some(1));
    assert_eq!(bpm.pin_count(pageid1), Some(1));

    // All frames pinned: neither a new page nor a miss can be served.
    assert!(matches!(bpm.new_page(), Err(Error::NoFreeFrames)));
    assert!(matches!(bpm.fetch_page(PageId::new(7)), Err(Error::NoFreeFrames)));

    bpm.unpin_page(pageid0, true).unwrap();
    assert_eq!(bpm.pin_count(pageid0), Some(0));
    bpm.unpin_page(pageid1, true).unwrap();
    assert_eq!(bpm.pin_count(pageid1), Some(0));

    // Two new pages evict both originals.
    let temp1 = bpm.new_page().unwrap().page_id();
    let temp2 = bpm.new_page().unwrap().page_id();
    assert!(bpm.pin_count(pageid0).is_none());
    assert!(bpm.pin_count(pageid1).is_none());
    bpm.unpin_page(temp1, false).unwrap();
    bpm.unpin_page(temp2, false).unwrap();

    // Fetch the originals back from disk and update them.
    {
        let mut page0_write = bpm.fetch_page_write(pageid0).unwrap();
        assert_eq!(read_string(page0_write.as_slice()), str0);
        copy_string(page0_write.as_mut_slice(), str0_updated);

        let mut page1_write = bpm.fetch_page_write(pageid1).unwrap();
        assert_eq!(read_string(page1_write.as_slice()), str1);
        copy_string(page1_write.as_mut_slice(), str1_updated);

        assert_eq!(bpm.pin_count(pageid0), Some(1));
        assert_eq!(bpm.pin_count(pageid1), Some(1));
    }

    assert_eq!(bpm.pin_count(pageid0), Some(0));
    assert_eq!(bpm.pin_count(pageid1), Some(0));

    {
        let page0_read = bpm.fetch_page_read(pageid0).unwrap();
        assert_eq!(read_string(page0_read.as_slice()), str0_updated);
        let page1_read = bpm.fetch_page_read(pageid1).unwrap();
        assert_eq!(read_string(page1_read.as_slice()), str1_updated);
    }

    bpm.check_invariants();
}

#[test]
fn test_page_pin_medium() {
    let (bpm, _dir) = create_bpm(FRAMES);

    // Scenario: The buffer pool is empty. We should be able to create a new page.
    let hello = "Hello";
    let pid0 = {
        let mut page0 = bpm.new_page_guard().unwrap();
        copy_string(page0.as_mut_slice(), hello);
        assert_eq!(read_string(page0.as_slice()), hello);
        page0.page_id()
    };

    // Scenario: We should be able to create new pages until we fill up the
    // buffer pool. The last one evicts page 0.
    let mut pages = Vec::new();
    for _ in 0..FRAMES {
        pages.push(bpm.new_page_guard().unwrap());
    }
    assert!(!bpm.is_resident(pid0));

    for page in &pages {
        assert_eq!(bpm.pin_count(page.page_id()), Some(1));
    }

    // Scenario: Once the buffer pool is full, we should not be able to
    // create any new pages.
    for _ in 0..FRAMES {
        assert!(matches!(bpm.new_page_guard(), Err(Error::NoFreeFrames)));
    }

    // Scenario: Drop the first 5 pages to unpin them.
    for _ in 0..(FRAMES / 2) {
        let pid = pages[0].page_id();
        assert_eq!(bpm.pin_count(pid), Some(1));
        pages.remove(0);
        assert_eq!(bpm.pin_count(pid), Some(0));
    }

    for page in &pages {
        assert_eq!(bpm.pin_count(page.page_id()), Some(1));
    }

    // Scenario: After unpinning pages, we should be able to create new pages.
    for _ in 0..((FRAMES / 2) - 1) {
        pages.push(bpm.new_page_guard().unwrap());
    }

    // Scenario: There should be one frame available, and we should be able to
    // fetch the data we wrote a while ago.
    {
        let original_page = bpm.fetch_page_read(pid0).unwrap();
        assert_eq!(read_string(original_page.as_slice()), hello);
    }

    // Scenario: A new page takes the last evictable frame (page 0), so
    // fetching page 0 again fails.
    let _last_page = bpm.new_page_guard().unwrap();
    assert!(matches!(bpm.fetch_page_read(pid0), Err(Error::NoFreeFrames)));
}

// ============================================================================
// Eviction order
// ============================================================================

/// The victim is the page unpinned longest ago, not the one fetched first.
#[test]
fn test_evicts_least_recently_unpinned() {
    let (bpm, _dir) = create_bpm(2);

    let a = bpm.new_page().unwrap().page_id();
    let b = bpm.new_page().unwrap().page_id();

    // Unpin B first, then A.
    bpm.unpin_page(b, false).unwrap();
    bpm.unpin_page(a, false).unwrap();

    let c = bpm.new_page().unwrap().page_id();
    assert!(!bpm.is_resident(b));
    assert!(bpm.is_resident(a));

    // Re-pinning A and unpinning it again makes it the newest candidate.
    bpm.fetch_page(a).unwrap();
    bpm.unpin_page(c, false).unwrap();
    bpm.unpin_page(a, false).unwrap();

    bpm.new_page().unwrap();
    assert!(!bpm.is_resident(c));
    assert!(bpm.is_resident(a));
    bpm.check_invariants();
}

/// Same order on the fetch path: the miss for C evicts A, the page unpinned
/// first, even though A and B were fetched in that order.
#[test]
fn test_fetch_miss_evicts_least_recently_unpinned() {
    let (bpm, _dir) = create_bpm(2);

    let c = bpm.new_page_guard().unwrap().page_id();
    let a = bpm.new_page().unwrap().page_id();
    let b = bpm.new_page().unwrap().page_id();
    assert!(!bpm.is_resident(c));

    bpm.unpin_page(a, false).unwrap();
    bpm.unpin_page(b, false).unwrap();

    let misses = bpm.stats_snapshot().cache_misses;
    let handle = bpm.fetch_page(c).unwrap();
    assert_eq!(handle.page_id(), c);
    assert_eq!(bpm.stats_snapshot().cache_misses, misses + 1);

    assert!(!bpm.is_resident(a));
    assert!(bpm.is_resident(b));
    assert_eq!(bpm.pin_count(c), Some(1));
    bpm.check_invariants();
}

#[test]
fn test_flush_evict_refetch() {
    let (bpm, _dir) = create_bpm(1);

    let handle = bpm.new_page().unwrap();
    let pid = handle.page_id();
    copy_string(handle.write().as_mut_slice(), "flushed");
    bpm.unpin_page(pid, true).unwrap();

    bpm.flush_page(pid).unwrap();
    assert_eq!(bpm.is_dirty(pid), Some(false));

    // A clean victim is dropped without another write.
    let written = bpm.stats_snapshot().pages_written;
    let other = bpm.new_page().unwrap().page_id();
    assert_eq!(bpm.stats_snapshot().pages_written, written);
    bpm.unpin_page(other, false).unwrap();

    let guard = bpm.fetch_page_read(pid).unwrap();
    assert_eq!(read_string(guard.as_slice()), "flushed");
}

// ============================================================================
// Guards
// ============================================================================

#[test]
fn test_drop() {
    let (bpm, _dir) = create_bpm(FRAMES);

    let pid0 = {
        let page0 = bpm.new_page_guard().unwrap();
        let pid = page0.page_id();
        // The page should be pinned.
        assert_eq!(bpm.pin_count(pid), Some(1));
        pid
    };
    // Dropping the guard unpins the page.
    assert_eq!(bpm.pin_count(pid0), Some(0));

    let pid1 = bpm.new_page_guard().unwrap().page_id();
    let pid2 = bpm.new_page_guard().unwrap().page_id();

    {
        let read_guarded_page = bpm.fetch_page_read(pid1).unwrap();
        let write_guarded_page = bpm.fetch_page_write(pid2).unwrap();

        assert_eq!(bpm.pin_count(pid1), Some(1));
        assert_eq!(bpm.pin_count(pid2), Some(1));

        drop(read_guarded_page);
        drop(write_guarded_page);
        assert_eq!(bpm.pin_count(pid1), Some(0));
        assert_eq!(bpm.pin_count(pid2), Some(0));
    }

    // This will hang if the latches were not released when the guards dropped.
    {
        let _write_test1 = bpm.fetch_page_write(pid1).unwrap();
        let _write_test2 = bpm.fetch_page_write(pid2).unwrap();
    }

    let mut page_ids = Vec::new();
    {
        // Fill up the pool.
        let mut guards = Vec::new();
        for _ in 0..FRAMES {
            let guard = bpm.new_page_guard().unwrap();
            assert_eq!(bpm.pin_count(guard.page_id()), Some(1));
            page_ids.push(guard.page_id());
            guards.push(guard);
        }
    } // This drops all of the guards.

    for pid in &page_ids {
        assert_eq!(bpm.pin_count(*pid), Some(0));
    }

    // Get a new write page and edit it. We will retrieve it later.
    let mutable_page_id = {
        let mut guard = bpm.new_page_guard().unwrap();
        copy_string(guard.as_mut_slice(), "data");
        guard.page_id()
    };

    {
        // Fill up the pool again, evicting the edited page.
        let mut guards = Vec::new();
        for _ in 0..FRAMES {
            guards.push(bpm.new_page_guard().unwrap());
        }
    }
    assert!(!bpm.is_resident(mutable_page_id));

    {
        let guard = bpm.fetch_page_read(mutable_page_id).unwrap();
        assert_eq!(read_string(guard.as_slice()), "data");
    }
    bpm.check_invariants();
}

// ============================================================================
// Concurrency
// ============================================================================

/// A pinned page is never evicted, however many threads are fetching.
#[test]
fn test_evictable() {
    use std::sync::{Condvar, Mutex};
    use std::thread;

    const ROUNDS: usize = 50;
    const NUM_READERS: usize = 4;

    let (bpm, _dir) = create_bpm(1); // Only 1 frame
    let bpm = Arc::new(bpm);

    for round in 0..ROUNDS {
        // The "winner" occupies the only frame, then the "loser" evicts it.
        let winner_pid = bpm.new_page_guard().unwrap().page_id();
        let loser_pid = bpm.new_page_guard().unwrap().page_id();

        let signal = Arc::new((Mutex::new(false), Condvar::new()));
        let mut readers = Vec::new();

        for _ in 0..NUM_READERS {
            let bpm_clone = Arc::clone(&bpm);
            let signal_clone = Arc::clone(&signal);

            readers.push(thread::spawn(move || {
                let (lock, cvar) = &*signal_clone;
                {
                    let mut started = lock.lock().unwrap();
                    while !*started {
                        started = cvar.wait(started).unwrap();
                    }
                }

                // Main holds the winner pinned: a hit for us, and the loser
                // cannot be brought in.
                let _read_guard = bpm_clone.fetch_page_read(winner_pid).unwrap();
                assert!(
                    matches!(bpm_clone.fetch_page_read(loser_pid), Err(Error::NoFreeFrames)),
                    "round {}: loser should not be fetchable while winner is pinned",
                    round
                );
            }));
        }

        // Main thread: fetch winner (evicts loser) and hold it.
        let winner_guard = bpm.fetch_page_read(winner_pid).unwrap();

        {
            let (lock, cvar) = &*signal;
            let mut started = lock.lock().unwrap();
            *started = true;
            cvar.notify_all();
        }

        for reader in readers {
            reader.join().unwrap();
        }

        drop(winner_guard);
    }

    bpm.check_invariants();
}

/// Holding one page's write latch while fetching another must not deadlock
/// against a thread waiting on the first latch.
#[test]
fn test_page_access() {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    let (bpm, _dir) = create_bpm(FRAMES);
    let bpm = Arc::new(bpm);

    let pid0 = bpm.new_page_guard().unwrap().page_id();
    let pid1 = bpm.new_page_guard().unwrap().page_id();

    let guard0 = bpm.fetch_page_write(pid0).unwrap();

    let start = Arc::new(AtomicBool::new(false));
    let start_clone = Arc::clone(&start);
    let bpm_clone = Arc::clone(&bpm);

    let child = thread::spawn(move || {
        start_clone.store(true, Ordering::SeqCst);

        // Blocks on the latch until main releases page 0.
        let _guard0 = bpm_clone.fetch_page_write(pid0).unwrap();
    });

    while !start.load(Ordering::SeqCst) {
        thread::yield_now();
    }

    // Make the other thread wait for a bit.
    thread::sleep(Duration::from_millis(100));

    // While holding page 0, take the latch on page 1.
    let _guard1 = bpm.fetch_page_write(pid1).unwrap();

    drop(guard0);
    child.join().unwrap();
}

/// A writer holding page 1 fetches page 2 while another thread flushes
/// page 1. Both must finish.
#[test]
fn test_flush_page_during_latch_crabbing() {
    use std::sync::mpsc;
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    let (bpm, _dir) = create_bpm(FRAMES);
    let bpm = Arc::new(bpm);

    let pid1 = bpm.new_page_guard().unwrap().page_id();
    let pid2 = bpm.new_page_guard().unwrap().page_id();

    let barrier = Arc::new(Barrier::new(2));
    let (tx, rx) = mpsc::channel();

    let writer = {
        let bpm = Arc::clone(&bpm);
        let barrier = Arc::clone(&barrier);
        let tx = tx.clone();
        thread::spawn(move || {
            let mut guard1 = bpm.fetch_page_write(pid1).unwrap();
            copy_string(guard1.as_mut_slice(), "crab");
            barrier.wait();
            thread::sleep(Duration::from_millis(100));
            let guard2 = bpm.fetch_page_read(pid2).unwrap();
            drop(guard2);
            drop(guard1);
            tx.send("writer").unwrap();
        })
    };

    let flusher = {
        let bpm = Arc::clone(&bpm);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            let result = bpm.flush_page(pid1);
            tx.send("flusher").unwrap();
            result
        })
    };

    for _ in 0..2 {
        rx.recv_timeout(Duration::from_secs(5))
            .expect("writer and flush_page must not block each other");
    }
    writer.join().unwrap();

    // The flush either ran before the writer took the latch or was refused.
    match flusher.join().unwrap() {
        Ok(()) => {}
        Err(e) => {
            assert!(matches!(e, Error::PageLatched(_)));
            assert!(e.is_retryable());
        }
    }

    bpm.flush_page(pid1).unwrap();
    assert_eq!(bpm.is_dirty(pid1), Some(false));
    bpm.check_invariants();
}

// ============================================================================
// Error paths
// ============================================================================

#[test]
fn test_unpin_beyond_pins() {
    let (bpm, _dir) = create_bpm(2);
    let pid = bpm.new_page().unwrap().page_id();

    bpm.unpin_page(pid, false).unwrap();
    for _ in 0..3 {
        assert!(matches!(bpm.unpin_page(pid, true), Err(Error::PageNotPinned(_))));
    }
    assert_eq!(bpm.pin_count(pid), Some(0));
    assert_eq!(bpm.is_dirty(pid), Some(false));
    assert_eq!(bpm.replacer_size(), 1);
}

#[test]
fn test_repeated_delete_of_absent_page() {
    let (bpm, _dir) = create_bpm(2);
    let pid = bpm.new_page().unwrap().page_id();
    bpm.unpin_page(pid, false).unwrap();

    bpm.delete_page(pid).unwrap();
    for _ in 0..3 {
        bpm.delete_page(pid).unwrap();
    }
    assert_eq!(bpm.free_frame_count(), 2);
    assert_eq!(bpm.stats_snapshot().pages_deallocated, 1);

    // Deleted ids are not handed out again.
    assert_eq!(bpm.new_page().unwrap().page_id(), PageId::new(1));
}

#[test]
fn test_delete_pinned_page_fails() {
    let (bpm, _dir) = create_bpm(2);
    let guard = bpm.new_page_guard().unwrap();
    let pid = guard.page_id();

    let err = bpm.delete_page(pid).unwrap_err();
    assert!(matches!(err, Error::PagePinned(_)));
    assert!(err.is_retryable());

    drop(guard);
    bpm.delete_page(pid).unwrap();
    assert!(!bpm.is_resident(pid));
}
