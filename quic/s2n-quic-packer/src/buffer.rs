// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Reusable packet buffers
//!
//! Buffers are leased inside the write-and-seal routine and travel with the
//! packed packet; dropping the [`Entry`] downstream of the UDP write returns
//! the slab to the pool.

use core::ops;
use crossbeam_channel as mpmc;
use std::mem::ManuallyDrop;
use tracing::trace;

/// The largest UDP payload the send path will ever produce, and therefore
/// the capacity of every pooled buffer
pub const MAX_PACKET_BUFFER_LEN: usize = 1452;

const DEFAULT_MAX_ENTRIES: usize = 1024;

/// A fixed-capacity byte slab
type Slab = Box<[u8; MAX_PACKET_BUFFER_LEN]>;

/// A shared pool of packet buffers.
///
/// The pool is cheap to clone and safe to share between connections; the
/// packer itself only ever touches it from its single-threaded send loop.
pub struct Pool {
    release: mpmc::Sender<Slab>,
    acquire: mpmc::Receiver<Slab>,
}

impl Clone for Pool {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            release: self.release.clone(),
            acquire: self.acquire.clone(),
        }
    }
}

impl Default for Pool {
    #[inline]
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("idle", &self.acquire.len())
            .finish()
    }
}

impl Pool {
    /// Creates a pool that retains at most `max_entries` idle buffers
    #[inline]
    pub fn new(max_entries: usize) -> Self {
        let (release, acquire) = mpmc::bounded(max_entries);
        Self { release, acquire }
    }

    /// Leases a buffer, allocating a fresh slab when the pool is empty
    #[inline]
    pub fn get(&self) -> Entry {
        let slab = if let Ok(slab) = self.acquire.try_recv() {
            trace!("hit");
            slab
        } else {
            trace!("miss");
            Box::new([0; MAX_PACKET_BUFFER_LEN])
        };
        Entry {
            slab: ManuallyDrop::new(slab),
            release: self.release.clone(),
        }
    }
}

/// A leased packet buffer; returns to its pool on drop
pub struct Entry {
    slab: ManuallyDrop<Slab>,
    release: mpmc::Sender<Slab>,
}

impl std::fmt::Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry").finish()
    }
}

impl ops::Deref for Entry {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        &self.slab[..]
    }
}

impl ops::DerefMut for Entry {
    #[inline]
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.slab[..]
    }
}

impl Drop for Entry {
    #[inline]
    fn drop(&mut self) {
        let slab = unsafe {
            // Safety: the slab is never touched again after this point
            ManuallyDrop::take(&mut self.slab)
        };
        // a full or disconnected pool just lets the slab deallocate
        let _ = self.release.try_send(slab);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuse_test() {
        let pool = Pool::new(2);

        let mut first = pool.get();
        first[0] = 0xaa;
        drop(first);
        assert_eq!(pool.acquire.len(), 1);

        // the recycled slab comes back, contents and all
        let entry = pool.get();
        assert_eq!(entry[0], 0xaa);
        assert_eq!(pool.acquire.len(), 0);
    }

    #[test]
    fn capacity_test() {
        let pool = Pool::new(1);
        assert_eq!(pool.get().len(), MAX_PACKET_BUFFER_LEN);

        // excess entries deallocate instead of growing the pool
        let first = pool.get();
        let second = pool.get();
        drop(first);
        drop(second);
        assert_eq!(pool.acquire.len(), 1);
    }
}
