//! Arenas usable from many threads at once.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use memseg_scope::{config, ResourceScope};
use parking_lot::{Mutex, RwLock};

use super::bump::Bump;
use super::SegmentAllocator;
use crate::error::Result;
use crate::segment::MemorySegment;

/// A bump arena behind a mutex. Simple, and fine at low contention.
pub struct SyncArena {
    bump: Mutex<Bump>,
}

impl SyncArena {
    pub fn new(scope: &ResourceScope) -> Self {
        Self::with_block_size(scope, config().arena_block_size)
    }

    pub fn with_block_size(scope: &ResourceScope, block_size: usize) -> Self {
        Self {
            bump: Mutex::new(Bump::unbounded(scope, block_size)),
        }
    }

    pub fn bounded(capacity: usize, scope: &ResourceScope) -> Result<Self> {
        Ok(Self {
            bump: Mutex::new(Bump::bounded(scope, capacity)?),
        })
    }
}

impl SegmentAllocator for SyncArena {
    fn allocate(&self, size: usize, align: usize) -> Result<MemorySegment> {
        self.bump.lock().allocate(size, align)
    }
}

type Shards = RwLock<HashMap<ThreadId, Arc<Mutex<Bump>>>>;

/// Removes a thread's shard from its arena when the thread exits.
struct Eviction {
    shards: Weak<Shards>,
    thread: ThreadId,
}

impl Drop for Eviction {
    fn drop(&mut self) {
        if let Some(shards) = self.shards.upgrade() {
            shards.write().remove(&self.thread);
        }
    }
}

thread_local! {
    static EVICTIONS: RefCell<Vec<Eviction>> = const { RefCell::new(Vec::new()) };
}

/// One bump arena per calling thread, all over the same scope.
///
/// Threads only contend on first use, when their shard is created. A shard is
/// forgotten when its thread exits; segments it handed out stay valid until
/// the scope closes.
pub struct ShardedArena {
    scope: ResourceScope,
    block_size: usize,
    shards: Arc<Shards>,
}

impl ShardedArena {
    pub fn new(scope: &ResourceScope) -> Self {
        Self::with_block_size(scope, config().arena_block_size)
    }

    pub fn with_block_size(scope: &ResourceScope, block_size: usize) -> Self {
        Self {
            scope: scope.clone(),
            block_size,
            shards: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn scope(&self) -> &ResourceScope {
        &self.scope
    }

    /// Number of live threads holding a shard.
    pub fn shard_count(&self) -> usize {
        self.shards.read().len()
    }

    fn shard(&self) -> Arc<Mutex<Bump>> {
        let id = thread::current().id();
        if let Some(shard) = self.shards.read().get(&id) {
            return Arc::clone(shard);
        }
        let shard = Arc::new(Mutex::new(Bump::unbounded(&self.scope, self.block_size)));
        self.shards.write().insert(id, Arc::clone(&shard));
        // During thread teardown the registry is gone; the shard then lives
        // as long as the arena.
        let _ = EVICTIONS.try_with(|evictions| {
            let mut evictions = evictions.borrow_mut();
            evictions.retain(|e| e.shards.strong_count() > 0);
            evictions.push(Eviction {
                shards: Arc::downgrade(&self.shards),
                thread: id,
            });
        });
        shard
    }
}

impl SegmentAllocator for ShardedArena {
    fn allocate(&self, size: usize, align: usize) -> Result<MemorySegment> {
        self.scope.check_valid_state()?;
        let shard = self.shard();
        let mut bump = shard.lock();
        bump.allocate(size, align)
    }
}
