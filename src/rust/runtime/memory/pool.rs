// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Recycling allocator for packet headers and canonical data buffers.
//!
//! Every worker thread keeps a private free list of each kind. When a private list runs dry, the worker pulls a whole
//! batch from a small global overflow pool; when it overflows, the worker hands its full list over as one batch. The
//! global pool keeps a bounded number of batches and frees the oldest one when it is full. The pool never changes what
//! a packet operation does, only where its memory comes from.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::{
    fail::Fail,
    limits,
    memory::{
        buffer::DataBuffer,
        packet::PacketHeader,
    },
};
use ::spin::{
    Mutex,
    MutexGuard,
};
use ::std::{
    alloc::{
        alloc,
        Layout,
    },
    cell::RefCell,
    collections::VecDeque,
    mem::{
        self,
        MaybeUninit,
    },
    sync::{
        atomic::{
            AtomicBool,
            Ordering,
        },
        Arc,
        OnceLock,
    },
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Uninitialized storage for one packet header.
pub(crate) type HeaderSlot = Box<MaybeUninit<PacketHeader>>;

/// Tunables of the allocator pool and of the buffer sizing policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// Free entries of each kind a worker keeps before handing a batch to the global pool.
    pub local_capacity: usize,
    /// Batches the global overflow pool retains. Zero disables the global pool.
    pub global_batches: usize,
    /// Size of the canonical, recyclable data buffer.
    pub buffer_size: usize,
    /// Smallest data buffer ever allocated.
    pub min_buffer_length: usize,
    /// Extra space added by a reallocating push or put.
    pub growth_slack: usize,
}

/// Snapshot of the calling worker's pool and of the global overflow pool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Free packet headers held by this worker.
    pub local_headers: usize,
    /// Free data buffers held by this worker.
    pub local_buffers: usize,
    /// Header batches held by the global pool.
    pub global_header_batches: usize,
    /// Data buffer batches held by the global pool.
    pub global_buffer_batches: usize,
    /// Allocations this worker satisfied from its private lists.
    pub pool_hits: u64,
    /// Batches this worker pulled from the global pool.
    pub global_refills: u64,
    /// Allocations this worker had to send to the general-purpose allocator.
    pub fallback_allocations: u64,
    /// Batches this worker handed to the global pool.
    pub batches_released: u64,
}

/// Header and optional canonical data buffer handed out by [allocate].
pub(crate) struct Allocation {
    pub header: HeaderSlot,
    pub data: Option<Arc<DataBuffer>>,
}

/// Bounded stack of batches shared by all workers.
///
/// The lock is only held to move a batch in or out. Room for every batch is reserved up front, so that storing one
/// never allocates under the lock.
struct GlobalPool<T> {
    batches: Mutex<VecDeque<Vec<T>>>,
    reserved: AtomicBool,
}

/// Private free lists of one worker.
struct LocalPool {
    headers: Vec<HeaderSlot>,
    buffers: Vec<Arc<DataBuffer>>,
    counters: Counters,
}

#[derive(Default)]
struct Counters {
    pool_hits: u64,
    global_refills: u64,
    fallback_allocations: u64,
    batches_released: u64,
}

//======================================================================================================================
// Static Variables
//======================================================================================================================

static CONFIG: OnceLock<PoolConfig> = OnceLock::new();

static HEADER_BATCHES: GlobalPool<HeaderSlot> = GlobalPool::new();

static BUFFER_BATCHES: GlobalPool<Arc<DataBuffer>> = GlobalPool::new();

thread_local!(
    static LOCAL_POOL: RefCell<LocalPool> = RefCell::new(LocalPool::new())
);

//======================================================================================================================
// Standalone Functions
//======================================================================================================================

/// Installs the pool configuration. Must run before the first packet is allocated, and only once.
pub fn initialize(config: PoolConfig) -> Result<(), Fail> {
    config.validate()?;
    CONFIG.set(config).map_err(|_| {
        let cause: &str = "packet pool is already configured";
        warn!("initialize(): {}", cause);
        Fail::new(libc::EBUSY, cause)
    })?;
    debug!("initialize(): packet pool configured ({:?})", config);
    Ok(())
}

/// Returns the active pool configuration.
pub fn config() -> &'static PoolConfig {
    CONFIG.get_or_init(PoolConfig::default)
}

/// Takes a packet header, and a canonical data buffer if `with_data` is set, from the calling worker's pool. Falls
/// back to a global batch, and then to the general-purpose allocator.
pub(crate) fn allocate(with_data: bool) -> Result<Allocation, Fail> {
    let header: Option<HeaderSlot> = with_local(|local| {
        let slot: Option<HeaderSlot> = take_one(&mut local.headers, &HEADER_BATCHES, &mut local.counters);
        local.counters.record(slot.is_some());
        slot
    })
    .flatten();
    let header: HeaderSlot = match header {
        Some(header) => header,
        None => allocate_header()?,
    };

    if !with_data {
        return Ok(Allocation { header, data: None });
    }
    let config: &PoolConfig = config();

    // On failure `header` is dropped, which frees it. That is fine: it was never initialized.
    let data: Arc<DataBuffer> = allocate_buffer(config.buffer_size)?;
    Ok(Allocation {
        header,
        data: Some(data),
    })
}

/// Takes a data buffer able to hold `capacity` bytes. Requests that fit in a canonical buffer are served from the pool
/// when possible; larger ones always go to the general-purpose allocator.
pub(crate) fn allocate_buffer(capacity: usize) -> Result<Arc<DataBuffer>, Fail> {
    let config: &PoolConfig = config();
    if capacity > config.buffer_size {
        trace!("allocate_buffer(): oversized request (capacity={:?})", capacity);
        return Ok(Arc::new(DataBuffer::allocate(capacity)?));
    }

    let data: Option<Arc<DataBuffer>> = with_local(|local| {
        let buffer: Option<Arc<DataBuffer>> = take_one(&mut local.buffers, &BUFFER_BATCHES, &mut local.counters);
        local.counters.record(buffer.is_some());
        buffer
    })
    .flatten();
    match data {
        Some(data) => Ok(data),
        None => Ok(Arc::new(DataBuffer::allocate(config.buffer_size)?)),
    }
}

/// Gives a packet's header and data buffer back. The header is always kept. The data buffer is kept only if this was
/// the last reference to it, it has the canonical size, and it is not external memory; otherwise it is released.
pub(crate) fn recycle(header: HeaderSlot, data: Option<Arc<DataBuffer>>) {
    release(Some(header), data)
}

/// Gives back a data buffer that a reallocation replaced. Same eligibility rules as [recycle].
pub(crate) fn recycle_buffer(data: Arc<DataBuffer>) {
    release(None, Some(data))
}

fn release(header: Option<HeaderSlot>, data: Option<Arc<DataBuffer>>) {
    let config: &PoolConfig = config();

    let data: Option<Arc<DataBuffer>> = data.and_then(|mut data| {
        let recyclable: bool = Arc::get_mut(&mut data).is_some_and(|buffer| buffer.is_recyclable(config.buffer_size));
        // Not recyclable: dropping our reference releases the bytes if nobody else holds them.
        recyclable.then_some(data)
    });

    // Anything that does not fit in the worker's pool (or that we could not reach) is released after the pool borrow
    // ends, since releasing external memory runs caller code.
    let mut leftover_header: Option<HeaderSlot> = header;
    let mut leftover_data: Option<Arc<DataBuffer>> = data;
    let full_batches: Option<(Option<Vec<HeaderSlot>>, Option<Vec<Arc<DataBuffer>>>)> = with_local(|local| {
        let headers: Option<Vec<HeaderSlot>> = leftover_header
            .take()
            .and_then(|header| give_one(&mut local.headers, header, config.local_capacity));
        let buffers: Option<Vec<Arc<DataBuffer>>> = leftover_data
            .take()
            .and_then(|data| give_one(&mut local.buffers, data, config.local_capacity));
        local.counters.batches_released += headers.is_some() as u64 + buffers.is_some() as u64;
        (headers, buffers)
    });

    if let Some((headers, buffers)) = full_batches {
        if let Some(batch) = headers {
            trace!("recycle(): handing {} headers to the global pool", batch.len());
            drop(HEADER_BATCHES.put_batch(batch, config.global_batches));
        }
        if let Some(batch) = buffers {
            trace!("recycle(): handing {} data buffers to the global pool", batch.len());
            drop(BUFFER_BATCHES.put_batch(batch, config.global_batches));
        }
    }
    drop(leftover_header);
    drop(leftover_data);
}

/// Reports the calling worker's pool contents and counters, plus the global pool's batch counts.
pub fn stats() -> PoolStats {
    let mut stats: PoolStats = with_local(|local| PoolStats {
        local_headers: local.headers.len(),
        local_buffers: local.buffers.len(),
        pool_hits: local.counters.pool_hits,
        global_refills: local.counters.global_refills,
        fallback_allocations: local.counters.fallback_allocations,
        batches_released: local.counters.batches_released,
        ..Default::default()
    })
    .unwrap_or_default();
    stats.global_header_batches = HEADER_BATCHES.len();
    stats.global_buffer_batches = BUFFER_BATCHES.len();
    stats
}

/// Releases everything in the calling worker's private lists. Meant for worker shutdown.
pub fn clear_local() {
    let lists: Option<(Vec<HeaderSlot>, Vec<Arc<DataBuffer>>)> =
        with_local(|local| (mem::take(&mut local.headers), mem::take(&mut local.buffers)));
    if let Some((headers, buffers)) = lists {
        debug!(
            "clear_local(): releasing {} headers and {} data buffers",
            headers.len(),
            buffers.len()
        );
    }
}

/// Runs `f` on the calling worker's pool. Returns `None` if the pool is unreachable, which happens while the thread is
/// shutting down or if releasing memory re-entered the pool.
fn with_local<R>(f: impl FnOnce(&mut LocalPool) -> R) -> Option<R> {
    LOCAL_POOL
        .try_with(|cell| cell.try_borrow_mut().ok().map(|mut local| f(&mut local)))
        .ok()
        .flatten()
}

/// Pops one entry from a private list, refilling the list from the global pool if it is empty.
fn take_one<T>(list: &mut Vec<T>, global: &GlobalPool<T>, counters: &mut Counters) -> Option<T> {
    if list.is_empty() {
        if let Some(batch) = global.take_batch() {
            counters.global_refills += 1;
            trace!("take_one(): pulled a batch of {} entries from the global pool", batch.len());
            *list = batch;
        }
    }
    list.pop()
}

/// Pushes one entry onto a private list. If the list is already at capacity, the full list is returned as a batch for
/// the global pool and the entry starts a fresh list.
fn give_one<T>(list: &mut Vec<T>, item: T, capacity: usize) -> Option<Vec<T>> {
    if list.len() < capacity {
        list.push(item);
        return None;
    }
    let batch: Vec<T> = mem::replace(list, Vec::with_capacity(capacity));
    list.push(item);
    Some(batch)
}

/// Allocates storage for one packet header off the heap.
fn allocate_header() -> Result<HeaderSlot, Fail> {
    let layout: Layout = Layout::new::<PacketHeader>();
    // Safety: PacketHeader is not zero-sized, and we check for a null return value before using the allocation.
    let allocation: *mut u8 = unsafe { alloc(layout) };
    if allocation.is_null() {
        let cause: &str = "failed to allocate packet header";
        error!("allocate_header(): {}", cause);
        return Err(Fail::out_of_memory(cause));
    }
    // Safety: the allocation came from the global allocator with the layout of PacketHeader, which is also the layout
    // of MaybeUninit<PacketHeader>, so the Box may own and eventually free it.
    Ok(unsafe { Box::from_raw(allocation.cast::<MaybeUninit<PacketHeader>>()) })
}

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl PoolConfig {
    /// Checks that the configuration describes a usable pool.
    pub fn validate(&self) -> Result<(), Fail> {
        if self.min_buffer_length == 0 {
            return Err(Fail::new(libc::EINVAL, "minimum buffer length must be positive"));
        }
        if self.buffer_size < self.min_buffer_length {
            return Err(Fail::new(
                libc::EINVAL,
                "pool buffer size must be at least the minimum buffer length",
            ));
        }
        if self.buffer_size > limits::BUFFER_LENGTH_MAX {
            return Err(Fail::new(libc::EINVAL, "pool buffer size is too large"));
        }
        Ok(())
    }
}

impl<T> GlobalPool<T> {
    const fn new() -> Self {
        Self {
            batches: Mutex::new(VecDeque::new()),
            reserved: AtomicBool::new(false),
        }
    }

    fn take_batch(&self) -> Option<Vec<T>> {
        self.batches.lock().pop_back()
    }

    /// Stores `batch`. Returns the batch that has to be freed to make room, if any, so that the caller frees it
    /// outside the lock.
    fn put_batch(&self, batch: Vec<T>, max_batches: usize) -> Option<Vec<T>> {
        if max_batches == 0 {
            return Some(batch);
        }
        if !self.reserved.load(Ordering::Acquire) {
            self.reserve(max_batches);
        }
        let mut batches: MutexGuard<VecDeque<Vec<T>>> = self.batches.lock();
        let evicted: Option<Vec<T>> = if batches.len() >= max_batches {
            batches.pop_front()
        } else {
            None
        };
        batches.push_back(batch);
        evicted
    }

    fn len(&self) -> usize {
        self.batches.lock().len()
    }

    /// Makes room for `max_batches` batches. The storage is allocated before taking the lock, and the storage it
    /// replaces is freed after releasing it.
    fn reserve(&self, max_batches: usize) {
        let mut storage: VecDeque<Vec<T>> = VecDeque::with_capacity(max_batches);
        {
            let mut batches: MutexGuard<VecDeque<Vec<T>>> = self.batches.lock();
            if batches.capacity() < max_batches {
                storage.extend(batches.drain(..));
                mem::swap(&mut *batches, &mut storage);
            }
        }
        self.reserved.store(true, Ordering::Release);
        trace!("reserve(): global pool holds up to {} batches", max_batches);
    }
}

impl LocalPool {
    fn new() -> Self {
        Self {
            headers: Vec::new(),
            buffers: Vec::new(),
            counters: Counters::default(),
        }
    }
}

impl Counters {
    fn record(&mut self, hit: bool) {
        if hit {
            self.pool_hits += 1;
        } else {
            self.fallback_allocations += 1;
        }
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            local_capacity: limits::LOCAL_POOL_CAPACITY,
            global_batches: limits::GLOBAL_POOL_BATCHES,
            buffer_size: limits::POOL_BUFFER_SIZE,
            min_buffer_length: limits::MIN_BUFFER_LENGTH,
            growth_slack: limits::GROWTH_SLACK,
        }
    }
}

/// A worker that exits hands what it has left to the other workers.
impl Drop for LocalPool {
    fn drop(&mut self) {
        let max_batches: usize = config().global_batches;
        if !self.headers.is_empty() {
            drop(HEADER_BATCHES.put_batch(mem::take(&mut self.headers), max_batches));
        }
        if !self.buffers.is_empty() {
            drop(BUFFER_BATCHES.put_batch(mem::take(&mut self.buffers), max_batches));
        }
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
