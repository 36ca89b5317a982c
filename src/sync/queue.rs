//! Message queue implementation
//!
//! Bounded FIFO queues of fixed-size items. Each queue's ring buffer is
//! carved from a static byte pool at creation; items are copied in and out
//! as bytes through the [`QueueItem`] encoding, never by pointer.
//!
//! A send into an empty queue with a receiver waiting writes straight into
//! the receiver's transfer buffer, and a receive from a full queue with a
//! sender waiting pulls the sender's item into the slot it just freed, so a
//! woken task never has to race for the queue again.

use core::marker::PhantomData;
use core::ops::Range;

use crate::config::{CFG_MAX_QUEUES, CFG_QUEUE_ITEM_MAX, CFG_QUEUE_POOL_BYTES};
use crate::error::{OsError, OsResult};
use crate::kernel::{os_call, os_check, os_fatal, Kernel};
use crate::sync::pend_list::PendList;
use crate::sync::HandleCell;
use crate::types::{OsPendOn, OsPendStatus, Pend, QueueId, TakeResult, TaskId, Timeout};

/// A value that can travel through a queue
///
/// `encode` fills exactly `SIZE` bytes and `decode` reads them back.
pub trait QueueItem: Sized {
    const SIZE: usize;

    fn encode(&self, buf: &mut [u8]);

    fn decode(buf: &[u8]) -> Self;
}

macro_rules! impl_queue_item_int {
    ($($t:ty),* $(,)?) => {
        $(
            impl QueueItem for $t {
                const SIZE: usize = core::mem::size_of::<$t>();

                #[inline]
                fn encode(&self, buf: &mut [u8]) {
                    buf.copy_from_slice(&self.to_le_bytes());
                }

                #[inline]
                fn decode(buf: &[u8]) -> Self {
                    let mut bytes = [0u8; core::mem::size_of::<$t>()];
                    bytes.copy_from_slice(buf);
                    <$t>::from_le_bytes(bytes)
                }
            }
        )*
    };
}

impl_queue_item_int!(u8, i8, u16, i16, u32, i32, u64, i64);

impl<const N: usize> QueueItem for [u8; N] {
    const SIZE: usize = N;

    #[inline]
    fn encode(&self, buf: &mut [u8]) {
        buf.copy_from_slice(self);
    }

    #[inline]
    fn decode(buf: &[u8]) -> Self {
        let mut out = [0u8; N];
        out.copy_from_slice(buf);
        out
    }
}

/// Byte pool the queues' ring buffers are carved from
pub struct QueuePool {
    mem: [u8; CFG_QUEUE_POOL_BYTES],
    used: usize,
}

impl QueuePool {
    pub const fn new() -> Self {
        QueuePool {
            mem: [0; CFG_QUEUE_POOL_BYTES],
            used: 0,
        }
    }

    /// Reserve `bytes` and return their offset
    fn carve(&mut self, bytes: usize) -> OsResult<usize> {
        let base = self.used;
        let end = base.checked_add(bytes).ok_or(OsError::QPoolEmpty)?;
        if end > self.mem.len() {
            return Err(OsError::QPoolEmpty);
        }
        self.used = end;
        Ok(base)
    }

    /// Bytes still free
    pub fn remaining(&self) -> usize {
        self.mem.len() - self.used
    }
}

impl Default for QueuePool {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounded FIFO queue
pub struct OsQueue {
    /// Tasks waiting for a free slot
    pub(crate) send_list: PendList,
    /// Tasks waiting for an item
    pub(crate) recv_list: PendList,
    /// Offset of the ring buffer in the pool
    base: usize,
    item_size: usize,
    capacity: usize,
    /// Slot of the oldest item
    head: usize,
    /// Occupied slots
    count: usize,
    name: &'static str,
    created: bool,
}

impl OsQueue {
    pub const fn new() -> Self {
        OsQueue {
            send_list: PendList::new(),
            recv_list: PendList::new(),
            base: 0,
            item_size: 0,
            capacity: 0,
            head: 0,
            count: 0,
            name: "",
            created: false,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.count == self.capacity
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn item_size(&self) -> usize {
        self.item_size
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    fn slot(&self, index: usize) -> Range<usize> {
        let start = self.base + index * self.item_size;
        start..start + self.item_size
    }

    fn push(&mut self, pool: &mut [u8], item: &[u8]) {
        debug_assert!(self.count < self.capacity);
        let tail = (self.head + self.count) % self.capacity;
        pool[self.slot(tail)].copy_from_slice(item);
        self.count += 1;
    }

    fn pop(&mut self, pool: &[u8], out: &mut [u8]) {
        debug_assert!(self.count > 0);
        out.copy_from_slice(&pool[self.slot(self.head)]);
        self.head = (self.head + 1) % self.capacity;
        self.count -= 1;
    }
}

impl Default for OsQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel {
    /// Create a queue of `capacity` items of `item_size` bytes each
    pub fn queue_create(&mut self, name: &'static str, capacity: usize, item_size: usize) -> OsResult<QueueId> {
        if self.in_isr() {
            return Err(OsError::CreateIsr);
        }
        if capacity == 0 {
            return Err(OsError::QSizeInvalid);
        }
        if item_size == 0 || item_size > CFG_QUEUE_ITEM_MAX {
            return Err(OsError::QItemSize);
        }
        if self.queue_cnt >= CFG_MAX_QUEUES {
            return Err(OsError::ObjNoMore);
        }

        let bytes = item_size.checked_mul(capacity).ok_or(OsError::QPoolEmpty)?;
        let base = self.queue_pool.carve(bytes)?;

        let id = QueueId(self.queue_cnt as u8);
        self.queue_cnt += 1;
        self.queues[id.index()] = OsQueue {
            send_list: PendList::new(),
            recv_list: PendList::new(),
            base,
            item_size,
            capacity,
            head: 0,
            count: 0,
            name,
            created: true,
        };
        crate::debug!("queue {} created, {} x {} bytes", name, capacity, item_size);
        Ok(id)
    }

    fn queue(&mut self, id: QueueId) -> OsResult<&mut OsQueue> {
        self.queues
            .get_mut(id.index())
            .filter(|q| q.created)
            .ok_or(OsError::ObjInvalid)
    }

    /// Queue table entry
    pub fn queue_ref(&self, id: QueueId) -> OsResult<&OsQueue> {
        self.queues
            .get(id.index())
            .filter(|q| q.created)
            .ok_or(OsError::ObjInvalid)
    }

    /// Number of queued items
    pub fn queue_len(&self, id: QueueId) -> OsResult<usize> {
        self.queue_ref(id).map(OsQueue::len)
    }

    /// Free slots
    pub fn queue_spaces(&self, id: QueueId) -> OsResult<usize> {
        self.queue_ref(id).map(|q| q.capacity - q.count)
    }

    /// Put an item in the queue or hand it to a waiting receiver
    ///
    /// Returns the receiver woken by a direct hand-off.
    fn queue_post(&mut self, id: QueueId, item: &[u8]) -> OsResult<Option<TaskId>> {
        let q = self.queue(id)?;
        if item.len() != q.item_size {
            return Err(OsError::QItemSize);
        }

        if let Some(rx) = q.recv_list.head() {
            self.tasks[rx.index()].xfer[..item.len()].copy_from_slice(item);
            self.pend_wake(rx, OsPendStatus::Ok);
            return Ok(Some(rx));
        }
        if q.is_full() {
            return Err(OsError::QFull);
        }

        self.queues[id.index()].push(&mut self.queue_pool.mem, item);
        Ok(None)
    }

    /// Send an item from task context
    ///
    /// # Returns
    /// * `Ok(Pend::Acquired)` - The item is queued or delivered
    /// * `Ok(Pend::TimedOut)` - The queue is full and the caller may not block
    /// * `Ok(Pend::Blocked)` - The caller waits with the item in its transfer buffer
    pub fn queue_send(&mut self, id: QueueId, item: &[u8], timeout: Timeout) -> OsResult<Pend> {
        match self.queue_post(id, item) {
            Ok(woken) => {
                if woken.is_some() {
                    self.schedule();
                }
                Ok(Pend::Acquired)
            }
            Err(OsError::QFull) => {
                if !timeout.may_block() {
                    return Ok(Pend::TimedOut);
                }
                if self.in_isr() {
                    return Err(OsError::PendIsr);
                }

                let me = self.cur_task()?;
                self.tasks[me.index()].xfer[..item.len()].copy_from_slice(item);
                self.pend_current(me, OsPendOn::QueueSend(id), timeout);
                self.schedule();
                Ok(Pend::Blocked)
            }
            Err(err) => Err(err),
        }
    }

    /// Send an item from an interrupt handler
    ///
    /// Never blocks: a full queue is reported as `QFull`. Returns `true`
    /// when the woken receiver is more urgent than the interrupted task.
    pub fn queue_send_from_isr(&mut self, id: QueueId, item: &[u8]) -> OsResult<bool> {
        let Some(woken) = self.queue_post(id, item)? else {
            return Ok(false);
        };

        let higher = self
            .cur
            .is_none_or(|cur| self.tasks[woken.index()].prio > self.tasks[cur.index()].prio);
        if higher {
            self.switch_pending = true;
        }
        Ok(higher)
    }

    /// Receive the oldest item into `out`
    ///
    /// # Returns
    /// * `Ok(Pend::Acquired)` - `out` holds the item
    /// * `Ok(Pend::TimedOut)` - The queue is empty and the caller may not block
    /// * `Ok(Pend::Blocked)` - The caller waits; collect the item with
    ///   [`queue_receive_result`](Kernel::queue_receive_result)
    pub fn queue_receive(&mut self, id: QueueId, out: &mut [u8], timeout: Timeout) -> OsResult<Pend> {
        let q = self.queue(id)?;
        if out.len() != q.item_size {
            return Err(OsError::QItemSize);
        }

        if !q.is_empty() {
            let q = &mut self.queues[id.index()];
            q.pop(&self.queue_pool.mem, out);

            if let Some(tx) = q.send_list.head() {
                let len = q.item_size;
                let item = self.tasks[tx.index()].xfer;
                self.queues[id.index()].push(&mut self.queue_pool.mem, &item[..len]);
                self.pend_wake(tx, OsPendStatus::Ok);
                self.schedule();
            }
            return Ok(Pend::Acquired);
        }

        if !timeout.may_block() {
            return Ok(Pend::TimedOut);
        }
        if self.in_isr() {
            return Err(OsError::PendIsr);
        }

        let me = self.cur_task()?;
        self.pend_current(me, OsPendOn::QueueRecv(id), timeout);
        self.schedule();
        Ok(Pend::Blocked)
    }

    /// Outcome of a receive that blocked, copying the delivered item to `out`
    pub fn queue_receive_result(&self, task: TaskId, out: &mut [u8]) -> TakeResult {
        let result = self.pend_result(task);
        if result.is_acquired() {
            out.copy_from_slice(&self.tasks[task.index()].xfer[..out.len()]);
        }
        result
    }
}

/// Statically allocatable queue handle carrying items of type `T`
///
/// ```ignore
/// static PRESSES: Queue<u32> = Queue::new();
///
/// PRESSES.create("Presses", 5)?;
/// PRESSES.send(3, Timeout::Ticks(100));
/// if let Some(n) = PRESSES.receive(Timeout::Forever) { ... }
/// ```
pub struct Queue<T: QueueItem> {
    id: HandleCell,
    _item: PhantomData<fn() -> T>,
}

impl<T: QueueItem> Queue<T> {
    pub const fn new() -> Self {
        Queue {
            id: HandleCell::new(),
            _item: PhantomData,
        }
    }

    /// Create the queue in the given kernel and bind this handle to it
    pub fn create_in(&self, k: &mut Kernel, name: &'static str, capacity: usize) -> OsResult<QueueId> {
        self.id.ensure_unbound()?;
        let id = k.queue_create(name, capacity, T::SIZE)?;
        self.id.bind(id.0);
        Ok(id)
    }

    pub fn create(&self, name: &'static str, capacity: usize) -> OsResult<()> {
        os_call(|k| self.create_in(k, name, capacity)).map(|_| ())
    }

    /// Kernel handle of this queue
    pub fn id(&self) -> QueueId {
        match self.id.get() {
            Some(raw) => QueueId(raw),
            None => os_fatal(OsError::ObjInvalid),
        }
    }

    #[inline]
    pub fn is_created(&self) -> bool {
        self.id.get().is_some()
    }

    /// Send an item, waiting for a free slot as `timeout` allows
    pub fn send(&self, item: T, timeout: impl Into<Timeout>) -> TakeResult {
        let id = self.id();
        let timeout = timeout.into();
        let mut buf = [0u8; CFG_QUEUE_ITEM_MAX];
        item.encode(&mut buf[..T::SIZE]);

        match os_call(|k| k.queue_send(id, &buf[..T::SIZE], timeout)) {
            Ok(Pend::Acquired) => TakeResult::Acquired,
            Ok(Pend::TimedOut) => TakeResult::TimedOut,
            Ok(Pend::Blocked) => os_call(|k| k.cur_task().map(|me| k.pend_result(me)))
                .unwrap_or_else(|err| os_fatal(err)),
            Err(err) => os_fatal(err),
        }
    }

    /// Send an item from an interrupt handler
    ///
    /// Returns whether a more urgent task was woken, or `QFull`.
    pub fn send_from_isr(&self, item: T) -> OsResult<bool> {
        let id = self.id();
        let mut buf = [0u8; CFG_QUEUE_ITEM_MAX];
        item.encode(&mut buf[..T::SIZE]);
        os_check(os_call(|k| k.queue_send_from_isr(id, &buf[..T::SIZE])))
    }

    /// Receive the oldest item, or `None` on timeout
    pub fn receive(&self, timeout: impl Into<Timeout>) -> Option<T> {
        let id = self.id();
        let timeout = timeout.into();
        let mut buf = [0u8; CFG_QUEUE_ITEM_MAX];
        let out = &mut buf[..T::SIZE];

        let result = match os_call(|k| k.queue_receive(id, out, timeout)) {
            Ok(Pend::Acquired) => TakeResult::Acquired,
            Ok(Pend::TimedOut) => TakeResult::TimedOut,
            Ok(Pend::Blocked) => os_call(|k| k.cur_task().map(|me| k.queue_receive_result(me, out)))
                .unwrap_or_else(|err| os_fatal(err)),
            Err(err) => os_fatal(err),
        };

        result.is_acquired().then(|| T::decode(out))
    }

    /// Number of queued items
    pub fn len(&self) -> usize {
        let id = self.id();
        os_call(|k| k.queue_len(id)).unwrap_or_else(|err| os_fatal(err))
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Free slots
    pub fn spaces(&self) -> usize {
        let id = self.id();
        os_call(|k| k.queue_spaces(id)).unwrap_or_else(|err| os_fatal(err))
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.spaces() == 0
    }
}

impl<T: QueueItem> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_items() {
        let mut buf = [0u8; 4];
        0x1234_5678u32.encode(&mut buf);
        assert_eq!(buf, [0x78, 0x56, 0x34, 0x12]);
        assert_eq!(u32::decode(&buf), 0x1234_5678);
        assert_eq!(<i16 as QueueItem>::SIZE, 2);
    }

    #[test]
    fn test_pool_carve() {
        let mut pool = QueuePool::new();
        assert_eq!(pool.carve(10), Ok(0));
        assert_eq!(pool.carve(6), Ok(10));
        assert_eq!(pool.remaining(), CFG_QUEUE_POOL_BYTES - 16);
        assert_eq!(pool.carve(CFG_QUEUE_POOL_BYTES), Err(OsError::QPoolEmpty));
    }

    #[test]
    fn test_ring_wraps() {
        let mut pool = [0u8; 6];
        let mut q = OsQueue::new();
        q.item_size = 2;
        q.capacity = 3;

        let mut out = [0u8; 2];
        q.push(&mut pool, &[1, 1]);
        q.push(&mut pool, &[2, 2]);
        q.pop(&pool, &mut out);
        assert_eq!(out, [1, 1]);

        q.push(&mut pool, &[3, 3]);
        q.push(&mut pool, &[4, 4]);
        assert!(q.is_full());

        for expect in [[2, 2], [3, 3], [4, 4]] {
            q.pop(&pool, &mut out);
            assert_eq!(out, expect);
        }
        assert!(q.is_empty());
    }
}
