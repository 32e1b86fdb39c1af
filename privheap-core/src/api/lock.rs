//! Scoped lock guards.
//!
//! A `LockGuard` ties the release of a lock to a scope, over any lock implementing `RawSharedLock`. The discipline,
//! `Exclusive` or `Shared`, selects which pair of calls acquires and releases the lock.
//!
//! The guard records whether it holds the lock: a failed `try_new` produces a guard which releases nothing, and a
//! guard handed back through `into_held` leaves the release to the caller.

use core::{fmt, marker::PhantomData, mem};

/// Raw reader-writer lock.
///
/// #   Safety
///
/// -   Implementations must provide mutual exclusion between an exclusive holder and any other holder.
/// -   A successful `try_lock_*` must be equivalent to the matching blocking call.
pub unsafe trait RawSharedLock {
    /// Acquires the lock exclusively, blocking until available.
    fn lock_exclusive(&self);

    /// Releases an exclusive hold.
    ///
    /// #   Safety
    ///
    /// -   Assumes the lock is held exclusively, by the caller.
    unsafe fn unlock_exclusive(&self);

    /// Attempts to acquire the lock exclusively, without blocking.
    fn try_lock_exclusive(&self) -> bool;

    /// Acquires the lock in shared mode, blocking until available.
    fn lock_shared(&self);

    /// Releases a shared hold.
    ///
    /// #   Safety
    ///
    /// -   Assumes the lock is held in shared mode, by the caller.
    unsafe fn unlock_shared(&self);

    /// Attempts to acquire the lock in shared mode, without blocking.
    fn try_lock_shared(&self) -> bool;
}

/// Locking discipline of a guard.
pub trait Discipline {
    /// Acquires `mutex`, blocking until available.
    fn acquire<M: RawSharedLock + ?Sized>(mutex: &M);

    /// Attempts to acquire `mutex`, without blocking.
    fn try_acquire<M: RawSharedLock + ?Sized>(mutex: &M) -> bool;

    /// Releases `mutex`.
    ///
    /// #   Safety
    ///
    /// -   Assumes `mutex` is held by the caller, under this discipline.
    unsafe fn release<M: RawSharedLock + ?Sized>(mutex: &M);
}

/// Exclusive discipline, a single holder.
#[derive(Debug)]
pub enum Exclusive {}

impl Discipline for Exclusive {
    fn acquire<M: RawSharedLock + ?Sized>(mutex: &M) { mutex.lock_exclusive() }

    fn try_acquire<M: RawSharedLock + ?Sized>(mutex: &M) -> bool { mutex.try_lock_exclusive() }

    unsafe fn release<M: RawSharedLock + ?Sized>(mutex: &M) { mutex.unlock_exclusive() }
}

/// Shared discipline, any number of holders.
#[derive(Debug)]
pub enum Shared {}

impl Discipline for Shared {
    fn acquire<M: RawSharedLock + ?Sized>(mutex: &M) { mutex.lock_shared() }

    fn try_acquire<M: RawSharedLock + ?Sized>(mutex: &M) -> bool { mutex.try_lock_shared() }

    unsafe fn release<M: RawSharedLock + ?Sized>(mutex: &M) { mutex.unlock_shared() }
}

/// Lock Guard.
///
/// Releases the lock on drop, if held.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard<'a, M: RawSharedLock + ?Sized, D: Discipline> {
    mutex: &'a M,
    held: bool,
    _discipline: PhantomData<D>,
}

/// Guard holding a lock exclusively.
pub type ExclusiveGuard<'a, M> = LockGuard<'a, M, Exclusive>;

/// Guard holding a lock in shared mode.
pub type SharedGuard<'a, M> = LockGuard<'a, M, Shared>;

impl<'a, M: RawSharedLock + ?Sized, D: Discipline> LockGuard<'a, M, D> {
    /// Acquires `mutex`, blocking until available.
    pub fn new(mutex: &'a M) -> Self {
        D::acquire(mutex);

        Self::create(mutex, true)
    }

    /// Takes over the release of `mutex`, already held by the caller.
    ///
    /// #   Safety
    ///
    /// -   Assumes `mutex` is held by the caller, under discipline `D`.
    pub unsafe fn adopt(mutex: &'a M) -> Self { Self::create(mutex, true) }

    /// Attempts to acquire `mutex`, without blocking.
    ///
    /// Check `is_held` to know whether the attempt succeeded.
    pub fn try_new(mutex: &'a M) -> Self {
        let held = D::try_acquire(mutex);

        Self::create(mutex, held)
    }

    /// Returns whether the lock is held by this guard.
    pub fn is_held(&self) -> bool { self.held }

    /// Returns the guarded lock.
    pub fn mutex(&self) -> &'a M { self.mutex }

    /// Releases the lock now, if held.
    pub fn unlock(self) {}

    /// Hands the lock back to the caller, without releasing it.
    ///
    /// Returns the lock if it was held, in which case releasing it is up to the caller, or None otherwise.
    pub fn into_held(self) -> Option<&'a M> {
        let held = self.held.then_some(self.mutex);

        mem::forget(self);

        held
    }

    fn create(mutex: &'a M, held: bool) -> Self { Self { mutex, held, _discipline: PhantomData } }
}

impl<'a, M: RawSharedLock + ?Sized, D: Discipline> Drop for LockGuard<'a, M, D> {
    fn drop(&mut self) {
        if !self.held {
            return;
        }

        //  Safety:
        //  -   The lock is held, under discipline `D`, as per `held`.
        unsafe { D::release(self.mutex) };
    }
}

impl<'a, M: RawSharedLock + ?Sized, D: Discipline> fmt::Debug for LockGuard<'a, M, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard").field("held", &self.held).finish()
    }
}

/// Spin Reader-Writer Lock.
///
/// A `RawSharedLock` for callers without a lock of their own.
#[derive(Default)]
pub struct SpinRwLock(spin::RwLock<()>);

impl SpinRwLock {
    /// Creates an unlocked instance.
    pub const fn new() -> Self { Self(spin::RwLock::new(())) }
}

unsafe impl RawSharedLock for SpinRwLock {
    fn lock_exclusive(&self) { mem::forget(self.0.write()) }

    unsafe fn unlock_exclusive(&self) { self.0.force_write_unlock() }

    fn try_lock_exclusive(&self) -> bool { self.0.try_write().map(mem::forget).is_some() }

    fn lock_shared(&self) { mem::forget(self.0.read()) }

    unsafe fn unlock_shared(&self) { self.0.force_read_decrement() }

    fn try_lock_shared(&self) -> bool { self.0.try_read().map(mem::forget).is_some() }
}

impl fmt::Debug for SpinRwLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpinRwLock")
            .field("readers", &self.0.reader_count())
            .field("writers", &self.0.writer_count())
            .finish()
    }
}
