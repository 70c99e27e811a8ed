//! Time-to-live wrapper around a cached value.
//!
//! A [`Cached`] remembers when it was last touched and fires its expiry
//! callback exactly once when the TTL elapses without a touch. After expiry
//! the wrapper is dead: touches are ignored and it never comes back to life.

use std::{
    fmt,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio::time::Instant;
use tracing::warn;

/// Values that know the key they are cached under.
pub trait Keyed {
    type Key: Copy + fmt::Debug + Send + 'static;

    fn key(&self) -> Self::Key;
}

impl<T: Keyed + ?Sized> Keyed for Arc<T> {
    type Key = T::Key;

    fn key(&self) -> Self::Key {
        (**self).key()
    }
}

/// Callback invoked with the key of an expired value.
pub type ExpireCallback<K> = Box<dyn FnOnce(K) + Send>;

/// Value with a sliding TTL and a one-shot expiry callback.
pub struct Cached<T: Keyed> {
    value: T,
    ttl: Duration,
    touched_at: Mutex<Instant>,
    expired: AtomicBool,
    on_expire: Mutex<Option<ExpireCallback<T::Key>>>,
}

impl<T: Keyed> Cached<T> {
    /// Wrap `value`, considering it touched at `now`.
    pub fn wrap(value: T, ttl: Duration, now: Instant, on_expire: ExpireCallback<T::Key>) -> Self {
        Self {
            value,
            ttl,
            touched_at: Mutex::new(now),
            expired: AtomicBool::new(false),
            on_expire: Mutex::new(Some(on_expire)),
        }
    }

    /// Wrapped value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Idle time after which the entry expires.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Reset the expiry clock to `Instant::now() + ttl`.
    pub fn touch(&self) -> bool {
        self.touch_at(Instant::now())
    }

    /// Reset the expiry clock to `now + ttl`.
    ///
    /// Returns `false` without doing anything when the wrapper already
    /// expired; a late touch racing an eviction is harmless.
    pub fn touch_at(&self, now: Instant) -> bool {
        let mut touched_at = self.touched_at.lock().unwrap_or_else(PoisonError::into_inner);
        if self.expired.load(Ordering::Acquire) {
            warn!(key = ?self.value.key(), "touch on an expired cache entry ignored");
            return false;
        }
        if now > *touched_at {
            *touched_at = now;
        }
        true
    }

    /// Instant at which the value expires unless touched again.
    pub fn expires_at(&self) -> Instant {
        *self.touched_at.lock().unwrap_or_else(PoisonError::into_inner) + self.ttl
    }

    /// Whether the TTL has elapsed at `now`. Pure query.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.is_dead() || now >= self.expires_at()
    }

    /// Whether the expiry already happened (or the wrapper was retired).
    pub fn is_dead(&self) -> bool {
        self.expired.load(Ordering::Acquire)
    }

    /// Expire the wrapper if its TTL elapsed at `now`. Returns `true` when
    /// this call performed the expiry.
    pub fn expire_if_elapsed(&self, now: Instant) -> bool {
        {
            let touched_at = self.touched_at.lock().unwrap_or_else(PoisonError::into_inner);
            if now < *touched_at + self.ttl {
                return false;
            }
            if self.expired.swap(true, Ordering::AcqRel) {
                return false;
            }
        }
        self.fire();
        true
    }

    /// Expire immediately regardless of the clock.
    pub fn expire(&self) -> bool {
        {
            let _touched_at = self.touched_at.lock().unwrap_or_else(PoisonError::into_inner);
            if self.expired.swap(true, Ordering::AcqRel) {
                return false;
            }
        }
        self.fire();
        true
    }

    /// Mark the wrapper dead without running its callback. Used when the
    /// owner takes care of the value itself.
    pub fn retire(&self) -> bool {
        let won = {
            let _touched_at = self.touched_at.lock().unwrap_or_else(PoisonError::into_inner);
            !self.expired.swap(true, Ordering::AcqRel)
        };
        if won {
            self.on_expire
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
        }
        won
    }

    fn fire(&self) {
        let callback = self
            .on_expire
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(callback) = callback {
            callback(self.value.key());
        }
    }
}

impl<T: Keyed + fmt::Debug> fmt::Debug for Cached<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cached")
            .field("value", &self.value)
            .field("ttl", &self.ttl)
            .field("expired", &self.is_dead())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[derive(Debug)]
    struct Entry(u32);

    impl Keyed for Entry {
        type Key = u32;

        fn key(&self) -> u32 {
            self.0
        }
    }

    fn counting(counter: &Arc<AtomicUsize>) -> ExpireCallback<u32> {
        let counter = Arc::clone(counter);
        Box::new(move |key| {
            assert_eq!(key, 7);
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn touch_pushes_the_deadline() {
        let fired = Arc::new(AtomicUsize::new(0));
        let start = Instant::now();
        let ttl = Duration::from_secs(60);
        let cached = Cached::wrap(Entry(7), ttl, start, counting(&fired));

        assert!(cached.touch_at(start + Duration::from_secs(30)));
        assert!(!cached.is_expired(start + Duration::from_secs(60)));
        assert!(!cached.expire_if_elapsed(start + Duration::from_secs(89)));
        assert!(cached.expire_if_elapsed(start + Duration::from_secs(90)));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callback_fires_at_most_once() {
        let fired = Arc::new(AtomicUsize::new(0));
        let start = Instant::now();
        let cached = Cached::wrap(Entry(7), Duration::from_secs(1), start, counting(&fired));

        let late = start + Duration::from_secs(5);
        assert!(cached.expire_if_elapsed(late));
        assert!(!cached.expire_if_elapsed(late));
        assert!(!cached.expire());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn touch_after_expiry_is_ignored() {
        let fired = Arc::new(AtomicUsize::new(0));
        let start = Instant::now();
        let cached = Cached::wrap(Entry(7), Duration::from_secs(1), start, counting(&fired));

        assert!(cached.expire());
        assert!(!cached.touch_at(start + Duration::from_secs(10)));
        assert!(cached.is_dead());
        assert!(cached.is_expired(start));
    }

    #[test]
    fn retire_skips_the_callback() {
        let fired = Arc::new(AtomicUsize::new(0));
        let cached = Cached::wrap(
            Entry(7),
            Duration::from_secs(1),
            Instant::now(),
            counting(&fired),
        );

        assert!(cached.retire());
        assert!(!cached.expire());
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
