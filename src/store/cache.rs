use parking_lot::Mutex;

enum CacheState<T> {
    Invalid,
    Valid(T),
}

/// A memoized handle that is rebuilt on request.
///
/// A cache starts invalid. [`get_or_try_init`](HandleCache::get_or_try_init) builds the handle on first use and
/// returns clones of it until a refresh is requested.
pub struct HandleCache<T> {
    state: Mutex<CacheState<T>>,
}

impl<T> std::fmt::Debug for HandleCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleCache")
            .field(
                "valid",
                &self
                    .state
                    .try_lock()
                    .map(|state| matches!(*state, CacheState::Valid(_))),
            )
            .finish()
    }
}

impl<T> Default for HandleCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HandleCache<T> {
    /// Create an invalid cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CacheState::Invalid),
        }
    }

    /// Returns true if the cache holds a handle.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(*self.state.lock(), CacheState::Valid(_))
    }

    /// Drop the cached handle.
    pub fn invalidate(&self) {
        *self.state.lock() = CacheState::Invalid;
    }
}

impl<T: Clone> HandleCache<T> {
    /// Return the cached handle, building it with `init` if the cache is invalid or `refresh` is set.
    ///
    /// The cache is left invalid if `init` fails.
    ///
    /// # Errors
    /// Returns the error of `init`.
    pub fn get_or_try_init<E>(
        &self,
        refresh: bool,
        init: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E> {
        let mut state = self.state.lock();
        if refresh {
            *state = CacheState::Invalid;
        }
        if let CacheState::Valid(handle) = &*state {
            return Ok(handle.clone());
        }
        let handle = init()?;
        *state = CacheState::Valid(handle.clone());
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn handle_cache() {
        let builds = Cell::new(0);
        let build = || -> Result<usize, ()> {
            builds.set(builds.get() + 1);
            Ok(builds.get())
        };
        let cache = HandleCache::new();
        assert!(!cache.is_valid());
        assert_eq!(cache.get_or_try_init(false, build), Ok(1));
        assert_eq!(cache.get_or_try_init(false, build), Ok(1));
        assert_eq!(cache.get_or_try_init(true, build), Ok(2));
        assert!(cache.is_valid());
        cache.invalidate();
        assert_eq!(cache.get_or_try_init(false, build), Ok(3));

        assert_eq!(cache.get_or_try_init(true, || Err::<usize, _>("offline")), Err("offline"));
        assert!(!cache.is_valid());
        assert_eq!(cache.get_or_try_init(false, build), Ok(4));
    }
}
