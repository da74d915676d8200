use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::warn;

/// Lock a cache mutex, recovering the guard if a panicking holder poisoned it.
///
/// Every critical section in the cache leaves its map consistent before it
/// can panic, so the inner value is still usable after recovery.
pub(crate) fn lock<'a, T>(
    mutex: &'a Mutex<T>,
    source: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|poisoned| recover(poisoned, source, op))
}

fn recover<G>(poisoned: PoisonError<G>, source: &'static str, op: &'static str) -> G {
    warn!(
        op,
        source_module = source,
        result = "poisoned_recovered",
        "Recovered from poisoned query cache lock"
    );
    poisoned.into_inner()
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;

    #[test]
    fn poisoned_mutex_is_recovered() {
        let mutex = Mutex::new(vec![1]);

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = mutex.lock().expect("mutex should be acquired");
            panic!("poison mutex");
        }));

        lock(&mutex, "cache::lock", "test").push(2);
        assert_eq!(*lock(&mutex, "cache::lock", "test"), vec![1, 2]);
    }
}
