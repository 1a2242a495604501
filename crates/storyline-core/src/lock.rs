//! Per-story write locks.
//!
//! Every mutating operation on a story runs while holding that story's
//! lock, so at most one writer touches a story at a time. Different stories
//! never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Guard held for the duration of one story operation.
pub type StoryGuard = OwnedMutexGuard<()>;

/// Registry of per-story async mutexes.
#[derive(Debug, Default)]
pub struct StoryLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl StoryLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to a story.
    pub async fn lock(&self, story_id: &str) -> StoryGuard {
        let mutex = {
            // The map is only touched in short non-panicking sections
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            // Clones only happen under this mutex, so a count of one means idle
            locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
            locks
                .entry(story_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        mutex.lock_owned().await
    }

    /// Number of stories with a held or awaited lock.
    #[cfg(test)]
    fn tracked(&self) -> usize {
        let locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .values()
            .filter(|mutex| Arc::strong_count(mutex) > 1)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_story_is_exclusive() {
        let locks = Arc::new(StoryLocks::new());
        let guard = locks.lock("sty_1").await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock("sty_1").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_idle_locks_are_dropped() {
        let locks = StoryLocks::new();
        for i in 0..50 {
            let _guard = locks.lock(&format!("sty_{i}")).await;
        }
        let held = locks.lock("sty_held").await;
        assert_eq!(locks.tracked(), 1);
        assert_eq!(locks.locks.lock().unwrap().len(), 1);
        drop(held);
        assert_eq!(locks.tracked(), 0);
    }

    #[tokio::test]
    async fn test_different_stories_do_not_contend() {
        let locks = StoryLocks::new();
        let _a = locks.lock("sty_a").await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock("sty_b")).await;
        assert!(b.is_ok());
    }
}
