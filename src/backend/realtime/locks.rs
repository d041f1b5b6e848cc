//! Per-board mutation serialization.
//!
//! Column-document mutations are read-modify-write against the store. Two
//! concurrent moves touching the same board would race (each reads the
//! column lists, mutates, writes back), so every column mutation acquires
//! the board's mutex first. Different boards proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Default)]
pub struct BoardLocks {
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl BoardLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the mutation lock for one board, creating it on first use.
    pub async fn acquire(&self, board_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(board_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_same_board_is_serialized() {
        let locks = Arc::new(BoardLocks::new());
        let board = Uuid::new_v4();
        let in_section = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let in_section = in_section.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire(board).await;
                let concurrent = in_section.fetch_add(1, Ordering::SeqCst);
                assert_eq!(concurrent, 0);
                tokio::task::yield_now().await;
                in_section.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_different_boards_do_not_block() {
        let locks = BoardLocks::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let _guard_a = locks.acquire(a).await;
        // Acquiring a different board's lock must not deadlock.
        let _guard_b = locks.acquire(b).await;
    }
}
