//! Generation counter: the pipeline's only cancellation primitive.
//!
//! Every full stop bumps the generation. Work captures a [`GenerationToken`]
//! when it is created and checks it before acting; a token from an older
//! generation is dead.

use std::sync::Arc;
use tokio::sync::watch;

/// Shared, monotonically increasing generation counter.
#[derive(Debug, Clone)]
pub struct Generation {
    tx: Arc<watch::Sender<u64>>,
}

impl Default for Generation {
    fn default() -> Self {
        Self::new()
    }
}

impl Generation {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> u64 {
        *self.tx.borrow()
    }

    /// Invalidate every outstanding token. Returns the new generation.
    pub fn bump(&self) -> u64 {
        let mut next = 0;
        self.tx.send_modify(|generation| {
            *generation += 1;
            next = *generation;
        });
        next
    }

    /// Token for the current generation.
    pub fn token(&self) -> GenerationToken {
        self.token_for(self.current())
    }

    /// Token for a generation captured earlier.
    pub fn token_for(&self, generation: u64) -> GenerationToken {
        GenerationToken {
            generation,
            rx: self.tx.subscribe(),
        }
    }
}

/// A captured generation.
#[derive(Debug, Clone)]
pub struct GenerationToken {
    generation: u64,
    rx: watch::Receiver<u64>,
}

impl GenerationToken {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True while no full stop has happened since capture.
    pub fn is_live(&self) -> bool {
        *self.rx.borrow() == self.generation
    }

    /// Resolves once the generation moves on (or the counter is dropped).
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() != self.generation {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}
