//! Instance Pool
//!
//! Holds reusable deep copies of the canonical template. `acquire` never
//! blocks: when the free list is empty it falls back to a fresh deep copy of
//! the prototype. Release happens through the [`PooledInstance`] guard's
//! `Drop`, which resets the tree to prototype state and re-shelves it only
//! while the pool is below its configured maximum; above that the instance
//! is simply dropped. The number of simultaneously acquired instances is
//! therefore unbounded while the pool's resident size never exceeds its cap.
//!
//! Copyright (c) 2026 Canopy Team
//! Licensed under the MIT OR Apache-2.0 license

use crate::template::CanonicalTemplate;
use canopy_schemas::Node;
use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Pool sizing, fixed at initialization
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    /// Maximum number of resident (free) instances
    pub max_size: usize,
    /// Instances deep-copied up front at init
    pub prewarm: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 16,
            prewarm: 4,
        }
    }
}

/// Counters for observability and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Acquires served from the free list
    pub reused: u64,
    /// Acquires served by fresh allocation (pool empty)
    pub allocated: u64,
    /// Releases dropped because the pool was at capacity
    pub discarded: u64,
}

/// Concurrent pool of template copies
#[derive(Debug)]
pub struct InstancePool {
    template: Arc<CanonicalTemplate>,
    free: Mutex<Vec<Node>>,
    max_size: usize,
    reused: AtomicU64,
    allocated: AtomicU64,
    discarded: AtomicU64,
}

impl InstancePool {
    /// Create a pool and pre-warm it with `config.prewarm` copies
    /// (capped at `config.max_size`).
    pub fn new(template: Arc<CanonicalTemplate>, config: PoolConfig) -> Arc<Self> {
        let prewarm = config.prewarm.min(config.max_size);
        let free = (0..prewarm).map(|_| template.instantiate()).collect();
        Arc::new(Self {
            template,
            free: Mutex::new(free),
            max_size: config.max_size,
            reused: AtomicU64::new(0),
            allocated: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        })
    }

    /// Take an instance. Never blocks beyond the free-list mutex and never
    /// fails: an empty pool degrades to a fresh deep copy.
    pub fn acquire(self: &Arc<Self>) -> PooledInstance {
        let recycled = self.free.lock().pop();
        let node = match recycled {
            Some(node) => {
                self.reused.fetch_add(1, Ordering::Relaxed);
                node
            }
            None => {
                self.allocated.fetch_add(1, Ordering::Relaxed);
                log::debug!("instance pool empty, allocating fresh copy");
                self.template.instantiate()
            }
        };
        PooledInstance {
            node: Some(node),
            pool: Arc::clone(self),
        }
    }

    /// The template this pool copies from
    pub fn template(&self) -> &Arc<CanonicalTemplate> {
        &self.template
    }

    /// Number of free instances currently resident
    pub fn resident(&self) -> usize {
        self.free.lock().len()
    }

    /// Snapshot of the pool counters
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            reused: self.reused.load(Ordering::Relaxed),
            allocated: self.allocated.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }

    /// Drop all resident instances (shutdown path)
    pub fn drain(&self) {
        self.free.lock().clear();
    }

    fn recycle(&self, mut node: Node) {
        self.template.reset(&mut node);
        let mut free = self.free.lock();
        if free.len() < self.max_size {
            free.push(node);
        } else {
            self.discarded.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// An acquired deep copy, owned by exactly one caller
///
/// Dereferences to the underlying [`Node`]; dropping it releases the
/// instance back to the pool. Release is therefore unconditional on every
/// exit path, including panics and early returns.
#[derive(Debug)]
pub struct PooledInstance {
    node: Option<Node>,
    pool: Arc<InstancePool>,
}

impl PooledInstance {
    /// Take ownership of the tree, permanently removing it from the pool's
    /// reuse cycle
    pub fn detach(mut self) -> Node {
        // Drop sees None and releases nothing.
        self.node.take().expect("instance already detached")
    }
}

impl Deref for PooledInstance {
    type Target = Node;

    fn deref(&self) -> &Node {
        self.node.as_ref().expect("instance already detached")
    }
}

impl DerefMut for PooledInstance {
    fn deref_mut(&mut self) -> &mut Node {
        self.node.as_mut().expect("instance already detached")
    }
}

impl Drop for PooledInstance {
    fn drop(&mut self) {
        if let Some(node) = self.node.take() {
            self.pool.recycle(node);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_schemas::{Node, NodeDescriptor as D, ScalarType, SchemaDescriptor};
    use std::thread;

    fn pool_with(config: PoolConfig) -> Arc<InstancePool> {
        let descriptor = SchemaDescriptor::new(D::object(
            "Order",
            vec![
                D::scalar("OrderId", ScalarType::String),
                D::array("Items", D::scalar("Item", ScalarType::String)),
            ],
        ));
        let template = Arc::new(CanonicalTemplate::build(descriptor).unwrap());
        InstancePool::new(template, config)
    }

    #[test]
    fn prewarm_respects_capacity() {
        let pool = pool_with(PoolConfig {
            max_size: 2,
            prewarm: 8,
        });
        assert_eq!(pool.resident(), 2);
    }

    #[test]
    fn acquire_falls_back_to_allocation_when_empty() {
        let pool = pool_with(PoolConfig {
            max_size: 2,
            prewarm: 0,
        });
        let a = pool.acquire();
        let b = pool.acquire();
        assert_eq!(pool.stats().allocated, 2);
        drop(a);
        drop(b);
        assert_eq!(pool.resident(), 2);
        let _c = pool.acquire();
        assert_eq!(pool.stats().reused, 1);
    }

    #[test]
    fn release_resets_state_no_data_bleeds() {
        let pool = pool_with(PoolConfig {
            max_size: 1,
            prewarm: 1,
        });
        {
            let mut instance = pool.acquire();
            *instance.child_mut("OrderId").unwrap() = Node::string("A-1");
            if let Node::Array(items) = instance.child_mut("Items").unwrap() {
                items.push(Node::string("widget"));
            }
        }
        let reused = pool.acquire();
        assert_eq!(&*reused, pool.template().root());
    }

    #[test]
    fn release_above_capacity_discards() {
        let pool = pool_with(PoolConfig {
            max_size: 2,
            prewarm: 2,
        });
        let a = pool.acquire();
        let b = pool.acquire();
        let c = pool.acquire(); // allocated fresh
        drop(a);
        drop(b);
        drop(c); // pool already holds 2, this one is discarded
        assert_eq!(pool.resident(), 2);
        assert_eq!(pool.stats().discarded, 1);
    }

    #[test]
    fn detach_removes_instance_from_reuse() {
        let pool = pool_with(PoolConfig {
            max_size: 4,
            prewarm: 1,
        });
        let instance = pool.acquire();
        let _tree = instance.detach();
        assert_eq!(pool.resident(), 0);
    }

    #[test]
    fn concurrent_acquire_release_is_safe() {
        let pool = pool_with(PoolConfig {
            max_size: 4,
            prewarm: 2,
        });
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    for _ in 0..50 {
                        let mut instance = pool.acquire();
                        *instance.child_mut("OrderId").unwrap() =
                            Node::string(format!("T-{}", i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(pool.resident() <= 4);
        let stats = pool.stats();
        assert_eq!(stats.reused + stats.allocated, 8 * 50);
        // Every surviving instance is back at prototype state.
        let fresh = pool.acquire();
        assert_eq!(&*fresh, pool.template().root());
    }

    #[test]
    fn drain_empties_the_pool() {
        let pool = pool_with(PoolConfig {
            max_size: 4,
            prewarm: 4,
        });
        pool.drain();
        assert_eq!(pool.resident(), 0);
        // Still serves acquires afterward.
        let _instance = pool.acquire();
        assert_eq!(pool.stats().allocated, 1);
    }
}
