//! Handles and the per-document handle registry

use crate::SprigError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{self, Display};
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Opaque identifier of one element within one document.
///
/// Handle `0` ([`Handle::ROOT`]) always refers to the document root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(u64);

impl Handle {
    pub const ROOT: Handle = Handle(0);

    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }

    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }
}

impl Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Handle {
    type Err = SprigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Handle)
            .map_err(|_| SprigError::InvalidArgument(format!("invalid handle: {:?}", s)))
    }
}

impl From<u64> for Handle {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// How fresh handles are drawn
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Allocation {
    /// Monotonic counter starting at 1
    #[default]
    Sequential,
    /// Uniform 9-digit draws, retried on collision
    Random,
}

/// Range random handles are drawn from
pub const RANDOM_HANDLE_RANGE: RangeInclusive<u64> = 111_111_111..=999_999_999;

/// Maps handles to arena slots of one document, and back.
///
/// `K` is the document's internal node key. The registry only guarantees
/// that a handle is never handed out twice while it is registered.
#[derive(Debug, Clone)]
pub struct HandleRegistry<K> {
    allocation: Allocation,
    next: u64,
    by_handle: HashMap<Handle, K>,
    by_key: HashMap<K, Handle>,
}

impl<K: Copy + Eq + std::hash::Hash> HandleRegistry<K> {
    /// Create a registry with `root` bound to [`Handle::ROOT`]
    pub fn new(root: K, allocation: Allocation) -> Self {
        let mut registry = Self {
            allocation,
            next: 1,
            by_handle: HashMap::new(),
            by_key: HashMap::new(),
        };
        registry.bind(Handle::ROOT, root);
        registry
    }

    /// Allocate a fresh handle for `key` and record it
    pub fn register(&mut self, key: K) -> Handle {
        let handle = self.allocate();
        self.bind(handle, key);
        handle
    }

    fn allocate(&mut self) -> Handle {
        match self.allocation {
            Allocation::Sequential => loop {
                let candidate = Handle(self.next);
                self.next += 1;
                if !self.by_handle.contains_key(&candidate) {
                    return candidate;
                }
            },
            Allocation::Random => {
                let mut rng = rand::thread_rng();
                loop {
                    let candidate = Handle(rng.gen_range(RANDOM_HANDLE_RANGE));
                    if !self.by_handle.contains_key(&candidate) {
                        return candidate;
                    }
                    tracing::trace!(handle = %candidate, "handle collision, retrying");
                }
            }
        }
    }

    fn bind(&mut self, handle: Handle, key: K) {
        self.by_handle.insert(handle, key);
        self.by_key.insert(key, handle);
    }

    pub fn resolve(&self, handle: Handle) -> Option<K> {
        self.by_handle.get(&handle).copied()
    }

    /// Reverse lookup: the handle registered for `key`
    pub fn handle_of(&self, key: K) -> Option<Handle> {
        self.by_key.get(&key).copied()
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.by_handle.contains_key(&handle)
    }

    /// Forget `handle`. The root handle cannot be released.
    pub fn release(&mut self, handle: Handle) -> Option<K> {
        if handle.is_root() {
            return None;
        }
        let key = self.by_handle.remove(&handle)?;
        self.by_key.remove(&key);
        Some(key)
    }

    /// Forget whatever handle is registered for `key`
    pub fn release_key(&mut self, key: K) -> Option<Handle> {
        let handle = self.handle_of(key)?;
        self.release(handle).map(|_| handle)
    }

    /// Number of registered handles, root included
    pub fn len(&self) -> usize {
        self.by_handle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_handle.is_empty()
    }

    pub fn handles(&self) -> impl Iterator<Item = Handle> + '_ {
        self.by_handle.keys().copied()
    }
}
