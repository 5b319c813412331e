//! Tuple-keyed connection cache with least-recently-used eviction
//!
//! Entries live in a slab. A doubly linked list threaded through the slab by
//! index keeps them in order of last use, bounded by two sentinel nodes at
//! fixed slots: [`OLDEST`] in front, [`YOUNGEST`] at the back. Touching an
//! entry moves it in front of `YOUNGEST`; garbage collection walks forward
//! from `OLDEST` and stops at the first entry that is still fresh.

use std::collections::HashMap;
use std::io;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use strata_sip_core::Tuple;
use tracing::{debug, warn};

use crate::error::{Error, Result};

const OLDEST: usize = 0;
const YOUNGEST: usize = 1;

/// Idle-time bounds and retry policy for a [`ConnectionMap`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionMapConfig {
    /// Connect attempts before [`ConnectionMap::get`] gives up
    pub max_attempts: usize,
    /// Idle threshold used to reclaim sockets when opening one fails
    pub min_last_used: Duration,
    /// Idle threshold for routine collection
    pub max_last_used: Duration,
}

impl Default for ConnectionMapConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_last_used: Duration::from_secs(1),
            max_last_used: Duration::from_secs(30 * 60),
        }
    }
}

impl ConnectionMapConfig {
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_min_last_used(mut self, idle: Duration) -> Self {
        self.min_last_used = idle;
        self
    }

    pub fn with_max_last_used(mut self, idle: Duration) -> Self {
        self.max_last_used = idle;
        self
    }
}

/// Opens outbound connections on behalf of [`ConnectionMap::get`]
pub trait Connector<C> {
    fn connect(&mut self, tuple: &Tuple) -> io::Result<C>;
}

impl<C, F> Connector<C> for F
where
    F: FnMut(&Tuple) -> io::Result<C>,
{
    fn connect(&mut self, tuple: &Tuple) -> io::Result<C> {
        self(tuple)
    }
}

#[derive(Debug)]
struct Entry<C> {
    tuple: Tuple,
    payload: C,
    last_used: Instant,
}

#[derive(Debug)]
struct Node<C> {
    prev: usize,
    next: usize,
    entry: Option<Entry<C>>,
}

/// LRU-ordered map from [`Tuple`] to a connection payload
#[derive(Debug)]
pub struct ConnectionMap<C> {
    config: ConnectionMapConfig,
    nodes: Vec<Node<C>>,
    free: Vec<usize>,
    index: HashMap<Tuple, usize>,
}

impl<C> ConnectionMap<C> {
    pub fn new(config: ConnectionMapConfig) -> Self {
        let nodes = vec![
            Node {
                prev: OLDEST,
                next: YOUNGEST,
                entry: None,
            },
            Node {
                prev: OLDEST,
                next: YOUNGEST,
                entry: None,
            },
        ];
        Self {
            config,
            nodes,
            free: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn config(&self) -> &ConnectionMapConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, tuple: &Tuple) -> bool {
        self.index.contains_key(tuple)
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        self.nodes[prev].next = next;
        self.nodes[next].prev = prev;
    }

    fn link_youngest(&mut self, idx: usize) {
        let last = self.nodes[YOUNGEST].prev;
        self.nodes[idx].prev = last;
        self.nodes[idx].next = YOUNGEST;
        self.nodes[last].next = idx;
        self.nodes[YOUNGEST].prev = idx;
    }

    fn entry_mut(&mut self, idx: usize) -> Option<&mut Entry<C>> {
        self.nodes.get_mut(idx).and_then(|n| n.entry.as_mut())
    }

    /// Inserts a connection as the most recently used one
    pub fn add(&mut self, tuple: Tuple, payload: C, now: Instant) -> Result<&mut C> {
        if self.index.contains_key(&tuple) {
            return Err(Error::DuplicateConnection(tuple));
        }
        let node = Node {
            prev: OLDEST,
            next: YOUNGEST,
            entry: Some(Entry {
                tuple,
                payload,
                last_used: now,
            }),
        };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        };
        self.link_youngest(idx);
        self.index.insert(tuple, idx);
        debug!(%tuple, connections = self.index.len(), "connection added");
        self.entry_mut(idx)
            .map(|e| &mut e.payload)
            .ok_or(Error::ConnectionFailed(tuple))
    }

    /// Looks up a connection without changing its age
    pub fn lookup(&self, tuple: &Tuple) -> Option<&C> {
        let idx = *self.index.get(tuple)?;
        self.nodes[idx].entry.as_ref().map(|e| &e.payload)
    }

    /// Marks a connection as used at `now`. Returns false if it is unknown.
    pub fn touch(&mut self, tuple: &Tuple, now: Instant) -> bool {
        let Some(&idx) = self.index.get(tuple) else {
            return false;
        };
        self.unlink(idx);
        self.link_youngest(idx);
        if let Some(entry) = self.entry_mut(idx) {
            entry.last_used = now;
        }
        true
    }

    /// Returns the connection for `tuple`, opening one through `connector`
    /// if there is none. When opening fails, connections idle for at least
    /// `min_last_used` are reclaimed and the attempt is repeated, up to
    /// `max_attempts` times in total.
    pub fn get(&mut self, tuple: &Tuple, now: Instant, connector: &mut impl Connector<C>) -> Option<&mut C> {
        if self.touch(tuple, now) {
            let idx = self.index[tuple];
            return self.entry_mut(idx).map(|e| &mut e.payload);
        }
        for attempt in 1..=self.config.max_attempts {
            match connector.connect(tuple) {
                Ok(payload) => return self.add(*tuple, payload, now).ok(),
                Err(e) => {
                    let reclaimed = self.gc(self.config.min_last_used, now);
                    warn!(
                        %tuple,
                        attempt,
                        reclaimed = reclaimed.len(),
                        error = %e,
                        "failed to open connection"
                    );
                }
            }
        }
        None
    }

    /// Removes every connection idle for at least `threshold`, oldest first,
    /// and hands them back to the caller.
    pub fn gc(&mut self, threshold: Duration, now: Instant) -> Vec<(Tuple, C)> {
        let mut removed = Vec::new();
        loop {
            let idx = self.nodes[OLDEST].next;
            if idx == YOUNGEST {
                break;
            }
            let idle = match &self.nodes[idx].entry {
                Some(entry) => now.saturating_duration_since(entry.last_used),
                None => break,
            };
            if idle < threshold {
                break;
            }
            if let Some(entry) = self.remove_node(idx) {
                removed.push((entry.tuple, entry.payload));
            }
        }
        if !removed.is_empty() {
            debug!(removed = removed.len(), remaining = self.index.len(), "connection gc");
        }
        removed
    }

    /// Removes a connection regardless of its age
    pub fn close(&mut self, tuple: &Tuple) -> Option<C> {
        let idx = *self.index.get(tuple)?;
        self.remove_node(idx).map(|e| e.payload)
    }

    fn remove_node(&mut self, idx: usize) -> Option<Entry<C>> {
        let entry = self.nodes[idx].entry.take()?;
        self.unlink(idx);
        self.index.remove(&entry.tuple);
        self.free.push(idx);
        Some(entry)
    }

    /// Tuples from least to most recently used
    pub fn tuples_by_age(&self) -> Vec<Tuple> {
        let mut tuples = Vec::with_capacity(self.index.len());
        let mut idx = self.nodes[OLDEST].next;
        while idx != YOUNGEST {
            if let Some(entry) = &self.nodes[idx].entry {
                tuples.push(entry.tuple);
            }
            idx = self.nodes[idx].next;
        }
        tuples
    }

    /// Removes and returns every connection
    pub fn clear(&mut self) -> Vec<(Tuple, C)> {
        let mut removed = Vec::with_capacity(self.index.len());
        while self.nodes[OLDEST].next != YOUNGEST {
            let idx = self.nodes[OLDEST].next;
            match self.remove_node(idx) {
                Some(entry) => removed.push((entry.tuple, entry.payload)),
                None => break,
            }
        }
        removed
    }
}
