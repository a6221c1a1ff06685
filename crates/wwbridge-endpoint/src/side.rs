use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use wwbridge_frame::CorrelationId;

/// Which end of the bridge an endpoint is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// Owns the worker's lifecycle. Issues odd ids.
    Host,
    /// Runs inside the spawned context. Issues even ids.
    Worker,
}

impl Side {
    pub const fn as_str(self) -> &'static str {
        match self {
            Side::Host => "host",
            Side::Worker => "worker",
        }
    }

    /// The other end.
    pub const fn peer(self) -> Side {
        match self {
            Side::Host => Side::Worker,
            Side::Worker => Side::Host,
        }
    }

    /// Starting value of this side's id counter; ids issued are seed + 2n.
    pub const fn id_seed(self) -> CorrelationId {
        match self {
            Side::Host => 1,
            Side::Worker => 0,
        }
    }

    /// Returns true if `id` belongs to this side's id space.
    pub const fn issues(self, id: CorrelationId) -> bool {
        id % 2 == self.id_seed()
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-endpoint correlation id counter stepping by two.
///
/// The host and worker sequences never overlap, so ids never collide on the
/// wire even while both sides have calls outstanding.
#[derive(Debug)]
pub struct IdSequence {
    last: AtomicU64,
}

impl IdSequence {
    pub fn new(side: Side) -> Self {
        Self {
            last: AtomicU64::new(side.id_seed()),
        }
    }

    /// Allocate the next id.
    pub fn next_id(&self) -> CorrelationId {
        self.last.fetch_add(2, Ordering::Relaxed).wrapping_add(2)
    }

    /// Most recently allocated id (the seed before any call).
    pub fn last(&self) -> CorrelationId {
        self.last.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_issues_odd_ids_in_steps_of_two() {
        let ids = IdSequence::new(Side::Host);
        let issued: Vec<_> = (0..4).map(|_| ids.next_id()).collect();
        assert_eq!(issued, vec![3, 5, 7, 9]);
        assert!(issued.iter().all(|id| Side::Host.issues(*id)));
    }

    #[test]
    fn worker_issues_even_ids_in_steps_of_two() {
        let ids = IdSequence::new(Side::Worker);
        let issued: Vec<_> = (0..4).map(|_| ids.next_id()).collect();
        assert_eq!(issued, vec![2, 4, 6, 8]);
        assert!(issued.iter().all(|id| Side::Worker.issues(*id)));
        assert_eq!(ids.last(), 8);
    }

    #[test]
    fn peer_is_symmetric() {
        assert_eq!(Side::Host.peer(), Side::Worker);
        assert_eq!(Side::Worker.peer().peer(), Side::Worker);
        assert_eq!(Side::Worker.to_string(), "worker");
    }
}
