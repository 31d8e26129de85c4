//! Externally-controlled provider ordering.
//!
//! The priority order itself lives outside this crate; the manager only
//! consults it and reacts to the change events the host forwards.

/// Priority order service.
///
/// Participants are identified by the same keys providers register
/// under. Index 0 of the participant list is the lowest priority; the
/// last entry is the highest.
pub trait OrderManager: Send + Sync {
    /// Currently active participant ids, lowest priority first.
    fn active_participants(&self) -> Vec<String>;

    /// True when `id` is active in this order.
    fn has_active_participant(&self, id: &str) -> bool {
        self.active_participants().iter().any(|key| key == id)
    }
}

/// What happened to a set of participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderChangeKind {
    Activated,
    Deactivated,
    Reordered,
}

/// A change to the participant order, forwarded by the host to
/// [`ElevationManager::order_changed`](crate::ElevationManager::order_changed).
#[derive(Debug, Clone)]
pub struct OrderEvent {
    kind: OrderChangeKind,
    keys: Vec<String>,
}

impl OrderEvent {
    pub fn new<I, S>(kind: OrderChangeKind, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind,
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn kind(&self) -> OrderChangeKind {
        self.kind
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}
