//! Layered elevation source resolution.
//!
//! Several independently-updating elevation sources (providers) may
//! cover the same region with different priorities and partial
//! coverage. [`ElevationManager`] holds the registered provider set,
//! consults an external [`OrderManager`] for priority, resolves which
//! provider answers a query, detects occlusion, and republishes change
//! notifications to subscribers from a dedicated thread.

mod error;
mod event;
mod geom;
mod manager;
mod notify;
mod order;
mod provider;

pub use crate::{
    error::ElevationError,
    event::{ElevationChange, ProviderChange},
    manager::ElevationManager,
    notify::{ElevationListener, ListenerHandle},
    order::{OrderChangeKind, OrderEvent, OrderManager},
    provider::{ElevationProvider, GridProvider, GridProviderBuilder},
};
