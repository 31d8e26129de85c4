//! Provider registry and priority resolution.

use crate::{
    geom,
    notify::Notifier,
    ElevationChange, ElevationListener, ElevationProvider, ListenerHandle, OrderChangeKind,
    OrderEvent, OrderManager, ProviderChange,
};
use geo::geometry::{Coord, Polygon, Rect};
use log::{debug, error, warn};
use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

/// Elevation reported when no provider covers a position. A hard
/// default, not any provider's missing-data sentinel.
const NO_COVERAGE_M: f64 = 0.0;

/// Hint reported when no overlapping provider offers one.
const NO_RESOLUTION_HINT: f64 = -1.0;

/// Holds the registered provider set, resolves which provider answers
/// a query by consulting the [`OrderManager`]'s priority order, and
/// republishes change notifications.
///
/// Providers registered before their participant activates are skipped
/// by queries until activation; active participants with no registered
/// provider are skipped defensively.
pub struct ElevationManager {
    /// Registered providers keyed by order id. Queries take the read
    /// lock; registration and deregistration take the write lock.
    providers: RwLock<HashMap<String, Arc<dyn ElevationProvider>>>,

    /// Priority order service. Swappable at runtime, which is legal
    /// but unusual.
    order: RwLock<Option<Arc<dyn OrderManager>>>,

    notifier: Notifier,
}

impl ElevationManager {
    pub fn new() -> Self {
        Self {
            providers: RwLock::new(HashMap::new()),
            order: RwLock::new(None),
            notifier: Notifier::new(),
        }
    }

    /// Installs the priority order service every query consults.
    pub fn use_order_manager(&self, order: Arc<dyn OrderManager>) {
        let mut slot = self.order.write().unwrap();
        if slot.is_some() {
            warn!("replacing an existing elevation order manager");
        }
        *slot = Some(order);
    }

    pub fn add_listener(&self, listener: Arc<dyn ElevationListener>) -> ListenerHandle {
        self.notifier.add(listener)
    }

    pub fn remove_listener(&self, handle: ListenerHandle) {
        self.notifier.remove(handle)
    }

    /// Registers `provider` under its order id; a later registration
    /// with the same id replaces the earlier one.
    ///
    /// At most one registered provider may petrify terrain. A second
    /// petrifying provider is rejected and logged, not applied.
    pub fn register_provider(&self, provider: Arc<dyn ElevationProvider>) {
        let id = provider.order_id().to_owned();
        {
            let mut providers = self.providers.write().unwrap();
            if provider.petrifies_terrain()
                && providers
                    .iter()
                    .any(|(key, other)| *key != id && other.petrifies_terrain())
            {
                error!(
                    "rejecting elevation provider {id}: \
                     a petrifying provider is already registered"
                );
                return;
            }
            providers.insert(id.clone(), Arc::clone(&provider));
        }
        // Announce immediately only when the participant is already
        // active; otherwise the activation order event announces it.
        if self.is_active(&id) {
            self.publish(vec![provider], None, ProviderChange::Added);
        } else {
            debug!("provider {id} registered before activation; announcement deferred");
        }
    }

    /// Removes `provider` and announces the removal whether or not the
    /// participant is active.
    pub fn deregister_provider(&self, provider: &Arc<dyn ElevationProvider>) {
        self.providers.write().unwrap().remove(provider.order_id());
        self.publish(vec![Arc::clone(provider)], None, ProviderChange::Removed);
    }

    /// Elevation in meters at `position` from the highest-priority
    /// covering provider, or 0 m when nothing covers it.
    pub fn elevation_m(&self, position: Coord<f64>, approximate: bool) -> f64 {
        match self.provider_for(position) {
            Some(provider) => provider.elevation_m(position, approximate),
            None => NO_COVERAGE_M,
        }
    }

    /// The highest-priority provider covering `position`.
    pub fn provider_for(&self, position: Coord<f64>) -> Option<Arc<dyn ElevationProvider>> {
        self.resolve(|provider| provider.provides_for(position))
    }

    /// Minimum of the resolution hints of providers overlapping
    /// `region`, skipping providers hidden entirely behind
    /// higher-priority coverage and providers with no hint. -1 when no
    /// hint (or no order manager) is available.
    pub fn highest_overlapping_resolution(&self, region: &Polygon<f64>) -> f64 {
        let Some(order) = self.order() else {
            return NO_RESOLUTION_HINT;
        };
        let keys = order.active_participants();
        let providers = self.providers.read().unwrap();

        let mut best = NO_RESOLUTION_HINT;
        let mut higher: Vec<Arc<dyn ElevationProvider>> = Vec::new();
        for key in keys.iter().rev() {
            let Some(provider) = providers.get(key) else {
                continue;
            };
            if provider
                .regions()
                .iter()
                .any(|r| geom::overlaps(r, region, 0.0))
                && !is_occluded_by(provider.as_ref(), &higher)
            {
                let hint = provider.resolution_hint_m();
                if hint >= 0.0 && (best < 0.0 || hint < best) {
                    best = hint;
                }
            }
            higher.push(Arc::clone(provider));
        }
        best
    }

    /// Minimum significant elevation delta for `region`, from the
    /// highest-priority provider overlapping it; 0 when none does.
    ///
    /// Unlike [`highest_overlapping_resolution`](Self::highest_overlapping_resolution)
    /// no occlusion test is applied here.
    pub fn min_variance(&self, region: &Polygon<f64>) -> f64 {
        self.resolve(|provider| {
            provider
                .regions()
                .iter()
                .any(|r| geom::overlaps(r, region, 0.0))
        })
        .map_or(0.0, |provider| provider.min_variance())
    }

    /// Bounding box of the petrifying provider, unless higher-priority
    /// coverage hides it entirely.
    pub fn petrified_bounds(&self) -> Option<Rect<f64>> {
        let order = self.order()?;
        let keys = order.active_participants();
        let providers = self.providers.read().unwrap();

        let mut higher: Vec<Arc<dyn ElevationProvider>> = Vec::new();
        for key in keys.iter().rev() {
            let Some(provider) = providers.get(key) else {
                continue;
            };
            if provider.petrifies_terrain() {
                // At most one petrifying provider can be registered,
                // so the scan ends here either way.
                if is_occluded_by(provider.as_ref(), &higher) {
                    return None;
                }
                return Some(provider.bounding_box());
            }
            higher.push(Arc::clone(provider));
        }
        None
    }

    /// True when a provider with strictly higher priority than
    /// `provider` has a region fully containing `region`.
    pub fn is_occluded(&self, provider: &dyn ElevationProvider, region: &Polygon<f64>) -> bool {
        let Some(order) = self.order() else {
            return false;
        };
        let keys = order.active_participants();
        let providers = self.providers.read().unwrap();

        for key in keys.iter().rev() {
            if key == provider.order_id() {
                break;
            }
            let Some(candidate) = providers.get(key) else {
                continue;
            };
            if candidate
                .regions()
                .iter()
                .any(|r| geom::covers_polygon(r, region, 0.0))
            {
                return true;
            }
        }
        false
    }

    /// Announces that terrain supplied by `provider` changed within
    /// `regions`, or within all of its coverage when `None`.
    pub fn notify_elevations_modified(
        &self,
        provider: &Arc<dyn ElevationProvider>,
        regions: Option<Vec<Polygon<f64>>>,
    ) {
        self.publish(
            vec![Arc::clone(provider)],
            regions,
            ProviderChange::TerrainModified,
        );
    }

    /// Reacts to a participant order change. Keys with a registered
    /// provider are republished as the matching elevation change; keys
    /// without one are skipped.
    pub fn order_changed(&self, event: &OrderEvent) {
        let changed: Vec<Arc<dyn ElevationProvider>> = {
            let providers = self.providers.read().unwrap();
            event
                .keys()
                .iter()
                .filter_map(|key| providers.get(key).cloned())
                .collect()
        };
        if changed.is_empty() {
            return;
        }
        let change = match event.kind() {
            OrderChangeKind::Activated => ProviderChange::Added,
            OrderChangeKind::Deactivated => ProviderChange::Removed,
            OrderChangeKind::Reordered => ProviderChange::PriorityChanged,
        };
        self.publish(changed, None, change);
    }
}

impl Default for ElevationManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Private API.
impl ElevationManager {
    fn order(&self) -> Option<Arc<dyn OrderManager>> {
        self.order.read().unwrap().clone()
    }

    fn is_active(&self, id: &str) -> bool {
        match self.order() {
            Some(order) => order.has_active_participant(id),
            None => false,
        }
    }

    /// Walks active participants from highest priority to lowest and
    /// returns the first registered provider matching `test`.
    fn resolve<F>(&self, test: F) -> Option<Arc<dyn ElevationProvider>>
    where
        F: Fn(&dyn ElevationProvider) -> bool,
    {
        let order = self.order()?;
        let keys = order.active_participants();
        let providers = self.providers.read().unwrap();
        for key in keys.iter().rev() {
            if let Some(provider) = providers.get(key) {
                if test(provider.as_ref()) {
                    return Some(Arc::clone(provider));
                }
            }
        }
        None
    }

    fn publish(
        &self,
        providers: Vec<Arc<dyn ElevationProvider>>,
        regions: Option<Vec<Polygon<f64>>>,
        change: ProviderChange,
    ) {
        self.notifier
            .publish(ElevationChange::new(providers, regions, change));
    }
}

/// True when every coverage region of `provider` sits entirely inside
/// the bounding box of some single member of `higher`. Vacuously true
/// for a provider with no regions. Combinations of higher providers
/// jointly covering a region are not considered.
fn is_occluded_by(provider: &dyn ElevationProvider, higher: &[Arc<dyn ElevationProvider>]) -> bool {
    provider.regions().iter().all(|region| {
        higher
            .iter()
            .any(|h| geom::covers_polygon(&h.bounding_box().to_polygon(), region, 0.0))
    })
}
