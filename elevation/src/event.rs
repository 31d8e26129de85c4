//! Change notifications republished to subscribers.

use crate::ElevationProvider;
use geo::geometry::Polygon;
use std::{fmt, sync::Arc};

/// What changed about a set of providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderChange {
    Added,
    Removed,
    PriorityChanged,
    TerrainModified,
}

/// Immutable description of an elevation change.
///
/// Providers are never mutated in place; a modification is modeled as
/// one of these carrying the affected regions.
#[derive(Clone)]
pub struct ElevationChange {
    providers: Vec<Arc<dyn ElevationProvider>>,
    regions: Option<Vec<Polygon<f64>>>,
    change: ProviderChange,
}

impl ElevationChange {
    pub fn new(
        providers: Vec<Arc<dyn ElevationProvider>>,
        regions: Option<Vec<Polygon<f64>>>,
        change: ProviderChange,
    ) -> Self {
        Self {
            providers,
            regions,
            change,
        }
    }

    pub fn providers(&self) -> &[Arc<dyn ElevationProvider>] {
        &self.providers
    }

    pub fn change(&self) -> ProviderChange {
        self.change
    }

    /// Regions explicitly named by the change, if any.
    pub fn regions(&self) -> Option<&[Polygon<f64>]> {
        self.regions.as_deref()
    }

    /// Regions a consumer must redraw: the explicit regions when given,
    /// otherwise each changed provider's own coverage.
    pub fn affected_regions(&self) -> Vec<Polygon<f64>> {
        match &self.regions {
            Some(regions) => regions.clone(),
            None => self
                .providers
                .iter()
                .flat_map(|provider| provider.regions().iter().cloned())
                .collect(),
        }
    }
}

impl fmt::Debug for ElevationChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<&str> = self
            .providers
            .iter()
            .map(|provider| provider.order_id())
            .collect();
        f.debug_struct("ElevationChange")
            .field("providers", &ids)
            .field("regions", &self.regions.as_ref().map(Vec::len))
            .field("change", &self.change)
            .finish()
    }
}
