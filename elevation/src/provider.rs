//! Elevation data sources.

use crate::{geom, ElevationError};
use bilgrid::{BilReader, ElevationImage, GridBounds, SRTM_NO_DATA};
use geo::geometry::{Coord, Polygon, Rect};
use log::debug;
use std::sync::Arc;

/// Slack for point-in-region tests, in degrees.
const POSITION_TOLERANCE: f64 = 0.0;

/// One registered source of elevation data covering one or more
/// geographic regions.
pub trait ElevationProvider: Send + Sync {
    /// Identity used for priority lookup and to deduplicate
    /// registration.
    fn order_id(&self) -> &str;

    /// Coverage regions. Multiple entries let coverage split across
    /// the antimeridian.
    fn regions(&self) -> &[Polygon<f64>];

    /// Single rectangular coverage summary.
    fn bounding_box(&self) -> Rect<f64> {
        geom::regions_bounding_rect(self.regions())
            .unwrap_or_else(|| Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 0.0, y: 0.0 }))
    }

    /// Coordinate reference system label.
    fn crs(&self) -> &str;

    /// Sentinel meaning "no sample present here".
    fn missing_data_value(&self) -> f64;

    /// Minimum elevation delta considered significant; consumers use
    /// this to decide whether regenerating terrain detail is worth it.
    fn min_variance(&self) -> f64;

    /// Sampling density hint in meters. Negative when the source has
    /// no opinion.
    fn resolution_hint_m(&self) -> f64;

    /// Freeze terrain generated from this source permanently.
    fn petrifies_terrain(&self) -> bool;

    /// True when some coverage region contains `position`.
    fn provides_for(&self, position: Coord<f64>) -> bool {
        self.regions()
            .iter()
            .any(|region| geom::covers_coord(region, position, POSITION_TOLERANCE))
    }

    /// Elevation in meters at `position`.
    fn elevation_m(&self, position: Coord<f64>, approximate: bool) -> f64;
}

/// Provider backed by a raw BIL elevation grid.
pub struct GridProvider {
    order_id: String,
    crs: String,
    regions: Vec<Polygon<f64>>,
    bounds: GridBounds,
    image: Arc<dyn ElevationImage>,
    reader: BilReader,
    min_variance: f64,
    resolution_hint_m: f64,
    petrifies_terrain: bool,
}

impl GridProvider {
    pub fn builder() -> GridProviderBuilder {
        GridProviderBuilder {
            order_id: None,
            crs: "EPSG:4326".to_owned(),
            regions: None,
            bounds: None,
            image: None,
            missing_data_value: SRTM_NO_DATA,
            min_variance: 0.0,
            resolution_hint_m: -1.0,
            petrifies_terrain: false,
        }
    }
}

impl ElevationProvider for GridProvider {
    fn order_id(&self) -> &str {
        &self.order_id
    }

    fn regions(&self) -> &[Polygon<f64>] {
        &self.regions
    }

    fn bounding_box(&self) -> Rect<f64> {
        self.bounds.rect()
    }

    fn crs(&self) -> &str {
        &self.crs
    }

    fn missing_data_value(&self) -> f64 {
        self.reader.missing_data_value()
    }

    fn min_variance(&self) -> f64 {
        self.min_variance
    }

    fn resolution_hint_m(&self) -> f64 {
        self.resolution_hint_m
    }

    fn petrifies_terrain(&self) -> bool {
        self.petrifies_terrain
    }

    /// Reads through to the grid. Unreadable samples degrade to the
    /// missing-data value; resolution paths never fail.
    fn elevation_m(&self, position: Coord<f64>, approximate: bool) -> f64 {
        match self
            .reader
            .read_elevation(position, self.image.as_ref(), &self.bounds, approximate)
        {
            Ok(elevation) => elevation,
            Err(e) => {
                debug!(
                    "{}: unreadable sample at {}, {}: {e}",
                    self.order_id, position.x, position.y
                );
                self.reader.missing_data_value()
            }
        }
    }
}

pub struct GridProviderBuilder {
    order_id: Option<String>,
    crs: String,
    regions: Option<Vec<Polygon<f64>>>,
    bounds: Option<GridBounds>,
    image: Option<Arc<dyn ElevationImage>>,
    missing_data_value: f64,
    min_variance: f64,
    resolution_hint_m: f64,
    petrifies_terrain: bool,
}

impl GridProviderBuilder {
    pub fn order_id<S: Into<String>>(mut self, id: S) -> Self {
        self.order_id = Some(id.into());
        self
    }

    pub fn crs<S: Into<String>>(mut self, crs: S) -> Self {
        self.crs = crs.into();
        self
    }

    /// Explicit coverage regions. Defaults to the footprint rectangle.
    pub fn regions(mut self, regions: Vec<Polygon<f64>>) -> Self {
        self.regions = Some(regions);
        self
    }

    pub fn bounds(mut self, bounds: GridBounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn image(mut self, image: Arc<dyn ElevationImage>) -> Self {
        self.image = Some(image);
        self
    }

    pub fn missing_data_value(mut self, value: f64) -> Self {
        self.missing_data_value = value;
        self
    }

    pub fn min_variance(mut self, meters: f64) -> Self {
        self.min_variance = meters;
        self
    }

    pub fn resolution_hint(mut self, meters: f64) -> Self {
        self.resolution_hint_m = meters;
        self
    }

    pub fn petrify(mut self, petrify: bool) -> Self {
        self.petrifies_terrain = petrify;
        self
    }

    pub fn build(self) -> Result<GridProvider, ElevationError> {
        if let (Some(order_id), Some(bounds), Some(image)) =
            (self.order_id, self.bounds, self.image)
        {
            let regions = self
                .regions
                .unwrap_or_else(|| vec![bounds.rect().to_polygon()]);
            Ok(GridProvider {
                order_id,
                crs: self.crs,
                regions,
                bounds,
                image,
                reader: BilReader::new(self.missing_data_value),
                min_variance: self.min_variance,
                resolution_hint_m: self.resolution_hint_m,
                petrifies_terrain: self.petrifies_terrain,
            })
        } else {
            Err(ElevationError::Builder)
        }
    }
}
