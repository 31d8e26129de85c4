use bilgrid::{GridBounds, MemoryImage};
use criterion::{criterion_group, criterion_main, Criterion};
use elevation::{ElevationManager, ElevationProvider, GridProvider, OrderManager};
use geo::{geometry::Coord, polygon, Polygon};
use std::sync::Arc;

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

struct BenchProvider {
    id: String,
    regions: Vec<Polygon<f64>>,
    elevation: f64,
}

impl ElevationProvider for BenchProvider {
    fn order_id(&self) -> &str {
        &self.id
    }

    fn regions(&self) -> &[Polygon<f64>] {
        &self.regions
    }

    fn crs(&self) -> &str {
        "EPSG:4326"
    }

    fn missing_data_value(&self) -> f64 {
        -32768.0
    }

    fn min_variance(&self) -> f64 {
        0.0
    }

    fn resolution_hint_m(&self) -> f64 {
        -1.0
    }

    fn petrifies_terrain(&self) -> bool {
        false
    }

    fn elevation_m(&self, _position: Coord<f64>, _approximate: bool) -> f64 {
        self.elevation
    }
}

struct BenchOrder(Vec<String>);

impl OrderManager for BenchOrder {
    fn active_participants(&self) -> Vec<String> {
        self.0.clone()
    }
}

fn square(size: f64) -> Polygon<f64> {
    polygon![
        (x: 0.0, y: 0.0),
        (x: size, y: 0.0),
        (x: size, y: size),
        (x: 0.0, y: size),
        (x: 0.0, y: 0.0),
    ]
}

fn provider_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("Provider Resolution");

    let manager = ElevationManager::new();
    let keys: Vec<String> = (0..64).map(|i| format!("layer-{i}")).collect();
    for (i, key) in keys.iter().enumerate() {
        // Shrinking stacked footprints, highest priority last.
        let size = 64.0 - i as f64;
        manager.register_provider(Arc::new(BenchProvider {
            id: key.clone(),
            regions: vec![square(size)],
            elevation: i as f64,
        }));
    }
    manager.use_order_manager(Arc::new(BenchOrder(keys)));

    let position = Coord { x: 0.25, y: 0.25 };
    group.bench_function("stacked", |b| {
        b.iter(|| manager.elevation_m(position, false))
    });
}

fn grid_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("Grid Read");

    let (width, height) = (1201, 1201);
    let image = Arc::new(MemoryImage::new(
        vec![0u8; width * height * bilgrid::BYTES_PER_PIXEL],
        width,
        height,
    ));
    let provider = GridProvider::builder()
        .order_id("bench")
        .bounds(GridBounds::new(
            Coord { x: 0.0, y: 0.0 },
            Coord { x: 1.0, y: 1.0 },
        ))
        .image(image)
        .build()
        .unwrap();

    let position = Coord {
        x: 0.333_33,
        y: 0.666_67,
    };
    group.bench_function("bilinear", |b| {
        b.iter(|| provider.elevation_m(position, false))
    });
}

criterion_group!(benches, provider_resolution, grid_read);
criterion_main!(benches);
