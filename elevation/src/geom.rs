//! Tolerance-aware geometry predicates over `geo` types.

use geo::{
    geometry::{Coord, Point, Polygon, Rect},
    BoundingRect, Contains, EuclideanDistance, Intersects,
};

/// True when `region` covers `coord`, with `tolerance` degrees of
/// slack.
pub(crate) fn covers_coord(region: &Polygon<f64>, coord: Coord<f64>, tolerance: f64) -> bool {
    let point = Point::from(coord);
    region.contains(&point) || (tolerance > 0.0 && region.euclidean_distance(&point) <= tolerance)
}

/// True when `outer` fully contains `inner`.
pub(crate) fn covers_polygon(outer: &Polygon<f64>, inner: &Polygon<f64>, tolerance: f64) -> bool {
    outer.contains(inner)
        || (tolerance > 0.0
            && inner
                .exterior()
                .points()
                .all(|point| covers_coord(outer, point.0, tolerance)))
}

/// True when `a` and `b` share any area, with `tolerance` degrees of
/// slack.
pub(crate) fn overlaps(a: &Polygon<f64>, b: &Polygon<f64>, tolerance: f64) -> bool {
    a.intersects(b) || (tolerance > 0.0 && a.euclidean_distance(b) <= tolerance)
}

/// Smallest rect covering both arguments.
pub(crate) fn merge_rects(a: Rect<f64>, b: Rect<f64>) -> Rect<f64> {
    Rect::new(
        Coord {
            x: a.min().x.min(b.min().x),
            y: a.min().y.min(b.min().y),
        },
        Coord {
            x: a.max().x.max(b.max().x),
            y: a.max().y.max(b.max().y),
        },
    )
}

/// Union bounding rect of `regions`, if any.
pub(crate) fn regions_bounding_rect(regions: &[Polygon<f64>]) -> Option<Rect<f64>> {
    let mut bounds: Option<Rect<f64>> = None;
    for region in regions {
        if let Some(rect) = region.bounding_rect() {
            bounds = Some(match bounds {
                None => rect,
                Some(acc) => merge_rects(acc, rect),
            });
        }
    }
    bounds
}

#[cfg(test)]
mod tests {
    use super::{covers_coord, covers_polygon, merge_rects, overlaps, regions_bounding_rect};
    use geo::{polygon, Coord};

    fn square(w: f64, s: f64, e: f64, n: f64) -> geo::Polygon<f64> {
        polygon![
            (x: w, y: s),
            (x: e, y: s),
            (x: e, y: n),
            (x: w, y: n),
            (x: w, y: s),
        ]
    }

    #[test]
    fn test_covers_coord() {
        let region = square(0.0, 0.0, 2.0, 2.0);
        assert!(covers_coord(&region, Coord { x: 1.0, y: 1.0 }, 0.0));
        assert!(!covers_coord(&region, Coord { x: 3.0, y: 1.0 }, 0.0));
        // Slack picks up a point just outside.
        assert!(covers_coord(&region, Coord { x: 2.05, y: 1.0 }, 0.1));
    }

    #[test]
    fn test_covers_polygon() {
        let outer = square(0.0, 0.0, 4.0, 4.0);
        let inner = square(1.0, 1.0, 2.0, 2.0);
        assert!(covers_polygon(&outer, &inner, 0.0));
        assert!(!covers_polygon(&inner, &outer, 0.0));
        // A polygon contains itself.
        assert!(covers_polygon(&outer, &outer, 0.0));
    }

    #[test]
    fn test_overlaps() {
        let a = square(0.0, 0.0, 2.0, 2.0);
        let b = square(1.0, 1.0, 3.0, 3.0);
        let c = square(5.0, 5.0, 6.0, 6.0);
        assert!(overlaps(&a, &b, 0.0));
        assert!(!overlaps(&a, &c, 0.0));
    }

    #[test]
    fn test_regions_bounding_rect() {
        let regions = vec![square(0.0, 0.0, 1.0, 1.0), square(3.0, 2.0, 4.0, 5.0)];
        let rect = regions_bounding_rect(&regions).unwrap();
        assert_eq!(rect.min(), Coord { x: 0.0, y: 0.0 });
        assert_eq!(rect.max(), Coord { x: 4.0, y: 5.0 });
        assert!(regions_bounding_rect(&[]).is_none());

        let merged = merge_rects(
            geo::Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 1.0 }),
            geo::Rect::new(Coord { x: -1.0, y: 0.5 }, Coord { x: 0.5, y: 2.0 }),
        );
        assert_eq!(merged.min(), Coord { x: -1.0, y: 0.0 });
        assert_eq!(merged.max(), Coord { x: 1.0, y: 2.0 });
    }
}
