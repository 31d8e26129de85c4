//! BIL elevation grid sampling.
//!
//! A BIL grid is a headerless row-major array of big-endian `i16`
//! elevation samples in meters, row 0 at the northern edge. Dimensions
//! and geographic footprint are supplied by the caller; nothing is
//! parsed from the data itself.
//!
//! # References
//!
//! 1. [BIL format description](https://desktop.arcgis.com/en/arcmap/latest/manage-data/raster-and-images/bil-bip-and-bsq-raster-files.htm)
//! 1. [SRTM Collection User Guide](https://lpdaac.usgs.gov/documents/179/SRTM_User_Guide_V3.pdf)

mod error;
mod image;

pub use crate::{
    error::BilError,
    image::{ElevationImage, MappedImage, MemoryImage, SampleStream},
};
use byteorder::{BigEndian as BE, ReadBytesExt};
use geo::geometry::{Coord, Rect};
use log::warn;
use std::{
    io::SeekFrom,
    sync::atomic::{AtomicBool, Ordering},
};

/// Size of one sample on the wire.
pub const BYTES_PER_PIXEL: usize = 2;

/// Reported name of the format this crate decodes.
pub const FORMAT_NAME: &str = "bil";

/// The no-data sentinel conventionally used by SRTM distributions.
pub const SRTM_NO_DATA: f64 = -32768.0;

/// Slack when deciding whether a fractional pixel coordinate lands on
/// an integer pixel.
const PIXEL_TOLERANCE: f64 = 1e-6;

/// Set once a short read has been reported. Process-wide so one grid
/// whose stated dimensions disagree with its data does not flood the
/// log on every sample.
static SHORT_READ_WARNED: AtomicBool = AtomicBool::new(false);

/// Opposite neighbor pairs one ring out from the center of a 5×5
/// block, as `(dx, dy)` offsets.
const RING_ONE: [((i64, i64), (i64, i64)); 4] = [
    ((0, -1), (0, 1)),
    ((-1, 0), (1, 0)),
    ((-1, -1), (1, 1)),
    ((1, -1), (-1, 1)),
];

/// Opposite pairs two rings out.
const RING_TWO: [((i64, i64), (i64, i64)); 8] = [
    ((0, -2), (0, 2)),
    ((-2, 0), (2, 0)),
    ((-2, -2), (2, 2)),
    ((2, -2), (-2, 2)),
    ((-1, -2), (1, 2)),
    ((1, -2), (-1, 2)),
    ((-2, -1), (2, 1)),
    ((2, -1), (-2, 1)),
];

/// Geographic footprint of a grid.
///
/// The western/southern corner maps to the first column of the last
/// row; the eastern/northern corner to the last column of row 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridBounds {
    rect: Rect<f64>,
}

impl GridBounds {
    pub fn new(sw: Coord<f64>, ne: Coord<f64>) -> Self {
        Self {
            rect: Rect::new(sw, ne),
        }
    }

    pub fn rect(&self) -> Rect<f64> {
        self.rect
    }

    /// Containment test, inclusive of the edges.
    pub fn contains(&self, coord: Coord<f64>) -> bool {
        let (min, max) = (self.rect.min(), self.rect.max());
        coord.x >= min.x && coord.x <= max.x && coord.y >= min.y && coord.y <= max.y
    }

    /// West→east and south→north fractional position of `coord` within
    /// this footprint.
    pub fn offset_percent(&self, coord: Coord<f64>) -> (f64, f64) {
        let min = self.rect.min();
        (
            (coord.x - min.x) / self.rect.width(),
            (coord.y - min.y) / self.rect.height(),
        )
    }
}

/// Samples and interpolates elevations from a raw BIL grid.
///
/// The reader holds no grid state; every sample seeks and reads against
/// the image's live stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BilReader {
    missing_data_value: f64,
}

impl BilReader {
    pub fn new(missing_data_value: f64) -> Self {
        Self { missing_data_value }
    }

    /// The sentinel this reader treats as "no sample here".
    pub fn missing_data_value(&self) -> f64 {
        self.missing_data_value
    }

    pub fn format_name(&self) -> &'static str {
        FORMAT_NAME
    }

    /// Returns the elevation in meters at `position`.
    ///
    /// Positions between pixel centers are interpolated from the two or
    /// four surrounding samples. When the result is the missing-data
    /// sentinel and `approximate` is set, a neighborhood estimate is
    /// attempted instead.
    ///
    /// Fails when `position` lies outside `bounds` or the image cannot
    /// supply a stream.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn read_elevation(
        &self,
        position: Coord<f64>,
        image: &dyn ElevationImage,
        bounds: &GridBounds,
        approximate: bool,
    ) -> Result<f64, BilError> {
        if !bounds.contains(position) {
            return Err(BilError::OutOfBounds {
                x: position.x,
                y: position.y,
            });
        }

        let mut stream = image.stream()?;
        let (width, height) = (image.width(), image.height());
        let (x_pct, y_pct) = bounds.offset_percent(position);
        let x = (width - 1) as f64 * x_pct;
        // Row 0 is the northern edge.
        let y = (height - 1) as f64 * (1.0 - y_pct);

        let on_x = on_pixel(x);
        let on_y = on_pixel(y);

        let value = if on_x && on_y {
            self.sample(&mut *stream, width, height, x.round() as i64, y.round() as i64)?
        } else if on_x {
            let col = x.round() as i64;
            let row = y.floor();
            let north = self.sample(&mut *stream, width, height, col, row as i64)?;
            let south = self.sample(&mut *stream, width, height, col, row as i64 + 1)?;
            self.interpolate(y - row, north, south)
        } else if on_y {
            let row = y.round() as i64;
            let col = x.floor();
            let west = self.sample(&mut *stream, width, height, col as i64, row)?;
            let east = self.sample(&mut *stream, width, height, col as i64 + 1, row)?;
            self.interpolate(x - col, west, east)
        } else {
            let col = x.floor();
            let row = y.floor();
            let (c, r) = (col as i64, row as i64);
            let north = self.interpolate(
                x - col,
                self.sample(&mut *stream, width, height, c, r)?,
                self.sample(&mut *stream, width, height, c + 1, r)?,
            );
            let south = self.interpolate(
                x - col,
                self.sample(&mut *stream, width, height, c, r + 1)?,
                self.sample(&mut *stream, width, height, c + 1, r + 1)?,
            );
            self.interpolate(y - row, north, south)
        };

        if approximate && self.is_missing(value) {
            return self.approximate(
                &mut *stream,
                width,
                height,
                x.round() as i64,
                y.round() as i64,
            );
        }
        Ok(value)
    }
}

/// Private API.
impl BilReader {
    /// Reads the sample at `(col, row)`, seeking the stream to the
    /// sample's byte offset. Coordinates outside the grid are missing
    /// data. A stream shorter than the stated dimensions degrades to
    /// zero-filled bytes with a one-time warning.
    #[allow(clippy::cast_sign_loss)]
    fn sample(
        &self,
        stream: &mut dyn SampleStream,
        width: usize,
        height: usize,
        col: i64,
        row: i64,
    ) -> Result<f64, BilError> {
        if col < 0 || row < 0 || col >= width as i64 || row >= height as i64 {
            return Ok(self.missing_data_value);
        }
        let offset = (row as u64 * width as u64 + col as u64) * BYTES_PER_PIXEL as u64;
        stream.seek(SeekFrom::Start(offset))?;

        let mut raw = [0u8; BYTES_PER_PIXEL];
        let mut filled = 0;
        while filled < raw.len() {
            let count = stream.read(&mut raw[filled..])?;
            if count == 0 {
                break;
            }
            filled += count;
        }
        if filled < raw.len() && !SHORT_READ_WARNED.swap(true, Ordering::Relaxed) {
            warn!(
                "grid read at {col}, {row} produced {filled} of {BYTES_PER_PIXEL} bytes; \
                 stated dimensions likely disagree with the data (reported once)"
            );
        }
        Ok(f64::from((&mut &raw[..]).read_i16::<BE>()?))
    }

    /// Linear interpolation honoring the missing-data sentinel: a
    /// missing endpoint passes the other endpoint through unchanged.
    fn interpolate(&self, pct: f64, a: f64, b: f64) -> f64 {
        if self.is_missing(a) {
            b
        } else if self.is_missing(b) {
            a
        } else {
            a + (b - a) * pct
        }
    }

    /// Estimates a missing sample from the 5×5 block centered on the
    /// nearest pixel. Opposite neighbor pairs one ring out are each
    /// averaged and the valid averages combined; when that is still
    /// missing the same is done with the pairs two rings out.
    fn approximate(
        &self,
        stream: &mut dyn SampleStream,
        width: usize,
        height: usize,
        col: i64,
        row: i64,
    ) -> Result<f64, BilError> {
        let mut block = [[0f64; 5]; 5];
        for dy in -2..=2i64 {
            for dx in -2..=2i64 {
                block[(dy + 2) as usize][(dx + 2) as usize] =
                    self.sample(stream, width, height, col + dx, row + dy)?;
            }
        }

        let near = self.ring_estimate(&block, &RING_ONE);
        if !self.is_missing(near) {
            return Ok(near);
        }
        Ok(self.ring_estimate(&block, &RING_TWO))
    }

    fn ring_estimate(&self, block: &[[f64; 5]; 5], pairs: &[((i64, i64), (i64, i64))]) -> f64 {
        let mut sum = 0.0;
        let mut valid = 0u32;
        for ((ax, ay), (bx, by)) in pairs {
            let a = block[(ay + 2) as usize][(ax + 2) as usize];
            let b = block[(by + 2) as usize][(bx + 2) as usize];
            let mid = self.interpolate(0.5, a, b);
            if !self.is_missing(mid) {
                sum += mid;
                valid += 1;
            }
        }
        if valid == 0 {
            self.missing_data_value
        } else {
            sum / f64::from(valid)
        }
    }

    #[allow(clippy::float_cmp)]
    fn is_missing(&self, value: f64) -> bool {
        value == self.missing_data_value
    }
}

fn on_pixel(value: f64) -> bool {
    (value - value.round()).abs() < PIXEL_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::{
        BilError, BilReader, GridBounds, MappedImage, MemoryImage, BYTES_PER_PIXEL, SRTM_NO_DATA,
    };
    use approx::assert_relative_eq;
    use geo::geometry::Coord;
    use std::io::Write;

    const MISSING: i16 = -32768;

    fn image(width: usize, height: usize, samples: &[i16]) -> MemoryImage {
        MemoryImage::new(raw(samples), width, height)
    }

    fn raw(samples: &[i16]) -> Vec<u8> {
        let mut data = Vec::with_capacity(samples.len() * BYTES_PER_PIXEL);
        for sample in samples {
            data.extend_from_slice(&sample.to_be_bytes());
        }
        data
    }

    fn bounds(east: f64, north: f64) -> GridBounds {
        GridBounds::new(Coord { x: 0.0, y: 0.0 }, Coord { x: east, y: north })
    }

    fn reader() -> BilReader {
        BilReader::new(SRTM_NO_DATA)
    }

    #[test]
    fn test_interpolate_endpoints() {
        let reader = reader();
        assert_relative_eq!(reader.interpolate(0.0, 3.0, 9.0), 3.0);
        assert_relative_eq!(reader.interpolate(1.0, 3.0, 9.0), 9.0);
        assert_relative_eq!(reader.interpolate(0.25, 4.0, 8.0), 5.0);
    }

    #[test]
    fn test_interpolate_missing_passes_through() {
        let reader = reader();
        assert_relative_eq!(reader.interpolate(0.7, SRTM_NO_DATA, 9.0), 9.0);
        assert_relative_eq!(reader.interpolate(0.7, 3.0, SRTM_NO_DATA), 3.0);
        assert_relative_eq!(
            reader.interpolate(0.7, SRTM_NO_DATA, SRTM_NO_DATA),
            SRTM_NO_DATA
        );
    }

    #[test]
    fn test_exact_pixel_matches_direct_decode() {
        // 3×2 grid; position maps to pixel (2, 0).
        let image = image(3, 2, &[1, 2, 3, 4, 5, 6]);
        let bounds = bounds(2.0, 1.0);
        let elevation = reader()
            .read_elevation(Coord { x: 2.0, y: 1.0 }, &image, &bounds, false)
            .unwrap();

        let data = raw(&[1, 2, 3, 4, 5, 6]);
        let offset = 2 * BYTES_PER_PIXEL;
        let direct = i16::from_be_bytes([data[offset], data[offset + 1]]);
        assert_relative_eq!(elevation, f64::from(direct));
        assert_relative_eq!(elevation, 3.0);
    }

    #[test]
    fn test_vertical_interpolation() {
        // On-column position halfway between rows 1 and 2.
        let image = image(2, 3, &[10, 20, 30, 40, 50, 60]);
        let bounds = bounds(1.0, 2.0);
        let elevation = reader()
            .read_elevation(Coord { x: 0.0, y: 0.5 }, &image, &bounds, false)
            .unwrap();
        assert_relative_eq!(elevation, 40.0);
    }

    #[test]
    fn test_horizontal_interpolation() {
        // On-row position halfway between columns 0 and 1 of row 0.
        let image = image(2, 3, &[10, 20, 30, 40, 50, 60]);
        let bounds = bounds(1.0, 2.0);
        let elevation = reader()
            .read_elevation(Coord { x: 0.5, y: 2.0 }, &image, &bounds, false)
            .unwrap();
        assert_relative_eq!(elevation, 15.0);
    }

    #[test]
    fn test_bilinear_interpolation() {
        let image = image(2, 2, &[10, 20, 30, 40]);
        let bounds = bounds(1.0, 1.0);
        let elevation = reader()
            .read_elevation(Coord { x: 0.5, y: 0.5 }, &image, &bounds, false)
            .unwrap();
        assert_relative_eq!(elevation, 25.0);
    }

    #[test]
    fn test_bilinear_with_missing_corners() {
        // Missing endpoints pass the valid endpoint through each row,
        // then the rows blend: (10, 20) at pct 0.5 = 15.
        let image = image(2, 2, &[10, MISSING, MISSING, 20]);
        let bounds = bounds(1.0, 1.0);
        let center = Coord { x: 0.5, y: 0.5 };

        let exact = reader()
            .read_elevation(center, &image, &bounds, false)
            .unwrap();
        assert_relative_eq!(exact, 15.0);

        // Not missing, so the approximate fallback must not kick in.
        let approximate = reader()
            .read_elevation(center, &image, &bounds, true)
            .unwrap();
        assert_relative_eq!(approximate, 15.0);
    }

    #[test]
    fn test_all_missing_without_approximation() {
        let image = image(2, 2, &[MISSING, MISSING, MISSING, MISSING]);
        let bounds = bounds(1.0, 1.0);
        let elevation = reader()
            .read_elevation(Coord { x: 0.5, y: 0.5 }, &image, &bounds, false)
            .unwrap();
        assert_relative_eq!(elevation, SRTM_NO_DATA);
    }

    #[test]
    fn test_all_missing_with_approximation_stays_missing() {
        let image = image(2, 2, &[MISSING, MISSING, MISSING, MISSING]);
        let bounds = bounds(1.0, 1.0);
        let elevation = reader()
            .read_elevation(Coord { x: 0.5, y: 0.5 }, &image, &bounds, true)
            .unwrap();
        assert_relative_eq!(elevation, SRTM_NO_DATA);
    }

    #[test]
    fn test_approximation_prefers_near_ring() {
        // Center of a 5×5 grid is missing; the north/south neighbor
        // pair averages to 150.
        let mut samples = [MISSING; 25];
        samples[7] = 100; // (col 2, row 1)
        samples[17] = 200; // (col 2, row 3)
        let image = image(5, 5, &samples);
        let bounds = bounds(1.0, 1.0);
        let elevation = reader()
            .read_elevation(Coord { x: 0.5, y: 0.5 }, &image, &bounds, true)
            .unwrap();
        assert_relative_eq!(elevation, 150.0);
    }

    #[test]
    fn test_approximation_falls_back_to_far_ring() {
        // Near ring entirely missing; west/east pair two rings out
        // midpoints to 100.
        let mut samples = [MISSING; 25];
        samples[10] = 80; // (col 0, row 2)
        samples[14] = 120; // (col 4, row 2)
        let image = image(5, 5, &samples);
        let bounds = bounds(1.0, 1.0);
        let elevation = reader()
            .read_elevation(Coord { x: 0.5, y: 0.5 }, &image, &bounds, true)
            .unwrap();
        assert_relative_eq!(elevation, 100.0);
    }

    #[test]
    fn test_approximation_averages_partial_far_pairs() {
        // A half-missing pair passes its valid endpoint through, so the
        // far ring averages (80..120 midpoint, 50) to 75.
        let mut samples = [MISSING; 25];
        samples[10] = 80; // (col 0, row 2)
        samples[14] = 120; // (col 4, row 2)
        samples[2] = 50; // (col 2, row 0); opposite (col 2, row 4) missing
        let image = image(5, 5, &samples);
        let bounds = bounds(1.0, 1.0);
        let elevation = reader()
            .read_elevation(Coord { x: 0.5, y: 0.5 }, &image, &bounds, true)
            .unwrap();
        assert_relative_eq!(elevation, 75.0);
    }

    #[test]
    fn test_out_of_bounds_position() {
        let image = image(2, 2, &[10, 20, 30, 40]);
        let bounds = bounds(1.0, 1.0);
        let result = reader().read_elevation(Coord { x: 2.0, y: 0.5 }, &image, &bounds, false);
        assert!(matches!(result, Err(BilError::OutOfBounds { .. })));
    }

    #[test]
    fn test_short_data_degrades_to_zero() {
        // Stated 2×2 but only 3 samples present; the missing sample
        // decodes as zero-filled bytes rather than failing the query.
        let image = MemoryImage::new(raw(&[7, 8, 9]), 2, 2);
        let bounds = bounds(1.0, 1.0);
        let elevation = reader()
            .read_elevation(Coord { x: 1.0, y: 0.0 }, &image, &bounds, false)
            .unwrap();
        assert_relative_eq!(elevation, 0.0);
    }

    #[test]
    fn test_mapped_image_checks_length() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&raw(&[1, 2, 3, 4])).unwrap();
        file.flush().unwrap();

        assert!(MappedImage::open(file.path(), 2, 2).is_ok());
        assert!(matches!(
            MappedImage::open(file.path(), 3, 3),
            Err(BilError::GridLen { .. })
        ));
    }

    #[test]
    fn test_mapped_image_read() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&raw(&[1, 2, 3, 4])).unwrap();
        file.flush().unwrap();

        let image = MappedImage::open(file.path(), 2, 2).unwrap();
        let bounds = bounds(1.0, 1.0);
        let elevation = reader()
            .read_elevation(Coord { x: 1.0, y: 0.0 }, &image, &bounds, false)
            .unwrap();
        assert_relative_eq!(elevation, 4.0);
    }
}
