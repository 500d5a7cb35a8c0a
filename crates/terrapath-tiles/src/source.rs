//! Network tile retrieval and the decoded raster atlas.
//!
//! A [`TileSource`] owns a URL template, a payload codec, and the atlas of
//! rasters decoded so far. Bulk loads drain a shared queue on a bounded
//! worker pool; a tile that fails to fetch or decode is logged and left
//! absent, and the router later treats the hole as ground it cannot cross.
//!
//! Two payload encodings are supported:
//! - PNG tiles with the scalar packed into the RGB channels, decoded with a
//!   [`RgbCalibration`] (base + 24-bit value * step)
//! - HF2 heightfields, optionally gzip-wrapped on the wire ("HFZ")
//!
//! Both produce the same atlas shape: one `f32` per pixel, 256x256 per tile,
//! rows top to bottom.

use std::collections::{HashMap, HashSet, VecDeque};
use std::io::Read;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Instant;

use flate2::read::GzDecoder;
use log::{debug, info, warn};

use crate::{Result, Tile, TileError, TILE_SAMPLES, TILE_SIZE};

/// Default number of concurrent tile fetches in a bulk load.
pub const DEFAULT_POOL_SIZE: usize = 16;

/// HTTP timeout for a single tile fetch.
const FETCH_TIMEOUT_SECS: u64 = 60;

/// Calibration constants for RGB-encoded scalar tiles.
///
/// The 24-bit value `R*65536 + G*256 + B` maps to `base_m + value * step_m`.
/// Two encodings have been fielded; neither is hardcoded anywhere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RgbCalibration {
    /// Value of a zero pixel, in meters.
    pub base_m: f64,
    /// Meters per quantization step.
    pub step_m: f64,
}

impl RgbCalibration {
    /// Terrain-RGB: -10000 m base, 0.1 m steps.
    pub const TERRAIN_RGB: RgbCalibration = RgbCalibration {
        base_m: -10_000.0,
        step_m: 0.1,
    };

    /// 16.8 fixed-point meters: zero base, 1/256 m steps.
    pub const FIXED_16_8: RgbCalibration = RgbCalibration {
        base_m: 0.0,
        step_m: 1.0 / 256.0,
    };

    /// Decode one pixel to meters.
    pub fn decode(&self, r: u8, g: u8, b: u8) -> f32 {
        let quantized = (r as u32) * 65_536 + (g as u32) * 256 + (b as u32);
        (self.base_m + quantized as f64 * self.step_m) as f32
    }
}

impl Default for RgbCalibration {
    fn default() -> Self {
        RgbCalibration::TERRAIN_RGB
    }
}

/// Wire encoding of tile payloads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TileCodec {
    /// PNG with the scalar packed into the RGB channels.
    Rgb(RgbCalibration),
    /// HF2 heightfield, gzip-wrapped on the wire when `gzipped` is set.
    Hf2 {
        /// Whether payloads arrive gzip-compressed.
        gzipped: bool,
    },
}

impl TileCodec {
    /// Decode a raw payload into one tile worth of samples, top-down.
    ///
    /// Rasters that are not exactly 256x256 are rejected.
    pub fn decode(&self, bytes: &[u8]) -> Result<Vec<f32>> {
        match self {
            TileCodec::Rgb(calibration) => decode_rgb(bytes, *calibration),
            TileCodec::Hf2 { gzipped } => decode_hf2(bytes, *gzipped),
        }
    }
}

fn decode_rgb(bytes: &[u8], calibration: RgbCalibration) -> Result<Vec<f32>> {
    let rgb = image::load_from_memory(bytes)?.to_rgb8();
    let (width, height) = rgb.dimensions();
    if width != TILE_SIZE || height != TILE_SIZE {
        return Err(TileError::BadTileDimensions { width, height });
    }
    Ok(rgb
        .pixels()
        .map(|px| calibration.decode(px[0], px[1], px[2]))
        .collect())
}

fn decode_hf2(bytes: &[u8], gzipped: bool) -> Result<Vec<f32>> {
    let raster = if gzipped {
        let mut raw = Vec::new();
        GzDecoder::new(bytes).read_to_end(&mut raw)?;
        hf2_raster::decode(&raw)?
    } else {
        hf2_raster::decode(bytes)?
    };
    let (width, height) = (raster.header.width, raster.header.height);
    if width != TILE_SIZE || height != TILE_SIZE {
        return Err(TileError::BadTileDimensions { width, height });
    }
    Ok(raster.samples)
}

/// One decoded raster tile: a tile address plus 256x256 samples.
#[derive(Debug, Clone)]
pub struct TileRaster {
    tile: Tile,
    samples: Vec<f32>,
}

impl TileRaster {
    /// Bind a decoded sample grid to its tile address.
    ///
    /// `samples` must hold exactly one tile (65536 values, top-down rows).
    pub fn new(tile: Tile, samples: Vec<f32>) -> Result<Self> {
        if samples.len() != TILE_SAMPLES {
            return Err(TileError::InvalidRasterSize {
                expected: TILE_SAMPLES,
                got: samples.len(),
            });
        }
        Ok(Self { tile, samples })
    }

    /// Tile address this raster covers.
    pub fn tile(&self) -> Tile {
        self.tile
    }

    /// Sample at pixel (px, py), px east, py south from the tile's
    /// northwest corner.
    ///
    /// # Panics
    /// Panics if either coordinate is 256 or more.
    pub fn sample(&self, px: u32, py: u32) -> f32 {
        assert!(
            px < TILE_SIZE && py < TILE_SIZE,
            "pixel ({}, {}) outside tile",
            px,
            py
        );
        self.samples[(py * TILE_SIZE + px) as usize]
    }

    /// Raw samples, row-major top-down.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }
}

/// Decoded rasters keyed by packed tile key.
///
/// A missing entry means "no data here"; lookups never fail.
#[derive(Debug, Default)]
pub struct Atlas {
    rasters: HashMap<u64, TileRaster>,
}

impl Atlas {
    /// Create an empty atlas.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a raster, replacing any previous raster for the same tile.
    pub fn insert(&mut self, raster: TileRaster) {
        self.rasters.insert(raster.tile().key(), raster);
    }

    /// Look up the raster for a tile.
    pub fn raster(&self, tile: Tile) -> Option<&TileRaster> {
        self.rasters.get(&tile.key())
    }

    /// Whether a raster for this tile is resident.
    pub fn contains(&self, tile: Tile) -> bool {
        self.rasters.contains_key(&tile.key())
    }

    /// Number of resident rasters.
    pub fn len(&self) -> usize {
        self.rasters.len()
    }

    /// Whether the atlas holds no rasters.
    pub fn is_empty(&self) -> bool {
        self.rasters.is_empty()
    }

    /// Addresses of all resident tiles, in no particular order.
    pub fn tiles(&self) -> impl Iterator<Item = Tile> + '_ {
        self.rasters.keys().map(|&key| Tile::from_key(key))
    }
}

/// Transport abstraction: bytes for a URL.
///
/// Implementations must be callable from multiple worker threads at once.
pub trait TileFetcher: Send + Sync {
    /// Fetch the payload behind `url`.
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// HTTP(S) fetcher backed by a blocking client with a 60 s timeout.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    /// Build the fetcher and its HTTP client.
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }
}

impl TileFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send()?;
        if !response.status().is_success() {
            return Err(TileError::HttpStatus {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.bytes()?.to_vec())
    }
}

/// In-memory fetcher for tests and offline fixtures.
///
/// Serves payloads registered with [`MemoryFetcher::insert`]; any other URL
/// fails, which is how tests exercise the partial-failure path.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    payloads: HashMap<String, Vec<u8>>,
}

impl MemoryFetcher {
    /// Create an empty fetcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the payload served for `url`.
    pub fn insert(&mut self, url: impl Into<String>, bytes: Vec<u8>) {
        self.payloads.insert(url.into(), bytes);
    }
}

impl TileFetcher for MemoryFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.payloads
            .get(url)
            .cloned()
            .ok_or_else(|| TileError::Fetch(format!("no payload for {}", url)))
    }
}

/// Outcome counters for one bulk load.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadStats {
    /// Tiles queued for retrieval (absent tiles only, deduplicated).
    pub requested: usize,
    /// Tiles fetched, decoded, and inserted.
    pub loaded: usize,
    /// Tiles that failed to fetch or decode.
    pub failed: usize,
    /// Wire bytes fetched, before decompression.
    pub bytes_fetched: u64,
}

/// One raster layer: a URL template, a codec, and the tiles loaded so far.
///
/// `load_tiles` may be called repeatedly as routing requests come in;
/// already-resident tiles are never refetched.
pub struct TileSource {
    url_template: String,
    codec: TileCodec,
    fetcher: Box<dyn TileFetcher>,
    pool_size: usize,
    atlas: Atlas,
}

impl std::fmt::Debug for TileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileSource")
            .field("url_template", &self.url_template)
            .field("codec", &self.codec)
            .field("pool_size", &self.pool_size)
            .field("tiles", &self.atlas.len())
            .finish()
    }
}

impl TileSource {
    /// Create a source fetching over HTTP.
    ///
    /// The template must contain `{z}`, `{x}` and `{y}` placeholders, e.g.
    /// `https://tiles.example/dem/{z}/{x}/{y}.png`.
    pub fn new(url_template: impl Into<String>, codec: TileCodec) -> Result<Self> {
        Self::with_fetcher(url_template, codec, Box::new(HttpFetcher::new()?))
    }

    /// Create a source with a caller-supplied transport.
    pub fn with_fetcher(
        url_template: impl Into<String>,
        codec: TileCodec,
        fetcher: Box<dyn TileFetcher>,
    ) -> Result<Self> {
        let url_template = url_template.into();
        for placeholder in ["{z}", "{x}", "{y}"] {
            if !url_template.contains(placeholder) {
                return Err(TileError::InvalidUrlTemplate {
                    template: url_template,
                    missing: placeholder,
                });
            }
        }
        Ok(Self {
            url_template,
            codec,
            fetcher,
            pool_size: DEFAULT_POOL_SIZE,
            atlas: Atlas::new(),
        })
    }

    /// Set the worker pool size for bulk loads (minimum 1).
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size.max(1);
        self
    }

    /// URL for one tile.
    pub fn url_for(&self, tile: Tile) -> String {
        self.url_template
            .replace("{z}", &tile.z.to_string())
            .replace("{x}", &tile.x.to_string())
            .replace("{y}", &tile.y.to_string())
    }

    /// The tiles loaded so far.
    pub fn atlas(&self) -> &Atlas {
        &self.atlas
    }

    /// Fetch and decode every tile in `tiles` that is not already resident.
    ///
    /// Retrieval runs on a bounded pool of worker threads draining a shared
    /// queue. A tile that fails to fetch or decode is logged at `warn` and
    /// stays absent from the atlas; the batch itself never fails.
    pub fn load_tiles(&mut self, tiles: &[Tile]) -> LoadStats {
        let mut queue = VecDeque::new();
        let mut seen = HashSet::new();
        for &tile in tiles {
            if !self.atlas.contains(tile) && seen.insert(tile.key()) {
                queue.push_back(tile);
            }
        }
        if queue.is_empty() {
            debug!("All {} requested tiles already resident", tiles.len());
            return LoadStats::default();
        }

        let requested = queue.len();
        let workers = self.pool_size.min(requested);
        let start = Instant::now();

        let url_template = self.url_template.as_str();
        let codec = self.codec;
        let fetcher: &dyn TileFetcher = self.fetcher.as_ref();
        let atlas = Mutex::new(&mut self.atlas);
        let queue = Mutex::new(queue);
        let loaded = AtomicUsize::new(0);
        let failed = AtomicUsize::new(0);
        let bytes_fetched = AtomicU64::new(0);

        thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| loop {
                    let tile = match queue.lock().unwrap().pop_front() {
                        Some(tile) => tile,
                        None => break,
                    };
                    let url = fill_template(url_template, tile);
                    match fetch_one(fetcher, codec, &url, tile) {
                        Ok((raster, wire_bytes)) => {
                            loaded.fetch_add(1, Ordering::Relaxed);
                            bytes_fetched.fetch_add(wire_bytes, Ordering::Relaxed);
                            atlas.lock().unwrap().insert(raster);
                        }
                        Err(err) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                            warn!("Failed to load tile {}: {}", tile, err);
                        }
                    }
                });
            }
        });

        let stats = LoadStats {
            requested,
            loaded: loaded.load(Ordering::Relaxed),
            failed: failed.load(Ordering::Relaxed),
            bytes_fetched: bytes_fetched.load(Ordering::Relaxed),
        };
        info!(
            "Loaded {}/{} tiles ({} failed, {} bytes) in {:.2}s",
            stats.loaded,
            stats.requested,
            stats.failed,
            stats.bytes_fetched,
            start.elapsed().as_secs_f64()
        );
        stats
    }
}

fn fill_template(template: &str, tile: Tile) -> String {
    template
        .replace("{z}", &tile.z.to_string())
        .replace("{x}", &tile.x.to_string())
        .replace("{y}", &tile.y.to_string())
}

fn fetch_one(
    fetcher: &dyn TileFetcher,
    codec: TileCodec,
    url: &str,
    tile: Tile,
) -> Result<(TileRaster, u64)> {
    let bytes = fetcher.fetch(url)?;
    let wire_bytes = bytes.len() as u64;
    let samples = codec.decode(&bytes)?;
    Ok((TileRaster::new(tile, samples)?, wire_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Cursor;

    fn png_tile(pixel: impl Fn(u32, u32) -> [u8; 3]) -> Vec<u8> {
        let img = image::RgbImage::from_fn(TILE_SIZE, TILE_SIZE, |x, y| image::Rgb(pixel(x, y)));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
            .unwrap();
        bytes
    }

    fn hf2_tile(sample: impl Fn(usize) -> f32) -> Vec<u8> {
        let samples: Vec<f32> = (0..TILE_SAMPLES).map(sample).collect();
        hf2_raster::encode(&samples, TILE_SIZE, TILE_SIZE, 16, 0.01).unwrap()
    }

    fn gzip(bytes: &[u8]) -> Vec<u8> {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_rgb_calibration_decode() {
        // Sea level in Terrain-RGB is exactly (1, 134, 160):
        // 1*65536 + 134*256 + 160 = 100000, * 0.1 - 10000 = 0.
        assert_relative_eq!(RgbCalibration::TERRAIN_RGB.decode(1, 134, 160), 0.0);
        assert_relative_eq!(
            RgbCalibration::TERRAIN_RGB.decode(0, 0, 0),
            -10_000.0,
            epsilon = 1e-3
        );

        // 16.8 fixed point: integer part in R/G, fraction in B.
        assert_relative_eq!(RgbCalibration::FIXED_16_8.decode(0, 2, 128), 2.5);
        assert_relative_eq!(RgbCalibration::FIXED_16_8.decode(0, 0, 64), 0.25);
    }

    #[test]
    fn test_codec_rgb_decodes_png() {
        // Every pixel encodes 1234.5 m: value = (1234.5 + 10000) / 0.1 = 112345.
        let bytes = png_tile(|_, _| [1, 182, 217]);
        let samples = TileCodec::Rgb(RgbCalibration::TERRAIN_RGB)
            .decode(&bytes)
            .unwrap();
        assert_eq!(samples.len(), TILE_SAMPLES);
        assert_relative_eq!(samples[0], 1234.5, epsilon = 1e-3);
        assert_relative_eq!(samples[TILE_SAMPLES - 1], 1234.5, epsilon = 1e-3);
    }

    #[test]
    fn test_codec_rgb_rejects_small_image() {
        let img = image::RgbImage::from_pixel(4, 4, image::Rgb([0, 0, 0]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
            .unwrap();

        let err = TileCodec::Rgb(RgbCalibration::TERRAIN_RGB)
            .decode(&bytes)
            .unwrap_err();
        assert!(matches!(
            err,
            TileError::BadTileDimensions {
                width: 4,
                height: 4
            }
        ));
    }

    #[test]
    fn test_codec_hf2_plain_and_gzipped() {
        let bytes = hf2_tile(|i| (i % TILE_SIZE as usize) as f32 * 0.5);

        let plain = TileCodec::Hf2 { gzipped: false }.decode(&bytes).unwrap();
        assert_eq!(plain.len(), TILE_SAMPLES);
        assert_relative_eq!(plain[10], 5.0, epsilon = 0.01);

        let wrapped = TileCodec::Hf2 { gzipped: true }
            .decode(&gzip(&bytes))
            .unwrap();
        assert_eq!(wrapped, plain);
    }

    #[test]
    fn test_codec_hf2_rejects_garbage() {
        assert!(TileCodec::Hf2 { gzipped: false }
            .decode(b"not a heightfield")
            .is_err());
    }

    #[test]
    fn test_tile_raster_size_enforced() {
        let tile = Tile::new(0, 0, 0);
        let err = TileRaster::new(tile, vec![0.0; 10]).unwrap_err();
        assert!(matches!(
            err,
            TileError::InvalidRasterSize {
                expected: TILE_SAMPLES,
                got: 10
            }
        ));
    }

    #[test]
    fn test_tile_raster_sample_order() {
        let tile = Tile::new(0, 0, 0);
        let samples: Vec<f32> = (0..TILE_SAMPLES).map(|i| i as f32).collect();
        let raster = TileRaster::new(tile, samples).unwrap();

        assert_eq!(raster.sample(0, 0), 0.0);
        assert_eq!(raster.sample(255, 0), 255.0);
        assert_eq!(raster.sample(0, 1), 256.0);
        assert_eq!(raster.sample(255, 255), (TILE_SAMPLES - 1) as f32);
    }

    #[test]
    fn test_url_template_validation() {
        let err = TileSource::with_fetcher(
            "https://tiles.example/dem/{z}/{x}.png",
            TileCodec::Rgb(RgbCalibration::TERRAIN_RGB),
            Box::new(MemoryFetcher::new()),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            TileError::InvalidUrlTemplate { missing: "{y}", .. }
        ));

        let source = TileSource::with_fetcher(
            "https://tiles.example/dem/{z}/{x}/{y}.png",
            TileCodec::Rgb(RgbCalibration::TERRAIN_RGB),
            Box::new(MemoryFetcher::new()),
        )
        .unwrap();
        assert_eq!(
            source.url_for(Tile::new(5, 9, 4)),
            "https://tiles.example/dem/4/5/9.png"
        );
    }

    #[test]
    fn test_load_tiles_partial_failure() {
        let good = Tile::new(5241, 11370, 15);
        let bad = Tile::new(5242, 11370, 15);

        let mut fetcher = MemoryFetcher::new();
        fetcher.insert(
            format!("mem://{}/{}/{}", good.z, good.x, good.y),
            hf2_tile(|i| i as f32 * 0.01),
        );
        // No payload registered for `bad`.

        let mut source = TileSource::with_fetcher(
            "mem://{z}/{x}/{y}",
            TileCodec::Hf2 { gzipped: false },
            Box::new(fetcher),
        )
        .unwrap()
        .with_pool_size(4);

        let stats = source.load_tiles(&[good, bad]);
        assert_eq!(stats.requested, 2);
        assert_eq!(stats.loaded, 1);
        assert_eq!(stats.failed, 1);
        assert!(stats.bytes_fetched > 0);

        assert!(source.atlas().contains(good));
        assert!(!source.atlas().contains(bad));

        // Reload: the resident tile is skipped, the failed one is retried.
        let stats = source.load_tiles(&[good, bad]);
        assert_eq!(stats.requested, 1);
        assert_eq!(stats.loaded, 0);
        assert_eq!(stats.failed, 1);
    }

    #[test]
    fn test_load_tiles_skips_resident_and_duplicates() {
        let tile = Tile::new(100, 200, 15);
        let mut fetcher = MemoryFetcher::new();
        fetcher.insert(
            format!("mem://{}/{}/{}", tile.z, tile.x, tile.y),
            hf2_tile(|_| 7.0),
        );

        let mut source = TileSource::with_fetcher(
            "mem://{z}/{x}/{y}",
            TileCodec::Hf2 { gzipped: false },
            Box::new(fetcher),
        )
        .unwrap();

        // Duplicates in the request collapse to one fetch.
        let stats = source.load_tiles(&[tile, tile, tile]);
        assert_eq!(stats.requested, 1);
        assert_eq!(stats.loaded, 1);

        // A fully resident batch queues nothing.
        let stats = source.load_tiles(&[tile]);
        assert_eq!(stats.requested, 0);
        assert_eq!(stats.loaded, 0);
        assert_eq!(source.atlas().len(), 1);
    }

    #[test]
    fn test_load_tiles_rgb_end_to_end() {
        let tile = Tile::new(5241, 11370, 15);
        let mut fetcher = MemoryFetcher::new();
        // Left half 100.0 m, right half 200.0 m.
        fetcher.insert(
            format!("mem://{}/{}/{}", tile.z, tile.x, tile.y),
            png_tile(|x, _| {
                let value = if x < 128 { 101_000u32 } else { 102_000u32 };
                [(value >> 16) as u8, (value >> 8) as u8, value as u8]
            }),
        );

        let mut source = TileSource::with_fetcher(
            "mem://{z}/{x}/{y}",
            TileCodec::Rgb(RgbCalibration::TERRAIN_RGB),
            Box::new(fetcher),
        )
        .unwrap();

        let stats = source.load_tiles(&[tile]);
        assert_eq!(stats.loaded, 1);

        let raster = source.atlas().raster(tile).unwrap();
        assert_relative_eq!(raster.sample(0, 128), 100.0, epsilon = 1e-3);
        assert_relative_eq!(raster.sample(200, 128), 200.0, epsilon = 1e-3);
    }
}
