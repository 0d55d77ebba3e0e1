//! Lightweight image feature extraction
//!
//! Images are downscaled to roughly 100px on the long edge and summarized
//! by color and luma statistics. This trades precision for speed; the
//! result is a packaging fingerprint, not an image-recognition model.

use ahash::AHashMap;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader, Limits, RgbImage};
use std::io::Cursor;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::cache::FeatureCache;
use crate::error::{ImageError, Result};
use crate::loader::ImageLoader;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Hue in degrees [0, 360), saturation and value in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsv {
    pub h: f64,
    pub s: f64,
    pub v: f64,
}

impl Rgb {
    #[inline]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Luma with weights 0.299/0.587/0.114
    #[inline]
    pub fn luma(self) -> f64 {
        f64::from(self.r) * 0.299 + f64::from(self.g) * 0.587 + f64::from(self.b) * 0.114
    }

    pub fn to_hsv(self) -> Hsv {
        let r = f64::from(self.r) / 255.0;
        let g = f64::from(self.g) / 255.0;
        let b = f64::from(self.b) / 255.0;
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;

        let sector = if delta == 0.0 {
            0.0
        } else if max == r {
            ((g - b) / delta) % 6.0
        } else if max == g {
            (b - r) / delta + 2.0
        } else {
            (r - g) / delta + 4.0
        };
        let h = sector * 60.0;

        Hsv {
            h: if h < 0.0 { h + 360.0 } else { h },
            s: if max == 0.0 { 0.0 } else { delta / max },
            v: max,
        }
    }

    /// Rounds each channel down to a multiple of `step`
    #[inline]
    fn quantize(self, step: u8) -> Self {
        let q = |c: u8| (c / step) * step;
        Self::new(q(self.r), q(self.g), q(self.b))
    }
}

/// Derived per-image statistics. Not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageFeatures {
    /// Quantized colors by descending pixel count
    pub dominant_colors: SmallVec<[Rgb; 8]>,
    /// Hue bucket starts in degrees by descending pixel count
    pub dominant_hues: SmallVec<[u16; 5]>,
    /// Mean luma, 0-255
    pub brightness: f64,
    /// Mean absolute deviation of luma from `brightness`
    pub contrast: f64,
    /// Mean HSV saturation, 0-1
    pub saturation: f64,
    /// Fraction of pixels whose luma differs from both the left and the top
    /// neighbor by more than the edge threshold
    pub edge_density: f64,
    /// Width over height of the downscaled canvas
    pub aspect_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractorConfig {
    /// Long-edge target of the downscaled canvas
    pub max_edge: u32,
    /// Lower bound for either canvas dimension
    pub min_edge: u32,
    /// Fetch plus decode must finish within this many milliseconds
    pub decode_budget_ms: u64,
    pub edge_threshold: f64,
    pub quantization_step: u8,
    pub top_colors: usize,
    pub top_hues: usize,
    pub hue_bucket_degrees: u16,
    /// Entries in the per-URL feature cache; `None` disables caching
    pub cache_capacity: Option<usize>,
    /// Encoded images larger than this are rejected before decoding
    pub max_image_bytes: usize,
    /// Images wider or taller than this are rejected by the decoder
    pub max_decode_edge: u32,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            max_edge: 100,
            min_edge: 50,
            decode_budget_ms: 1500,
            edge_threshold: 50.0,
            quantization_step: 16,
            top_colors: 8,
            top_hues: 5,
            hue_bucket_degrees: 30,
            cache_capacity: None,
            max_image_bytes: 8 * 1024 * 1024,
            max_decode_edge: 8192,
        }
    }
}

impl ExtractorConfig {
    #[inline]
    pub fn decode_budget(&self) -> Duration {
        Duration::from_millis(self.decode_budget_ms)
    }

    /// Canvas size for an image of `width` x `height`: scaled so the long
    /// edge is `max_edge`, then each side raised to at least `min_edge`.
    pub fn canvas_size(&self, width: u32, height: u32) -> (u32, u32) {
        let scale = (f64::from(self.max_edge) / f64::from(width))
            .min(f64::from(self.max_edge) / f64::from(height));
        let side = |d: u32| ((f64::from(d) * scale).floor() as u32).max(self.min_edge).max(1);
        (side(width), side(height))
    }
}

/// Counts keyed by value, remembering first occurrence for tie-breaks
struct Histogram<K> {
    counts: AHashMap<K, (usize, usize)>,
}

impl<K: Copy + Eq + Hash> Histogram<K> {
    fn new() -> Self {
        Self {
            counts: AHashMap::new(),
        }
    }

    #[inline]
    fn add(&mut self, key: K, position: usize) {
        self.counts.entry(key).or_insert((0, position)).0 += 1;
    }

    fn top<const N: usize>(self, n: usize) -> SmallVec<[K; N]> {
        let mut entries: Vec<(K, (usize, usize))> = self.counts.into_iter().collect();
        entries.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));
        entries.into_iter().take(n).map(|(key, _)| key).collect()
    }
}

fn hue_bucket(pixel: Rgb, bucket_degrees: u16) -> u16 {
    let hue = (pixel.to_hsv().h.round() as i64).rem_euclid(360) as u16;
    (hue / bucket_degrees) * bucket_degrees
}

fn downscale(image: &DynamicImage, config: &ExtractorConfig) -> Result<RgbImage> {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(ImageError::Empty);
    }
    let (w, h) = config.canvas_size(width, height);
    if (w, h) == (width, height) {
        Ok(image.to_rgb8())
    } else {
        Ok(image.resize_exact(w, h, FilterType::Triangle).to_rgb8())
    }
}

/// Compute [`ImageFeatures`] for a decoded image.
pub fn features_from_image(image: &DynamicImage, config: &ExtractorConfig) -> Result<ImageFeatures> {
    let canvas = downscale(image, config)?;
    let width = canvas.width() as usize;
    let pixels: Vec<Rgb> = canvas
        .pixels()
        .map(|p| Rgb::new(p.0[0], p.0[1], p.0[2]))
        .collect();
    let lumas: Vec<f64> = pixels.iter().map(|p| p.luma()).collect();
    let step = config.quantization_step.max(1);
    let bucket_degrees = config.hue_bucket_degrees.clamp(1, 360);

    let mut colors = Histogram::new();
    let mut hues = Histogram::new();
    let mut brightness_sum = 0.0;
    let mut saturation_sum = 0.0;
    let mut edge_pixels = 0usize;

    for (i, (&pixel, &luma)) in pixels.iter().zip(&lumas).enumerate() {
        brightness_sum += luma;
        saturation_sum += pixel.to_hsv().s;
        hues.add(hue_bucket(pixel, bucket_degrees), i);
        colors.add(pixel.quantize(step), i);

        let (x, y) = (i % width, i / width);
        if x > 0
            && y > 0
            && (luma - lumas[i - 1]).abs() > config.edge_threshold
            && (luma - lumas[i - width]).abs() > config.edge_threshold
        {
            edge_pixels += 1;
        }
    }

    let count = pixels.len() as f64;
    let brightness = brightness_sum / count;
    let contrast = lumas.iter().map(|l| (l - brightness).abs()).sum::<f64>() / count;

    Ok(ImageFeatures {
        dominant_colors: colors.top(config.top_colors),
        dominant_hues: hues.top(config.top_hues),
        brightness,
        contrast,
        saturation: saturation_sum / count,
        edge_density: edge_pixels as f64 / count,
        aspect_ratio: f64::from(canvas.width()) / f64::from(canvas.height()),
    })
}

/// Fetches, decodes and summarizes images under a time budget.
pub struct FeatureExtractor<L> {
    loader: L,
    config: ExtractorConfig,
    cache: Option<FeatureCache>,
}

impl<L: ImageLoader> FeatureExtractor<L> {
    /// Extractor honoring `config.cache_capacity`
    pub fn new(loader: L, config: ExtractorConfig) -> Self {
        let cache = config
            .cache_capacity
            .and_then(NonZeroUsize::new)
            .map(FeatureCache::new);
        Self {
            loader,
            config,
            cache,
        }
    }

    pub fn with_cache(loader: L, config: ExtractorConfig, capacity: NonZeroUsize) -> Self {
        Self {
            loader,
            config,
            cache: Some(FeatureCache::new(capacity)),
        }
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    pub fn cache(&self) -> Option<&FeatureCache> {
        self.cache.as_ref()
    }

    /// Features for the image at `url`, or an error if it cannot be fetched
    /// and decoded within the decode budget.
    pub async fn extract(&self, url: &str) -> Result<Arc<ImageFeatures>> {
        if let Some(features) = self.cache.as_ref().and_then(|c| c.get(url)) {
            return Ok(features);
        }

        let budget = self.config.decode_budget();
        let features = tokio::time::timeout(budget, self.load_and_decode(url))
            .await
            .map_err(|_| ImageError::Timeout(budget))??;
        let features = Arc::new(features);

        if let Some(cache) = &self.cache {
            cache.insert(url, Arc::clone(&features));
        }
        Ok(features)
    }

    async fn load_and_decode(&self, url: &str) -> Result<ImageFeatures> {
        let bytes = self.loader.load(url).await?;
        debug!(url, bytes = bytes.len(), "image fetched");

        if bytes.len() > self.config.max_image_bytes {
            return Err(ImageError::TooLarge {
                limit: self.config.max_image_bytes,
            });
        }

        let config = self.config.clone();
        tokio::task::spawn_blocking(move || {
            let image = decode(&bytes, config.max_decode_edge)?;
            features_from_image(&image, &config)
        })
        .await?
    }
}

/// Decode, refusing images with either side above `max_edge`
fn decode(bytes: &[u8], max_edge: u32) -> Result<DynamicImage> {
    let mut limits = Limits::default();
    limits.max_image_width = Some(max_edge);
    limits.max_image_height = Some(max_edge);

    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(image::ImageError::IoError)?;
    reader.limits(limits);
    Ok(reader.decode()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn solid(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb(color)))
    }

    fn encode(image: &DynamicImage) -> Bytes {
        let mut buf = Cursor::new(Vec::new());
        image.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        Bytes::from(buf.into_inner())
    }

    struct CountingLoader {
        body: Bytes,
        calls: AtomicUsize,
    }

    impl ImageLoader for CountingLoader {
        async fn load(&self, _url: &str) -> Result<Bytes> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.body.clone())
        }
    }

    struct StalledLoader;

    impl ImageLoader for StalledLoader {
        async fn load(&self, _url: &str) -> Result<Bytes> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Err(ImageError::Fetch("unreachable".to_string()))
        }
    }

    #[test]
    fn test_canvas_size() {
        let config = ExtractorConfig::default();
        assert_eq!(config.canvas_size(200, 100), (100, 50));
        assert_eq!(config.canvas_size(1000, 10), (100, 50));
        assert_eq!(config.canvas_size(10, 10), (100, 100));
        assert_eq!(config.canvas_size(400, 300), (100, 75));
    }

    #[test]
    fn test_solid_color() {
        let features = features_from_image(&solid(200, 100, [255, 0, 0]), &ExtractorConfig::default()).unwrap();
        assert_eq!(features.dominant_colors.as_slice(), &[Rgb::new(240, 0, 0)]);
        assert_eq!(features.dominant_hues.as_slice(), &[0]);
        assert!((features.brightness - 255.0 * 0.299).abs() < 1e-6);
        assert!(features.contrast.abs() < 1e-6);
        assert!((features.saturation - 1.0).abs() < 1e-9);
        assert_eq!(features.edge_density, 0.0);
        assert_eq!(features.aspect_ratio, 2.0);
    }

    #[test]
    fn test_dominant_order_by_frequency() {
        // 60 blue columns then 40 green columns on a 100x100 canvas
        let image = RgbImage::from_fn(100, 100, |x, _| {
            if x < 60 {
                image::Rgb([0, 0, 255])
            } else {
                image::Rgb([0, 255, 0])
            }
        });
        let features =
            features_from_image(&DynamicImage::ImageRgb8(image), &ExtractorConfig::default()).unwrap();
        assert_eq!(
            features.dominant_colors.as_slice(),
            &[Rgb::new(0, 0, 240), Rgb::new(0, 240, 0)]
        );
        assert_eq!(features.dominant_hues.as_slice(), &[240, 120]);
    }

    #[test]
    fn test_edges_need_both_neighbors() {
        let checker = RgbImage::from_fn(100, 100, |x, y| {
            if (x + y) % 2 == 0 {
                image::Rgb([0, 0, 0])
            } else {
                image::Rgb([255, 255, 255])
            }
        });
        let features =
            features_from_image(&DynamicImage::ImageRgb8(checker), &ExtractorConfig::default()).unwrap();
        assert!((features.edge_density - 99.0 * 99.0 / 10_000.0).abs() < 1e-9);
        assert!((features.contrast - 127.5).abs() < 0.01);

        let stripes = RgbImage::from_fn(100, 100, |x, _| {
            if x % 2 == 0 {
                image::Rgb([0, 0, 0])
            } else {
                image::Rgb([255, 255, 255])
            }
        });
        let features =
            features_from_image(&DynamicImage::ImageRgb8(stripes), &ExtractorConfig::default()).unwrap();
        assert_eq!(features.edge_density, 0.0);
    }

    #[test]
    fn test_empty_image_is_an_error() {
        let empty = DynamicImage::ImageRgb8(RgbImage::new(0, 0));
        assert!(matches!(
            features_from_image(&empty, &ExtractorConfig::default()),
            Err(ImageError::Empty)
        ));
    }

    #[test]
    fn test_features_json_shape() {
        let features = features_from_image(&solid(100, 50, [0, 0, 255]), &ExtractorConfig::default()).unwrap();
        let json = serde_json::to_value(&features).unwrap();
        assert_eq!(json["dominantColors"][0], serde_json::json!({"r": 0, "g": 0, "b": 240}));
        assert_eq!(json["dominantHues"][0], 240);
        assert_eq!(json["aspectRatio"], 2.0);

        let back: ImageFeatures = serde_json::from_value(json).unwrap();
        assert_eq!(back.dominant_colors, features.dominant_colors);
    }

    #[tokio::test]
    async fn test_extract_decodes_fetched_bytes() {
        let loader = CountingLoader {
            body: encode(&solid(40, 80, [0, 255, 0])),
            calls: AtomicUsize::new(0),
        };
        let extractor = FeatureExtractor::new(loader, ExtractorConfig::default());
        let features = extractor.extract("https://img.example/a.png").await.unwrap();
        assert_eq!(features.dominant_hues.as_slice(), &[120]);
        assert_eq!(features.aspect_ratio, 0.5);
        assert!(extractor.cache().is_none());
    }

    #[tokio::test]
    async fn test_undecodable_bytes() {
        let loader = CountingLoader {
            body: Bytes::from_static(b"not an image"),
            calls: AtomicUsize::new(0),
        };
        let extractor = FeatureExtractor::new(loader, ExtractorConfig::default());
        let err = extractor.extract("https://img.example/a.png").await.unwrap_err();
        assert!(matches!(err, ImageError::Decode(_)));
    }

    #[tokio::test]
    async fn test_oversized_body_is_not_decoded() {
        let loader = CountingLoader {
            body: encode(&solid(10, 10, [10, 20, 30])),
            calls: AtomicUsize::new(0),
        };
        let config = ExtractorConfig {
            max_image_bytes: 16,
            ..Default::default()
        };
        let err = FeatureExtractor::new(loader, config).extract("u").await.unwrap_err();
        assert!(matches!(err, ImageError::TooLarge { limit: 16 }));
    }

    #[tokio::test]
    async fn test_decode_edge_limit() {
        let loader = CountingLoader {
            body: encode(&solid(300, 10, [10, 20, 30])),
            calls: AtomicUsize::new(0),
        };
        let config = ExtractorConfig {
            max_decode_edge: 200,
            ..Default::default()
        };
        let err = FeatureExtractor::new(loader, config).extract("u").await.unwrap_err();
        assert!(matches!(err, ImageError::Decode(_)));
    }

    #[tokio::test]
    async fn test_cache_skips_refetch() {
        let loader = CountingLoader {
            body: encode(&solid(10, 10, [10, 20, 30])),
            calls: AtomicUsize::new(0),
        };
        let extractor =
            FeatureExtractor::with_cache(loader, ExtractorConfig::default(), NonZeroUsize::new(4).unwrap());
        let first = extractor.extract("u").await.unwrap();
        let second = extractor.extract("u").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(extractor.loader.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_budget_exceeded() {
        let config = ExtractorConfig {
            decode_budget_ms: 20,
            ..Default::default()
        };
        let extractor = FeatureExtractor::new(StalledLoader, config);
        let err = extractor.extract("u").await.unwrap_err();
        assert!(matches!(err, ImageError::Timeout(d) if d == Duration::from_millis(20)));
    }
}
