//! Pairwise similarity functions
//!
//! Text-side functions compare two products; color-side functions compare
//! extracted image features. All similarities are in [0.0, 1.0] where 1.0
//! means identical.

use ahash::AHashSet;
use marketnav_core::Product;
use tracing::trace;

use crate::features::Rgb;

/// Brand names recognised inside titles when a product has no brand field
pub const KNOWN_BRANDS: &[&str] = &[
    "muuchstac",
    "khadi",
    "bombay shaving company",
    "nivea",
    "garnier",
    "loreal",
    "olay",
    "pond",
    "himalaya",
    "patanjali",
    "biotique",
    "mamaearth",
    "wow",
    "plum",
    "forest essentials",
    "kama ayurveda",
];

const HIGH_KEYWORD_OVERLAP: usize = 15;

/// The text-derived parts of a product that phase-one scoring compares.
///
/// Built once per product so the reference side is not re-tokenized for
/// every candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSignature {
    /// Lowercased, trimmed comma-separated tags longer than one character
    pub keywords: AHashSet<String>,
    /// Lowercased words longer than two characters from title and description
    pub words: AHashSet<String>,
    pub brand: String,
}

impl TextSignature {
    pub fn new(product: &Product) -> Self {
        Self {
            keywords: keyword_set(product),
            words: word_set(product),
            brand: resolve_brand(product),
        }
    }

    pub fn matching_keywords(&self, other: &TextSignature) -> usize {
        let matches = self.keywords.intersection(&other.keywords).count();
        if matches >= HIGH_KEYWORD_OVERLAP {
            trace!(matches, "high keyword overlap");
        }
        matches
    }

    pub fn text_similarity(&self, other: &TextSignature) -> f64 {
        jaccard(&self.words, &other.words)
    }

    pub fn brand_similarity(&self, other: &TextSignature) -> f64 {
        brand_name_similarity(&self.brand, &other.brand)
    }
}

pub fn keyword_set(product: &Product) -> AHashSet<String> {
    product
        .keywords
        .as_deref()
        .unwrap_or_default()
        .to_lowercase()
        .split(',')
        .map(str::trim)
        .filter(|k| k.chars().count() > 1)
        .map(str::to_string)
        .collect()
}

pub fn word_set(product: &Product) -> AHashSet<String> {
    let text = format!(
        "{} {}",
        product.title,
        product.description.as_deref().unwrap_or_default()
    )
    .to_lowercase();
    text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|w| w.len() > 2)
        .map(str::to_string)
        .collect()
}

/// Jaccard index of two sets; 0.0 when both are empty
pub fn jaccard(a: &AHashSet<String>, b: &AHashSet<String>) -> f64 {
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Brand of a product: the brand field when set, else a known brand found in
/// the title, else the first word of the title.
pub fn resolve_brand(product: &Product) -> String {
    if let Some(brand) = product.brand.as_deref() {
        let brand = brand.trim();
        if !brand.is_empty() {
            return brand.to_lowercase();
        }
    }

    let title = product.title.to_lowercase();
    if let Some(brand) = KNOWN_BRANDS.iter().find(|b| title.contains(*b)) {
        return brand.to_string();
    }
    title.split(' ').next().unwrap_or_default().to_string()
}

/// Number of keyword tags two products share
pub fn count_matching_keywords(a: &Product, b: &Product) -> usize {
    TextSignature::new(a).matching_keywords(&TextSignature::new(b))
}

/// Jaccard similarity of the title and description words of two products
pub fn text_similarity(a: &Product, b: &Product) -> f64 {
    jaccard(&word_set(a), &word_set(b))
}

pub fn brand_similarity(a: &Product, b: &Product) -> f64 {
    brand_name_similarity(&resolve_brand(a), &resolve_brand(b))
}

/// 1.0 for equal brands, 0.8 when one contains the other, otherwise the
/// normalized edit similarity scaled by 0.6 if it exceeds 0.7.
pub fn brand_name_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    if a.contains(b) || b.contains(a) {
        return 0.8;
    }

    let max_len = a.chars().count().max(b.chars().count());
    let similarity = 1.0 - levenshtein(a, b) as f64 / max_len as f64;
    if similarity > 0.7 {
        similarity * 0.6
    } else {
        0.0
    }
}

/// Character-level edit distance
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }

    let mut previous: Vec<usize> = (0..=a.len()).collect();
    let mut current = vec![0usize; a.len() + 1];
    for (j, cb) in b.iter().enumerate() {
        current[0] = j + 1;
        for (i, ca) in a.iter().enumerate() {
            let substitution = previous[i] + usize::from(ca != cb);
            current[i + 1] = substitution.min(previous[i + 1] + 1).min(current[i] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[a.len()]
}

/// Similarity of two quantized colors.
///
/// Blends plain RGB distance, channel-weighted (2:4:3) RGB distance,
/// circular hue distance, saturation distance and value distance with
/// weights 0.3/0.3/0.25/0.1/0.05.
pub fn rgb_similarity(a: Rgb, b: Rgb) -> f64 {
    let dr = f64::from(a.r) - f64::from(b.r);
    let dg = f64::from(a.g) - f64::from(b.g);
    let db = f64::from(a.b) - f64::from(b.b);

    let rgb_distance = (dr * dr + dg * dg + db * db).sqrt();
    let perceptual_distance = (2.0 * dr * dr + 4.0 * dg * dg + 3.0 * db * db).sqrt();

    let hsv_a = a.to_hsv();
    let hsv_b = b.to_hsv();
    let hue_diff = (hsv_a.h - hsv_b.h).abs();
    let hue_similarity = 1.0 - hue_diff.min(360.0 - hue_diff) / 180.0;
    let sat_similarity = 1.0 - (hsv_a.s - hsv_b.s).abs();
    let val_similarity = 1.0 - (hsv_a.v - hsv_b.v).abs();

    let rgb_similarity = (1.0 - rgb_distance / (255.0 * 3f64.sqrt())).max(0.0);
    let perceptual_similarity = (1.0 - perceptual_distance / (255.0 * 29f64.sqrt())).max(0.0);

    rgb_similarity * 0.3
        + perceptual_similarity * 0.3
        + hue_similarity * 0.25
        + sat_similarity * 0.1
        + val_similarity * 0.05
}

/// Mean over `reference` colors of the best match among `candidate` colors;
/// 0.0 when either list is empty.
pub fn color_similarity(reference: &[Rgb], candidate: &[Rgb]) -> f64 {
    if reference.is_empty() || candidate.is_empty() {
        return 0.0;
    }
    let total: f64 = reference
        .iter()
        .map(|&a| {
            candidate
                .iter()
                .map(|&b| rgb_similarity(a, b))
                .fold(0.0, f64::max)
        })
        .sum();
    total / reference.len() as f64
}

/// Fraction of the first three reference hue buckets that lie within 30° of
/// any candidate hue bucket; 0.5 when either side has no hues.
pub fn hue_similarity_fast(reference: &[u16], candidate: &[u16]) -> f64 {
    if reference.is_empty() || candidate.is_empty() {
        return 0.5;
    }
    let checks = reference.len().min(3);
    let matches = reference[..checks]
        .iter()
        .filter(|&&h1| {
            candidate.iter().any(|&h2| {
                let diff = h1.abs_diff(h2);
                diff.min(360u16.saturating_sub(diff)) <= 30
            })
        })
        .count();
    matches as f64 / checks as f64
}

pub fn brightness_similarity(a: f64, b: f64) -> f64 {
    1.0 - (a - b).abs() / 255.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged(id: &str, keywords: &str) -> Product {
        Product::new(id, "Item").with_keywords(keywords)
    }

    #[test]
    fn test_keywords_compare_as_sets() {
        let a = tagged("a", "Soap, soap, neem ,x, herbal");
        let b = tagged("b", "neem,SOAP,face");
        assert_eq!(count_matching_keywords(&a, &b), 2);
        assert_eq!(count_matching_keywords(&a, &Product::new("c", "Item")), 0);
    }

    #[test]
    fn test_short_keywords_dropped() {
        let sig = TextSignature::new(&tagged("a", "a, bb , c,dd"));
        assert_eq!(sig.keywords.len(), 2);
        assert!(sig.keywords.contains("bb"));
    }

    #[test]
    fn test_text_similarity_jaccard() {
        let a = Product::new("a", "Neem Face Wash").with_description("for oily skin");
        let b = Product::new("b", "Neem Face Wash");
        // {neem, face, wash, for, oily, skin} vs {neem, face, wash}
        assert!((text_similarity(&a, &b) - 0.5).abs() < 1e-9);
        assert_eq!(text_similarity(&a, &a), 1.0);
        assert_eq!(text_similarity(&Product::new("x", "A"), &Product::new("y", "B")), 0.0);
    }

    #[test]
    fn test_resolve_brand() {
        assert_eq!(resolve_brand(&Product::new("1", "Face Wash").with_brand(" Nivea ")), "nivea");
        assert_eq!(resolve_brand(&Product::new("2", "Mamaearth Ubtan Face Wash")), "mamaearth");
        assert_eq!(resolve_brand(&Product::new("3", "Men Bombay Shaving Company Foam")), "bombay shaving company");
        assert_eq!(resolve_brand(&Product::new("4", "Acme Trimmer")), "acme");
        assert_eq!(resolve_brand(&Product::new("5", "Acme Trimmer").with_brand("  ")), "acme");
    }

    #[test]
    fn test_brand_similarity_tiers() {
        assert_eq!(brand_name_similarity("nivea", "nivea"), 1.0);
        assert_eq!(brand_name_similarity("loreal", "loreal paris"), 0.8);
        // 1 edit over 9 chars: 0.888 * 0.6
        let close = brand_name_similarity("himalayas", "himalayaz");
        assert!((close - (8.0 / 9.0) * 0.6).abs() < 1e-9);
        assert_eq!(brand_name_similarity("nivea", "plum"), 0.0);
        assert_eq!(brand_name_similarity("", "plum"), 0.0);
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("same", "same"), 0);
    }

    #[test]
    fn test_identical_colors_are_maximally_similar() {
        let colors = [Rgb::new(240, 16, 32), Rgb::new(0, 0, 0), Rgb::new(128, 128, 240)];
        assert!((color_similarity(&colors, &colors) - 1.0).abs() < 1e-9);
        assert_eq!(color_similarity(&colors, &[]), 0.0);
    }

    #[test]
    fn test_color_similarity_orders_by_distance() {
        let red = [Rgb::new(240, 0, 0)];
        let dark_red = [Rgb::new(192, 0, 0)];
        let blue = [Rgb::new(0, 0, 240)];
        assert!(color_similarity(&red, &dark_red) > color_similarity(&red, &blue));
    }

    #[test]
    fn test_hue_similarity_fast() {
        assert_eq!(hue_similarity_fast(&[0, 120, 240], &[330]), 1.0 / 3.0);
        assert_eq!(hue_similarity_fast(&[0, 120, 240, 90], &[240, 120, 0]), 1.0);
        assert_eq!(hue_similarity_fast(&[], &[0]), 0.5);
    }

    #[test]
    fn test_brightness_similarity() {
        assert_eq!(brightness_similarity(100.0, 100.0), 1.0);
        assert_eq!(brightness_similarity(0.0, 255.0), 0.0);
    }
}
