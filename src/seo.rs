//! Heuristic SEO scoring for detail records
//!
//! The score is a sum of banded sub-scores clipped to 0..=100. All bands and
//! point values come from [`SeoConfig`] so they can be tuned from the YAML
//! config without code changes.

use std::collections::{BTreeMap, HashMap, HashSet};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::records::DetailRecord;
use crate::utils::ConfigError;

pub const MAX_SEO_SCORE: u32 = 100;

/// Fixed English stopword set excluded from keyword density
static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and",
        "any", "are", "as", "at", "be", "because", "been", "before", "being", "below", "between",
        "both", "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during",
        "each", "few", "for", "from", "further", "had", "has", "have", "having", "he", "her",
        "here", "hers", "herself", "him", "himself", "his", "how", "i", "if", "in", "into", "is",
        "it", "its", "itself", "just", "me", "more", "most", "my", "myself", "no", "nor", "not",
        "now", "of", "off", "on", "once", "only", "or", "other", "our", "ours", "ourselves",
        "out", "over", "own", "same", "she", "should", "so", "some", "such", "than", "that",
        "the", "their", "theirs", "them", "themselves", "then", "there", "these", "they", "this",
        "those", "through", "to", "too", "under", "until", "up", "very", "was", "we", "were",
        "what", "when", "where", "which", "while", "who", "whom", "why", "will", "with", "would",
        "you", "your", "yours", "yourself", "yourselves",
    ]
    .into_iter()
    .collect()
});

/// One scoring band: `points` awarded when the measured value lies in `min..=max`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub min: usize,
    #[serde(default)]
    pub max: Option<usize>,
    pub points: u32,
}

impl Band {
    pub const fn new(min: usize, max: Option<usize>, points: u32) -> Self {
        Self { min, max, points }
    }

    fn contains(&self, value: usize) -> bool {
        value >= self.min && self.max.is_none_or(|max| value <= max)
    }
}

/// Points of the first band containing `value`, zero when none does
fn banded(bands: &[Band], value: usize) -> u32 {
    bands
        .iter()
        .find(|band| band.contains(value))
        .map_or(0, |band| band.points)
}

/// Tuning constants for [`SeoScorer`]
///
/// Bands are checked in order and the first match wins, so list them from the
/// most specific to the most general.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeoConfig {
    #[serde(default = "default_title_bands")]
    pub title_bands: Vec<Band>,

    #[serde(default = "default_description_bands")]
    pub description_bands: Vec<Band>,

    /// Maximum points for query keywords appearing in the description
    #[serde(default = "default_query_keyword_points")]
    pub query_keyword_points: u32,

    #[serde(default = "default_tag_bands")]
    pub tag_bands: Vec<Band>,

    #[serde(default = "default_image_bands")]
    pub image_bands: Vec<Band>,

    /// Marketplace keywords rewarded when present in the title
    #[serde(default = "default_title_keywords")]
    pub title_keywords: Vec<String>,

    #[serde(default = "default_title_keyword_points")]
    pub title_keyword_points: u32,

    #[serde(default = "default_title_keyword_cap")]
    pub title_keyword_cap: u32,

    /// Tokens shorter than this are ignored for keyword density
    #[serde(default = "default_min_token_len")]
    pub min_token_len: usize,

    /// Number of densest tokens kept in the analysis
    #[serde(default = "default_max_keywords")]
    pub max_keywords: usize,
}

fn default_title_bands() -> Vec<Band> {
    vec![
        Band::new(40, Some(60), 20),
        Band::new(30, Some(39), 15),
        Band::new(61, Some(80), 15),
        Band::new(1, None, 5),
    ]
}

fn default_description_bands() -> Vec<Band> {
    vec![
        Band::new(500, None, 20),
        Band::new(300, None, 15),
        Band::new(100, None, 10),
        Band::new(1, None, 5),
    ]
}

fn default_query_keyword_points() -> u32 {
    10
}

fn default_tag_bands() -> Vec<Band> {
    vec![
        Band::new(13, None, 20),
        Band::new(10, None, 15),
        Band::new(5, None, 10),
        Band::new(1, None, 5),
    ]
}

fn default_image_bands() -> Vec<Band> {
    vec![
        Band::new(10, None, 20),
        Band::new(7, None, 15),
        Band::new(4, None, 10),
        Band::new(1, None, 5),
    ]
}

fn default_title_keywords() -> Vec<String> {
    ["handmade", "custom", "personalized", "unique", "vintage", "gift", "sale"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_title_keyword_points() -> u32 {
    5
}

fn default_title_keyword_cap() -> u32 {
    20
}

fn default_min_token_len() -> usize {
    3
}

fn default_max_keywords() -> usize {
    10
}

impl SeoConfig {
    /// Reject point values above [`MAX_SEO_SCORE`]
    ///
    /// # Errors
    /// [`ConfigError::InvalidValue`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let bands = [
            ("seo.title_bands", &self.title_bands),
            ("seo.description_bands", &self.description_bands),
            ("seo.tag_bands", &self.tag_bands),
            ("seo.image_bands", &self.image_bands),
        ];
        for (name, bands) in bands {
            if let Some(band) = bands.iter().find(|band| band.points > MAX_SEO_SCORE) {
                return Err(ConfigError::InvalidValue(format!(
                    "{name}: band points ({}) exceed {MAX_SEO_SCORE}",
                    band.points
                )));
            }
        }

        for (name, points) in [
            ("seo.query_keyword_points", self.query_keyword_points),
            ("seo.title_keyword_points", self.title_keyword_points),
            ("seo.title_keyword_cap", self.title_keyword_cap),
        ] {
            if points > MAX_SEO_SCORE {
                return Err(ConfigError::InvalidValue(format!(
                    "{name} ({points}) exceeds {MAX_SEO_SCORE}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for SeoConfig {
    fn default() -> Self {
        Self {
            title_bands: default_title_bands(),
            description_bands: default_description_bands(),
            query_keyword_points: default_query_keyword_points(),
            tag_bands: default_tag_bands(),
            image_bands: default_image_bands(),
            title_keywords: default_title_keywords(),
            title_keyword_points: default_title_keyword_points(),
            title_keyword_cap: default_title_keyword_cap(),
            min_token_len: default_min_token_len(),
            max_keywords: default_max_keywords(),
        }
    }
}

/// Occurrences of one description token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordFrequency {
    pub count: usize,
    /// `count` over the number of non-stopword tokens, in 0..=1
    pub density: f64,
}

/// Per-criterion points making up [`SeoAnalysis::seo_score`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub title: u32,
    pub description_length: u32,
    pub description_keywords: u32,
    pub tags: u32,
    pub images: u32,
    pub title_keywords: u32,
}

impl ScoreBreakdown {
    pub fn total(&self) -> u32 {
        [
            self.title,
            self.description_length,
            self.description_keywords,
            self.tags,
            self.images,
            self.title_keywords,
        ]
        .into_iter()
        .fold(0, u32::saturating_add)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeoAnalysis {
    pub title_length: usize,
    pub description_length: usize,
    pub tag_count: usize,
    pub image_count: usize,
    pub has_categories: bool,
    pub title_keywords: Vec<String>,
    pub keyword_density: BTreeMap<String, KeywordFrequency>,
    pub breakdown: ScoreBreakdown,
    pub seo_score: u32,
}

/// Scores detail records against one search query
#[derive(Debug, Clone)]
pub struct SeoScorer {
    config: SeoConfig,
    query_tokens: Vec<String>,
}

impl SeoScorer {
    pub fn new(config: SeoConfig, query: &str) -> Self {
        let mut query_tokens = tokenize(query, config.min_token_len);
        query_tokens.sort();
        query_tokens.dedup();
        Self {
            config,
            query_tokens,
        }
    }

    pub fn score(&self, record: &DetailRecord) -> SeoAnalysis {
        let cfg = &self.config;
        let title = record.base.title.as_str();
        let description = record.description.as_deref().unwrap_or("").trim();

        let title_length = title.chars().count();
        let description_length = description.chars().count();
        let tag_count = record.tags.len();
        let image_count = record.image_urls.len();

        let title_lower = title.to_lowercase();
        let title_keywords: Vec<String> = cfg
            .title_keywords
            .iter()
            .filter(|keyword| title_lower.contains(&keyword.to_lowercase()))
            .cloned()
            .collect();

        let description_tokens = tokenize(description, cfg.min_token_len);

        let breakdown = ScoreBreakdown {
            title: banded(&cfg.title_bands, title_length),
            description_length: if description_length == 0 {
                0
            } else {
                banded(&cfg.description_bands, description_length)
            },
            description_keywords: self.query_keyword_points(&description_tokens),
            tags: banded(&cfg.tag_bands, tag_count),
            images: banded(&cfg.image_bands, image_count),
            title_keywords: u32::try_from(title_keywords.len())
                .unwrap_or(u32::MAX)
                .saturating_mul(cfg.title_keyword_points)
                .min(cfg.title_keyword_cap),
        };

        SeoAnalysis {
            title_length,
            description_length,
            tag_count,
            image_count,
            has_categories: !record.categories.is_empty(),
            title_keywords,
            keyword_density: keyword_density(&description_tokens, cfg.max_keywords),
            seo_score: breakdown.total().min(MAX_SEO_SCORE),
            breakdown,
        }
    }

    /// Share of query tokens found in the description, scaled to the configured maximum
    fn query_keyword_points(&self, description_tokens: &[String]) -> u32 {
        if self.query_tokens.is_empty() || description_tokens.is_empty() {
            return 0;
        }
        let present: HashSet<&str> = description_tokens.iter().map(String::as_str).collect();
        let found = self
            .query_tokens
            .iter()
            .filter(|token| present.contains(token.as_str()))
            .count();
        let share = found as f64 / self.query_tokens.len() as f64;
        (share * f64::from(self.config.query_keyword_points)).round() as u32
    }
}

/// Lowercased tokens split on non-alphanumeric characters, stopwords and short tokens removed
pub fn tokenize(text: &str, min_len: usize) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .filter(|token| token.chars().count() >= min_len && !STOPWORDS.contains(token.as_str()))
        .collect()
}

/// Densest `limit` tokens, ties broken alphabetically
pub fn keyword_density(tokens: &[String], limit: usize) -> BTreeMap<String, KeywordFrequency> {
    if tokens.is_empty() {
        return BTreeMap::new();
    }
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for token in tokens {
        *counts.entry(token.as_str()).or_default() += 1;
    }

    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let total = tokens.len() as f64;
    ranked
        .into_iter()
        .take(limit)
        .map(|(token, count)| {
            (
                token.to_string(),
                KeywordFrequency {
                    count,
                    density: count as f64 / total,
                },
            )
        })
        .collect()
}
