//! Topic relevance filters
//!
//! Articles must mention a crude-oil core term AND a market context term,
//! with at least one core hit within [`PROXIMITY_CHARS`] characters of a
//! context hit. This keeps "oil painting prices" out while keeping
//! "Brent futures slip on rising inventories" in.

use regex::Regex;
use sentivol_common::{Result, SentivolError};

const CORE_PATTERN: &str = r"(?i)\b(wti|brent|crude oil|crude|petroleum|opec\+?|eia|nyme?x|ice(?: brent)?|barrels?|refiner(?:y|ies)|upstream|midstream|downstream)\b";

const CTX_PATTERN: &str = r"(?i)\b(price|prices|futures|spot|curve|spread|backwardation|contango|hedg(?:e|ing)|inventory|stocks?|output|production|exports?|imports?|demand|supply|rig count|shutdown|outage|sanctions?|disruption|capacity|maintenance|pipeline|refinery)\b";

/// Loose single-regex filter used for headline feeds where the proximity
/// rule is too strict (RSS titles are short).
const OIL_PATTERN: &str =
    r"(?i)\b(oil|crude|wti|brent|petroleum|energy|opec|barrel|futures|refinery|gas|fuel)\b";

/// Maximum character distance between a core hit and a context hit.
const PROXIMITY_CHARS: usize = 40;

/// Compiled relevance filters, built once per run.
pub struct RelevanceFilter {
    core: Regex,
    ctx: Regex,
    oil: Regex,
}

impl RelevanceFilter {
    pub fn new() -> Result<Self> {
        Ok(Self {
            core: Regex::new(CORE_PATTERN)
                .map_err(|e| SentivolError::Parse(e.to_string()))?,
            ctx: Regex::new(CTX_PATTERN).map_err(|e| SentivolError::Parse(e.to_string()))?,
            oil: Regex::new(OIL_PATTERN).map_err(|e| SentivolError::Parse(e.to_string()))?,
        })
    }

    /// Core + context proximity rule for full article text.
    pub fn is_relevant(&self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        let core_hits: Vec<usize> = self.core.find_iter(text).map(|m| m.start()).collect();
        if core_hits.is_empty() {
            return false;
        }
        let ctx_hits: Vec<usize> = self.ctx.find_iter(text).map(|m| m.start()).collect();
        if ctx_hits.is_empty() {
            return false;
        }
        core_hits
            .iter()
            .any(|&i| ctx_hits.iter().any(|&j| i.abs_diff(j) <= PROXIMITY_CHARS))
    }

    /// Loose oil-topic check for short headline text.
    pub fn is_oil_topic(&self, text: &str) -> bool {
        self.oil.is_match(text)
    }
}

/// Case-insensitive keyword filter for social posts.
pub fn matches_keywords(text: &str, keywords: &[String]) -> bool {
    let blob = text.to_lowercase();
    keywords.iter().any(|k| blob.contains(&k.to_lowercase()))
}
