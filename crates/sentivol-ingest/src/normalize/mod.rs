//! Raw item normalization
//!
//! Pure translation from provider payload fragments into canonical
//! records. Each raw item yields at most one record: items that fail the
//! topic filters, carry placeholder values, or are missing required
//! fields are dropped, never errored. No I/O happens here, so the same
//! input always produces the same output.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sentivol_common::{CanonicalRecord, Category, Payload, Result, Source};
use serde_json::Value;
use tracing::trace;

use crate::adapter::RawItem;
use crate::identity;

pub mod relevance;

pub use relevance::{matches_keywords, RelevanceFilter};

pub struct Normalizer {
    relevance: RelevanceFilter,
    social_keywords: Vec<String>,
}

impl Normalizer {
    pub fn new(social_keywords: Vec<String>) -> Result<Self> {
        Ok(Self {
            relevance: RelevanceFilter::new()?,
            social_keywords,
        })
    }

    /// Normalize one raw item. `observed_at` is the batch fetch time and
    /// becomes the record's recency marker for last-write-wins merging.
    pub fn normalize(&self, item: &RawItem, observed_at: DateTime<Utc>) -> Option<CanonicalRecord> {
        let record = match item.source {
            Source::NewsApi => self.news_article(&item.value, observed_at),
            Source::Finnhub => self.finnhub_article(&item.value, observed_at),
            Source::YahooRss => self.feed_headline(&item.value, observed_at),
            Source::Reddit => self.social_post(&item.value, observed_at),
            Source::YouTube => video_comment(&item.value, observed_at),
            Source::Fred => macro_observation(&item.value, observed_at),
            Source::YahooFinance => market_bar(&item.value, observed_at),
        };
        if record.is_none() {
            trace!(source = %item.source, "item dropped by normalizer");
        }
        record
    }

    fn news_article(&self, v: &Value, observed_at: DateTime<Utc>) -> Option<CanonicalRecord> {
        let title = non_empty_str(&v["title"])?;
        let description = v["description"].as_str().unwrap_or_default().to_string();
        if !self
            .relevance
            .is_relevant(&format!("{} {}", title, description))
        {
            return None;
        }
        let url = non_empty_str(&v["url"]);
        let published_at = parse_rfc3339(&v["publishedAt"]);
        Some(CanonicalRecord {
            source: Source::NewsApi,
            category: Category::News,
            identity_key: identity::article_key(url.as_deref(), &title, published_at),
            observed_at,
            event_time: published_at,
            payload: Payload::Article {
                title,
                description,
                url,
                author: non_empty_str(&v["author"]),
            },
        })
    }

    fn finnhub_article(&self, v: &Value, observed_at: DateTime<Utc>) -> Option<CanonicalRecord> {
        let title = non_empty_str(&v["headline"])?;
        let description = v["summary"].as_str().unwrap_or_default().to_string();
        if !self
            .relevance
            .is_relevant(&format!("{} {}", title, description))
        {
            return None;
        }
        let url = non_empty_str(&v["url"]);
        let published_at = v["datetime"]
            .as_i64()
            .and_then(|secs| DateTime::from_timestamp(secs, 0));
        let identity_key = match v["id"].as_i64() {
            Some(id) => identity::provider_key(Source::Finnhub, &id.to_string()),
            None => identity::article_key(url.as_deref(), &title, published_at),
        };
        Some(CanonicalRecord {
            source: Source::Finnhub,
            category: Category::News,
            identity_key,
            observed_at,
            event_time: published_at,
            payload: Payload::Article {
                title,
                description,
                url,
                author: non_empty_str(&v["source"]),
            },
        })
    }

    fn feed_headline(&self, v: &Value, observed_at: DateTime<Utc>) -> Option<CanonicalRecord> {
        let title = non_empty_str(&v["title"])?;
        let description = v["description"].as_str().unwrap_or_default().to_string();
        // Headlines are short; the proximity rule is too strict here.
        if !self
            .relevance
            .is_oil_topic(&format!("{} {}", title, description))
        {
            return None;
        }
        let link = v["link"].as_str().unwrap_or_default().to_string();
        let published_at = v["pub_date"]
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc2822(s).ok())
            .map(|t| t.with_timezone(&Utc));
        Some(CanonicalRecord {
            source: Source::YahooRss,
            category: Category::News,
            identity_key: identity::feed_key(&title, published_at, &link),
            observed_at,
            event_time: published_at,
            payload: Payload::Article {
                title,
                description,
                url: non_empty_str(&v["link"]),
                author: None,
            },
        })
    }

    fn social_post(&self, v: &Value, observed_at: DateTime<Utc>) -> Option<CanonicalRecord> {
        let id = non_empty_str(&v["id"])?;
        let title = v["title"].as_str().unwrap_or_default().to_string();
        let body = v["selftext"].as_str().unwrap_or_default().to_string();
        if !matches_keywords(&format!("{} {}", title, body), &self.social_keywords) {
            return None;
        }
        let event_time = v["created_utc"]
            .as_f64()
            .and_then(|secs| DateTime::from_timestamp(secs as i64, 0));
        Some(CanonicalRecord {
            source: Source::Reddit,
            category: Category::SocialPost,
            identity_key: identity::provider_key(Source::Reddit, &id),
            observed_at,
            event_time,
            payload: Payload::Post {
                subreddit: v["subreddit"].as_str().unwrap_or_default().to_string(),
                author: non_empty_str(&v["author"]),
                title,
                body,
                url: v["permalink"]
                    .as_str()
                    .map(|p| format!("https://www.reddit.com{}", p))
                    .unwrap_or_default(),
                score: v["score"].as_i64().unwrap_or(0),
                num_comments: v["num_comments"].as_i64().unwrap_or(0),
            },
        })
    }
}

fn video_comment(v: &Value, observed_at: DateTime<Utc>) -> Option<CanonicalRecord> {
    let comment_id = non_empty_str(&v["comment_id"])?;
    let text = non_empty_str(&v["textOriginal"]).or_else(|| non_empty_str(&v["textDisplay"]))?;
    Some(CanonicalRecord {
        source: Source::YouTube,
        category: Category::VideoComment,
        identity_key: identity::provider_key(Source::YouTube, &comment_id),
        observed_at,
        event_time: parse_rfc3339(&v["publishedAt"]),
        payload: Payload::Comment {
            video_id: v["video_id"].as_str().unwrap_or_default().to_string(),
            keyword: v["keyword"].as_str().unwrap_or_default().to_string(),
            author: non_empty_str(&v["authorDisplayName"]),
            text,
            like_count: v["likeCount"].as_i64().unwrap_or(0),
        },
    })
}

fn macro_observation(v: &Value, observed_at: DateTime<Utc>) -> Option<CanonicalRecord> {
    let series_id = non_empty_str(&v["series_id"])?;
    // FRED publishes "." for not-yet-available periods.
    let raw_value = non_empty_str(&v["value"])?;
    if raw_value == "." {
        return None;
    }
    let value: f64 = raw_value.parse().ok()?;
    let period: NaiveDate = v["date"].as_str().and_then(|d| d.parse().ok())?;
    // Revision marker: when the observation was (re)published.
    let event_time = v["realtime_start"]
        .as_str()
        .and_then(|d| d.parse::<NaiveDate>().ok())
        .map(|d| d.and_time(NaiveTime::MIN).and_utc());
    Some(CanonicalRecord {
        source: Source::Fred,
        category: Category::MacroSeries,
        identity_key: identity::series_key(&series_id, period),
        observed_at,
        event_time,
        payload: Payload::Observation {
            series_id,
            period,
            value,
            units: non_empty_str(&v["units"]),
        },
    })
}

fn market_bar(v: &Value, observed_at: DateTime<Utc>) -> Option<CanonicalRecord> {
    let ticker = non_empty_str(&v["ticker"])?;
    let interval = non_empty_str(&v["interval"])?;
    let ts = v["ts"]
        .as_i64()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))?;
    let (open, high, low, close) = (
        v["open"].as_f64(),
        v["high"].as_f64(),
        v["low"].as_f64(),
        v["close"].as_f64(),
    );
    // Exchange holidays come through as all-null bars.
    if open.is_none() && high.is_none() && low.is_none() && close.is_none() {
        return None;
    }
    Some(CanonicalRecord {
        source: Source::YahooFinance,
        category: Category::MarketBar,
        identity_key: identity::bar_key(&ticker, ts, &interval),
        observed_at,
        event_time: Some(ts),
        payload: Payload::Bar {
            ticker,
            interval,
            open,
            high,
            low,
            close,
            volume: v["volume"].as_f64(),
        },
    })
}

fn non_empty_str(v: &Value) -> Option<String> {
    v.as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn parse_rfc3339(v: &Value) -> Option<DateTime<Utc>> {
    v.as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn normalizer() -> Normalizer {
        Normalizer::new(vec!["wti".into(), "crude".into(), "opec".into()]).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn test_news_article_normalizes() {
        let item = RawItem::new(
            Source::NewsApi,
            json!({
                "title": "Brent futures slip on rising inventories",
                "description": "Crude benchmarks fell.",
                "url": "https://news.example/brent",
                "author": "Jo Writer",
                "publishedAt": "2026-08-17T09:15:00Z"
            }),
        );
        let record = normalizer().normalize(&item, now()).unwrap();
        assert_eq!(record.category, Category::News);
        assert!(record.event_time.is_some());
        match record.payload {
            Payload::Article { title, url, .. } => {
                assert_eq!(title, "Brent futures slip on rising inventories");
                assert_eq!(url.as_deref(), Some("https://news.example/brent"));
            },
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn test_irrelevant_article_is_dropped() {
        let item = RawItem::new(
            Source::NewsApi,
            json!({
                "title": "Ten easy weeknight dinners",
                "description": "Pasta and more.",
                "url": "https://news.example/dinners"
            }),
        );
        assert!(normalizer().normalize(&item, now()).is_none());
    }

    #[test]
    fn test_article_without_title_is_dropped() {
        let item = RawItem::new(
            Source::NewsApi,
            json!({ "description": "crude oil prices", "url": "https://x.example" }),
        );
        assert!(normalizer().normalize(&item, now()).is_none());
    }

    #[test]
    fn test_finnhub_uses_provider_id_when_present() {
        let item = RawItem::new(
            Source::Finnhub,
            json!({
                "id": 7542931,
                "headline": "OPEC weighs production cuts",
                "summary": "Supply decision expected.",
                "url": "https://finnhub.example/a",
                "datetime": 1767225600,
                "source": "Reuters"
            }),
        );
        let record = normalizer().normalize(&item, now()).unwrap();
        assert_eq!(record.identity_key, "finnhub:7542931");
    }

    #[test]
    fn test_social_post_keyword_filter() {
        let base = json!({
            "id": "1abcd2",
            "subreddit": "energy",
            "author": "trader9",
            "title": "WTI term structure flipped",
            "selftext": "",
            "permalink": "/r/energy/comments/1abcd2/",
            "score": 42,
            "num_comments": 7,
            "created_utc": 1767225600.0
        });
        let record = normalizer()
            .normalize(&RawItem::new(Source::Reddit, base.clone()), now())
            .unwrap();
        assert_eq!(record.identity_key, "reddit:1abcd2");

        let mut off_topic = base;
        off_topic["title"] = json!("My sourdough starter journey");
        assert!(normalizer()
            .normalize(&RawItem::new(Source::Reddit, off_topic), now())
            .is_none());
    }

    #[test]
    fn test_video_comment_requires_text() {
        let item = RawItem::new(
            Source::YouTube,
            json!({
                "comment_id": "UgxK",
                "video_id": "vid1",
                "keyword": "crude oil",
                "textDisplay": "",
                "likeCount": 3
            }),
        );
        assert!(normalizer().normalize(&item, now()).is_none());
    }

    #[test]
    fn test_macro_observation_drops_placeholder_value() {
        let missing = RawItem::new(
            Source::Fred,
            json!({
                "series_id": "CPIAUCSL",
                "date": "2026-07-01",
                "value": ".",
                "realtime_start": "2026-08-12",
                "units": "lin"
            }),
        );
        assert!(normalizer().normalize(&missing, now()).is_none());

        let mut present = missing.value.clone();
        present["value"] = json!("321.4");
        let record = normalizer()
            .normalize(&RawItem::new(Source::Fred, present), now())
            .unwrap();
        assert_eq!(record.identity_key, "CPIAUCSL:2026-07-01");
        assert_eq!(record.category, Category::MacroSeries);
        // realtime_start becomes the revision marker
        assert!(record.event_time.is_some());
    }

    #[test]
    fn test_market_bar_drops_all_null_rows() {
        let holiday = RawItem::new(
            Source::YahooFinance,
            json!({
                "ticker": "CL=F",
                "ts": 1767225600,
                "interval": "1d",
                "open": null, "high": null, "low": null, "close": null,
                "volume": null
            }),
        );
        assert!(normalizer().normalize(&holiday, now()).is_none());

        let mut traded = holiday.value.clone();
        traded["open"] = json!(71.2);
        traded["close"] = json!(72.0);
        let record = normalizer()
            .normalize(&RawItem::new(Source::YahooFinance, traded), now())
            .unwrap();
        assert_eq!(record.category, Category::MarketBar);
        assert!(record.identity_key.starts_with("CL=F:"));
    }
}
