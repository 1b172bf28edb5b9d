//! YouTube comment adapter
//!
//! Three-stage walk of the YouTube Data API v3:
//!
//! 1. first page: `search.list` per configured keyword, collecting video
//!    candidates published inside the window,
//! 2. still first page: `videos.list` statistics to drop videos whose
//!    comment count is zero or whose comments are disabled, so the
//!    comment walk never trips the provider's 403 for disabled comments,
//! 3. subsequent pages: `commentThreads.list` per surviving video, paged
//!    with the provider token and capped per video.
//!
//! The cursor is a JSON-encoded [`Cursor`] carrying the video plan and the
//! walk position, so each `fetch_page` call stays self-contained.

use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::Client;
use sentivol_common::Source;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{build_client, get_json, AdapterError, FetchPage, FetchWindow, RawItem, SourceAdapter};

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com";
const SEARCH_PAGE_SIZE: usize = 50;
const COMMENTS_PAGE_SIZE: usize = 100;

pub struct YouTubeAdapter {
    client: Client,
    base_url: String,
    api_key: String,
    keywords: Vec<String>,
    max_videos_per_keyword: usize,
    max_comments_per_video: usize,
}

/// A video selected for the comment walk, tagged with the keyword that
/// surfaced it.
#[derive(Debug, Serialize, Deserialize)]
struct VideoRef {
    video_id: String,
    keyword: String,
}

/// Walk position across the video plan.
#[derive(Debug, Serialize, Deserialize)]
struct Cursor {
    videos: Vec<VideoRef>,
    idx: usize,
    page_token: Option<String>,
    fetched_for_video: usize,
}

impl Cursor {
    fn encode(&self) -> Result<String, AdapterError> {
        serde_json::to_string(self).map_err(|e| AdapterError::Malformed(e.to_string()))
    }

    fn decode(token: &str) -> Result<Self, AdapterError> {
        serde_json::from_str(token)
            .map_err(|e| AdapterError::Malformed(format!("bad cursor: {}", e)))
    }

    fn advance_video(mut self) -> Self {
        self.idx += 1;
        self.page_token = None;
        self.fetched_for_video = 0;
        self
    }
}

impl YouTubeAdapter {
    pub fn new(
        api_key: &str,
        keywords: Vec<String>,
        max_videos_per_keyword: usize,
        max_comments_per_video: usize,
        timeout_secs: u64,
    ) -> Result<Self, AdapterError> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.to_string(),
            keywords,
            max_videos_per_keyword,
            max_comments_per_video,
        })
    }

    /// Override the provider endpoint (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn search_keyword(
        &self,
        keyword: &str,
        window: &FetchWindow,
    ) -> Result<Vec<String>, AdapterError> {
        let url = format!("{}/youtube/v3/search", self.base_url);
        let params = [
            ("part", "id".to_string()),
            ("q", keyword.to_string()),
            ("type", "video".to_string()),
            ("order", "relevance".to_string()),
            ("maxResults", SEARCH_PAGE_SIZE.to_string()),
            (
                "publishedAfter",
                window.start.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            ("key", self.api_key.clone()),
        ];
        let body = get_json(&self.client, &url, &params).await?;
        let ids = body["items"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|i| i["id"]["videoId"].as_str().map(String::from))
                    .take(self.max_videos_per_keyword)
                    .collect()
            })
            .unwrap_or_default();
        Ok(ids)
    }

    /// Keep only videos that report a nonzero comment count. Videos with
    /// comments disabled omit the `commentCount` field entirely.
    async fn commentable_videos(&self, ids: &[String]) -> Result<Vec<String>, AdapterError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let url = format!("{}/youtube/v3/videos", self.base_url);
        let params = [
            ("part", "statistics".to_string()),
            ("id", ids.join(",")),
            ("key", self.api_key.clone()),
        ];
        let body = get_json(&self.client, &url, &params).await?;
        let keep = body["items"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|i| {
                        let count: u64 = i["statistics"]["commentCount"]
                            .as_str()
                            .and_then(|c| c.parse().ok())
                            .or_else(|| i["statistics"]["commentCount"].as_u64())?;
                        (count > 0).then(|| i["id"].as_str().map(String::from))?
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(keep)
    }

    /// Build the video plan for a run.
    async fn plan(&self, window: &FetchWindow) -> Result<Cursor, AdapterError> {
        let mut videos = Vec::new();
        for keyword in &self.keywords {
            let candidates = self.search_keyword(keyword, window).await?;
            let commentable = self.commentable_videos(&candidates).await?;
            debug!(
                keyword = %keyword,
                candidates = candidates.len(),
                commentable = commentable.len(),
                "YouTube search done"
            );
            for video_id in commentable {
                videos.push(VideoRef {
                    video_id,
                    keyword: keyword.clone(),
                });
            }
        }
        Ok(Cursor {
            videos,
            idx: 0,
            page_token: None,
            fetched_for_video: 0,
        })
    }
}

#[async_trait]
impl SourceAdapter for YouTubeAdapter {
    fn source(&self) -> Source {
        Source::YouTube
    }

    async fn fetch_page(
        &self,
        window: &FetchWindow,
        page_token: Option<&str>,
    ) -> Result<FetchPage, AdapterError> {
        let cursor = match page_token {
            None => {
                // First call builds the plan; comments start on page two.
                let cursor = self.plan(window).await?;
                if cursor.videos.is_empty() {
                    return Ok(FetchPage::last(vec![]));
                }
                return Ok(FetchPage {
                    items: vec![],
                    next_page: Some(cursor.encode()?),
                });
            },
            Some(token) => Cursor::decode(token)?,
        };

        let Some(video) = cursor.videos.get(cursor.idx) else {
            return Ok(FetchPage::last(vec![]));
        };

        let url = format!("{}/youtube/v3/commentThreads", self.base_url);
        let mut params = vec![
            ("part", "snippet".to_string()),
            ("videoId", video.video_id.clone()),
            ("textFormat", "plainText".to_string()),
            ("maxResults", COMMENTS_PAGE_SIZE.to_string()),
            ("key", self.api_key.clone()),
        ];
        if let Some(token) = &cursor.page_token {
            params.push(("pageToken", token.clone()));
        }

        let body = match get_json(&self.client, &url, &params).await {
            Ok(body) => body,
            // Comments can be disabled between the statistics check and
            // the walk; skip the video instead of failing the run.
            Err(AdapterError::Unauthorized(msg)) if cursor.page_token.is_none() => {
                warn!(video_id = %video.video_id, %msg, "comments unavailable, skipping video");
                let next = cursor.advance_video();
                return Ok(FetchPage {
                    items: vec![],
                    next_page: Some(next.encode()?),
                });
            },
            Err(e) => return Err(e),
        };

        let threads = body["items"].as_array().cloned().unwrap_or_default();
        let items: Vec<RawItem> = threads
            .iter()
            .filter_map(|t| {
                let comment = &t["snippet"]["topLevelComment"];
                let mut value = comment["snippet"].clone();
                let map = value.as_object_mut()?;
                map.insert(
                    "comment_id".to_string(),
                    comment["id"].as_str().unwrap_or_default().into(),
                );
                map.insert("video_id".to_string(), video.video_id.clone().into());
                map.insert("keyword".to_string(), video.keyword.clone().into());
                Some(RawItem::new(Source::YouTube, value))
            })
            .collect();

        let fetched = cursor.fetched_for_video + items.len();
        let provider_next = body["nextPageToken"].as_str().map(String::from);

        let next = match provider_next {
            Some(token) if fetched < self.max_comments_per_video => Cursor {
                page_token: Some(token),
                fetched_for_video: fetched,
                ..cursor
            },
            _ => cursor.advance_video(),
        };

        let next_page = if next.idx < next.videos.len() {
            Some(next.encode()?)
        } else {
            None
        };

        Ok(FetchPage { items, next_page })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_round_trip() {
        let cursor = Cursor {
            videos: vec![VideoRef {
                video_id: "abc123".into(),
                keyword: "crude oil".into(),
            }],
            idx: 0,
            page_token: Some("tok".into()),
            fetched_for_video: 200,
        };
        let decoded = Cursor::decode(&cursor.encode().unwrap()).unwrap();
        assert_eq!(decoded.videos[0].video_id, "abc123");
        assert_eq!(decoded.page_token.as_deref(), Some("tok"));
        assert_eq!(decoded.fetched_for_video, 200);
    }

    #[test]
    fn test_cursor_decode_rejects_garbage() {
        assert!(matches!(
            Cursor::decode("not json"),
            Err(AdapterError::Malformed(_))
        ));
    }

    #[test]
    fn test_advance_video_resets_walk_state() {
        let cursor = Cursor {
            videos: vec![],
            idx: 3,
            page_token: Some("tok".into()),
            fetched_for_video: 450,
        };
        let next = cursor.advance_video();
        assert_eq!(next.idx, 4);
        assert!(next.page_token.is_none());
        assert_eq!(next.fetched_for_video, 0);
    }
}
