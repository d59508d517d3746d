//! Wire types for the replies GraphQL response and projection into the
//! output record schema.
//!
//! Only the fixed paths the crawl depends on are typed; everything else in
//! the response is ignored. Per-field tolerance (`Option` / `default`)
//! mirrors what the endpoint actually omits: captions, media blocks, and
//! engagement counters come and go per post, identity fields do not.

use anyhow::{Context, Result};
use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Full response envelope: the replies connection lives at `data.data`.
#[derive(Debug, Deserialize)]
pub(crate) struct RepliesResponse {
    pub data: OuterData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OuterData {
    pub data: RepliesConnection,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RepliesConnection {
    /// Edges stay untyped here so one malformed reply cannot fail the page.
    pub edges: Vec<Value>,
    pub page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PageInfo {
    pub has_next_page: bool,
    #[serde(default)]
    pub end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReplyEdge {
    node: ReplyNode,
}

#[derive(Debug, Deserialize)]
struct ReplyNode {
    thread_items: Vec<ThreadItem>,
}

#[derive(Debug, Deserialize)]
struct ThreadItem {
    post: Post,
}

/// Reply post as served by the endpoint.
#[derive(Debug, Deserialize)]
struct Post {
    id: String,
    code: String,
    taken_at: i64,
    #[serde(default)]
    like_count: u64,
    #[serde(default)]
    text_post_app_info: TextPostAppInfo,
    user: PostUser,
    #[serde(default)]
    caption: Option<Caption>,
    #[serde(default)]
    media_type: i64,
    #[serde(default)]
    accessibility_caption: Option<String>,
    #[serde(default)]
    image_versions2: ImageVersions,
}

#[derive(Debug, Default, Deserialize)]
struct TextPostAppInfo {
    #[serde(default)]
    direct_reply_count: u64,
    #[serde(default)]
    repost_count: u64,
    #[serde(default)]
    quote_count: u64,
}

#[derive(Debug, Deserialize)]
struct PostUser {
    id: String,
    username: String,
    #[serde(default)]
    is_verified: bool,
    #[serde(default)]
    profile_pic_url: String,
}

#[derive(Debug, Default, Deserialize)]
struct Caption {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ImageVersions {
    #[serde(default)]
    candidates: Vec<ImageCandidate>,
}

#[derive(Debug, Deserialize)]
struct ImageCandidate {
    url: String,
}

/// Normalized reply record, one per reply post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplyRecord {
    pub id: String,
    pub code: String,
    /// Local-time `%Y-%m-%d %H:%M:%S` rendering of the post's `taken_at`.
    pub timestamp: String,
    pub like_count: u64,
    pub direct_reply_count: u64,
    pub repost_count: u64,
    pub quote_count: u64,
    pub user_id: String,
    pub username: String,
    pub is_verified: bool,
    pub profile_pic_url: String,
    /// `None` when the post has no caption or its caption text is empty.
    pub text: Option<String>,
    pub media_type: i64,
    pub accessibility_caption: Option<String>,
    /// Image candidate URLs in source order; empty when the post has none.
    pub img_urls: Vec<String>,
}

impl From<Post> for ReplyRecord {
    fn from(post: Post) -> Self {
        Self {
            timestamp: format_taken_at(post.taken_at),
            text: post
                .caption
                .and_then(|c| c.text)
                .filter(|t| !t.is_empty()),
            img_urls: post
                .image_versions2
                .candidates
                .into_iter()
                .map(|c| c.url)
                .collect(),
            id: post.id,
            code: post.code,
            like_count: post.like_count,
            direct_reply_count: post.text_post_app_info.direct_reply_count,
            repost_count: post.text_post_app_info.repost_count,
            quote_count: post.text_post_app_info.quote_count,
            user_id: post.user.id,
            username: post.user.username,
            is_verified: post.user.is_verified,
            profile_pic_url: post.user.profile_pic_url,
            media_type: post.media_type,
            accessibility_caption: post.accessibility_caption,
        }
    }
}

/// Project one reply edge into a record.
///
/// # Errors
///
/// Returns an error when the edge does not match the expected shape or
/// carries no thread items; callers skip such edges.
pub(crate) fn project_edge(edge: Value) -> Result<ReplyRecord> {
    let edge: ReplyEdge =
        serde_json::from_value(edge).context("reply edge does not match the expected shape")?;
    let item = edge
        .node
        .thread_items
        .into_iter()
        .next()
        .context("reply edge has no thread items")?;
    Ok(ReplyRecord::from(item.post))
}

/// Render epoch seconds as a local-time date string.
fn format_taken_at(epoch_secs: i64) -> String {
    Local.timestamp_opt(epoch_secs, 0).earliest().map_or_else(
        || epoch_secs.to_string(),
        |dt| dt.format("%Y-%m-%d %H:%M:%S").to_string(),
    )
}
