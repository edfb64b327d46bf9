//! Host-specific decoders that turn a [`VideoServer`] into playable videos,
//! and the ordered table that picks one for a given embed URL.

use anyhow::Result;
use url::Url;

use crate::http::Fetch;
use crate::types::{Headers, VideoContainer, VideoServer};

pub mod allanime;
pub mod fplayer;
pub mod gogocdn;
pub mod streamsb;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorKind {
    GogoCdn,
    StreamSb,
    FPlayer,
    AllAnime,
}

impl ExtractorKind {
    pub fn name(self) -> &'static str {
        match self {
            ExtractorKind::GogoCdn => "GogoCDN",
            ExtractorKind::StreamSb => "StreamSB",
            ExtractorKind::FPlayer => "FPlayer",
            ExtractorKind::AllAnime => "AllAnime",
        }
    }

    pub async fn extract<F: Fetch>(self, server: &VideoServer, http: &F) -> Result<VideoContainer> {
        match self {
            ExtractorKind::GogoCdn => gogocdn::extract(server, http).await,
            ExtractorKind::StreamSb => streamsb::extract(server, http).await,
            ExtractorKind::FPlayer => fplayer::extract(server, http).await,
            ExtractorKind::AllAnime => allanime::extract(server, http).await,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Substring of the URL host.
    Host(&'static str),
    /// Substring of the URL path.
    Path(&'static str),
}

impl Rule {
    fn matches(self, host: &str, path: &str) -> bool {
        match self {
            Rule::Host(needle) => host.contains(needle),
            Rule::Path(needle) => path.contains(needle),
        }
    }
}

/// Ordered `(rule, extractor)` pairs; the first matching rule wins.
#[derive(Debug, Clone, Default)]
pub struct ExtractorRegistry {
    rules: Vec<(Rule, ExtractorKind)>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, rule: Rule, kind: ExtractorKind) -> Self {
        self.rules.push((rule, kind));
        self
    }

    /// Fails closed: an embed URL without a host picks nothing.
    pub fn select(&self, embed_url: &str) -> Option<ExtractorKind> {
        let url = Url::parse(embed_url).ok()?;
        let host = url.host_str()?;
        let path = url.path();
        self.rules
            .iter()
            .find(|(rule, _)| rule.matches(host, path))
            .map(|(_, kind)| *kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// HLS playlist.
    Manifest,
    /// Single progressive file.
    File,
}

impl StreamKind {
    pub fn is_segmented(self) -> bool {
        self == StreamKind::Manifest
    }

    /// Classifies by the URL path's extension; anything else is rejected.
    pub fn from_url(url: &str) -> Option<Self> {
        let parsed = Url::parse(url).ok()?;
        let path = parsed.path().to_ascii_lowercase();
        if path.ends_with(".m3u8") {
            Some(StreamKind::Manifest)
        } else if path.ends_with(".mp4") {
            Some(StreamKind::File)
        } else {
            None
        }
    }

    /// Falls back to the media type a host declared alongside the URL, but
    /// only when the path carries no extension of its own.
    pub fn from_url_or_type(url: &str, declared: Option<&str>) -> Option<Self> {
        let parsed = Url::parse(url).ok()?;
        let last_segment = parsed.path().rsplit('/').next().unwrap_or_default();
        if last_segment.contains('.') {
            return StreamKind::from_url(url);
        }
        match declared.map(str::to_ascii_lowercase).as_deref() {
            Some("hls" | "m3u8" | "application/x-mpegurl") => Some(StreamKind::Manifest),
            Some("mp4" | "video/mp4") => Some(StreamKind::File),
            _ => None,
        }
    }
}

/// Pulls the leading number out of labels such as `720p` or `HD 1080P`.
pub fn parse_quality(label: &str) -> Option<u32> {
    let digits: String = label
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

pub(crate) fn referer(url: &str) -> Headers {
    let mut headers = Headers::new();
    headers.insert(String::from("Referer"), url.to_string());
    headers
}
