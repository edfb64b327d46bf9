use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use super::StreamKind;
use crate::http::Fetch;
use crate::types::{FileUrl, Headers, Video, VideoContainer, VideoServer};

/// CDN whose direct files refuse playback without this referer.
const REFERER_CDN: &str = "king.stronganime";
const REFERER: &str = "https://allanime.site";

static LANGUAGE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"vo_a_hls_(\w+-\w+)").expect("valid language regex"));

#[derive(Debug, Deserialize)]
struct SourceResponse {
    #[serde(default)]
    links: Vec<SourceLink>,
}

#[derive(Debug, Deserialize)]
struct SourceLink {
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    src: Option<String>,
    #[serde(rename = "resolutionStr", default)]
    resolution: String,
}

/// Untagged links pass; tagged ones pass only for English audio.
pub fn keeps_language(resolution: &str) -> bool {
    match LANGUAGE_TAG.captures(resolution) {
        None => true,
        Some(caps) => caps[1].contains("en"),
    }
}

pub async fn extract<F: Fetch>(server: &VideoServer, http: &F) -> Result<VideoContainer> {
    let response = http.get(&server.embed.url, &server.embed.headers).await?;
    let Some(body) = response.parsed_if_found::<SourceResponse>()? else {
        return Ok(VideoContainer::default());
    };

    let links: Vec<String> = body
        .links
        .into_iter()
        .filter(|link| keeps_language(&link.resolution))
        .filter_map(|link| link.src.or(link.link))
        .collect();

    let mut videos = Vec::with_capacity(links.len());
    for link in links {
        let Some(kind) = StreamKind::from_url(&link) else {
            debug!(%link, "skipping link with unknown media type");
            continue;
        };
        let mut headers = Headers::new();
        if kind == StreamKind::File && link.contains(REFERER_CDN) {
            headers.insert(String::from("Referer"), REFERER.to_string());
        }
        let file = FileUrl { url: link, headers };
        let size = match kind {
            StreamKind::File => http.content_length(&file.url, &file.headers).await,
            StreamKind::Manifest => None,
        };
        videos.push(Video {
            quality: None,
            segmented: kind.is_segmented(),
            file,
            size,
        });
    }

    Ok(VideoContainer { videos })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::mock::MockFetch;

    const EMBED: &str = "https://blog.allanimenews.com/apivtwo/clock.json?id=abc";

    #[test]
    fn language_filter() {
        assert!(keeps_language("1080p"));
        assert!(keeps_language("Hls vo_a_hls_en-US"));
        assert!(!keeps_language("Hls vo_a_hls_ja-JP"));
        assert!(!keeps_language("Hls vo_a_hls_de-DE"));
    }

    #[tokio::test]
    async fn extracts_classified_english_videos() {
        let body = r#"{"links":[
            {"link":"https://cdn.one/master.m3u8","resolutionStr":"Hls vo_a_hls_en-US"},
            {"link":"https://cdn.one/ja.m3u8","resolutionStr":"Hls vo_a_hls_ja-JP"},
            {"src":"https://king.stronganime.xyz/ep1.mp4","link":"ignored","resolutionStr":"1080p"},
            {"link":"https://other.cdn/ep1.mp4","resolutionStr":"720p"},
            {"link":"https://other.cdn/ep1.mkv","resolutionStr":"480p"},
            {"resolutionStr":"no link at all"}
        ]}"#;
        let http = MockFetch::new()
            .route("clock.json", body)
            .size("other.cdn/ep1.mp4", 1024);
        let server = VideoServer::new("Default", EMBED);

        let container = extract(&server, &http).await.unwrap();
        let urls: Vec<&str> = container.videos.iter().map(|v| v.file.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://cdn.one/master.m3u8",
                "https://king.stronganime.xyz/ep1.mp4",
                "https://other.cdn/ep1.mp4",
            ]
        );

        let hls = &container.videos[0];
        assert!(hls.segmented);
        assert!(hls.file.headers.is_empty());

        let king = &container.videos[1];
        assert!(!king.segmented);
        assert_eq!(king.file.headers.get("Referer").map(String::as_str), Some(REFERER));

        let other = &container.videos[2];
        assert!(other.file.headers.is_empty());
        assert_eq!(other.size, Some(1024));
    }

    #[tokio::test]
    async fn error_status_yields_empty_container() {
        let http = MockFetch::new().route_status("clock.json", 404, "gone");
        let server = VideoServer::new("Default", EMBED);
        let container = extract(&server, &http).await.unwrap();
        assert!(container.videos.is_empty());
    }
}
