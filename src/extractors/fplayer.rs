use anyhow::Result;
use serde::Deserialize;
use tracing::debug;

use super::{StreamKind, parse_quality, referer};
use crate::http::Fetch;
use crate::types::{FileUrl, Video, VideoContainer, VideoServer};

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    success: bool,
    /// A source list on success, an error string otherwise.
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiSource {
    file: String,
    #[serde(default)]
    label: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

/// `/v/<id>` embeds are served by `/api/source/<id>`.
pub fn api_url(embed_url: &str) -> String {
    embed_url.replacen("/v/", "/api/source/", 1)
}

pub async fn extract<F: Fetch>(server: &VideoServer, http: &F) -> Result<VideoContainer> {
    let response = http
        .post(&api_url(&server.embed.url), &referer(&server.embed.url))
        .await?;
    let Some(body) = response.parsed_if_found::<ApiResponse>()? else {
        return Ok(VideoContainer::default());
    };
    if !body.success {
        debug!(url = %server.embed.url, "fplayer reported no sources");
        return Ok(VideoContainer::default());
    }

    let sources: Vec<ApiSource> = serde_json::from_value(body.data)?;
    let mut videos = Vec::with_capacity(sources.len());
    for source in sources {
        let Some(kind) = StreamKind::from_url_or_type(&source.file, source.kind.as_deref()) else {
            continue;
        };
        let file = FileUrl::new(source.file);
        let size = match kind {
            StreamKind::File => http.content_length(&file.url, &file.headers).await,
            StreamKind::Manifest => None,
        };
        videos.push(Video {
            quality: parse_quality(&source.label),
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

    #[tokio::test]
    async fn maps_sources_with_quality() {
        let http = MockFetch::new()
            .route(
                "/api/source/",
                r#"{"success":true,"data":[
                    {"file":"https://fvs.io/redirector?token=a","label":"480p","type":"mp4"},
                    {"file":"https://fvs.io/redirector?token=b","label":"720p","type":"mp4"},
                    {"file":"https://fvs.io/redirector?token=c","label":"1080p","type":"webm"},
                    {"file":"https://cdn.test/ep1.mkv","label":"1080p","type":"mp4"}
                ]}"#,
            )
            .size("token=b", 5000);
        let server = VideoServer::new("FPlayer", "https://fplayer.info/v/abc");
        let container = extract(&server, &http).await.unwrap();

        let qualities: Vec<Option<u32>> = container.videos.iter().map(|v| v.quality).collect();
        assert_eq!(qualities, vec![Some(480), Some(720)]);
        assert!(container.videos.iter().all(|v| !v.segmented));
        // a declared type never overrides a foreign extension
        assert!(container.videos.iter().all(|v| !v.file.url.ends_with(".mkv")));
        assert_eq!(container.videos[1].size, Some(5000));
        assert_eq!(http.requests(), vec!["https://fplayer.info/api/source/abc"]);
    }

    #[tokio::test]
    async fn unsuccessful_response_is_empty() {
        let http = MockFetch::new().route("/api/source/", r#"{"success":false,"data":"Video not found"}"#);
        let server = VideoServer::new("FPlayer", "https://fembed.com/v/gone");
        let container = extract(&server, &http).await.unwrap();
        assert!(container.videos.is_empty());
    }
}
