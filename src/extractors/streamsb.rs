use anyhow::{Result, anyhow};
use serde::Deserialize;
use url::Url;

use super::StreamKind;
use crate::http::Fetch;
use crate::types::{FileUrl, Headers, Video, VideoContainer, VideoServer};

const SOURCES_PATH: &str = "sources48";

#[derive(Debug, Deserialize)]
struct SourcesResponse {
    stream_data: Option<StreamData>,
}

#[derive(Debug, Deserialize)]
struct StreamData {
    file: Option<String>,
    #[serde(default)]
    backup: Option<String>,
}

/// `https://host/e/<id>.html` -> `<id>`
pub fn media_id(embed_url: &str) -> Option<String> {
    let url = Url::parse(embed_url).ok()?;
    let id = url
        .path()
        .split_once("/e/")?
        .1
        .trim_end_matches('/')
        .trim_end_matches(".html");
    (!id.is_empty()).then(|| id.to_string())
}

pub fn hex_encode(input: &str) -> String {
    input.bytes().map(|b| format!("{b:02x}")).collect()
}

pub fn sources_url(embed_url: &str) -> Option<String> {
    let url = Url::parse(embed_url).ok()?;
    let host = url.host_str()?;
    let id = media_id(embed_url)?;
    let token = hex_encode(&format!("||{id}||||streamsb"));
    Some(format!("https://{host}/{SOURCES_PATH}/{token}/"))
}

pub async fn extract<F: Fetch>(server: &VideoServer, http: &F) -> Result<VideoContainer> {
    let url = sources_url(&server.embed.url)
        .ok_or_else(|| anyhow!("unrecognised StreamSB embed {}", server.embed.url))?;
    let mut headers = Headers::new();
    headers.insert(String::from("watchsb"), String::from("sbstream"));
    headers.insert(String::from("Referer"), server.embed.url.clone());

    let response = http.get(&url, &headers).await?;
    let Some(body) = response.parsed_if_found::<SourcesResponse>()? else {
        return Ok(VideoContainer::default());
    };
    let Some(stream) = body.stream_data else {
        return Ok(VideoContainer::default());
    };

    let mut playback = Headers::new();
    playback.insert(String::from("Referer"), server.embed.url.clone());
    let videos = [stream.file, stream.backup]
        .into_iter()
        .flatten()
        .filter_map(|file| {
            let kind = StreamKind::from_url_or_type(&file, Some("hls"))?;
            Some(Video {
                quality: None,
                segmented: kind.is_segmented(),
                file: FileUrl {
                    url: file,
                    headers: playback.clone(),
                },
                size: None,
            })
        })
        .collect();
    Ok(VideoContainer { videos })
}
