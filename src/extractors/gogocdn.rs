use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use scraper::{Html, Selector};

use super::{StreamKind, parse_quality, referer};
use crate::http::Fetch;
use crate::types::{FileUrl, Video, VideoContainer, VideoServer};

static PLAYER_SOURCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"file\s*:\s*['"](?P<file>[^'"]+)['"](?:\s*,\s*label\s*:\s*['"](?P<label>[^'"]*)['"])?(?:\s*,\s*['"]?type['"]?\s*:\s*['"](?P<type>[^'"]*)['"])?"#,
    )
    .expect("valid player source regex")
});

#[derive(Debug, Clone, PartialEq)]
struct Candidate {
    file: String,
    label: Option<String>,
    kind: Option<String>,
}

/// Collects the player's `file:` entries and any `<source>` elements.
fn candidates(page: &str) -> Vec<Candidate> {
    let doc = Html::parse_document(page);
    let script_sel = Selector::parse("script").expect("valid CSS selector");
    let source_sel = Selector::parse("video source[src]").expect("valid CSS selector");

    let mut found = Vec::new();
    for script in doc.select(&script_sel) {
        let text: String = script.text().collect();
        for caps in PLAYER_SOURCE.captures_iter(&text) {
            found.push(Candidate {
                file: caps["file"].to_string(),
                label: caps.name("label").map(|m| m.as_str().to_string()),
                kind: caps.name("type").map(|m| m.as_str().to_string()),
            });
        }
    }
    for source in doc.select(&source_sel) {
        let Some(src) = source.value().attr("src") else {
            continue;
        };
        found.push(Candidate {
            file: src.to_string(),
            label: source.value().attr("label").map(str::to_string),
            kind: source.value().attr("type").map(str::to_string),
        });
    }
    found.dedup_by(|a, b| a.file == b.file);
    found
}

pub async fn extract<F: Fetch>(server: &VideoServer, http: &F) -> Result<VideoContainer> {
    let response = http.get(&server.embed.url, &server.embed.headers).await?;
    if !response.has_data() {
        return Ok(VideoContainer::default());
    }

    let mut videos = Vec::new();
    for candidate in candidates(&response.text) {
        let Some(kind) = StreamKind::from_url_or_type(&candidate.file, candidate.kind.as_deref())
        else {
            continue;
        };
        let file = FileUrl {
            headers: referer(&server.embed.url),
            url: candidate.file,
        };
        let size = match kind {
            StreamKind::File => http.content_length(&file.url, &file.headers).await,
            StreamKind::Manifest => None,
        };
        videos.push(Video {
            quality: candidate.label.as_deref().and_then(parse_quality),
            segmented: kind.is_segmented(),
            file,
            size,
        });
    }
    Ok(VideoContainer { videos })
}
