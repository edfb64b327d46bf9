use std::sync::{Arc, LazyLock};

use anyhow::Result;
use regex::Regex;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use url::Url;

use super::{AnimeProvider, Extra, Source, unique_server_name};
use crate::diagnostics::Diagnostics;
use crate::extractors::{ExtractorKind, ExtractorRegistry, Rule};
use crate::http::{Fetch, HttpClient};
use crate::types::{
    Episode, FileUrl, Headers, ShowResponse, Translation, VideoContainer, VideoServer,
    format_episode_number,
};

const HOST_URL: &str = "https://allanime.site";
const HOST_NAME: &str = "allanime.site";
/// Relative source paths are served from here.
const API_HOST: &str = "https://blog.allanimenews.com/";

const SEARCH_HASH: &str = "9343797cc3d9e3f444e2d3b7db9a84d759b816a4d84512ea72d079f85bb96e98";
const SHOWS_WITH_IDS_HASH: &str =
    "73492472c6af978c1ab89f7a177f8471a7cae41dadb95bcb9099d5e5caa2a8f9";
const EPISODE_INFOS_HASH: &str =
    "73d998d209d6d8de325db91ed8f65716dce2a1c5f4df7d304d952fa3f223c9e8";
const EPISODE_SOURCES_HASH: &str =
    "29f49ce1a69320b2ab11a475fd114e5c07b03a7dc683f77dd502ca42b26df232";

/// Obfuscated source paths are hex bytes XOR-ed with this key.
const SOURCE_PATH_KEY: u8 = 0x38;

static SHOW_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"{}/anime/(\w+)", regex::escape(HOST_URL))).expect("valid show id regex")
});
static EPISODE_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/[sd]ub/(\d+(?:\.\d+)?)").expect("valid episode number regex")
});

pub fn default_registry() -> ExtractorRegistry {
    ExtractorRegistry::new()
        .register(Rule::Host("gogo"), ExtractorKind::GogoCdn)
        .register(Rule::Host("goload"), ExtractorKind::GogoCdn)
        .register(Rule::Host("sb"), ExtractorKind::StreamSb)
        .register(Rule::Host("fplayer"), ExtractorKind::FPlayer)
        .register(Rule::Host("fembed"), ExtractorKind::FPlayer)
        .register(Rule::Path("apivtwo"), ExtractorKind::AllAnime)
}

pub struct AllAnimeClient<F = HttpClient> {
    http: F,
    diagnostics: Arc<dyn Diagnostics>,
    registry: ExtractorRegistry,
    translation: Translation,
    allow_adult: bool,
}

impl<F: Fetch> AllAnimeClient<F> {
    pub fn new(http: F, diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self {
            http,
            diagnostics,
            registry: default_registry(),
            translation: Translation::Sub,
            allow_adult: false,
        }
    }

    pub fn with_translation(mut self, translation: Translation) -> Self {
        self.translation = translation;
        self
    }

    pub fn with_allow_adult(mut self, allow_adult: bool) -> Self {
        self.allow_adult = allow_adult;
        self
    }

    pub fn with_registry(mut self, registry: ExtractorRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Persisted-query GET; `None` when the catalog returned no data.
    async fn graphql_query<T: DeserializeOwned>(
        &self,
        variables: serde_json::Value,
        hash: &str,
    ) -> Result<Option<T>> {
        let extensions = serde_json::json!({
            "persistedQuery": { "version": 1, "sha256Hash": hash }
        });
        let url = Url::parse_with_params(
            &format!("{HOST_URL}/graphql"),
            &[
                ("variables", variables.to_string()),
                ("extensions", extensions.to_string()),
            ],
        )?;
        let mut headers = Headers::new();
        headers.insert(String::from("Host"), HOST_NAME.to_string());
        let response = self.http.get(url.as_str(), &headers).await?;
        let envelope: Option<GraphQlEnvelope<T>> = response.parsed_if_found()?;
        Ok(envelope.and_then(|envelope| envelope.data))
    }

    async fn episode_infos(&self, show_id: &str) -> Result<Option<Vec<EpisodeInfo>>> {
        let variables = serde_json::json!({ "ids": [show_id] });
        let Some(payload) = self
            .graphql_query::<ShowsWithIdsPayload>(variables, SHOWS_WITH_IDS_HASH)
            .await?
        else {
            return Ok(None);
        };
        let Some(show) = payload.shows_with_ids.into_iter().next() else {
            return Ok(None);
        };
        let count = show.available_episodes.count(self.translation);
        debug!(show_id, count, translation = self.translation.as_str(), "episode count");

        let variables = serde_json::json!({
            "showId": show_id,
            "episodeNumStart": 0,
            "episodeNumEnd": count,
        });
        Ok(self
            .graphql_query::<EpisodeInfosPayload>(variables, EPISODE_INFOS_HASH)
            .await?
            .map(|payload| payload.episode_infos))
    }

    fn episode_link(&self, show_id: &str, number: &str) -> String {
        format!(
            "{HOST_URL}/anime/{show_id}/episodes/{}/{number}",
            self.translation.as_str()
        )
    }
}

impl<F: Fetch> Source for AllAnimeClient<F> {
    fn name(&self) -> &'static str {
        "AllAnime"
    }

    fn save_name(&self) -> &'static str {
        "all_anime"
    }

    fn host_url(&self) -> &'static str {
        HOST_URL
    }
}

impl<F: Fetch> AnimeProvider for AllAnimeClient<F> {
    fn is_dub_available_separately(&self) -> bool {
        true
    }

    fn translation(&self) -> Translation {
        self.translation
    }

    fn set_translation(&mut self, translation: Translation) {
        self.translation = translation;
    }

    async fn search(&self, query: &str) -> Result<Vec<ShowResponse>> {
        let variables = serde_json::json!({
            "search": { "allowAdult": self.allow_adult, "query": query },
            "translationType": self.translation.as_str(),
        });
        let Some(payload) = self
            .graphql_query::<SearchPayload>(variables, SEARCH_HASH)
            .await?
        else {
            return Ok(Vec::new());
        };

        let mut results = Vec::new();
        for show in payload.shows.edges {
            let Some(thumbnail) = show.thumbnail else {
                self.diagnostics
                    .notify(&format!("Could not get thumbnail for {}", show.id));
                continue;
            };
            let other_names = show
                .english_name
                .into_iter()
                .chain(show.native_name)
                .chain(show.alt_names.unwrap_or_default())
                .collect();
            results.push(ShowResponse {
                link: format!("{HOST_URL}/anime/{}", show.id),
                name: show.name,
                cover_url: FileUrl::new(thumbnail),
                other_names,
                total: Some(show.available_episodes.count(self.translation)),
                extra: None,
            });
        }
        info!(query, results = results.len(), "search finished");
        Ok(results)
    }

    async fn load_episodes(&self, show_link: &str, _extra: Option<&Extra>) -> Result<Vec<Episode>> {
        let Some(show_id) = show_id(show_link) else {
            self.diagnostics
                .notify(&format!("Unrecognised show link {show_link}"));
            return Ok(Vec::new());
        };
        let Some(mut infos) = self.episode_infos(&show_id).await? else {
            return Ok(Vec::new());
        };
        infos.sort_by(|a, b| a.episode_id_num.total_cmp(&b.episode_id_num));

        Ok(infos
            .into_iter()
            .map(|info| {
                let number = format_episode_number(info.episode_id_num);
                Episode {
                    link: self.episode_link(&show_id, &number),
                    number,
                    notes: info.notes,
                    thumbnail: info
                        .thumbnails
                        .and_then(|thumbs| thumbs.into_iter().next())
                        .map(FileUrl::new),
                }
            })
            .collect())
    }

    async fn load_video_servers(
        &self,
        episode_link: &str,
        _extra: Option<&Extra>,
    ) -> Result<Vec<VideoServer>> {
        let (Some(show_id), Some(episode)) = (show_id(episode_link), episode_number(episode_link))
        else {
            self.diagnostics
                .notify(&format!("Unrecognised episode link {episode_link}"));
            return Ok(Vec::new());
        };
        let variables = serde_json::json!({
            "showId": show_id,
            "translationType": self.translation.as_str(),
            "episodeString": episode,
        });
        let Some(payload) = self
            .graphql_query::<EpisodePayload>(variables, EPISODE_SOURCES_HASH)
            .await?
        else {
            return Ok(Vec::new());
        };
        let Some(episode) = payload.episode else {
            return Ok(Vec::new());
        };

        let mut servers: Vec<VideoServer> = Vec::with_capacity(episode.source_urls.len());
        for source in episode.source_urls {
            let name = unique_server_name(&source.source_name, &servers);
            let url = resolve_source_url(&source.source_url);
            servers.push(VideoServer::new(name, url));
        }
        Ok(servers)
    }

    fn video_extractor(&self, server: &VideoServer) -> Option<ExtractorKind> {
        self.registry.select(&server.embed.url)
    }

    async fn extract(&self, server: &VideoServer) -> Result<Option<VideoContainer>> {
        let Some(kind) = self.video_extractor(server) else {
            debug!(server = %server.name, url = %server.embed.url, "no extractor for server");
            return Ok(None);
        };
        debug!(server = %server.name, extractor = kind.name(), "extracting");
        kind.extract(server, &self.http).await.map(Some)
    }
}

pub fn show_id(link: &str) -> Option<String> {
    SHOW_ID.captures(link).map(|caps| caps[1].to_string())
}

pub fn episode_number(link: &str) -> Option<String> {
    EPISODE_NUMBER.captures(link).map(|caps| caps[1].to_string())
}

fn is_absolute_url(raw: &str) -> bool {
    Url::parse(raw)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Absolute URLs pass through; relative clock paths are moved onto the API host.
pub fn resolve_source_url(raw: &str) -> String {
    if is_absolute_url(raw) {
        return raw.to_string();
    }
    let path = decode_source_path(raw).unwrap_or_else(|| raw.to_string());
    if is_absolute_url(&path) {
        return path;
    }
    let json_path = path.replacen("clock", "clock.json", 1);
    let mut tail = json_path.chars();
    tail.next();
    format!("{API_HOST}{}", tail.as_str())
}

/// Decodes `--`-prefixed source paths; `None` for anything else.
pub fn decode_source_path(raw: &str) -> Option<String> {
    let hex = raw.strip_prefix("--")?;
    if hex.len() % 2 != 0 {
        return None;
    }
    let bytes = (0..hex.len())
        .step_by(2)
        .map(|i| {
            let byte = u8::from_str_radix(hex.get(i..i + 2)?, 16).ok()?;
            Some(byte ^ SOURCE_PATH_KEY)
        })
        .collect::<Option<Vec<u8>>>()?;
    String::from_utf8(bytes).ok()
}

// --- GraphQL Structs ---

#[derive(Debug, Deserialize)]
struct GraphQlEnvelope<T> {
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct SearchPayload {
    shows: ShowsConnection,
}

#[derive(Debug, Deserialize)]
struct ShowsConnection {
    #[serde(default)]
    edges: Vec<Show>,
}

#[derive(Debug, Deserialize)]
struct ShowsWithIdsPayload {
    #[serde(rename = "showsWithIds", default)]
    shows_with_ids: Vec<Show>,
}

#[derive(Debug, Deserialize)]
struct Show {
    #[serde(rename = "_id")]
    id: String,
    name: String,
    #[serde(rename = "englishName", default)]
    english_name: Option<String>,
    #[serde(rename = "nativeName", default)]
    native_name: Option<String>,
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(rename = "availableEpisodes", default)]
    available_episodes: AvailableEpisodes,
    #[serde(rename = "altNames", default)]
    alt_names: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
struct AvailableEpisodes {
    #[serde(default)]
    sub: u32,
    #[serde(default)]
    dub: u32,
}

impl AvailableEpisodes {
    fn count(&self, translation: Translation) -> u32 {
        match translation {
            Translation::Sub => self.sub,
            Translation::Dub => self.dub,
        }
    }
}

#[derive(Debug, Deserialize)]
struct EpisodeInfosPayload {
    #[serde(rename = "episodeInfos", default)]
    episode_infos: Vec<EpisodeInfo>,
}

#[derive(Debug, Deserialize)]
struct EpisodeInfo {
    // fractional for recaps and specials
    #[serde(rename = "episodeIdNum")]
    episode_id_num: f64,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    thumbnails: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct EpisodePayload {
    episode: Option<EpisodeSources>,
}

#[derive(Debug, Deserialize)]
struct EpisodeSources {
    #[serde(rename = "sourceUrls", default)]
    source_urls: Vec<SourceDescriptor>,
}

#[derive(Debug, Deserialize)]
struct SourceDescriptor {
    #[serde(rename = "sourceUrl")]
    source_url: String,
    #[serde(rename = "sourceName")]
    source_name: String,
}
