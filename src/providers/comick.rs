use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use anyhow::Result;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use super::{Extra, MangaProvider, Source};
use crate::diagnostics::Diagnostics;
use crate::http::{Fetch, HttpClient};
use crate::manifest::ManifestCache;
use crate::types::{FileUrl, Headers, MangaChapter, MangaImage, ShowResponse};

const API_URL: &str = "https://api.comick.fun";
const SITE_URL: &str = "https://comick.fun";
const SLUG_KEY: &str = "slug";

static BUILD_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"buildId":"(.+?)""#).expect("valid build id regex"));

pub struct ComickClient<F = HttpClient> {
    http: F,
    diagnostics: Arc<dyn Diagnostics>,
    manifest: Arc<ManifestCache>,
    clock: fn() -> DateTime<Utc>,
}

impl<F: Fetch> ComickClient<F> {
    pub fn new(http: F, diagnostics: Arc<dyn Diagnostics>, manifest: Arc<ManifestCache>) -> Self {
        Self {
            http,
            diagnostics,
            manifest,
            clock: Utc::now,
        }
    }

    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    async fn build_manifest_id(&self) -> Option<String> {
        self.manifest
            .get_or_refresh((self.clock)(), || self.fetch_build_id())
            .await
    }

    async fn fetch_build_id(&self) -> Option<String> {
        let response = match self.http.get(&format!("{SITE_URL}/"), &Headers::new()).await {
            Ok(response) => response,
            Err(err) => {
                debug!(error = %err, "landing page fetch failed");
                return None;
            }
        };
        extract_build_id(&response.text)
    }
}

pub fn extract_build_id(page: &str) -> Option<String> {
    BUILD_ID.captures(page).map(|caps| caps[1].to_string())
}

fn chapter_link(hid: &str) -> String {
    format!("{API_URL}/chapter/{hid}?tachiyomi=true")
}

impl<F: Fetch> Source for ComickClient<F> {
    fn name(&self) -> &'static str {
        "ComickFun"
    }

    fn save_name(&self) -> &'static str {
        "comick_fun"
    }

    fn host_url(&self) -> &'static str {
        API_URL
    }
}

impl<F: Fetch> MangaProvider for ComickClient<F> {
    async fn search(&self, query: &str) -> Result<Vec<ShowResponse>> {
        let url = Url::parse_with_params(
            &format!("{API_URL}/search"),
            &[("q", query), ("tachiyomi", "true")],
        )?;
        let response = self.http.get(url.as_str(), &Headers::new()).await?;
        let Some(results) = response.parsed_if_found::<Vec<SearchData>>()? else {
            return Ok(Vec::new());
        };

        let mut shows = Vec::with_capacity(results.len());
        for manga in results {
            let Some(cover) = manga.cover_url else {
                self.diagnostics
                    .notify(&format!("Could not get cover for {}", manga.slug));
                continue;
            };
            let mut extra = HashMap::new();
            extra.insert(SLUG_KEY.to_string(), manga.slug);
            shows.push(ShowResponse {
                name: manga.title,
                link: format!("{API_URL}/comic/{}/chapter?tachiyomi=true", manga.id),
                cover_url: FileUrl::new(cover),
                other_names: manga.md_titles.into_iter().map(|t| t.title).collect(),
                total: None,
                extra: Some(extra),
            });
        }
        info!(query, results = shows.len(), "manga search finished");
        Ok(shows)
    }

    async fn load_chapters(
        &self,
        manga_link: &str,
        extra: Option<&Extra>,
    ) -> Result<Vec<MangaChapter>> {
        let Some(slug) = extra.and_then(|extra| extra.get(SLUG_KEY)) else {
            self.diagnostics
                .notify(&format!("Missing slug for {manga_link}"));
            return Ok(Vec::new());
        };

        let response = self.http.get(manga_link, &Headers::new()).await?;
        let Some(listing) = response.parsed_if_found::<ChapterListData>()? else {
            return Ok(Vec::new());
        };
        let english: Vec<ListedChapter> = listing
            .chapters
            .into_iter()
            .filter(|chapter| chapter.lang.as_deref() == Some("en"))
            .collect();
        let Some(first) = english.first() else {
            debug!(manga_link, "no english chapters");
            return Ok(Vec::new());
        };

        let Some(build_id) = self.build_manifest_id().await else {
            self.diagnostics.notify("Could not get the build manifest id");
            return Ok(Vec::new());
        };
        let url = format!(
            "{SITE_URL}/_next/data/{build_id}/comic/{slug}/{}-chapter-0-en.json",
            first.hid
        );
        let response = self.http.get(&url, &Headers::new()).await?;
        let Some(page) = response.parsed_if_found::<ChapterPageData>()? else {
            return Ok(Vec::new());
        };

        let titles: HashMap<&str, &str> = english
            .iter()
            .filter_map(|chapter| Some((chapter.hid.as_str(), chapter.title.as_deref()?)))
            .collect();

        // newest first on the site, oldest first here
        Ok(page
            .page_props
            .chapters
            .into_iter()
            .rev()
            .filter_map(|chapter| {
                let number = chapter.chap?;
                Some(MangaChapter {
                    number,
                    link: chapter_link(&chapter.hid),
                    title: titles.get(chapter.hid.as_str()).map(|t| t.to_string()),
                })
            })
            .collect())
    }

    async fn load_images(&self, chapter_link: &str) -> Result<Vec<MangaImage>> {
        let response = self.http.get(chapter_link, &Headers::new()).await?;
        let Some(data) = response.parsed_if_found::<ChapterImageData>()? else {
            return Ok(Vec::new());
        };
        Ok(data
            .chapter
            .images
            .into_iter()
            .map(|image| MangaImage {
                url: FileUrl::new(image.url),
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct SearchData {
    title: String,
    id: u64,
    slug: String,
    #[serde(default)]
    md_titles: Vec<MdTitle>,
    #[serde(default)]
    cover_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MdTitle {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ChapterListData {
    #[serde(default)]
    chapters: Vec<ListedChapter>,
}

#[derive(Debug, Deserialize)]
struct ListedChapter {
    hid: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    lang: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChapterPageData {
    #[serde(rename = "pageProps")]
    page_props: PageProps,
}

#[derive(Debug, Deserialize)]
struct PageProps {
    #[serde(default)]
    chapters: Vec<PageChapter>,
}

#[derive(Debug, Deserialize)]
struct PageChapter {
    #[serde(default)]
    chap: Option<String>,
    hid: String,
}

#[derive(Debug, Deserialize)]
struct ChapterImageData {
    chapter: ChapterImages,
}

#[derive(Debug, Deserialize)]
struct ChapterImages {
    #[serde(default)]
    images: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    url: String,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::diagnostics::CollectingDiagnostics;
    use crate::http::mock::MockFetch;

    const MANGA_LINK: &str = "https://api.comick.fun/comic/42/chapter?tachiyomi=true";

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn client(
        http: MockFetch,
        manifest: Arc<ManifestCache>,
    ) -> (ComickClient<MockFetch>, Arc<CollectingDiagnostics>) {
        let diagnostics = Arc::new(CollectingDiagnostics::new());
        let client = ComickClient::new(http, diagnostics.clone(), manifest).with_clock(fixed_now);
        (client, diagnostics)
    }

    fn slug_extra() -> Extra {
        let mut extra = Extra::new();
        extra.insert(String::from("slug"), String::from("one-piece"));
        extra
    }

    fn chapter_fixture() -> MockFetch {
        MockFetch::new()
            .route(
                "/comic/42/chapter",
                r#"{"chapters":[
                    {"chap":"3","title":"Dritte","lang":"de","hid":"d3"},
                    {"chap":"3","title":"Third","lang":"en","hid":"h3"},
                    {"chap":"2","title":null,"lang":"en","hid":"h2"}
                ]}"#,
            )
            .route(
                "/_next/data/",
                r#"{"pageProps":{"chapters":[
                    {"chap":"3","hid":"h3"},
                    {"chap":"2","hid":"h2"},
                    {"chap":null,"hid":"oneshot"},
                    {"chap":"1","hid":"h1"}
                ]}}"#,
            )
            .route(
                "comick.fun/",
                r#"<script id="__NEXT_DATA__">{"props":{},"buildId":"BUILD42","isFallback":false}</script>"#,
            )
    }

    #[tokio::test]
    async fn search_carries_slug_for_chapter_listing() {
        let http = MockFetch::new().route(
            "/search?",
            r#"[{"title":"One Piece","id":42,"slug":"one-piece",
                 "md_titles":[{"title":"ワンピース"}],"cover_url":"https://img.test/op.jpg"},
                {"title":"No Cover","id":7,"slug":"no-cover","md_titles":[]}]"#,
        );
        let (client, diagnostics) = client(http, Arc::new(ManifestCache::default()));
        let results = client.search("one piece").await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].link, MANGA_LINK);
        assert_eq!(results[0].other_names, vec!["ワンピース"]);
        assert_eq!(
            results[0].extra.as_ref().and_then(|e| e.get("slug")).map(String::as_str),
            Some("one-piece")
        );
        assert_eq!(diagnostics.messages(), vec!["Could not get cover for no-cover"]);
        assert!(client.http.requests()[0].contains("q=one+piece"));
    }

    #[tokio::test]
    async fn chapters_are_oldest_first_with_titles() {
        let (client, _) = client(chapter_fixture(), Arc::new(ManifestCache::default()));
        let chapters = client
            .load_chapters(MANGA_LINK, Some(&slug_extra()))
            .await
            .unwrap();

        let numbers: Vec<&str> = chapters.iter().map(|c| c.number.as_str()).collect();
        assert_eq!(numbers, vec!["1", "2", "3"]);
        assert_eq!(chapters[0].link, "https://api.comick.fun/chapter/h1?tachiyomi=true");
        assert_eq!(chapters[2].title.as_deref(), Some("Third"));
        assert!(chapters[1].title.is_none());

        // the German chapter is listed first but the English one names the page
        let requests = client.http.requests();
        assert!(requests.iter().any(|url| url
            == "https://comick.fun/_next/data/BUILD42/comic/one-piece/h3-chapter-0-en.json"));
        assert!(!requests.iter().any(|url| url.contains("/d3-chapter-")));
    }

    #[tokio::test]
    async fn non_english_only_listing_yields_no_chapters() {
        let http = MockFetch::new().route(
            "/comic/42/chapter",
            r#"{"chapters":[{"chap":"1","lang":"de","hid":"d1"},{"chap":"1","lang":"fr","hid":"f1"}]}"#,
        );
        let (client, _) = client(http, Arc::new(ManifestCache::default()));
        let chapters = client
            .load_chapters(MANGA_LINK, Some(&slug_extra()))
            .await
            .unwrap();
        assert!(chapters.is_empty());
        assert_eq!(client.http.requests(), vec![MANGA_LINK.to_string()]);
    }

    #[tokio::test]
    async fn manifest_is_shared_between_calls() {
        let manifest = Arc::new(ManifestCache::default());
        let (client, _) = client(chapter_fixture(), manifest.clone());
        client.load_chapters(MANGA_LINK, Some(&slug_extra())).await.unwrap();
        client.load_chapters(MANGA_LINK, Some(&slug_extra())).await.unwrap();

        assert_eq!(client.http.count("https://comick.fun/_next"), 2);
        let landing = client
            .http
            .requests()
            .iter()
            .filter(|url| url.as_str() == "https://comick.fun/")
            .count();
        assert_eq!(landing, 1);
        assert_eq!(manifest.lookup(fixed_now()).as_deref(), Some("BUILD42"));
    }

    #[tokio::test]
    async fn missing_manifest_yields_no_chapters() {
        let http = MockFetch::new()
            .route(
                "/comic/42/chapter",
                r#"{"chapters":[{"chap":"1","lang":"en","hid":"h1"}]}"#,
            )
            .route("comick.fun/", "<html>maintenance</html>");
        let (client, diagnostics) = client(http, Arc::new(ManifestCache::default()));
        let chapters = client
            .load_chapters(MANGA_LINK, Some(&slug_extra()))
            .await
            .unwrap();
        assert!(chapters.is_empty());
        assert_eq!(diagnostics.messages(), vec!["Could not get the build manifest id"]);
    }

    #[tokio::test]
    async fn missing_slug_yields_no_chapters() {
        let (client, diagnostics) = client(chapter_fixture(), Arc::new(ManifestCache::default()));
        let chapters = client.load_chapters(MANGA_LINK, None).await.unwrap();
        assert!(chapters.is_empty());
        assert!(client.http.requests().is_empty());
        assert_eq!(diagnostics.messages().len(), 1);
    }

    #[tokio::test]
    async fn images_keep_page_order() {
        let http = MockFetch::new().route(
            "/chapter/h1",
            r#"{"chapter":{"images":[{"url":"https://img.test/1.webp"},{"url":"https://img.test/2.webp"}]}}"#,
        );
        let (client, _) = client(http, Arc::new(ManifestCache::default()));
        let images = client
            .load_images("https://api.comick.fun/chapter/h1?tachiyomi=true")
            .await
            .unwrap();
        let urls: Vec<&str> = images.iter().map(|i| i.url.url.as_str()).collect();
        assert_eq!(urls, vec!["https://img.test/1.webp", "https://img.test/2.webp"]);
    }

    #[test]
    fn build_id_pattern() {
        assert_eq!(
            extract_build_id(r#"..."buildId":"abc-123","gsp":true"#).as_deref(),
            Some("abc-123")
        );
        assert_eq!(extract_build_id("nothing here"), None);
    }

    #[tokio::test]
    async fn reversed_chapters_restore_the_site_listing() {
        let (client, _) = client(chapter_fixture(), Arc::new(ManifestCache::default()));
        let chapters = client
            .load_chapters(MANGA_LINK, Some(&slug_extra()))
            .await
            .unwrap();

        // site order is newest first; the numberless oneshot is not a chapter
        let restored: Vec<&str> = chapters.iter().rev().map(|c| c.link.as_str()).collect();
        assert_eq!(
            restored,
            vec![
                "https://api.comick.fun/chapter/h3?tachiyomi=true",
                "https://api.comick.fun/chapter/h2?tachiyomi=true",
                "https://api.comick.fun/chapter/h1?tachiyomi=true",
            ]
        );
    }
}
