//! Best-effort front door to the providers.
//!
//! Every step is awaited inside a boundary that turns a failed call into an
//! empty result and reports it, so a caller only ever sees "something" or
//! "nothing found".

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use futures::future::join_all;
use tracing::{debug, warn};

use crate::diagnostics::Diagnostics;
use crate::providers::{AnimeProvider, Extra, MangaProvider};
use crate::types::{Episode, MangaChapter, MangaImage, ShowResponse, Video, VideoServer};

#[derive(Clone)]
pub struct Resolver {
    diagnostics: Arc<dyn Diagnostics>,
}

#[derive(Debug, Clone)]
pub struct ServerVideos {
    pub server: VideoServer,
    pub videos: Vec<Video>,
}

impl Resolver {
    pub fn new(diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self { diagnostics }
    }

    async fn guarded<T, Fut>(&self, step: &str, call: Fut) -> Vec<T>
    where
        Fut: Future<Output = Result<Vec<T>>>,
    {
        match call.await {
            Ok(items) => {
                debug!(step, items = items.len(), "step finished");
                items
            }
            Err(err) => {
                warn!(step, error = %format!("{err:#}"), "step failed");
                self.diagnostics.notify(&format!("{step} failed: {err}"));
                Vec::new()
            }
        }
    }

    pub async fn search_anime<P: AnimeProvider>(&self, provider: &P, query: &str) -> Vec<ShowResponse> {
        self.guarded("search", provider.search(query)).await
    }

    pub async fn episodes<P: AnimeProvider>(
        &self,
        provider: &P,
        show: &ShowResponse,
    ) -> Vec<Episode> {
        self.guarded(
            "load episodes",
            provider.load_episodes(&show.link, show.extra.as_ref()),
        )
        .await
    }

    pub async fn servers<P: AnimeProvider>(
        &self,
        provider: &P,
        episode: &Episode,
        extra: Option<&Extra>,
    ) -> Vec<VideoServer> {
        self.guarded(
            "load video servers",
            provider.load_video_servers(&episode.link, extra),
        )
        .await
    }

    /// Empty both for unsupported servers and for failed extractions.
    pub async fn videos<P: AnimeProvider>(&self, provider: &P, server: &VideoServer) -> Vec<Video> {
        let call = async {
            Ok::<_, anyhow::Error>(provider
                .extract(server)
                .await?
                .map(|container| container.videos)
                .unwrap_or_else(|| {
                    debug!(server = %server.name, "unsupported server skipped");
                    Vec::new()
                }))
        };
        self.guarded("extract", call).await
    }

    /// Extracts every server concurrently, keeping listing order and
    /// dropping servers that produced nothing.
    pub async fn videos_for_servers<P: AnimeProvider>(
        &self,
        provider: &P,
        servers: &[VideoServer],
    ) -> Vec<ServerVideos> {
        let extractions = servers.iter().map(|server| async move {
            ServerVideos {
                server: server.clone(),
                videos: self.videos(provider, server).await,
            }
        });
        join_all(extractions)
            .await
            .into_iter()
            .filter(|entry| !entry.videos.is_empty())
            .collect()
    }

    pub async fn search_manga<P: MangaProvider>(&self, provider: &P, query: &str) -> Vec<ShowResponse> {
        self.guarded("search", provider.search(query)).await
    }

    pub async fn chapters<P: MangaProvider>(
        &self,
        provider: &P,
        manga: &ShowResponse,
    ) -> Vec<MangaChapter> {
        self.guarded(
            "load chapters",
            provider.load_chapters(&manga.link, manga.extra.as_ref()),
        )
        .await
    }

    pub async fn images<P: MangaProvider>(
        &self,
        provider: &P,
        chapter: &MangaChapter,
    ) -> Vec<MangaImage> {
        self.guarded("load images", provider.load_images(&chapter.link))
            .await
    }
}
