use std::collections::HashMap;

use anyhow::Result;

use crate::diagnostics::Diagnostics;
use crate::extractors::ExtractorKind;
use crate::store::JsonStore;
use crate::types::{
    Episode, MangaChapter, MangaImage, ShowResponse, Translation, VideoContainer, VideoServer,
};

pub mod allanime;
pub mod comick;

pub type Extra = HashMap<String, String>;

/// Identity shared by every catalog backend.
pub trait Source {
    fn name(&self) -> &'static str;

    /// Prefix of the keys this backend persists under.
    fn save_name(&self) -> &'static str;

    fn host_url(&self) -> &'static str;

    fn save_key(&self, media_id: u32) -> String {
        format!("{}_{}", self.save_name(), media_id)
    }

    fn load_saved_show_response(
        &self,
        store: &JsonStore,
        media_id: u32,
    ) -> Result<Option<ShowResponse>> {
        store.load(&self.save_key(media_id))
    }

    fn save_show_response(
        &self,
        store: &JsonStore,
        diagnostics: &dyn Diagnostics,
        media_id: u32,
        response: &ShowResponse,
        selected: bool,
    ) -> Result<()> {
        let verb = if selected { "Selected" } else { "Found" };
        diagnostics.notify(&format!("{verb} : {}", response.name));
        store.save(&self.save_key(media_id), response)
    }
}

/// The four-step discovery protocol for video catalogs.
///
/// `Ok` with an empty list means nothing was found; `Err` means the call did
/// not complete. [`crate::resolver::Resolver`] folds both into empty results.
pub trait AnimeProvider: Source {
    fn is_dub_available_separately(&self) -> bool;

    fn translation(&self) -> Translation;

    fn set_translation(&mut self, translation: Translation);

    async fn search(&self, query: &str) -> Result<Vec<ShowResponse>>;

    async fn load_episodes(&self, show_link: &str, extra: Option<&Extra>)
    -> Result<Vec<Episode>>;

    async fn load_video_servers(
        &self,
        episode_link: &str,
        extra: Option<&Extra>,
    ) -> Result<Vec<VideoServer>>;

    /// `None` when no registered extractor handles the server's host.
    fn video_extractor(&self, server: &VideoServer) -> Option<ExtractorKind>;

    /// `Ok(None)` for unsupported servers.
    async fn extract(&self, server: &VideoServer) -> Result<Option<VideoContainer>>;
}

pub trait MangaProvider: Source {
    async fn search(&self, query: &str) -> Result<Vec<ShowResponse>>;

    async fn load_chapters(
        &self,
        manga_link: &str,
        extra: Option<&Extra>,
    ) -> Result<Vec<MangaChapter>>;

    async fn load_images(&self, chapter_link: &str) -> Result<Vec<MangaImage>>;
}

/// Appends ` (2)`, ` (3)`, ... to `base` until it no longer collides with a
/// name already taken in this listing.
pub fn unique_server_name(base: &str, taken: &[VideoServer]) -> String {
    let mut name = base.to_string();
    let mut suffix = 2;
    while taken.iter().any(|server| server.name == name) {
        name = format!("{base} ({suffix})");
        suffix += 1;
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_names_get_increasing_suffixes() {
        let mut servers: Vec<VideoServer> = Vec::new();
        for _ in 0..3 {
            let name = unique_server_name("A", &servers);
            servers.push(VideoServer::new(name, "https://x.test"));
        }
        let names: Vec<&str> = servers.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["A", "A (2)", "A (3)"]);
    }

    #[test]
    fn interleaved_duplicates_keep_discovery_order() {
        let mut servers: Vec<VideoServer> = Vec::new();
        for base in ["A", "B", "A", "B", "A"] {
            let name = unique_server_name(base, &servers);
            servers.push(VideoServer::new(name, "https://x.test"));
        }
        let names: Vec<&str> = servers.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "A (2)", "B (2)", "A (3)"]);
    }
}
