use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type Headers = HashMap<String, String>;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Translation {
    #[default]
    Sub,
    Dub,
}

impl Translation {
    pub fn from_dub(dub: bool) -> Self {
        if dub { Translation::Dub } else { Translation::Sub }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Translation::Sub => "sub",
            Translation::Dub => "dub",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Translation::Sub => "Sub",
            Translation::Dub => "Dub",
        }
    }
}

/// A URL together with the headers a client must send to fetch it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileUrl {
    pub url: String,
    #[serde(default)]
    pub headers: Headers,
}

impl FileUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Headers::new(),
        }
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_string(), value.to_string());
        self
    }
}

/// One title discovered by a catalog search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShowResponse {
    pub name: String,
    pub link: String,
    pub cover_url: FileUrl,
    #[serde(default)]
    pub other_names: Vec<String>,
    #[serde(default)]
    pub total: Option<u32>,
    /// Backend specific values needed by the next pipeline step.
    #[serde(default)]
    pub extra: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Episode {
    pub number: String,
    pub link: String,
    pub notes: Option<String>,
    pub thumbnail: Option<FileUrl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoServer {
    pub name: String,
    pub embed: FileUrl,
}

impl VideoServer {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            embed: FileUrl::new(url),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Video {
    pub quality: Option<u32>,
    /// Adaptive stream described by a manifest (HLS) rather than a single file.
    pub segmented: bool,
    pub file: FileUrl,
    /// Size in bytes, when the host reports one.
    pub size: Option<u64>,
}

impl Video {
    pub fn label(&self) -> String {
        let kind = if self.segmented { "HLS" } else { "MP4" };
        let quality = self
            .quality
            .map(|q| format!("{q}p"))
            .unwrap_or_else(|| String::from("auto"));
        match self.size {
            Some(bytes) => format!("{quality} ({kind}, {:.1} MB)", bytes as f64 / 1_048_576.0),
            None => format!("{quality} ({kind})"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoContainer {
    pub videos: Vec<Video>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MangaChapter {
    pub number: String,
    pub link: String,
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MangaImage {
    pub url: FileUrl,
}

/// Renders an episode index with at most five fractional digits, dropping the
/// fraction entirely for whole numbers (`12.0` -> `12`, `12.5` -> `12.5`).
pub fn format_episode_number(index: f64) -> String {
    let rendered = format!("{index:.5}");
    let trimmed = rendered.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "" | "-0" => String::from("0"),
        other => other.to_string(),
    }
}

/// Inverse of [`format_episode_number`] for sorting episode labels.
pub fn parse_episode_key(label: &str) -> f64 {
    label.trim().parse::<f64>().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_episode_numbers_have_no_fraction() {
        assert_eq!(format_episode_number(12.0), "12");
        assert_eq!(format_episode_number(0.0), "0");
        assert_eq!(format_episode_number(1100.0), "1100");
    }

    #[test]
    fn fractional_episode_numbers_are_trimmed() {
        assert_eq!(format_episode_number(12.5), "12.5");
        assert_eq!(format_episode_number(f64::from(7.25_f32)), "7.25");
        assert_eq!(format_episode_number(3.123456), "3.12346");
    }

    #[test]
    fn formatted_labels_keep_numeric_order() {
        let mut indices = vec![10.0, 2.0, 2.5, 1.0, 11.0];
        indices.sort_by(f64::total_cmp);
        let labels: Vec<String> = indices.iter().map(|i| format_episode_number(*i)).collect();
        let mut resorted = labels.clone();
        resorted.sort_by(|a, b| parse_episode_key(a).total_cmp(&parse_episode_key(b)));
        assert_eq!(labels, resorted);
        assert_eq!(labels, vec!["1", "2", "2.5", "10", "11"]);
    }

    #[test]
    fn video_label_mentions_kind_and_quality() {
        let video = Video {
            quality: Some(720),
            segmented: false,
            file: FileUrl::new("https://cdn.example/ep.mp4"),
            size: None,
        };
        assert_eq!(video.label(), "720p (MP4)");
    }
}
