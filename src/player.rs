use anyhow::{Result, anyhow, bail};
use tokio::process::Command;
use tracing::info;

use crate::types::{Headers, MangaImage, Video};

fn header_args(headers: &Headers) -> Vec<String> {
    let mut args = Vec::new();
    for (key, value) in headers {
        if key.eq_ignore_ascii_case("user-agent") {
            args.push(format!("--user-agent={value}"));
        } else if key.eq_ignore_ascii_case("referer") {
            args.push(format!("--referrer={value}"));
            args.push(format!("--http-header-fields=Referer: {value}"));
        } else {
            args.push(format!("--http-header-fields={key}: {value}"));
        }
    }
    args
}

pub fn video_args(video: &Video, media_title: &str) -> Vec<String> {
    let mut args = vec![
        String::from("--quiet"),
        String::from("--terminal=no"),
        format!("--force-media-title={media_title}"),
    ];
    args.extend(header_args(&video.file.headers));
    args.push(video.file.url.clone());
    args
}

pub fn image_args(images: &[MangaImage], media_title: &str) -> Vec<String> {
    let mut args = vec![
        String::from("--quiet"),
        String::from("--terminal=no"),
        format!("--force-media-title={media_title}"),
        String::from("--image-display-duration=inf"),
    ];
    if let Some(first) = images.first() {
        args.extend(header_args(&first.url.headers));
    }
    args.extend(images.iter().map(|image| image.url.url.clone()));
    args
}

async fn run(player: &str, args: Vec<String>) -> Result<()> {
    info!(player, "launching player");
    let status = match Command::new(player).args(&args).status().await {
        Ok(status) => status,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(anyhow!(
                "Player '{player}' not found. Install mpv or set `player` in the config."
            ));
        }
        Err(err) => return Err(anyhow!(err).context(format!("failed to launch player '{player}'"))),
    };
    if !status.success() {
        bail!("player exited with status {status}");
    }
    Ok(())
}

pub async fn launch_player(player: &str, video: &Video, title: &str, episode: &str) -> Result<()> {
    run(player, video_args(video, &format!("{title} - Episode {episode}"))).await
}

pub async fn launch_image_viewer(
    player: &str,
    images: &[MangaImage],
    title: &str,
    chapter: &str,
) -> Result<()> {
    if images.is_empty() {
        bail!("chapter {chapter} has no pages");
    }
    run(player, image_args(images, &format!("{title} - Chapter {chapter}"))).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FileUrl;

    #[test]
    fn referer_is_forwarded_to_player() {
        let video = Video {
            quality: None,
            segmented: false,
            file: FileUrl::new("https://king.stronganime.xyz/ep.mp4")
                .with_header("Referer", "https://allanime.site"),
            size: None,
        };
        let args = video_args(&video, "Show - Episode 1");
        assert_eq!(args.last().map(String::as_str), Some("https://king.stronganime.xyz/ep.mp4"));
        assert!(args.contains(&String::from("--referrer=https://allanime.site")));
        assert!(args.contains(&String::from("--force-media-title=Show - Episode 1")));
    }

    #[test]
    fn images_are_passed_in_order() {
        let images = vec![
            MangaImage { url: FileUrl::new("https://img.test/1.png") },
            MangaImage { url: FileUrl::new("https://img.test/2.png") },
        ];
        let args = image_args(&images, "Manga - Chapter 1");
        let tail: Vec<&str> = args.iter().rev().take(2).rev().map(String::as_str).collect();
        assert_eq!(tail, vec!["https://img.test/1.png", "https://img.test/2.png"]);
        assert!(args.contains(&String::from("--image-display-duration=inf")));
    }
}
