use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Result, bail};
use clap::Parser;
use dialoguer::{Select, theme::ColorfulTheme};
use tracing_subscriber::EnvFilter;

use anisrc::{
    AnimeProvider, MangaProvider, Resolver, Source,
    config::Settings,
    diagnostics::{Diagnostics, TracingDiagnostics},
    http::HttpClient,
    manifest::ManifestCache,
    player,
    providers::{allanime::AllAnimeClient, comick::ComickClient},
    store::{JsonStore, default_store_path},
    types::{ShowResponse, Translation, Video, parse_episode_key},
};

#[derive(Debug, Parser)]
#[command(
    name = "anisrc",
    about = "Find anime streams and manga chapters and open them in mpv.",
    version
)]
struct Cli {
    #[arg(long)]
    dub: bool,

    #[arg(long)]
    manga: bool,

    /// Remember the chosen title under this media id, and reuse it next time.
    #[arg(long, value_name = "ID")]
    media_id: Option<u32>,

    #[arg(short = 'e', long, value_name = "EPISODE")]
    episode: Option<String>,

    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(long)]
    print_config: bool,

    /// Print the resolved URLs instead of launching the player.
    #[arg(long)]
    print: bool,

    #[arg(value_name = "QUERY")]
    query: Vec<String>,
}

struct Context {
    settings: Settings,
    diagnostics: Arc<dyn Diagnostics>,
    resolver: Resolver,
    store: JsonStore,
}

#[tokio::main]
async fn main() -> Result<()> {
    let result = run().await;
    if let Err(err) = &result {
        eprintln!("error: {err:?}");
    }
    result
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    if cli.print_config {
        print!("{}", settings.to_toml()?);
        return Ok(());
    }

    let store = match &settings.store_path {
        Some(path) => JsonStore::new(path),
        None => JsonStore::new(default_store_path()?),
    };
    let diagnostics: Arc<dyn Diagnostics> = Arc::new(TracingDiagnostics);
    let ctx = Context {
        resolver: Resolver::new(diagnostics.clone()),
        diagnostics,
        store,
        settings,
    };
    let http = HttpClient::new(Duration::from_secs(ctx.settings.request_timeout_secs))?;

    if cli.manga {
        let manifest = Arc::new(ManifestCache::new(chrono::Duration::minutes(
            ctx.settings.manifest_ttl_minutes,
        )));
        let client = ComickClient::new(http, ctx.diagnostics.clone(), manifest);
        return run_manga_flow(&cli, &ctx, &client).await;
    }

    let mut client = AllAnimeClient::new(http, ctx.diagnostics.clone())
        .with_translation(ctx.settings.translation)
        .with_allow_adult(ctx.settings.allow_adult);
    if cli.dub && client.is_dub_available_separately() {
        client.set_translation(Translation::from_dub(cli.dub));
    }
    run_anime_flow(&cli, &ctx, &client).await
}

fn theme() -> ColorfulTheme {
    ColorfulTheme::default()
}

fn select(prompt: &str, items: &[String]) -> Result<Option<usize>> {
    if items.is_empty() {
        return Ok(None);
    }
    Ok(Select::with_theme(&theme())
        .with_prompt(prompt)
        .items(items)
        .default(0)
        .interact_opt()?)
}

/// The title saved under `--media-id`, when no new query was given.
fn saved_show<S: Source>(cli: &Cli, ctx: &Context, source: &S) -> Result<Option<ShowResponse>> {
    match cli.media_id {
        Some(media_id) if cli.query.is_empty() => {
            let saved = source.load_saved_show_response(&ctx.store, media_id)?;
            if let Some(show) = &saved {
                println!("Using saved title: {}", show.name);
            }
            Ok(saved)
        }
        _ => Ok(None),
    }
}

fn query(cli: &Cli) -> Option<String> {
    if cli.query.is_empty() {
        println!("No query provided. Use `anisrc <name>` or `anisrc --manga <name>`.");
        return None;
    }
    Some(cli.query.join(" "))
}

fn choose_show<S: Source>(
    cli: &Cli,
    ctx: &Context,
    source: &S,
    query: &str,
    shows: Vec<ShowResponse>,
) -> Result<Option<ShowResponse>> {
    if shows.is_empty() {
        bail!("No results for \"{query}\" on {}", source.name());
    }
    let options: Vec<String> = shows
        .iter()
        .map(|show| match show.total {
            Some(total) => format!("{} [{total}]", show.name),
            None => show.name.clone(),
        })
        .collect();
    let Some(idx) = select("Select a title (Esc to cancel)", &options)? else {
        println!("Cancelled.");
        return Ok(None);
    };
    let show = shows[idx].clone();
    if let Some(media_id) = cli.media_id {
        source.save_show_response(&ctx.store, ctx.diagnostics.as_ref(), media_id, &show, true)?;
    }
    Ok(Some(show))
}

async fn run_anime_flow(cli: &Cli, ctx: &Context, client: &impl AnimeProvider) -> Result<()> {
    let resolver = &ctx.resolver;
    let show = match saved_show(cli, ctx, client)? {
        Some(show) => show,
        None => {
            let Some(query) = query(cli) else {
                return Ok(());
            };
            let shows = resolver.search_anime(client, &query).await;
            match choose_show(cli, ctx, client, &query, shows)? {
                Some(show) => show,
                None => return Ok(()),
            }
        }
    };

    let episodes = resolver.episodes(client, &show).await;
    if episodes.is_empty() {
        bail!(
            "No {} episodes found for {}",
            client.translation().label(),
            show.name
        );
    }
    let episode = match &cli.episode {
        Some(wanted) => episodes
            .iter()
            .find(|episode| parse_episode_key(&episode.number) == parse_episode_key(wanted))
            .cloned(),
        None => {
            let labels: Vec<String> = episodes
                .iter()
                .map(|episode| match &episode.notes {
                    Some(notes) => format!("Episode {} \u{00b7} {notes}", episode.number),
                    None => format!("Episode {}", episode.number),
                })
                .collect();
            select("Select an episode (Esc to cancel)", &labels)?.map(|idx| episodes[idx].clone())
        }
    };
    let Some(episode) = episode else {
        println!("No episode selected.");
        return Ok(());
    };

    let servers = resolver.servers(client, &episode, show.extra.as_ref()).await;
    let resolved = resolver.videos_for_servers(client, &servers).await;
    let options: Vec<(String, Video)> = resolved
        .into_iter()
        .flat_map(|entry| {
            let name = entry.server.name;
            entry
                .videos
                .into_iter()
                .map(move |video| (format!("{name} \u{00b7} {}", video.label()), video))
        })
        .collect();
    if options.is_empty() {
        bail!("No playable streams for episode {}", episode.number);
    }

    if cli.print {
        for (label, video) in &options {
            println!("{label}\t{}", video.file.url);
        }
        return Ok(());
    }
    let labels: Vec<String> = options.iter().map(|(label, _)| label.clone()).collect();
    let Some(idx) = select("Select a stream", &labels)? else {
        println!("Cancelled.");
        return Ok(());
    };
    player::launch_player(&ctx.settings.player, &options[idx].1, &show.name, &episode.number).await
}

async fn run_manga_flow(cli: &Cli, ctx: &Context, client: &impl MangaProvider) -> Result<()> {
    let resolver = &ctx.resolver;
    let manga = match saved_show(cli, ctx, client)? {
        Some(manga) => manga,
        None => {
            let Some(query) = query(cli) else {
                return Ok(());
            };
            let results = resolver.search_manga(client, &query).await;
            match choose_show(cli, ctx, client, &query, results)? {
                Some(manga) => manga,
                None => return Ok(()),
            }
        }
    };

    let chapters = resolver.chapters(client, &manga).await;
    if chapters.is_empty() {
        bail!("No English chapters found for {}", manga.name);
    }
    let chapter = match &cli.episode {
        Some(wanted) => chapters
            .iter()
            .find(|chapter| parse_episode_key(&chapter.number) == parse_episode_key(wanted))
            .cloned(),
        None => {
            let labels: Vec<String> = chapters
                .iter()
                .map(|chapter| match &chapter.title {
                    Some(title) => format!("Chapter {} \u{00b7} {title}", chapter.number),
                    None => format!("Chapter {}", chapter.number),
                })
                .collect();
            select("Select a chapter (Esc to cancel)", &labels)?.map(|idx| chapters[idx].clone())
        }
    };
    let Some(chapter) = chapter else {
        println!("No chapter selected.");
        return Ok(());
    };

    let images = resolver.images(client, &chapter).await;
    if images.is_empty() {
        bail!("No pages found for chapter {}", chapter.number);
    }
    if cli.print {
        for image in &images {
            println!("{}", image.url.url);
        }
        return Ok(());
    }
    player::launch_image_viewer(&ctx.settings.player, &images, &manga.name, &chapter.number).await
}
