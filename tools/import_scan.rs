use std::env;
use std::path::PathBuf;

use common::SourceType;
use library::config::{config_path_from_env, load_or_create_config, resolve_path};
use library::{scan_local_tracks, Catalog, SongIndex};
use tracing::info;
use tracing_subscriber::EnvFilter;

const SEARCH_LIMIT: usize = 20;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut args = env::args().skip(1);
    let config_path = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(config_path_from_env);
    let search = args.next();

    let (config, created) = load_or_create_config(&config_path)?;
    if created {
        info!("Wrote default config to {:?}", config_path);
    }
    if config.music_roots.is_empty() {
        return Err(format!("no music_roots configured in {:?}", config_path).into());
    }

    let index_path = resolve_path(&config_path, &config.index_path);
    let index = SongIndex::open(&index_path)?;
    let catalog = Catalog::with_tolerances(index, config.tolerances());

    for root in &config.music_roots {
        let root = resolve_path(&config_path, root);
        let tracks = scan_local_tracks(&root, &config.audio_extensions);
        let report = catalog.import_batch(tracks);
        println!(
            "{}: {} created, {} merged, {} failed",
            root.display(),
            report.created,
            report.merged,
            report.failed
        );
    }

    let stats = catalog.store().stats()?;
    println!(
        "Catalog: {} songs, {} sources ({} streaming only)",
        stats.songs, stats.sources, stats.streaming_sources
    );
    for source_type in SourceType::ALL {
        let count = stats.by_source_type.get(&source_type).copied().unwrap_or(0);
        println!("  {}: {}", source_type, count);
    }

    if let Some(search) = search {
        let (songs, total) = catalog.store().list_songs(Some(search.as_str()), SEARCH_LIMIT, 0)?;
        println!("{} song(s) matching {:?}", total, search);
        for song in songs {
            println!("  {} - {} [{} sources]", song.artist, song.title, song.sources.len());
        }
    }

    Ok(())
}
