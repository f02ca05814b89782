use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};
use walkdir::WalkDir;

use thumbview::layout::Flow;
use thumbview::thumbnails::{Message, ThumbnailLoader};
use thumbview::{EventLoop, Item, ItemModel, ThumbnailView, ViewConfig};

/// Give up on thumbnails that take longer than this to settle.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(120);

/// Window size used when `--viewport` is not given.
const DEFAULT_VIEWPORT: &str = "1024x768";

#[derive(Parser, Debug)]
#[command(version, about = "Generate the thumbnails a grid view would show for a directory", long_about = None)]
struct Args {
    /// Directory to list
    #[arg(value_name = "DIR")]
    dir: PathBuf,

    /// Thumbnail size in pixels, clamped to the supported range
    #[arg(long, value_name = "N")]
    size: Option<u32>,

    /// Layout flow
    #[arg(long, value_name = "wrap|linear", value_parser = parse_flow)]
    flow: Option<Flow>,

    /// Size of the simulated viewport
    #[arg(long, value_name = "WxH", default_value = DEFAULT_VIEWPORT, value_parser = parse_viewport)]
    viewport: (u32, u32),

    /// Write the drag pixmap of the visible rows to this file
    #[arg(long, value_name = "OUT.png")]
    drag_preview: Option<PathBuf>,
}

fn parse_flow(value: &str) -> Result<Flow, String> {
    Flow::parse(value).ok_or_else(|| format!("expected wrap or linear, got {value:?}"))
}

fn parse_viewport(value: &str) -> Result<(u32, u32), String> {
    let invalid = || format!("expected WIDTHxHEIGHT, got {value:?}");
    let (width, height) = value.split_once('x').ok_or_else(invalid)?;
    let width = width.parse().map_err(|_| invalid())?;
    let height = height.parse().map_err(|_| invalid())?;
    Ok((width, height))
}

fn list_directory(dir: &Path) -> Result<Vec<Item>> {
    if !dir.is_dir() {
        bail!("{dir:?} is not a directory");
    }
    let mut items = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        match Item::from_path(entry.path()) {
            Ok(item) => items.push(item),
            Err(e) => warn!(path = ?entry.path(), error = %e, "Skipping entry"),
        }
    }
    Ok(items)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("thumbview=info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    let mut config = ViewConfig::from_env();
    if let Some(size) = args.size {
        config.thumbnail_size = size;
    }
    if let Some(flow) = args.flow {
        config.flow = flow;
    }

    let items = list_directory(&args.dir)?;
    info!(dir = ?args.dir, count = items.len(), "Listed directory");

    let loader = ThumbnailLoader::builder().build()?;
    let events = loader.events();
    let model = ItemModel::from_items(items);
    let view = ThumbnailView::new(config, Box::new(loader));

    let mut event_loop = EventLoop::new(view, model, events);
    let (width, height) = args.viewport;
    event_loop.dispatch(Message::Resized { width, height });
    event_loop.dispatch(Message::Shown);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")?;
    let stats = runtime.block_on(event_loop.run_until_settled(SETTLE_TIMEOUT));
    info!(
        ready = stats.ready,
        failed = stats.failed,
        settled = stats.settled,
        "Thumbnails generated"
    );

    let (view, model) = event_loop.into_parts();
    for (_, item) in model.iter() {
        let Some(thumbnail) = view.cached(&item.url) else {
            println!("{}\t-\t-\tnot visible", item.url);
            continue;
        };
        let shown = thumbnail
            .adjusted_pixmap
            .as_ref()
            .map_or_else(|| "-".to_string(), |pix| pix.size().to_string());
        let full = thumbnail
            .real_full_size
            .map_or_else(|| "-".to_string(), |size| size.to_string());
        let state = if thumbnail.group_pixmap.is_none() {
            "waiting"
        } else if thumbnail.rough {
            "rough"
        } else {
            "smooth"
        };
        println!("{}\t{shown}\t{full}\t{state}", item.url);
    }

    if let Some(out) = args.drag_preview {
        let rows = view.visible_rows(&model);
        match view.create_drag_pixmap(&model, &rows) {
            Some(pixmap) => {
                pixmap
                    .image()
                    .save(&out)
                    .with_context(|| format!("Failed to write {out:?}"))?;
                info!(path = ?out, size = %pixmap.size(), "Wrote drag preview");
            }
            None => warn!("Nothing visible to build a drag preview from"),
        }
    }

    Ok(())
}
