use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::{Context as _, Result};
use clap::Parser;
use image::ImageFormat;

use imgshelf::order::Order;
use imgshelf::{Config, Context};

/// How long the event loop waits for more work before calling it done.
const IDLE_TIMEOUT: Duration = Duration::from_millis(300);

#[derive(Parser, Debug)]
#[command(name = "imgshelf", version, about = "Thumbnail gallery for image collections")]
struct Cli {
    /// Files, directories, `-` for stdin or `exec://<command>`
    sources: Vec<String>,

    /// Configuration file (default: $XDG_CONFIG_HOME/imgshelf/config.toml)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// List order: none, alpha, numeric, mtime, size or random
    #[arg(long, short, value_parser = parse_order)]
    order: Option<Order>,

    /// Reverse the list order
    #[arg(long)]
    reverse: bool,

    /// Read directories recursively
    #[arg(long, short)]
    recursive: bool,

    /// Open all files from the directory of a single file
    #[arg(long, short)]
    all: bool,

    /// Treat sources as text files listing the images
    #[arg(long)]
    from_file: bool,

    /// Thumbnail size in pixels
    #[arg(long, short)]
    size: Option<u32>,

    /// Frame size as WIDTHxHEIGHT
    #[arg(long, short, default_value = "1280x720", value_parser = parse_geometry)]
    geometry: (u32, u32),

    /// Write the rendered gallery to a PNG file
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

fn parse_order(s: &str) -> Result<Order, String> {
    s.parse().map_err(|err| format!("{err}"))
}

fn parse_geometry(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got `{s}`"))?;
    let w: u32 = w.trim().parse().map_err(|_| format!("invalid width `{w}`"))?;
    let h: u32 = h.trim().parse().map_err(|_| format!("invalid height `{h}`"))?;
    if w == 0 || h == 0 {
        return Err("geometry must be non-zero".to_string());
    }
    Ok((w, h))
}

fn load_config(cli: &Cli) -> Result<Config> {
    let path = cli.config.clone().or_else(Config::default_path);
    let mut config = match &path {
        Some(path) => {
            Config::load(path).with_context(|| format!("failed to load config {}", path.display()))?
        }
        None => Config::default(),
    };

    if let Some(order) = cli.order {
        config.list.order = order;
    }
    config.list.reverse |= cli.reverse;
    config.list.recursive |= cli.recursive;
    config.list.all |= cli.all;
    config.list.fromfile |= cli.from_file;
    if let Some(size) = cli.size {
        config.gallery.size = size;
    }
    config.validate()?;
    Ok(config)
}

fn run(cli: Cli) -> Result<i32> {
    let config = load_config(&cli)?;
    let (width, height) = cli.geometry;

    let mut ctx = Context::init(config);
    let tic = Instant::now();
    let Some(first) = ctx.load(&cli.sources) else {
        log::error!("no images to view");
        return Ok(1);
    };
    ctx.activate(first, width, height);

    let exit = ctx.pump(IDLE_TIMEOUT);
    log::info!(
        "{} entries, idle after {} ms",
        ctx.list().lock().len(),
        tic.elapsed().as_millis()
    );
    println!("{}", ctx.gallery().info());
    for line in ctx.gallery().details() {
        println!("  {line}");
    }

    if let Some(path) = &cli.snapshot {
        ctx.frame()
            .save_with_format(path, ImageFormat::Png)
            .with_context(|| format!("failed to write snapshot {}", path.display()))?;
        log::info!("snapshot written to {}", path.display());
    }

    Ok(ctx.shutdown().or(exit).unwrap_or(0))
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Cli::parse()) {
        Ok(code) => ExitCode::from(code.clamp(0, 255) as u8),
        Err(err) => {
            log::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
