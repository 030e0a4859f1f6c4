use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context as _;
use clap::{ArgAction, Parser, Subcommand};
use mediaprep::{
    Asset, LoadEvent, LoadTarget, MediaPipeline, PipelineConfig, SequenceCacheStore,
};

#[derive(Parser, Debug)]
#[command(name = "mediaprep", version)]
struct Cli {
    /// JSON configuration file (every field optional).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the cache root directory.
    #[arg(long, global = true)]
    cache_root: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify a source and print how it would be handled.
    Probe(ProbeArgs),
    /// Load a source through the pipeline, printing progress and the resulting asset.
    Load(LoadArgs),
    /// Load a source and step a frame-sequence player through it.
    Play(PlayArgs),
}

#[derive(Parser, Debug)]
struct ProbeArgs {
    /// Source video.
    path: PathBuf,
}

#[derive(Parser, Debug)]
struct LoadArgs {
    /// Source video.
    path: PathBuf,

    /// Give up after this many seconds (the job keeps its own timeout).
    #[arg(long)]
    wait_secs: Option<u64>,
}

#[derive(Parser, Debug)]
struct PlayArgs {
    /// Source video.
    path: PathBuf,

    /// Number of frames to step through.
    #[arg(long, default_value_t = 30)]
    frames: usize,

    /// Wrap at the end of the sequence.
    #[arg(long)]
    looping: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(root) = &cli.cache_root {
        config = config.with_cache_root(root);
    }

    let store = Arc::new(SequenceCacheStore::new(&config.cache_root));
    let pipeline = MediaPipeline::new(config, store)?;

    let result = match cli.cmd {
        Command::Probe(args) => cmd_probe(&pipeline, args),
        Command::Load(args) => cmd_load(&pipeline, args).map(|_| ()),
        Command::Play(args) => cmd_play(&pipeline, args),
    };
    pipeline.shutdown();
    result
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn cmd_probe(pipeline: &MediaPipeline, args: ProbeArgs) -> anyhow::Result<()> {
    let c = pipeline.classify(&args.path)?;
    println!("path:         {}", c.source.path().display());
    println!("kind:         {:?}", c.kind);
    println!("has_alpha:    {}", c.has_alpha);
    println!("detected_by:  {:?}", c.method);
    println!("codec:        {}", c.codec_name.as_deref().unwrap_or("-"));
    println!("pixel_format: {}", c.pixel_format.as_deref().unwrap_or("-"));
    match c.frame_rate {
        Some(fps) => println!("frame_rate:   {fps}"),
        None => println!("frame_rate:   -"),
    }
    match c.duration {
        Some(d) => println!("duration:     {:.3}s", d.as_secs_f64()),
        None => println!("duration:     -"),
    }
    Ok(())
}

fn cmd_load(pipeline: &MediaPipeline, args: LoadArgs) -> anyhow::Result<Asset> {
    let ticket = pipeline.request_load(&args.path, LoadTarget::new("cli"));
    let deadline = args
        .wait_secs
        .map(|s| Instant::now() + Duration::from_secs(s));

    loop {
        let event = match deadline {
            Some(d) => {
                let left = d.saturating_duration_since(Instant::now());
                match ticket.events().recv_timeout(left) {
                    Ok(ev) => ev,
                    Err(_) => {
                        pipeline.cancel(&args.path);
                        anyhow::bail!("gave up waiting for '{}'", args.path.display());
                    }
                }
            }
            None => ticket
                .events()
                .recv()
                .context("load worker exited without a result")?,
        };
        match event {
            LoadEvent::Progress(pct) => eprintln!("progress: {pct}%"),
            LoadEvent::Ready(asset) => {
                match &asset {
                    Asset::DirectStream(path) => println!("ready: stream {}", path.display()),
                    Asset::FrameSequence(seq) => println!(
                        "ready: {} frames at {} fps in {}",
                        seq.frame_count(),
                        seq.frame_rate(),
                        seq.directory().display()
                    ),
                }
                return Ok(asset);
            }
            LoadEvent::Failed(failure) => anyhow::bail!("load failed: {failure}"),
        }
    }
}

fn cmd_play(pipeline: &MediaPipeline, args: PlayArgs) -> anyhow::Result<()> {
    let asset = cmd_load(
        pipeline,
        LoadArgs {
            path: args.path.clone(),
            wait_secs: None,
        },
    )?;
    let Asset::FrameSequence(sequence) = asset else {
        println!("direct stream; nothing to step");
        return Ok(());
    };

    let mut player = pipeline.open_player(sequence, args.looping);
    let frame_time = player.sequence().frame_rate().frame_duration();
    let start = Instant::now();
    player.play(start);
    for n in 0..args.frames {
        // Sample mid-frame so float frame durations never round down a frame.
        let at = start + frame_time * u32::try_from(n).unwrap_or(u32::MAX) + frame_time / 2;
        let tick = player.tick(at)?;
        if let Some(frame) = &tick.frame {
            println!(
                "frame {:>5}: {}x{} alpha={}",
                tick.index,
                frame.width,
                frame.height,
                frame.has_transparency()
            );
        }
        if tick.completed {
            println!("end of sequence");
            break;
        }
    }
    Ok(())
}
