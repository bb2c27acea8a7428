use std::env;
use std::fs;

use anyhow::{bail, Context};
use sonic_arranger::{load_file, PlayerConfig, SonicPlayer, VideoStandard};
use tracing_subscriber::EnvFilter;

const DEFAULT_MAX_SECONDS: u32 = 600;

const USAGE: &str = "Usage:
  sonic-arranger [flags] <module> [-o <out.wav>]

Flags:
  --info               Print a JSON summary of the module and exit
  --song <n>           Sub-song to play (default 0)
  --rate <hz>          Output sample rate (default 44100)
  --stereo             Interleaved stereo output
  --ntsc               Use the NTSC Paula clock
  --loop               Loop the song (bounded by --seconds)
  --seconds <n>        Maximum rendered duration (default 600)
  --config <file>      Load player settings from a JSON file
  -o, --output <file>  Write a WAV file
  -h, --help           Show this help

Without -o the song is rendered silently and timing statistics are printed.
Set RUST_LOG=debug for parser and player diagnostics.";

#[derive(Debug, Default)]
struct Options {
    module: Option<String>,
    output: Option<String>,
    config_file: Option<String>,
    song: Option<usize>,
    rate: Option<u32>,
    stereo: bool,
    ntsc: bool,
    looped: bool,
    seconds: Option<u32>,
    info: bool,
    help: bool,
}

fn value<T: std::str::FromStr>(flag: &str, raw: Option<String>) -> anyhow::Result<T> {
    let raw = raw.with_context(|| format!("{flag} requires an argument"))?;
    raw.parse()
        .map_err(|_| anyhow::anyhow!("invalid value for {flag}: {raw}"))
}

fn parse_args() -> anyhow::Result<Options> {
    let mut opts = Options::default();
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--info" => opts.info = true,
            "--stereo" => opts.stereo = true,
            "--ntsc" => opts.ntsc = true,
            "--loop" => opts.looped = true,
            "--help" | "-h" => opts.help = true,
            "--song" => opts.song = Some(value(&arg, args.next())?),
            "--rate" => opts.rate = Some(value(&arg, args.next())?),
            "--seconds" => opts.seconds = Some(value(&arg, args.next())?),
            "--config" => opts.config_file = Some(value(&arg, args.next())?),
            "-o" | "--output" => opts.output = Some(value(&arg, args.next())?),
            _ if arg.starts_with('-') => bail!("unknown flag: {arg}\n\n{USAGE}"),
            _ => opts.module = Some(arg),
        }
    }
    Ok(opts)
}

fn player_config(opts: &Options) -> anyhow::Result<PlayerConfig> {
    let mut config = match &opts.config_file {
        Some(path) => {
            let text =
                fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;
            serde_json::from_str(&text).with_context(|| format!("invalid config {path}"))?
        }
        None => PlayerConfig::default(),
    };
    if let Some(song) = opts.song {
        config.song_index = song;
    }
    if let Some(rate) = opts.rate {
        config.sample_rate = rate;
    }
    if opts.stereo {
        config.stereo = true;
    }
    if opts.ntsc {
        config.clock = VideoStandard::Ntsc;
    }
    if opts.looped {
        config.loop_song = true;
    }
    Ok(config)
}

fn run() -> anyhow::Result<()> {
    let opts = parse_args()?;
    let Some(path) = opts.module.as_deref() else {
        eprintln!("{USAGE}");
        if opts.help {
            return Ok(());
        }
        bail!("no module given");
    };
    if opts.help {
        println!("{USAGE}");
        return Ok(());
    }

    let module = load_file(path).with_context(|| format!("failed to load {path}"))?;

    if opts.info {
        println!("{}", serde_json::to_string_pretty(&module.info())?);
        return Ok(());
    }

    let config = player_config(&opts)?;
    let max_seconds = opts.seconds.unwrap_or(DEFAULT_MAX_SECONDS);
    tracing::info!(
        module = path,
        dialect = ?module.dialect,
        instruments = module.instruments.len(),
        "module loaded"
    );

    match opts.output.as_deref() {
        Some(out) => export(module, config, out, max_seconds),
        None => dry_run(module, config, max_seconds),
    }
}

#[cfg(feature = "export-wav")]
fn export(
    module: std::sync::Arc<sonic_arranger::Module>,
    config: PlayerConfig,
    out: &str,
    max_seconds: u32,
) -> anyhow::Result<()> {
    let summary = sonic_arranger::export_to_wav(module, config, out, max_seconds)
        .with_context(|| format!("failed to export {out}"))?;
    println!(
        "Wrote {out}: {:.2}s, {} Hz, {} channel(s){}",
        summary.duration_secs(),
        summary.sample_rate,
        summary.channels,
        if summary.completed { "" } else { " (duration cap reached)" }
    );
    Ok(())
}

#[cfg(not(feature = "export-wav"))]
fn export(
    _module: std::sync::Arc<sonic_arranger::Module>,
    _config: PlayerConfig,
    _out: &str,
    _max_seconds: u32,
) -> anyhow::Result<()> {
    bail!("WAV output requires the \"export-wav\" feature")
}

/// Render without writing anything and report how long it took
fn dry_run(
    module: std::sync::Arc<sonic_arranger::Module>,
    config: PlayerConfig,
    max_seconds: u32,
) -> anyhow::Result<()> {
    let start = std::time::Instant::now();
    let mut player = SonicPlayer::new(module, config)?;
    let mut bytes = 0usize;
    let mut peak = 0u8;
    for _ in 0..max_seconds {
        if player.is_end_of_stream() {
            break;
        }
        let chunk = player.read(1_000)?;
        bytes += chunk.len();
        peak = chunk.iter().fold(peak, |p, &s| p.max(s.unsigned_abs()));
    }

    let position = player.position();
    println!("Rendered:   {:.2} s", position.elapsed_ms as f64 / 1000.0);
    println!("Bytes:      {bytes}");
    println!("Peak:       {peak}");
    println!("Position:   {} step {:?}", position.song_position, position.step);
    println!("Finished:   {}", player.is_end_of_stream());
    println!("Wall time:  {:.1} ms", start.elapsed().as_secs_f64() * 1000.0);
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run() {
        eprintln!("error: {err}");
        for cause in err.chain().skip(1) {
            eprintln!("  caused by: {cause}");
        }
        std::process::exit(1);
    }
}
