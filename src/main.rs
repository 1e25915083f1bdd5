mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{Receiver, TryRecvError};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use cli::{Cli, Command};
use sonoscope::analysis::{build_envelope, AnalysisWorker, TrackAnalysis};
use sonoscope::audio::{decode, wav, NormalizedAudio};
use sonoscope::config::{self, Config};
use sonoscope::playback::{
    list_output_devices, CpalHost, OutputHost, PlaybackEngine, PlaybackState,
};
use sonoscope::render::{ColorMap, SpectrogramView};

/// Transport polling period (~30 Hz)
const POLL_INTERVAL: Duration = Duration::from_millis(33);
/// Step for the `+` / `-` seek commands
const SEEK_STEP: f64 = 0.05;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    let config = match config::find_config_path(cli.config.as_deref()) {
        Some(path) => match config::load_config(&path) {
            Some(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            None => {
                log::warn!("Failed to load config from {}", path.display());
                Config::default()
            }
        },
        None => Config::default(),
    };

    match cli.command {
        Command::Play {
            input,
            start,
            device,
            spectrogram,
        } => play(&input, start, device, spectrogram, &config),
        Command::Spectrogram {
            input,
            output,
            color_map,
        } => spectrogram(&input, &output, color_map.unwrap_or(config.visual.color_map), &config),
        Command::Waveform {
            input,
            output,
            columns,
        } => waveform(&input, output.as_deref(), columns.unwrap_or(config.visual.waveform_columns)),
        Command::Info { input } => info(&input),
        Command::ExportWav { input, output } => {
            let audio = decode_input(&input)?;
            wav::export_wav(&audio, &output)
        }
        Command::Devices => devices(),
    }
}

fn decode_input(input: &Path) -> Result<NormalizedAudio> {
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }
    log::info!("Decoding {}", input.display());
    decode::decode_file(input)
}

enum TransportCommand {
    Toggle,
    Stop,
    Seek(f64),
    Nudge(f64),
    Quit,
}

fn parse_command(line: &str) -> Option<TransportCommand> {
    match line.trim() {
        "" | "p" | "space" => Some(TransportCommand::Toggle),
        "s" => Some(TransportCommand::Stop),
        "q" => Some(TransportCommand::Quit),
        "+" => Some(TransportCommand::Nudge(SEEK_STEP)),
        "-" => Some(TransportCommand::Nudge(-SEEK_STEP)),
        other => other.parse::<f64>().ok().map(TransportCommand::Seek),
    }
}

/// Forward stdin lines to the controller loop without blocking it.
fn spawn_stdin_reader() -> Receiver<TransportCommand> {
    let (tx, rx) = crossbeam_channel::unbounded();
    std::thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                match parse_command(&line) {
                    Some(cmd) => {
                        if tx.send(cmd).is_err() {
                            break;
                        }
                    }
                    None => log::warn!("Unknown command: {:?}", line.trim()),
                }
            }
        })
        .expect("failed to spawn stdin reader");
    rx
}

fn play(
    input: &Path,
    start: f64,
    device: Option<String>,
    spectrogram_out: Option<PathBuf>,
    config: &Config,
) -> Result<()> {
    let audio = Arc::new(decode_input(input)?);
    let host = CpalHost::new(
        device.or_else(|| config.playback.device.clone()),
        config.playback.buffer_frames,
    );
    play_audio(audio, Box::new(host), start, spectrogram_out, config)
}

fn play_audio(
    audio: Arc<NormalizedAudio>,
    host: Box<dyn OutputHost>,
    start: f64,
    spectrogram_out: Option<PathBuf>,
    config: &Config,
) -> Result<()> {
    let worker = AnalysisWorker::new(config.visual.waveform_columns);
    let mut spectrogram_pending = spectrogram_out.is_some();
    if spectrogram_pending {
        worker.submit(1, Arc::clone(&audio))?;
    }

    let mut engine = PlaybackEngine::new(host);
    // The engine has already logged the device error.
    if engine.load(Arc::clone(&audio)).is_err() {
        if !spectrogram_pending {
            anyhow::bail!("No audio output device available");
        }
        log::warn!("Continuing without playback; only the spectrogram will be written");
    }

    if engine.has_device() {
        engine.seek(start);
        engine.play()?;

        let spectrogram = spectrogram_out.as_deref().filter(|_| spectrogram_pending);
        if transport_loop(&mut engine, &worker, spectrogram, config.visual.color_map)? {
            spectrogram_pending = false;
        }
        engine.stop();
    }

    if let (true, Some(path)) = (spectrogram_pending, spectrogram_out.as_deref()) {
        if worker.is_computing() {
            log::info!("Waiting for spectrogram...");
        }
        if let Some(result) = worker.recv_timeout(Duration::from_secs(600)) {
            write_spectrogram(&result, path, config.visual.color_map)?;
        }
    }
    Ok(())
}

/// Drive the engine from stdin until the track ends or the user quits.
/// Returns whether the spectrogram was written along the way.
fn transport_loop(
    engine: &mut PlaybackEngine,
    worker: &AnalysisWorker,
    mut spectrogram: Option<&Path>,
    color_map: ColorMap,
) -> Result<bool> {
    println!("Commands: <enter>/p play-pause, s stop, + / - skip, 0.0-1.0 seek, q quit");
    let commands = spawn_stdin_reader();
    let mut written = false;

    let pb = ProgressBar::new(1000);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg:>9} {bar:40.cyan/blue} {prefix}")
            .unwrap()
            .progress_chars("=>-"),
    );
    pb.set_prefix(format_time(engine.duration()));

    loop {
        match commands.try_recv() {
            Ok(TransportCommand::Toggle) => match engine.state() {
                PlaybackState::Playing => engine.pause(),
                _ => engine.play()?,
            },
            Ok(TransportCommand::Stop) => engine.stop(),
            Ok(TransportCommand::Seek(fraction)) => engine.seek(fraction),
            Ok(TransportCommand::Nudge(delta)) => engine.seek(engine.progress() + delta),
            Ok(TransportCommand::Quit) => break,
            // stdin closed: keep playing to the end
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {}
        }

        if let Some(path) = spectrogram {
            if let Some(result) = worker.try_recv() {
                pb.suspend(|| write_spectrogram(&result, path, color_map))?;
                spectrogram = None;
                written = true;
            }
        }

        pb.set_position((engine.progress() * 1000.0) as u64);
        pb.set_message(format_time(engine.position_secs()));

        if engine.state() == PlaybackState::Stopped && engine.progress() >= 1.0 {
            break;
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    pb.finish();
    Ok(written)
}

fn write_spectrogram(result: &TrackAnalysis, path: &Path, color_map: ColorMap) -> Result<()> {
    if result.spectrogram.is_empty() {
        log::warn!("Track is too short for a spectrogram");
        return Ok(());
    }
    let mut view = SpectrogramView::new(color_map);
    view.set_data(result.spectrogram.clone());
    match view.image() {
        Some(image) => image.save_png(path),
        None => Ok(()),
    }
}

fn spectrogram(input: &Path, output: &Path, color_map: ColorMap, config: &Config) -> Result<()> {
    let audio = Arc::new(decode_input(input)?);

    let worker = AnalysisWorker::new(config.visual.waveform_columns);
    worker.submit(1, audio)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_message("Computing spectrogram");
    spinner.enable_steady_tick(Duration::from_millis(100));
    let result = loop {
        if let Some(result) = worker.recv_timeout(Duration::from_millis(100)) {
            break result;
        }
        if !worker.is_computing() {
            // The flag drops just before the result is sent.
            break worker
                .recv_timeout(Duration::from_secs(5))
                .context("Analysis thread exited without a result")?;
        }
    };
    spinner.finish_and_clear();

    if result.spectrogram.is_empty() {
        anyhow::bail!("Track is too short for a spectrogram");
    }
    write_spectrogram(&result, output, color_map)
}

fn waveform(input: &Path, output: Option<&Path>, columns: usize) -> Result<()> {
    let audio = decode_input(input)?;
    let envelope = build_envelope(&audio.to_mono(), columns).context("Track has no samples")?;
    let json = serde_json::to_string(&envelope)?;
    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!(
                "Wrote {} envelope columns (peak {:.3}) to {}",
                envelope.len(),
                envelope.peak(),
                path.display()
            );
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", json)?;
        }
    }
    Ok(())
}

fn info(input: &Path) -> Result<()> {
    let audio = decode_input(input)?;
    let mono = audio.to_mono();
    let peak = mono.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
    let rms = if mono.is_empty() {
        0.0
    } else {
        (mono.iter().map(|s| s * s).sum::<f32>() / mono.len() as f32).sqrt()
    };
    let to_db = |v: f32| if v > 0.0 { 20.0 * v.log10() } else { f32::NEG_INFINITY };

    println!("File:     {}", input.display());
    println!("Format:   {}Hz, {} channels, 16-bit", audio.sample_rate(), audio.channels());
    println!("Frames:   {}", audio.frame_count());
    println!("Duration: {}", format_time(audio.duration()));
    println!("Peak:     {:.1} dBFS", to_db(peak));
    println!("RMS:      {:.1} dBFS", to_db(rms));
    Ok(())
}

fn devices() -> Result<()> {
    let devices = list_output_devices()?;
    if devices.is_empty() {
        println!("No output devices found");
    }
    for device in devices {
        let marker = if device.is_default { "*" } else { " " };
        println!("{} {}", marker, device.name);
    }
    Ok(())
}

fn format_time(seconds: f64) -> String {
    let total_secs = seconds.max(0.0) as u64;
    let centis = ((seconds.max(0.0) - total_secs as f64) * 100.0) as u64;
    if total_secs >= 3600 {
        format!("{:02}:{:02}:{:02}.{:02}", total_secs / 3600, (total_secs % 3600) / 60, total_secs % 60, centis)
    } else {
        format!("{:02}:{:02}.{:02}", total_secs / 60, total_secs % 60, centis)
    }
}
