use clap::{Parser, Subcommand};
use std::path::PathBuf;

use sonoscope::render::ColorMap;

#[derive(Parser, Debug)]
#[command(name = "sonoscope", about = "Audition and inspect audio files")]
pub struct Cli {
    /// Config file (defaults to sonoscope.toml or the user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Play a file with interactive transport control
    Play {
        /// Input audio file (WAV, MP3, FLAC, OGG)
        input: PathBuf,

        /// Start position as a fraction of the track (0.0-1.0)
        #[arg(long, default_value_t = 0.0)]
        start: f64,

        /// Output device name
        #[arg(long)]
        device: Option<String>,

        /// Also compute the spectrogram in the background and write it here
        #[arg(long)]
        spectrogram: Option<PathBuf>,
    },

    /// Render a log-frequency spectrogram to PNG
    Spectrogram {
        input: PathBuf,

        /// Output image
        #[arg(short, long, default_value = "spectrogram.png")]
        output: PathBuf,

        /// Color map
        #[arg(long, value_enum)]
        color_map: Option<ColorMap>,
    },

    /// Write the min/max waveform envelope as JSON
    Waveform {
        input: PathBuf,

        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of envelope columns
        #[arg(long)]
        columns: Option<usize>,
    },

    /// Print frame count, duration and level of the normalized track
    Info { input: PathBuf },

    /// Write the normalized 44.1kHz stereo 16-bit PCM to a WAV file
    ExportWav {
        input: PathBuf,

        #[arg(short, long, default_value = "output.wav")]
        output: PathBuf,
    },

    /// List audio output devices
    Devices,
}
