use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use iq_bridge::feed::{feed, feed_sink};
use iq_bridge::input::{ChunkSource, IqStreamReader, StreamFormat, WavChunkReader};
use iq_bridge::output::{TeeWriter, WavFrame};
use iq_bridge::{
    BridgeBlock, BridgeConfig, BridgeMode, DecoderCommand, IqSample, ToWire, WireSample,
    DEFAULT_SCALE,
};

/// Feed IQ samples from a file or a live stream into an external decoder
#[derive(Parser, Debug)]
#[command(name = "iq-bridge")]
#[command(version, about, long_about = None)]
struct Args {
    /// Input WAV file to bridge
    #[arg(value_name = "INPUT")]
    input_file: Option<PathBuf>,

    /// Connect to an IQ network sink (TCP) for live streaming
    #[arg(short, long, value_name = "HOST:PORT")]
    stream: Option<String>,

    /// Stream format: int8, int16, int32, float32 (int16 is passed to the decoder untouched)
    #[arg(long, default_value = "float32")]
    format: String,

    /// Decoder program reading interleaved int16 IQ on stdin
    #[arg(short, long, default_value = "dump1090")]
    decoder: String,

    /// Argument for the decoder (repeatable); "{rate}" is replaced by the sample rate
    #[arg(short = 'a', long = "decoder-arg", value_name = "ARG", allow_hyphen_values = true)]
    decoder_args: Vec<String>,

    /// Sample rate in Hz (defaults to the WAV header, or 2.4 MHz for streams)
    #[arg(short, long)]
    rate: Option<f32>,

    /// Float to int16 scale factor
    #[arg(long, default_value_t = DEFAULT_SCALE)]
    scale: f32,

    /// Samples per chunk handed to the bridge
    #[arg(short, long, default_value = "16384")]
    chunk_size: usize,

    /// Also write the untouched stream to this WAV file (pass-through mode)
    #[arg(short, long, value_name = "PATH")]
    tee: Option<PathBuf>,

    /// Do not start a decoder; only read the source (and tee)
    #[arg(long)]
    no_decoder: bool,

    /// Milliseconds to let the decoder drain after EOF before killing it
    #[arg(long, default_value = "0")]
    stop_grace_ms: u64,

    /// Discard the decoder's stdout and stderr
    #[arg(short, long)]
    quiet_decoder: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    // Validate input mode
    if args.input_file.is_none() && args.stream.is_none() {
        eprintln!("Error: Must specify either an input file or --stream <host:port>");
        std::process::exit(1);
    }
    if args.input_file.is_some() && args.stream.is_some() {
        eprintln!("Error: Cannot specify both input file and --stream");
        std::process::exit(1);
    }

    if let Some(input_path) = &args.input_file {
        // File mode
        let mut reader = WavChunkReader::open(input_path)?;
        let file_rate = reader.spec().sample_rate as f32;
        log::info!(
            "reading {} ({} samples at {} Hz)",
            input_path.display(),
            reader.total_samples(),
            file_rate
        );
        let rate = args.rate.unwrap_or(file_rate);
        if reader.is_wire_format() {
            bridge::<WireSample, _>(&args, &mut reader, rate)?;
        } else {
            bridge::<IqSample, _>(&args, &mut reader, rate)?;
        }
    } else if let Some(stream_addr) = &args.stream {
        // Stream mode
        let format = StreamFormat::parse(&args.format)?;
        let mut reader = IqStreamReader::connect(stream_addr, format)?;
        log::info!("connected to {} ({:?})", stream_addr, format);
        let rate = args.rate.unwrap_or(2_400_000.0);
        if format == StreamFormat::Int16 {
            bridge::<WireSample, _>(&args, &mut reader, rate)?;
        } else {
            bridge::<IqSample, _>(&args, &mut reader, rate)?;
        }
    }

    Ok(())
}

fn bridge<T, S>(args: &Args, source: &mut S, rate: f32) -> Result<(), Box<dyn std::error::Error>>
where
    T: ToWire + WavFrame + Default,
    S: ChunkSource<T>,
{
    let command = DecoderCommand::new(args.decoder.as_str())
        .args(args.decoder_args.iter().cloned())
        .quiet(args.quiet_decoder);
    let config = BridgeConfig {
        sample_rate: rate,
        scale: args.scale,
        mode: if args.tee.is_some() {
            BridgeMode::PassThrough
        } else {
            BridgeMode::Sink
        },
        decoder_enabled: !args.no_decoder,
        stop_grace: Duration::from_millis(args.stop_grace_ms),
    };

    let mut block: BridgeBlock<T> = BridgeBlock::new(command, config);
    block.start()?;

    let result = match &args.tee {
        Some(path) => {
            let tee_rate = source.sample_rate().unwrap_or(rate.round() as u32);
            let mut tee = TeeWriter::create::<T, _>(path, tee_rate)?;
            let summary = feed(source, &mut block, args.chunk_size, Some(&mut tee));
            tee.finalize()?;
            if args.verbose {
                println!("Wrote pass-through stream to {}", path.display());
            }
            summary
        }
        None => feed_sink(source, &mut block, args.chunk_size),
    };
    block.stop();
    let summary = result?;

    let stats = block.write_stats();
    println!(
        "Bridged {} samples in {} chunks: {} bytes to decoder, {} dropped ({} partial, {} failed writes)",
        summary.samples,
        summary.chunks,
        stats.bytes_written,
        stats.bytes_dropped(),
        stats.partial_writes,
        stats.failed_writes
    );

    Ok(())
}
