mod config;
mod logging;
mod retirement_report;
mod telemetry;

use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use color_eyre::eyre::Result;

use baseband_core::radio::{LoopbackRadio, RadioFrontend};
use baseband_core::scheduler::Scheduler;
use baseband_core::session::SessionState;
use baseband_core::wire::IqSampleI16;
use baseband_core::worker::spawn_worker;
use logging::LogFormat;

/// Runs a software baseband session against an emulated loopback radio
/// feeding synthetic traffic, for a bounded number of frames.
#[derive(Parser, Debug)]
#[command(author, version, about = "Baseband frame scheduler session runner", long_about = None)]
struct Cli {
    /// Path to a TOML session config, or a named preset
    /// (single-cell-udp-sim, sdr-sw-framer, sdr-hw-framer)
    #[arg(short, long, default_value = "single-cell-udp-sim")]
    config: String,

    /// Enable debug-level logging for baseband_core/baseband_cli
    #[arg(short, long)]
    verbose: bool,

    /// Number of frames to run before shutting down
    #[arg(short, long, default_value_t = 200)]
    frames: u64,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty")]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Cli::parse();
    logging::init(args.log_format, args.verbose)?;

    let session_config = config::load_session_config(&args.config)?;
    tracing::info!(config = %args.config, frames = args.frames, "starting session");

    let session = Arc::new(SessionState::new(session_config));

    let worker_handles: Vec<_> = (0..session.config.num_workers)
        .map(|id| spawn_worker(id, Arc::clone(&session)))
        .collect();

    let radio_handle = {
        let session = Arc::clone(&session);
        let frames = args.frames;
        std::thread::Builder::new()
            .name("baseband-radio".into())
            .spawn(move || run_synthetic_radio(session, frames))
            .expect("failed to spawn radio thread")
    };

    let mut scheduler = Scheduler::new(
        Arc::clone(&session.config),
        Arc::clone(&session.counters),
        Arc::clone(&session.request_queues),
        Arc::clone(&session.completion_queue),
        Arc::clone(&session.admit_paused),
    );
    let mut telemetry = telemetry::SessionTelemetry::new(Arc::clone(&session), 1.0);

    let start = Instant::now();
    while session.is_running() {
        scheduler.tick()?;
        telemetry.sample();
        std::thread::sleep(Duration::from_micros(200));
    }
    // Drain whatever completions are still in flight after the radio
    // stops feeding new traffic.
    for _ in 0..1000 {
        if scheduler.tick()? == 0 {
            break;
        }
    }
    let elapsed = start.elapsed();

    radio_handle.join().expect("radio thread panicked");
    for (id, handle) in worker_handles.into_iter().enumerate() {
        if let Err(err) = handle.join().expect("worker thread panicked") {
            tracing::error!(worker_id = id, error = %err, "worker exited with error");
        }
    }

    let report = retirement_report::build_report(&session, elapsed);
    retirement_report::log_report(&report);

    Ok(())
}

/// Drives a `RadioFrontend<LoopbackRadio>` over a synthetic sample
/// stream long enough to beacon-acquire and run `frames` synced frames,
/// then requests an orderly shutdown (spec §4.7, §8 "orderly shutdown
/// under load").
fn run_synthetic_radio(session: Arc<SessionState>, frames: u64) {
    // Wait for every worker to finish pinning before admitting traffic
    // (spec §5, startup barrier).
    session.startup_barrier.wait();

    let samps_per_symbol = 64usize;
    let frame_len = session.config.max_symbols() * samps_per_symbol;
    let beacon_pattern: Vec<IqSampleI16> = (0..16)
        .map(|i| IqSampleI16 { i: i as i16, q: -(i as i16) })
        .collect();
    let zero_prefix = 4usize;

    // Generous flat sample buffer: one extra frame for beacon
    // acquisition plus `frames` synced frames, zero-filled with the
    // beacon pattern spliced in near the start so acquisition succeeds
    // on the first attempt.
    let total_len = frame_len * (frames as usize + 4);
    let mut samples = vec![IqSampleI16::default(); total_len];
    samples[zero_prefix..zero_prefix + beacon_pattern.len()].copy_from_slice(&beacon_pattern);

    let radio = LoopbackRadio::new(samples);
    let mut frontend = RadioFrontend::new(radio, Arc::clone(&session), beacon_pattern, zero_prefix);

    for frame_id in 0..frames {
        if !session.is_running() {
            break;
        }
        if let Err(err) = frontend.tick(frame_id) {
            tracing::error!(frame_id, error = %err, "radio frontend error");
            break;
        }
    }
    session.shut_down();
}
