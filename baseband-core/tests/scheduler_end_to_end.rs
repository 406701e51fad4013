//! End-to-end scheduler/worker exercises (spec §8 scenarios 1 and 6).
//!
//! Drives real worker threads against a `SessionState`, injecting
//! `PacketRx` completions the way a radio front-end would and letting
//! the scheduler's own tick loop carry the pipeline from FFT through
//! decode and retirement.

use std::sync::Arc;
use std::time::{Duration, Instant};

use baseband_core::config::SessionConfig;
use baseband_core::scheduler::Scheduler;
use baseband_core::session::SessionState;
use baseband_core::tag::{Event, EventKind, Tag};

fn small_config() -> SessionConfig {
    SessionConfig {
        frame_window: 4,
        num_ant: 2,
        num_ue: 1,
        num_sc_blocks: 2,
        num_workers: 2,
        ..SessionConfig::default()
    }
}

fn run_to_completion(session: &Arc<SessionState>, scheduler: &mut Scheduler, timeout: Duration) {
    let start = Instant::now();
    loop {
        let n = scheduler.tick().unwrap();
        if n == 0 && session.counters.cur_frame() >= 1 {
            break;
        }
        assert!(start.elapsed() < timeout, "scheduler never drained the pipeline");
        std::thread::sleep(Duration::from_micros(100));
    }
}

#[test]
fn happy_path_one_frame_all_antennas_retires_via_workers() {
    let cfg = small_config();
    let pilot_symbol = cfg
        .symbol_layout
        .iter()
        .position(|s| *s == baseband_core::config::SymbolKind::Pilot)
        .unwrap() as u64;
    let ul0 = cfg.ul_data_symbol_index(0).unwrap() as u64;
    let ul1 = cfg.ul_data_symbol_index(1).unwrap() as u64;

    let session = Arc::new(SessionState::new(cfg.clone()));
    let worker_handles: Vec<_> = (0..session.config.num_workers)
        .map(|id| baseband_core::worker::spawn_worker(id, Arc::clone(&session)))
        .collect();
    session.startup_barrier.wait();

    let mut scheduler = Scheduler::new(
        Arc::clone(&session.config),
        Arc::clone(&session.counters),
        Arc::clone(&session.request_queues),
        Arc::clone(&session.completion_queue),
        Arc::clone(&session.admit_paused),
    );

    // Inject every antenna's pilot + both UL-data symbols' packets for
    // frame 0, in reverse antenna order to exercise the "random order"
    // part of scenario 1. Both UL-data symbols matter here: each one
    // fans out its own per-UE Decode tasks independently, so a single
    // symbol's worth of traffic would retire the frame without ever
    // exercising the second symbol's completions.
    for ant in (0..cfg.num_ant as u32).rev() {
        let pilot_tag = Tag::for_antenna(0, pilot_symbol, ant);
        session.counters.record_packet(pilot_tag, true).unwrap();
        session
            .completion_queue
            .try_enqueue(Event::new(EventKind::PacketRx, pilot_tag))
            .unwrap();

        for ul_symbol in [ul0, ul1] {
            let data_tag = Tag::for_antenna(0, ul_symbol, ant);
            session.counters.record_packet(data_tag, false).unwrap();
            session
                .completion_queue
                .try_enqueue(Event::new(EventKind::PacketRx, data_tag))
                .unwrap();
        }
    }

    run_to_completion(&session, &mut scheduler, Duration::from_secs(5));

    assert_eq!(session.counters.cur_frame(), 1);
    assert!(session.counters.slot_is_clean(0));

    session.shut_down();
    for handle in worker_handles {
        handle.join().unwrap().unwrap();
    }
}

#[test]
fn downlink_frame_retires_via_precode_through_workers() {
    use baseband_core::config::SymbolKind;

    let mut cfg = small_config();
    cfg.retirement_mode = baseband_core::config::RetirementMode::Downlink;
    cfg.symbol_layout.push(SymbolKind::DownlinkData);
    let dl_symbol = (cfg.symbol_layout.len() - 1) as u64;

    let session = Arc::new(SessionState::new(cfg.clone()));
    let worker_handles: Vec<_> = (0..session.config.num_workers)
        .map(|id| baseband_core::worker::spawn_worker(id, Arc::clone(&session)))
        .collect();
    session.startup_barrier.wait();

    let mut scheduler = Scheduler::new(
        Arc::clone(&session.config),
        Arc::clone(&session.counters),
        Arc::clone(&session.request_queues),
        Arc::clone(&session.completion_queue),
        Arc::clone(&session.admit_paused),
    );

    // num_ue = 1: a single Encode completion for the downlink symbol is
    // enough to open the aggregate encode gate and fan out one Precode
    // task per subcarrier block.
    session
        .completion_queue
        .try_enqueue(Event::new(
            EventKind::Encode,
            Tag::for_codeblock(0, dl_symbol, 0, 0),
        ))
        .unwrap();

    run_to_completion(&session, &mut scheduler, Duration::from_secs(5));

    assert_eq!(session.counters.cur_frame(), 1);
    assert!(session.counters.slot_is_clean(0));

    session.shut_down();
    for handle in worker_handles {
        handle.join().unwrap().unwrap();
    }
}

#[test]
fn orderly_shutdown_under_load_joins_promptly_without_panicking() {
    let cfg = small_config();
    let session = Arc::new(SessionState::new(cfg));

    let worker_handles: Vec<_> = (0..session.config.num_workers)
        .map(|id| baseband_core::worker::spawn_worker(id, Arc::clone(&session)))
        .collect();
    session.startup_barrier.wait();

    // Flood the request queues so workers have plenty in flight when
    // shutdown is requested.
    let num_ant = session.config.num_ant as u64;
    for worker_id in 0..session.config.num_workers {
        for i in 0..64u64 {
            let ant = (i % num_ant) as u32;
            session.request_queues[worker_id]
                .try_enqueue(Event::new(EventKind::Fft, Tag::for_antenna(0, 0, ant)))
                .ok();
        }
    }

    std::thread::sleep(Duration::from_millis(10));
    session.shut_down();

    let start = Instant::now();
    for handle in worker_handles {
        handle.join().unwrap().unwrap();
    }
    assert!(start.elapsed() < Duration::from_secs(2), "workers did not join within 2s");
}
