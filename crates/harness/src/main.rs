mod config;
mod simulation;

use anyhow::Result;
use clap::Parser;

use config::Args;
use cubesync::{DeltaMode, DeltaStats, SyncConfig, SyncSession};
use simulation::World;

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = config::load(&args)?;
    let mode = DeltaMode::from(args.mode);
    let dt = 1.0 / args.tick_rate.max(1) as f64;

    let mut world = World::new(
        config.protocol.num_objects,
        config.protocol.player_index,
        config.quantization.at_rest_threshold,
    );
    let mut session =
        SyncSession::with_metrics(&config, world.snapshot(), DeltaStats::new(), DeltaStats::new())?;
    session.set_mode(mode);

    log::info!(
        "{} objects, {mode}, {:.0} Hz send rate, {:.0}ms latency, {:.0}ms jitter, {:.1}% loss",
        config.protocol.num_objects,
        config.protocol.send_rate,
        config.link.latency * 1000.0,
        config.link.jitter * 1000.0,
        config.link.loss_percent
    );

    let ticks = (args.duration / dt).ceil() as u64;
    let mut next_report = args.report_interval;
    for _ in 0..ticks {
        let active = world.step(dt as f32);
        session.step(dt, &active);

        if session.time() >= next_report {
            report(&session);
            next_report += args.report_interval;
        }
    }

    summary(&session, &config, mode);
    Ok(())
}

fn report(session: &SyncSession<DeltaStats>) {
    let sender = session.sender().stats();
    let receiver = session.receiver().stats();
    let interpolation = session.receiver().interpolation().stats();
    let link = session.forward_link();

    let live = &session.sender().live().objects;
    let error = session
        .receiver()
        .view()
        .iter()
        .zip(live)
        .map(|(update, state)| update.position.distance(state.position))
        .fold(0.0f32, f32::max);

    log::info!(
        "t={:.1}s sent={} decoded={} discarded={} lost={} {:.1} kbps ack={:?} underruns={} max_error={:.3}m",
        session.time(),
        sender.packets_sent,
        receiver.packets_decoded,
        receiver.packets_discarded,
        link.stats().packets_lost,
        link.bandwidth_kbps(),
        session.sender().ack(),
        interpolation.underruns,
        error
    );
}

fn summary(session: &SyncSession<DeltaStats>, config: &SyncConfig, mode: DeltaMode) {
    let metrics = session.sender().metrics();
    let totals = metrics.mode(mode);
    let sender = session.sender().stats();

    log::info!(
        "{mode}: {} packets, {:.1} bits/packet, {} objects sent, {} emptied, {} initial",
        totals.packets,
        metrics.average_bits(mode),
        totals.objects,
        sender.packets_emptied,
        sender.initial_packets
    );

    let small = config.codec.relative_position.small;
    for (axis, histogram) in ["x", "y", "z"].iter().zip(&metrics.position) {
        if histogram.samples() > 0 {
            log::info!(
                "position {axis}: {} deltas, {:.1}% within +/-{small}",
                histogram.samples(),
                histogram.fraction_within(small) * 100.0
            );
        }
    }
    let small = config.codec.relative_orientation.small;
    for (component, histogram) in ["a", "b", "c"].iter().zip(&metrics.orientation) {
        if histogram.samples() > 0 {
            log::info!(
                "orientation {component}: {} deltas, {:.1}% within +/-{small}",
                histogram.samples(),
                histogram.fraction_within(small) * 100.0
            );
        }
    }
    log::info!(
        "largest component changed {} times, {} packets discarded by the receiver",
        metrics.largest_changed,
        session.receiver().metrics().discarded
    );
}
