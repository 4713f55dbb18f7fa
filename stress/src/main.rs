use std::{
    error::Error,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use clap::{Parser, ValueEnum};
use hdrhistogram::Histogram;
use rand::{Rng, SeedableRng, rngs::StdRng};

use sliding_throttle::{ConcurrencyStrategy, Throttle, ThrottleOptions, WindowLengthMs};

/// Longest latency the histograms track, in nanoseconds.
const MAX_LATENCY_NS: u64 = 60_000_000_000;

#[derive(Clone, Copy, Debug, PartialEq, ValueEnum)]
enum Strategy {
    /// Single mutex around every decision.
    Locked,
    /// Period-tagged atomic counters.
    LockFree,
}

impl From<Strategy> for ConcurrencyStrategy {
    fn from(value: Strategy) -> Self {
        match value {
            Strategy::Locked => ConcurrencyStrategy::Locked,
            Strategy::LockFree => ConcurrencyStrategy::LockFree,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "sliding-throttle-stress",
    about = "Hammer one sliding-throttle from many threads and report admissions and latency"
)]
struct Args {
    #[arg(long, value_enum, default_value_t = Strategy::LockFree)]
    strategy: Strategy,

    #[arg(long, default_value_t = 8)]
    threads: usize,

    #[arg(long, default_value_t = 10)]
    duration_s: u64,

    #[arg(long, default_value_t = 10)]
    window_ms: u64,

    #[arg(long, default_value_t = 500)]
    limit: u32,

    /// Weight of every call; ignored when `--max-weight` is set.
    #[arg(long, default_value_t = 1)]
    weight: u32,

    /// Draw each call's weight uniformly from `1..=max_weight`.
    #[arg(long)]
    max_weight: Option<u32>,

    /// Time one call in every `sample_every`.
    #[arg(long, default_value_t = 100)]
    sample_every: u64,
}

/// What one worker thread saw.
struct WorkerReport {
    calls: u64,
    allowed: u64,
    allowed_weight: u64,
    latency_ns: Histogram<u64>,
}

impl WorkerReport {
    fn new() -> Result<Self, hdrhistogram::CreationError> {
        Ok(Self {
            calls: 0,
            allowed: 0,
            allowed_weight: 0,
            latency_ns: Histogram::new_with_bounds(1, MAX_LATENCY_NS, 3)?,
        })
    }

    fn merge(&mut self, other: &WorkerReport) -> Result<(), hdrhistogram::AdditionError> {
        self.calls += other.calls;
        self.allowed += other.allowed;
        self.allowed_weight += other.allowed_weight;
        self.latency_ns.add(&other.latency_ns)
    }
}

fn work(
    throttle: &Throttle,
    args: &Args,
    seed: u64,
    deadline: Instant,
) -> Result<WorkerReport, hdrhistogram::CreationError> {
    let mut report = WorkerReport::new()?;
    let mut rng = StdRng::seed_from_u64(seed);
    let sample_every = args.sample_every.max(1);

    while Instant::now() < deadline {
        let weight = match args.max_weight {
            Some(max_weight) => rng.random_range(1..=max_weight.max(1)),
            None => args.weight,
        };

        report.calls += 1;
        let allowed = if report.calls.is_multiple_of(sample_every) {
            let started = Instant::now();
            let allowed = throttle.allow_n(weight);
            let ns = u64::try_from(started.elapsed().as_nanos()).unwrap_or(MAX_LATENCY_NS);
            report.latency_ns.saturating_record(ns.max(1));
            allowed
        } else {
            throttle.allow_n(weight)
        };

        if allowed {
            report.allowed += 1;
            report.allowed_weight += u64::from(weight);
        }
    }

    Ok(report)
}

fn print_report(args: &Args, elapsed: Duration, report: &WorkerReport) {
    let secs = elapsed.as_secs_f64();
    let expected_weight = f64::from(args.limit) * secs * 1_000.0 / args.window_ms as f64;

    println!(
        "strategy={:?} threads={} window_ms={} limit={} weight={} max_weight={:?}",
        args.strategy, args.threads, args.window_ms, args.limit, args.weight, args.max_weight
    );
    println!(
        "elapsed_s={secs:.3} calls={} calls_per_s={:.0}",
        report.calls,
        report.calls as f64 / secs
    );
    println!(
        "allowed={} rejected={} allowed_weight={} expected_weight~{expected_weight:.0}",
        report.allowed,
        report.calls - report.allowed,
        report.allowed_weight
    );

    let latency = &report.latency_ns;
    if latency.is_empty() {
        println!("no latency samples collected");
        return;
    }

    println!(
        "lat_ns p50={} p99={} p999={} max={} samples={}",
        latency.value_at_quantile(0.50),
        latency.value_at_quantile(0.99),
        latency.value_at_quantile(0.999),
        latency.max(),
        latency.len()
    );
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let throttle = Arc::new(Throttle::with_options(ThrottleOptions {
        window_length: WindowLengthMs::try_from(args.window_ms)?,
        limit: args.limit,
        strategy: args.strategy.into(),
    }));

    let started = Instant::now();
    let deadline = started + Duration::from_secs(args.duration_s);

    let workers: Vec<_> = (0..args.threads.max(1))
        .map(|t| {
            let throttle = Arc::clone(&throttle);
            let args = args.clone();
            thread::spawn(move || work(&throttle, &args, t as u64, deadline))
        })
        .collect();

    let mut total = WorkerReport::new()?;
    for worker in workers {
        let report = worker.join().map_err(|_| "stress worker panicked")??;
        total.merge(&report)?;
    }

    print_report(&args, started.elapsed(), &total);
    Ok(())
}
