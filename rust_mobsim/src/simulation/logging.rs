use std::io;

use tracing::dispatcher::DefaultGuard;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, registry, Layer};

use crate::simulation::config::{Config, Logging};

/// Keeps the logging guards alive for the duration of a partition thread. Dropping this
/// flushes the non-blocking writer and restores the previous default subscriber, which
/// matters when several simulations run back to back in one test process.
#[allow(dead_code)]
pub(crate) struct LogGuards {
    worker_guard: Option<WorkerGuard>,
    default: DefaultGuard,
}

/// Plain stdout logging for tools and examples that run outside a partition thread.
pub fn init_std_out_logging() -> DefaultGuard {
    let collector = registry().with(
        fmt::Layer::new()
            .with_writer(io::stdout)
            .with_filter(LevelFilter::INFO),
    );
    tracing::subscriber::set_default(collector)
}

pub(crate) fn init_logging(config: &Config, part: u32) -> LogGuards {
    let (file_layer, worker_guard) = if Logging::File == config.output.logging {
        let file_name = format!("log_process_{part}.txt");
        let appender = rolling::never(&config.output.output_dir, file_name);
        let (writer, guard) = non_blocking(appender);
        let layer = fmt::Layer::new()
            .with_writer(writer)
            .json()
            .with_ansi(false)
            .with_filter(LevelFilter::INFO);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    // only partition 0 logs to the console, otherwise concurrent partitions interleave
    let console_layer = (part == 0 && config.output.logging != Logging::None).then(|| {
        fmt::layer()
            .with_writer(io::stdout)
            .with_filter(LevelFilter::INFO)
    });

    let collector = registry().with(file_layer).with(console_layer);
    let default = tracing::subscriber::set_default(collector);

    LogGuards {
        worker_guard,
        default,
    }
}
