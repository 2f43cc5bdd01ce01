use std::fs::OpenOptions;
use std::path::Path;

use tracing_appender::non_blocking::{NonBlockingBuilder, WorkerGuard};
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter};

fn build_and_set_global_subscriber<P>(logfile: Option<P>, is_test: bool) -> std::io::Result<Option<WorkerGuard>>
where
    P: AsRef<Path>,
{
    let stderr_log = fmt::layer().with_writer(std::io::stderr);
    let env_filter = EnvFilter::from_default_env();
    let r = registry().with(stderr_log).with(env_filter);

    let flush_guard = match logfile {
        Some(p) => {
            let logfile = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(p)?;
            let (writer, guard) = NonBlockingBuilder::default()
                .lossy(false)
                .finish(logfile);
            let json = fmt::layer()
                .json()
                .with_span_list(true)
                .with_current_span(false)
                .with_writer(writer);

            let r = r.with(json);
            if is_test { r.try_init().ok(); }
            else { r.init(); }
            Some(guard)
        }
        None => {
            if is_test { r.try_init().ok(); }
            else { r.init(); }
            None
        }
    };
    Ok(flush_guard)
}

/// Installs the global subscriber: human-readable lines on stderr, filtered by
/// `RUST_LOG`, plus a JSON copy in `logfile` when given. Keep the guard alive
/// until exit so the file writer is flushed.
pub fn init_logging(logfile: Option<impl AsRef<Path>>) -> std::io::Result<Option<WorkerGuard>> {
    build_and_set_global_subscriber(logfile, false)
}

/// Same as [`init_logging`] but tolerates a subscriber already being installed.
pub fn init_test_logging() {
    let _ = build_and_set_global_subscriber(None::<&str>, true);
}
