//! Logging for the twofa request coordinator.
//!
//! Library crates log through the re-exported tracing macros with
//! structured fields (`account`, `request_id`, `nonce`). Subscribers are
//! installed once by the binary, or by tests.

pub use tracing::{debug, error, info, info_span, instrument, span, trace, warn, Level, Span};
pub use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

type InitResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Line format of the command-line subscriber
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event
    Json,
    /// Single-line human readable events
    #[default]
    Compact,
}

/// Install a JSON subscriber filtered by `RUST_LOG`, defaulting to `info`
pub fn init_tracing() -> InitResult {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .json(),
        )
        .try_init()?;

    Ok(())
}

/// Install the command-line subscriber.
///
/// Events go to stderr so command output on stdout stays machine readable.
/// `level` accepts any filter directive, e.g. `debug` or `twofa_client=trace`.
pub fn init_cli_tracing(level: &str, format: LogFormat) -> InitResult {
    let filter = EnvFilter::try_new(level)?;
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(fmt::layer().with_writer(std::io::stderr).json())
            .try_init()?,
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init()?,
    }

    Ok(())
}

/// Initialize tracing for testing with simplified output
pub fn init_tracing_test() -> InitResult {
    tracing_subscriber::registry()
        .with(EnvFilter::new("debug"))
        .with(fmt::layer().with_test_writer())
        .try_init()?;

    Ok(())
}

/// Span covering one multisig request from submission to confirmation
pub fn request_span(account_id: &str, receiver_id: &str) -> Span {
    info_span!("multisig_request", account = account_id, receiver = receiver_id)
}
