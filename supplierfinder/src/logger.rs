use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub enum VerbosityLevel {
    Quiet = 0,     // Warnings and errors only
    Summary = 1,   // One line per result page and admitted company
    Detailed = 2,  // Per-URL fetch and extraction detail
    Trace = 3,     // Pipeline phase transitions
}

impl VerbosityLevel {
    pub fn from_verbose_count(count: u8) -> Self {
        match count {
            0 => VerbosityLevel::Quiet,
            1 => VerbosityLevel::Summary,
            2 => VerbosityLevel::Detailed,
            3.. => VerbosityLevel::Trace,
        }
    }

    /// Filter directive used when `RUST_LOG` is not set
    pub fn directive(&self) -> &'static str {
        match self {
            VerbosityLevel::Quiet => "warn",
            VerbosityLevel::Summary => "supplierfinder=info,warn",
            VerbosityLevel::Detailed => "supplierfinder=debug,info",
            VerbosityLevel::Trace => "supplierfinder=trace,debug",
        }
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `-v`; output goes to
/// stderr so stdout only carries results.
pub fn init_tracing(verbosity: VerbosityLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.directive()));

    // A second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}
