use lazy_static::lazy_static;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;
use tracing::warn;

lazy_static! {
    pub static ref SESSIONS_OPENED: IntCounter =
        IntCounter::new("keeper_sessions_opened", "Sessions established")
            .expect("metric can not be created");

    pub static ref SESSIONS_TERMINATED: IntCounterVec = IntCounterVec::new(
        Opts::new("keeper_sessions_terminated", "Sessions removed, by cause"),
        &["cause"]
    )
    .expect("metric can not be created");

    pub static ref LIVE_SESSIONS: IntGauge =
        IntGauge::new("keeper_live_sessions", "Sessions currently tracked")
            .expect("metric can not be created");

    pub static ref WATCHES_FIRED: IntCounterVec = IntCounterVec::new(
        Opts::new("keeper_watches_fired", "Watch notifications enqueued, by event type"),
        &["event_type"]
    )
    .expect("metric can not be created");

    pub static ref TRANSACTIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("keeper_transactions", "Applied mutation batches, by outcome"),
        &["outcome"]
    )
    .expect("metric can not be created");

    pub static ref CLIENT_RETRIES: IntCounterVec = IntCounterVec::new(
        Opts::new("keeper_client_retries", "Client retries after ambiguous outcomes"),
        &["operation"]
    )
    .expect("metric can not be created");
}

/// Registers every collector with `registry`.
///
/// Safe to call more than once; duplicates are logged and skipped.
pub fn register_custom_metrics(registry: &Registry) {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(SESSIONS_OPENED.clone()),
        Box::new(SESSIONS_TERMINATED.clone()),
        Box::new(LIVE_SESSIONS.clone()),
        Box::new(WATCHES_FIRED.clone()),
        Box::new(TRANSACTIONS.clone()),
        Box::new(CLIENT_RETRIES.clone()),
    ];
    for collector in collectors {
        if let Err(e) = registry.register(collector) {
            warn!("metric registration skipped: {:?}", e);
        }
    }
}
