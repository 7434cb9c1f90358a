use foundations::telemetry::metrics::metrics;
use foundations::telemetry::metrics::Counter;
use foundations::telemetry::metrics::Gauge;

pub(crate) const REFUSED_NO_LISTENER: &str = "no_listener";
pub(crate) const REFUSED_BACKLOG_FULL: &str = "backlog_full";

#[metrics]
pub mod mock_quic {
    /// Number of listeners currently registered on a mock port.
    pub fn active_listeners() -> Gauge;

    /// Number of connections queued on a listener's backlog.
    pub fn connections_queued() -> Counter;

    /// Number of connection attempts refused, by `reason`.
    pub fn connections_refused(reason: &'static str) -> Counter;

    /// Number of streams opened, by stream `kind`.
    pub fn streams_opened(kind: &'static str) -> Counter;

    /// Number of stream opens rejected because the peer's budget for that
    /// `kind` was exhausted.
    pub fn stream_admission_failures(kind: &'static str) -> Counter;
}
