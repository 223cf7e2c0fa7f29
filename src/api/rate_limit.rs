use axum::{
    extract::{ConnectInfo, Request, State},
    http::{
        StatusCode,
        header::{HeaderName, RETRY_AFTER},
    },
    middleware::Next,
    response::Response,
};
use ipnetwork::IpNetwork;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tower_governor::GovernorError;
use tower_governor::key_extractor::KeyExtractor;

static X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Keys the share API limiter by client address.
///
/// `X-Forwarded-For` is only read when the socket peer sits in a trusted
/// network. Hops are walked right to left and the first one outside the
/// trusted networks is the client. The walk stops at a hop that is not an IP,
/// so a mangled header degrades to the peer address.
#[derive(Clone, Debug)]
pub struct ClientAddrKey {
    trusted: Arc<[IpNetwork]>,
}

impl ClientAddrKey {
    #[must_use]
    pub fn new(trusted: &[IpNetwork]) -> Self {
        Self { trusted: trusted.into() }
    }

    fn trusts(&self, addr: IpAddr) -> bool {
        self.trusted.iter().any(|net| net.contains(addr))
    }

    #[must_use]
    pub fn client_addr(&self, peer: IpAddr, forwarded_for: Option<&str>) -> IpAddr {
        if !self.trusts(peer) {
            return peer;
        }

        forwarded_for
            .into_iter()
            .flat_map(|chain| chain.rsplit(','))
            .map_while(|hop| hop.trim().parse::<IpAddr>().ok())
            .find(|hop| !self.trusts(*hop))
            .unwrap_or(peer)
    }
}

impl KeyExtractor for ClientAddrKey {
    type Key = IpAddr;

    fn extract<T>(&self, req: &axum::http::Request<T>) -> Result<Self::Key, GovernorError> {
        let ConnectInfo(peer) =
            req.extensions().get::<ConnectInfo<SocketAddr>>().ok_or(GovernorError::UnableToExtractKey)?;
        let forwarded_for = req.headers().get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok());

        Ok(self.client_addr(peer.ip(), forwarded_for))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Decision {
    Allowed,
    Throttled,
}

impl Decision {
    fn of(status: StatusCode) -> Self {
        if status == StatusCode::TOO_MANY_REQUESTS { Self::Throttled } else { Self::Allowed }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Allowed => "allowed",
            Self::Throttled => "throttled",
        }
    }
}

#[derive(Clone, Debug)]
pub struct RateLimitMetrics {
    decisions: Counter<u64>,
}

impl RateLimitMetrics {
    #[must_use]
    pub fn new() -> Self {
        let meter = global::meter("codedrop-server");
        Self {
            decisions: meter
                .u64_counter("share_api_rate_limit_decisions_total")
                .with_description("Share API requests by limiter decision")
                .build(),
        }
    }
}

impl Default for RateLimitMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts limiter decisions. Sits outside the governor layer so throttled responses pass through it.
pub async fn log_rate_limit_events(State(metrics): State<RateLimitMetrics>, request: Request, next: Next) -> Response {
    let response = next.run(request).await;

    let decision = Decision::of(response.status());
    if decision == Decision::Throttled {
        let retry_after = response.headers().get(RETRY_AFTER).and_then(|v| v.to_str().ok()).unwrap_or("unknown");
        tracing::warn!(retry_after_secs = %retry_after, "Rate limit exceeded");
    }
    metrics.decisions.add(1, &[KeyValue::new("decision", decision.label())]);

    response
}
