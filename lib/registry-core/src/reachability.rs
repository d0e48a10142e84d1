//! Online/offline classification from handshake recency

use chrono::{DateTime, Utc};
use registry_api::Peer;
use std::fmt;
use std::time::Duration;

/// How long after the last handshake a peer still counts as online
pub const DEFAULT_ONLINE_THRESHOLD: Duration = Duration::from_secs(300);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reachability {
    Online,
    Offline,
    /// No handshake was ever recorded
    Never,
}

impl Reachability {
    pub fn is_online(self) -> bool {
        self == Reachability::Online
    }
}

impl fmt::Display for Reachability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reachability::Online => write!(f, "online"),
            Reachability::Offline => write!(f, "offline"),
            Reachability::Never => write!(f, "never"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReachabilityClassifier {
    threshold: Duration,
}

impl Default for ReachabilityClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_ONLINE_THRESHOLD)
    }
}

impl ReachabilityClassifier {
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    pub fn classify(&self, peer: &Peer, now: DateTime<Utc>) -> Reachability {
        self.classify_handshake(peer.handshake_at(), now)
    }

    /// A handshake in the future (clock skew) is treated as offline
    pub fn classify_handshake(
        &self,
        handshake: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Reachability {
        let Some(handshake) = handshake else {
            return Reachability::Never;
        };

        match (now - handshake).to_std() {
            Ok(elapsed) if elapsed <= self.threshold => Reachability::Online,
            _ => Reachability::Offline,
        }
    }

    pub fn is_online(&self, peer: &Peer, now: DateTime<Utc>) -> bool {
        self.classify(peer, now).is_online()
    }

    /// Time since the last handshake, `None` if there never was one or it
    /// lies in the future
    pub fn idle_for(peer: &Peer, now: DateTime<Utc>) -> Option<Duration> {
        peer.handshake_at()
            .and_then(|handshake| (now - handshake).to_std().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn peer_seen(handshake_dt: &str) -> Peer {
        Peer {
            pub_key: "key".to_string(),
            latest_handshake_dt: handshake_dt.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_threshold() {
        assert_eq!(ReachabilityClassifier::default().threshold(), Duration::from_secs(300));
    }

    #[test]
    fn test_recent_handshake_is_online() {
        let classifier = ReachabilityClassifier::default();
        let peer = peer_seen("2024-05-01 11:58:00");
        assert_eq!(classifier.classify(&peer, now()), Reachability::Online);
        assert!(classifier.is_online(&peer, now()));
    }

    #[test]
    fn test_threshold_boundary_is_inclusive() {
        let classifier = ReachabilityClassifier::new(Duration::from_secs(60));
        assert!(classifier.is_online(&peer_seen("2024-05-01 11:59:00"), now()));
        assert!(!classifier.is_online(&peer_seen("2024-05-01 11:58:59"), now()));
    }

    #[test]
    fn test_stale_handshake_is_offline() {
        let classifier = ReachabilityClassifier::default();
        let peer = peer_seen("2024-05-01 10:00:00");
        assert_eq!(classifier.classify(&peer, now()), Reachability::Offline);
    }

    #[test]
    fn test_missing_handshake_is_never() {
        let classifier = ReachabilityClassifier::default();
        assert_eq!(classifier.classify(&peer_seen(""), now()), Reachability::Never);
        assert_eq!(classifier.classify(&peer_seen("garbage"), now()), Reachability::Never);
        assert!(!classifier.is_online(&peer_seen(""), now()));
    }

    #[test]
    fn test_future_handshake_is_offline() {
        let classifier = ReachabilityClassifier::default();
        let peer = peer_seen("2024-05-01 12:00:30");
        assert_eq!(classifier.classify(&peer, now()), Reachability::Offline);
        assert_eq!(ReachabilityClassifier::idle_for(&peer, now()), None);
    }

    #[test]
    fn test_unix_counter_fallback() {
        let classifier = ReachabilityClassifier::default();
        let peer = Peer {
            pub_key: "key".to_string(),
            latest_handshake: now().timestamp() - 10,
            ..Default::default()
        };
        assert!(classifier.is_online(&peer, now()));
        assert_eq!(
            ReachabilityClassifier::idle_for(&peer, now()),
            Some(Duration::from_secs(10))
        );
    }
}
