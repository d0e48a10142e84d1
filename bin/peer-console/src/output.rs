//! Plain-text rendering of console results

use chrono::{DateTime, Utc};
use registry_api::{AllowListEntry, Peer};
use registry_core::{
    BatchReport, Notification, NotificationLevel, PeerSummary, ReachabilityClassifier,
};
use std::fmt::Display;
use std::time::Duration;

const UNITS: [&str; 9] = ["B", "KB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

/// Human readable byte count, base 1024
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0B".to_string();
    }
    let mut scaled = bytes as f64;
    let mut exponent = 0;
    while scaled >= 1024.0 && exponent < UNITS.len() - 1 {
        scaled /= 1024.0;
        exponent += 1;
    }
    format!("{} {}", (scaled * 100.0).round() / 100.0, UNITS[exponent])
}

pub fn format_idle(idle: Duration) -> String {
    let secs = idle.as_secs();
    match secs {
        0..=59 => format!("{}s", secs),
        60..=3599 => format!("{}m {}s", secs / 60, secs % 60),
        3600..=86399 => format!("{}h {}m", secs / 3600, (secs % 3600) / 60),
        _ => format!("{}d {}h", secs / 86400, (secs % 86400) / 3600),
    }
}

pub fn print_entries(entries: &[AllowListEntry]) {
    println!("{:>6}  {}", "ID", "IP ADDRESS");
    for entry in entries {
        println!("{:>6}  {}", entry.id, entry.ip_addr);
    }
    println!("{} entries", entries.len());
}

pub fn peer_row(peer: &Peer, now: DateTime<Utc>) -> String {
    let networks: Vec<String> = peer
        .allowed_networks()
        .iter()
        .map(ToString::to_string)
        .collect();
    let allowed_ips = if networks.is_empty() {
        "(none)".to_string()
    } else {
        networks.join(",")
    };
    let last_seen = match ReachabilityClassifier::idle_for(peer, now) {
        Some(idle) => format!("{} ago", format_idle(idle)),
        None => "never".to_string(),
    };
    format!(
        "{:<40} {:<44} {:<18} {:>10} {:>10} {:<12} {:<7} {}",
        peer.name,
        peer.pub_key,
        allowed_ips,
        format_bytes(peer.rx),
        format_bytes(peer.tx),
        last_seen,
        if peer.is_online { "online" } else { "offline" },
        if peer.used { "protected" } else { "" },
    )
}

pub fn print_peers(peers: &[Peer]) {
    let now = Utc::now();
    println!(
        "{:<40} {:<44} {:<18} {:>10} {:>10} {:<12} {:<7} {}",
        "NAME", "PUBLIC KEY", "ALLOWED IPS", "RX", "TX", "LAST SEEN", "STATUS", "FLAGS"
    );
    for peer in peers {
        println!("{}", peer_row(peer, now));
    }
}

pub fn print_summary(summary: &PeerSummary) {
    println!(
        "total {}  protected {}  unprotected {}  online {}  offline {}",
        summary.total, summary.protected, summary.unprotected, summary.online, summary.offline
    );
}

pub fn print_report<K: Display>(action: &str, report: &BatchReport<K>) {
    for key in &report.succeeded {
        println!("{} {}", action, key);
    }
    for key in &report.declined {
        println!("skipped {} (declined)", key);
    }
    for (key, err) in &report.failed {
        print_notification(&err.notification().with_subject(key));
    }
}

pub fn print_notification(notification: &Notification) {
    let level = match notification.level {
        NotificationLevel::Info => "info",
        NotificationLevel::Warning => "warning",
        NotificationLevel::Error => "error",
    };
    eprintln!("[{}] {}: {}", level, notification.title, notification.message);
}

trait WithSubject {
    fn with_subject<K: Display>(self, key: &K) -> Self;
}

impl WithSubject for Notification {
    fn with_subject<K: Display>(mut self, key: &K) -> Self {
        self.title = format!("{} ({})", self.title, key);
        self
    }
}
