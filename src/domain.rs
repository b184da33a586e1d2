//! Primary-domain resolution for the request admission filter.
//!
//! The scheduler accepts a request only when the registrable ("primary")
//! domain of its host is on the accepted list. The registrable domain is
//! the public suffix plus one label: `foo.bar.example.co.uk` resolves to
//! `example.co.uk`.

use crate::error::{CrawlError, CrawlResult};
use std::net::IpAddr;

/// Multi-label public suffixes checked before the plain TLD fallback.
/// Longest match wins.
const COMPOUND_SUFFIXES: &[&str] = &[
    "ac.uk", "co.uk", "gov.uk", "ltd.uk", "me.uk", "net.uk", "org.uk", "plc.uk", "sch.uk",
    "com.au", "net.au", "org.au", "edu.au", "gov.au", "id.au", "asn.au",
    "com.cn", "net.cn", "org.cn", "gov.cn", "edu.cn", "ac.cn",
    "co.jp", "ne.jp", "or.jp", "ac.jp", "go.jp", "ad.jp",
    "com.br", "net.br", "org.br", "gov.br",
    "co.in", "net.in", "org.in", "gen.in", "firm.in",
    "co.nz", "net.nz", "org.nz", "govt.nz",
    "co.za", "net.za", "org.za", "gov.za",
    "com.tw", "org.tw", "idv.tw",
    "com.hk", "org.hk", "edu.hk",
    "com.sg", "org.sg", "edu.sg",
    "com.mx", "org.mx", "gob.mx",
    "co.kr", "or.kr", "go.kr", "ac.kr",
    "com.tr", "org.tr", "gov.tr",
];

/// Resolves the registrable domain of `host`.
///
/// Ports are stripped. IP literals pass through unchanged. Hosts that are
/// themselves a bare suffix (or otherwise carry no registrable label) are
/// rejected.
pub fn primary_domain(host: &str) -> CrawlResult<String> {
    let host = host.trim();
    if host.is_empty() {
        return Err(CrawlError::illegal("empty host"));
    }

    let host = strip_port(host);
    let lowered = host.to_ascii_lowercase();

    if lowered.parse::<IpAddr>().is_ok() {
        return Ok(lowered);
    }

    let labels: Vec<&str> = lowered.split('.').collect();
    if labels.iter().any(|l| l.is_empty()) {
        return Err(CrawlError::illegal(format!("malformed host {host:?}")));
    }
    if labels.len() < 2 {
        return Err(CrawlError::illegal(format!(
            "unresolvable primary domain for host {host:?}"
        )));
    }

    let suffix_labels = matching_suffix_len(&labels);
    if labels.len() <= suffix_labels {
        // The host IS a public suffix; nothing registrable remains.
        return Err(CrawlError::illegal(format!(
            "unresolvable primary domain for host {host:?}"
        )));
    }

    Ok(labels[labels.len() - suffix_labels - 1..].join("."))
}

/// Number of trailing labels covered by the longest matching public
/// suffix; plain TLDs count as one label.
fn matching_suffix_len(labels: &[&str]) -> usize {
    if labels.len() >= 2 {
        let tail2 = labels[labels.len() - 2..].join(".");
        if COMPOUND_SUFFIXES.contains(&tail2.as_str()) {
            return 2;
        }
    }
    1
}

fn strip_port(host: &str) -> &str {
    // Bracketed IPv6 literals keep their colons; `[::1]:8080` drops only
    // the port part.
    if let Some(rest) = host.strip_prefix('[') {
        if let Some(end) = rest.find(']') {
            return &rest[..end];
        }
    }
    match host.rfind(':') {
        Some(idx) if host[idx + 1..].chars().all(|c| c.is_ascii_digit()) => &host[..idx],
        _ => host,
    }
}
