//! Proxy candidates and network paths.

use std::fmt;

/// Validation status of a proxy candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeStatus {
    /// Not probed yet.
    Unknown,
    /// Passed a reachability probe.
    Confirmed,
}

/// A relay address (`host:port`) considered for routing API requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProxyCandidate {
    address: String,
    status: ProbeStatus,
}

impl ProxyCandidate {
    /// Parse a `host:port` line. Returns `None` for blank or malformed input.
    pub fn parse(line: &str) -> Option<Self> {
        let address = line.trim();
        let (host, port) = address.rsplit_once(':')?;
        if host.is_empty() || host.contains(char::is_whitespace) || port.parse::<u16>().is_err() {
            return None;
        }
        Some(Self {
            address: address.to_string(),
            status: ProbeStatus::Unknown,
        })
    }

    /// Candidate with a known status.
    pub fn with_status(mut self, status: ProbeStatus) -> Self {
        self.status = status;
        self
    }

    /// The `host:port` address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Last known probe result.
    pub fn status(&self) -> ProbeStatus {
        self.status
    }

    /// True once a probe succeeded through this candidate.
    pub fn is_confirmed(&self) -> bool {
        self.status == ProbeStatus::Confirmed
    }

    /// The network path that routes through this candidate.
    pub fn path(&self) -> NetworkPath {
        NetworkPath::Proxy(self.address.clone())
    }
}

impl fmt::Display for ProxyCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}

/// How a request reaches the hosting service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NetworkPath {
    /// No proxy.
    Direct,
    /// Through an HTTP proxy at `host:port`.
    Proxy(String),
}

impl NetworkPath {
    /// Proxy URL for HTTP clients, or `None` for the direct path.
    pub fn proxy_url(&self) -> Option<String> {
        match self {
            NetworkPath::Direct => None,
            NetworkPath::Proxy(address) => Some(format!("http://{}", address)),
        }
    }

    /// Ordered paths to try for a set of candidates.
    ///
    /// An empty candidate list means a single direct attempt.
    pub fn from_candidates(candidates: &[ProxyCandidate]) -> Vec<NetworkPath> {
        if candidates.is_empty() {
            vec![NetworkPath::Direct]
        } else {
            candidates.iter().map(ProxyCandidate::path).collect()
        }
    }
}

impl fmt::Display for NetworkPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkPath::Direct => f.write_str("direct"),
            NetworkPath::Proxy(address) => f.write_str(address),
        }
    }
}
