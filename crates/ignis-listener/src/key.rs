use std::fmt;

/// The transport a `ListenKey` addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    Tcp,
    Udp,
}

impl Network {
    fn as_str(self) -> &'static str {
        match self {
            Network::Tcp => "tcp",
            Network::Udp => "udp",
        }
    }
}

/// Identifies a shared socket in the listener pool: `network/address[/extra]`,
/// matching the pool-key format every consumer agrees on (e.g.
/// `tcp/127.0.0.1:9001`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListenKey {
    pub network: Network,
    pub address: String,
    pub extra: Option<String>,
}

impl ListenKey {
    pub fn new(network: Network, address: impl Into<String>) -> Self {
        Self { network, address: address.into(), extra: None }
    }

    pub fn with_extra(network: Network, address: impl Into<String>, extra: impl Into<String>) -> Self {
        Self { network, address: address.into(), extra: Some(extra.into()) }
    }

    pub fn pool_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ListenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.extra {
            Some(extra) => write!(f, "{}/{}/{}", self.network.as_str(), self.address, extra),
            None => write!(f, "{}/{}", self.network.as_str(), self.address),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_key_matches_the_documented_format() {
        let key = ListenKey::new(Network::Tcp, "127.0.0.1:9001");
        assert_eq!(key.pool_key(), "tcp/127.0.0.1:9001");
    }

    #[test]
    fn extra_segment_is_appended() {
        let key = ListenKey::with_extra(Network::Udp, "0.0.0.0:53", "mcast");
        assert_eq!(key.pool_key(), "udp/0.0.0.0:53/mcast");
    }
}
