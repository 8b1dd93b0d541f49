//! VIP routing scenarios.

use serde::{Deserialize, Serialize};
use std::fmt;

/// First port handed out to scenarios; scenario `i` listens on `base + i`.
pub const DEFAULT_BASE_PORT: u16 = 7000;

/// Container network mode of a deployed workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NetworkMode {
    /// Overlay (virtual) network, one IP per container.
    User,
    /// Docker bridge with port mappings.
    Bridge,
    /// Host networking.
    Host,
}

impl NetworkMode {
    /// All modes in enumeration order.
    pub const ALL: [NetworkMode; 3] = [NetworkMode::User, NetworkMode::Bridge, NetworkMode::Host];

    /// Name as understood by the orchestration API.
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkMode::User => "USER",
            NetworkMode::Bridge => "BRIDGE",
            NetworkMode::Host => "HOST",
        }
    }
}

impl fmt::Display for NetworkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a scenario names its virtual address.
///
/// Each style yields a pair of addresses: the *service* address written
/// into the origin workload's VIP label, and the *routable* address a
/// client dials to reach it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AddressStyle {
    /// Literal IP VIP: `<prefix>.<index>:<port>` on both sides.
    Ip {
        /// First three octets, e.g. `1.1.1`.
        prefix: String,
    },
    /// Named VIP: `/<stem><index>:<port>` resolved through the LB domain.
    Named {
        /// Name stem, e.g. `namedvip`.
        stem: String,
        /// DNS suffix of the load balancer, e.g. `marathon.l4lb.thisdcos.directory`.
        domain: String,
    },
}

impl AddressStyle {
    /// The reference IP style (`1.1.1.<index>`).
    pub fn ip() -> Self {
        AddressStyle::Ip {
            prefix: "1.1.1".into(),
        }
    }

    /// The reference named style (`/namedvip<index>`).
    pub fn named() -> Self {
        AddressStyle::Named {
            stem: "namedvip".into(),
            domain: "marathon.l4lb.thisdcos.directory".into(),
        }
    }

    /// Address placed in the origin's VIP label.
    pub fn service_address(&self, index: usize, port: u16) -> String {
        match self {
            AddressStyle::Ip { prefix } => format!("{}.{}:{}", prefix, index, port),
            AddressStyle::Named { stem, .. } => format!("/{}{}:{}", stem, index, port),
        }
    }

    /// Address a client uses to reach the VIP.
    pub fn routable_address(&self, index: usize, port: u16) -> String {
        match self {
            AddressStyle::Ip { prefix } => format!("{}.{}:{}", prefix, index, port),
            AddressStyle::Named { stem, domain } => {
                format!("{}{}.{}:{}", stem, index, domain, port)
            }
        }
    }
}

/// One VIP routing permutation.
///
/// Immutable once built. Two scenarios built from the same inputs are
/// equal and share the same [`seed`](Scenario::seed).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scenario {
    index: usize,
    service_address: String,
    routable_address: String,
    co_located: bool,
    primary: NetworkMode,
    secondary: NetworkMode,
}

impl Scenario {
    /// Build a scenario, resolving both addresses for `index` and `port`.
    pub fn new(
        index: usize,
        style: &AddressStyle,
        port: u16,
        co_located: bool,
        primary: NetworkMode,
        secondary: NetworkMode,
    ) -> Self {
        Self {
            index,
            service_address: style.service_address(index, port),
            routable_address: style.routable_address(index, port),
            co_located,
            primary,
            secondary,
        }
    }

    /// Position in the enumeration (zero-based).
    pub fn index(&self) -> usize {
        self.index
    }

    /// VIP label value for the origin workload.
    pub fn service_address(&self) -> &str {
        &self.service_address
    }

    /// Address the proxy dials.
    pub fn routable_address(&self) -> &str {
        &self.routable_address
    }

    /// Whether origin and proxy share one location.
    pub fn co_located(&self) -> bool {
        self.co_located
    }

    /// Network mode of the origin workload.
    pub fn primary(&self) -> NetworkMode {
        self.primary
    }

    /// Network mode of the proxy workload.
    pub fn secondary(&self) -> NetworkMode {
        self.secondary
    }

    /// Number of distinct locations this scenario needs.
    pub fn required_locations(&self) -> usize {
        if self.co_located {
            1
        } else {
            2
        }
    }

    /// Deterministic RNG seed keyed by the service address.
    pub fn seed(&self) -> u64 {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(b"clusterprobe-scenario-seed-v1");
        hasher.update(self.service_address.as_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(bytes)
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Scenario(index={},vip={},vipaddr={},samehost={},vipnet={},proxynet={})",
            self.index,
            self.service_address,
            self.routable_address,
            self.co_located,
            self.primary,
            self.secondary
        )
    }
}
