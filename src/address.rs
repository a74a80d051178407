//! Identity primitives: [`Address`] and [`UniqueAddress`].
//!
//! These are the leaves of the membership model: every other component
//! (status machine, member record, merger, coordinator) is built on top of
//! the total orders defined here.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A logical node locator. Two nodes that share a `host:port` but have
/// different incarnations (process restarts) are the same `Address` but
/// different [`UniqueAddress`]es.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Address {
    pub protocol: String,
    pub system: String,
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl Address {
    pub fn new(
        protocol: impl Into<String>,
        system: impl Into<String>,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            protocol: protocol.into(),
            system: system.into(),
            host: Some(host.into()),
            port: Some(port),
        }
    }

    fn host_key(&self) -> &str {
        self.host.as_deref().unwrap_or("")
    }

    fn port_key(&self) -> u16 {
        self.port.unwrap_or(0)
    }
}

/// Total order by `host` (empty string if absent) then `port` (0 if
/// absent), per spec. Deliberately ignores `protocol`/`system`: those are
/// not part of the ordering, only of equality.
pub fn compare_address(a: &Address, b: &Address) -> Ordering {
    a.host_key()
        .cmp(b.host_key())
        .then_with(|| a.port_key().cmp(&b.port_key()))
}

impl PartialOrd for Address {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Address {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_address(self, other)
    }
}

/// `(Address, uid)`. The `uid` is a process-lifetime-unique random number
/// chosen on startup; it distinguishes reincarnations of the same
/// `host:port`. Equality is componentwise; hashing depends only on `uid`
/// since addresses recur across restarts but uids do not.
#[derive(Debug, Clone, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UniqueAddress {
    pub address: Address,
    pub uid: i64,
}

impl UniqueAddress {
    pub fn new(address: Address, uid: i64) -> Self {
        Self { address, uid }
    }

    /// Builds a `UniqueAddress` with a fresh, process-lifetime-unique `uid`.
    pub fn new_incarnation(address: Address) -> Self {
        Self {
            address,
            uid: rand::random(),
        }
    }
}

impl PartialEq for UniqueAddress {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address && self.uid == other.uid
    }
}

impl Hash for UniqueAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uid.hash(state);
    }
}

/// Address order first, then `uid` ascending.
pub fn compare_unique_address(a: &UniqueAddress, b: &UniqueAddress) -> Ordering {
    compare_address(&a.address, &b.address).then_with(|| a.uid.cmp(&b.uid))
}

impl PartialOrd for UniqueAddress {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for UniqueAddress {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_unique_address(self, other)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}://{}@{}:{}",
            self.protocol,
            self.system,
            self.host.as_deref().unwrap_or("?"),
            self.port.map(|p| p.to_string()).unwrap_or_else(|| "?".to_string())
        )
    }
}

impl fmt::Display for UniqueAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.address, self.uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(host: &str, port: u16) -> Address {
        Address::new("council", "test", host, port)
    }

    #[test]
    fn address_orders_by_host_then_port() {
        assert_eq!(compare_address(&addr("a", 1), &addr("b", 1)), Ordering::Less);
        assert_eq!(
            compare_address(&addr("a", 1), &addr("a", 2)),
            Ordering::Less
        );
        assert_eq!(
            compare_address(&addr("a", 1), &addr("a", 1)),
            Ordering::Equal
        );
    }

    #[test]
    fn absent_host_and_port_sort_as_empty_and_zero() {
        let missing = Address::default();
        let present = addr("a", 1);
        assert_eq!(compare_address(&missing, &present), Ordering::Less);
    }

    #[test]
    fn unique_address_equality_is_componentwise() {
        let a = UniqueAddress::new(addr("a", 1), 1);
        let b = UniqueAddress::new(addr("a", 1), 1);
        let c = UniqueAddress::new(addr("a", 1), 2);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn unique_address_orders_by_address_then_uid() {
        let a = UniqueAddress::new(addr("a", 1), 5);
        let b = UniqueAddress::new(addr("a", 1), 6);
        assert_eq!(compare_unique_address(&a, &b), Ordering::Less);

        let c = UniqueAddress::new(addr("b", 1), 0);
        assert_eq!(compare_unique_address(&a, &c), Ordering::Less);
    }

    #[test]
    fn hash_depends_only_on_uid() {
        use std::collections::hash_map::DefaultHasher;

        let a = UniqueAddress::new(addr("a", 1), 42);
        let b = UniqueAddress::new(addr("different-host", 9999), 42);

        let mut ha = DefaultHasher::new();
        a.hash(&mut ha);
        let mut hb = DefaultHasher::new();
        b.hash(&mut hb);
        assert_eq!(ha.finish(), hb.finish());
    }
}
