//! Minimal keystore: a fixed set of owned and watch-only addresses

use std::collections::BTreeSet;

use crate::{data_structures::types::{hash_parts, Address}, scanning::chain_source::KeyOwnership};

#[derive(Debug, Clone)]
pub struct SimpleKeyring {
    receive: Address,
    change: Address,
    owned: BTreeSet<Address>,
    watch_only: BTreeSet<Address>,
}

impl SimpleKeyring {
    /// Derive a receive and a change address from a wallet label
    pub fn from_label(label: &str) -> Self {
        let derive = |purpose: &str| {
            let digest = hash_parts(b"mintspend.address", &[label.as_bytes(), purpose.as_bytes()]);
            Address::new(format!("{purpose}1{}", &hex::encode(digest)[..40]))
        };
        let receive = derive("recv");
        let change = derive("chg");
        let owned = [receive.clone(), change.clone()].into_iter().collect();
        Self {
            receive,
            change,
            owned,
            watch_only: BTreeSet::new(),
        }
    }

    pub fn with_address(mut self, address: Address) -> Self {
        self.owned.insert(address);
        self
    }

    /// Track `address` without holding its keys
    pub fn with_watch_only(mut self, address: Address) -> Self {
        self.watch_only.insert(address);
        self
    }

    pub fn addresses(&self) -> impl Iterator<Item = &Address> {
        self.owned.iter().chain(self.watch_only.iter())
    }
}

impl KeyOwnership for SimpleKeyring {
    fn owns_address(&self, address: &Address) -> bool {
        self.owned.contains(address) || self.watch_only.contains(address)
    }

    fn is_watch_only(&self, address: &Address) -> bool {
        self.watch_only.contains(address)
    }

    fn receive_address(&self) -> Address {
        self.receive.clone()
    }

    fn change_address(&self) -> Address {
        self.change.clone()
    }
}
