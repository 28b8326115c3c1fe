//! Capabilities and mutations negotiated over getblocktemplate.
//!
//! The client advertises the features it understands in the `capabilities` list of a work
//! request, and the server lists the changes a miner may make to the template in `mutable`. Both
//! share one namespace, so a single bitmask type covers them.
//!
//! The set is fixed: the bit of each entry is `1 << ordinal` in [`Capability::ALL`].
use std::{fmt, ops::BitOr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    CoinbaseTxn,
    CoinbaseValue,
    WorkId,
    LongPoll,
    Proposal,
    ServerList,
    /// May append data to the coinbase scriptSig.
    CoinbaseAppend,
    /// May replace the coinbase transaction entirely.
    CoinbaseSet,
    Generation,
    TimeIncrement,
    TimeDecrement,
    TransactionsAdd,
    PrevBlock,
    /// May submit the version unchanged even if this client does not understand it.
    VersionForce,
    /// May lower an unknown version to one this client understands.
    VersionReduce,
    SubmitHash,
    SubmitCoinbase,
    SubmitTruncate,
    ShareCoinbase,
    ShareMerkle,
    ShareTruncate,
}

impl Capability {
    pub const ALL: [Capability; 21] = [
        Capability::CoinbaseTxn,
        Capability::CoinbaseValue,
        Capability::WorkId,
        Capability::LongPoll,
        Capability::Proposal,
        Capability::ServerList,
        Capability::CoinbaseAppend,
        Capability::CoinbaseSet,
        Capability::Generation,
        Capability::TimeIncrement,
        Capability::TimeDecrement,
        Capability::TransactionsAdd,
        Capability::PrevBlock,
        Capability::VersionForce,
        Capability::VersionReduce,
        Capability::SubmitHash,
        Capability::SubmitCoinbase,
        Capability::SubmitTruncate,
        Capability::ShareCoinbase,
        Capability::ShareMerkle,
        Capability::ShareTruncate,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Capability::CoinbaseTxn => "coinbasetxn",
            Capability::CoinbaseValue => "coinbasevalue",
            Capability::WorkId => "workid",
            Capability::LongPoll => "longpoll",
            Capability::Proposal => "proposal",
            Capability::ServerList => "serverlist",
            Capability::CoinbaseAppend => "coinbase/append",
            Capability::CoinbaseSet => "coinbase",
            Capability::Generation => "generation",
            Capability::TimeIncrement => "time/increment",
            Capability::TimeDecrement => "time/decrement",
            Capability::TransactionsAdd => "transactions/add",
            Capability::PrevBlock => "prevblock",
            Capability::VersionForce => "version/force",
            Capability::VersionReduce => "version/reduce",
            Capability::SubmitHash => "submit/hash",
            Capability::SubmitCoinbase => "submit/coinbase",
            Capability::SubmitTruncate => "submit/truncate",
            Capability::ShareCoinbase => "share/coinbase",
            Capability::ShareMerkle => "share/merkle",
            Capability::ShareTruncate => "share/truncate",
        }
    }

    pub fn from_name(name: &str) -> Option<Capability> {
        Capability::ALL.iter().copied().find(|c| c.name() == name)
    }

    pub fn bit(self) -> u32 {
        1 << (self as u32)
    }

    pub fn from_bit(bit: u32) -> Option<Capability> {
        Capability::ALL.iter().copied().find(|c| c.bit() == bit)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bit of the capability called `name`, or 0 when the name is not known.
pub fn name_to_flag(name: &str) -> u32 {
    Capability::from_name(name).map_or(0, Capability::bit)
}

/// Wire name of a single capability bit.
pub fn flag_to_name(bit: u32) -> Option<&'static str> {
    Capability::from_bit(bit).map(Capability::name)
}

/// A set of [`Capability`] values stored as a bitmask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Capabilities(pub u32);

impl Capabilities {
    pub fn empty() -> Self {
        Capabilities(0)
    }

    /// What a client that can rebuild the coinbase and roll time advertises by default.
    pub fn default_client() -> Self {
        [
            Capability::CoinbaseTxn,
            Capability::WorkId,
            Capability::CoinbaseAppend,
            Capability::TimeIncrement,
            Capability::TimeDecrement,
            Capability::TransactionsAdd,
            Capability::PrevBlock,
            Capability::VersionForce,
            Capability::VersionReduce,
            Capability::LongPoll,
            Capability::Proposal,
            Capability::SubmitCoinbase,
        ]
        .iter()
        .copied()
        .collect()
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    pub fn intersects(&self, other: Capabilities) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, capability: Capability) {
        self.0 |= capability.bit();
    }

    /// ORs in the capability named `name`. Unknown names leave the set unchanged and return
    /// false.
    pub fn insert_name(&mut self, name: &str) -> bool {
        let bit = name_to_flag(name);
        self.0 |= bit;
        bit != 0
    }

    /// Members in registry order. Bits outside the registry are never yielded.
    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL
            .iter()
            .copied()
            .filter(move |c| self.contains(*c))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.iter().map(Capability::name).collect()
    }

    pub fn from_names<'a, I: IntoIterator<Item = &'a str>>(names: I) -> Self {
        let mut caps = Capabilities::empty();
        for name in names {
            caps.insert_name(name);
        }
        caps
    }
}

impl From<Capability> for Capabilities {
    fn from(c: Capability) -> Self {
        Capabilities(c.bit())
    }
}

impl std::iter::FromIterator<Capability> for Capabilities {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        let mut caps = Capabilities::empty();
        for c in iter {
            caps.insert(c);
        }
        caps
    }
}

impl BitOr for Capabilities {
    type Output = Capabilities;

    fn bitor(self, rhs: Capabilities) -> Capabilities {
        Capabilities(self.0 | rhs.0)
    }
}

impl BitOr<Capability> for Capabilities {
    type Output = Capabilities;

    fn bitor(self, rhs: Capability) -> Capabilities {
        Capabilities(self.0 | rhs.bit())
    }
}

impl BitOr for Capability {
    type Output = Capabilities;

    fn bitor(self, rhs: Capability) -> Capabilities {
        Capabilities(self.bit() | rhs.bit())
    }
}

#[cfg(test)]
use quickcheck::{Arbitrary, Gen};

#[cfg(test)]
impl Arbitrary for Capabilities {
    fn arbitrary(g: &mut Gen) -> Self {
        Capabilities(u32::arbitrary(g))
    }
}

#[cfg(test)]
#[quickcheck_macros::quickcheck]
fn names_round_trip_to_known_bits(caps: Capabilities) -> bool {
    let known = caps.0 & ((1 << Capability::ALL.len()) - 1);
    let names = caps.names();
    Capabilities::from_names(names.iter().copied()).0 == known
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_bit_has_a_name() {
        for (i, c) in Capability::ALL.iter().enumerate() {
            assert_eq!(c.bit(), 1 << i);
            assert_eq!(flag_to_name(c.bit()), Some(c.name()));
            assert_eq!(name_to_flag(c.name()), c.bit());
        }
        assert_eq!(flag_to_name(1 << 30), None);
    }

    #[test]
    fn unknown_name_maps_to_no_bit() {
        assert_eq!(name_to_flag("coinbase/prepend"), 0);
        let mut caps = Capabilities::empty();
        assert!(!caps.insert_name("nonsense"));
        assert_eq!(caps, Capabilities::empty());
    }

    #[test]
    fn names_follow_registry_order() {
        let caps = Capability::VersionReduce | Capability::CoinbaseAppend;
        assert_eq!(caps.names(), vec!["coinbase/append", "version/reduce"]);
    }
}
