//! Decoding of `getblocktemplate` results.
//!
//! A [`Template`] starts out empty and is filled exactly once from a JSON-RPC result by
//! [`Template::add_json`] (or built directly with [`Template::decode`]). After that it is
//! read-only.
//!
//! Validation is split in two tiers. The members a block cannot be built without (`bits`,
//! `curtime`, `height`, `previousblockhash`, `version`, `transactions`) abort the decode when
//! missing, mistyped or out of range. Every other member is applied only if it is usable and is
//! otherwise left unset.
use crate::{
    capabilities::{Capabilities, Capability},
    error::Error,
    json_rpc::split_envelope,
    transaction::{parse_transactions, Transaction},
    utils::{flip, flipped_hex, hex_to_array, optional_field, require_field},
};
use byteorder::{ByteOrder, LittleEndian};
use serde_json::{Map, Value};
use std::{collections::BTreeMap, convert::TryFrom, ops::Add};
use tracing::{debug, trace, warn};

/// Highest block version this crate knows how to build.
pub const MAX_BLOCK_VERSION: u32 = 4;

/// Sum of the signature operations of a set of transactions.
///
/// Once one contributing transaction has an unknown count the total is unknown too.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigopCount {
    Known(u64),
    Unknown,
}

impl Default for SigopCount {
    fn default() -> Self {
        SigopCount::Known(0)
    }
}

impl From<Option<u16>> for SigopCount {
    fn from(count: Option<u16>) -> Self {
        count.map_or(SigopCount::Unknown, |c| SigopCount::Known(c as u64))
    }
}

impl Add for SigopCount {
    type Output = SigopCount;

    fn add(self, rhs: SigopCount) -> SigopCount {
        match (self, rhs) {
            (SigopCount::Known(a), SigopCount::Known(b)) => SigopCount::Known(a.saturating_add(b)),
            _ => SigopCount::Unknown,
        }
    }
}

impl SigopCount {
    pub fn known(self) -> Option<u64> {
        match self {
            SigopCount::Known(n) => Some(n),
            SigopCount::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LongPoll {
    pub id: Option<String>,
    pub uri: Option<String>,
}

/// A candidate block as described by a `getblocktemplate` result.
///
/// Binary members are stored in the byte order the assembler needs; the `*_hex` accessors give
/// them back in wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    version: u32,
    height: u32,
    diffbits: [u8; 4],
    prevblk: [u8; 32],
    target: Option<[u8; 32]>,
    curtime: u32,
    mintime: Option<u32>,
    maxtime: Option<u32>,
    mintimeoff: Option<i16>,
    maxtimeoff: Option<i16>,
    expires: Option<i16>,
    sigoplimit: Option<u32>,
    sizelimit: Option<u64>,
    coinbase_value: Option<u64>,
    workid: Option<String>,
    longpoll: LongPoll,
    submit_old: bool,
    mutations: Capabilities,
    transactions: Vec<Transaction>,
    coinbase_txn: Option<Transaction>,
    coinbase_aux: BTreeMap<String, Vec<u8>>,
    total_tx_data_size: usize,
    total_sigops: SigopCount,
    received_at: Option<u64>,
}

impl Default for Template {
    fn default() -> Self {
        Template {
            version: 0,
            height: 0,
            diffbits: [0; 4],
            prevblk: [0; 32],
            target: None,
            curtime: 0,
            mintime: None,
            maxtime: None,
            mintimeoff: None,
            maxtimeoff: None,
            expires: None,
            sigoplimit: None,
            sizelimit: None,
            coinbase_value: None,
            workid: None,
            longpoll: LongPoll::default(),
            submit_old: true,
            mutations: Capabilities::empty(),
            transactions: Vec::new(),
            coinbase_txn: None,
            coinbase_aux: BTreeMap::new(),
            total_tx_data_size: 0,
            total_sigops: SigopCount::default(),
            received_at: None,
        }
    }
}

impl Template {
    /// An unpopulated template.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes `json` into a new template received at `received_at` (unix seconds).
    pub fn decode(json: &Value, received_at: u64) -> Result<Self, Error> {
        let mut template = Template::new();
        template.add_json(json, received_at)?;
        Ok(template)
    }

    /// Fills this template from a `getblocktemplate` result or a JSON-RPC envelope holding one.
    ///
    /// Fails without touching `self` if the template is already populated or `json` does not
    /// yield a valid template.
    pub fn add_json(&mut self, json: &Value, received_at: u64) -> Result<(), Error> {
        if self.is_populated() {
            return Err(Error::AlreadyPopulated);
        }
        let result = split_envelope(json)?;
        let obj = result.as_object().ok_or(Error::WrongType("result"))?;
        let mut template = Template::parse(obj)?;
        template.received_at = Some(received_at);
        trace!(
            "Decoded template at height {} with {} transactions",
            template.height,
            template.transactions.len()
        );
        *self = template;
        Ok(())
    }

    fn parse(obj: &Map<String, Value>) -> Result<Self, Error> {
        let mut diffbits: [u8; 4] = require_field(obj, "bits")?;
        flip(&mut diffbits);
        let curtime = require_field(obj, "curtime")?;
        let height = require_field(obj, "height")?;
        let mut prevblk: [u8; 32] = require_field(obj, "previousblockhash")?;
        flip(&mut prevblk);
        let version: u32 = require_field(obj, "version")?;

        let transactions = parse_transactions(obj)?;
        let total_tx_data_size = transactions.iter().map(|t| t.data.len()).sum();
        let total_sigops = transactions
            .iter()
            .fold(SigopCount::default(), |acc, t| acc + SigopCount::from(t.sigops));

        let coinbase_txn = match obj.get("coinbasetxn") {
            Some(cb @ Value::Object(_)) => {
                Some(Transaction::from_json(cb, 0).map_err(|e| e.in_transaction(None))?)
            }
            _ => None,
        };

        let coinbase_aux = match obj.get("coinbaseaux") {
            Some(Value::Object(aux)) => parse_coinbase_aux(aux)?,
            _ => BTreeMap::new(),
        };

        let target = match obj.get("target") {
            Some(Value::String(s)) => {
                let mut target =
                    hex_to_array::<32>(s).map_err(|error| Error::BadHex {
                        field: "target",
                        error,
                    })?;
                flip(&mut target);
                Some(target)
            }
            _ => None,
        };

        let mut mutations = Capabilities::empty();
        if let Some(Value::Array(names)) = obj.get("mutable") {
            for name in names {
                match name.as_str() {
                    Some(name) => {
                        if !mutations.insert_name(name) {
                            debug!("Ignoring unknown mutation `{}`", name);
                        }
                    }
                    None => debug!("Skipping non-string mutation {}", name),
                }
            }
        }

        let version = check_version(version, height, mutations)?;

        Ok(Template {
            version,
            height,
            diffbits,
            prevblk,
            target,
            curtime,
            mintime: optional_field(obj, "mintime"),
            maxtime: optional_field(obj, "maxtime"),
            mintimeoff: optional_field(obj, "mintimeoff"),
            maxtimeoff: optional_field(obj, "maxtimeoff"),
            expires: optional_field(obj, "expires"),
            sigoplimit: optional_field(obj, "sigoplimit"),
            sizelimit: optional_field(obj, "sizelimit"),
            coinbase_value: optional_field(obj, "coinbasevalue"),
            workid: optional_field(obj, "workid"),
            longpoll: LongPoll {
                id: optional_field(obj, "longpollid"),
                uri: optional_field(obj, "longpolluri"),
            },
            submit_old: optional_field(obj, "submitold").unwrap_or(true),
            mutations,
            transactions,
            coinbase_txn,
            coinbase_aux,
            total_tx_data_size,
            total_sigops,
            received_at: None,
        })
    }

    pub fn is_populated(&self) -> bool {
        self.version != 0 || self.received_at.is_some()
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Compact target, in assembler byte order.
    pub fn diffbits(&self) -> &[u8; 4] {
        &self.diffbits
    }

    /// Compact target as the `nBits` integer.
    pub fn diffbits_compact(&self) -> u32 {
        LittleEndian::read_u32(&self.diffbits)
    }

    pub fn bits_hex(&self) -> String {
        flipped_hex(&self.diffbits)
    }

    pub fn prevblk(&self) -> &[u8; 32] {
        &self.prevblk
    }

    pub fn previous_block_hash_hex(&self) -> String {
        flipped_hex(&self.prevblk)
    }

    pub fn target(&self) -> Option<&[u8; 32]> {
        self.target.as_ref()
    }

    pub fn target_hex(&self) -> Option<String> {
        self.target.as_ref().map(|t| flipped_hex(t))
    }

    pub fn curtime(&self) -> u32 {
        self.curtime
    }

    pub fn mintime(&self) -> Option<u32> {
        self.mintime
    }

    pub fn maxtime(&self) -> Option<u32> {
        self.maxtime
    }

    pub fn mintimeoff(&self) -> Option<i16> {
        self.mintimeoff
    }

    pub fn maxtimeoff(&self) -> Option<i16> {
        self.maxtimeoff
    }

    /// Seconds after receipt the server considers this template good for.
    pub fn expires(&self) -> Option<i16> {
        self.expires
    }

    pub fn sigoplimit(&self) -> Option<u32> {
        self.sigoplimit
    }

    pub fn sizelimit(&self) -> Option<u64> {
        self.sizelimit
    }

    pub fn coinbase_value(&self) -> Option<u64> {
        self.coinbase_value
    }

    pub fn workid(&self) -> Option<&str> {
        self.workid.as_deref()
    }

    pub fn longpoll(&self) -> &LongPoll {
        &self.longpoll
    }

    /// Whether shares for this template stay acceptable after a newer one is issued.
    pub fn submit_old(&self) -> bool {
        self.submit_old
    }

    pub fn mutations(&self) -> Capabilities {
        self.mutations
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn coinbase_txn(&self) -> Option<&Transaction> {
        self.coinbase_txn.as_ref()
    }

    pub fn coinbase_aux(&self) -> &BTreeMap<String, Vec<u8>> {
        &self.coinbase_aux
    }

    pub fn total_tx_data_size(&self) -> usize {
        self.total_tx_data_size
    }

    pub fn total_sigops(&self) -> SigopCount {
        self.total_sigops
    }

    pub fn received_at(&self) -> Option<u64> {
        self.received_at
    }

    /// Seconds left before the template expires at `now`, or `None` if the server gave no
    /// expiry.
    pub fn time_left(&self, now: u64) -> Option<u64> {
        let expires = u64::from(self.expires?.max(0) as u16);
        let age = now.saturating_sub(self.received_at?);
        Some(expires.saturating_sub(age))
    }

    /// Header time to use at `now`: `curtime` advanced by the age of the template, kept inside
    /// `mintime` and `maxtime` when the server gave them.
    pub fn time_at(&self, now: u64) -> u32 {
        let age = now.saturating_sub(self.received_at.unwrap_or(now));
        let age = u32::try_from(age).unwrap_or(u32::MAX);
        let mut time = self.curtime.saturating_add(age);
        if let Some(max) = self.maxtime {
            time = time.min(max);
        }
        if let Some(min) = self.mintime {
            time = time.max(min);
        }
        time
    }
}

fn parse_coinbase_aux(aux: &Map<String, Value>) -> Result<BTreeMap<String, Vec<u8>>, Error> {
    let mut out = BTreeMap::new();
    for (name, value) in aux {
        match value {
            Value::String(s) => {
                let data = hex::decode(s).map_err(|error| Error::BadHex {
                    field: "coinbaseaux",
                    error,
                })?;
                out.insert(name.clone(), data);
            }
            _ => debug!("Skipping non-string coinbaseaux member `{}`", name),
        }
    }
    Ok(out)
}

/// Applies the version policy: an unknown version, or a version of 2 or more at height 0, is
/// only accepted when the template allows reducing or forcing it.
fn check_version(version: u32, height: u32, mutations: Capabilities) -> Result<u32, Error> {
    if version <= MAX_BLOCK_VERSION && !(version >= 2 && height == 0) {
        return Ok(version);
    }
    if mutations.contains(Capability::VersionReduce) {
        let reduced = if height == 0 { 1 } else { MAX_BLOCK_VERSION };
        warn!("Reducing block version {} to {}", version, reduced);
        Ok(reduced)
    } else if mutations.contains(Capability::VersionForce) {
        warn!("Forcing unrecognized block version {}", version);
        Ok(version)
    } else {
        Err(Error::UnsupportedVersion(version))
    }
}

#[cfg(test)]
use quickcheck::{Arbitrary, Gen};

#[cfg(test)]
impl Arbitrary for SigopCount {
    fn arbitrary(g: &mut Gen) -> Self {
        SigopCount::from(Option::<u16>::arbitrary(g))
    }
}

#[cfg(test)]
#[quickcheck_macros::quickcheck]
fn sigop_total_unknown_iff_any_unknown(counts: Vec<SigopCount>) -> bool {
    let total = counts
        .iter()
        .fold(SigopCount::default(), |acc, c| acc + *c);
    let any_unknown = counts.iter().any(|c| *c == SigopCount::Unknown);
    (total == SigopCount::Unknown) == any_unknown
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    const PREVHASH: &str = "000000000000000000034a9551de4ba3f8ef5f2e4fb2c9ff9d8c71eb3b0f6ee4";

    fn base() -> Value {
        json!({
            "bits": "1d00ffff",
            "curtime": 1_700_000_000u32,
            "height": 800_000,
            "previousblockhash": PREVHASH,
            "version": 2,
            "transactions": []
        })
    }

    fn with(mut doc: Value, key: &str, value: Value) -> Value {
        doc.as_object_mut().unwrap().insert(key.to_string(), value);
        doc
    }

    fn without(mut doc: Value, key: &str) -> Value {
        doc.as_object_mut().unwrap().remove(key);
        doc
    }

    #[test]
    fn decodes_required_fields() {
        let t = Template::decode(&base(), 42).unwrap();
        assert_eq!(t.version(), 2);
        assert_eq!(t.height(), 800_000);
        assert_eq!(t.curtime(), 1_700_000_000);
        assert_eq!(t.diffbits(), &[0xff, 0xff, 0x00, 0x1d]);
        assert_eq!(t.diffbits_compact(), 0x1d00ffff);
        assert_eq!(t.bits_hex(), "1d00ffff");
        assert_eq!(t.prevblk()[0], 0xe4);
        assert_eq!(t.previous_block_hash_hex(), PREVHASH);
        assert_eq!(t.received_at(), Some(42));
        assert!(t.submit_old());
        assert!(t.transactions().is_empty());
        assert_eq!(t.total_sigops(), SigopCount::Known(0));
        assert_eq!(t.target(), None);
        assert_eq!(t.workid(), None);
    }

    #[test]
    fn decodes_envelope_and_optional_fields() {
        let mut result = base();
        for (k, v) in [
            ("sigoplimit", json!(80_000)),
            ("sizelimit", json!(4_000_000)),
            ("coinbasevalue", json!(625_000_000)),
            ("workid", json!("w1")),
            ("expires", json!(120)),
            ("mintime", json!(1_699_999_000u32)),
            ("maxtime", json!(1_700_007_200u32)),
            ("mintimeoff", json!(-1000)),
            ("maxtimeoff", json!(7200)),
            ("longpollid", json!("lp1")),
            ("longpolluri", json!("/lp")),
            ("submitold", json!(false)),
            ("target", json!(PREVHASH)),
            ("coinbaseaux", json!({"flags": "062f503253482f", "bad": 5})),
            ("mutable", json!(["time/increment", 7, "coinbase/append", "bogus"])),
        ]
        .iter()
        .cloned()
        {
            result = with(result, k, v);
        }
        let doc = json!({"result": result, "error": null, "id": 0});
        let t = Template::decode(&doc, 0).unwrap();
        assert_eq!(t.sigoplimit(), Some(80_000));
        assert_eq!(t.sizelimit(), Some(4_000_000));
        assert_eq!(t.coinbase_value(), Some(625_000_000));
        assert_eq!(t.workid(), Some("w1"));
        assert_eq!(t.expires(), Some(120));
        assert_eq!(t.mintime(), Some(1_699_999_000));
        assert_eq!(t.maxtime(), Some(1_700_007_200));
        assert_eq!(t.mintimeoff(), Some(-1000));
        assert_eq!(t.maxtimeoff(), Some(7200));
        assert_eq!(t.longpoll().id.as_deref(), Some("lp1"));
        assert_eq!(t.longpoll().uri.as_deref(), Some("/lp"));
        assert!(!t.submit_old());
        assert_eq!(t.target_hex().as_deref(), Some(PREVHASH));
        assert_eq!(t.coinbase_aux().len(), 1);
        assert_eq!(
            t.coinbase_aux().get("flags").unwrap(),
            &hex::decode("062f503253482f").unwrap()
        );
        assert_eq!(
            t.mutations(),
            Capability::TimeIncrement | Capability::CoinbaseAppend
        );
    }

    #[test]
    fn missing_required_field_names_it() {
        for key in ["bits", "curtime", "height", "previousblockhash", "version", "transactions"]
            .iter()
        {
            let err = Template::decode(&without(base(), key), 0).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedInput);
            assert!(err.to_string().contains(key), "{} not in {}", key, err);
        }
    }

    #[test]
    fn required_field_errors() {
        let doc = with(base(), "curtime", json!("notanumber"));
        match Template::decode(&doc, 0) {
            Err(Error::WrongType("curtime")) => (),
            other => panic!("unexpected {:?}", other),
        }
        let doc = with(base(), "height", json!(1.5));
        match Template::decode(&doc, 0) {
            Err(Error::InvalidNumber("height")) => (),
            other => panic!("unexpected {:?}", other),
        }
        let doc = with(base(), "curtime", json!(-1));
        match Template::decode(&doc, 0) {
            Err(Error::InvalidNumber("curtime")) => (),
            other => panic!("unexpected {:?}", other),
        }
        let doc = with(base(), "bits", json!("1d00ff"));
        match Template::decode(&doc, 0) {
            Err(Error::BadHex { field: "bits", .. }) => (),
            other => panic!("unexpected {:?}", other),
        }
        let doc = with(base(), "target", json!("00"));
        match Template::decode(&doc, 0) {
            Err(Error::BadHex { field: "target", .. }) => (),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn invalid_optional_fields_are_omitted() {
        let doc = with(base(), "sigoplimit", json!(5.5));
        let doc = with(doc, "sizelimit", json!(-3));
        let doc = with(doc, "workid", json!(12));
        let doc = with(doc, "submitold", json!("no"));
        let doc = with(doc, "expires", json!(100_000));
        let doc = with(doc, "target", json!(3));
        let t = Template::decode(&doc, 0).unwrap();
        assert_eq!(t.sigoplimit(), None);
        assert_eq!(t.sizelimit(), None);
        assert_eq!(t.workid(), None);
        assert!(t.submit_old());
        assert_eq!(t.expires(), None);
        assert_eq!(t.target(), None);
    }

    #[test]
    fn error_envelope_fails_first() {
        let doc = json!({"result": base(), "error": "some error"});
        let err = Template::decode(&doc, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
        let doc = json!({"result": 7, "error": null});
        match Template::decode(&doc, 0) {
            Err(Error::WrongType("result")) => (),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn second_decode_is_refused() {
        let mut t = Template::new();
        assert!(!t.is_populated());
        t.add_json(&base(), 1).unwrap();
        let before = t.clone();
        match t.add_json(&base(), 2) {
            Err(Error::AlreadyPopulated) => (),
            other => panic!("unexpected {:?}", other),
        }
        match t.add_json(&json!(null), 2) {
            Err(Error::AlreadyPopulated) => (),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(t, before);
    }

    #[test]
    fn failed_decode_leaves_target_empty() {
        let mut t = Template::new();
        assert!(t.add_json(&without(base(), "height"), 1).is_err());
        assert!(!t.is_populated());
        t.add_json(&base(), 1).unwrap();
        assert!(t.is_populated());
    }

    #[test]
    fn transactions_and_totals() {
        let doc = with(
            base(),
            "transactions",
            json!([
                {"data": "0000", "sigops": 5},
                {"data": "000000", "depends": [0, 1]},
                {"data": "00", "sigops": 3, "depends": [0, 1]}
            ]),
        );
        let t = Template::decode(&doc, 0).unwrap();
        assert_eq!(t.transactions().len(), 3);
        assert!(t.transactions()[1].depends.is_empty());
        assert_eq!(t.transactions()[2].depends, vec![0, 1]);
        assert_eq!(t.total_tx_data_size(), 6);
        assert_eq!(t.total_sigops(), SigopCount::Unknown);

        let doc = with(
            base(),
            "transactions",
            json!([{"data": "00", "sigops": 5}, {"data": "00", "sigops": 3}]),
        );
        let t = Template::decode(&doc, 0).unwrap();
        assert_eq!(t.total_sigops(), SigopCount::Known(8));
        assert_eq!(t.total_sigops().known(), Some(8));
    }

    #[test]
    fn bad_transaction_aborts() {
        let doc = with(base(), "transactions", json!([{"data": "00"}, {"hash": "00"}]));
        match Template::decode(&doc, 0) {
            Err(Error::Transaction { index: Some(1), .. }) => (),
            other => panic!("unexpected {:?}", other),
        }
        let doc = with(base(), "coinbasetxn", json!({"data": "xx"}));
        match Template::decode(&doc, 0) {
            Err(Error::Transaction { index: None, .. }) => (),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn coinbase_txn_has_no_dependencies() {
        let doc = with(base(), "coinbasetxn", json!({"data": "01", "depends": [0], "fee": 2}));
        let t = Template::decode(&doc, 0).unwrap();
        let cb = t.coinbase_txn().unwrap();
        assert!(cb.depends.is_empty());
        assert_eq!(cb.fee, Some(2));
    }

    #[test]
    fn bad_coinbase_aux_hex_aborts() {
        let doc = with(base(), "coinbaseaux", json!({"flags": "0g"}));
        match Template::decode(&doc, 0) {
            Err(Error::BadHex {
                field: "coinbaseaux",
                ..
            }) => (),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn version_policy() {
        let genesis = with(with(base(), "height", json!(0)), "version", json!(3));
        match Template::decode(&genesis, 0) {
            Err(Error::UnsupportedVersion(3)) => (),
            other => panic!("unexpected {:?}", other),
        }
        let reduced = with(genesis.clone(), "mutable", json!(["version/reduce"]));
        assert_eq!(Template::decode(&reduced, 0).unwrap().version(), 1);
        let forced = with(genesis, "mutable", json!(["version/force"]));
        assert_eq!(Template::decode(&forced, 0).unwrap().version(), 3);

        let future = with(base(), "version", json!(0x2000_0000));
        assert!(Template::decode(&future, 0).is_err());
        let reduced = with(future, "mutable", json!(["version/reduce"]));
        assert_eq!(
            Template::decode(&reduced, 0).unwrap().version(),
            MAX_BLOCK_VERSION
        );

        let first = with(with(base(), "height", json!(0)), "version", json!(1));
        assert_eq!(Template::decode(&first, 0).unwrap().version(), 1);
    }

    #[test]
    fn time_helpers() {
        let doc = with(base(), "expires", json!(60));
        let doc = with(doc, "maxtime", json!(1_700_000_030u32));
        let t = Template::decode(&doc, 1000).unwrap();
        assert_eq!(t.time_left(1000), Some(60));
        assert_eq!(t.time_left(1045), Some(15));
        assert_eq!(t.time_left(2000), Some(0));
        assert_eq!(t.time_at(1010), 1_700_000_010);
        assert_eq!(t.time_at(1100), 1_700_000_030);

        let t = Template::decode(&base(), 1000).unwrap();
        assert_eq!(t.time_left(1000), None);
    }
}
