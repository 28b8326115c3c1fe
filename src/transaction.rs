use crate::{
    error::Error,
    utils::{exact_integer, flip, flipped_hex, hex_to_array, optional_field},
};
use serde_json::{Map, Value};
use std::convert::TryFrom;
use tracing::debug;

/// One transaction of a block template, in the order it must appear in the block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Raw serialized transaction.
    pub data: Vec<u8>,
    /// Transaction hash, byte order already flipped from the wire. `None` if absent or
    /// malformed.
    pub hash: Option<[u8; 32]>,
    /// Zero-based positions of earlier transactions this one depends on.
    pub depends: Vec<usize>,
    pub fee: Option<u64>,
    /// Whether the server insists on the transaction being included.
    pub required: bool,
    pub sigops: Option<u16>,
}

impl Transaction {
    /// Decodes a transaction object. Every entry of `depends` must be lower than
    /// `dependency_bound`, which is the transaction's own position in the template.
    pub fn from_json(json: &Value, dependency_bound: usize) -> Result<Self, Error> {
        let obj = json.as_object().ok_or(Error::WrongType("transaction"))?;

        let data = match obj.get("data") {
            Some(Value::String(s)) => {
                hex::decode(s).map_err(|error| Error::BadHex {
                    field: "data",
                    error,
                })?
            }
            Some(_) => return Err(Error::WrongType("data")),
            None => return Err(Error::MissingField("data")),
        };

        let hash = match obj.get("hash").and_then(Value::as_str) {
            Some(s) => match hex_to_array::<32>(s) {
                Ok(mut hash) => {
                    flip(&mut hash);
                    Some(hash)
                }
                Err(e) => {
                    debug!("Ignoring malformed transaction hash `{}`: {:?}", s, e);
                    None
                }
            },
            None => None,
        };

        let depends = match obj.get("depends") {
            Some(Value::Array(deps)) => parse_depends(deps, dependency_bound).unwrap_or_else(|| {
                debug!(
                    "Discarding depends {:?} of transaction at position {}",
                    deps, dependency_bound
                );
                Vec::new()
            }),
            _ => Vec::new(),
        };

        Ok(Transaction {
            data,
            hash,
            depends,
            fee: optional_field(obj, "fee"),
            required: matches!(obj.get("required"), Some(Value::Bool(true))),
            sigops: optional_field(obj, "sigops"),
        })
    }

    pub fn hash_hex(&self) -> Option<String> {
        self.hash.as_ref().map(|h| flipped_hex(h))
    }
}

/// All-or-nothing: a single bad entry rejects the whole list.
fn parse_depends(deps: &[Value], bound: usize) -> Option<Vec<usize>> {
    deps.iter()
        .map(|v| {
            let n = match v {
                Value::Number(n) => n,
                _ => return None,
            };
            exact_integer::<u64>(n)
                .and_then(|i| usize::try_from(i).ok())
                .filter(|i| *i < bound)
        })
        .collect()
}

/// Decodes the `transactions` array of a template.
pub(crate) fn parse_transactions(obj: &Map<String, Value>) -> Result<Vec<Transaction>, Error> {
    let txns = match obj.get("transactions") {
        Some(Value::Array(txns)) => txns,
        Some(_) => return Err(Error::WrongType("transactions")),
        None => return Err(Error::MissingField("transactions")),
    };
    txns.iter()
        .enumerate()
        .map(|(i, t)| Transaction::from_json(t, i).map_err(|e| e.in_transaction(Some(i))))
        .collect()
}

#[cfg(test)]
#[quickcheck_macros::quickcheck]
fn any_out_of_bound_entry_discards_depends(deps: Vec<u8>, bound: u8) -> bool {
    let json = serde_json::json!({"data": "00", "depends": deps});
    let txn = Transaction::from_json(&json, bound as usize).unwrap();
    if deps.iter().all(|d| d < &bound) {
        txn.depends == deps.iter().map(|d| *d as usize).collect::<Vec<_>>()
    } else {
        txn.depends.is_empty()
    }
}
