//! getblocktemplate client codec:
//!
//! A miner fetches the contents of a candidate block from a node or pool with the
//! `getblocktemplate` JSON-RPC call, builds a header, searches for a nonce and hands the solved
//! block back with `submitblock`.
//!
//! This crate covers the JSON side of that exchange:
//! * decoding a `getblocktemplate` result into a validated [`Template`]
//! * building work requests, block proposals and block submissions
//! * reading `submitblock` and proposal replies
//!
//! ## Templates
//! The result of a `getblocktemplate` call is an object describing the block: previous block
//! hash, compact target, time bounds, height, version and the transactions to include, in
//! order. Next to it the server lists the `mutable` parts of the template, the ways a miner may
//! change it (append to the coinbase, roll the time, reduce the version, ...).
//!
//! Decoding is the only place untrusted input enters a mining stack, so a successfully decoded
//! template can be used without re-validation. Required members are checked strictly; optional
//! members that cannot be used are ignored.
//!
//! ## Blocks
//! Building the serialized block is left to an [`Assembler`] supplied by the caller.
//!
//! References:
//! [https://en.bitcoin.it/wiki/BIP_0022]
//! [https://en.bitcoin.it/wiki/BIP_0023]
//! [https://en.bitcoin.it/wiki/Getblocktemplate]

pub mod assembler;
pub mod capabilities;
pub mod config;
pub mod error;
pub mod json_rpc;
pub mod methods;
pub mod template;
pub mod transaction;
pub mod utils;

pub use assembler::Assembler;
pub use capabilities::{Capabilities, Capability};
pub use error::{Error, ErrorKind};
pub use template::{SigopCount, Template, MAX_BLOCK_VERSION};
pub use transaction::Transaction;
