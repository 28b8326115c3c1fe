//! getblocktemplate RPC methods.
//!
//! [`client_to_server`] builds the requests a miner sends: work requests, block proposals and
//! block submissions. [`server_to_client`] reads the replies other than the template itself,
//! which is decoded by [`crate::template::Template`].
pub mod client_to_server;
pub mod server_to_client;

pub const GET_BLOCK_TEMPLATE: &str = "getblocktemplate";
pub const SUBMIT_BLOCK: &str = "submitblock";

/// Value of `mode` in a proposal request.
pub const PROPOSAL_MODE: &str = "proposal";
