//! Interface to the block assembler.
//!
//! Turning a template into a serialized block (coinbase construction, merkle root, header) is not
//! done by this crate. Encoders that need a block call out to an [`Assembler`].
use crate::template::Template;
use std::fmt;

/// Bytes of header data produced by [`Assembler::sample_data`]: the 80 byte header without the
/// nonce.
pub const SAMPLE_DATA_LEN: usize = 0x4c;

/// Selects one of the pre-agreed coinbase layouts.
pub type DatasetId = u32;

pub type Nonce = u32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    /// The coinbase has no room left for the requested extranonce.
    InsufficientSpace,
    Other(String),
}

impl fmt::Display for AssemblyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssemblyError::InsufficientSpace => write!(f, "Not enough space in the coinbase"),
            AssemblyError::Other(e) => write!(f, "{e}"),
        }
    }
}

pub trait Assembler {
    /// Header data for `dataset_id`, used to build a sample block for proposals.
    fn sample_data(
        &self,
        template: &Template,
        dataset_id: DatasetId,
    ) -> Result<[u8; SAMPLE_DATA_LEN], AssemblyError>;

    /// Hex of the complete block built from `data` (header data as issued for `dataset_id`),
    /// `extranonce` and the winning `nonce`.
    ///
    /// `foreign` is set when the block is submitted on behalf of another template owner.
    fn assemble_submission(
        &self,
        template: &Template,
        data: &[u8],
        extranonce: &[u8],
        dataset_id: DatasetId,
        nonce: Nonce,
        foreign: bool,
    ) -> Result<String, AssemblyError>;
}
