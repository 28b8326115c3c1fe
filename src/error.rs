use crate::assembler::AssemblyError;
use ext_config::ConfigError;
use hex::FromHexError;
use serde_json::Value;

/// Coarse classification of an [`Error`].
///
/// Required wire-format anchors fail as [`ErrorKind::MalformedInput`], semantic refusals as
/// [`ErrorKind::PolicyViolation`]. Optional fields that cannot be validated never produce an
/// error: they are left unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MalformedInput,
    PolicyViolation,
    Protocol,
    AssemblyFailure,
    Config,
}

#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// The JSON-RPC envelope carried a non-null `error` member.
    JsonRpc(Box<Value>),
    /// A required member is absent.
    MissingField(&'static str),
    /// A member is present but has the wrong JSON type.
    WrongType(&'static str),
    /// A required number is fractional or does not fit the field.
    InvalidNumber(&'static str),
    /// Errors on bad hex decode, or a decoded buffer of the wrong length.
    BadHex {
        field: &'static str,
        error: FromHexError,
    },
    /// A transaction could not be decoded. `index` is `None` for `coinbasetxn`.
    Transaction {
        index: Option<usize>,
        source: Box<Error>,
    },
    /// The target template was already filled by an earlier decode.
    AlreadyPopulated,
    /// The block version is unknown and the template grants no mutation to fix it.
    UnsupportedVersion(u32),
    /// The block assembler refused to build the block.
    Assembly(AssemblyError),
    /// Errors on bad `config` TOML deserialize.
    BadConfigDeserialize(ConfigError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::JsonRpc(_) => ErrorKind::Protocol,
            Error::MissingField(_)
            | Error::WrongType(_)
            | Error::InvalidNumber(_)
            | Error::BadHex { .. } => ErrorKind::MalformedInput,
            Error::Transaction { source, .. } => source.kind(),
            Error::AlreadyPopulated | Error::UnsupportedVersion(_) => ErrorKind::PolicyViolation,
            Error::Assembly(_) => ErrorKind::AssemblyFailure,
            Error::BadConfigDeserialize(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn in_transaction(self, index: Option<usize>) -> Self {
        Error::Transaction {
            index,
            source: Box::new(self),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::JsonRpc(ref e) => write!(f, "JSON result is error: `{e}`"),
            Error::MissingField(field) => write!(f, "Missing '{field}'"),
            Error::WrongType(field) => write!(f, "Wrong type for '{field}'"),
            Error::InvalidNumber(field) => write!(f, "Invalid number value for '{field}'"),
            Error::BadHex { field, ref error } => {
                write!(f, "Error decoding '{field}': `{error:?}`")
            }
            Error::Transaction {
                index: Some(i),
                source,
            } => write!(f, "Transaction {i}: {source}"),
            Error::Transaction {
                index: None,
                source,
            } => write!(f, "Coinbase transaction: {source}"),
            Error::AlreadyPopulated => {
                write!(f, "Template already populated (combining not supported)")
            }
            Error::UnsupportedVersion(v) => write!(
                f,
                "Unrecognized block version `{v}`, and not allowed to reduce or force it"
            ),
            Error::Assembly(ref e) => write!(f, "Block assembly failed: `{e}`"),
            Error::BadConfigDeserialize(ref e) => {
                write!(f, "Bad `config` TOML deserialize: `{e:?}`")
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<AssemblyError> for Error {
    fn from(e: AssemblyError) -> Self {
        Error::Assembly(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::BadConfigDeserialize(e)
    }
}
