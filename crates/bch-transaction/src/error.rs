/// Error types for transaction operations.
///
/// Each variant names one failure mode of the builder, the serializer,
/// or a verification flow, and carries the context needed to diagnose
/// the failure without source inspection.
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    /// A builder argument failed validation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The parser was handed an empty buffer.
    #[error("no transaction data")]
    NoData,

    /// An output value is outside [0, MAX_MONEY].
    #[error("output {index} has invalid satoshis value {satoshis}")]
    InvalidSatoshis {
        /// Index of the offending output.
        index: usize,
        /// The out-of-range value.
        satoshis: u64,
    },

    /// Output values sum to more than the inputs provide.
    #[error("output amount exceeds input amount")]
    InvalidOutputAmountSum,

    /// The explicit fee does not match the unspent value.
    #[error("unspent value {unspent} differs from the explicit fee {fee}")]
    FeeDifferent {
        /// The fee the caller set.
        fee: u64,
        /// Actual inputs minus outputs.
        unspent: u64,
    },

    /// The implied fee is above the security margin.
    #[error("fee {fee} is larger than the maximum allowed {maximum}")]
    FeeTooLarge {
        /// The implied fee.
        fee: u64,
        /// The largest acceptable fee.
        maximum: u64,
    },

    /// The implied fee is below the security margin.
    #[error("fee {fee} is smaller than the minimum required {minimum}")]
    FeeTooSmall {
        /// The implied fee.
        fee: u64,
        /// The smallest acceptable fee.
        minimum: u64,
    },

    /// Funds would be burned as fee because no change address is set.
    #[error("fee is too large and no change address was provided")]
    ChangeAddressMissing,

    /// A non-data output is below the dust threshold.
    #[error("dust output at index {0}")]
    DustOutputs(usize),

    /// Some inputs have not been fully signed.
    #[error("some inputs have not been fully signed")]
    MissingSignatures,

    /// An input is missing its spent-output information.
    #[error("input {0} is missing the output it spends")]
    MissingUtxoInfo(usize),

    /// The UTXO script does not match any supported input template.
    #[error("unsupported input script: {0}")]
    UnsupportedScript(String),

    /// An index argument is out of range.
    #[error("index {index} out of range (length {length})")]
    InvalidIndex {
        /// The requested index.
        index: usize,
        /// The collection length.
        length: usize,
    },

    /// A sorting function did not return a permutation of its input.
    #[error("sort function must return a permutation of the original elements")]
    InvalidSorting,

    /// A timestamp lock is below the block-height threshold.
    #[error("lock time {0} is earlier than the timestamp threshold")]
    LockTimeTooEarly(u64),

    /// A block-height lock is at or above the block-height threshold.
    #[error("block height {0} is at or above the block height limit")]
    BlockHeightTooHigh(u64),

    /// A lock time does not fit in 32 bits.
    #[error("lock time {0} is out of range")]
    NLockTimeOutOfRange(u64),

    /// An input's script template is unknown, so its signatures cannot
    /// be checked.
    #[error("unable to verify signature: unrecognized input script")]
    UnableToVerifySignature,

    /// A CashToken consensus rule was violated.
    #[error("token validation failed: {0}")]
    TokenValidation(String),

    /// A wire-format read or write failed.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// An underlying script error (forwarded from `bch-script`).
    #[error("script error: {0}")]
    Script(#[from] bch_script::ScriptError),

    /// An underlying primitives error (forwarded from `bch-primitives`).
    #[error("primitives error: {0}")]
    Primitives(#[from] bch_primitives::PrimitivesError),
}
