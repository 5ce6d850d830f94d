/// BCH Blockchain SDK - Transaction building, signing, and validation.
///
/// Provides the mutable Transaction builder with input-template
/// polymorphism, the incremental change/fee solver, BIP-69 ordering,
/// sanity verification, CashToken category accounting, ZCE
/// secured-payment verification, and binary/hex/object serialization.

pub mod transaction;
pub mod input;
pub mod output;
pub mod token;
pub mod sighash;
pub mod unspent;
pub mod object;
pub mod zce;

mod error;
pub use error::TransactionError;
pub use input::{Input, InputVariant, TransactionSignature};
pub use output::Output;
pub use token::{Capability, Nft, TokenData};
pub use transaction::{LockTime, SerializeOpts, Transaction};
pub use unspent::UnspentOutput;
