//! BCH Blockchain SDK - Script parsing, classification, and address handling.
//!
//! Provides the Bitcoin Cash Script type, opcode definitions, script
//! chunk parsing, output-template builders, and legacy Base58Check
//! address generation/validation.

pub mod script;
pub mod opcodes;
pub mod chunk;
pub mod address;

mod error;
pub use error::ScriptError;
pub use script::Script;
pub use address::{Address, AddressKind, Network};
pub use chunk::ScriptChunk;
