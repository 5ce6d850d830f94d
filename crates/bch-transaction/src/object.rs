//! Structured (object/JSON) form of a transaction.
//!
//! Mirrors the builder state rather than the wire form: txids and
//! scripts are hex strings, token categories are display-order hex, and
//! builder bookkeeping (change script, change index, explicit fee)
//! round-trips. A `hash` field, when present, must match the
//! reconstructed transaction id.

use serde::{Deserialize, Serialize};

use bch_script::Script;

use crate::input::Input;
use crate::output::Output;
use crate::token::{Capability, Nft, TokenData};
use crate::transaction::Transaction;
use crate::unspent::UnspentOutput;
use crate::TransactionError;

/// Object form of a transaction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransactionObject {
    /// The display-order transaction id. Validated on `from_object`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub hash: Option<String>,
    /// Transaction version.
    pub version: i32,
    /// Ordered inputs.
    pub inputs: Vec<InputObject>,
    /// Ordered outputs.
    pub outputs: Vec<OutputObject>,
    /// Raw lock time.
    #[serde(rename = "nLockTime")]
    pub n_lock_time: u32,
    /// The configured change script, hex.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub change_script: Option<String>,
    /// Index of the change output.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub change_index: Option<usize>,
    /// The explicit fee, when one was set.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub fee: Option<u64>,
}

/// Object form of an input.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InputObject {
    /// Display-order txid of the spent output.
    pub prev_tx_id: String,
    /// Index of the spent output.
    pub output_index: u32,
    /// Sequence number.
    pub sequence_number: u32,
    /// Unlocking script, hex.
    pub script: String,
    /// The spent output, when attached.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub output: Option<OutputObject>,
}

/// Object form of an output.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputObject {
    /// Output value.
    pub satoshis: u64,
    /// Locking script, hex.
    pub script: String,
    /// Token data, when present.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub token_data: Option<TokenDataObject>,
}

/// Object form of token data.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenDataObject {
    /// Display-order category id.
    pub category: String,
    /// Fungible amount.
    pub amount: u64,
    /// NFT half, when present.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub nft: Option<NftObject>,
}

/// Object form of an NFT.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NftObject {
    /// Capability name: "none", "mutable", or "minting".
    pub capability: String,
    /// Commitment bytes, hex.
    pub commitment: String,
}

impl Transaction {
    /// Build the object form of this transaction.
    pub fn to_object(&self) -> TransactionObject {
        TransactionObject {
            hash: Some(self.tx_id_hex()),
            version: self.version,
            inputs: self.inputs.iter().map(input_to_object).collect(),
            outputs: self.outputs.iter().map(output_to_object).collect(),
            n_lock_time: self.n_lock_time,
            change_script: self.change_script.as_ref().map(|s| s.to_hex()),
            change_index: self.change_index,
            fee: self.fee,
        }
    }

    /// Rebuild a transaction from its object form.
    ///
    /// When the object carries a `hash`, it must match the
    /// reconstructed id.
    pub fn from_object(obj: &TransactionObject) -> Result<Self, TransactionError> {
        let mut tx = Transaction::new();
        tx.version = obj.version;
        tx.n_lock_time = obj.n_lock_time;

        for input_obj in &obj.inputs {
            tx.inputs.push(input_from_object(input_obj)?);
        }
        for output_obj in &obj.outputs {
            tx.outputs.push(output_from_object(output_obj)?);
        }

        tx.change_script = match &obj.change_script {
            Some(hex_script) => Some(Script::from_hex(hex_script)?),
            None => None,
        };
        tx.change_index = obj.change_index;
        tx.fee = obj.fee;

        if let Some(hash) = &obj.hash {
            let reconstructed = tx.tx_id_hex();
            if *hash != reconstructed {
                return Err(TransactionError::InvalidArgument(format!(
                    "hash {} does not match reconstructed id {}",
                    hash, reconstructed
                )));
            }
        }

        Ok(tx)
    }

    /// Serialize the object form as JSON.
    pub fn to_json(&self) -> Result<String, TransactionError> {
        serde_json::to_string(&self.to_object())
            .map_err(|e| TransactionError::SerializationError(e.to_string()))
    }

    /// Rebuild a transaction from its JSON object form.
    pub fn from_json(json: &str) -> Result<Self, TransactionError> {
        let obj: TransactionObject = serde_json::from_str(json)
            .map_err(|e| TransactionError::SerializationError(e.to_string()))?;
        Self::from_object(&obj)
    }
}

fn input_to_object(input: &Input) -> InputObject {
    InputObject {
        prev_tx_id: input.prev_tx_id_hex(),
        output_index: input.output_index,
        sequence_number: input.sequence_number,
        script: input.script().to_hex(),
        output: input.output().map(output_to_object),
    }
}

fn input_from_object(obj: &InputObject) -> Result<Input, TransactionError> {
    let script = Script::from_hex(&obj.script)?;

    match &obj.output {
        Some(output_obj) => {
            // Rebuild through the UTXO path so the signing variant is
            // re-derived from the spent output's script shape.
            let output = output_from_object(output_obj)?;
            let utxo = UnspentOutput::new(
                &obj.prev_tx_id,
                obj.output_index,
                output.script.clone(),
                output.satoshis,
            )?
            .with_sequence(obj.sequence_number);
            let mut input = Input::from_utxo(&utxo)?;
            input.set_output(Some(output));
            input.set_script(script);
            Ok(input)
        }
        None => {
            let utxo = UnspentOutput::new(&obj.prev_tx_id, obj.output_index, Script::new(), 0)?;
            Ok(Input::new_raw(
                utxo.tx_id,
                obj.output_index,
                script,
                obj.sequence_number,
            ))
        }
    }
}

fn output_to_object(output: &Output) -> OutputObject {
    OutputObject {
        satoshis: output.satoshis,
        script: output.script.to_hex(),
        token_data: output.token_data.as_ref().map(|token| TokenDataObject {
            category: token.category_hex(),
            amount: token.amount,
            nft: token.nft.as_ref().map(|nft| NftObject {
                capability: nft.capability.as_str().to_string(),
                commitment: hex::encode(&nft.commitment),
            }),
        }),
    }
}

fn output_from_object(obj: &OutputObject) -> Result<Output, TransactionError> {
    let token_data = match &obj.token_data {
        Some(token_obj) => {
            let nft = match &token_obj.nft {
                Some(nft_obj) => Some(Nft {
                    capability: Capability::from_str_name(&nft_obj.capability)?,
                    commitment: hex::decode(&nft_obj.commitment).map_err(|e| {
                        TransactionError::InvalidArgument(format!(
                            "invalid commitment hex: {}",
                            e
                        ))
                    })?,
                }),
                None => None,
            };
            Some(TokenData {
                category: TokenData::category_from_hex(&token_obj.category)?,
                amount: token_obj.amount,
                nft,
            })
        }
        None => None,
    };

    Ok(Output {
        satoshis: obj.satoshis,
        script: Script::from_hex(&obj.script)?,
        token_data,
    })
}
