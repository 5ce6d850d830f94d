use proptest::prelude::*;

use bch_script::Script;
use bch_transaction::input::Input;
use bch_transaction::{Output, Transaction};

/// Strategy to generate a structurally valid random transaction built
/// from raw inputs and plain outputs.
fn arb_transaction() -> impl Strategy<Value = Transaction> {
    let arb_input = (
        prop::array::uniform32(any::<u8>()),       // prev txid
        any::<u32>(),                              // prev output index
        prop::collection::vec(any::<u8>(), 0..64), // unlocking script bytes
        any::<u32>(),                              // sequence
    )
        .prop_map(|(txid, vout, script_bytes, sequence)| {
            Input::new_raw(txid, vout, Script::from_bytes(&script_bytes), sequence)
        });

    // Script bytes must not start with the token prefix marker, which
    // would be parsed back as token data instead of script.
    let arb_output = (
        0u64..21_000_000_000_000_000,
        prop::collection::vec(1u8..0xef, 0..64),
    )
        .prop_map(|(satoshis, script_bytes)| {
            Output::new(satoshis, Script::from_bytes(&script_bytes))
        });

    (
        1i32..=2,
        prop::collection::vec(arb_input, 1..4),
        prop::collection::vec(arb_output, 1..4),
        any::<u32>(), // locktime
    )
        .prop_map(|(version, inputs, outputs, locktime)| {
            let mut tx = Transaction::new();
            tx.set_version(version).unwrap();
            for input in inputs {
                tx.add_input_unchecked(input);
            }
            for output in outputs {
                tx.add_output(output);
            }
            if locktime > 0 && locktime < 500_000_000 {
                tx.lock_until_block_height(locktime).ok();
            }
            tx
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn transaction_serialize_deserialize_roundtrip(tx in arb_transaction()) {
        let bytes = tx.to_bytes();
        let parsed = Transaction::from_bytes(&bytes).unwrap();
        prop_assert_eq!(parsed.to_bytes(), bytes);
    }

    #[test]
    fn transaction_hex_roundtrip(tx in arb_transaction()) {
        let hex_str = tx.to_hex();
        let parsed = Transaction::from_hex(&hex_str).unwrap();
        prop_assert_eq!(parsed.to_hex(), hex_str);
    }

    #[test]
    fn transaction_id_stable_across_roundtrip(tx in arb_transaction()) {
        let parsed = Transaction::from_bytes(&tx.to_bytes()).unwrap();
        prop_assert_eq!(parsed.tx_id_hex(), tx.tx_id_hex());
    }

    #[test]
    fn sort_is_idempotent(tx in arb_transaction()) {
        let mut tx = tx;
        tx.sort().unwrap();
        let once = tx.to_bytes();
        tx.sort().unwrap();
        prop_assert_eq!(tx.to_bytes(), once);
    }

    #[test]
    fn object_form_roundtrip(tx in arb_transaction()) {
        let rebuilt = Transaction::from_object(&tx.to_object()).unwrap();
        prop_assert_eq!(rebuilt.to_hex(), tx.to_hex());
    }
}
