use proptest::prelude::*;

use bch_primitives::ec::{schnorr, PrivateKey, Signature};
use bch_primitives::hash::sha256;
use bch_primitives::util::{TxReader, TxWriter, VarInt};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn varint_roundtrip(value in any::<u64>()) {
        let mut writer = TxWriter::new();
        writer.write_varint(VarInt(value));
        let bytes = writer.into_bytes();
        prop_assert_eq!(bytes.len(), VarInt(value).length());

        let mut reader = TxReader::new(&bytes);
        prop_assert_eq!(reader.read_varint().unwrap(), VarInt(value));
        prop_assert!(reader.is_empty());
    }

    #[test]
    fn integer_roundtrip(a in any::<u32>(), b in any::<u64>(), c in any::<i32>()) {
        let mut writer = TxWriter::new();
        writer.write_u32_le(a);
        writer.write_u64_le(b);
        writer.write_i32_le(c);

        let bytes = writer.into_bytes();
        let mut reader = TxReader::new(&bytes);
        prop_assert_eq!(reader.read_u32_le().unwrap(), a);
        prop_assert_eq!(reader.read_u64_le().unwrap(), b);
        prop_assert_eq!(reader.read_i32_le().unwrap(), c);
    }
}

proptest! {
    // Signing is comparatively slow; keep the case count down.
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn ecdsa_der_roundtrip(message in prop::collection::vec(any::<u8>(), 1..128)) {
        let key = PrivateKey::new();
        let hash = sha256(&message);
        let sig = Signature::sign(&hash, &key).unwrap();
        let parsed = Signature::from_der(&sig.to_der()).unwrap();
        prop_assert!(parsed.verify(&hash, &key.public_key()));
    }

    #[test]
    fn schnorr_roundtrip(message in prop::collection::vec(any::<u8>(), 1..128)) {
        let key = PrivateKey::new();
        let hash = sha256(&message);
        let sig = schnorr::sign(&hash, &key).unwrap();
        prop_assert!(schnorr::verify(&hash, &sig, &key.public_key()));
    }
}
