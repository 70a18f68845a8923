#![no_main]
use libfuzzer_sys::fuzz_target;
use quadcode::{fieldcode, FieldcodeConfig};

fuzz_target!(|data: &[u8]| {
    let config = FieldcodeConfig {
        symbols: 64,
        ..Default::default()
    };
    // Arbitrary bytes must fail cleanly or yield a field that re-encodes.
    if let Ok(field) = fieldcode::decode(data, &config) {
        assert!(field.data().iter().all(|&v| v < 4));
        let bytes = fieldcode::encode(&field, &config).unwrap();
        assert_eq!(fieldcode::decode(&bytes, &config).unwrap(), field);
    }
});
