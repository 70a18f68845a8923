#![no_main]
use libfuzzer_sys::fuzz_target;
use quadcode::ArithmeticCodec;

fuzz_target!(|data: (Vec<u8>, Vec<u8>)| {
    let (weights, input_bytes) = data;
    if weights.is_empty() {
        return;
    }

    // Byte weights, each at least 1.
    let probs: Vec<u64> = weights.iter().take(64).map(|&w| u64::from(w) + 1).collect();
    let input: Vec<u32> = input_bytes
        .iter()
        .map(|&b| u32::from(b) % probs.len() as u32)
        .collect();

    let codec = ArithmeticCodec::new(&probs).unwrap();
    let bytes = codec.encode(&input).unwrap();
    assert_eq!(codec.decode(&bytes).unwrap(), input);
});
