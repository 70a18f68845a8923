use proptest::prelude::*;
use quadcode::freqs::{load_freqs, save_freqs, KIND_META, RUN_LENGTH_META};
use quadcode::{
    by_name, ArithmeticCodec, ArithmeticSectionsCodec, Error, Field, PredictorConfig,
    RunLength01MaxSmartCodec, RunLengthCodec, SymbolCodec,
};

fn field_strategy(max_side: usize) -> impl Strategy<Value = Field> {
    (0..max_side, 0..max_side).prop_flat_map(|(w, h)| {
        prop::collection::vec(0u32..4, w * h)
            .prop_map(move |data| Field::from_data(w, h, data).unwrap())
    })
}

/// Fields with large flat regions, closer to real 4-color images.
fn blocky_strategy(max_side: usize) -> impl Strategy<Value = Field> {
    (1..max_side, 1..max_side, 1usize..6).prop_flat_map(|(w, h, block)| {
        let cols = w.div_ceil(block);
        let rows = h.div_ceil(block);
        prop::collection::vec(0u32..4, cols * rows).prop_map(move |cells| {
            let data = (0..w * h)
                .map(|i| cells[(i / w / block) * cols + (i % w) / block])
                .collect();
            Field::from_data(w, h, data).unwrap()
        })
    })
}

fn predictor_configs() -> Vec<PredictorConfig> {
    vec![
        PredictorConfig::Null,
        PredictorConfig::HorzVert,
        PredictorConfig::Vert,
        PredictorConfig::MostFrequent { size: 4 },
        PredictorConfig::FixedSize {
            width: 5,
            height: 3,
            xpos: 2,
        },
        PredictorConfig::VariableSize {
            width: 5,
            height: 4,
            xpos: 2,
        },
        PredictorConfig::Hash {
            max_width: 7,
            max_height: 5,
        },
        PredictorConfig::Rolling,
    ]
}

#[test]
fn test_uniform_alphabet_roundtrip() {
    let codec = ArithmeticCodec::new(&[1, 1, 1]).unwrap();
    let bytes = codec.encode(&[0, 1, 2, 0, 1, 2]).unwrap();
    assert_eq!(codec.decode(&bytes).unwrap(), vec![0, 1, 2, 0, 1, 2]);
}

#[test]
fn test_empty_payload() {
    let codec = ArithmeticCodec::new(&[1, 1, 1]).unwrap();
    let bytes = codec.encode(&[]).unwrap();
    assert!(codec.decode(&bytes).unwrap().is_empty());

    let mut sections = ArithmeticSectionsCodec::new(&[4, 4], 3).unwrap();
    sections.write_section(&[]).unwrap();
    let bytes = sections.finish().unwrap();
    let mut reader = ArithmeticSectionsCodec::new(&[4, 4], 3).unwrap();
    reader.start_reading(bytes).unwrap();
    assert!(reader.read_section(0).unwrap().is_empty());
}

#[test]
fn test_zero_probability_is_rejected() {
    let codec = ArithmeticCodec::new(&[1, 0, 1]).unwrap();
    assert!(matches!(codec.encode(&[1]), Err(Error::ZeroProbability(1))));
}

#[test]
fn test_staged_run_length_vectors() {
    let codec = RunLengthCodec::new(4, 2, 2, &[0]).unwrap();
    let data = [0, 1, 2, 2, 2, 0, 0, 0, 0, 0, 0, 0];
    let encoded = codec.encode(&data).unwrap();
    assert_eq!(encoded, vec![0, 1, 2, 2, 2, 4, 1, 0]);
    assert_eq!(codec.decode(&encoded).unwrap(), data.to_vec());

    let codec = RunLengthCodec::new(5, 2, 3, &[0]).unwrap();
    let zeros = vec![0u32; 40];
    let encoded = codec.encode(&zeros).unwrap();
    assert_eq!(encoded, vec![4, 3, 5]);
    assert_eq!(codec.decode(&encoded).unwrap(), zeros);
}

#[test]
fn test_smart_escape_chain() {
    let codec = RunLength01MaxSmartCodec::new(5).unwrap();
    let zeros = vec![0u32; 40];
    let encoded = codec.encode(&zeros).unwrap();
    assert_eq!(encoded, vec![5, 5, 5, 1, 0]);
    assert_eq!(codec.decode(&encoded).unwrap(), zeros);
}

#[test]
fn test_every_compressor_on_blocky_image() {
    let data = (0..64 * 48)
        .map(|i| {
            let (x, y) = (i % 64, i / 64);
            (((x / 8) ^ (y / 6)) % 4) as u32
        })
        .collect();
    let field = Field::from_data(64, 48, data).unwrap();
    for name in ["xor", "diff", "hash"] {
        let compressor = by_name(name, &[]).unwrap();
        let bytes = compressor.encode(&field).unwrap();
        assert_eq!(compressor.decode(&bytes).unwrap(), field, "{}", name);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_arith_roundtrip(
        probs in prop::collection::vec(1u64..1000, 1..24),
        raw in prop::collection::vec(any::<u32>(), 0..300),
    ) {
        let data: Vec<u32> = raw.iter().map(|&s| s % probs.len() as u32).collect();
        let codec = ArithmeticCodec::new(&probs).unwrap();
        let bytes = codec.encode(&data).unwrap();
        prop_assert_eq!(codec.decode(&bytes).unwrap(), data);
    }

    #[test]
    fn prop_freqs_roundtrip(
        freqs in prop::collection::vec(0u64..100_000, 0..200),
        kind in any::<bool>(),
    ) {
        let meta: &[u64] = if kind { &KIND_META } else { &RUN_LENGTH_META };
        let (bytes, adjusted) = save_freqs(&freqs, meta).unwrap();
        let ceiling = meta.len() as u64 - 1;
        for (&f, &a) in freqs.iter().zip(&adjusted) {
            prop_assert!(a <= f && f - a < ceiling);
        }
        let loaded = load_freqs(&mut bytes.as_slice(), meta, freqs.len()).unwrap();
        prop_assert_eq!(loaded, adjusted);
    }

    #[test]
    fn prop_run_length_roundtrip(
        bits in prop::collection::vec(prop_oneof![4 => Just(0u32), 1 => Just(1u32)], 0..500),
        max_sym in 1u32..20,
    ) {
        let codec = RunLength01MaxSmartCodec::new(max_sym).unwrap();
        let encoded = codec.encode(&bits).unwrap();
        prop_assert!(encoded.iter().all(|&s| s <= max_sym));
        prop_assert_eq!(codec.decoded_len(&encoded).unwrap(), bits.len());
        prop_assert_eq!(codec.decode(&encoded).unwrap(), bits);
    }

    #[test]
    fn prop_run_length_uniform_runs(len in 0usize..300, one in any::<bool>(), max_sym in 1u32..10) {
        let bits = vec![u32::from(one); len];
        let codec = RunLength01MaxSmartCodec::new(max_sym).unwrap();
        prop_assert_eq!(codec.decode(&codec.encode(&bits).unwrap()).unwrap(), bits);
    }

    #[test]
    fn prop_predictor_determinism(field in blocky_strategy(24)) {
        for config in predictor_configs() {
            let mut a = field.clone();
            let mut b = field.clone();
            a.prediction(&mut config.build().unwrap()).unwrap();
            b.prediction(&mut config.build().unwrap()).unwrap();
            prop_assert_eq!(a, b);
        }
    }

    #[test]
    fn prop_xor_transform_invertible(field in field_strategy(20)) {
        for config in predictor_configs() {
            let mut t = field.clone();
            t.prediction_en_transform_xor(&mut config.build().unwrap()).unwrap();
            t.prediction_de_transform_xor(&mut config.build().unwrap()).unwrap();
            prop_assert_eq!(&t, &field, "{:?}", config);
        }
    }

    #[test]
    fn prop_diff_transform_invertible(field in blocky_strategy(20), modulus in 4u32..9) {
        let config = PredictorConfig::default();
        let mut t = field.clone();
        t.prediction_en_transform_diff(&mut config.build().unwrap(), modulus).unwrap();
        prop_assert!(t.data().iter().all(|&v| v < modulus));
        t.prediction_de_transform_diff(&mut config.build().unwrap(), modulus).unwrap();
        prop_assert_eq!(t, field);
    }

    #[test]
    fn prop_encode_only_compressors_are_deterministic(field in blocky_strategy(40)) {
        for name in ["pyramid", "blocks"] {
            let compressor = by_name(name, &[]).unwrap();
            let bytes = compressor.encode(&field).unwrap();
            prop_assert!(!bytes.is_empty());
            prop_assert_eq!(compressor.encode(&field).unwrap(), bytes);
            prop_assert!(matches!(compressor.decode(&[]), Err(Error::UnimplementedDecode(_))));
        }
    }

    #[test]
    fn prop_compressors_roundtrip(field in blocky_strategy(32), order in 0u32..4) {
        let order = order.to_string();
        for (name, args) in [("xor", vec![]), ("diff", vec![]), ("hash", vec![order.as_str(), "9", "9"])] {
            let compressor = by_name(name, &args).unwrap();
            let bytes = compressor.encode(&field).unwrap();
            prop_assert_eq!(compressor.decode(&bytes).unwrap(), field.clone());
        }
    }
}
