use quadcode::{by_name, Field};

fn main() {
    let name = std::env::args().nth(1).unwrap_or_else(|| "xor".to_string());
    let (w, h) = (320, 240);
    let data = (0..w * h)
        .map(|i| {
            let (x, y) = (i % w, i / w);
            (((x / 20) ^ (y / 15)) % 4) as u32
        })
        .collect();
    let image = Field::from_data(w, h, data).unwrap();
    let compressor = by_name(&name, &[]).unwrap();

    for _ in 0..20 {
        let bytes = compressor.encode(&image).unwrap();
        let decoded = compressor.decode(&bytes).unwrap();
        assert_eq!(decoded, image);
    }
}
