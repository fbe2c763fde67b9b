use rand::Rng;
use shared::Rgba;
use std::fmt::Write;

/// Random opaque color, each channel uniform in 0..=255
pub fn random_color() -> Rgba {
    let mut rng = rand::thread_rng();
    [rng.gen(), rng.gen(), rng.gen(), 255]
}

// 16 bytes per line: offset, hex, printable ASCII
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::new();
    for (line, chunk) in bytes.chunks(16).enumerate() {
        let _ = write!(out, "{:08x} ", line * 16);
        for i in 0..16 {
            match chunk.get(i) {
                Some(b) => {
                    let _ = write!(out, " {:02x}", b);
                }
                None => out.push_str("   "),
            }
        }
        out.push_str("  |");
        for &b in chunk {
            out.push(if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            });
        }
        out.push_str("|\n");
    }
    out
}
