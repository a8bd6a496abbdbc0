//! Six-digit one-time codes, used for phone verification and delivery
//! confirmation. Always drawn from the OS RNG.

use password_hash::rand_core::OsRng;
use rand::Rng;

pub fn generate() -> String {
    let mut rng = OsRng;
    format!("{:06}", rng.gen_range(0..1_000_000u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn always_six_ascii_digits() {
        for _ in 0..64 {
            let code = generate();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
