//! Concrete object kinds. Each is a self-contained drawing routine behind the
//! [`Drawable`](crate::object::Drawable) contract.

pub mod bar_race;
pub mod character;
pub mod chart;
pub mod code_block;
pub mod particle_text;
pub mod text;

pub use bar_race::{BarChartRaceObject, RaceKeyframe};
pub use character::{CharacterAnimation, CharacterObject, Costume};
pub use chart::{ChartDatum, ChartObject, ChartStyle, ChartType};
pub use code_block::{CodeBlockObject, CodeTheme, Token, TokenKind};
pub use particle_text::{ParticleAnimation, ParticleTextObject};
pub use text::{TextBackground, TextObject, TextShadow};

/// Deterministic pseudo-random value in `[0, 1)` for `(index, salt)`.
///
/// Used wherever a drawing wants organic variation (scribble jitter,
/// particle scatter) without breaking time purity.
pub(crate) fn hash_unit(index: u64, salt: u64) -> f64 {
    let mut z = index
        .wrapping_mul(0x9E37_79B9_7F4A_7C15)
        .wrapping_add(salt.wrapping_mul(0xD1B5_4A32_D192_ED03));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^= z >> 31;
    (z >> 11) as f64 / (1u64 << 53) as f64
}

/// [`hash_unit`] mapped to `[-1, 1)`.
pub(crate) fn hash_signed(index: u64, salt: u64) -> f64 {
    hash_unit(index, salt) * 2.0 - 1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_unit_is_stable_and_bounded() {
        for i in 0..1000 {
            let v = hash_unit(i, 7);
            assert!((0.0..1.0).contains(&v));
            assert_eq!(v, hash_unit(i, 7));
        }
        assert_ne!(hash_unit(1, 0), hash_unit(1, 1));
    }
}
