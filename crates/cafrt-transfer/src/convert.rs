//! Numeric and character type/kind conversion (`spec.md` §4.D "Numeric
//! conversion").

use cafrt_core::CafError;
use cafrt_descriptor::{BaseType, TypeKind};

/// Converts one element from `src_bytes` (typed `src`) into `dst_bytes`
/// (typed `dst`), per the conversion table in `spec.md` §4.D:
/// - integer -> integer truncates in width;
/// - integer/real/complex convert using host C semantics;
/// - complex -> integer/real uses the real component only;
/// - character conversions pad on lengthening, replace unrepresentable
///   code points with `'?'` on narrowing;
/// - unsupported pairs (e.g. character <-> numeric) fail.
pub fn convert_element(
    src: TypeKind,
    src_bytes: &[u8],
    dst: TypeKind,
    dst_bytes: &mut [u8],
) -> Result<(), CafError> {
    use BaseType::*;
    match (src.base, dst.base) {
        (Character, Character) => convert_character(src, src_bytes, dst, dst_bytes),
        (Character, _) | (_, Character) => Err(CafError::InvalidType),
        (Derived, _) | (_, Derived) => Err(CafError::InvalidType),
        _ => convert_numeric(src, src_bytes, dst, dst_bytes),
    }
}

fn read_numeric(kind: TypeKind, bytes: &[u8]) -> Result<f64, CafError> {
    match kind.base {
        BaseType::Integer | BaseType::Logical => Ok(match kind.kind {
            1 => bytes[0] as i8 as f64,
            2 => i16::from_ne_bytes(bytes[..2].try_into().unwrap()) as f64,
            4 => i32::from_ne_bytes(bytes[..4].try_into().unwrap()) as f64,
            8 => i64::from_ne_bytes(bytes[..8].try_into().unwrap()) as f64,
            _ => return Err(CafError::InvalidElemLen),
        }),
        BaseType::Real => Ok(match kind.kind {
            4 => f32::from_ne_bytes(bytes[..4].try_into().unwrap()) as f64,
            8 => f64::from_ne_bytes(bytes[..8].try_into().unwrap()),
            _ => return Err(CafError::InvalidElemLen),
        }),
        // Complex-to-integer/real uses the real part only (`spec.md` §4.D);
        // the real component occupies the first half of the element.
        BaseType::Complex => {
            let half = kind.elem_len() / 2;
            read_numeric(TypeKind::new(BaseType::Real, half as i32), &bytes[..half])
        }
        _ => Err(CafError::InvalidType),
    }
}

fn write_numeric(kind: TypeKind, value: f64, bytes: &mut [u8]) -> Result<(), CafError> {
    match kind.base {
        BaseType::Integer | BaseType::Logical => {
            match kind.kind {
                1 => bytes[0] = value as i64 as i8 as u8,
                2 => bytes[..2].copy_from_slice(&(value as i64 as i16).to_ne_bytes()),
                4 => bytes[..4].copy_from_slice(&(value as i64 as i32).to_ne_bytes()),
                8 => bytes[..8].copy_from_slice(&(value as i64).to_ne_bytes()),
                _ => return Err(CafError::InvalidElemLen),
            }
            Ok(())
        }
        BaseType::Real => {
            match kind.kind {
                4 => bytes[..4].copy_from_slice(&(value as f32).to_ne_bytes()),
                8 => bytes[..8].copy_from_slice(&value.to_ne_bytes()),
                _ => return Err(CafError::InvalidElemLen),
            }
            Ok(())
        }
        BaseType::Complex => {
            let half = kind.elem_len() / 2;
            write_numeric(TypeKind::new(BaseType::Real, half as i32), value, &mut bytes[..half])?;
            bytes[half..2 * half].fill(0);
            Ok(())
        }
        _ => Err(CafError::InvalidType),
    }
}

fn convert_numeric(
    src: TypeKind,
    src_bytes: &[u8],
    dst: TypeKind,
    dst_bytes: &mut [u8],
) -> Result<(), CafError> {
    if src.base == dst.base && src.kind == dst.kind {
        dst_bytes[..src_bytes.len()].copy_from_slice(src_bytes);
        return Ok(());
    }
    let value = read_numeric(src, src_bytes)?;
    write_numeric(dst, value, dst_bytes)
}

/// Character conversion between 1-byte (`kind == 1`) and 4-byte
/// (`kind == 4`, UCS-4) character kinds. Lengthening pads with space
/// (U+0020); narrowing replaces non-ASCII code points with `'?'`.
fn convert_character(
    src: TypeKind,
    src_bytes: &[u8],
    dst: TypeKind,
    dst_bytes: &mut [u8],
) -> Result<(), CafError> {
    let src_chars: Vec<u32> = match src.kind {
        1 => src_bytes.iter().map(|&b| b as u32).collect(),
        4 => src_bytes
            .chunks_exact(4)
            .map(|c| u32::from_ne_bytes(c.try_into().unwrap()))
            .collect(),
        _ => return Err(CafError::InvalidElemLen),
    };
    let dst_len = match dst.kind {
        1 => dst_bytes.len(),
        4 => dst_bytes.len() / 4,
        _ => return Err(CafError::InvalidElemLen),
    };

    let mut out = Vec::with_capacity(dst_len);
    for i in 0..dst_len {
        out.push(*src_chars.get(i).unwrap_or(&0x20));
    }

    match dst.kind {
        1 => {
            for (i, &c) in out.iter().enumerate() {
                dst_bytes[i] = if c <= 0x7f { c as u8 } else { b'?' };
            }
        }
        4 => {
            for (i, &c) in out.iter().enumerate() {
                dst_bytes[i * 4..i * 4 + 4].copy_from_slice(&c.to_ne_bytes());
            }
        }
        _ => unreachable!(),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_truncates_in_width() {
        let src = TypeKind::new(BaseType::Integer, 8);
        let dst = TypeKind::new(BaseType::Integer, 4);
        let src_bytes = 0x1_0000_0042i64.to_ne_bytes();
        let mut dst_bytes = [0u8; 4];
        convert_element(src, &src_bytes, dst, &mut dst_bytes).unwrap();
        assert_eq!(i32::from_ne_bytes(dst_bytes), 0x42);
    }

    #[test]
    fn integer_to_real_uses_c_semantics() {
        let src = TypeKind::new(BaseType::Integer, 4);
        let dst = TypeKind::new(BaseType::Real, 8);
        let src_bytes = 3i32.to_ne_bytes();
        let mut dst_bytes = [0u8; 8];
        convert_element(src, &src_bytes, dst, &mut dst_bytes).unwrap();
        assert_eq!(f64::from_ne_bytes(dst_bytes), 3.0);
    }

    #[test]
    fn complex_to_integer_uses_real_part() {
        let src = TypeKind::new(BaseType::Complex, 8);
        let dst = TypeKind::new(BaseType::Integer, 4);
        let mut src_bytes = [0u8; 16];
        src_bytes[..8].copy_from_slice(&5.0f64.to_ne_bytes());
        src_bytes[8..].copy_from_slice(&99.0f64.to_ne_bytes());
        let mut dst_bytes = [0u8; 4];
        convert_element(src, &src_bytes, dst, &mut dst_bytes).unwrap();
        assert_eq!(i32::from_ne_bytes(dst_bytes), 5);
    }

    #[test]
    fn character_lengthening_pads_with_space() {
        let src = TypeKind::new(BaseType::Character, 1);
        let dst = TypeKind::new(BaseType::Character, 1);
        let src_bytes = b"ab";
        let mut dst_bytes = [0u8; 5];
        convert_character(src, src_bytes, dst, &mut dst_bytes).unwrap();
        assert_eq!(&dst_bytes, b"ab   ");
    }

    #[test]
    fn character_narrowing_kind4_to_kind1_replaces_non_ascii() {
        let src = TypeKind::new(BaseType::Character, 4);
        let dst = TypeKind::new(BaseType::Character, 1);
        let mut src_bytes = [0u8; 8];
        src_bytes[0..4].copy_from_slice(&('a' as u32).to_ne_bytes());
        src_bytes[4..8].copy_from_slice(&(0x4e2du32).to_ne_bytes()); // non-ASCII
        let mut dst_bytes = [0u8; 2];
        convert_character(src, &src_bytes, dst, &mut dst_bytes).unwrap();
        assert_eq!(&dst_bytes, b"a?");
    }

    #[test]
    fn character_numeric_pair_is_rejected() {
        let src = TypeKind::new(BaseType::Character, 1);
        let dst = TypeKind::new(BaseType::Integer, 4);
        let mut dst_bytes = [0u8; 4];
        assert!(convert_element(src, b"a", dst, &mut dst_bytes).is_err());
    }
}
