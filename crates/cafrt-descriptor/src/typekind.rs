/// The intrinsic type family, independent of width (`spec.md` §4.A).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BaseType {
    Integer,
    Logical,
    Real,
    Complex,
    Character,
    Derived,
}

/// `(base_type, byte_kind)` packed together, matching the CFI descriptor's
/// type tag (`spec.md` §4.A "Numeric semantics").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TypeKind {
    pub base: BaseType,
    pub kind: i32,
}

impl TypeKind {
    pub fn new(base: BaseType, kind: i32) -> Self {
        TypeKind { base, kind }
    }

    /// Element length in bytes derived from `(base_type, kind)`. Complex
    /// doubles the base width; a 10-byte real kind is rounded up to 64
    /// bytes, matching the host compiler's x87 extended-precision storage
    /// rule referenced in `spec.md` §4.A.
    pub fn elem_len(&self) -> usize {
        match self.base {
            BaseType::Complex => 2 * self.real_component_len(),
            BaseType::Real if self.kind == 10 => 64,
            _ => self.kind as usize,
        }
    }

    fn real_component_len(&self) -> usize {
        if self.kind == 10 {
            64
        } else {
            self.kind as usize
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complex_doubles_base_width() {
        let tk = TypeKind::new(BaseType::Complex, 8);
        assert_eq!(tk.elem_len(), 16);
    }

    #[test]
    fn extended_real_rounds_to_64() {
        let tk = TypeKind::new(BaseType::Real, 10);
        assert_eq!(tk.elem_len(), 64);
    }

    #[test]
    fn plain_integer_is_kind_width() {
        let tk = TypeKind::new(BaseType::Integer, 4);
        assert_eq!(tk.elem_len(), 4);
    }
}
