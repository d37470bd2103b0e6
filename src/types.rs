/// Lane mode of a value: one element per call, or one element per lane.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Lane {
    Scalar,
    Vector,
}

/// Scalar kind of a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Signed,
    Unsigned,
    Float,
    Bfloat,
}

/// Shape of a kernel value: lane mode, scalar kind, bit width and
/// pointer depth. Width 1 denotes a boolean. Structural equality over
/// all four fields; immutable once built.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Type {
    pub lane: Lane,
    pub kind: Kind,
    /// Bit width: 1, 8, 16, 32 or 64.
    pub width: u32,
    /// 0 = value, n = pointer-to-…(n times)…-pointer.
    pub ptr_depth: u32,
}

impl Type {
    pub const fn new(lane: Lane, kind: Kind, width: u32) -> Self {
        Self {
            lane,
            kind,
            width,
            ptr_depth: 0,
        }
    }

    pub const fn bool() -> Self {
        Self::new(Lane::Scalar, Kind::Signed, 1)
    }

    pub const fn i8() -> Self {
        Self::new(Lane::Scalar, Kind::Signed, 8)
    }

    pub const fn i16() -> Self {
        Self::new(Lane::Scalar, Kind::Signed, 16)
    }

    pub const fn i32() -> Self {
        Self::new(Lane::Scalar, Kind::Signed, 32)
    }

    pub const fn i64() -> Self {
        Self::new(Lane::Scalar, Kind::Signed, 64)
    }

    pub const fn u8() -> Self {
        Self::new(Lane::Scalar, Kind::Unsigned, 8)
    }

    pub const fn u16() -> Self {
        Self::new(Lane::Scalar, Kind::Unsigned, 16)
    }

    pub const fn u32() -> Self {
        Self::new(Lane::Scalar, Kind::Unsigned, 32)
    }

    pub const fn u64() -> Self {
        Self::new(Lane::Scalar, Kind::Unsigned, 64)
    }

    pub const fn f16() -> Self {
        Self::new(Lane::Scalar, Kind::Float, 16)
    }

    pub const fn f32() -> Self {
        Self::new(Lane::Scalar, Kind::Float, 32)
    }

    pub const fn f64() -> Self {
        Self::new(Lane::Scalar, Kind::Float, 64)
    }

    pub const fn bf16() -> Self {
        Self::new(Lane::Scalar, Kind::Bfloat, 16)
    }

    /// Pointer to this type.
    pub const fn ptr(self) -> Self {
        Self {
            ptr_depth: self.ptr_depth + 1,
            ..self
        }
    }

    /// The pointed-to type (pointer depth reduced by one).
    pub const fn pointee(self) -> Self {
        Self {
            ptr_depth: self.ptr_depth.saturating_sub(1),
            ..self
        }
    }

    /// Same type with the vector lane mode.
    pub const fn vector(self) -> Self {
        Self {
            lane: Lane::Vector,
            ..self
        }
    }

    pub const fn is_pointer(self) -> bool {
        self.ptr_depth > 0
    }

    pub const fn is_integer(self) -> bool {
        matches!(self.kind, Kind::Signed | Kind::Unsigned)
    }

    pub const fn is_signed(self) -> bool {
        matches!(self.kind, Kind::Signed)
    }

    pub const fn is_boolean(self) -> bool {
        self.is_integer() && self.width == 1
    }

    pub const fn is_vector(self) -> bool {
        matches!(self.lane, Lane::Vector)
    }

    /// Human-readable spelling for error messages.
    pub fn display(&self) -> String {
        let base = match (self.kind, self.width) {
            (Kind::Signed, 1) | (Kind::Unsigned, 1) => "bool".to_string(),
            (Kind::Signed, w) => format!("i{}", w),
            (Kind::Unsigned, w) => format!("u{}", w),
            (Kind::Float, w) => format!("f{}", w),
            (Kind::Bfloat, _) => "bf16".to_string(),
        };
        let stars = "*".repeat(self.ptr_depth as usize);
        match self.lane {
            Lane::Scalar => format!("{}{}", base, stars),
            Lane::Vector => format!("<{}>{}", base, stars),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_equality() {
        assert_eq!(Type::f32(), Type::f32());
        assert_ne!(Type::f32(), Type::f64());
        assert_ne!(Type::i32(), Type::u32());
        assert_ne!(Type::f32(), Type::f32().ptr());
        assert_ne!(Type::f32(), Type::f32().vector());
    }

    #[test]
    fn test_pointer_round_trip() {
        let p = Type::f32().ptr();
        assert!(p.is_pointer());
        assert_eq!(p.ptr_depth, 1);
        assert_eq!(p.pointee(), Type::f32());
        assert_eq!(p.ptr().pointee(), p);
    }

    #[test]
    fn test_predicates() {
        assert!(Type::i8().is_integer());
        assert!(Type::u64().is_integer());
        assert!(!Type::f32().is_integer());
        assert!(Type::i32().is_signed());
        assert!(!Type::u32().is_signed());
        assert!(Type::bool().is_boolean());
        assert!(!Type::i8().is_boolean());
        assert!(Type::f32().vector().is_vector());
        assert!(!Type::f32().is_vector());
    }

    #[test]
    fn test_display() {
        assert_eq!(Type::f32().display(), "f32");
        assert_eq!(Type::f32().ptr().display(), "f32*");
        assert_eq!(Type::f32().vector().display(), "<f32>");
        assert_eq!(Type::bool().display(), "bool");
        assert_eq!(Type::i64().ptr().ptr().display(), "i64**");
    }
}
