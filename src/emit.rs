use crate::kernel::Var;
use crate::types::{Kind, Type};

/// One of the four generated program texts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dialect {
    /// Vectorized LLVM IR with a deferred lane-width placeholder.
    VectorIr,
    /// One-lane LLVM IR driven by an explicit starting index.
    ScalarIr,
    Cuda,
    OpenCl,
}

impl Dialect {
    pub const ALL: [Dialect; 4] = [
        Dialect::VectorIr,
        Dialect::ScalarIr,
        Dialect::Cuda,
        Dialect::OpenCl,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Dialect::VectorIr => "llvm-vec",
            Dialect::ScalarIr => "llvm-sca",
            Dialect::Cuda => "cuda",
            Dialect::OpenCl => "opencl",
        }
    }

    /// Conventional file extension for the dialect's text.
    pub fn extension(self) -> &'static str {
        match self {
            Dialect::VectorIr | Dialect::ScalarIr => ".ll",
            Dialect::Cuda => ".cu",
            Dialect::OpenCl => ".cl",
        }
    }

    fn is_ir(self) -> bool {
        matches!(self, Dialect::VectorIr | Dialect::ScalarIr)
    }
}

/// Fixed-width marker standing in for the lane count in the vector IR.
/// Patched in place, so the replacement never changes the buffer length.
pub const LANE_MARKER: &str = "??????????";

/// A typed value consumed by an `emit` template directive.
#[derive(Clone, Copy, Debug)]
pub enum Arg<'a> {
    /// Verbatim string (directive `S`).
    S(&'a str),
    /// Decimal integer (directive `D`).
    D(i64),
    /// Variable reference (directive `V`): `%v<id>` in IR, `v<id>` in C.
    V(Var),
    /// Type, spelled per dialect (directive `T`).
    T(Type),
}

/// One builder step's fragments, one per dialect. Builders extend the
/// buffers through [`ProgramSet::step`] so a step cannot silently skip
/// a target; a dialect with no text for the step carries an empty
/// template.
pub(crate) struct Step<'a> {
    pub vec: (&'a str, &'a [Arg<'a>]),
    pub sca: (&'a str, &'a [Arg<'a>]),
    pub cuda: (&'a str, &'a [Arg<'a>]),
    pub opencl: (&'a str, &'a [Arg<'a>]),
}

/// The four in-progress program buffers plus the emission state shared
/// between them: one indentation level per dialect family and the
/// ordered byte offsets of every lane-width marker written so far.
///
/// The buffers only ever grow through [`ProgramSet::emit`] (and the
/// stride-marker helper), which keeps the recorded offsets valid.
#[derive(Debug, Default)]
pub struct ProgramSet {
    pub(crate) ir_vec: String,
    pub(crate) ir_sca: String,
    pub(crate) cuda: String,
    pub(crate) opencl: String,
    pub(crate) ir_indent: usize,
    pub(crate) c_indent: usize,
    lane_slots: Vec<usize>,
}

impl ProgramSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn text(&self, dialect: Dialect) -> &str {
        match dialect {
            Dialect::VectorIr => &self.ir_vec,
            Dialect::ScalarIr => &self.ir_sca,
            Dialect::Cuda => &self.cuda,
            Dialect::OpenCl => &self.opencl,
        }
    }

    /// Byte offsets of the recorded lane-width markers, in write order.
    pub(crate) fn lane_slots(&self) -> &[usize] {
        &self.lane_slots
    }

    /// Append a bare lane-width marker to the vector-IR buffer and
    /// record its offset (used for the loop-stride slot; type-directive
    /// markers are recorded by `emit` itself).
    pub(crate) fn push_lane_marker(&mut self) {
        self.lane_slots.push(self.ir_vec.len());
        self.ir_vec.push_str(LANE_MARKER);
    }

    /// Render one fragment per dialect.
    pub(crate) fn step(&mut self, s: Step) {
        self.emit(Dialect::VectorIr, s.vec.0, s.vec.1);
        self.emit(Dialect::ScalarIr, s.sca.0, s.sca.1);
        self.emit(Dialect::Cuda, s.cuda.0, s.cuda.1);
        self.emit(Dialect::OpenCl, s.opencl.0, s.opencl.1);
    }

    /// Render `template` into the buffer of `dialect`, consuming one
    /// argument per directive.
    ///
    /// Directives: `|` expands the family's current indentation, `S`
    /// a verbatim string, `D` a decimal integer, `V` a variable
    /// reference, `T` a type in the dialect's spelling, `\` escapes the
    /// next byte. Any other byte is copied verbatim. A directive
    /// without a matching argument is a caller bug and panics, as is
    /// an argument left unconsumed by the template.
    pub(crate) fn emit(&mut self, dialect: Dialect, template: &str, args: &[Arg]) {
        let indent = if dialect.is_ir() {
            self.ir_indent
        } else {
            self.c_indent
        };
        let (buf, mut slots) = match dialect {
            Dialect::VectorIr => (&mut self.ir_vec, Some(&mut self.lane_slots)),
            Dialect::ScalarIr => (&mut self.ir_sca, None),
            Dialect::Cuda => (&mut self.cuda, None),
            Dialect::OpenCl => (&mut self.opencl, None),
        };
        let mut args = args.iter();
        let mut next = |d: char| {
            args.next()
                .unwrap_or_else(|| panic!("emit: no argument for directive '{}'", d))
        };

        let mut chars = template.chars();
        while let Some(c) = chars.next() {
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        buf.push(escaped);
                    }
                }
                '|' => {
                    for _ in 0..indent {
                        buf.push(' ');
                    }
                }
                'S' => match next('S') {
                    Arg::S(s) => buf.push_str(s),
                    other => panic!("emit: directive 'S' got {:?}", other),
                },
                'D' => match next('D') {
                    Arg::D(d) => buf.push_str(&d.to_string()),
                    other => panic!("emit: directive 'D' got {:?}", other),
                },
                'V' => match next('V') {
                    Arg::V(var) => {
                        if dialect.is_ir() {
                            buf.push_str("%v");
                        } else {
                            buf.push('v');
                        }
                        buf.push_str(&var.index().to_string());
                    }
                    other => panic!("emit: directive 'V' got {:?}", other),
                },
                'T' => match next('T') {
                    Arg::T(ty) => match dialect {
                        Dialect::VectorIr => {
                            push_ir_vector_type(buf, slots.as_mut().map(|s| &mut **s), *ty);
                        }
                        Dialect::ScalarIr => push_ir_scalar_type(buf, *ty),
                        Dialect::Cuda | Dialect::OpenCl => push_c_type(buf, *ty),
                    },
                    other => panic!("emit: directive 'T' got {:?}", other),
                },
                other => buf.push(other),
            }
        }
        assert!(
            args.next().is_none(),
            "emit: leftover argument after template"
        );
    }
}

/// Base LLVM IR spelling of a type, without lane or pointer adornment.
fn push_ir_base(buf: &mut String, t: Type) {
    match t.kind {
        Kind::Signed | Kind::Unsigned => {
            buf.push('i');
            buf.push_str(&t.width.to_string());
        }
        Kind::Float => match t.width {
            16 => buf.push_str("half"),
            64 => buf.push_str("double"),
            _ => buf.push_str("float"),
        },
        Kind::Bfloat => buf.push_str("bfloat"),
    }
}

/// LLVM IR spelling in the scalar dialect: base type plus one `*` per
/// pointer level. Lane mode is ignored — the scalar dialect is exactly
/// one lane.
fn push_ir_scalar_type(buf: &mut String, t: Type) {
    push_ir_base(buf, t);
    for _ in 0..t.ptr_depth {
        buf.push('*');
    }
}

/// LLVM IR spelling in the vector dialect. Vector-lane types render as
/// `<?????????? x base>` with the marker offset recorded for deferred
/// patching; the offset points at the first marker byte.
fn push_ir_vector_type(buf: &mut String, slots: Option<&mut Vec<usize>>, t: Type) {
    if !t.is_vector() {
        push_ir_scalar_type(buf, t);
        return;
    }
    if let Some(slots) = slots {
        slots.push(buf.len() + 1);
    }
    buf.push('<');
    buf.push_str(LANE_MARKER);
    buf.push_str(" x ");
    push_ir_base(buf, t);
    buf.push('>');
    if t.ptr_depth > 0 {
        buf.push(' ');
        for _ in 0..t.ptr_depth {
            buf.push('*');
        }
    }
}

/// C spelling shared by the CUDA and OpenCL dialects. Width 1 is the C
/// boolean keyword; integer widths map to char/short/int/long.
fn push_c_type(buf: &mut String, t: Type) {
    if t.width == 1 {
        buf.push_str("bool");
    } else {
        match t.kind {
            Kind::Signed => buf.push_str("signed"),
            Kind::Unsigned => buf.push_str("unsigned"),
            Kind::Float => match t.width {
                16 => buf.push_str("half"),
                64 => buf.push_str("double"),
                _ => buf.push_str("float"),
            },
            Kind::Bfloat => buf.push_str("bfloat16"),
        }
        if t.is_integer() {
            buf.push(' ');
            match t.width {
                8 => buf.push_str("char"),
                16 => buf.push_str("short"),
                32 => buf.push_str("int"),
                _ => buf.push_str("long"),
            }
        }
    }
    for _ in 0..t.ptr_depth {
        buf.push('*');
    }
}

/// Overwrite every recorded marker with `lanes`, right-aligned in the
/// marker's fixed width. Valid only because the replacement has the
/// marker's exact length; offsets would go stale under any
/// variable-width substitution.
pub(crate) fn patch_lane_width(text: &mut String, slots: &[usize], lanes: u32) {
    let patch = format!("{:>width$}", lanes, width = LANE_MARKER.len());
    for &pos in slots {
        text.replace_range(pos..pos + LANE_MARKER.len(), &patch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    #[test]
    fn test_literal_indent_and_escape() {
        let mut p = ProgramSet::new();
        p.c_indent = 2;
        p.emit(Dialect::Cuda, "|x = 1;\n", &[]);
        assert_eq!(p.text(Dialect::Cuda), "  x = 1;\n");
        p.emit(Dialect::Cuda, "\\Some\\Text", &[]);
        assert!(p.text(Dialect::Cuda).ends_with("SomeText"));
    }

    #[test]
    fn test_string_and_decimal_directives() {
        let mut p = ProgramSet::new();
        p.emit(Dialect::ScalarIr, "S D", &[Arg::S("offset"), Arg::D(24)]);
        assert_eq!(p.text(Dialect::ScalarIr), "offset 24");
    }

    #[test]
    fn test_variable_rendering_per_family() {
        let mut p = ProgramSet::new();
        let v = Var::from_index(7);
        p.emit(Dialect::VectorIr, "V", &[Arg::V(v)]);
        p.emit(Dialect::ScalarIr, "V", &[Arg::V(v)]);
        p.emit(Dialect::Cuda, "V", &[Arg::V(v)]);
        p.emit(Dialect::OpenCl, "V", &[Arg::V(v)]);
        assert_eq!(p.text(Dialect::VectorIr), "%v7");
        assert_eq!(p.text(Dialect::ScalarIr), "%v7");
        assert_eq!(p.text(Dialect::Cuda), "v7");
        assert_eq!(p.text(Dialect::OpenCl), "v7");
    }

    #[test]
    fn test_ir_type_spelling() {
        let mut p = ProgramSet::new();
        p.emit(
            Dialect::ScalarIr,
            "T T T T",
            &[
                Arg::T(Type::i32()),
                Arg::T(Type::f64().ptr()),
                Arg::T(Type::f16()),
                Arg::T(Type::bf16()),
            ],
        );
        assert_eq!(p.text(Dialect::ScalarIr), "i32 double* half bfloat");
    }

    #[test]
    fn test_c_type_spelling() {
        let mut p = ProgramSet::new();
        p.emit(
            Dialect::Cuda,
            "T, T, T, T",
            &[
                Arg::T(Type::i8()),
                Arg::T(Type::u64().ptr()),
                Arg::T(Type::bool()),
                Arg::T(Type::f32().ptr()),
            ],
        );
        assert_eq!(
            p.text(Dialect::Cuda),
            "signed char, unsigned long*, bool, float*"
        );
    }

    #[test]
    fn test_vector_type_records_one_slot_per_render() {
        let mut p = ProgramSet::new();
        let vt = Type::f32().vector();
        p.emit(Dialect::VectorIr, "T", &[Arg::T(vt)]);
        p.emit(Dialect::VectorIr, " T", &[Arg::T(vt)]);
        assert_eq!(p.lane_slots().len(), 2);
        assert_eq!(
            p.text(Dialect::VectorIr),
            "<?????????? x float> <?????????? x float>"
        );
        // Offsets point at the first marker byte.
        for &pos in p.lane_slots() {
            assert_eq!(&p.text(Dialect::VectorIr)[pos..pos + 1], "?");
        }
    }

    #[test]
    fn test_vector_type_in_scalar_ir_is_plain() {
        let mut p = ProgramSet::new();
        let vt = Type::f32().vector();
        p.emit(Dialect::ScalarIr, "T", &[Arg::T(vt)]);
        assert_eq!(p.text(Dialect::ScalarIr), "float");
        assert!(p.lane_slots().is_empty());
    }

    #[test]
    fn test_vector_pointer_spelling() {
        let mut p = ProgramSet::new();
        let vt = Type::f32().vector().ptr();
        p.emit(Dialect::VectorIr, "T", &[Arg::T(vt)]);
        assert_eq!(p.text(Dialect::VectorIr), "<?????????? x float> *");
    }

    #[test]
    fn test_patch_lane_width_preserves_length() {
        let mut p = ProgramSet::new();
        let vt = Type::f32().vector();
        p.emit(Dialect::VectorIr, "load T, T", &[Arg::T(vt), Arg::T(vt)]);
        let mut text = p.text(Dialect::VectorIr).to_string();
        let before = text.len();
        patch_lane_width(&mut text, p.lane_slots(), 4);
        assert_eq!(text.len(), before);
        assert!(!text.contains('?'));
        assert_eq!(text, "load <         4 x float>, <         4 x float>");
    }

    #[test]
    fn test_stride_marker_is_recorded() {
        let mut p = ProgramSet::new();
        p.emit(Dialect::VectorIr, "add i64 %i, ", &[]);
        p.push_lane_marker();
        assert_eq!(p.lane_slots().len(), 1);
        let mut text = p.text(Dialect::VectorIr).to_string();
        patch_lane_width(&mut text, p.lane_slots(), 16);
        assert_eq!(text, "add i64 %i,         16");
    }

    #[test]
    #[should_panic(expected = "no argument")]
    fn test_missing_argument_panics() {
        let mut p = ProgramSet::new();
        p.emit(Dialect::Cuda, "V", &[]);
    }

    #[test]
    #[should_panic(expected = "leftover argument")]
    fn test_leftover_argument_panics() {
        let mut p = ProgramSet::new();
        p.emit(Dialect::Cuda, "x = 1;", &[Arg::D(1)]);
    }
}
