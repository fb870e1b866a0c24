//! Metafields a record/union/enum can define to override the analyzer's
//! structural rules and the emitter's default lowering.

/// Overridable operations on a record/union/enum type. The analyzer
/// consults these before falling back to structural assignability or
/// arithmetic promotion; the emitter calls through to them when present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaField {
    Gc,
    Copy,
    Destroy,
    Convert,
    Index,
    Call,
    Eq,
    Lt,
    Le,
    Add,
    Sub,
    Mul,
    Div,
    IDiv,
    Mod,
    Pow,
    BAnd,
    BOr,
    BXor,
    Shl,
    Shr,
    UnaryMinus,
    BNot,
    Len,
    Concat,
}

impl MetaField {
    /// The `__name` used both in diagnostics and as a lookup key when the
    /// preprocessor mutates a type's metafields by name.
    pub fn name(self) -> &'static str {
        match self {
            MetaField::Gc => "__gc",
            MetaField::Copy => "__copy",
            MetaField::Destroy => "__destroy",
            MetaField::Convert => "__convert",
            MetaField::Index => "__index",
            MetaField::Call => "__call",
            MetaField::Eq => "__eq",
            MetaField::Lt => "__lt",
            MetaField::Le => "__le",
            MetaField::Add => "__add",
            MetaField::Sub => "__sub",
            MetaField::Mul => "__mul",
            MetaField::Div => "__div",
            MetaField::IDiv => "__idiv",
            MetaField::Mod => "__mod",
            MetaField::Pow => "__pow",
            MetaField::BAnd => "__band",
            MetaField::BOr => "__bor",
            MetaField::BXor => "__bxor",
            MetaField::Shl => "__shl",
            MetaField::Shr => "__shr",
            MetaField::UnaryMinus => "__unm",
            MetaField::BNot => "__bnot",
            MetaField::Len => "__len",
            MetaField::Concat => "__concat",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        use MetaField::*;
        Some(match name {
            "__gc" => Gc,
            "__copy" => Copy,
            "__destroy" => Destroy,
            "__convert" => Convert,
            "__index" => Index,
            "__call" => Call,
            "__eq" => Eq,
            "__lt" => Lt,
            "__le" => Le,
            "__add" => Add,
            "__sub" => Sub,
            "__mul" => Mul,
            "__div" => Div,
            "__idiv" => IDiv,
            "__mod" => Mod,
            "__pow" => Pow,
            "__band" => BAnd,
            "__bor" => BOr,
            "__bxor" => BXor,
            "__shl" => Shl,
            "__shr" => Shr,
            "__unm" => UnaryMinus,
            "__bnot" => BNot,
            "__len" => Len,
            "__concat" => Concat,
            _ => return None,
        })
    }
}
