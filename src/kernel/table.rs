use crate::error::{Error, Result};
use crate::types::Type;

/// A kernel variable: a dense id unique within one session, never
/// reused, bound to exactly one type for its lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Var(i32);

impl Var {
    /// The reserved "no variable" sentinel. Must never be looked up.
    pub const NONE: Var = Var(-1);

    pub(crate) fn from_index(index: i32) -> Self {
        Var(index)
    }

    pub fn index(self) -> i32 {
        self.0
    }

    pub fn is_none(self) -> bool {
        self.0 < 0
    }
}

/// Per-session table mapping variable ids to their types, with a
/// monotonic fresh-id allocator starting at 0.
#[derive(Debug, Default)]
pub(crate) struct VarTable {
    types: Vec<Type>,
}

impl VarTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh id bound to `t`. Ids are strictly increasing;
    /// exhaustion is a fatal out-of-memory condition, not an error.
    pub(crate) fn allocate(&mut self, t: Type) -> Var {
        let id = self.types.len() as i32;
        self.types.push(t);
        Var(id)
    }

    pub(crate) fn type_of(&self, v: Var) -> Result<Type> {
        if v.is_none() {
            return Err(Error::IndexOutOfRange {
                index: v.0 as usize,
                len: self.types.len(),
            });
        }
        self.types
            .get(v.0 as usize)
            .copied()
            .ok_or(Error::IndexOutOfRange {
                index: v.0 as usize,
                len: self.types.len(),
            })
    }

    pub(crate) fn len(&self) -> usize {
        self.types.len()
    }
}
