use super::{Kernel, Var};
use crate::emit::Arg::{S, T, V};
use crate::emit::Step;
use crate::error::{self, Error, Result};
use crate::types::Type;

/// Binary operations on kernel values.
///
/// `Shr` is the logical shift, `Shra` the arithmetic one. `AndNot`
/// keeps a distinct spelling in the IR dialects and renders as plain
/// `&`/`&&` in the C dialects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    Shra,
    Xor,
    And,
    AndNot,
    Or,
}

impl Kernel {
    /// Declare a fresh materialized variable of type `t`: a stack slot
    /// in the IR dialects, a local declaration in the C dialects. The
    /// result holds an address and is dereferenced automatically when
    /// used as an operand.
    pub fn var(&mut self, t: Type) -> Result<Var> {
        error::track(self.var_op(t))
    }

    fn var_op(&mut self, t: Type) -> Result<Var> {
        self.ensure_open("declare a variable")?;
        let nv = self.vars.allocate(t);
        self.materialized.insert(nv);

        self.program.step(Step {
            vec: ("|V = alloca T\n\n", &[V(nv), T(t)]),
            sca: ("|V = alloca T\n\n", &[V(nv), T(t)]),
            cuda: ("|T V;\n", &[T(t), V(nv)]),
            opencl: ("|T V;\n", &[T(t), V(nv)]),
        });
        self.exprs.insert(nv, format!("v{}", nv.index()));

        Ok(nv)
    }

    /// Load an element through `ptr` at `offset`.
    ///
    /// `ptr` must be a pointer and `offset` an integer. The loaded
    /// value is promoted to the vector lane mode iff `offset` is
    /// literally the session's lane-index variable; when promotion
    /// changes the element type, a reinterpretation cast is inserted
    /// between the address computation and the load in the vector IR.
    pub fn load(&mut self, ptr: Var, offset: Var) -> Result<Var> {
        error::track(self.load_op(ptr, offset))
    }

    fn load_op(&mut self, ptr: Var, offset: Var) -> Result<Var> {
        self.ensure_open("load")?;
        let ptr_t = self.vars.type_of(ptr)?;
        if !ptr_t.is_pointer() {
            return Err(Error::TypeMismatch(format!(
                "load needs a pointer, got {}",
                ptr_t.display()
            )));
        }
        let offset_t = self.vars.type_of(offset)?;
        if !offset_t.is_integer() {
            return Err(Error::TypeMismatch(format!(
                "load offset must be an integer, got {}",
                offset_t.display()
            )));
        }
        let elem = ptr_t.pointee();
        let loaded = if offset == self.lane_index {
            elem.vector()
        } else {
            elem
        };

        let vptr = self.deref_if_materialized(ptr)?;
        let addr = self.vars.allocate(loaded);
        let voffset = self.deref_if_materialized(offset)?;
        let gep = "|V = getelementptr inbounds T, T* V, T V\n";
        self.program.step(Step {
            vec: (
                gep,
                &[V(addr), T(elem), T(elem), V(vptr), T(offset_t), V(voffset)],
            ),
            sca: (
                gep,
                &[V(addr), T(elem), T(elem), V(vptr), T(offset_t), V(voffset)],
            ),
            cuda: ("", &[]),
            opencl: ("", &[]),
        });
        let mut addr_cast = addr;
        if elem != loaded {
            addr_cast = self.vars.allocate(loaded);
            self.program.step(Step {
                vec: (
                    "|V = bitcast T* V to T*\n",
                    &[V(addr_cast), T(elem), V(addr), T(loaded)],
                ),
                sca: ("", &[]),
                cuda: ("", &[]),
                opencl: ("", &[]),
            });
        }
        let nv = self.vars.allocate(loaded);
        self.program.step(Step {
            vec: (
                "|V = load T, T* V\n\n",
                &[V(nv), T(loaded), T(loaded), V(addr_cast)],
            ),
            sca: ("|V = load T, T* V\n\n", &[V(nv), T(elem), T(elem), V(addr)]),
            cuda: ("", &[]),
            opencl: ("", &[]),
        });

        let expr = format!("{}[{}]", self.c_expr(ptr), self.c_expr(offset));
        self.exprs.insert(nv, expr);

        Ok(nv)
    }

    /// Store `value` through `ptr` at `offset`. Same vector-promotion
    /// rule as [`Kernel::load`]; `value` must match either the scalar
    /// or the vector-promoted element type.
    pub fn store(&mut self, ptr: Var, offset: Var, value: Var) -> Result<()> {
        error::track(self.store_op(ptr, offset, value))
    }

    fn store_op(&mut self, ptr: Var, offset: Var, value: Var) -> Result<()> {
        self.ensure_open("store")?;
        let ptr_t = self.vars.type_of(ptr)?;
        if !ptr_t.is_pointer() {
            return Err(Error::TypeMismatch(format!(
                "store needs a pointer, got {}",
                ptr_t.display()
            )));
        }
        let offset_t = self.vars.type_of(offset)?;
        if !offset_t.is_integer() {
            return Err(Error::TypeMismatch(format!(
                "store offset must be an integer, got {}",
                offset_t.display()
            )));
        }
        let elem = ptr_t.pointee();
        let promoted = if offset == self.lane_index {
            elem.vector()
        } else {
            elem
        };
        let value_t = self.vars.type_of(value)?;
        if value_t != elem && value_t != promoted {
            return Err(Error::TypeMismatch(format!(
                "store of {} into {} element",
                value_t.display(),
                elem.display()
            )));
        }

        let addr = self.vars.allocate(ptr_t);
        let vptr = self.deref_if_materialized(ptr)?;
        let voffset = self.deref_if_materialized(offset)?;
        let gep = "|V = getelementptr inbounds T, T* V, T V\n";
        self.program.step(Step {
            vec: (
                gep,
                &[V(addr), T(elem), T(elem), V(vptr), T(offset_t), V(voffset)],
            ),
            sca: (
                gep,
                &[V(addr), T(elem), T(elem), V(vptr), T(offset_t), V(voffset)],
            ),
            cuda: ("", &[]),
            opencl: ("", &[]),
        });
        let mut addr_cast = addr;
        if elem != promoted {
            addr_cast = self.vars.allocate(promoted);
            self.program.step(Step {
                vec: (
                    "|V = bitcast T* V to T*\n",
                    &[V(addr_cast), T(elem), V(addr), T(promoted)],
                ),
                sca: ("", &[]),
                cuda: ("", &[]),
                opencl: ("", &[]),
            });
        }
        let vv = self.deref_if_materialized(value)?;
        let (ptr_e, offset_e, value_e) =
            (self.c_expr(ptr), self.c_expr(offset), self.c_expr(value));
        self.program.step(Step {
            vec: (
                "|store T V, T* V\n\n",
                &[T(promoted), V(vv), T(promoted), V(addr_cast)],
            ),
            sca: ("|store T V, T* V\n\n", &[T(elem), V(vv), T(elem), V(addr)]),
            cuda: ("|S[S] = S;\n\n", &[S(&ptr_e), S(&offset_e), S(&value_e)]),
            opencl: ("|S[S] = S;\n\n", &[S(&ptr_e), S(&offset_e), S(&value_e)]),
        });

        Ok(())
    }

    /// Assign `src` to `dest`. Both must have equal types; `dest` is
    /// normally a materialized variable and receives a store.
    pub fn assign(&mut self, dest: Var, src: Var) -> Result<()> {
        error::track(self.assign_op(dest, src))
    }

    fn assign_op(&mut self, dest: Var, src: Var) -> Result<()> {
        self.ensure_open("assign")?;
        let t = self.vars.type_of(dest)?;
        let src_t = self.vars.type_of(src)?;
        if t != src_t {
            return Err(Error::TypeMismatch(format!(
                "assign of {} to {}",
                src_t.display(),
                t.display()
            )));
        }

        let vsrc = self.deref_if_materialized(src)?;
        let src_e = self.c_expr(src);
        self.program.step(Step {
            vec: ("|store T V, T* V\n\n", &[T(t), V(vsrc), T(t), V(dest)]),
            sca: ("|store T V, T* V\n\n", &[T(t), V(vsrc), T(t), V(dest)]),
            cuda: ("|V = S;\n", &[V(dest), S(&src_e)]),
            opencl: ("|V = S;\n", &[V(dest), S(&src_e)]),
        });

        Ok(())
    }

    /// Apply a binary operation to two operands and return a fresh
    /// variable holding the result (typed like the left operand).
    ///
    /// Type rules: add/sub/mul/div need identical types; rem and the
    /// bitwise ops additionally need an integer kind; shifts need two
    /// integers that may differ. Width-1 operands select the logical
    /// `&&`/`||` connectives in the C dialects only.
    pub fn binop(&mut self, op: BinOp, left: Var, right: Var) -> Result<Var> {
        error::track(self.binop_op(op, left, right))
    }

    fn binop_op(&mut self, op: BinOp, left: Var, right: Var) -> Result<Var> {
        self.ensure_open("apply a binary operation")?;
        let lt = self.vars.type_of(left)?;
        let rt = self.vars.type_of(right)?;

        match op {
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => {
                if lt != rt {
                    return Err(Error::TypeMismatch(format!(
                        "{} vs {}",
                        lt.display(),
                        rt.display()
                    )));
                }
            }
            BinOp::Rem | BinOp::Xor | BinOp::And | BinOp::AndNot | BinOp::Or => {
                if lt != rt || !lt.is_integer() {
                    return Err(Error::TypeMismatch(format!(
                        "{} vs {} (integer operands required)",
                        lt.display(),
                        rt.display()
                    )));
                }
            }
            BinOp::Shl | BinOp::Shr | BinOp::Shra => {
                if !lt.is_integer() || !rt.is_integer() {
                    return Err(Error::TypeMismatch(format!(
                        "shift of {} by {}",
                        lt.display(),
                        rt.display()
                    )));
                }
            }
        }

        let ir_op = match op {
            BinOp::Add => {
                if lt.is_integer() {
                    "add"
                } else {
                    "fadd"
                }
            }
            BinOp::Sub => {
                if lt.is_integer() {
                    "sub"
                } else {
                    "fsub"
                }
            }
            BinOp::Mul => {
                if lt.is_integer() {
                    "mul"
                } else {
                    "fmul"
                }
            }
            BinOp::Div => {
                if !lt.is_integer() {
                    "fdiv"
                } else if lt.is_signed() {
                    "sdiv"
                } else {
                    "udiv"
                }
            }
            BinOp::Rem => {
                if lt.is_signed() {
                    "srem"
                } else {
                    "urem"
                }
            }
            BinOp::Shl => "shl",
            BinOp::Shr => "lshr",
            BinOp::Shra => "ashr",
            BinOp::Xor => "xor",
            BinOp::And => "and",
            BinOp::AndNot => "andnot",
            BinOp::Or => "or",
        };
        let c_op = match op {
            BinOp::Add => " + ",
            BinOp::Sub => " - ",
            BinOp::Mul => " * ",
            BinOp::Div => " / ",
            BinOp::Rem => " % ",
            BinOp::Shl => " << ",
            BinOp::Shr | BinOp::Shra => " >> ",
            BinOp::Xor => " ^ ",
            BinOp::And | BinOp::AndNot => {
                if lt.is_boolean() {
                    " && "
                } else {
                    " & "
                }
            }
            BinOp::Or => {
                if lt.is_boolean() {
                    " || "
                } else {
                    " | "
                }
            }
        };

        let vl = self.deref_if_materialized(left)?;
        let vr = self.deref_if_materialized(right)?;
        let nv = self.vars.allocate(lt);
        let ir = "|V = S T V, V\n\n";
        self.program.step(Step {
            vec: (ir, &[V(nv), S(ir_op), T(lt), V(vl), V(vr)]),
            sca: (ir, &[V(nv), S(ir_op), T(lt), V(vl), V(vr)]),
            cuda: ("", &[]),
            opencl: ("", &[]),
        });

        let expr = format!("({}{}{})", self.c_expr(left), c_op, self.c_expr(right));
        self.exprs.insert(nv, expr);

        Ok(nv)
    }
}
