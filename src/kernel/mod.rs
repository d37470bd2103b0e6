pub mod ops;
pub mod table;


use std::collections::{HashMap, HashSet};

use crate::emit::Arg::{D, S, T, V};
use crate::emit::{patch_lane_width, Dialect, ProgramSet, Step};
use crate::error::{self, Error, Result};
use crate::types::Type;

pub use table::Var;
use table::VarTable;

/// Session lifecycle. Builders are legal while `Open`; text accessors
/// close the session on first use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Open,
    Closed,
}

/// One in-progress-or-finished kernel description.
///
/// A session owns its variable table and the four program buffers; each
/// builder call extends all four in lockstep. Sessions are independent:
/// building several kernels on separate threads shares no state, but a
/// single session must not be shared across threads without locking.
#[derive(Debug)]
pub struct Kernel {
    name: String,
    program: ProgramSet,
    vars: VarTable,
    /// Address-holding variables created by `var`; dereferenced into a
    /// fresh value before use as an operand.
    materialized: HashSet<Var>,
    /// C-dialect expression text per value-holding variable, reused
    /// verbatim by later consumers.
    exprs: HashMap<Var, String>,
    args: Vec<Type>,
    arg_vars: Vec<Var>,
    lane_index: Var,
    state: State,
}

impl Kernel {
    /// Open a session: emit the four function prologues, allocate one
    /// value-holding variable per argument plus the lane-index
    /// variable.
    ///
    /// The scalar-IR dialect takes an explicit starting lane index
    /// (`%i`) and an `i8* %args` block it loads each argument from; the
    /// other three bind arguments as real parameters. Only the vector
    /// IR receives lane-width markers (loop stride plus every
    /// vector-lane type render).
    pub fn new(name: &str, args: &[Type]) -> Self {
        let mut k = Kernel {
            name: name.to_string(),
            program: ProgramSet::new(),
            vars: VarTable::new(),
            materialized: HashSet::new(),
            exprs: HashMap::new(),
            args: Vec::new(),
            arg_vars: Vec::new(),
            lane_index: Var::NONE,
            state: State::Open,
        };

        k.program.step(Step {
            vec: ("define void @S(i64 %size", &[S(name)]),
            sca: (
                "define void @S(i64 %i, i64 %size, i8* %args) {\n\n",
                &[S(name)],
            ),
            cuda: ("__kernel__ void S(int size", &[S(name)]),
            opencl: ("__kernel void S(int size", &[S(name)]),
        });
        k.program.ir_indent = 2;

        for (arg_i, &t) in args.iter().enumerate() {
            k.args.push(t);
            // Two scratch ids for the scalar-IR argument block, then
            // the argument variable itself.
            let slot_ptr = k.vars.allocate(Type::i8());
            let typed_ptr = k.vars.allocate(t);
            let nv = k.vars.allocate(t);
            k.exprs.insert(nv, format!("v{}", nv.index()));
            k.arg_vars.push(nv);

            k.program.step(Step {
                vec: (", T V", &[T(t), V(nv)]),
                sca: (
                    "|V = getelementptr inbounds i8, i8* %args, i64 D\n\
                     |V = bitcast i8* V to T*\n\
                     |V = load T, T* V\n\n",
                    &[
                        V(slot_ptr),
                        D(8 * arg_i as i64),
                        V(typed_ptr),
                        V(slot_ptr),
                        T(t),
                        V(nv),
                        T(t),
                        T(t),
                        V(typed_ptr),
                    ],
                ),
                cuda: (", T V", &[T(t), V(nv)]),
                opencl: (", __global T V", &[T(t), V(nv)]),
            });
        }

        let gid = k.vars.allocate(Type::i64());
        k.exprs.insert(gid, format!("v{}", gid.index()));
        k.lane_index = gid;

        k.program.emit(
            Dialect::VectorIr,
            ") {\n\n\
             \x20 %global_index_ptr = alloca i64\n\
             \x20 store i64 0, i64* %global_index_ptr\n\
             \x20 br label %for_cond\n\n\
             for_cond:\n\n\
             \x20 V = load i64, i64* %global_index_ptr\n\
             \x20 %ipn = add i64 V, ",
            &[V(gid), V(gid)],
        );
        k.program.push_lane_marker();
        k.program.emit(
            Dialect::VectorIr,
            "\n\
             \x20 %b = icmp sgt i64 %ipn, %size\n\
             \x20 br i1 %b, label %for_exit, label %for_body\n\n\
             for_body:\n\n",
            &[],
        );
        k.program.step(Step {
            vec: ("", &[]),
            sca: (
                "  %global_index_ptr = alloca i64\n\
                 \x20 store i64 %i, i64* %global_index_ptr\n\
                 \x20 br label %for_cond\n\n\
                 for_cond:\n\n\
                 \x20 V = load i64, i64* %global_index_ptr\n\
                 \x20 %b = icmp sge i64 V, %size\n\
                 \x20 br i1 %b, label %for_exit, label %for_body\n\n\
                 for_body:\n\n",
                &[V(gid), V(gid)],
            ),
            cuda: (
                ") {\n\n\
                 \x20 int V = (int)(block\\Dim.x * blockIdx.x + threadIdx.x);\n\
                 \x20 if (V >= size) {\n\
                 \x20   return;\n\
                 \x20 }\n\n",
                &[V(gid), V(gid)],
            ),
            opencl: (
                ") {\n\n\
                 \x20 int V = (int)get_global_id(0);\n\
                 \x20 if (V >= size) {\n\
                 \x20   return;\n\
                 \x20 }\n\n",
                &[V(gid), V(gid)],
            ),
        });
        k.program.ir_indent = 2;
        k.program.c_indent = 2;

        k
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of declared arguments.
    pub fn arg_count(&self) -> usize {
        self.arg_vars.len()
    }

    /// Number of variable ids allocated so far, scratch ids included.
    pub fn var_count(&self) -> usize {
        self.vars.len()
    }

    /// Variable id of argument `i`, in declaration order. Valid for the
    /// whole session lifetime, open or closed.
    pub fn arg(&self, i: usize) -> Result<Var> {
        error::track(
            self.arg_vars
                .get(i)
                .copied()
                .ok_or(Error::IndexOutOfRange {
                    index: i,
                    len: self.arg_vars.len(),
                }),
        )
    }

    /// The session's canonical lane-index variable. Indexing a load or
    /// store by exactly this variable is what triggers vectorization.
    pub fn lane_index(&self) -> Var {
        self.lane_index
    }

    /// Number of lane-width marker offsets recorded so far.
    pub fn lane_width_slots(&self) -> usize {
        self.program.lane_slots().len()
    }

    /// Close the session: emit the loop back-edge and the four function
    /// epilogues. Single-shot; calling it again (or reading text after
    /// it) appends nothing further.
    pub fn finish(&mut self) {
        if self.state == State::Closed {
            return;
        }
        self.state = State::Closed;
        self.program.ir_indent = 0;
        self.program.c_indent = 0;
        self.program.step(Step {
            vec: (
                "  store i64 %ipn, i64* %global_index_ptr\n\
                 \x20 br label %for_cond\n\n\
                 for_exit:\n\n\
                 \x20 ret void\n\n\
                 }\n",
                &[],
            ),
            sca: (
                "  %ip1 = add nsw i64 V, 1\n\
                 \x20 store i64 %ip1, i64* %global_index_ptr\n\
                 \x20 br label %for_cond\n\n\
                 for_exit:\n\n\
                 \x20 ret void\n\n\
                 }\n",
                &[V(self.lane_index)],
            ),
            cuda: ("}\n", &[]),
            opencl: ("}\n", &[]),
        });
    }

    /// Finished text of one dialect, closing the session on first use.
    pub fn text(&mut self, dialect: Dialect) -> &str {
        self.finish();
        self.program.text(dialect)
    }

    /// Vector LLVM IR with unresolved lane-width markers.
    pub fn llvm_ir_vector(&mut self) -> &str {
        self.text(Dialect::VectorIr)
    }

    /// One-lane LLVM IR (`%i` start index, `i8* %args` argument block).
    pub fn llvm_ir_scalar(&mut self) -> &str {
        self.text(Dialect::ScalarIr)
    }

    pub fn cuda(&mut self) -> &str {
        self.text(Dialect::Cuda)
    }

    pub fn opencl(&mut self) -> &str {
        self.text(Dialect::OpenCl)
    }

    /// Vector LLVM IR with every lane-width marker patched to `lanes`,
    /// as required before handing the text to a compiler.
    pub fn llvm_ir_vector_for(&mut self, lanes: u32) -> String {
        self.finish();
        let mut text = self.program.text(Dialect::VectorIr).to_string();
        patch_lane_width(&mut text, self.program.lane_slots(), lanes);
        text
    }

    /// Declared argument types, in order.
    pub fn arg_types(&self) -> &[Type] {
        &self.args
    }

    /// BLAKE3 content hash over the four finished texts. Stable for a
    /// given build sequence; adapters use it to key compiled-program
    /// caches.
    pub fn fingerprint(&mut self) -> String {
        self.finish();
        let mut hasher = blake3::Hasher::new();
        for dialect in Dialect::ALL {
            hasher.update(self.program.text(dialect).as_bytes());
            hasher.update(&[0]);
        }
        hasher.finalize().to_hex().to_string()
    }

    fn ensure_open(&self, what: &str) -> Result<()> {
        if self.state == State::Closed {
            return Err(Error::Usage(format!(
                "cannot {} on a closed kernel '{}'",
                what, self.name
            )));
        }
        Ok(())
    }

    /// C-dialect expression for a variable, `v<id>` when none was
    /// recorded.
    fn c_expr(&self, v: Var) -> String {
        self.exprs
            .get(&v)
            .cloned()
            .unwrap_or_else(|| format!("v{}", v.index()))
    }

    /// Replace a materialized operand by a fresh value-holding variable
    /// loaded from it. Value-holding operands pass through unchanged.
    /// The substitution lives only for the current builder call.
    fn deref_if_materialized(&mut self, v: Var) -> Result<Var> {
        if !self.materialized.contains(&v) {
            return Ok(v);
        }
        let t = self.vars.type_of(v)?;
        let nv = self.vars.allocate(t);
        self.program.step(Step {
            vec: ("|V = load T, T* V\n", &[V(nv), T(t), T(t), V(v)]),
            sca: ("|V = load T, T* V\n", &[V(nv), T(t), T(t), V(v)]),
            cuda: ("", &[]),
            opencl: ("", &[]),
        });
        Ok(nv)
    }
}
