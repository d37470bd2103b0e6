use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lanegen::{BinOp, Kernel, Type};

fn build_vecadd() -> Kernel {
    let f32p = Type::f32().ptr();
    let mut k = Kernel::new("vecadd", &[f32p, f32p, f32p]);
    let out = k.arg(0).unwrap();
    let a = k.arg(1).unwrap();
    let b = k.arg(2).unwrap();
    let i = k.lane_index();
    let x = k.load(a, i).unwrap();
    let y = k.load(b, i).unwrap();
    let sum = k.binop(BinOp::Add, x, y).unwrap();
    k.store(out, i, sum).unwrap();
    k
}

fn bench_build(c: &mut Criterion) {
    c.bench_function("build_vecadd_all_dialects", |b| {
        b.iter(|| {
            let mut k = build_vecadd();
            black_box(k.llvm_ir_vector().len())
        })
    });

    c.bench_function("patch_vecadd_16_lanes", |b| {
        let mut k = build_vecadd();
        k.finish();
        b.iter(|| black_box(k.llvm_ir_vector_for(16)))
    });

    c.bench_function("fingerprint_vecadd", |b| {
        let mut k = build_vecadd();
        k.finish();
        b.iter(|| black_box(k.fingerprint()))
    });

    c.bench_function("build_chain_of_64_adds", |b| {
        b.iter(|| {
            let mut k = Kernel::new("chain", &[Type::f32().ptr()]);
            let p = k.arg(0).unwrap();
            let i = k.lane_index();
            let mut acc = k.load(p, i).unwrap();
            for _ in 0..64 {
                acc = k.binop(BinOp::Add, acc, acc).unwrap();
            }
            k.store(p, i, acc).unwrap();
            black_box(k.llvm_ir_vector().len())
        })
    });
}

criterion_group!(benches, bench_build);
criterion_main!(benches);
