use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use lanegen::{BinOp, Dialect, Kernel, Type};

#[derive(Parser)]
#[command(
    name = "lanegen",
    version,
    about = "Generate vectorized LLVM IR, CUDA and OpenCL from one kernel description"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Emit a sample kernel in one or all dialects
    Emit {
        /// Sample kernel name (vecadd, fma)
        kernel: String,
        /// Dialect to emit: llvm-vec, llvm-sca, cuda or opencl (default: all)
        #[arg(long)]
        dialect: Option<String>,
        /// Patch the vector IR for this lane count instead of leaving markers
        #[arg(long)]
        lanes: Option<u32>,
        /// Write one file per dialect into this directory instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the content fingerprint of a sample kernel
    Fingerprint {
        /// Sample kernel name (vecadd, fma)
        kernel: String,
    },
    /// List execution hardware visible to the compiled-in adapters
    Poll,
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Command::Emit {
            kernel,
            dialect,
            lanes,
            output,
        } => cmd_emit(&kernel, dialect.as_deref(), lanes, output),
        Command::Fingerprint { kernel } => cmd_fingerprint(&kernel),
        Command::Poll => cmd_poll(),
    }
}

// --- samples ---

/// `out[i] = a[i] + b[i]` over f32.
fn build_vecadd() -> lanegen::Result<Kernel> {
    let f32p = Type::f32().ptr();
    let mut k = Kernel::new("vecadd", &[f32p, f32p, f32p]);
    let out = k.arg(0)?;
    let a = k.arg(1)?;
    let b = k.arg(2)?;
    let i = k.lane_index();
    let x = k.load(a, i)?;
    let y = k.load(b, i)?;
    let sum = k.binop(BinOp::Add, x, y)?;
    k.store(out, i, sum)?;
    Ok(k)
}

/// `out[i] = a[i] * x[i] + y[i]` over f32.
fn build_fma() -> lanegen::Result<Kernel> {
    let f32p = Type::f32().ptr();
    let mut k = Kernel::new("fma", &[f32p, f32p, f32p, f32p]);
    let out = k.arg(0)?;
    let a = k.arg(1)?;
    let xs = k.arg(2)?;
    let ys = k.arg(3)?;
    let i = k.lane_index();
    let av = k.load(a, i)?;
    let xv = k.load(xs, i)?;
    let yv = k.load(ys, i)?;
    let ax = k.binop(BinOp::Mul, av, xv)?;
    let r = k.binop(BinOp::Add, ax, yv)?;
    k.store(out, i, r)?;
    Ok(k)
}

fn build_sample(name: &str) -> Kernel {
    let built = match name {
        "vecadd" => build_vecadd(),
        "fma" => build_fma(),
        _ => {
            eprintln!("error: unknown sample kernel '{}' (try vecadd or fma)", name);
            process::exit(1);
        }
    };
    match built {
        Ok(k) => k,
        Err(e) => {
            eprintln!("error: cannot build '{}': {}", name, e);
            process::exit(1);
        }
    }
}

// --- lanegen emit ---

fn parse_dialect(name: &str) -> Dialect {
    match Dialect::ALL.iter().find(|d| d.name() == name) {
        Some(&d) => d,
        None => {
            eprintln!(
                "error: unknown dialect '{}' (llvm-vec, llvm-sca, cuda, opencl)",
                name
            );
            process::exit(1);
        }
    }
}

fn cmd_emit(kernel: &str, dialect: Option<&str>, lanes: Option<u32>, output: Option<PathBuf>) {
    let mut k = build_sample(kernel);
    let dialects: Vec<Dialect> = match dialect {
        Some(name) => vec![parse_dialect(name)],
        None => Dialect::ALL.to_vec(),
    };

    for d in dialects {
        let text = match (d, lanes) {
            (Dialect::VectorIr, Some(n)) => k.llvm_ir_vector_for(n),
            _ => k.text(d).to_string(),
        };
        match output {
            Some(ref dir) => {
                let path = dir.join(format!("{}-{}{}", kernel, d.name(), d.extension()));
                if let Err(e) = std::fs::write(&path, &text) {
                    eprintln!("error: cannot write '{}': {}", path.display(), e);
                    process::exit(1);
                }
                eprintln!("Wrote {}", path.display());
            }
            None => {
                println!("; ---- {} ----", d.name());
                println!("{}", text);
            }
        }
    }
}

// --- lanegen fingerprint ---

fn cmd_fingerprint(kernel: &str) {
    let mut k = build_sample(kernel);
    println!("{}  {}", k.fingerprint(), k.name());
}

// --- lanegen poll ---

fn cmd_poll() {
    let adapters = lanegen::backend::adapters();
    if adapters.is_empty() {
        eprintln!("No execution adapters compiled in.");
        return;
    }
    for adapter in &adapters {
        match adapter.poll() {
            Ok(devices) => {
                for hw in devices {
                    println!("{}: {} ({})", adapter.name(), hw.name, hw.description);
                }
            }
            Err(e) => {
                eprintln!("{}: poll failed: {}", adapter.name(), e);
            }
        }
    }
}
