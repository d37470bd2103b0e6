//! Execution-adapter surface.
//!
//! The code generator itself never talks to a driver; adapters that do
//! (a CUDA runtime wrapper, an OpenCL loader, a JIT over the scalar IR)
//! implement [`Accelerator`] and consume the finished dialect texts.
//! This module owns the pieces every adapter shares: the hardware
//! descriptor, device pointers, and the argument-block layout the
//! generated functions expect.

use crate::emit::Dialect;
use crate::error::{self, Error, Result};
use crate::kernel::Kernel;
use crate::types::Type;

/// Class of execution hardware an adapter drives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HardwareKind {
    Cpu,
    CudaDevice,
    OpenClDevice,
}

/// Adapter-private device identity, tagged by driver family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HardwareHandle {
    Cpu,
    /// CUDA device ordinal.
    Cuda(i32),
    /// OpenCL platform and device indices.
    OpenCl { platform: u32, device: u32 },
}

/// One pollable execution device.
#[derive(Clone, Debug)]
pub struct Hardware {
    pub name: String,
    pub description: String,
    pub kind: HardwareKind,
    pub handle: HardwareHandle,
}

/// An allocation owned by a device. Opaque to the caller; only the
/// adapter that produced it can interpret the raw value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DevicePtr(u64);

impl DevicePtr {
    pub fn from_raw(raw: u64) -> Self {
        DevicePtr(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// One kernel launch argument.
///
/// Scalars carry their bit pattern at the declared width; pointer
/// arguments carry a device allocation. Every variant occupies one
/// 8-byte slot in the marshaled block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KernelArg {
    Scalar8(u8),
    Scalar16(u16),
    Scalar32(u32),
    Scalar64(u64),
    Device(DevicePtr),
}

impl KernelArg {
    pub fn from_f32(x: f32) -> Self {
        KernelArg::Scalar32(bytemuck::cast(x))
    }

    pub fn from_f64(x: f64) -> Self {
        KernelArg::Scalar64(bytemuck::cast(x))
    }

    pub fn from_i32(x: i32) -> Self {
        KernelArg::Scalar32(bytemuck::cast(x))
    }

    pub fn from_i64(x: i64) -> Self {
        KernelArg::Scalar64(bytemuck::cast(x))
    }

    fn width(self) -> u32 {
        match self {
            KernelArg::Scalar8(_) => 8,
            KernelArg::Scalar16(_) => 16,
            KernelArg::Scalar32(_) => 32,
            KernelArg::Scalar64(_) => 64,
            KernelArg::Device(_) => 64,
        }
    }

    fn slot(self) -> u64 {
        match self {
            KernelArg::Scalar8(x) => x as u64,
            KernelArg::Scalar16(x) => x as u64,
            KernelArg::Scalar32(x) => x as u64,
            KernelArg::Scalar64(x) => x,
            KernelArg::Device(p) => p.raw(),
        }
    }
}

/// Check `args` against the kernel's declared signature and pack them
/// into the block the scalar-IR entry point loads from: one
/// little-endian 8-byte slot per argument, in declaration order.
pub fn marshal_args(kernel: &Kernel, args: &[KernelArg]) -> Result<Vec<u8>> {
    error::track(marshal(kernel.arg_types(), args))
}

fn marshal(types: &[Type], args: &[KernelArg]) -> Result<Vec<u8>> {
    if types.len() != args.len() {
        return Err(Error::Usage(format!(
            "kernel takes {} arguments, {} supplied",
            types.len(),
            args.len()
        )));
    }
    let mut block = Vec::with_capacity(8 * args.len());
    for (i, (&t, &arg)) in types.iter().zip(args).enumerate() {
        match (t.is_pointer(), arg) {
            (true, KernelArg::Device(_)) => {}
            (true, _) => {
                return Err(Error::TypeMismatch(format!(
                    "argument {} is {}, got a scalar",
                    i,
                    t.display()
                )));
            }
            (false, KernelArg::Device(_)) => {
                return Err(Error::TypeMismatch(format!(
                    "argument {} is {}, got a device pointer",
                    i,
                    t.display()
                )));
            }
            (false, scalar) => {
                // Booleans travel in an 8-bit slot.
                let want = t.width.max(8);
                if scalar.width() != want {
                    return Err(Error::TypeMismatch(format!(
                        "argument {} is {} ({} bits), got {} bits",
                        i,
                        t.display(),
                        want,
                        scalar.width()
                    )));
                }
            }
        }
        block.extend_from_slice(&arg.slot().to_le_bytes());
    }
    Ok(block)
}

/// A driver adapter: compiles one dialect's text and runs it on the
/// hardware it polled.
///
/// `run` launches `size` logical lanes; `args` must satisfy the
/// kernel's signature (adapters marshal through [`marshal_args`]).
/// Implementations report driver diagnostics through
/// [`Error::Backend`].
pub trait Accelerator {
    fn name(&self) -> &str;

    /// The dialect this adapter consumes.
    fn dialect(&self) -> Dialect;

    /// Enumerate the devices this adapter can drive right now.
    fn poll(&self) -> Result<Vec<Hardware>>;

    fn device_malloc(&self, hw: &Hardware, bytes: usize) -> Result<DevicePtr>;

    fn device_free(&self, hw: &Hardware, ptr: DevicePtr) -> Result<()>;

    fn copy_to_device(&self, hw: &Hardware, dst: DevicePtr, src: &[u8]) -> Result<()>;

    fn copy_to_host(&self, hw: &Hardware, dst: &mut [u8], src: DevicePtr) -> Result<()>;

    /// Compile the kernel (or fetch it from a fingerprint-keyed cache)
    /// and run it over `size` lanes.
    fn run(
        &self,
        hw: &Hardware,
        kernel: &mut Kernel,
        size: i64,
        args: &[KernelArg],
    ) -> Result<()>;
}

/// The adapters compiled into this build. Driver-specific crates hook
/// in here; a plain build of the generator ships none.
pub fn adapters() -> Vec<Box<dyn Accelerator>> {
    Vec::new()
}

/// Poll every adapter and return the first device of `kind`, with the
/// adapter that owns it.
pub fn find_first(
    adapters: &[Box<dyn Accelerator>],
    kind: HardwareKind,
) -> Result<(usize, Hardware)> {
    error::track(find(adapters, kind))
}

fn find(adapters: &[Box<dyn Accelerator>], kind: HardwareKind) -> Result<(usize, Hardware)> {
    for (i, adapter) in adapters.iter().enumerate() {
        for hw in adapter.poll()? {
            if hw.kind == kind {
                return Ok((i, hw));
            }
        }
    }
    Err(Error::ResourceUnavailable(format!(
        "no {:?} hardware found across {} adapter(s)",
        kind,
        adapters.len()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::Type;

    fn saxpy_kernel() -> Kernel {
        Kernel::new(
            "saxpy",
            &[Type::f32(), Type::f32().ptr(), Type::f32().ptr()],
        )
    }

    #[test]
    fn test_marshal_layout() {
        let k = saxpy_kernel();
        let block = marshal_args(
            &k,
            &[
                KernelArg::from_f32(2.0),
                KernelArg::Device(DevicePtr::from_raw(0x1000)),
                KernelArg::Device(DevicePtr::from_raw(0x2000)),
            ],
        )
        .unwrap();
        assert_eq!(block.len(), 24);
        assert_eq!(&block[0..8], &(2.0f32.to_bits() as u64).to_le_bytes());
        assert_eq!(&block[8..16], &0x1000u64.to_le_bytes());
        assert_eq!(&block[16..24], &0x2000u64.to_le_bytes());
    }

    #[test]
    fn test_marshal_rejects_wrong_count() {
        let k = saxpy_kernel();
        let err = marshal_args(&k, &[KernelArg::from_f32(2.0)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert!(err.to_string().contains("3 arguments"));
    }

    #[test]
    fn test_marshal_rejects_scalar_for_pointer() {
        let k = saxpy_kernel();
        let err = marshal_args(
            &k,
            &[
                KernelArg::from_f32(2.0),
                KernelArg::from_f32(1.0),
                KernelArg::Device(DevicePtr::from_raw(0)),
            ],
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert!(err.to_string().contains("argument 1"));
    }

    #[test]
    fn test_marshal_rejects_pointer_for_scalar() {
        let k = saxpy_kernel();
        let err = marshal_args(
            &k,
            &[
                KernelArg::Device(DevicePtr::from_raw(8)),
                KernelArg::Device(DevicePtr::from_raw(16)),
                KernelArg::Device(DevicePtr::from_raw(24)),
            ],
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert!(err.to_string().contains("device pointer"));
    }

    #[test]
    fn test_marshal_rejects_width_mismatch() {
        let k = saxpy_kernel();
        let err = marshal_args(
            &k,
            &[
                KernelArg::from_f64(2.0),
                KernelArg::Device(DevicePtr::from_raw(8)),
                KernelArg::Device(DevicePtr::from_raw(16)),
            ],
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert!(err.to_string().contains("32 bits"));
    }

    #[test]
    fn test_marshal_boolean_in_byte_slot() {
        let k = Kernel::new("mask", &[Type::bool()]);
        let block = marshal_args(&k, &[KernelArg::Scalar8(1)]).unwrap();
        assert_eq!(block, vec![1, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_find_first_with_no_adapters() {
        let adapters: Vec<Box<dyn Accelerator>> = Vec::new();
        let err = find_first(&adapters, HardwareKind::CudaDevice).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceUnavailable);
        assert_eq!(crate::error::last_error(), ErrorKind::ResourceUnavailable);
    }

    struct FakeAdapter;

    impl Accelerator for FakeAdapter {
        fn name(&self) -> &str {
            "fake"
        }

        fn dialect(&self) -> Dialect {
            Dialect::OpenCl
        }

        fn poll(&self) -> Result<Vec<Hardware>> {
            Ok(vec![Hardware {
                name: "Fake Device".to_string(),
                description: "test-only adapter".to_string(),
                kind: HardwareKind::OpenClDevice,
                handle: HardwareHandle::OpenCl {
                    platform: 0,
                    device: 0,
                },
            }])
        }

        fn device_malloc(&self, _hw: &Hardware, _bytes: usize) -> Result<DevicePtr> {
            Ok(DevicePtr::from_raw(0xdead))
        }

        fn device_free(&self, _hw: &Hardware, _ptr: DevicePtr) -> Result<()> {
            Ok(())
        }

        fn copy_to_device(&self, _hw: &Hardware, _dst: DevicePtr, _src: &[u8]) -> Result<()> {
            Ok(())
        }

        fn copy_to_host(&self, _hw: &Hardware, _dst: &mut [u8], _src: DevicePtr) -> Result<()> {
            Ok(())
        }

        fn run(
            &self,
            _hw: &Hardware,
            kernel: &mut Kernel,
            _size: i64,
            args: &[KernelArg],
        ) -> Result<()> {
            marshal_args(kernel, args)?;
            Ok(())
        }
    }

    #[test]
    fn test_find_first_matches_kind() {
        let adapters: Vec<Box<dyn Accelerator>> = vec![Box::new(FakeAdapter)];
        let (idx, hw) = find_first(&adapters, HardwareKind::OpenClDevice).unwrap();
        assert_eq!(idx, 0);
        assert_eq!(hw.name, "Fake Device");
        assert!(find_first(&adapters, HardwareKind::CudaDevice).is_err());
    }
}
