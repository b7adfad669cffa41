//! Runner lifecycle FFI: create, forward, num_outputs, destroy.
//!
//! A runner owns a parsed program and the name of the method it runs.
//! Every forward call is one complete load cycle with its own arena and
//! planned buffers, so the global `RUNNERS` lock is held only for the
//! handle lookup and concurrent forwards on one runner are independent.

use std::ffi::{c_char, CStr};
use std::sync::{Arc, Mutex};

use kiln_core::ScalarType;
use kiln_program::{FileDataLoader, Program};
use kiln_runtime::{run_forward, runtime_init, OwnedValue, RuntimeConfig};
use tracing::{info, warn};

use crate::handle::HandleTable;
use crate::status::KilnStatus;

struct Runner {
    program: Program,
    method: String,
    config: RuntimeConfig,
}

static RUNNERS: Mutex<HandleTable<Arc<Runner>>> = Mutex::new(HandleTable::new());

/// Returns `None` if the handle is stale or the table lock is poisoned.
fn get_runner(handle: u64) -> Option<Arc<Runner>> {
    RUNNERS.lock().ok()?.get(handle).cloned()
}

/// Every output as `f32`, in output order. Tensors contribute all their
/// elements, scalars one element each, `None` nothing.
fn flatten(outputs: &[OwnedValue]) -> Vec<f32> {
    let mut flat = Vec::new();
    for value in outputs {
        match value {
            OwnedValue::None => {}
            OwnedValue::Int(v) => flat.push(*v as f32),
            OwnedValue::Double(v) => flat.push(*v as f32),
            OwnedValue::Bool(v) => flat.push(if *v { 1.0 } else { 0.0 }),
            OwnedValue::Tensor(t) => {
                let view = t.view();
                match t.scalar_type {
                    ScalarType::Float32 => flat.extend(view.to_f32_vec()),
                    ScalarType::Int32 => flat.extend(
                        (0..view.numel()).map(|i| view.i32_at(i).unwrap_or_default() as f32),
                    ),
                }
            }
        }
    }
    flat
}

/// Load the program at `path` and create a runner for its first method.
///
/// `method_arena_bytes` sizes the metadata arena of every load cycle; zero
/// selects the default (4 MiB). On success writes the runner handle to
/// `handle_out`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn kiln_runner_create(
    path: *const c_char,
    method_arena_bytes: usize,
    handle_out: *mut u64,
) -> i32 {
    ffi_guard!({
        if path.is_null() || handle_out.is_null() {
            return KilnStatus::InvalidArgument as i32;
        }
        // SAFETY: path is a valid NUL-terminated string per caller contract.
        let path = match unsafe { CStr::from_ptr(path) }.to_str() {
            Ok(p) => p,
            Err(_) => return KilnStatus::InvalidArgument as i32,
        };

        runtime_init();
        let program = match FileDataLoader::from(path).and_then(|l| Program::load(&l)) {
            Ok(p) => p,
            Err(e) => {
                warn!(path, error = %e, "runner program failed to load");
                return KilnStatus::from(&e) as i32;
            }
        };
        let method = match program.get_method_name(0) {
            Ok(name) => name.to_owned(),
            Err(_) => return KilnStatus::MethodNotFound as i32,
        };

        let mut config = RuntimeConfig::default();
        if method_arena_bytes > 0 {
            config.method_arena_bytes = method_arena_bytes;
        }
        info!(path, method = %method, arena_bytes = config.method_arena_bytes, "runner created");

        let handle = ffi_lock!(RUNNERS).insert(Arc::new(Runner {
            program,
            method,
            config,
        }));
        // SAFETY: handle_out is valid per caller contract.
        unsafe { *handle_out = handle };
        KilnStatus::Ok as i32
    })
}

/// Run one forward pass with every tensor input set to ones.
///
/// Writes the flattened outputs (see the crate docs) to `out`, which holds
/// `out_cap` floats and may be null when `out_cap` is zero. `n_out` always
/// receives the number of floats the outputs need; if that exceeds
/// `out_cap`, nothing is written to `out` and `BufferTooSmall` is returned.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn kiln_runner_forward(
    handle: u64,
    out: *mut f32,
    out_cap: usize,
    n_out: *mut usize,
) -> i32 {
    ffi_guard!({
        if n_out.is_null() || (out.is_null() && out_cap > 0) {
            return KilnStatus::InvalidArgument as i32;
        }
        let runner = match get_runner(handle) {
            Some(r) => r,
            None => return KilnStatus::InvalidHandle as i32,
        };

        let result = match run_forward(&runner.program, &runner.method, &runner.config) {
            Ok(r) => r,
            Err(e) => {
                warn!(method = %runner.method, error = %e, "forward failed");
                return KilnStatus::from(&e) as i32;
            }
        };
        let flat = flatten(&result.outputs);

        // SAFETY: n_out is valid per caller contract.
        unsafe { *n_out = flat.len() };
        if flat.len() > out_cap {
            return KilnStatus::BufferTooSmall as i32;
        }
        if !flat.is_empty() {
            // SAFETY: out points to at least out_cap >= flat.len() floats.
            let dst = unsafe { std::slice::from_raw_parts_mut(out, flat.len()) };
            dst.copy_from_slice(&flat);
        }
        KilnStatus::Ok as i32
    })
}

/// Number of outputs the runner's method declares.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn kiln_runner_num_outputs(handle: u64, n_outputs_out: *mut usize) -> i32 {
    ffi_guard!({
        if n_outputs_out.is_null() {
            return KilnStatus::InvalidArgument as i32;
        }
        let runner = match get_runner(handle) {
            Some(r) => r,
            None => return KilnStatus::InvalidHandle as i32,
        };
        let n = match runner.program.method_meta(&runner.method) {
            Ok(meta) => meta.num_outputs(),
            Err(e) => return KilnStatus::from(&e) as i32,
        };
        // SAFETY: n_outputs_out is valid per caller contract.
        unsafe { *n_outputs_out = n };
        KilnStatus::Ok as i32
    })
}

/// Destroy a runner. Forward calls already in flight finish normally.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn kiln_runner_destroy(handle: u64) -> i32 {
    ffi_guard!({
        match ffi_lock!(RUNNERS).remove(handle) {
            Some(_) => KilnStatus::Ok as i32,
            None => KilnStatus::InvalidHandle as i32,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;
    use std::path::Path;

    use kiln_test_utils::fixtures::MLP_IN;
    use kiln_test_utils::{
        add_relu_program, mixed_outputs_program, mlp_program, mlp_reference, write_temp_program,
    };

    fn create(path: &Path, arena: usize) -> Result<u64, i32> {
        let c = CString::new(path.to_str().unwrap()).unwrap();
        let mut h = 0u64;
        match kiln_runner_create(c.as_ptr(), arena, &mut h) {
            0 => Ok(h),
            status => Err(status),
        }
    }

    #[test]
    fn create_forward_destroy() {
        let path = write_temp_program("ffi-mlp", &mlp_program());
        let h = create(&path, 0).unwrap();

        let mut n = 0usize;
        assert_eq!(kiln_runner_num_outputs(h, &mut n), KilnStatus::Ok as i32);
        assert_eq!(n, 1);

        let mut out = [0f32; 8];
        let mut written = 0usize;
        let status = kiln_runner_forward(h, out.as_mut_ptr(), out.len(), &mut written);
        assert_eq!(status, KilnStatus::Ok as i32);

        let want = mlp_reference(&[1.0; MLP_IN]);
        assert_eq!(written, want.len());
        for (g, w) in out[..written].iter().zip(&want) {
            assert!((g - w).abs() < 1e-5);
        }

        assert_eq!(kiln_runner_destroy(h), KilnStatus::Ok as i32);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn short_buffer_reports_needed_length() {
        let path = write_temp_program("ffi-short", &add_relu_program());
        let h = create(&path, 0).unwrap();

        let mut n = 0usize;
        let status = kiln_runner_forward(h, std::ptr::null_mut(), 0, &mut n);
        assert_eq!(status, KilnStatus::BufferTooSmall as i32);
        assert_eq!(n, 4);

        let mut out = [0f32; 4];
        assert_eq!(
            kiln_runner_forward(h, out.as_mut_ptr(), out.len(), &mut n),
            KilnStatus::Ok as i32
        );
        assert_eq!(out, [2.0; 4]);

        kiln_runner_destroy(h);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn scalar_outputs_are_flattened() {
        let path = write_temp_program("ffi-mixed", &mixed_outputs_program());
        let h = create(&path, 0).unwrap();

        let mut out = [0f32; 8];
        let mut n = 0usize;
        assert_eq!(
            kiln_runner_forward(h, out.as_mut_ptr(), out.len(), &mut n),
            KilnStatus::Ok as i32
        );
        // Int32 tensor [1, 1], Int 7, Double 0.25, Bool false; None adds nothing.
        assert_eq!(&out[..n], &[1.0f32, 1.0, 7.0, 0.25, 0.0]);

        kiln_runner_destroy(h);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn destroyed_handle_is_stale() {
        let path = write_temp_program("ffi-stale", &add_relu_program());
        let h = create(&path, 0).unwrap();
        assert_eq!(kiln_runner_destroy(h), KilnStatus::Ok as i32);
        assert_eq!(kiln_runner_destroy(h), KilnStatus::InvalidHandle as i32);

        let mut n = 0usize;
        assert_eq!(
            kiln_runner_forward(h, std::ptr::null_mut(), 0, &mut n),
            KilnStatus::InvalidHandle as i32
        );
        assert_eq!(
            kiln_runner_num_outputs(h, &mut n),
            KilnStatus::InvalidHandle as i32
        );
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn bad_arguments_are_rejected() {
        let mut h = 0u64;
        assert_eq!(
            kiln_runner_create(std::ptr::null(), 0, &mut h),
            KilnStatus::InvalidArgument as i32
        );
        let c = CString::new("anything").unwrap();
        assert_eq!(
            kiln_runner_create(c.as_ptr(), 0, std::ptr::null_mut()),
            KilnStatus::InvalidArgument as i32
        );
        assert_eq!(
            kiln_runner_forward(0, std::ptr::null_mut(), 4, std::ptr::null_mut()),
            KilnStatus::InvalidArgument as i32
        );
        assert_eq!(
            kiln_runner_num_outputs(0, std::ptr::null_mut()),
            KilnStatus::InvalidArgument as i32
        );
    }

    #[test]
    fn missing_file_is_io() {
        let path = std::env::temp_dir().join("kiln-ffi-definitely-missing.kiln");
        assert_eq!(create(&path, 0), Err(KilnStatus::Io as i32));
    }

    #[test]
    fn garbage_file_is_invalid_program() {
        let path = write_temp_program("ffi-garbage", b"not a program");
        assert_eq!(create(&path, 0), Err(KilnStatus::InvalidProgram as i32));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn tiny_arena_fails_at_forward() {
        let path = write_temp_program("ffi-tiny", &mlp_program());
        let h = create(&path, 16).unwrap();
        let mut out = [0f32; 2];
        let mut n = 0usize;
        assert_eq!(
            kiln_runner_forward(h, out.as_mut_ptr(), out.len(), &mut n),
            KilnStatus::OutOfArenaSpace as i32
        );
        kiln_runner_destroy(h);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn flatten_skips_none() {
        let flat = flatten(&[OwnedValue::None, OwnedValue::Bool(true), OwnedValue::Int(-3)]);
        assert_eq!(flat, vec![1.0, -3.0]);
    }
}
