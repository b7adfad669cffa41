//! Default input initialisation.

use tracing::debug;

use crate::error::ExecError;
use crate::method::Method;

/// Fill every tensor input of `method` with ones.
///
/// Non-tensor inputs are left as declared. Returns the number of tensor
/// inputs filled.
pub fn prepare_input_tensors(method: &mut Method<'_>) -> Result<usize, ExecError> {
    let mut filled = 0;
    for index in 0..method.inputs_size() {
        if method.input_is_tensor(index)? {
            method.fill_input(index, 1.0)?;
            filled += 1;
        }
    }
    debug!(method = method.name(), filled, "inputs set to ones");
    Ok(filled)
}
