//! `atomic_define` / `atomic_ref` / `atomic_cas` / `atomic_op` (`spec.md`
//! §4.G): single one-sided operations against one atomic variable's slot,
//! each already individually atomic under MPI-3 RMA so no surrounding lock
//! is needed beyond the one `with_exclusive_lock` each primitive in
//! `cafrt-window` takes internally.

use cafrt_core::CafError;
use cafrt_window::RmaWindow;
use mpi::ffi;

/// The four reduction operators `atomic_op` supports (`spec.md` §4.G
/// "atomic_op(add|band|bor|bxor)").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AtomicOp {
    Add,
    Band,
    Bor,
    Bxor,
}

impl AtomicOp {
    fn to_mpi_op(self) -> ffi::MPI_Op {
        match self {
            AtomicOp::Add => ffi::RSMPI_SUM,
            AtomicOp::Band => ffi::RSMPI_BAND,
            AtomicOp::Bor => ffi::RSMPI_BOR,
            AtomicOp::Bxor => ffi::RSMPI_BXOR,
        }
    }
}

/// `spec.md` §4.G `atomic_define`: unconditional write, done as a put under
/// the same exclusive-lock epoch the other atomics use so it cannot
/// interleave with a concurrent fetch-and-op on the same slot.
pub fn atomic_define(win: &RmaWindow, target_rank: i32, offset: isize, value: i32) -> Result<(), CafError> {
    win.put(target_rank, offset, &value.to_ne_bytes())
}

/// `spec.md` §4.G `atomic_ref`: read the current value.
pub fn atomic_ref(win: &RmaWindow, target_rank: i32, offset: isize) -> Result<i32, CafError> {
    let mut buf = [0u8; 4];
    win.get(target_rank, offset, &mut buf)?;
    Ok(i32::from_ne_bytes(buf))
}

/// `spec.md` §4.G `atomic_cas`: compare-and-swap, returning the value
/// observed before the swap.
pub fn atomic_cas(win: &RmaWindow, target_rank: i32, offset: isize, compare: i32, new_value: i32) -> Result<i32, CafError> {
    win.compare_and_swap_i32(target_rank, offset, compare, new_value)
}

/// `spec.md` §4.G `atomic_op`: fetch-and-apply one of `add|band|bor|bxor`,
/// returning the value observed before the operation.
pub fn atomic_op(win: &RmaWindow, target_rank: i32, offset: isize, op: AtomicOp, operand: i32) -> Result<i32, CafError> {
    win.fetch_and_op_i32(target_rank, offset, operand, op.to_mpi_op())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn op_mapping_is_distinct() {
        let ops = [AtomicOp::Add, AtomicOp::Band, AtomicOp::Bor, AtomicOp::Bxor];
        for (i, a) in ops.iter().enumerate() {
            for (j, b) in ops.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b);
                }
            }
        }
    }
}
