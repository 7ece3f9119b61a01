//! Wires component E's [`RemoteAccess`] seam to component B's windows.
//!
//! A chain always starts relative to one already-registered token; this
//! type pairs that token's window with the global dynamic window so
//! [`cafrt_refchain::pass2`] can switch spaces mid-walk without knowing
//! anything about MPI (`spec.md` §4.E "Pass 1": "the chain ... switches
//! permanently to Global the first time it crosses a component with
//! token_sub_offset > 0").

use cafrt_core::{CafError, ImageId};
use cafrt_descriptor::{Attribute, BaseType, Descriptor, Dimension, TypeKind};
use cafrt_refchain::{RemoteAccess, Space};
use cafrt_window::RmaWindow;

pub struct WindowAccess<'a> {
    image: ImageId,
    named_window: &'a RmaWindow,
    global_window: &'a RmaWindow,
}

impl<'a> WindowAccess<'a> {
    pub fn new(image: ImageId, named_window: &'a RmaWindow, global_window: &'a RmaWindow) -> Self {
        WindowAccess {
            image,
            named_window,
            global_window,
        }
    }

    fn window_for(&self, space: Space) -> &RmaWindow {
        match space {
            Space::Named => self.named_window,
            Space::Global => self.global_window,
        }
    }
}

impl RemoteAccess for WindowAccess<'_> {
    fn image(&self) -> ImageId {
        self.image
    }

    fn fetch_descriptor(&self, space: Space, offset: isize) -> Result<Descriptor, CafError> {
        let mut wire = [0u8; WIRE_DESCRIPTOR_LEN];
        self.window_for(space).get(self.image.as_rank(), offset, &mut wire)?;
        decode_descriptor(&wire)
    }

    fn fetch_pointer(&self, space: Space, offset: isize) -> Result<isize, CafError> {
        let mut buf = [0u8; 8];
        self.window_for(space).get(self.image.as_rank(), offset, &mut buf)?;
        // Dynamic windows address by absolute virtual address rather than a
        // displacement from the window's base, so the stored pointer value
        // doubles as the byte offset a later `MPI_Get`/`MPI_Put` on the
        // global window targets directly (`spec.md` §9 "Pointer graphs
        // across processes").
        Ok(i64::from_ne_bytes(buf) as isize)
    }

    fn get_bytes(&self, space: Space, offset: isize, buf: &mut [u8]) -> Result<(), CafError> {
        self.window_for(space).get(self.image.as_rank(), offset, buf)
    }

    fn put_bytes(&self, space: Space, offset: isize, buf: &[u8]) -> Result<(), CafError> {
        self.window_for(space).put(self.image.as_rank(), offset, buf)
    }
}

/// Fixed-width remote descriptor encoding used only between the reference-
/// chain interpreter and its own peer: `rank`, `base_type`, `kind`, then
/// [`cafrt_descriptor::MAX_RANK`] `(lower_bound, extent, stride_bytes)`
/// triples, all as little-endian `i64`s. This is internal wire format, not
/// the CFI/GFC descriptor ABI translation `spec.md` §6 calls out as
/// out-of-scope — it only has to be legible to this runtime's own peers.
const WIRE_DESCRIPTOR_LEN: usize = 1 + 1 + 4 + cafrt_descriptor::MAX_RANK * 24;

fn decode_descriptor(wire: &[u8]) -> Result<Descriptor, CafError> {
    if wire.len() < WIRE_DESCRIPTOR_LEN {
        return Err(CafError::InvalidDescriptor);
    }
    let rank = wire[0];
    let base = decode_base_type(wire[1])?;
    let kind = i32::from_le_bytes(wire[2..6].try_into().unwrap());
    let type_kind = TypeKind::new(base, kind);

    let mut d = Descriptor::scalar(std::ptr::null_mut(), type_kind.elem_len(), type_kind, Attribute::Other);
    d.rank = rank;
    let dims_start = 6;
    for k in 0..rank as usize {
        let off = dims_start + k * 24;
        let lower_bound = i64::from_le_bytes(wire[off..off + 8].try_into().unwrap());
        let extent = i64::from_le_bytes(wire[off + 8..off + 16].try_into().unwrap());
        let stride_bytes = i64::from_le_bytes(wire[off + 16..off + 24].try_into().unwrap()) as isize;
        d.dims_mut()[k] = Dimension {
            lower_bound,
            extent,
            stride_bytes,
        };
    }
    Ok(d)
}

/// Encodes `d` into the wire form [`decode_descriptor`] reads; used when a
/// primary token's owning image publishes its descriptor for peers to fetch
/// (the counterpart lives in the registration path, see DESIGN.md).
pub fn encode_descriptor(d: &Descriptor) -> Vec<u8> {
    let mut wire = vec![0u8; WIRE_DESCRIPTOR_LEN];
    wire[0] = d.rank;
    wire[1] = encode_base_type(d.type_kind.base);
    wire[2..6].copy_from_slice(&d.type_kind.kind.to_le_bytes());
    for (k, dim) in d.dims().iter().enumerate() {
        let off = 6 + k * 24;
        wire[off..off + 8].copy_from_slice(&dim.lower_bound.to_le_bytes());
        wire[off + 8..off + 16].copy_from_slice(&dim.extent.to_le_bytes());
        wire[off + 16..off + 24].copy_from_slice(&(dim.stride_bytes as i64).to_le_bytes());
    }
    wire
}

fn encode_base_type(b: BaseType) -> u8 {
    match b {
        BaseType::Integer => 0,
        BaseType::Logical => 1,
        BaseType::Real => 2,
        BaseType::Complex => 3,
        BaseType::Character => 4,
        BaseType::Derived => 5,
    }
}

fn decode_base_type(byte: u8) -> Result<BaseType, CafError> {
    match byte {
        0 => Ok(BaseType::Integer),
        1 => Ok(BaseType::Logical),
        2 => Ok(BaseType::Real),
        3 => Ok(BaseType::Complex),
        4 => Ok(BaseType::Character),
        5 => Ok(BaseType::Derived),
        _ => Err(CafError::InvalidType),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cafrt_descriptor::Attribute;

    #[test]
    fn descriptor_roundtrips_through_wire_encoding() {
        let mut d = Descriptor::scalar(
            std::ptr::null_mut(),
            4,
            TypeKind::new(BaseType::Integer, 4),
            Attribute::Allocatable,
        );
        d.rank = 2;
        d.dims_mut()[0] = Dimension {
            lower_bound: 1,
            extent: 10,
            stride_bytes: 4,
        };
        d.dims_mut()[1] = Dimension {
            lower_bound: 1,
            extent: 5,
            stride_bytes: 40,
        };

        let wire = encode_descriptor(&d);
        let decoded = decode_descriptor(&wire).unwrap();
        assert_eq!(decoded.rank, 2);
        assert_eq!(decoded.type_kind, d.type_kind);
        assert_eq!(decoded.dims()[0].extent, 10);
        assert_eq!(decoded.dims()[1].stride_bytes, 40);
    }

    #[test]
    fn truncated_wire_is_rejected() {
        let short = vec![0u8; 4];
        assert!(matches!(decode_descriptor(&short), Err(CafError::InvalidDescriptor)));
    }
}
