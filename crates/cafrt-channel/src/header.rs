//! The fixed message header for remote-function requests (`spec.md` §4.F
//! "Wire format", §6 "Wire format").

use bitflags::bitflags;

/// `cmd` discriminant. `Unset` never appears on the wire; it is the
/// zero-value used to detect a malformed or uninitialized header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    Unset = 0,
    Get = 1,
    Present = 2,
    Send = 3,
    Transfer = 4,
}

impl Command {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Command::Unset),
            1 => Some(Command::Get),
            2 => Some(Command::Present),
            3 => Some(Command::Send),
            4 => Some(Command::Transfer),
            _ => None,
        }
    }
}

bitflags! {
    /// `spec.md` §4.F "flags" bitset.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Flags: u8 {
        const DST_HAS_DESC       = 0b0000_0001;
        const SRC_HAS_DESC       = 0b0000_0010;
        const CHAR_ARRAY         = 0b0000_0100;
        const INCLUDE_DESCRIPTOR = 0b0000_1000;
        const TRANSFER_DESC      = 0b0001_0000;
    }
}

/// The fixed part of a remote-function request, exactly as listed in
/// `spec.md` §4.F. `data[]` (the variable payload) is carried separately
/// as a byte buffer rather than inlined into this struct.
#[derive(Clone, Copy, Debug)]
pub struct Header {
    pub cmd: Command,
    pub flags: Flags,
    pub transfer_size: u64,
    pub opt_charlen: u32,
    /// Window handle on the target, or `None` when addressed by `ra_id`.
    pub win: Option<u64>,
    pub dest_image: i32,
    pub dest_tag: i32,
    pub accessor_index: u32,
    pub ra_id: u64,
    pub dest_opt_charlen: u32,
}

/// Fixed wire size of [`Header`] (excluding the payload), used to size the
/// receive buffer's header prefix.
pub const HEADER_LEN: usize = 8 * 5 + 4 * 4;

impl Header {
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        let mut w = 0usize;
        buf[w] = self.cmd as u8;
        w += 1;
        buf[w] = self.flags.bits();
        w += 1;
        w += 6; // padding to the next 8-byte-aligned field
        buf[w..w + 8].copy_from_slice(&self.transfer_size.to_ne_bytes());
        w += 8;
        buf[w..w + 4].copy_from_slice(&self.opt_charlen.to_ne_bytes());
        w += 4;
        let win_present = self.win.is_some() as u32;
        buf[w..w + 4].copy_from_slice(&win_present.to_ne_bytes());
        w += 4;
        buf[w..w + 8].copy_from_slice(&self.win.unwrap_or(0).to_ne_bytes());
        w += 8;
        buf[w..w + 4].copy_from_slice(&self.dest_image.to_ne_bytes());
        w += 4;
        buf[w..w + 4].copy_from_slice(&self.dest_tag.to_ne_bytes());
        w += 4;
        buf[w..w + 4].copy_from_slice(&self.accessor_index.to_ne_bytes());
        w += 4;
        buf[w..w + 8].copy_from_slice(&self.ra_id.to_ne_bytes());
        w += 8;
        buf[w..w + 4].copy_from_slice(&self.dest_opt_charlen.to_ne_bytes());
        w += 4;
        debug_assert_eq!(w, HEADER_LEN);
        buf
    }

    pub fn decode(buf: &[u8]) -> Option<Header> {
        if buf.len() < HEADER_LEN {
            return None;
        }
        let mut r = 0usize;
        let cmd = Command::from_u8(buf[r])?;
        r += 1;
        let flags = Flags::from_bits_truncate(buf[r]);
        r += 1;
        r += 6;
        let transfer_size = u64::from_ne_bytes(buf[r..r + 8].try_into().ok()?);
        r += 8;
        let opt_charlen = u32::from_ne_bytes(buf[r..r + 4].try_into().ok()?);
        r += 4;
        let win_present = u32::from_ne_bytes(buf[r..r + 4].try_into().ok()?);
        r += 4;
        let win_value = u64::from_ne_bytes(buf[r..r + 8].try_into().ok()?);
        r += 8;
        let win = if win_present != 0 { Some(win_value) } else { None };
        let dest_image = i32::from_ne_bytes(buf[r..r + 4].try_into().ok()?);
        r += 4;
        let dest_tag = i32::from_ne_bytes(buf[r..r + 4].try_into().ok()?);
        r += 4;
        let accessor_index = u32::from_ne_bytes(buf[r..r + 4].try_into().ok()?);
        r += 4;
        let ra_id = u64::from_ne_bytes(buf[r..r + 8].try_into().ok()?);
        r += 8;
        let dest_opt_charlen = u32::from_ne_bytes(buf[r..r + 4].try_into().ok()?);
        r += 4;
        debug_assert_eq!(r, HEADER_LEN);
        Some(Header {
            cmd,
            flags,
            transfer_size,
            opt_charlen,
            win,
            dest_image,
            dest_tag,
            accessor_index,
            ra_id,
            dest_opt_charlen,
        })
    }

    /// A zero-length-body termination message (`spec.md` §4.F "A
    /// termination message (zero-length body) ends the thread at
    /// finalize").
    pub fn termination(dest_image: i32) -> Header {
        Header {
            cmd: Command::Unset,
            flags: Flags::empty(),
            transfer_size: 0,
            opt_charlen: 0,
            win: None,
            dest_image,
            dest_tag: 0,
            accessor_index: 0,
            ra_id: 0,
            dest_opt_charlen: 0,
        }
    }

    pub fn is_termination(&self) -> bool {
        self.cmd == Command::Unset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrips_through_wire_encoding() {
        let h = Header {
            cmd: Command::Get,
            flags: Flags::DST_HAS_DESC | Flags::INCLUDE_DESCRIPTOR,
            transfer_size: 64,
            opt_charlen: 0,
            win: Some(0xdead_beef),
            dest_image: 3,
            dest_tag: 7,
            accessor_index: 42,
            ra_id: 9,
            dest_opt_charlen: 5,
        };
        let wire = h.encode();
        let back = Header::decode(&wire).unwrap();
        assert_eq!(back.cmd, Command::Get);
        assert_eq!(back.flags, Flags::DST_HAS_DESC | Flags::INCLUDE_DESCRIPTOR);
        assert_eq!(back.win, Some(0xdead_beef));
        assert_eq!(back.dest_image, 3);
        assert_eq!(back.accessor_index, 42);
        assert_eq!(back.dest_opt_charlen, 5);
    }

    #[test]
    fn win_none_roundtrips() {
        let h = Header {
            win: None,
            ..Header::termination(1)
        };
        let back = Header::decode(&h.encode()).unwrap();
        assert_eq!(back.win, None);
    }

    #[test]
    fn termination_message_is_recognized() {
        let h = Header::termination(2);
        assert!(h.is_termination());
        let back = Header::decode(&h.encode()).unwrap();
        assert!(back.is_termination());
    }

    #[test]
    fn truncated_buffer_fails_to_decode() {
        assert!(Header::decode(&[0u8; 4]).is_none());
    }
}
