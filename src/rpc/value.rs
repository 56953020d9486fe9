//! Typed writes of packet payloads into config fields.
//!
//! Every write checks sizes before touching the destination, so a bad
//! payload never leaves a field half-updated.  Payload slices carry no
//! alignment guarantee; numeric values are always copied through an
//! aligned scratch value instead of being reinterpreted in place.
//!
//! The dispatcher only needs [`update_value`], [`update_string`] and
//! [`serialize`], because registry descriptors address raw byte spans.
//! [`read_value`], [`update_typed`] and [`update_string_list`] are the
//! typed API for code that holds a concrete field, such as a `u16` or
//! a `[[u8; N]]` slot array, instead of a descriptor.

use bytemuck::Pod;
use log::warn;

use super::codec::{Response, ResponseCode};

/// Copy `payload` into `dest` if `declared` and the payload length both
/// equal the field width exactly.
pub fn update_value(dest: &mut [u8], declared: u8, payload: &[u8]) -> ResponseCode {
    let size = usize::from(declared);
    if size != dest.len() || payload.len() != size {
        return ResponseCode::BadRequest;
    }
    dest.copy_from_slice(payload);
    ResponseCode::Ok
}

/// Decode a fixed-width value from an unaligned payload.
pub fn read_value<T: Pod>(payload: &[u8]) -> Result<T, ResponseCode> {
    if payload.len() != core::mem::size_of::<T>() {
        return Err(ResponseCode::BadRequest);
    }
    Ok(bytemuck::pod_read_unaligned(payload))
}

/// Size-checked update of a typed field.
pub fn update_typed<T: Pod>(dest: &mut T, payload: &[u8]) -> ResponseCode {
    match read_value::<T>(payload) {
        Ok(value) => {
            *dest = value;
            ResponseCode::Ok
        }
        Err(code) => code,
    }
}

/// Write a string into a fixed-capacity field.  Longer than capacity is
/// refused; shorter is NUL-terminated.
pub fn update_string(dest: &mut [u8], payload: &[u8]) -> ResponseCode {
    if payload.len() > dest.len() {
        return ResponseCode::BadRequest;
    }
    dest[..payload.len()].copy_from_slice(payload);
    if let Some(rest) = dest.get_mut(payload.len()..) {
        rest.fill(0);
    }
    ResponseCode::Ok
}

/// Fill consecutive string slots from a NUL-delimited payload.
///
/// The first payload byte is the starting slot index.  Entries longer
/// than a slot are truncated; entries past the last slot are dropped.
pub fn update_string_list<const N: usize>(slots: &mut [[u8; N]], payload: &[u8]) -> ResponseCode {
    let Some((&start, list)) = payload.split_first() else {
        return ResponseCode::BadRequest;
    };
    if list.is_empty() || usize::from(start) >= slots.len() {
        return ResponseCode::BadRequest;
    }

    let list = list.strip_suffix(&[0]).unwrap_or(list);
    let mut slot = usize::from(start);
    for entry in list.split(|&b| b == 0) {
        let Some(dest) = slots.get_mut(slot) else {
            break;
        };
        let len = if entry.len() > N {
            warn!("Value: truncating list entry {} from {} to {} bytes", slot, entry.len(), N);
            N
        } else {
            entry.len()
        };
        dest.fill(0);
        dest[..len].copy_from_slice(&entry[..len]);
        slot += 1;
    }
    ResponseCode::Ok
}

/// Expose a plain record as a binary response body.
pub fn serialize<T: Pod>(value: &T) -> Response<'_> {
    Response::Binary(bytemuck::bytes_of(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_size_update() {
        let mut dest = [0u8; 2];
        assert_eq!(update_value(&mut dest, 2, &[0x00, 0x40]), ResponseCode::Ok);
        assert_eq!(u16::from_le_bytes(dest), 0x4000);
    }

    #[test]
    fn size_mismatch_leaves_dest_untouched() {
        let mut dest = [7u8; 4];
        assert_eq!(update_value(&mut dest, 2, &[1, 2]), ResponseCode::BadRequest);
        assert_eq!(update_value(&mut dest, 4, &[1, 2]), ResponseCode::BadRequest);
        assert_eq!(update_value(&mut dest, 5, &[1, 2, 3, 4, 5]), ResponseCode::BadRequest);
        assert_eq!(dest, [7; 4]);
    }

    #[test]
    fn typed_update_from_unaligned_payload() {
        let raw = [0xFFu8, 0x78, 0x56, 0x34, 0x12];
        let mut v = 0u32;
        assert_eq!(update_typed(&mut v, &raw[1..]), ResponseCode::Ok);
        assert_eq!(v, 0x1234_5678);
        assert_eq!(update_typed(&mut v, &raw[1..3]), ResponseCode::BadRequest);
        assert_eq!(v, 0x1234_5678);
        assert_eq!(read_value::<u64>(&[0u8; 8]), Ok(0));
    }

    #[test]
    fn string_update() {
        let mut dest = [b'x'; 8];
        assert_eq!(update_string(&mut dest, b"abc"), ResponseCode::Ok);
        assert_eq!(&dest, b"abc\0\0\0\0\0");
        assert_eq!(update_string(&mut dest, b"12345678"), ResponseCode::Ok);
        assert_eq!(&dest, b"12345678");
        assert_eq!(update_string(&mut dest, b"123456789"), ResponseCode::BadRequest);
        assert_eq!(&dest, b"12345678");
    }

    #[test]
    fn string_list_fills_from_start_index() {
        let mut slots = [[0u8; 4]; 3];
        assert_eq!(update_string_list(&mut slots, b"\x01ab\0cd\0"), ResponseCode::Ok);
        assert_eq!(slots, [[0; 4], *b"ab\0\0", *b"cd\0\0"]);
    }

    #[test]
    fn string_list_truncates_and_stops() {
        let mut slots = [[0u8; 4]; 2];
        assert_eq!(update_string_list(&mut slots, b"\x00toolong\0ok\0extra"), ResponseCode::Ok);
        assert_eq!(slots, [*b"tool", *b"ok\0\0"]);
    }

    #[test]
    fn string_list_rejects_bad_header() {
        let mut slots = [[0u8; 4]; 2];
        assert_eq!(update_string_list(&mut slots, b""), ResponseCode::BadRequest);
        assert_eq!(update_string_list(&mut slots, b"\x00"), ResponseCode::BadRequest);
        assert_eq!(update_string_list(&mut slots, b"\x02ab"), ResponseCode::BadRequest);
        assert_eq!(slots, [[0; 4]; 2]);
    }

    #[test]
    fn serialize_exposes_bytes() {
        let v = 0x0102_0304u32;
        assert_eq!(serialize(&v), Response::Binary(&[4, 3, 2, 1]));
    }
}
