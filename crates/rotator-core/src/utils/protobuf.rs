//! Minimal protobuf wire-format helpers for the target application's auth state blob.
// Varints carry 7 bits per byte, tags pack a 3-bit wire type under the field number.
// Every cast below is bounded by that layout.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_lossless,
    clippy::as_conversions,
    clippy::arithmetic_side_effects,
    clippy::indexing_slicing,
    reason = "Protobuf wire format: bit-level operations with protocol-defined bounds"
)]

/// Field number of the OAuth token message inside the agent-manager init state.
pub const OAUTH_FIELD: u32 = 6;

const WIRE_VARINT: u8 = 0;
const WIRE_FIXED64: u8 = 1;
const WIRE_LEN: u8 = 2;
const WIRE_FIXED32: u8 = 5;

/// Encode an unsigned varint.
pub fn encode_varint(mut value: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(10);
    while value >= 0x80 {
        buf.push((value & 0x7F | 0x80) as u8);
        value >>= 7;
    }
    buf.push(value as u8);
    buf
}

/// Read a varint at `offset`, returning the value and the offset after it.
pub fn read_varint(data: &[u8], offset: usize) -> Result<(u64, usize), String> {
    let mut result = 0u64;
    let mut shift = 0u32;
    let mut pos = offset;

    loop {
        let Some(&byte) = data.get(pos) else {
            return Err("truncated varint".to_string());
        };
        if shift >= 64 {
            return Err("varint too long".to_string());
        }
        result |= ((byte & 0x7F) as u64) << shift;
        pos += 1;
        if byte & 0x80 == 0 {
            return Ok((result, pos));
        }
        shift += 7;
    }
}

/// Return the offset just past a field body of `wire_type` starting at `offset`.
pub fn skip_field(data: &[u8], offset: usize, wire_type: u8) -> Result<usize, String> {
    let end = match wire_type {
        WIRE_VARINT => read_varint(data, offset)?.1,
        WIRE_FIXED64 => offset.checked_add(8).ok_or("offset overflow")?,
        WIRE_LEN => {
            let (length, body) = read_varint(data, offset)?;
            usize::try_from(length)
                .ok()
                .and_then(|len| body.checked_add(len))
                .ok_or("length-delimited field overflows")?
        },
        WIRE_FIXED32 => offset.checked_add(4).ok_or("offset overflow")?,
        other => return Err(format!("unsupported wire type {}", other)),
    };
    if end > data.len() {
        return Err(format!("truncated field (wire type {})", wire_type));
    }
    Ok(end)
}

/// Copy `data` without any occurrence of `field_num`.
pub fn remove_field(data: &[u8], field_num: u32) -> Result<Vec<u8>, String> {
    let mut out = Vec::with_capacity(data.len());
    let mut offset = 0;

    while offset < data.len() {
        let (tag, body) = read_varint(data, offset)?;
        let next = skip_field(data, body, (tag & 7) as u8)?;
        if (tag >> 3) as u32 != field_num {
            out.extend_from_slice(&data[offset..next]);
        }
        offset = next;
    }

    Ok(out)
}

/// Body of the first length-delimited occurrence of `target_field`, if any.
pub fn find_field(data: &[u8], target_field: u32) -> Result<Option<Vec<u8>>, String> {
    let mut offset = 0;

    while offset < data.len() {
        let (tag, body) = read_varint(data, offset)?;
        let wire_type = (tag & 7) as u8;
        let next = skip_field(data, body, wire_type)?;
        if (tag >> 3) as u32 == target_field && wire_type == WIRE_LEN {
            let (_, content) = read_varint(data, body)?;
            return Ok(Some(data[content..next].to_vec()));
        }
        offset = next;
    }

    Ok(None)
}

fn push_len_delimited(out: &mut Vec<u8>, field: u32, payload: &[u8]) {
    out.extend(encode_varint(((field << 3) | WIRE_LEN as u32) as u64));
    out.extend(encode_varint(payload.len() as u64));
    out.extend_from_slice(payload);
}

/// Build field 6 (`OAuthTokenInfo`) for the target's state blob:
///
/// ```text
/// message OAuthTokenInfo {
///     string access_token = 1;
///     string token_type = 2;     // always "Bearer"
///     string refresh_token = 3;
///     Timestamp expiry = 4;      // { int64 seconds = 1; }
/// }
/// ```
pub fn create_oauth_field(access_token: &str, refresh_token: &str, expiry: i64) -> Vec<u8> {
    let mut timestamp = encode_varint((1 << 3) | WIRE_VARINT as u64);
    timestamp.extend(encode_varint(expiry as u64));

    let mut info = Vec::new();
    push_len_delimited(&mut info, 1, access_token.as_bytes());
    push_len_delimited(&mut info, 2, b"Bearer");
    push_len_delimited(&mut info, 3, refresh_token.as_bytes());
    push_len_delimited(&mut info, 4, &timestamp);

    let mut field = Vec::with_capacity(info.len() + 4);
    push_len_delimited(&mut field, OAUTH_FIELD, &info);
    field
}

/// Replace the OAuth field of a serialized state message with fresh credentials.
pub fn replace_oauth_field(
    state: &[u8],
    access_token: &str,
    refresh_token: &str,
    expiry: i64,
) -> Result<Vec<u8>, String> {
    let mut out = remove_field(state, OAUTH_FIELD)?;
    out.extend(create_oauth_field(access_token, refresh_token, expiry));
    Ok(out)
}
