//! Bit-exact telephony stream framing (spec §4.1, §6): `[type:1][len:2 BE][payload:len]`.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use uuid::Uuid;

pub const MSG_UUID: u8 = 0x01;
pub const MSG_AUDIO: u8 = 0x10;
pub const MSG_HANGUP: u8 = 0x00;
pub const MSG_ERROR: u8 = 0x02;

pub async fn read_frame<R: AsyncRead + Unpin>(r: &mut R) -> std::io::Result<(u8, Vec<u8>)> {
    let mut header = [0u8; 3];
    r.read_exact(&mut header).await?;
    let len = u16::from_be_bytes([header[1], header[2]]) as usize;
    let mut payload = vec![0u8; len];
    r.read_exact(&mut payload).await?;
    Ok((header[0], payload))
}

pub async fn write_frame<W: AsyncWrite + Unpin>(w: &mut W, msg_type: u8, payload: &[u8]) -> std::io::Result<()> {
    if payload.len() > u16::MAX as usize {
        return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, "frame payload exceeds u16 length field"));
    }
    let mut header = [0u8; 3];
    header[0] = msg_type;
    header[1..3].copy_from_slice(&(payload.len() as u16).to_be_bytes());
    w.write_all(&header).await?;
    w.write_all(payload).await?;
    Ok(())
}

/// Accepts either a 16-byte binary call id or a text-form UUID.
pub fn parse_call_id(payload: &[u8]) -> Option<Uuid> {
    if payload.len() == 16 {
        return Uuid::from_slice(payload).ok();
    }
    std::str::from_utf8(payload).ok().and_then(|s| Uuid::parse_str(s.trim()).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_binary_call_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_call_id(id.as_bytes()), Some(id));
    }

    #[test]
    fn parses_text_call_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_call_id(id.to_string().as_bytes()), Some(id));
    }

    #[tokio::test]
    async fn round_trips_a_frame() {
        let mut buf = Vec::new();
        write_frame(&mut buf, MSG_AUDIO, &[1, 2, 3, 4]).await.unwrap();
        let mut cursor = std::io::Cursor::new(buf);
        let (msg_type, payload) = read_frame(&mut cursor).await.unwrap();
        assert_eq!(msg_type, MSG_AUDIO);
        assert_eq!(payload, vec![1, 2, 3, 4]);
    }
}
