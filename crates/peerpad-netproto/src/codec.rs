use bytes::{Buf, Bytes, BytesMut};

use crate::{
    constants::{FRAME_LEN_PREFIX, MAX_FRAME_LEN, MAX_MESSAGE_LEN},
    error::ProtoError,
    messages::PeerMessage,
};

/// Encode a message into its JSON wire text.
pub fn encode_message(msg: &PeerMessage) -> Result<String, ProtoError> {
    let text = serde_json::to_string(msg)?;
    if text.len() > MAX_MESSAGE_LEN {
        return Err(ProtoError::MessageTooLarge(text.len()));
    }
    Ok(text)
}

/// Decode a message from its JSON wire text.
pub fn decode_message(text: &str) -> Result<PeerMessage, ProtoError> {
    if text.len() > MAX_MESSAGE_LEN {
        return Err(ProtoError::MessageTooLarge(text.len()));
    }
    Ok(serde_json::from_str(text)?)
}

/// Encode a message as one length-prefixed frame for stream transports.
pub fn encode_frame(msg: &PeerMessage) -> Result<Bytes, ProtoError> {
    let body = serde_json::to_vec(msg)?;
    if body.len() > MAX_FRAME_LEN {
        return Err(ProtoError::FrameTooLarge(body.len()));
    }

    let mut out = Vec::with_capacity(FRAME_LEN_PREFIX + body.len());
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(&body);
    Ok(Bytes::from(out))
}

/// Incremental decoder for `[u32 len_le][json]` frames.
///
/// Bytes are pushed as they arrive; complete frames are popped one at a time.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Number of buffered bytes not yet consumed by a complete frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Pop the next complete message, or `None` if more bytes are needed.
    ///
    /// An oversized length prefix is an error; the stream cannot be resynced
    /// after that and should be dropped.
    pub fn next_message(&mut self) -> Result<Option<PeerMessage>, ProtoError> {
        if self.buf.len() < FRAME_LEN_PREFIX {
            return Ok(None);
        }
        let mut len_bytes = [0u8; FRAME_LEN_PREFIX];
        len_bytes.copy_from_slice(&self.buf[..FRAME_LEN_PREFIX]);
        let frame_len = u32::from_le_bytes(len_bytes) as usize;

        if frame_len > MAX_FRAME_LEN {
            return Err(ProtoError::FrameTooLarge(frame_len));
        }
        if self.buf.len() < FRAME_LEN_PREFIX + frame_len {
            return Ok(None);
        }

        self.buf.advance(FRAME_LEN_PREFIX);
        let body = self.buf.split_to(frame_len);
        Ok(Some(serde_json::from_slice(&body)?))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        messages::PlatformId,
        snapshot::{Button, ControllerSnapshot},
    };

    #[test]
    fn platform_change_round_trips() {
        let msg = PeerMessage::PlatformChange(PlatformId::new("snes"));
        let text = encode_message(&msg).unwrap();
        match decode_message(&text).unwrap() {
            PeerMessage::PlatformChange(id) => assert_eq!(id.as_str(), "snes"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn wire_shape_is_type_and_payload() {
        let text = encode_message(&PeerMessage::rom_load("game.sfc")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!({ "type": "ROM_LOAD", "payload": { "name": "game.sfc" } }));

        let text = encode_message(&PeerMessage::PlatformChange("nes".into())).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!({ "type": "PLATFORM_CHANGE", "payload": "nes" }));
    }

    #[test]
    fn input_with_missing_buttons_decodes_as_released() {
        let msg = decode_message(r#"{"type":"INPUT","payload":{"a":true,"left":true}}"#).unwrap();
        assert_eq!(
            msg,
            PeerMessage::Input(ControllerSnapshot::from_pressed([Button::A, Button::Left]))
        );

        let msg = decode_message(r#"{"type":"INPUT","payload":{}}"#).unwrap();
        assert_eq!(msg, PeerMessage::Input(ControllerSnapshot::default()));
    }

    #[test]
    fn state_update_blob_is_echoed_verbatim() {
        let blob = json!({ "x": 12, "trail": [1, 2, 3], "label": "idle" });
        let text = encode_message(&PeerMessage::StateUpdate(blob.clone())).unwrap();
        assert_eq!(decode_message(&text).unwrap(), PeerMessage::StateUpdate(blob));
    }

    #[test]
    fn unknown_tag_is_rejected() {
        assert!(decode_message(r#"{"type":"CHAT","payload":"hi"}"#).is_err());
    }

    #[test]
    fn frame_decoder_handles_split_and_batched_frames() {
        let first = encode_frame(&PeerMessage::rom_load("a.sfc")).unwrap();
        let second = encode_frame(&PeerMessage::PlatformChange("snes".into())).unwrap();

        let mut decoder = FrameDecoder::new();
        decoder.push(&first[..3]);
        assert!(decoder.next_message().unwrap().is_none());

        decoder.push(&first[3..]);
        decoder.push(&second);
        assert_eq!(
            decoder.next_message().unwrap(),
            Some(PeerMessage::rom_load("a.sfc"))
        );
        assert_eq!(
            decoder.next_message().unwrap(),
            Some(PeerMessage::PlatformChange("snes".into()))
        );
        assert!(decoder.next_message().unwrap().is_none());
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn oversized_frame_prefix_is_rejected() {
        let mut decoder = FrameDecoder::new();
        decoder.push(&((MAX_FRAME_LEN as u32) + 1).to_le_bytes());
        assert!(matches!(
            decoder.next_message(),
            Err(ProtoError::FrameTooLarge(_))
        ));
    }
}
