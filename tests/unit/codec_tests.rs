use bytes::BytesMut;
use claude_relay::errors::AppError;
use claude_relay::stream::codec::{StreamCodec, MAX_LINE_BYTES};
use tokio_util::codec::Decoder;

#[test]
fn decodes_complete_lines_in_order() {
    let mut codec = StreamCodec::new();
    let mut buf = BytesMut::from(&b"{\"type\":\"system\"}\n{\"type\":\"result\"}\n"[..]);

    assert_eq!(
        codec.decode(&mut buf).expect("decode"),
        Some(r#"{"type":"system"}"#.to_owned())
    );
    assert_eq!(
        codec.decode(&mut buf).expect("decode"),
        Some(r#"{"type":"result"}"#.to_owned())
    );
    assert_eq!(codec.decode(&mut buf).expect("decode"), None);
}

#[test]
fn buffers_partial_lines_until_newline_arrives() {
    let mut codec = StreamCodec::new();
    let mut buf = BytesMut::from(&b"{\"type\":"[..]);

    assert_eq!(codec.decode(&mut buf).expect("decode"), None);

    buf.extend_from_slice(b"\"result\"}\n");
    assert_eq!(
        codec.decode(&mut buf).expect("decode"),
        Some(r#"{"type":"result"}"#.to_owned())
    );
}

#[test]
fn decode_eof_yields_trailing_unterminated_line() {
    let mut codec = StreamCodec::new();
    let mut buf = BytesMut::from(&b"{\"type\":\"result\"}"[..]);

    assert_eq!(
        codec.decode_eof(&mut buf).expect("decode_eof"),
        Some(r#"{"type":"result"}"#.to_owned())
    );
    assert_eq!(codec.decode_eof(&mut buf).expect("decode_eof"), None);
}

#[test]
fn oversized_line_is_a_stream_error() {
    let mut codec = StreamCodec::new();
    let mut buf = BytesMut::with_capacity(MAX_LINE_BYTES + 16);
    buf.resize(MAX_LINE_BYTES + 8, b'x');
    buf.extend_from_slice(b"\n");

    match codec.decode(&mut buf) {
        Err(AppError::Stream(msg)) => assert!(msg.contains("line too long")),
        other => panic!("expected stream error, got {other:?}"),
    }
}
