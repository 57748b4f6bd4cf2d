#![no_main]

use bytes::BytesMut;
use craftwire::core::codec::FrameCodec;
use craftwire::core::buffer::PacketReader;
use craftwire::protocol::packet::Decode;
use craftwire::HandshakePacket;
use libfuzzer_sys::fuzz_target;
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    // Split the input into frames and decode each payload as a handshake body
    let mut codec = FrameCodec::new(64 * 1024);
    let mut buf = BytesMut::from(data);

    while let Ok(Some(frame)) = codec.decode(&mut buf) {
        let mut reader = PacketReader::new(&frame);
        if reader.read_varint().is_ok() {
            let _ = HandshakePacket::decode(&mut reader);
        }
    }
});
