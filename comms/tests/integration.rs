use std::path::Path;

use comms::{Deserialize, Serialize, msg::Msg};
use tokio::io;

/// A payload serialized into the sender's scratch buffer instead of zero-copy.
#[derive(Debug, PartialEq)]
struct Shout<'a>(&'a str);

impl Serialize for Shout<'_> {
    fn serialize<'a>(&'a self, buf: &mut Vec<u8>) -> std::io::Result<Option<&'a [u8]>> {
        buf.extend(self.0.bytes().map(|b| b.to_ascii_uppercase()));
        Ok(None)
    }
}

impl<'a> Deserialize<'a> for Shout<'a> {
    fn deserialize(buf: &'a [u8]) -> std::io::Result<Self> {
        std::str::from_utf8(buf)
            .map(Shout)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

#[tokio::test]
async fn buffered_payload_crosses_a_pipe() {
    let (writer, reader) = io::duplex(128);
    let mut tx = comms::sender(writer);
    let mut rx = comms::receiver(reader);

    tx.send(&Shout("hello, world!")).await.unwrap();

    let mut buf = Vec::new();
    let got: Shout = rx.recv_into(&mut buf).await.unwrap();
    assert_eq!(got, Shout("HELLO, WORLD!"));
}

#[tokio::test]
async fn jobs_and_custom_frames_share_one_framing() {
    let (writer, reader) = io::duplex(256);
    let mut tx = comms::sender(writer);
    let mut rx = comms::receiver(reader);

    tx.send(&Msg::Job(Path::new("left.txt"))).await.unwrap();
    tx.send(&Shout("x")).await.unwrap();
    tx.send(&Msg::EndOfSession).await.unwrap();
    tx.close().await.unwrap();

    let mut buf = Vec::new();
    let job: Msg = rx.recv_into(&mut buf).await.unwrap();
    assert_eq!(job, Msg::Job(Path::new("left.txt")));

    let shout: Shout = rx.recv_into(&mut buf).await.unwrap();
    assert_eq!(shout, Shout("X"));

    let end: Msg = rx.recv_into(&mut buf).await.unwrap();
    assert_eq!(end, Msg::EndOfSession);

    let err = rx.recv_into::<Msg>(&mut buf).await.unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
}

#[tokio::test]
async fn oversized_frame_is_refused_by_the_sender() {
    let (writer, _reader) = io::duplex(64);
    let mut tx = comms::sender(writer);

    let long = "a".repeat(comms::MAX_FRAME_LEN + 1);
    let err = tx.send(&Msg::Job(Path::new(&long))).await.unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
}
