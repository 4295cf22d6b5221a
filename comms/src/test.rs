#![cfg(test)]

use std::{io, path::Path};

use rand::{Rng, distr::Alphanumeric};
use tokio::io::duplex;

use crate::{LenType, MAX_FRAME_LEN, msg::Msg, receiver, sender};

#[tokio::test]
async fn job_stream_arrives_in_order_and_ends_with_marker() {
    let (co_stream, wk_stream) = duplex(64);
    let (mut tx, mut rx) = (sender(co_stream), receiver(wk_stream));

    let paths: Vec<String> = (0..16)
        .map(|i| {
            let len = rand::rng().random_range(1..40);
            let name: String = rand::rng()
                .sample_iter(&Alphanumeric)
                .take(len)
                .map(char::from)
                .collect();
            format!("jobs/{i}-{name}.txt")
        })
        .collect();

    let expected = paths.clone();
    let send = async move {
        for path in &paths {
            tx.send(&Msg::Job(Path::new(path))).await?;
        }
        tx.send(&Msg::EndOfSession).await?;
        tx.close().await
    };

    let recv = async move {
        let mut buf = Vec::new();
        let mut received = Vec::new();

        loop {
            match rx.recv_into(&mut buf).await? {
                Msg::Job(path) => received.push(path.to_string_lossy().into_owned()),
                Msg::EndOfSession => break,
            }
        }

        Ok::<_, io::Error>(received)
    };

    let (sent, received) = tokio::join!(send, recv);
    sent.unwrap();
    assert_eq!(received.unwrap(), expected);
}

#[tokio::test]
async fn frame_cut_inside_the_path_is_an_eof_error() {
    let mut frame = (10 as LenType).to_be_bytes().to_vec();
    frame.extend_from_slice(b"short");

    let mock = tokio_test::io::Builder::new().read(&frame).build();
    let mut rx = receiver(mock);

    let mut buf = Vec::new();
    let err = rx.recv_into::<Msg>(&mut buf).await.unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
}

#[tokio::test]
async fn stream_closed_without_marker_is_an_eof_error() {
    let mock = tokio_test::io::Builder::new().build();
    let mut rx = receiver(mock);

    let mut buf = Vec::new();
    let err = rx.recv_into::<Msg>(&mut buf).await.unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
}

#[tokio::test]
async fn oversized_header_is_rejected_before_reading_the_body() {
    let header = ((MAX_FRAME_LEN + 1) as LenType).to_be_bytes();

    let mock = tokio_test::io::Builder::new().read(&header).build();
    let mut rx = receiver(mock);

    let mut buf = Vec::new();
    let err = rx.recv_into::<Msg>(&mut buf).await.unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidData);
}

#[tokio::test]
async fn end_of_session_is_a_bare_zero_header() {
    let mut bytes = Vec::new();
    let mut tx = sender(&mut bytes);
    tx.send(&Msg::EndOfSession).await.unwrap();
    drop(tx);

    assert_eq!(bytes, (0 as LenType).to_be_bytes());
}
