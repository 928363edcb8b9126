//! End-to-end scenarios against an in-process fake UDP server.

use std::time::Duration;

use bytes::{Buf, BufMut, BytesMut};
use tempfile::tempdir;
use tftp_client::config::ClientConfig;
use tftp_client::{AddressFamily, ErrorCode, Opcode, TftpClient, TftpClientError, TransferMode};
use tokio::net::UdpSocket;
use tokio::time::timeout;

async fn bind_loopback() -> UdpSocket {
    UdpSocket::bind("127.0.0.1:0").await.unwrap()
}

fn test_config(port: u16, timeout_ms: u32) -> ClientConfig {
    ClientConfig {
        server_hostname: "127.0.0.1".to_string(),
        server_port: port,
        address_family: AddressFamily::Unspecified,
        rx_inactivity_timeout_ms: timeout_ms,
        ..Default::default()
    }
}

fn encode_data(block: u16, payload: &[u8]) -> BytesMut {
    let mut pkt = BytesMut::with_capacity(4 + payload.len());
    pkt.put_u16(Opcode::Data as u16);
    pkt.put_u16(block);
    pkt.put(payload);
    pkt
}

fn encode_ack(block: u16) -> BytesMut {
    let mut pkt = BytesMut::with_capacity(4);
    pkt.put_u16(Opcode::Ack as u16);
    pkt.put_u16(block);
    pkt
}

fn encode_err(code: ErrorCode, message: &str) -> BytesMut {
    let mut pkt = BytesMut::with_capacity(4 + message.len() + 1);
    pkt.put_u16(Opcode::Error as u16);
    pkt.put_u16(code as u16);
    pkt.put(message.as_bytes());
    pkt.put_u8(0);
    pkt
}

#[tokio::test]
async fn small_get_writes_file_and_completes() {
    let server = bind_loopback().await;
    let port = server.local_addr().unwrap().port();

    let server_task = tokio::spawn(async move {
        let mut buf = vec![0u8; 600];
        let (_, from) = server.recv_from(&mut buf).await.unwrap();
        server.send_to(&encode_data(1, b"hello"), from).await.unwrap();
    });

    let dir = tempdir().unwrap();
    let local_path = dir.path().join("out.bin");
    let client = TftpClient::new();
    client
        .get(Some(test_config(port, 2000)), &local_path, "f", TransferMode::Octet)
        .await
        .unwrap();

    server_task.await.unwrap();
    assert_eq!(std::fs::read(&local_path).unwrap(), b"hello");
}

#[tokio::test]
async fn duplicate_data_is_silently_dropped() {
    let server = bind_loopback().await;
    let port = server.local_addr().unwrap().port();
    let block_one = vec![0x5Au8; 512]; // a full block: not yet the terminal one

    let server_task = tokio::spawn(async move {
        let mut buf = vec![0u8; 600];
        let (_, from) = server.recv_from(&mut buf).await.unwrap();

        server.send_to(&encode_data(1, &block_one), from).await.unwrap();
        server.recv_from(&mut buf).await.unwrap();
        assert_eq!((&buf[2..4]).get_u16(), 1, "expected ACK(1)");

        // Redeliver block 1: the client must not re-ACK it, and must not
        // advance past expecting block 2.
        server.send_to(&encode_data(1, &block_one), from).await.unwrap();
        let no_extra_ack = timeout(Duration::from_millis(150), server.recv_from(&mut buf)).await;
        assert!(no_extra_ack.is_err(), "client must not ACK a duplicate block");

        // Deliver the real final (empty) block.
        server.send_to(&encode_data(2, b""), from).await.unwrap();
        server.recv_from(&mut buf).await.unwrap();
        assert_eq!((&buf[2..4]).get_u16(), 2, "expected ACK(2)");
    });

    let dir = tempdir().unwrap();
    let local_path = dir.path().join("out.bin");
    let client = TftpClient::new();
    client
        .get(Some(test_config(port, 2000)), &local_path, "f", TransferMode::Octet)
        .await
        .unwrap();

    server_task.await.unwrap();
    assert_eq!(std::fs::read(&local_path).unwrap().len(), 512);
}

#[tokio::test]
async fn timeout_exhausts_retries_then_fails() {
    let server = bind_loopback().await;
    let port = server.local_addr().unwrap().port();

    // Count retransmissions of the RRQ without ever answering.
    let server_task = tokio::spawn(async move {
        let mut buf = vec![0u8; 600];
        let mut count = 0;
        loop {
            match timeout(Duration::from_millis(500), server.recv_from(&mut buf)).await {
                Ok(Ok(_)) => count += 1,
                _ => break,
            }
        }
        count
    });

    let dir = tempdir().unwrap();
    let local_path = dir.path().join("out.bin");
    let client = TftpClient::new();
    let err = client
        .get(Some(test_config(port, 40)), &local_path, "f", TransferMode::Octet)
        .await
        .unwrap_err();

    assert!(matches!(err, TftpClientError::RxTimeout));
    let received = server_task.await.unwrap();
    // Initial RRQ plus MAX_TX_RETRY retransmissions.
    assert_eq!(received, 1 + tftp_client::MAX_TX_RETRY);
}

#[tokio::test]
async fn tid_latches_to_servers_ephemeral_port() {
    let welcome = bind_loopback().await;
    let welcome_port = welcome.local_addr().unwrap().port();

    let server_task = tokio::spawn(async move {
        let mut buf = vec![0u8; 600];
        let (_, client_addr) = welcome.recv_from(&mut buf).await.unwrap();

        let data_socket = bind_loopback().await;
        let block_one = vec![0x11u8; 512];
        data_socket.send_to(&encode_data(1, &block_one), client_addr).await.unwrap();
        let (_, from) = data_socket.recv_from(&mut buf).await.unwrap();
        assert_eq!((&buf[2..4]).get_u16(), 1);
        assert_eq!(from, client_addr);

        data_socket.send_to(&encode_data(2, b""), client_addr).await.unwrap();
        data_socket.recv_from(&mut buf).await.unwrap();

        // The welcome socket must never see another packet after the RRQ.
        let extra = timeout(Duration::from_millis(150), welcome.recv_from(&mut buf)).await;
        assert!(extra.is_err(), "client must address the latched TID, not the welcome port");
    });

    let dir = tempdir().unwrap();
    let local_path = dir.path().join("out.bin");
    let client = TftpClient::new();
    client
        .get(Some(test_config(welcome_port, 2000)), &local_path, "f", TransferMode::Octet)
        .await
        .unwrap();

    server_task.await.unwrap();
    assert_eq!(std::fs::read(&local_path).unwrap().len(), 512);
}

#[tokio::test]
async fn put_sends_terminal_empty_block() {
    let server = bind_loopback().await;
    let port = server.local_addr().unwrap().port();

    let server_task = tokio::spawn(async move {
        let mut buf = vec![0u8; 600];
        let (_, from) = server.recv_from(&mut buf).await.unwrap();
        server.send_to(&encode_ack(0), from).await.unwrap();

        for expected_block in [1u16, 2, 3] {
            let (n, _) = server.recv_from(&mut buf).await.unwrap();
            assert_eq!((&buf[2..4]).get_u16(), expected_block);
            let payload_len = n - 4;
            if expected_block == 3 {
                assert_eq!(payload_len, 0);
            } else {
                assert_eq!(payload_len, 512);
            }
            server.send_to(&encode_ack(expected_block), from).await.unwrap();
        }
    });

    let dir = tempdir().unwrap();
    let local_path = dir.path().join("in.bin");
    std::fs::write(&local_path, vec![0xABu8; 1024]).unwrap();

    let client = TftpClient::new();
    client
        .put(Some(test_config(port, 2000)), &local_path, "f", TransferMode::Octet)
        .await
        .unwrap();

    server_task.await.unwrap();
}

#[tokio::test]
async fn server_error_terminates_the_transfer() {
    let server = bind_loopback().await;
    let port = server.local_addr().unwrap().port();

    let server_task = tokio::spawn(async move {
        let mut buf = vec![0u8; 600];
        let (_, from) = server.recv_from(&mut buf).await.unwrap();
        server
            .send_to(&encode_err(ErrorCode::AccessViolation, "Access violation"), from)
            .await
            .unwrap();
    });

    let dir = tempdir().unwrap();
    let local_path = dir.path().join("in.bin");
    std::fs::write(&local_path, b"payload").unwrap();

    let client = TftpClient::new();
    let err = client
        .put(Some(test_config(port, 2000)), &local_path, "f", TransferMode::Octet)
        .await
        .unwrap_err();

    server_task.await.unwrap();
    match err {
        TftpClientError::ErrPacketReceived { code, message } => {
            assert_eq!(code, ErrorCode::AccessViolation as u16);
            assert_eq!(message, "Access violation");
        }
        other => panic!("expected ErrPacketReceived, got {other:?}"),
    }
}
