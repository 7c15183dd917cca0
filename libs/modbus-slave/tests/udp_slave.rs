//! UDP slave: transaction correlation and loopback exchange
#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

mod common;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use common::{mbap_frame, RegisterBank};
use modbus_slave::port::{MockDatagramHandle, MockDatagramSocket};
use modbus_slave::{CloseHandle, SlaveState, SlaveStats, UdpPort, UdpSlave};
use tokio::net::UdpSocket;

async fn wait_for_sent(handle: &MockDatagramHandle, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while handle.sent().await.len() < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_responses_follow_their_transaction_ids() {
    let bank = RegisterBank::new(vec![0x000A, 0x000B, 0x000C]);
    let (socket, handle) = MockDatagramSocket::new();
    let first: SocketAddr = "10.0.0.1:5020".parse().unwrap();
    let second: SocketAddr = "10.0.0.2:5020".parse().unwrap();

    let mut slave = UdpSlave::new(1, socket, bank.clone());
    let server = tokio::spawn(async move {
        slave.listen().await.unwrap();
        slave.state()
    });

    // Transaction 2 overtakes transaction 1 on the wire
    handle
        .push_datagram(mbap_frame(2, &[0x01, 0x03, 0x00, 0x01, 0x00, 0x01]), second)
        .await;
    handle
        .push_datagram(mbap_frame(1, &[0x01, 0x03, 0x00, 0x00, 0x00, 0x01]), first)
        .await;
    wait_for_sent(&handle, 2).await;
    handle.close().await;

    assert_eq!(server.await.unwrap(), SlaveState::Terminated);
    assert_eq!(
        handle.sent().await,
        vec![
            (mbap_frame(2, &[0x01, 0x03, 0x02, 0x00, 0x0B]), second),
            (mbap_frame(1, &[0x01, 0x03, 0x02, 0x00, 0x0A]), first),
        ]
    );
}

#[tokio::test]
async fn test_bad_datagrams_do_not_stop_the_slave() {
    let bank = RegisterBank::new(vec![0x000A]);
    let stats = Arc::new(SlaveStats::new());
    let (socket, handle) = MockDatagramSocket::new();
    let peer: SocketAddr = "10.0.0.9:502".parse().unwrap();

    let mut slave = UdpSlave::new(1, socket, bank.clone()).with_observer(stats.clone());
    let server = tokio::spawn(async move { slave.listen().await });

    // Protocol id 1 is not Modbus
    let mut foreign = mbap_frame(3, &[0x01, 0x03, 0x00, 0x00, 0x00, 0x01]);
    foreign[3] = 0x01;
    handle.push_datagram(foreign, peer).await;
    handle.push_datagram(vec![0x00, 0x01, 0x00], peer).await;
    handle
        .push_datagram(mbap_frame(4, &[0x02, 0x03, 0x00, 0x00, 0x00, 0x01]), peer)
        .await;
    handle
        .push_datagram(mbap_frame(5, &[0x01, 0x03, 0x00, 0x00, 0x00, 0x01]), peer)
        .await;
    wait_for_sent(&handle, 1).await;
    handle.close().await;
    server.await.unwrap().unwrap();

    assert_eq!(
        handle.sent().await,
        vec![(mbap_frame(5, &[0x01, 0x03, 0x02, 0x00, 0x0A]), peer)]
    );
    assert_eq!(bank.calls(), 1);

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.requests_ignored, 1);
    assert_eq!(snapshot.decode_errors, 2);
    assert_eq!(snapshot.responses_sent, 1);
    assert_eq!(snapshot.terminations, 1);
}

#[tokio::test]
async fn test_loopback_exchange() {
    let bank = RegisterBank::new(vec![0x000A, 0x000B]);
    let close = CloseHandle::new();
    let port = UdpPort::bind("127.0.0.1:0", close.clone()).await.unwrap();
    let addr = port.local_addr().unwrap();

    let mut slave = UdpSlave::new(1, port, bank);
    let server = tokio::spawn(async move { slave.listen().await });

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client
        .send_to(&mbap_frame(0x0A0B, &[0x01, 0x06, 0x00, 0x01, 0x12, 0x34]), addr)
        .await
        .unwrap();

    let mut buf = [0u8; 64];
    let (len, from) = tokio::time::timeout(Duration::from_secs(5), client.recv_from(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(from, addr);
    assert_eq!(
        buf[..len].to_vec(),
        mbap_frame(0x0A0B, &[0x01, 0x06, 0x00, 0x01, 0x12, 0x34])
    );

    close.close();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}
