//! Loopback tests for the UDP and TCP transports

use std::net::SocketAddr;
use std::time::Duration;

use serial_test::serial;
use strata_sip_core::helpers::{generate_branch, make_response};
use strata_sip_core::{
    CSeq, HeaderFieldValue, HeaderName, Method, SipMessage, StatusCode, TransportType, Uri, Via,
};
use strata_sip_transport::{bind_tcp, bind_udp, Transport, TransportEvent};
use tokio::sync::mpsc;
use tokio::time::timeout;

fn loopback() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

fn options(transport: &str) -> SipMessage {
    let mut msg = SipMessage::new_request(Method::Options, Uri::sip("127.0.0.1").with_user("bob"));
    msg.push_via(Via::new(transport, "127.0.0.1", Some(5060)).with_branch(generate_branch()));
    msg.append_header(HeaderName::From, HeaderFieldValue::text_value("<sip:alice@127.0.0.1>;tag=1"));
    msg.append_header(HeaderName::To, HeaderFieldValue::text_value("<sip:bob@127.0.0.1>"));
    msg.append_header(HeaderName::CallId, HeaderFieldValue::text_value("loopback-test"));
    msg.append_header(HeaderName::CSeq, HeaderFieldValue::new(CSeq::new(1, Method::Options)));
    msg.update_content_length();
    msg
}

async fn next_message(rx: &mut mpsc::Receiver<TransportEvent>) -> (SipMessage, strata_sip_core::Tuple) {
    loop {
        let event = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for a message")
            .expect("event channel closed");
        if let TransportEvent::MessageReceived { message, source, .. } = event {
            return (message, source);
        }
    }
}

#[tokio::test]
#[serial]
async fn udp_send_and_receive() {
    let (server, mut server_rx) = bind_udp(loopback()).await.unwrap();
    let (client, _client_rx) = bind_udp(loopback()).await.unwrap();

    client
        .send_message(options("UDP"), server.local_addr().unwrap())
        .await
        .unwrap();

    let (message, source) = next_message(&mut server_rx).await;
    assert_eq!(message.method(), Some(&Method::Options));
    assert_eq!(source.transport, TransportType::Udp);
    assert_eq!(source.addr, client.local_addr().unwrap());
    assert!(message.is_external());
    // sent-by host matches the source address
    assert_eq!(message.top_via().unwrap().received(), None);

    client.close().await.unwrap();
    server.close().await.unwrap();
    assert!(server.is_closed());
}

#[tokio::test]
#[serial]
async fn tcp_request_and_response_share_connection() {
    let (server, mut server_rx) = bind_tcp(loopback()).await.unwrap();
    let (client, mut client_rx) = bind_tcp(loopback()).await.unwrap();
    let server_addr = server.local_addr().unwrap();

    client.send_message(options("TCP"), server_addr).await.unwrap();
    let (request, source) = next_message(&mut server_rx).await;
    assert_eq!(source.transport, TransportType::Tcp);
    assert_eq!(request.call_id().unwrap(), "loopback-test");
    assert_eq!(client.connection_count(), 1);

    // the response goes back over the accepted connection
    let response = make_response(&request, StatusCode::OK, None).unwrap();
    server.send_message(response, source.addr).await.unwrap();
    let (response, from) = next_message(&mut client_rx).await;
    assert_eq!(response.status(), Some(StatusCode::OK));
    assert_eq!(from.addr, server_addr);
    assert_eq!(server.connection_count(), 1);
    assert_eq!(client.connection_count(), 1);

    // everything is idle for at least zero seconds
    assert_eq!(client.gc(Duration::ZERO), 1);
    assert_eq!(client.connection_count(), 0);

    client.close().await.unwrap();
    server.close().await.unwrap();
}

#[tokio::test]
#[serial]
async fn tcp_reconnects_after_peer_hangs_up() {
    let (server, mut server_rx) = bind_tcp(loopback()).await.unwrap();
    let (client, mut client_rx) = bind_tcp(loopback()).await.unwrap();
    let server_addr = server.local_addr().unwrap();

    client.send_message(options("TCP"), server_addr).await.unwrap();
    next_message(&mut server_rx).await;

    // server drops its side; the client notices and forgets the connection
    assert_eq!(server.gc(Duration::ZERO), 1);
    let closed = timeout(Duration::from_secs(5), async {
        while let Some(event) = client_rx.recv().await {
            if let TransportEvent::ConnectionClosed { tuple } = event {
                return Some(tuple);
            }
        }
        None
    })
    .await
    .unwrap();
    assert_eq!(closed.unwrap().addr, server_addr);
    assert_eq!(client.connection_count(), 0);

    client.send_message(options("TCP"), server_addr).await.unwrap();
    let (request, _) = next_message(&mut server_rx).await;
    assert_eq!(request.method(), Some(&Method::Options));
    assert_eq!(client.connection_count(), 1);

    client.close().await.unwrap();
    server.close().await.unwrap();
}

#[tokio::test]
#[serial]
async fn tcp_connect_refusal_is_reported() {
    let port = {
        let listener = tokio::net::TcpListener::bind(loopback()).await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let target: SocketAddr = ([127, 0, 0, 1], port).into();
    let (client, mut client_rx) = bind_tcp(loopback()).await.unwrap();

    // the socket opens, the connect fails later
    client.send_message(options("TCP"), target).await.unwrap();
    let failed = timeout(Duration::from_secs(5), async {
        while let Some(event) = client_rx.recv().await {
            if let TransportEvent::ConnectionFailed { tuple, .. } = event {
                return Some(tuple);
            }
        }
        None
    })
    .await
    .unwrap();
    assert_eq!(failed.unwrap().addr, target);
    assert_eq!(client.connection_count(), 0);

    client.close().await.unwrap();
}

#[tokio::test]
#[serial]
async fn tcp_garbage_closes_connection() {
    use tokio::io::AsyncWriteExt;

    let (server, mut server_rx) = bind_tcp(loopback()).await.unwrap();
    let mut stream = tokio::net::TcpStream::connect(server.local_addr().unwrap())
        .await
        .unwrap();
    stream.write_all(b"INVITE sip:a@b SIP/2.0\rX\r\n\r\n").await.unwrap();

    let closed = timeout(Duration::from_secs(5), async {
        while let Some(event) = server_rx.recv().await {
            if let TransportEvent::ConnectionClosed { tuple } = event {
                return Some(tuple);
            }
        }
        None
    })
    .await
    .unwrap();
    assert_eq!(closed.unwrap().addr, stream.local_addr().unwrap());
    assert_eq!(server.connection_count(), 0);

    server.close().await.unwrap();
}
