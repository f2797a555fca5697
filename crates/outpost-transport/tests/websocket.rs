//! Integration tests for the WebSocket transport.
//!
//! These spin up a real listener on an OS-assigned port and talk to it
//! with a plain `tokio-tungstenite` client, so records actually cross a
//! socket.

#[cfg(feature = "websocket")]
mod websocket {
    use futures_util::{SinkExt, StreamExt};
    use outpost_transport::{Connection, Transport, WebSocketConnection, WebSocketTransport};
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    async fn connect_client(addr: &str) -> ClientWs {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("client should connect");
        ws
    }

    async fn bind_any() -> (WebSocketTransport, String) {
        let transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("local addr").to_string();
        (transport, addr)
    }

    #[tokio::test]
    async fn test_websocket_accept_and_send_receive() {
        let (mut transport, addr) = bind_any().await;

        let server_handle =
            tokio::spawn(async move { transport.accept().await.expect("should accept") });

        let mut client_ws = connect_client(&addr).await;
        let server_conn = server_handle.await.expect("task should complete");

        assert!(server_conn.id().into_inner() > 0);
        assert!(server_conn.remote_addr().ip().is_loopback());

        // --- Server sends, client receives ---
        server_conn
            .send("Notification│hello from server")
            .await
            .expect("send should succeed");

        let msg = client_ws.next().await.unwrap().unwrap();
        assert_eq!(msg.into_text().unwrap().as_str(), "Notification│hello from server");

        // --- Client sends, server receives ---
        client_ws
            .send(Message::text("Ping│"))
            .await
            .unwrap();

        let received = server_conn
            .recv()
            .await
            .expect("recv should succeed")
            .expect("should have data");
        assert_eq!(received, "Ping│");

        server_conn.close().await.expect("close should succeed");
    }

    #[tokio::test]
    async fn test_websocket_recv_returns_none_on_client_close() {
        let (mut transport, addr) = bind_any().await;

        let server_handle =
            tokio::spawn(async move { transport.accept().await.expect("should accept") });

        let mut client_ws = connect_client(&addr).await;
        let server_conn = server_handle.await.unwrap();

        client_ws.send(Message::Close(None)).await.unwrap();

        let result = server_conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on client close");
    }

    #[tokio::test]
    async fn test_websocket_connect_round_trips_with_transport() {
        let (mut transport, addr) = bind_any().await;

        let server_handle =
            tokio::spawn(async move { transport.accept().await.expect("should accept") });

        let client = WebSocketConnection::connect(&addr)
            .await
            .expect("client should dial");
        let server_conn = server_handle.await.unwrap();

        assert_eq!(client.remote_addr().to_string(), addr);

        client.send("Connect│Bob│secret").await.unwrap();
        assert_eq!(
            server_conn.recv().await.unwrap().as_deref(),
            Some("Connect│Bob│secret")
        );

        server_conn.send("Promote│").await.unwrap();
        assert_eq!(client.recv().await.unwrap().as_deref(), Some("Promote│"));
    }

    #[tokio::test]
    async fn test_websocket_send_while_recv_pending_does_not_block() {
        let (mut transport, addr) = bind_any().await;

        let server_handle =
            tokio::spawn(async move { transport.accept().await.expect("should accept") });

        let mut client_ws = connect_client(&addr).await;
        let server_conn = std::sync::Arc::new(server_handle.await.unwrap());

        // Park a reader on the connection, then send from another task.
        let reader = {
            let conn = std::sync::Arc::clone(&server_conn);
            tokio::spawn(async move { conn.recv().await })
        };
        tokio::task::yield_now().await;

        tokio::time::timeout(
            std::time::Duration::from_secs(2),
            server_conn.send("Notification│while reading"),
        )
        .await
        .expect("send must not wait for the pending recv")
        .unwrap();

        let msg = client_ws.next().await.unwrap().unwrap();
        assert_eq!(msg.into_text().unwrap().as_str(), "Notification│while reading");

        client_ws.send(Message::Close(None)).await.unwrap();
        assert!(reader.await.unwrap().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_shutdown_releases_listener() {
        let (mut transport, addr) = bind_any().await;

        transport.shutdown().await.expect("first shutdown");

        assert!(matches!(
            transport.accept().await,
            Err(outpost_transport::TransportError::Shutdown)
        ));
        assert!(transport.local_addr().is_err());
        assert!(tokio::net::TcpStream::connect(&addr).await.is_err());
        assert!(transport.shutdown().await.is_err());
    }
}
