use distrib_core::{Node, Protocol};
use distrib_loadbalance::{
    Distributor, DistributorSettings, LoadBalanceError, ProtocolHealthCheck, RoundRobinStrategy,
    TcpHealthCheck,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn create_test_settings() -> DistributorSettings {
    DistributorSettings {
        refresh_interval: Duration::from_secs(3600),
        probe_timeout: Duration::from_millis(500),
    }
}

/// 返回一个当前没有监听的本地端口
async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// 启动一个对所有请求返回固定状态码的HTTP服务
async fn spawn_http_server(status_line: &'static str) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                    status_line
                );
                let _ = stream.write_all(response.as_bytes()).await;
            });
        }
    });

    port
}

#[tokio::test]
async fn test_tcp_sweep_removes_closed_port() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let live_port = listener.local_addr().unwrap().port();
    let live = Node::new("127.0.0.1", live_port, 1);
    let dead = Node::new("127.0.0.1", closed_port().await, 5);

    let distributor = Distributor::new(
        vec![live.clone(), dead.clone()],
        Arc::new(RoundRobinStrategy::new()),
        Arc::new(TcpHealthCheck::new()),
        create_test_settings(),
    )
    .unwrap();

    // 乐观初始化：探测之前两个节点都在健康集合中
    assert_eq!(distributor.ok_nodes().len(), 2);

    distributor.refresh_now().await.unwrap();

    assert_eq!(distributor.ok_nodes().len(), 1);
    assert!(distributor.get_node_by_id(&dead.id()).is_none());
    for _ in 0..5 {
        assert_eq!(distributor.pick().unwrap(), live);
    }
    drop(listener);
}

#[tokio::test]
async fn test_protocol_dispatch_sweep() {
    let healthy_http = spawn_http_server("200 OK").await;
    let failing_http = spawn_http_server("503 Service Unavailable").await;
    let tcp_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let tcp_port = tcp_listener.local_addr().unwrap().port();

    let http_ok = Node::new("127.0.0.1", healthy_http, 3).with_protocol(Protocol::Http);
    let http_bad = Node::new("127.0.0.1", failing_http, 2).with_protocol(Protocol::Http);
    let tcp_ok = Node::new("127.0.0.1", tcp_port, 1);

    let health_check = ProtocolHealthCheck::new("/health", Duration::from_millis(500)).unwrap();
    let distributor = Distributor::new(
        vec![http_ok.clone(), http_bad.clone(), tcp_ok.clone()],
        Arc::new(RoundRobinStrategy::new()),
        Arc::new(health_check),
        create_test_settings(),
    )
    .unwrap();

    distributor.refresh_now().await.unwrap();

    let stats = distributor.node_stats();
    let healthy: Vec<bool> = stats.iter().map(|s| s.healthy).collect();
    assert_eq!(healthy, vec![true, false, true]);
    assert_eq!(stats[1].node, http_bad);
    drop(tcp_listener);
}

#[tokio::test]
async fn test_all_nodes_down_is_fatal() {
    let nodes = vec![
        Node::new("127.0.0.1", closed_port().await, 1),
        Node::new("127.0.0.1", closed_port().await, 1),
    ];

    let distributor = Distributor::new(
        nodes,
        Arc::new(RoundRobinStrategy::new()),
        Arc::new(TcpHealthCheck::new()),
        create_test_settings(),
    )
    .unwrap();

    let result = distributor.refresh_now().await;
    assert_eq!(result.unwrap_err(), LoadBalanceError::EmptyPool);
    assert!(distributor.pick().is_err());
}
