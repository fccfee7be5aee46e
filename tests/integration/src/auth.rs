//! Integration tests for authentication and database selection.

use cinder_client::{Client, ClientError, Command, NodeConfig, ReplyValue};

use crate::helpers::{fast_config, TestNode};

#[tokio::test]
async fn password_flows_before_the_first_command() {
    let node = TestNode::start_with_password("sesame").await;
    let mut config = fast_config(&[node.addr()]);
    config.nodes = vec![NodeConfig::new(node.addr()).password("sesame")];
    let client = Client::new(config).unwrap();

    let reply = client
        .execute(Command::new("SET").key("k").arg("v"))
        .await
        .unwrap();
    assert_eq!(reply.as_status().unwrap(), "OK");
    let reply = client.execute(Command::new("GET").key("k")).await.unwrap();
    assert_eq!(reply.as_str().unwrap(), "v");

    // one connection, authenticated exactly once
    assert_eq!(node.connections(), 1);
    assert_eq!(
        node.log(),
        vec![
            vec!["AUTH", "sesame"],
            vec!["SET", "k", "v"],
            vec!["GET", "k"],
        ]
    );
}

#[tokio::test]
async fn wrong_password_fails_the_checkout() {
    let node = TestNode::start_with_password("right").await;
    let mut config = fast_config(&[node.addr()]);
    config.nodes = vec![NodeConfig::new(node.addr()).password("wrong")];
    let client = Client::new(config).unwrap();

    match client.execute(Command::new("PING")).await.unwrap_err() {
        ClientError::Auth(msg) => assert!(msg.contains("WRONGPASS")),
        other => panic!("expected Auth, got {other:?}"),
    }

    // a refused credential is not a dead node
    assert!(client.nodes()[0].is_alive());
}

#[tokio::test]
async fn missing_credential_surfaces_the_servers_error() {
    let node = TestNode::start_with_password("sesame").await;
    let client = Client::new(fast_config(&[node.addr()])).unwrap();

    // no password configured, so nothing is injected and the server's
    // rejection comes back as an ordinary result
    let reply = client
        .execute(Command::new("SET").key("k").arg("v"))
        .await
        .unwrap();
    match reply {
        ReplyValue::Error(msg) => assert!(msg.contains("NOAUTH")),
        other => panic!("expected an error reply, got {other:?}"),
    }
    assert!(client.nodes()[0].is_alive());
}

#[tokio::test]
async fn select_runs_once_per_connection() {
    let node = TestNode::start().await;
    let mut config = fast_config(&[node.addr()]);
    config.database = 2;
    let client = Client::new(config).unwrap();

    client
        .execute(Command::new("SET").key("k").arg("v"))
        .await
        .unwrap();
    client.execute(Command::new("GET").key("k")).await.unwrap();

    assert_eq!(node.connections(), 1);
    assert_eq!(
        node.log(),
        vec![
            vec!["SELECT", "2"],
            vec!["SET", "k", "v"],
            vec!["GET", "k"],
        ]
    );
}

#[tokio::test]
async fn injected_frames_precede_the_transaction() {
    let node = TestNode::start_with_password("sesame").await;
    let mut config = fast_config(&[node.addr()]);
    config.nodes = vec![NodeConfig::new(node.addr()).password("sesame")];
    config.database = 1;
    let client = Client::new(config).unwrap();

    let mut batch = client.batch(true);
    batch.cmd(Command::new("INCR").key("serial"));
    let results = batch.flush().await.unwrap();
    assert_eq!(results[0].as_int().unwrap(), 1);

    assert_eq!(
        node.log(),
        vec![
            vec!["AUTH", "sesame"],
            vec!["SELECT", "1"],
            vec!["MULTI"],
            vec!["INCR", "serial"],
            vec!["EXEC"],
        ]
    );
}
