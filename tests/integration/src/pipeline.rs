//! Integration tests for pipelined batches.

use cinder_client::{ClientError, Command, ReplyValue};

use crate::helpers::cluster;

#[tokio::test]
async fn pipeline_binds_replies_in_order() {
    let cluster = cluster(1).await;

    let mut batch = cluster.client.batch(false);
    batch
        .cmd(Command::new("SET").key("greeting").arg("hi"))
        .cmd(Command::new("INCR").key("hits"))
        .cmd(Command::new("INCR").key("hits"))
        .cmd(Command::new("ECHO").arg("tail"))
        .cmd(Command::new("GET").key("greeting"));
    assert_eq!(batch.len(), 5);

    let results = batch.flush().await.unwrap();
    assert_eq!(results[0].as_status().unwrap(), "OK");
    assert_eq!(results[1].as_int().unwrap(), 1);
    assert_eq!(results[2].as_int().unwrap(), 2);
    assert_eq!(results[3].as_str().unwrap(), "tail");
    assert_eq!(results[4].as_str().unwrap(), "hi");

    let node = &cluster.nodes[0];
    assert_eq!(
        node.log(),
        vec![
            vec!["SET", "greeting", "hi"],
            vec!["INCR", "hits"],
            vec!["INCR", "hits"],
            vec!["ECHO", "tail"],
            vec!["GET", "greeting"],
        ]
    );
    assert_eq!(node.connections(), 1, "one batch, one connection");
}

#[tokio::test]
async fn server_errors_bind_without_breaking_the_stream() {
    let cluster = cluster(1).await;
    let client = &cluster.client;

    client
        .execute(Command::new("SET").key("word").arg("abc"))
        .await
        .unwrap();

    let mut batch = client.batch(false);
    batch
        .cmd(Command::new("INCR").key("word"))
        .cmd(Command::new("GET").key("word"))
        .cmd(Command::new("DEL").key("word"));
    let results = batch.flush().await.unwrap();

    assert!(
        matches!(&results[0], ReplyValue::Error(msg) if msg.contains("not an integer")),
        "INCR on a non-number must fail in place, got {:?}",
        results[0]
    );
    assert_eq!(results[1].as_str().unwrap(), "abc");
    assert_eq!(results[2].as_int().unwrap(), 1);

    // the conversation stayed in step
    let reply = client.execute(Command::new("PING")).await.unwrap();
    assert_eq!(reply.as_status().unwrap(), "PONG");
}

#[tokio::test]
async fn empty_batch_never_touches_the_wire() {
    let cluster = cluster(2).await;

    let results = cluster.client.batch(false).flush().await.unwrap();
    assert!(results.is_empty());

    for node in &cluster.nodes {
        assert_eq!(node.connections(), 0);
    }
}

#[tokio::test]
async fn tagged_batch_runs_on_one_node() {
    let cluster = cluster(3).await;

    let mut batch = cluster.client.batch(false);
    batch
        .cmd(Command::new("SET").key("{cart:9}:item").arg("book"))
        .cmd(Command::new("SET").key("{cart:9}:qty").arg("2"));
    batch.flush().await.unwrap();

    let touched: Vec<_> = cluster
        .nodes
        .iter()
        .filter(|node| !node.log().is_empty())
        .collect();
    assert_eq!(touched.len(), 1);
    assert_eq!(touched[0].log().len(), 2);
}

#[tokio::test]
async fn cross_node_batch_is_rejected_before_send() {
    let cluster = cluster(2).await;
    let client = &cluster.client;

    let home = client.node_for_key("a0").unwrap().id();
    let mut far = None;
    for i in 1..200 {
        let candidate = format!("a{i}");
        if client.node_for_key(&candidate).unwrap().id() != home {
            far = Some(candidate);
            break;
        }
    }
    let far = far.expect("200 keys all landed on one node");

    let mut batch = client.batch(false);
    batch
        .cmd(Command::new("SET").key("a0").arg("1"))
        .cmd(Command::new("SET").key(far).arg("2"));
    assert!(matches!(
        batch.flush().await.unwrap_err(),
        ClientError::CrossNode
    ));

    for node in &cluster.nodes {
        assert!(node.log().is_empty(), "nothing may reach the wire");
    }
}
