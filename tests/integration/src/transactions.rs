//! Integration tests for MULTI/EXEC transactions.

use cinder_client::{Command, ReplyValue};

use crate::helpers::cluster;

#[tokio::test]
async fn transaction_commits_in_order() {
    let cluster = cluster(1).await;

    let mut batch = cluster.client.batch(true);
    batch
        .cmd(Command::new("SET").key("job").arg("queued"))
        .cmd(Command::new("INCR").key("jobs-started"))
        .cmd(Command::new("GET").key("job"));
    let results = batch.flush().await.unwrap();

    assert_eq!(results[0].as_status().unwrap(), "OK");
    assert_eq!(results[1].as_int().unwrap(), 1);
    assert_eq!(results[2].as_str().unwrap(), "queued");

    let node = &cluster.nodes[0];
    assert_eq!(
        node.log(),
        vec![
            vec!["MULTI"],
            vec!["SET", "job", "queued"],
            vec!["INCR", "jobs-started"],
            vec!["GET", "job"],
            vec!["EXEC"],
        ]
    );
    assert_eq!(node.value("job").unwrap().as_ref(), b"queued");
}

#[tokio::test]
async fn queue_rejection_aborts_the_transaction() {
    let cluster = cluster(1).await;
    let client = &cluster.client;

    client
        .execute(Command::new("SET").key("n").arg("5"))
        .await
        .unwrap();

    let mut batch = client.batch(true);
    batch
        .cmd(Command::new("INCR").key("n"))
        .cmd(Command::new("NOSUCHCMD").key("n"))
        .cmd(Command::new("INCR").key("n"));
    let results = batch.flush().await.unwrap();

    // the refused command keeps its own error, the rest share the abort
    assert!(
        matches!(&results[1], ReplyValue::Error(msg) if msg.contains("unknown command"))
    );
    assert!(matches!(&results[0], ReplyValue::Error(msg) if msg.contains("EXECABORT")));
    assert!(matches!(&results[2], ReplyValue::Error(msg) if msg.contains("EXECABORT")));

    // nothing executed, and the connection is still in step
    assert_eq!(cluster.nodes[0].value("n").unwrap().as_ref(), b"5");
    let reply = client.execute(Command::new("GET").key("n")).await.unwrap();
    assert_eq!(reply.as_str().unwrap(), "5");
}

#[tokio::test]
async fn discarded_batch_sends_nothing() {
    let cluster = cluster(1).await;

    let mut batch = cluster.client.batch(true);
    batch.cmd(Command::new("SET").key("ghost").arg("1"));
    batch.discard();

    assert!(cluster.nodes[0].log().is_empty());
    assert!(cluster.nodes[0].value("ghost").is_none());

    let reply = cluster.client.execute(Command::new("PING")).await.unwrap();
    assert_eq!(reply.as_status().unwrap(), "PONG");
}

#[tokio::test]
async fn empty_transaction_never_opens_multi() {
    let cluster = cluster(1).await;

    let results = cluster.client.batch(true).flush().await.unwrap();
    assert!(results.is_empty());
    assert!(cluster.nodes[0].log().is_empty());
}
