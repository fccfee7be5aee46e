//! Integration tests for key routing across nodes.

use cinder_client::{ClientError, Command};

use crate::helpers::cluster;

#[tokio::test]
async fn every_key_lands_where_the_router_says() {
    let cluster = cluster(3).await;
    let client = &cluster.client;

    for i in 0..30 {
        let key = format!("user:{i}");
        let reply = client
            .execute(Command::new("SET").key(key.clone()).arg(format!("v{i}")))
            .await
            .unwrap();
        assert_eq!(reply.as_status().unwrap(), "OK");

        // the keyspace of the node the router names holds the value
        let home = client.node_for_key(&key).unwrap();
        let node = cluster
            .nodes
            .iter()
            .find(|node| node.addr() == home.addr())
            .unwrap();
        assert_eq!(node.value(&key).unwrap().as_ref(), format!("v{i}").as_bytes());
    }

    for i in 0..30 {
        let reply = client
            .execute(Command::new("GET").key(format!("user:{i}")))
            .await
            .unwrap();
        assert_eq!(reply.as_str().unwrap(), format!("v{i}"));
    }

    let touched = cluster
        .nodes
        .iter()
        .filter(|node| !node.log().is_empty())
        .count();
    assert!(touched > 1, "30 keys all landed on a single node");
}

#[tokio::test]
async fn hash_tags_pin_related_keys_together() {
    let cluster = cluster(3).await;
    let client = &cluster.client;

    let status = "{order:77}:status";
    let total = "{order:77}:total";
    assert_eq!(
        client.node_for_key(status).unwrap().id(),
        client.node_for_key(total).unwrap().id(),
    );

    // multi-key commands are legal because the tag co-locates the keys
    let reply = client
        .execute(
            Command::new("MSET")
                .key(status)
                .arg("open")
                .key(total)
                .arg("12.50"),
        )
        .await
        .unwrap();
    assert_eq!(reply.as_status().unwrap(), "OK");

    let values = client
        .execute(Command::new("MGET").key(status).key(total))
        .await
        .unwrap()
        .into_vec()
        .unwrap();
    assert_eq!(values[0].as_str().unwrap(), "open");
    assert_eq!(values[1].as_str().unwrap(), "12.50");

    let owners = cluster
        .nodes
        .iter()
        .filter(|node| node.value(status).is_some() || node.value(total).is_some())
        .count();
    assert_eq!(owners, 1, "tagged keys split across nodes");
}

#[tokio::test]
async fn keyless_commands_use_a_stable_node() {
    let cluster = cluster(3).await;

    for _ in 0..5 {
        let reply = cluster.client.execute(Command::new("PING")).await.unwrap();
        assert_eq!(reply.as_status().unwrap(), "PONG");
    }

    let pinged = cluster
        .nodes
        .iter()
        .filter(|node| node.log().iter().any(|frame| frame[0] == "PING"))
        .count();
    assert_eq!(pinged, 1, "keyless traffic should stick to one node");
}

#[tokio::test]
async fn open_hash_tag_is_a_usage_error() {
    let cluster = cluster(2).await;

    let err = cluster
        .client
        .execute(Command::new("GET").key("{order:9"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::UnterminatedKeyTag(_)));

    // raised during routing, before any node is dialed
    for node in &cluster.nodes {
        assert!(node.log().is_empty());
    }
}
