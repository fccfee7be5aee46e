//! Integration tests for push-style traffic over a raw connection.
//!
//! Subscriptions hold a socket indefinitely, so they run outside the
//! pool: the test drives [`cinder_client::Connection::read_reply`]
//! directly while pooled traffic continues beside it.

use cinder_client::Command;

use crate::helpers::cluster;

#[tokio::test]
async fn raw_connection_receives_pushed_messages() {
    let cluster = cluster(1).await;
    let client = &cluster.client;

    let mut raw = client.raw_connection(&client.nodes()[0]).await.unwrap();
    let subscribe = Command::new("SUBSCRIBE").arg("events");
    raw.send([&subscribe]).await.unwrap();

    let ack = raw.read_reply().await.unwrap().into_vec().unwrap();
    assert_eq!(ack[0].as_str().unwrap(), "subscribe");
    assert_eq!(ack[1].as_str().unwrap(), "events");
    assert_eq!(ack[2].as_int().unwrap(), 1);

    // publish over pooled traffic while the raw connection listens
    let receivers = client
        .execute(Command::new("PUBLISH").arg("events").arg("deploy-done"))
        .await
        .unwrap();
    assert_eq!(receivers.as_int().unwrap(), 1);

    let push = raw.read_reply().await.unwrap().into_vec().unwrap();
    assert_eq!(push[0].as_str().unwrap(), "message");
    assert_eq!(push[1].as_str().unwrap(), "events");
    assert_eq!(push[2].as_str().unwrap(), "deploy-done");
}

#[tokio::test]
async fn publishes_reach_only_matching_channels() {
    let cluster = cluster(1).await;
    let client = &cluster.client;

    let mut raw = client.raw_connection(&client.nodes()[0]).await.unwrap();
    let subscribe = Command::new("SUBSCRIBE").arg("alpha");
    raw.send([&subscribe]).await.unwrap();
    raw.read_reply().await.unwrap();

    let receivers = client
        .execute(Command::new("PUBLISH").arg("beta").arg("stray"))
        .await
        .unwrap();
    assert_eq!(receivers.as_int().unwrap(), 0);

    let receivers = client
        .execute(Command::new("PUBLISH").arg("alpha").arg("wanted"))
        .await
        .unwrap();
    assert_eq!(receivers.as_int().unwrap(), 1);

    // the only push waiting is the matching one
    let push = raw.read_reply().await.unwrap().into_vec().unwrap();
    assert_eq!(push[1].as_str().unwrap(), "alpha");
    assert_eq!(push[2].as_str().unwrap(), "wanted");
}
