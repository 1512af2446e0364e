//! A real `ArtNetNode` bound to loopback, broadcasting to itself: exercises
//! the wire codec and the node's inbound dispatch end to end (the node
//! always listens for `ArtDmx`, including its own broadcast traffic, so a
//! single bound socket is enough to prove send → encode → decode → event
//! without needing two processes on the same fixed Art-Net port).

use std::net::Ipv4Addr;
use std::time::Duration;

use dmxd_artnet::{ArtNetEvent, ArtNetNode, NodeConfig};
use dmxd_core::DmxBuffer;

fn loopback_config() -> NodeConfig {
    let mut config = NodeConfig::default();
    config.bind_address = Ipv4Addr::LOCALHOST;
    config.use_limited_broadcast_address = true;
    config
}

#[tokio::test]
async fn dmx_broadcast_is_decoded_and_dispatched_on_the_matching_universe() {
    let (node, mut events) = ArtNetNode::bind(loopback_config()).await.unwrap();
    node.set_output_port_universe(0, 0, 7).unwrap();
    node.set_input_port_universe(1, 0, 7).unwrap();
    node.spawn_receive_loop();

    node.send_dmx(0, &DmxBuffer::from_slice(&[10, 20, 30])).await.unwrap();

    let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("event channel timed out")
        .expect("event channel closed");

    match event {
        ArtNetEvent::Dmx { data, port_id, .. } => {
            assert_eq!(data.get(), &[10, 20, 30]);
            assert_eq!(port_id, 1);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn dmx_on_a_different_universe_is_not_delivered() {
    let (node, mut events) = ArtNetNode::bind(loopback_config()).await.unwrap();
    node.set_output_port_universe(0, 0, 7).unwrap();
    node.set_input_port_universe(1, 0, 9).unwrap();
    node.spawn_receive_loop();

    node.send_dmx(0, &DmxBuffer::from_slice(&[1, 2, 3])).await.unwrap();

    let result = tokio::time::timeout(Duration::from_millis(200), events.recv()).await;
    assert!(result.is_err(), "no event should have arrived for a non-matching universe");
}
