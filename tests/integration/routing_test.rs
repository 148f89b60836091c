use plant_rmq::plant::Inbox;
use plant_rmq::rabbitmq::{MemoryExchange, JSON_CONTENT_TYPE};
use plant_rmq::{PlantClient, PlantConfig};
use serde_json::json;

async fn drain(mut inbox: Inbox) -> Vec<(serde_json::Value, String)> {
    let mut received = Vec::new();
    while let Some(next) = inbox.next().await {
        let inbound = next.expect("delivery should decode");
        received.push((inbound.message, inbound.routing_key));
    }
    received
}

#[tokio::test]
async fn subscribed_keys_reach_the_plant_queue() {
    let exchange = MemoryExchange::new();
    let plant = PlantClient::with_broker(
        Box::new(exchange.connect()),
        PlantConfig::new(Some("pump"), "factory"),
    )
    .await
    .unwrap();
    plant.subscribe(["observations", "alarms"]).await.unwrap();

    for key in ["pump", "observations", "alarms", "valve"] {
        exchange.publish(key, serde_json::to_vec(&json!({"key": key})).unwrap(), JSON_CONTENT_TYPE);
    }
    let inbox = plant.messages().await.unwrap();
    plant.close().await.unwrap();

    let keys: Vec<String> = drain(inbox).await.into_iter().map(|(_, key)| key).collect();
    assert_eq!(keys, vec!["pump", "observations", "alarms"]);
}

#[tokio::test]
async fn commands_only_reach_their_target() {
    let exchange = MemoryExchange::new();
    let commander = PlantClient::with_broker(
        Box::new(exchange.connect()),
        PlantConfig::new(None, "factory"),
    )
    .await
    .unwrap();
    let pump = PlantClient::with_broker(
        Box::new(exchange.connect()),
        PlantConfig::new(Some("pump"), "factory"),
    )
    .await
    .unwrap();
    let valve = PlantClient::with_broker(
        Box::new(exchange.connect()),
        PlantConfig::new(Some("valve"), "factory"),
    )
    .await
    .unwrap();

    commander
        .start("open", "valve", vec![json!(90)], Default::default(), None)
        .await
        .unwrap();

    let pump_inbox = pump.messages().await.unwrap();
    let valve_inbox = valve.messages().await.unwrap();
    pump.close().await.unwrap();
    valve.close().await.unwrap();

    assert!(drain(pump_inbox).await.is_empty());
    let valve_messages = drain(valve_inbox).await;
    assert_eq!(valve_messages.len(), 1);
    let (message, key) = &valve_messages[0];
    assert_eq!(key, "valve");
    assert_eq!(message["function-name"], "open");
    assert_eq!(message["args"], json!([90]));
}
