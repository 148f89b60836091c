use plant_rmq::{PlantClient, PlantConfig};
use serde_json::json;

#[tokio::test]
#[ignore] // Ignore by default as it requires a running RabbitMQ instance
async fn round_trip_through_rabbitmq() {
    let exchange = format!("plant-test-{}", uuid::Uuid::new_v4());
    let plant_id = format!("pump-{}", uuid::Uuid::new_v4());

    let pump = PlantClient::connect(PlantConfig::new(Some(plant_id.as_str()), &exchange))
        .await
        .expect("RabbitMQ should be reachable on localhost:5672");
    let commander = PlantClient::connect(PlantConfig::new(None, &exchange))
        .await
        .unwrap();

    let mut inbox = pump.messages().await.unwrap();
    let id = commander
        .start("prime", &plant_id, vec![json!(1)], Default::default(), None)
        .await
        .unwrap();

    let inbound = tokio::time::timeout(std::time::Duration::from_secs(5), inbox.next())
        .await
        .expect("command should arrive")
        .unwrap()
        .unwrap();
    assert_eq!(inbound.routing_key, plant_id);
    assert_eq!(inbound.message["id"], id.to_string());

    commander.close().await.unwrap();
    pump.close().await.unwrap();
}
