use async_trait::async_trait;
use plant_rmq::rabbitmq::MemoryExchange;
use plant_rmq::{Envelope, FinishReason, MessageHandler, MessageId, PlantClient, PlantConfig};
use serde_json::{json, Value};
use tokio::sync::oneshot;

/// Runs `prime`, refuses anything else.
struct Pump;

#[async_trait]
impl MessageHandler for Pump {
    async fn handle(
        &mut self,
        plant: &PlantClient,
        message: Value,
        _routing_key: &str,
    ) -> plant_rmq::Result<()> {
        let Envelope::Start { function_name, .. } = Envelope::from_value(&message)? else {
            return Ok(());
        };

        plant.started(&message).await?;
        if function_name == "prime" {
            let readings = [PlantClient::make_observation("pressure", 2.5, None)];
            plant.observations(Some(&message), &readings, None).await?;
            plant.finished(&message).await
        } else {
            plant.failed(&message, "not supported").await
        }
    }
}

async fn connect(exchange: &MemoryExchange, plant_id: Option<&str>) -> PlantClient {
    PlantClient::with_broker(
        Box::new(exchange.connect()),
        PlantConfig::new(plant_id, "factory"),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn start_is_answered_through_observations() {
    let exchange = MemoryExchange::new();
    let commander = connect(&exchange, None).await;
    commander.subscribe(["observations"]).await.unwrap();
    let pump = connect(&exchange, Some("pump")).await;

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let pump_loop = pump.wait_for_messages_until(Pump, async {
        let _ = stop_rx.await;
    });

    let conversation = async {
        let mut inbox = commander.messages().await.unwrap();
        let prime = commander
            .start("prime", "pump", vec![], Default::default(), None)
            .await
            .unwrap();
        let purge = commander
            .start("purge", "pump", vec![], Default::default(), None)
            .await
            .unwrap();

        let mut replies = Vec::new();
        while replies.len() < 5 {
            let inbound = inbox.next().await.unwrap().unwrap();
            assert_eq!(inbound.routing_key, "observations");
            replies.push(Envelope::from_value(&inbound.message).unwrap());
        }
        let _ = stop_tx.send(());
        (prime, purge, replies)
    };

    let (loop_result, (prime, purge, replies)) = tokio::join!(pump_loop, conversation);
    loop_result.unwrap();

    assert_eq!(prime, MessageId::from("id-1"));
    assert_eq!(purge, MessageId::from("id-2"));

    let states: Vec<&str> = replies.iter().map(Envelope::state).collect();
    assert_eq!(
        states,
        vec!["started", "observations", "finished", "started", "finished"]
    );
    assert!(replies.iter().all(|r| r.plant_id() == Some("pump")));
    assert_eq!(replies[1].id(), Some(&prime));

    match &replies[2] {
        Envelope::Finished { id, reason, .. } => {
            assert_eq!(id, &prime);
            assert_eq!(reason, &FinishReason::Success);
        }
        other => panic!("expected finished, got {:?}", other),
    }
    match &replies[4] {
        Envelope::Finished { id, reason, .. } => {
            assert_eq!(id, &purge);
            assert_eq!(
                reason,
                &FinishReason::Failed {
                    failed_reason: Some("not supported".to_string())
                }
            );
        }
        other => panic!("expected finished, got {:?}", other),
    }
}

#[tokio::test]
async fn observations_stamp_missing_timestamps() {
    let exchange = MemoryExchange::new();
    let sensor = connect(&exchange, Some("thermo")).await;
    let readings = vec![
        PlantClient::make_observation("temp", 21.5, None),
        PlantClient::make_observation("humidity", 40, Some(1000.0)),
    ];

    sensor.observations(None, &readings, Some(2000.0)).await.unwrap();

    let body = exchange.published()[0].json().unwrap();
    assert_eq!(
        body,
        json!({
            "state": "observations",
            "plant-id": "thermo",
            "timestamp": 2000.0,
            "observations": [
                {"field": "temp", "value": 21.5, "timestamp": 2000.0},
                {"field": "humidity", "value": 40, "timestamp": 1000.0}
            ]
        })
    );
    assert_eq!(readings[0].timestamp, None);
}
