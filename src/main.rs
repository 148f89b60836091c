// A simulated plant: answers `start` commands on its plant id with
// `started`, some observations and `finished`.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use plant_rmq::{Envelope, MessageHandler, PlantClient, PlantConfig};
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

struct SimulatedPlant {
    completed: u64,
}

impl SimulatedPlant {
    async fn run(
        &mut self,
        plant: &PlantClient,
        message: &Value,
        function_name: &str,
        args: &[Value],
    ) -> plant_rmq::Result<()> {
        plant.started(message).await?;

        match function_name {
            "ping" => {
                let readings = [PlantClient::make_observation("pong", Value::from(args.to_vec()), None)];
                plant.observations(Some(message), &readings, None).await?;
            }
            "wait" => {
                let millis = args.first().and_then(Value::as_u64).unwrap_or(1000);
                tokio::time::sleep(Duration::from_millis(millis)).await;
            }
            other => {
                return plant
                    .failed(message, &format!("unknown function '{}'", other))
                    .await;
            }
        }

        self.completed += 1;
        let readings = [PlantClient::make_observation("completed", self.completed, None)];
        plant.observations(Some(message), &readings, None).await?;
        plant.finished(message).await
    }
}

#[async_trait]
impl MessageHandler for SimulatedPlant {
    async fn handle(
        &mut self,
        plant: &PlantClient,
        message: Value,
        routing_key: &str,
    ) -> plant_rmq::Result<()> {
        match Envelope::from_value(&message) {
            Ok(Envelope::Start { function_name, args, .. }) => {
                info!(function = %function_name, routing_key = %routing_key, "Received start");
                self.run(plant, &message, &function_name, &args).await
            }
            Ok(other) => {
                info!(state = other.state(), routing_key = %routing_key, "Ignoring message");
                Ok(())
            }
            Err(e) => {
                warn!(routing_key = %routing_key, "Not a plant message: {}", e);
                Ok(())
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = PlantConfig::from_env()?;
    let plant = PlantClient::connect(config).await?;

    plant
        .wait_for_messages(SimulatedPlant { completed: 0 })
        .await?;

    plant.close().await?;
    Ok(())
}
