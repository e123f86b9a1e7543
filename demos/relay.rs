//! # Example: relay
//!
//! A sensor publishes temperature events; a relay turns hot readings into
//! actions; an actuator consumes the actions. Runs until Ctrl-C / SIGTERM.
//!
//! ## Flow
//! ```text
//! sensor ──publish(Sensor/Reading)──► EventService ──► relay
//!                                                        │ temp > 25
//!                                                        ▼
//! actuator ◄──────────────── ActionService ◄──trigger(Fan/Start)
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=messagebus=debug,relay=info cargo run --example relay
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use messagebus::{
    Action, ActionType, Config, Event, EventService, EventType, MessageBus, Message,
};
use tracing_subscriber::EnvFilter;

fn sensor(events: Arc<EventService>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if events.wait_until_running().await.is_err() {
            return;
        }
        let mut tick = tokio::time::interval(Duration::from_millis(700));
        for temp in [21, 24, 27, 30, 26, 22].into_iter().cycle() {
            tick.tick().await;
            let reading = Event::new("Sensor", "Reading").with_property("celsius", temp.to_string());
            if let Err(err) = events.publish(reading) {
                tracing::info!(error = %err, "sensor stopping");
                return;
            }
        }
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let bus = MessageBus::in_memory(Config {
        heartbeat_interval: Duration::from_secs(3),
        ..Config::default()
    });
    bus.events()
        .register_type(EventType::new("Sensor", "Reading").with_property_type("celsius"))?;
    bus.actions()
        .register_type(ActionType::new("Fan", "Start").with_property_type("reason"))?;

    let runner = tokio::spawn({
        let bus = bus.clone();
        async move { bus.run_until_signal().await }
    });
    bus.wait_until_running().await?;

    let mut readings = bus.events().subscribe("Sensor", &["Reading"])?;
    let mut commands = bus.actions().subscribe::<&str>("Fan", &[])?;
    sensor(Arc::clone(bus.events()));

    let relay = tokio::spawn({
        let actions = Arc::clone(bus.actions());
        async move {
            while let Some(ev) = readings.next().await {
                if ev.is_heartbeat() {
                    tracing::debug!("relay heartbeat");
                    continue;
                }
                let celsius: i32 = ev
                    .properties
                    .iter()
                    .find(|p| p.name == "celsius")
                    .and_then(|p| p.value.parse().ok())
                    .unwrap_or_default();
                tracing::info!(celsius, "reading");
                if celsius > 25 {
                    let start = Action::new("Fan", "Start").with_property("reason", format!("{celsius}C"));
                    let _ = actions.trigger(start);
                }
            }
            tracing::info!("relay: event stream closed");
        }
    });

    let actuator = tokio::spawn(async move {
        while let Some(act) = commands.next().await {
            if act.is_heartbeat() {
                continue;
            }
            let reason = act.properties.first().map(|p| p.value.as_str()).unwrap_or("-");
            tracing::info!(reason, "fan started");
        }
        tracing::info!("actuator: action stream closed");
    });

    runner.await??;
    relay.await?;
    actuator.await?;

    let (events, actions) = (bus.events().stats(), bus.actions().stats());
    tracing::info!(?events, ?actions, "bus stopped");
    Ok(())
}
