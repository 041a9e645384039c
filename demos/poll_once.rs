//! Example: Log in, fetch one snapshot and print every entity's state.

use ajax_gateway_bridge::{build_entities, Coordinator, GatewayConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = GatewayConfig::builder()
        .email("user@example.com")
        .password("secret")
        .build();

    let coordinator = Coordinator::setup(config).await?;
    let snapshot = coordinator.snapshot().await;

    println!("Hub: {} ({})", coordinator.hub().name, coordinator.hub_id());
    println!("Arm state: {:?}\n", snapshot.hub_arm_state());

    for entity in build_entities(&snapshot) {
        println!(
            "{:<22} {:<40} {}",
            entity.component(),
            entity.unique_id(),
            entity.state(&snapshot).as_deref().unwrap_or("unknown")
        );
    }

    Ok(())
}
