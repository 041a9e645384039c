//! Example: Poll the gateway and print device status changes.

use std::sync::Arc;

use ajax_gateway_bridge::{BridgeEvent, Coordinator, DeviceStatusFlags, GatewayConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = GatewayConfig::builder()
        .email("user@example.com")
        .password("secret")
        .hub_id(Some("00A1B2C3".to_string()))
        .build();

    let coordinator = Arc::new(Coordinator::setup(config).await?);
    let mut events = coordinator.subscribe();

    let poller = Arc::clone(&coordinator);
    let poll_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(poller.scan_interval());
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let _ = poller.refresh().await;
        }
    });

    println!("Listening for device events (Ctrl+C to stop)...\n");

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(BridgeEvent::DeviceStatusChanged { device_id, new, changed, .. }) => {
                        println!("Device {} status changed:", device_id);
                        for e in DeviceStatusFlags::set_event_names(changed, new) {
                            println!("  + {}", e);
                        }
                        for e in DeviceStatusFlags::unset_event_names(changed, new) {
                            println!("  - {}", e);
                        }
                    }
                    Ok(BridgeEvent::HubArmStateChanged { old, new }) => {
                        println!("Hub arm state: {:?} -> {:?}", old, new);
                    }
                    Ok(BridgeEvent::SnapshotUpdated) => {}
                    Ok(event) => {
                        println!("Event: {:?}", event);
                    }
                    Err(e) => {
                        println!("Event channel error: {}", e);
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nStopping...");
                break;
            }
        }
    }

    poll_task.abort();
    Ok(())
}
