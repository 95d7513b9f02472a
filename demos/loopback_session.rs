//! A complete OIS session between a host and a device over the in-memory
//! loopback transport, with the protocol's diagnostic stream printed
//! through `tracing`.
//!
//! Run with: `cargo run --example loopback_session`

use oiswire::{DeviceEndpoint, HostEndpoint, LoopbackTransport, NumericType, Value};

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let (host_end, device_end) = LoopbackTransport::pair();
    let mut host = HostEndpoint::new(Box::new(host_end), "panel", 1, "OisHub");
    let mut device = DeviceEndpoint::new(Box::new(device_end), "Panel Mk2", 1234, 5678);
    device.request_binary(true);

    device
        .register_input("GearLamp", 3, NumericType::Boolean)
        .unwrap();
    device
        .register_output("Heading", 12, NumericType::Fraction)
        .unwrap();
    device.register_event("GearToggle", 7).unwrap();

    // Handshake and catalog exchange settle within a few polls.
    for _ in 0..4 {
        device.poll();
        host.poll();
    }
    assert!(host.connected() && device.connected());
    println!(
        "connected to '{}' (pid {}, vid {}), {} inputs / {} outputs / {} events",
        host.device_name(),
        host.product_id(),
        host.vendor_id(),
        host.inputs().len(),
        host.outputs().len(),
        host.events().len()
    );

    // The simulator lights the gear lamp; the panel turns its heading knob
    // and presses the gear toggle.
    host.set_input(3, Value::Boolean(true));
    device.set_output(12, Value::Fraction(271.25));
    device.trigger_event(7);

    for _ in 0..2 {
        host.poll();
        device.poll();
    }

    println!("device sees GearLamp = {}", device.inputs()[0].value);
    println!("host sees Heading = {}", host.outputs()[0].value);
    host.pop_events(|event| println!("host received event '{}'", event.name));
}
