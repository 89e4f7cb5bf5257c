//! Example demonstrating subscription identity and context-bound delivery.

use std::sync::Arc;
use std::thread;

use multicast::{ContextRef, Handler, Registry, ThreadContext};

/// A sensor that notifies subscribers whenever it takes a reading.
#[derive(Debug, Default)]
struct Sensor {
    readings: Registry<Sensor, f32>,
}

impl Sensor {
    fn record(&self, value: f32) {
        self.readings.dispatch(self, &value);
    }
}

#[derive(Debug)]
struct Display {
    label: &'static str,
}

impl Display {
    fn on_reading(&self, _sensor: &Sensor, value: &f32) {
        println!(
            "[{}] reading {value:.1} on thread {:?}",
            self.label,
            thread::current().name().unwrap_or("<unnamed>")
        );
    }
}

fn log_reading(_sensor: &Sensor, value: &f32) {
    println!("log: {value:.1}");
}

fn main() {
    let sensor = Sensor::default();

    println!("=== Function subscriber ===");
    sensor.readings.add(&Handler::function(log_reading)).unwrap();
    sensor.record(20.5);

    println!("\n=== Same function added twice ===");
    sensor.readings.add(&Handler::function(log_reading)).unwrap();
    sensor.record(21.0);

    // Every registration needs its own removal.
    sensor.readings.remove(&Handler::function(log_reading)).unwrap();
    sensor.readings.remove(&Handler::function(log_reading)).unwrap();

    println!("\n=== Method subscriber on a dedicated thread ===");
    let display = Arc::new(Display { label: "panel" });
    let ui: ContextRef = Arc::new(ThreadContext::builder().name("ui").build());

    let on_reading = Handler::bound(&display, Display::on_reading);
    sensor.readings.add_on(&on_reading, &ui).unwrap();
    sensor.record(22.5);

    sensor.readings.remove_on(&on_reading, &ui).unwrap();
    println!("\nSubscribers left: {}", sensor.readings.len());
}
