use flagsync::{Client, Event};
use log::kv::Key;
use log::{Level, LevelFilter, Log, Metadata, Record};
use tokio::sync::broadcast::error::RecvError;

#[tokio::main]
async fn main() {
    // Info level logging shows the live update channel lifecycle.
    // Use the Warning level to avoid too detailed logging in your application.
    log::set_max_level(LevelFilter::Info);
    log::set_logger(&PrintLog {}).unwrap();

    let client = Client::builder()
        .base_url("https://flags.example.com")
        .api_key("#YOUR-API-KEY#")
        .project_id("#YOUR-PROJECT-ID#")
        .toggle_id("#YOUR-TOGGLE-ID#")
        .on_event(|event| println!("event: {event:?}"))
        .build()
        .unwrap();
    let mut events = client.subscribe();

    client.initialize().await.unwrap();
    for (name, state) in client.snapshot() {
        println!("{name}: {state}");
    }

    client.listen_for_updates().unwrap();
    loop {
        match events.recv().await {
            Ok(Event::FlagUpdated { name, state }) => println!("{name} changed to {state}"),
            Ok(Event::Disconnected) => println!("live updates disconnected"),
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => println!("{skipped} events were skipped"),
            Err(RecvError::Closed) => break,
        }
    }
}

// Example log implementation.
pub struct PrintLog {}

impl Log for PrintLog {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level() && metadata.target().contains("flagsync")
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let level = match record.level() {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        };
        match record.key_values().get(Key::from("event_id")) {
            Some(event_id) => println!("{level} [{event_id}] {}", record.args()),
            None => println!("{level} {}", record.args()),
        }
    }

    fn flush(&self) {}
}
