#[tokio::main]
async fn main() {
    if let Err(e) = glass_pilot_lib::run().await {
        eprintln!("[STARTUP] Fatal: {}", e);
        std::process::exit(1);
    }
}
