#[tokio::main]
async fn main() {
    if let Err(e) = floatball_lib::run().await {
        eprintln!("floatball: {}", e);
        std::process::exit(1);
    }
}
