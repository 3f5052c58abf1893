#[tokio::main]
async fn main() {
    if let Err(e) = rich_presence_manager::run().await {
        eprintln!("rich-presence-manager: {}", e);
        std::process::exit(1);
    }
}
