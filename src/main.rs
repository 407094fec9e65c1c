#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = cognitive_classifier::run().await {
        eprintln!("cognitive-classifier fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
