#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = codular_rust::run().await {
        eprintln!("codular-rust fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
