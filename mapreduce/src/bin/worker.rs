use std::path::PathBuf;

fn identity_map(filename: &str, contents: &str) -> Vec<(String, String)> {
    contents
        .split_whitespace()
        .map(|word| (format!("{filename}:{word}"), "1".to_string()))
        .collect()
}

fn count_reduce(_key: &str, values: &[String]) -> String {
    values.len().to_string()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let addr = args
        .next()
        .unwrap_or_else(|| "127.0.0.1:7841".to_string());
    let work_dir = args.next().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));

    tracing::info!(%addr, ?work_dir, "worker starting");
    mapreduce::worker::run(addr, work_dir, identity_map, count_reduce).await?;
    tracing::info!("worker exiting");

    Ok(())
}
