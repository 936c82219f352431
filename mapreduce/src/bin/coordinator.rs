use std::path::PathBuf;
use std::time::Duration;

use tonic::transport::Server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let addr = args
        .next()
        .unwrap_or_else(|| "127.0.0.1:7841".to_string());
    let n_reduce: u32 = args
        .next()
        .ok_or("usage: coordinator <addr> <n_reduce> <input_file>...")?
        .parse()?;
    let input_files: Vec<PathBuf> = args.map(PathBuf::from).collect();
    if input_files.is_empty() {
        return Err("at least one input file is required".into());
    }

    let socket_addr = addr.parse()?;
    let (registry, server) = mapreduce::create_server(input_files, n_reduce);

    tracing::info!(%addr, n_reduce, "coordinator listening");
    let serve_handle =
        tokio::spawn(async move { Server::builder().add_service(server).serve(socket_addr).await });

    loop {
        if registry.done() {
            tracing::info!("job complete, shutting down");
            break;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    serve_handle.abort();
    Ok(())
}
