use tonic::transport::Server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:7840".to_string());

    tracing::info!(%addr, "kvsrv listening");
    Server::builder()
        .add_service(kvsrv::create_server())
        .serve(addr.parse()?)
        .await?;

    Ok(())
}
