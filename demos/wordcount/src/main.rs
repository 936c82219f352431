//! Word count over a set of text files, built on `mapreduce`.
//!
//! `mapf` emits `(word, "1")` per token; `reducef` counts the values.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

fn mapf(_filename: &str, contents: &str) -> Vec<(String, String)> {
    contents
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(|word| (word.to_lowercase(), "1".to_string()))
        .collect()
}

fn reducef(_key: &str, values: &[String]) -> String {
    values.len().to_string()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let addr = args
        .get(1)
        .cloned()
        .unwrap_or_else(|| "127.0.0.1:7841".to_string());
    let mode = args.get(2).cloned().unwrap_or_else(|| "worker".to_string());

    match mode.as_str() {
        "coordinator" => {
            let n_reduce: u32 = args.get(3).unwrap_or(&"3".to_string()).parse()?;
            let input_files: Vec<PathBuf> = args[4..].iter().map(PathBuf::from).collect();
            if input_files.is_empty() {
                eprintln!("usage: {} <addr> coordinator <n_reduce> <input_file>...", args[0]);
                std::process::exit(1);
            }

            let socket_addr = addr.parse()?;
            let (registry, server) = mapreduce::create_server(input_files, n_reduce);
            println!("coordinator listening on {addr}");

            let serve_handle = tokio::spawn(async move {
                tonic::transport::Server::builder()
                    .add_service(server)
                    .serve(socket_addr)
                    .await
            });

            loop {
                if registry.done() {
                    println!("word count complete");
                    break;
                }
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            serve_handle.abort();
        }
        "worker" => {
            let work_dir = args.get(3).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
            println!("worker connecting to {addr}");
            mapreduce::worker::run(addr, work_dir, mapf, reducef).await?;
            println!("worker done");
        }
        other => {
            eprintln!("unknown mode: {other}");
            eprintln!("usage: {} <addr> <coordinator|worker> [args...]", args[0]);
            std::process::exit(1);
        }
    }

    Ok(())
}
