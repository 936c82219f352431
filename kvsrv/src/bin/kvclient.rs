use kvsrv::Clerk;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    let addr = args.get(1).cloned().unwrap_or_else(|| "127.0.0.1:7840".to_string());
    let command = args.get(2).cloned().unwrap_or_else(|| "get".to_string());

    let clerk = Clerk::connect(&addr).await?;

    match command.as_str() {
        "get" => {
            let key = args.get(3).map(String::as_str).unwrap_or("");
            let value = clerk.get(key.as_bytes()).await;
            println!("{}", String::from_utf8_lossy(&value));
        }
        "put" => {
            let key = args.get(3).map(String::as_str).unwrap_or("");
            let value = args.get(4).map(String::as_str).unwrap_or("");
            clerk.put(key.as_bytes(), value.as_bytes()).await;
        }
        "append" => {
            let key = args.get(3).map(String::as_str).unwrap_or("");
            let value = args.get(4).map(String::as_str).unwrap_or("");
            let old = clerk.append(key.as_bytes(), value.as_bytes()).await;
            println!("old value: {}", String::from_utf8_lossy(&old));
        }
        other => {
            eprintln!("Unknown command: {}", other);
            eprintln!("Usage: {} <addr> <get|put|append> <key> [value]", args[0]);
            std::process::exit(1);
        }
    }

    Ok(())
}
