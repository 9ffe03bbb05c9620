#[tokio::main]
async fn main() {
    let code = eventpipe::app::startup::startup().await;
    log::logger().flush();
    std::process::exit(code);
}
