pub mod fake_resend;

use simplelog::{Config, LevelFilter, TestLogger};
use tokio::net::TcpListener;

pub fn setup_logging() {
    let _ = TestLogger::init(LevelFilter::Debug, Config::default());
}

pub async fn unused_local_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{address}/emails")
}
