use lambda_http::{run, service_fn, tracing, Error};
mod config;
mod error;
mod http_handler;
mod upstream;
use config::ProxyConfig;
use http_handler::function_handler;
use upstream::HttpUpstream;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::init_default_subscriber();

    let upstream = HttpUpstream::new(reqwest::Client::new());

    // Credentials are read on every invocation, never cached here.
    run(service_fn(|event| {
        function_handler(ProxyConfig::from_env(), &upstream, event)
    }))
    .await
}
