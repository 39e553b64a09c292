use std::{path::PathBuf, sync::Arc};

use aliri_clock::DurationSecs;
use apigee_reqwest::ServiceAccountAuthentication;
use apigee_tokens::{credential::ServiceAccountCredential, InMemoryTokenStorage};
use clap::Parser;
use reqwest_middleware::ClientBuilder;

#[derive(Debug, Parser)]
struct Opts {
    /// The service account JSON key file
    #[clap(short, long, env = "GOOGLE_APPLICATION_CREDENTIALS")]
    key_file: PathBuf,

    /// The Apigee organization to query
    #[clap(short, long, env = "APIGEE_ORGANIZATION")]
    organization: String,

    /// The base URL of the management API
    #[clap(
        long,
        env = "APIGEE_MANAGEMENT_URL",
        default_value = "https://apigee.googleapis.com/v1/"
    )]
    management_url: reqwest::Url,

    /// How many times to list the proxies
    #[clap(short, long, default_value_t = 3)]
    repeat: u32,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    dotenvy::dotenv().ok();
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .pretty()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();

    let credential = ServiceAccountCredential::from_key_file(&opts.key_file).await?;
    tracing::info!(?credential, "loaded service account");

    let storage = Arc::new(InMemoryTokenStorage::new().with_leeway(DurationSecs(60)));

    let client = ClientBuilder::new(reqwest::Client::builder().https_only(true).build()?)
        .with(ServiceAccountAuthentication::new(credential, storage).with_single_flight())
        .build();

    let url = opts
        .management_url
        .join(&format!("organizations/{}/apis", opts.organization))?;

    for _ in 0..opts.repeat {
        let resp = client.get(url.clone()).send().await?;
        let status = resp.status();
        let body: serde_json::Value = resp.json().await?;

        tracing::info!(status = status.as_u16(), %body, "listed API proxies");
    }

    Ok(())
}
