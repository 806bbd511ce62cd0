use std::sync::Arc;

use dotenvy::dotenv;
use stitch_store::adapters::{HttpFileStorage, HttpMailer, RazorpayClient};
use stitch_store::{build_server, create_pool, run_migrations, AppConfig};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = AppConfig::from_env().unwrap_or_else(|e| {
        eprintln!("configuration error: {e}");
        std::process::exit(1);
    });

    let pool = create_pool(&config.database_url);
    run_migrations(&pool);

    let gateway = Arc::new(RazorpayClient::new(
        &config.gateway_base_url,
        &config.gateway_key_id,
        &config.gateway_key_secret,
    ));
    let storage = Arc::new(HttpFileStorage::new(
        &config.storage_base_url,
        &config.storage_token,
    ));
    let mailer = Arc::new(HttpMailer::new(&config.mail_base_url, &config.mail_api_key));

    log::info!("Starting server at http://{}:{}", config.host, config.port);

    build_server(pool, config, gateway, storage, mailer)?.await
}
