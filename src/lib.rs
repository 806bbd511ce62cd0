pub mod adapters;
pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod fulfilment;
pub mod handlers;
pub mod models;
pub mod schema;

use std::sync::Arc;

use actix_web::{middleware::Logger, web, App, HttpServer};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use adapters::{FileStorage, Mailer, PaymentGateway};
pub use config::AppConfig;
pub use db::{create_pool, DbPool};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Run any pending Diesel migrations against the pool's database.
pub fn run_migrations(pool: &DbPool) {
    let mut conn = pool.get().expect("Failed to get DB connection for migrations");
    conn.run_pending_migrations(MIGRATIONS)
        .expect("Failed to run database migrations");
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::orders::create_order,
        handlers::orders::list_orders,
        handlers::orders::pending_orders,
        handlers::orders::get_order,
        handlers::orders::update_order_status,
        handlers::orders::retry_order_email,
        handlers::payments::create_payment_order,
        handlers::payments::verify_payment,
        handlers::payments::payment_failure,
        handlers::payments::payment_status,
        handlers::payments::payment_history,
    ),
    tags(
        (name = "orders", description = "Checkout and order lifecycle"),
        (name = "payments", description = "Gateway orders, verification and history"),
        (name = "health", description = "Liveness"),
    )
)]
struct ApiDoc;

/// Build and return an actix-web `Server` bound to `config.host:config.port`.
///
/// The caller is responsible for `.await`-ing (or `tokio::spawn`-ing) the
/// returned server. Adapters are injected so tests can substitute doubles.
pub fn build_server(
    pool: DbPool,
    config: AppConfig,
    gateway: Arc<dyn PaymentGateway>,
    storage: Arc<dyn FileStorage>,
    mailer: Arc<dyn Mailer>,
) -> std::io::Result<actix_web::dev::Server> {
    let host = config.host.clone();
    let port = config.port;

    Ok(HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::from(gateway.clone()))
            .app_data(web::Data::from(storage.clone()))
            .app_data(web::Data::from(mailer.clone()))
            .wrap(Logger::default())
            .route("/health", web::get().to(handlers::health))
            .service(
                web::scope("/orders")
                    .route("", web::post().to(handlers::orders::create_order))
                    .route("", web::get().to(handlers::orders::list_orders))
                    .route("/pending", web::get().to(handlers::orders::pending_orders))
                    .route("/{order_ref}", web::get().to(handlers::orders::get_order))
                    .route(
                        "/{order_ref}/status",
                        web::put().to(handlers::orders::update_order_status),
                    )
                    .route(
                        "/{order_ref}/retry-email",
                        web::post().to(handlers::orders::retry_order_email),
                    ),
            )
            .service(
                web::scope("/payments")
                    .route(
                        "/order",
                        web::post().to(handlers::payments::create_payment_order),
                    )
                    .route("/verify", web::post().to(handlers::payments::verify_payment))
                    .route(
                        "/failure",
                        web::post().to(handlers::payments::payment_failure),
                    )
                    .route(
                        "/status/{order_ref}",
                        web::get().to(handlers::payments::payment_status),
                    )
                    .route(
                        "/history",
                        web::get().to(handlers::payments::payment_history),
                    ),
            )
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", ApiDoc::openapi()),
            )
    })
    .bind((host, port))?
    .run())
}
