use std::net::SocketAddr;

use sqlx::postgres::PgPoolOptions;

use povarnya_sdk::api::routes::routes;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&database_url)
        .await
        .expect("Failed to connect to database");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let addr: SocketAddr = std::env::var("BIND_ADDR")
        .unwrap_or_else(|_| String::from("0.0.0.0:8080"))
        .parse()
        .expect("Invalid BIND_ADDR");

    log::info!("listening on {addr}");
    warp::serve(routes(pool)).run(addr).await;
}
