use actix_web::{web, App, HttpServer};
use dotenv::dotenv;
use platescanner_server::auth::handlers as auth;
use platescanner_server::{health_check, AppError, AppState, Settings};
use std::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[actix_web::main]
async fn main() -> platescanner_server::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    // Load configuration
    let config = Settings::new()?;
    info!("Configuration loaded successfully ({})", config.environment);

    info!("Starting server at {}:{}", config.server.host, config.server.port);

    // Initialize application state
    let state = AppState::new(config.clone()).await?;
    let state = web::Data::new(state);

    let listener = TcpListener::bind(format!("{}:{}", config.server.host, config.server.port))?;

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .route("/health", web::get().to(health_check))
            .service(
                web::scope("/api/auth")
                    .route("/signup", web::post().to(auth::signup))
                    .route("/verify", web::get().to(auth::verify_email))
                    .route("/login", web::post().to(auth::login))
                    .route("/logout", web::post().to(auth::logout))
                    .route("/refresh", web::post().to(auth::refresh))
                    .route("/forgot", web::post().to(auth::forgot_password))
                    .route("/forgot-code", web::post().to(auth::forgot_code))
                    .route("/verify-code", web::post().to(auth::verify_code))
                    .route("/reset-with-token", web::post().to(auth::reset_password))
                    .route("/reset", web::post().to(auth::reset_password))
                    .route("/check", web::get().to(auth::check)),
            )
    })
    .listen(listener)?
    .workers(config.server.workers as usize)
    .run()
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(())
}
