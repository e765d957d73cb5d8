use confreg_api::app::services::PaymentConfig;

#[tokio::main]
async fn main() {
    confreg_observability::init();

    let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
        tracing::warn!("JWT_SECRET not set; using insecure dev default");
        "dev-secret".to_string()
    });

    let client_key = std::env::var("PAYMENT_CLIENT_KEY").unwrap_or_else(|_| {
        tracing::warn!("PAYMENT_CLIENT_KEY not set; using dev default");
        "dev-client-key".to_string()
    });
    let callback_base = std::env::var("CALLBACK_BASE_URL").unwrap_or_else(|_| {
        tracing::warn!("CALLBACK_BASE_URL not set; using http://localhost:8080/");
        "http://localhost:8080/".to_string()
    });

    let app = confreg_api::app::build_app(
        jwt_secret,
        PaymentConfig {
            client_key,
            callback_base,
        },
    );

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080")
        .await
        .expect("failed to bind 0.0.0.0:8080");

    tracing::info!("listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}
