use rusty_library_rental::{
    adapters::postgres::{
        PostgresBookRepository, PostgresBorrowingRepository, PostgresPaymentRepository,
        PostgresUserDirectory,
    },
    adapters::stripe::{StripeCheckoutGateway, StripeWebhookVerifier},
    adapters::telegram::TelegramMessageSender,
    api::{handlers::AppState, router::create_router},
    application::{
        ServiceDependencies,
        notification::{NotificationDispatcher, NotificationWorker, RetryPolicy},
        payment::RequestContext,
    },
    config::Config,
    scheduler::start_reminder_scheduler,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // .envがあれば読み込む（なくてもよい）
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rusty_library_rental=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("Invalid configuration");

    // Initialize database connection pool
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    // Initialize adapters
    let books = Arc::new(PostgresBookRepository::new(pool.clone()));
    let borrowings = Arc::new(PostgresBorrowingRepository::new(pool.clone()));
    let payments = Arc::new(PostgresPaymentRepository::new(pool.clone()));
    let users = Arc::new(PostgresUserDirectory::new(pool.clone()));
    let checkout_gateway = Arc::new(StripeCheckoutGateway::new(
        config.stripe_api_base.clone(),
        config.stripe_secret_key.clone(),
        config.payment_currency.clone(),
    ));
    let webhook_verifier = Arc::new(StripeWebhookVerifier::new(
        config.stripe_webhook_secret.clone(),
        config.webhook_tolerance_secs,
    ));
    let message_sender = Arc::new(
        TelegramMessageSender::new(&config.telegram_api_base, &config.telegram_bot_token)
            .expect("Invalid Telegram API base URL"),
    );

    // 通知キューとワーカー
    let (notifier, receiver) = NotificationDispatcher::channel(config.notify_queue_capacity);
    let worker = NotificationWorker::new(
        users.clone(),
        message_sender,
        RetryPolicy {
            max_attempts: config.notify_max_attempts,
            ..RetryPolicy::default()
        },
    );
    tokio::spawn(worker.run(receiver));

    // Create service dependencies
    let service_deps = ServiceDependencies {
        books,
        borrowings,
        payments,
        users,
        checkout_gateway,
        webhook_verifier,
        notifier,
        fine_policy: config.fine_policy,
    };

    // スケジューラーはサーバー終了まで保持する
    let _scheduler = start_reminder_scheduler(service_deps.clone(), &config.reminder_cron)
        .await
        .expect("Failed to start reminder scheduler");

    // Create application state
    let app_state = Arc::new(AppState {
        service_deps,
        public_base_url: config.public_base_url.clone().map(RequestContext::new),
    });

    // Create router
    let app = create_router(app_state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", addr);

    // Start server
    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
