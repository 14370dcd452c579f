use tracing::metadata::LevelFilter;
use tracing_subscriber::EnvFilter;

pub fn setup_tracing(level: Option<LevelFilter>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(
            level
                .map(|l| l.to_string())
                .unwrap_or_else(|| "info".to_string()),
        )
    });
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(filter)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set global subscriber");

    env_logger::init();
}
