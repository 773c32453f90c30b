use identity::in_memory::{self, InteractiveOutcome};
use identity::Identity;
use log::{error, info};
use secrecy::SecretString;
use service::{config::Config, logging::Logger};
use session::{Error, Manager, Settings};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config as &Config);

    info!(
        "Starting session demo (default display name [{}])...",
        config.default_display_name()
    );

    let provider = Arc::new(in_memory::Provider::new());
    let storage = Arc::new(in_memory::Storage::new());
    provider.queue_interactive(InteractiveOutcome::SignIn(
        Identity::new("google-demo", "zed@example.com").with_display_name("Zed"),
    ));

    let manager = Manager::new(provider, storage.clone(), Settings::from(&config));

    if let Err(e) = run(&manager).await {
        error!("Session demo failed: {e}");
        manager.shutdown().await;
        std::process::exit(1);
    }

    manager.shutdown().await;
    info!("Session demo finished with {} profile records", storage.len());
}

async fn run(manager: &Manager) -> Result<(), Error> {
    manager.initialize()?;
    let mut handle = manager.handle()?;
    let mut gate = handle.gate();

    let session = gate.ready().await?;
    info!("Session resolved (signed in: {})", session.is_authenticated());

    let password = SecretString::new("correct horse battery staple".to_string());
    let ada = manager.sign_up("ada@example.com", &password, "Ada").await?;
    info!(
        "Signed up {} as {:?}",
        ada.uid,
        handle.session()?.display_name()
    );

    manager.logout().await?;
    handle.wait_for(|session| session.identity.is_none()).await?;
    info!("Signed out");

    let identity = manager.sign_in("ada@example.com", &password).await?;
    let session = handle
        .wait_for(|session| {
            session
                .identity
                .as_ref()
                .is_some_and(|current| current.uid == identity.uid)
        })
        .await?;
    info!("Signed back in as {:?}", session.display_name());

    manager.logout().await?;
    let identity = manager.sign_in_with_google().await?;
    info!("Signed in with Google as {}", identity.uid);

    match manager.sign_in_with_google().await {
        Ok(identity) => info!("Unexpected second Google sign-in for {}", identity.uid),
        Err(e) => info!("Second Google sign-in rejected: {e}"),
    }

    Ok(())
}
