use std::sync::Arc;

use chat_client::chat::ChatScreen;
use chat_client::gateway::FederatedIdentity;
use chat_client::observability::init_tracing;
use chat_client::{AppError, ChatApp, ClientConfig, MemoryGateway};

/// Scripted session against the in-memory backend: two accounts, one
/// message, logout. Prints each rendered screen as JSON.
#[tokio::main]
async fn main() -> Result<(), AppError> {
    init_tracing();

    let gateway = MemoryGateway::new().with_federated_identity(FederatedIdentity {
        email: "grace@example.com".into(),
        display_name: Some("Grace".into()),
        photo_url: None,
    });
    let app = ChatApp::new(Arc::new(gateway.clone()), ClientConfig::from_env());
    let auth = app.auth();

    let ada = auth.sign_up("ada@example.com", "analytical").await?;
    auth.sign_in_federated().await?;

    let roster = app.roster();
    let mut chat = app.chat_view();
    print_screen(&chat.screen())?;

    if let Some(peer) = roster.visible().into_iter().find(|u| u.id == ada.uid) {
        roster.select(&peer.id);
        chat.reconcile();
    }

    chat.input("Hello Ada").await;
    let outcome = chat.send().await;
    tracing::info!(component = "demo", ?outcome, "message sent");
    print_screen(&chat.screen())?;

    chat.logout().await;
    print_screen(&chat.screen())?;
    Ok(())
}

fn print_screen(screen: &ChatScreen) -> Result<(), AppError> {
    println!("{}", serde_json::to_string_pretty(screen)?);
    Ok(())
}
