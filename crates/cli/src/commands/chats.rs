//! `dataclaw chats`: Inspect or delete stored conversations.

use dataclaw_config::AppConfig;
use dataclaw_core::message::ConversationId;
use dataclaw_core::store::ConversationStore;
use dataclaw_memory::SqliteConversationStore;

async fn open(config: &AppConfig) -> Result<SqliteConversationStore, Box<dyn std::error::Error>> {
    Ok(SqliteConversationStore::new(&config.store.path.to_string_lossy()).await?)
}

pub async fn list(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = open(&config).await?;
    let ids = store.list_conversations().await?;

    if ids.is_empty() {
        println!("No conversations yet.");
        return Ok(());
    }
    for id in ids {
        let count = store.get_messages(&id).await?.len();
        println!("{id}  ({count} messages)");
    }
    Ok(())
}

pub async fn show(config: AppConfig, chat_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open(&config).await?;
    let messages = store
        .get_messages(&ConversationId(chat_id.to_string()))
        .await?;

    if messages.is_empty() {
        return Err(format!("No conversation with id {chat_id}").into());
    }
    for msg in messages {
        let scope = msg.scope.map(|s| format!(" [{s}]")).unwrap_or_default();
        println!("── {}{scope} · {}", msg.role, msg.created_at.format("%Y-%m-%d %H:%M:%S"));
        println!("{}\n", msg.content);
    }
    Ok(())
}

pub async fn delete(config: AppConfig, chat_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open(&config).await?;
    if store
        .delete_conversation(&ConversationId(chat_id.to_string()))
        .await?
    {
        println!("🗑  Deleted {chat_id}");
        Ok(())
    } else {
        Err(format!("No conversation with id {chat_id}").into())
    }
}

pub async fn clear(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = open(&config).await?;
    store.delete_all().await?;
    println!("🗑  All conversations deleted");
    Ok(())
}
