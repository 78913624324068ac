use crate::channels::util::split_message;
use crate::commands::{Bot, ChatUser, IncomingMessage, UserDirectory};
use crate::error::BotError;
use async_trait::async_trait;
use serenity::all::{
    Client, Context, EventHandler, GatewayIntents, Http, Message, Ready, UserId,
};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Discord rejects messages longer than this many characters
const DISCORD_MESSAGE_LIMIT: usize = 2000;

/// Looks up usernames through the REST API
struct HttpDirectory {
    http: Arc<Http>,
}

#[async_trait]
impl UserDirectory for HttpDirectory {
    async fn username(&self, user_id: &str) -> Option<String> {
        let id = user_id.parse::<u64>().ok().filter(|id| *id != 0)?;
        match self.http.get_user(UserId::new(id)).await {
            Ok(user) => Some(user.name),
            Err(e) => {
                log::warn!("Discord: Failed to look up user {}: {}", user_id, e);
                None
            }
        }
    }
}

fn to_incoming(msg: &Message) -> IncomingMessage {
    // Direct messages have no guild; the channel is their isolation scope
    let community_id = match msg.guild_id {
        Some(guild_id) => guild_id.to_string(),
        None => msg.channel_id.to_string(),
    };

    IncomingMessage {
        community_id,
        author: ChatUser {
            id: msg.author.id.to_string(),
            name: msg.author.name.clone(),
        },
        content: msg.content.clone(),
        mentions: msg
            .mentions
            .iter()
            .map(|user| ChatUser {
                id: user.id.to_string(),
                name: user.name.clone(),
            })
            .collect(),
    }
}

struct DiscordHandler {
    bot: Arc<Bot>,
}

#[serenity::async_trait]
impl EventHandler for DiscordHandler {
    async fn message(&self, ctx: Context, msg: Message) {
        // Ignore messages from bots (including ourselves)
        if msg.author.bot || msg.content.is_empty() {
            return;
        }

        let incoming = to_incoming(&msg);
        let directory = HttpDirectory {
            http: ctx.http.clone(),
        };

        let Some(reply) = self.bot.handle(&incoming, &directory).await else {
            return;
        };

        for chunk in split_message(&reply, DISCORD_MESSAGE_LIMIT) {
            if let Err(e) = msg.channel_id.say(&ctx.http, &chunk).await {
                let err = BotError::Transport(e.to_string());
                log::error!("Discord: Failed to send reply in {}: {}", msg.channel_id, err);
            }
        }
    }

    async fn ready(&self, _ctx: Context, ready: Ready) {
        log::info!("Discord: Bot connected as {}", ready.user.name);
    }
}

/// Connect to the gateway and handle commands until `shutdown_rx` fires or
/// the client stops on its own.
pub async fn start_discord_listener(
    bot_token: &str,
    bot: Arc<Bot>,
    mut shutdown_rx: oneshot::Receiver<()>,
) -> Result<(), BotError> {
    log::info!("Starting Discord listener");

    // Message content is needed to read commands
    let intents = GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(bot_token, intents)
        .event_handler(DiscordHandler { bot })
        .await
        .map_err(|e| BotError::Transport(format!("Failed to create Discord client: {}", e)))?;

    log::info!("Discord: Client created successfully");

    let shard_manager = client.shard_manager.clone();

    tokio::select! {
        _ = &mut shutdown_rx => {
            log::info!("Discord: Received shutdown signal");
            shard_manager.shutdown_all().await;
        }
        result = client.start() => {
            match result {
                Ok(()) => log::info!("Discord: Client stopped"),
                Err(e) => {
                    let error = BotError::Transport(format!("Discord client error: {}", e));
                    log::error!("{}", error);
                    return Err(error);
                }
            }
        }
    }

    Ok(())
}
