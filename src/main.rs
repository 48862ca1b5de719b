mod app;
mod commands;
mod config;
mod db;
mod election;
mod handlers;
mod models;
mod notify;
mod store;

use app::AppState;
use config::Config;
use db::Database;
use election::SimulationSession;
use notify::Announcer;
use serenity::async_trait;
use serenity::model::application::command::Command;
use serenity::model::application::interaction::Interaction;
use serenity::model::gateway::Ready;
use serenity::prelude::*;
use std::sync::Arc;
use log::{info, error};

struct Bot {
    state: Arc<AppState>,
}

#[async_trait]
impl EventHandler for Bot {
    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let state = Arc::clone(&self.state);
        let ctx_clone = ctx.clone();

        // Engine calls serialize on the session lock, so spawning is safe.
        tokio::spawn(async move {
            handlers::handle_interaction(&state, &ctx_clone, interaction).await;
        });
    }

    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("{} is connected!", ready.user.name);

        let commands = Command::set_global_application_commands(&ctx.http, |commands_builder| {
            commands_builder
                .create_application_command(|command| commands::election::create_election_command(command))
                .create_application_command(|command| commands::voter::create_voter_command(command))
        })
        .await;

        if let Err(why) = commands {
            error!("Failed to register slash commands: {:?}", why);
        } else {
            info!("Successfully registered global slash commands.");
        }
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            return;
        }
    };

    let database = match Database::new(&config.database_url).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return;
        }
    };

    info!(
        "Simulating {} automatic voters per round{}",
        config.election.voter_count,
        match config.election.seed {
            Some(seed) => format!(" with seed {}", seed),
            None => String::new(),
        }
    );
    let session = SimulationSession::new(config.election);
    let announcer = Announcer::new(config.announce_channel);
    let state = Arc::new(AppState::new(database, session, announcer));

    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_INTEGRATIONS;

    let mut client = match Client::builder(&config.discord_token, intents)
        .event_handler(Bot { state })
        .await
    {
        Ok(client) => client,
        Err(why) => {
            error!("Err creating client: {:?}", why);
            return;
        }
    };

    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }
}
