use serenity::Client;
use serenity::all::GatewayIntents;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

mod clock;
mod config;
mod interval;
mod logging;
mod store;
mod tracker;
mod voice_tracker;
use crate::clock::SystemClock;
use crate::config::Config;
use crate::store::dynamo::{self, DynamoHistorySink, DynamoSessionStore};
use crate::tracker::PresenceTracker;
use crate::voice_tracker::{PresenceTrackerKey, VoiceHandler};

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    logging::init("info");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let dynamo_client = dynamo::connect(config.aws_region.as_deref()).await;
    let tracker = PresenceTracker::new(
        config.work_channel_id,
        Arc::new(DynamoSessionStore::new(dynamo_client.clone(), &config.session_table)),
        Arc::new(DynamoHistorySink::new(dynamo_client, &config.history_table)),
        Arc::new(SystemClock::new(config.timezone)),
        config.roster.clone(),
    );

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MEMBERS;

    let mut client = match Client::builder(&config.discord_token, intents)
        .event_handler(VoiceHandler)
        .type_map_insert::<PresenceTrackerKey>(Arc::new(tracker))
        .await
    {
        Ok(client) => client,
        Err(e) => {
            error!(error = ?e, "failed to build the gateway client");
            return ExitCode::FAILURE;
        }
    };

    info!(
        channel = config.work_channel_id,
        sessions = %config.session_table,
        history = %config.history_table,
        timezone = %config.timezone,
        "starting bot"
    );

    if let Err(why) = client.start().await {
        error!(error = ?why, "client error");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
