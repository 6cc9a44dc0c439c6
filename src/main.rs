use ::serenity::all::{ClientBuilder, Http};
use dotenv::dotenv;
use poise::serenity_prelude as serenity;
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use cadence::commands::{
    admins::mute::*,
    general::forget::*,
    music::{
        audio_sources::{TrackResolver, youtube::YtDlp},
        join::*,
        leave::*,
        pause::*,
        play::*,
        queue::*,
        resume::*,
        skip::*,
        stop::*,
        utils::{
            music_manager::{MusicManager, PlayerSettings},
            player_channel::SerenityChannel,
            voice_link::SongbirdConnector,
        },
        volume::*,
    },
};
use cadence::config::BotConfig;
use cadence::events::Handler;
use cadence::utils::database::Store;
use cadence::{Data, Error, help, register};

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize logging with debug level for our crate
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("cadence=debug,warn")),
        )
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_target(true)
        .with_ansi(true)
        .pretty()
        .init();

    dotenv().ok();

    let config = Arc::new(BotConfig::from_env()?);
    let store = Arc::new(Store::open(&config.database_path, config.history_turns)?);

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILD_VOICE_STATES;

    let songbird = Songbird::serenity();
    let http = Arc::new(Http::new(&config.discord_token));
    let music = MusicManager::new(
        Arc::new(SerenityChannel::new(http)),
        Arc::new(SongbirdConnector::new(songbird.clone(), reqwest::Client::new())),
        TrackResolver::new(Arc::new(YtDlp::new(
            config.ytdlp_path.clone(),
            config.max_playlist_entries,
        ))),
        PlayerSettings {
            default_volume: config.default_volume,
            idle_timeout: config.idle_timeout,
            control_timeout: config.control_timeout,
        },
    );

    let commands = vec![
        // Default commands
        register(),
        help(),
        // General commands
        forget(),
        // Admin commands
        mute(),
        unmute(),
        // Music commands
        join(),
        leave(),
        play(),
        pause(),
        resume(),
        skip(),
        stop(),
        queue(),
        volume(),
    ];

    let data = Data {
        music: music.clone(),
        store,
        config: config.clone(),
    };

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands,
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(config.command_prefix.clone()),
                ..Default::default()
            },
            // Muted channels only accept the commands that lift the mute
            command_check: Some(|ctx| {
                Box::pin(async move {
                    let muted = ctx.data().store.is_muted(ctx.channel_id());
                    Ok(!muted || ctx.command().category.as_deref() == Some("Admin"))
                })
            }),
            on_error: |error| {
                Box::pin(async move {
                    if let Err(e) = poise::builtins::on_error(error).await {
                        error!("Error while handling error: {}", e);
                    }
                })
            },
            ..Default::default()
        })
        .setup(|ctx, _ready, framework| {
            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                Ok(data)
            })
        })
        .build();

    let mut client = ClientBuilder::new(&config.discord_token, intents)
        .framework(framework)
        .event_handler(Handler {
            music: music.clone(),
        })
        .register_songbird_with(songbird)
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Could not listen for shutdown signal: {}", e);
            return;
        }
        info!("Shutting down");
        music.cleanup_all().await;
        shard_manager.shutdown_all().await;
    });

    client.start().await.map_err(Into::into)
}
