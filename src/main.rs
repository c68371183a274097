//! TimeSked Telegram Bot
//!
//! Main application entry point

use std::sync::Arc;

use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, Update};
use teloxide::utils::command::BotCommands;
use tracing::{error, info, warn};

use TimeSked::{
    config::Settings,
    database::{connection::{create_pool, run_migrations, PoolConfig}, DatabaseService},
    handlers::{handle_callback, handle_command, handle_message, CallbackInput, CallbackReply, Command, InboundMessage},
    services::ServiceFactory,
    state::AppContext,
    utils::logging,
    web,
};

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Load configuration
    let settings = Settings::new()?;
    settings.validate()?;

    // Initialize logging
    let _log_guard = logging::init_logging(&settings.logging)?;

    info!("Starting {}...", TimeSked::info());

    // Initialize database connection
    info!("Connecting to database...");
    let db_pool = create_pool(&PoolConfig::from(&settings.database)).await?;
    run_migrations(&db_pool).await?;
    let database_service = DatabaseService::new(db_pool);

    // Initialize bot
    let bot = Bot::new(&settings.bot.token);

    // Initialize services
    info!("Initializing services...");
    let services = ServiceFactory::new(bot.clone(), &settings)?;
    let health = services.health_check().await;
    if !health.is_healthy() {
        for issue in health.get_issues() {
            warn!(issue = %issue, "Service health issue");
        }
    }

    let ctx = AppContext::from_factory(services, Arc::new(database_service), settings);

    // OAuth callback and dashboard counters
    let web_ctx = ctx.clone();
    tokio::spawn(async move {
        if let Err(e) = web::serve(web_ctx).await {
            error!(error = %e, "Web server stopped");
        }
    });

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!(error = %e, "Failed to register bot commands");
    }

    let mut dispatcher = Dispatcher::builder(bot, create_handler())
        .dependencies(dptree::deps![ctx])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.kind);
        })
        .enable_ctrlc_handler()
        .build();

    info!("TimeSked bot is ready, starting polling...");
    dispatcher.dispatch().await;

    info!("TimeSked bot has been shut down.");
    Ok(())
}

/// Create the main update handler
fn create_handler() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
    dptree::entry()
        .branch(
            Update::filter_message()
                .branch(dptree::entry().filter_command::<Command>().endpoint(handle_commands))
                .branch(dptree::endpoint(handle_messages)),
        )
        .branch(Update::filter_callback_query().endpoint(handle_callbacks))
}

/// Handle bot commands
async fn handle_commands(msg: Message, cmd: Command, ctx: AppContext) -> HandlerResult {
    let inbound = InboundMessage::from_telegram(&msg)?;
    let chat_id = inbound.chat_id;

    if let Err(e) = handle_command(&ctx, inbound, cmd).await {
        if e.is_recoverable() {
            warn!(chat_id = chat_id, error = %e, "Error handling command");
        } else {
            error!(chat_id = chat_id, error = %e, severity = %e.severity(), "Error handling command");
        }
        return Err(e.into());
    }
    Ok(())
}

/// Handle regular messages
async fn handle_messages(msg: Message, ctx: AppContext) -> HandlerResult {
    let inbound = InboundMessage::from_telegram(&msg)?;
    let chat_id = inbound.chat_id;

    if let Err(e) = handle_message(&ctx, inbound).await {
        if e.is_recoverable() {
            warn!(chat_id = chat_id, error = %e, "Error handling message");
        } else {
            error!(chat_id = chat_id, error = %e, severity = %e.severity(), "Error handling message");
        }
        return Err(e.into());
    }
    Ok(())
}

/// Handle callback queries, answering each one with the handler's reply
async fn handle_callbacks(bot: Bot, query: CallbackQuery, ctx: AppContext) -> HandlerResult {
    let reply = match (query.data.clone(), query.message.as_ref()) {
        (Some(data), Some(message)) => {
            let input = CallbackInput {
                chat_id: message.chat().id.0,
                message_id: message.id().0,
                message_text: message.regular_message().and_then(|m| m.text()).map(str::to_string),
                data,
            };
            match handle_callback(&ctx, input).await {
                Ok(reply) => reply,
                Err(e) => {
                    error!(error = %e, callback_id = %query.id, "Error handling callback query");
                    CallbackReply::silent()
                }
            }
        }
        _ => {
            warn!(callback_id = %query.id, "Callback query without data or message");
            CallbackReply::silent()
        }
    };

    let mut answer = bot.answer_callback_query(query.id.clone());
    if let Some(text) = reply.text {
        answer = answer.text(text).show_alert(reply.alert);
    }
    if let Err(e) = answer.await {
        warn!(error = %e, callback_id = %query.id, "Failed to answer callback query");
    }
    Ok(())
}
