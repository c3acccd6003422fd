use anyhow::Result;
use migration::{Migrator, MigratorTrait};
use std::sync::Arc;
use teloxide::{dispatching::UpdateHandler, prelude::*};

mod commands;
mod jobs;
mod services;
mod state;

use crate::commands::{
    handle_addposition, handle_addsignal, handle_banuser, handle_bestpairs, handle_broadcast,
    handle_callback, handle_dashboard, handle_delsignal, handle_help, handle_history,
    handle_invalid, handle_livestream, handle_myalerts, handle_myportfolio, handle_mysub,
    handle_price, handle_removealert, handle_removeposition, handle_revenuereport,
    handle_setalert, handle_signals, handle_signalstats, handle_start, handle_stats,
    handle_stopstream, handle_subscribe, handle_unbanuser, handle_userinfo, handle_vipgrant,
    handle_vipsignals, Command,
};
use crate::state::AppState;

fn schema() -> UpdateHandler<anyhow::Error> {
    use dptree::case;

    let command_handler = teloxide::filter_command::<Command, _>()
        .branch(case![Command::Start].endpoint(handle_start))
        .branch(case![Command::Help].endpoint(handle_help))
        .branch(case![Command::Price(symbol)].endpoint(handle_price))
        .branch(case![Command::History(args)].endpoint(handle_history))
        .branch(case![Command::Signals].endpoint(handle_signals))
        .branch(case![Command::VipSignals].endpoint(handle_vipsignals))
        .branch(case![Command::Subscribe].endpoint(handle_subscribe))
        .branch(case![Command::MySub].endpoint(handle_mysub))
        .branch(case![Command::Livestream(args)].endpoint(handle_livestream))
        .branch(case![Command::StopStream].endpoint(handle_stopstream))
        .branch(case![Command::AddPosition(args)].endpoint(handle_addposition))
        .branch(case![Command::MyPortfolio].endpoint(handle_myportfolio))
        .branch(case![Command::RemovePosition(args)].endpoint(handle_removeposition))
        .branch(case![Command::SetAlert(args)].endpoint(handle_setalert))
        .branch(case![Command::MyAlerts].endpoint(handle_myalerts))
        .branch(case![Command::RemoveAlert(args)].endpoint(handle_removealert))
        .branch(case![Command::AddSignal(args)].endpoint(handle_addsignal))
        .branch(case![Command::DelSignal(args)].endpoint(handle_delsignal))
        .branch(case![Command::Stats].endpoint(handle_stats))
        .branch(case![Command::Broadcast(args)].endpoint(handle_broadcast))
        .branch(case![Command::UserInfo(args)].endpoint(handle_userinfo))
        .branch(case![Command::Dashboard].endpoint(handle_dashboard))
        .branch(case![Command::BanUser(args)].endpoint(handle_banuser))
        .branch(case![Command::UnbanUser(args)].endpoint(handle_unbanuser))
        .branch(case![Command::VipGrant(args)].endpoint(handle_vipgrant))
        .branch(case![Command::SignalStats].endpoint(handle_signalstats))
        .branch(case![Command::BestPairs].endpoint(handle_bestpairs))
        .branch(case![Command::RevenueReport].endpoint(handle_revenuereport));

    let message_handler = Update::filter_message()
        .branch(command_handler)
        .branch(dptree::endpoint(handle_invalid));

    let callback_query_handler = Update::filter_callback_query().endpoint(handle_callback);

    dptree::entry()
        .branch(message_handler)
        .branch(callback_query_handler)
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    tracing::info!("Starting crypto signal bot...");

    let app_state = Arc::new(AppState::new().await?);
    Migrator::up(app_state.db.as_ref(), None).await?;
    tracing::info!("AppState initialized, schema ensured");

    app_state.market.startup_check().await;

    let bot = Bot::new(&app_state.config.bot_token);
    jobs::spawn_all(app_state.clone(), bot.clone());

    let mut dispatcher = Dispatcher::builder(bot.clone(), schema())
        .dependencies(dptree::deps![app_state.clone()])
        .enable_ctrlc_handler()
        .build();

    tracing::info!("Bot is running and waiting for updates...");
    dispatcher.dispatch().await;

    Ok(())
}
