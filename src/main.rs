use anyhow::{bail, Result};
use chatkeep::cli::{
    Cli, Commands, ConfigAction, ConfigOwner, HistoryAction, HistoryOwner, PurgeTarget,
};
use chatkeep::{
    utils, ConfigOption, ContextStore, ConversationOwner, Lookup, Settings, StorageKey,
};
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let settings = Settings::new()?;
    chatkeep::init_logging(&settings);

    let cli = Cli::parse();

    if let Commands::Sanitize { raw } = &cli.command {
        return handle_sanitize(raw);
    }

    let store = ContextStore::open(&settings).await?;

    let result = match cli.command {
        Commands::Sanitize { .. } => Ok(()),
        Commands::Config { action } => handle_config(&store, action).await,
        Commands::History { action } => handle_history(&store, action).await,
        Commands::Purge { target } => handle_purge(&store, target).await,
        Commands::Keys => handle_keys(&store).await,
    };

    if let Err(e) = &result {
        if let Some(store_error) = e.downcast_ref::<chatkeep::Error>() {
            if store_error.is_storage_failure() {
                tracing::error!("Storage failure: {}", store_error);
            }
            utils::display::print_error(&store_error.user_message());
        }
    }

    result
}

fn handle_sanitize(raw: &str) -> Result<()> {
    let key = StorageKey::sanitize(raw)?;
    utils::display::print_success(key.as_str());
    Ok(())
}

async fn handle_config(store: &ContextStore, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show { owner } => {
            let (label, record) = match owner {
                ConfigOwner { user: Some(user), .. } => {
                    (format!("User {}", user), store.read_actor_configuration(&user).await?)
                }
                ConfigOwner { group: Some(group), .. } => {
                    (format!("Guild {}", group), store.read_group_configuration(&group).await?)
                }
                _ => bail!("either --user or --group is required"),
            };

            utils::display::print_header(&label);
            match record {
                Lookup::Found(record) if record.options.is_empty() => {
                    utils::display::print_info("No options set");
                }
                Lookup::Found(record) => {
                    for (name, value) in &record.options {
                        utils::display::print_field(name, value);
                    }
                }
                Lookup::NotFound => utils::display::print_info("No configuration stored"),
            }
        }
        ConfigAction::Set { owner, option, value } => {
            let option = ConfigOption::parse(&option, &value, &store.limits())?;
            let name = option.name();
            match owner {
                ConfigOwner { user: Some(user), .. } => {
                    store.write_actor_option(&user, option).await?;
                    utils::display::print_success(&format!("Set {} for user {}", name, user));
                }
                ConfigOwner { group: Some(group), .. } => {
                    store.write_group_option(&group, option).await?;
                    utils::display::print_success(&format!("Set {} for guild {}", name, group));
                }
                _ => bail!("either --user or --group is required"),
            }
        }
    }
    Ok(())
}

fn history_owner(owner: HistoryOwner) -> Result<ConversationOwner> {
    match owner {
        HistoryOwner { user: Some(user), shared: false } => Ok(ConversationOwner::Actor(user)),
        HistoryOwner { user: None, shared: true } => Ok(ConversationOwner::Shared),
        _ => bail!("exactly one of --user or --shared is required"),
    }
}

async fn handle_history(store: &ContextStore, action: HistoryAction) -> Result<()> {
    match action {
        HistoryAction::Show { channel, owner } => {
            let owner = history_owner(owner)?;
            match store.read_conversation(&channel, &owner).await? {
                Lookup::Found(record) => {
                    utils::display::print_header(&format!(
                        "#{} ({}) - {}",
                        record.name, record.id, record.user
                    ));
                    if record.messages.is_empty() {
                        utils::display::print_info("No messages");
                    }
                    for (index, message) in record.messages.iter().enumerate() {
                        utils::display::print_message(index, message);
                    }
                }
                Lookup::NotFound => utils::display::print_info("No history stored"),
            }
        }
    }
    Ok(())
}

async fn handle_purge(store: &ContextStore, target: PurgeTarget) -> Result<()> {
    let (label, removed) = match target {
        PurgeTarget { channel: Some(channel), user, shared, group: None } => {
            let owner = history_owner(HistoryOwner { user, shared })?;
            let removed = store.purge_conversation(&channel, &owner).await?;
            (format!("history of {} in channel {}", owner, channel), removed)
        }
        PurgeTarget { user: Some(user), channel: None, group: None, .. } => {
            let removed = store.purge_actor(&user).await?;
            (format!("configuration of user {}", user), removed)
        }
        PurgeTarget { group: Some(group), channel: None, user: None, .. } => {
            let removed = store.purge_group(&group).await?;
            (format!("configuration of guild {}", group), removed)
        }
        _ => bail!("specify --user, --group, or --channel with --user/--shared"),
    };

    tracing::info!("Purge requested for {}", label);
    if removed {
        utils::display::print_success(&format!("Deleted {}", label));
    } else {
        utils::display::print_warning(&format!("Nothing stored for {}", label));
    }
    Ok(())
}

async fn handle_keys(store: &ContextStore) -> Result<()> {
    let keys = store.list_keys().await?;
    utils::display::print_header(&format!("{} documents", keys.len()));
    for key in keys {
        println!("  {}", key);
    }
    Ok(())
}
