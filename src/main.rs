use clap::Parser;
use form_recall::cli::commands::{
    cmd_capture, cmd_delete, cmd_delete_all, cmd_export, cmd_fill, cmd_import, cmd_list, cmd_rename,
    cmd_search, cmd_set_field, cmd_show, cmd_toggle,
};
use form_recall::cli::config::{Cli, Commands, load_config, resolve_store_path};
use form_recall::messaging::coordinator::Coordinator;
use form_recall::store::store::JsonFileStore;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = load_config(cli.config.as_deref());

    // Resolve store location: CLI > config > default
    let store_path = resolve_store_path(cli.store.as_deref(), &config);
    let mut coordinator = Coordinator::new(Box::new(JsonFileStore::open(&store_path)));

    let output = match cli.command {
        Commands::Capture {
            source,
            frame,
            title,
        } => cmd_capture(&mut coordinator, &source, frame, title.as_deref(), &config.driver)?,
        Commands::List { url } => cmd_list(&mut coordinator, url.as_deref())?,
        Commands::Search { query } => cmd_search(&mut coordinator, &query)?,
        Commands::Show { id } => cmd_show(&mut coordinator, &id)?,
        Commands::Rename { id, title } => cmd_rename(&mut coordinator, &id, &title)?,
        Commands::Toggle {
            id,
            auto_fill,
            auto_submit,
        } => cmd_toggle(&mut coordinator, &id, auto_fill, auto_submit)?,
        Commands::SetField { id, index, value } => {
            cmd_set_field(&mut coordinator, &id, index, &value)?
        }
        Commands::Fill {
            source,
            frame,
            id,
            output,
            trace,
        } => cmd_fill(
            &mut coordinator,
            &source,
            frame,
            id.as_deref(),
            output.as_deref(),
            trace.as_deref(),
            &config.timing,
            &config.driver,
        )?,
        Commands::Delete { id } => cmd_delete(&mut coordinator, &id)?,
        Commands::DeleteAll { yes } => cmd_delete_all(&mut coordinator, yes)?,
        Commands::Export { output } => cmd_export(&mut coordinator, output.as_deref())?,
        Commands::Import { file } => cmd_import(&mut coordinator, &file)?,
    };

    print!("{}", output);
    Ok(())
}
