//! wpgate: a GraphQL API for the users of a WordPress installation.

use clap::{FromArgMatches, CommandFactory};
use std::{env, sync::Arc};

use crate::{
    args::{Args, Command},
    auth::JwtContext,
    config::Config,
    prelude::*,
    users::Users,
};

mod api;
mod args;
mod auth;
mod cmd;
mod config;
mod db;
mod http;
mod logger;
mod model;
mod prelude;
mod users;
mod util;
mod version;


#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        // Log error in case stdout is not connected and it is logged into a file.
        error!("{:?}", e);

        // Show a somewhat nice representation of the error
        eprintln!();
        eprintln!();
        bunt::eprintln!("{$red}▶▶▶ {$bold}Error:{/$}{/$} {[yellow+intense]}", e);
        eprintln!();
        if e.chain().len() > 1 {
            bunt::eprintln!("{$red+italic}Caused by:{/$}");
        }

        for (i, cause) in e.chain().skip(1).enumerate() {
            eprint!(" {: >1$}", "", i * 2);
            eprintln!("‣ {cause}");
        }

        std::process::exit(1);
    }
}

/// Main entry point.
async fn run() -> Result<()> {
    // Backtraces are almost always useful and we don't expect errors to occur
    // often, so we enable them unless configured otherwise.
    if env::var("RUST_BACKTRACE") == Err(env::VarError::NotPresent) {
        env::set_var("RUST_BACKTRACE", "1");
    }

    // Parse CLI args. The version is computed at runtime, hence the detour.
    let args = Args::from_arg_matches(
        &Args::command()
            .version(version::full())
            .get_matches(),
    )?;

    // Configure output via `bunt`
    bunt::set_stdout_color_choice(args.stdout_color());
    bunt::set_stderr_color_choice(args.stderr_color());


    // Dispatch subcommand.
    match &args.cmd {
        Command::Serve { shared } => {
            let config = load_config_and_init_logger(shared, &args)?;
            start_server(config).await?;
        }
        Command::Check { shared } => cmd::check::run(shared, &args).await?,
        Command::WriteConfig { target } => config::write_template(target.as_ref())?,
        Command::ExportApiSchema { target, json } => {
            cmd::export_api_schema::run(target.as_ref(), *json)?;
        }
        Command::HashPassword => cmd::hash_password::run()?,
    }

    Ok(())
}

async fn start_server(config: Config) -> Result<()> {
    info!("Starting wpgate {} ...", version::identifier());
    trace!("Configuration: {:#?}", config);

    let db = db::create_pool(&config.db).await
        .context("failed to create database connection pool (database not running?)")?;
    let jwt = Arc::new(JwtContext::new(&config.auth));
    let users = Users::new(db, config.db.users_table(), Arc::clone(&jwt));

    let ctx = http::Context {
        api_root: api::root_node(),
        users: Arc::new(users),
        jwt,
        config: config.http,
    };
    http::serve(ctx).await.context("failed to start HTTP server")?;

    Ok(())
}


fn load_config_and_init_logger(shared: &args::Shared, args: &Args) -> Result<Config> {
    // Load configuration.
    let (config, path) = match &shared.config {
        Some(path) => {
            let config = Config::load_from(path)
                .context(format!("failed to load config from '{}'", path.display()))?;
            (config, path.clone())
        }
        None => Config::from_env_or_default_locations()?,
    };

    // Initialize logger. Unfortunately, we can only do this here
    // after reading the config.
    logger::init(&config.log, args)?;
    info!("Loaded config from '{}'", path.display());
    config.validate()
        .with_context(|| format!("invalid configuration in '{}'", path.display()))?;

    Ok(config)
}
