//! A subcommand making sure various things are working. Useful before
//! deploying, to find as many problems as possible as early as possible.

use std::sync::Arc;

use crate::{
    args::{Args, Shared},
    auth::JwtContext,
    db,
    load_config_and_init_logger,
    prelude::*,
    users::Users,
};


pub(crate) async fn run(shared: &Shared, args: &Args) -> Result<()> {
    let config = load_config_and_init_logger(shared, args)
        .context("failed to load config: cannot proceed with `check` command")?;


    // Perform main checks
    info!("Starting to verify various things...");
    let db_pool = db::create_pool(&config.db).await;
    let users_table = match &db_pool {
        Ok(db) => {
            debug!("DB pool status: {:?}", db.status());
            let jwt = Arc::new(JwtContext::new(&config.auth));
            Users::new(db.clone(), config.db.users_table(), jwt)
                .check_schema()
                .await
                .with_context(|| format!(
                    "table '{}' is missing or lacks required columns",
                    config.db.users_table().0,
                ))
        }
        Err(_) => Err(anyhow!("skipped: no DB connection")),
    };
    info!("Done verifing various things");


    // Print summary after all log output
    let mut any_errors = false;
    println!();
    bunt::println!("{$bold+blue+intense}Summary{/$}");
    println!();
    print_outcome(&mut any_errors, "Load configuration", &Ok(()));
    print_outcome(&mut any_errors, "Connection to DB", &db_pool);
    print_outcome(&mut any_errors, "WordPress users table", &users_table);

    println!();
    if any_errors {
        bunt::println!("{$red+intense}➡  Errors have occured!{/$}");
        std::process::exit(1);
    } else {
        bunt::println!("{$green+intense}⮕  Everything OK{/$} \
            {$dimmed}(wpgate probably works in this environment){/$}");
        Ok(())
    }
}

fn print_outcome<T>(any_errors: &mut bool, label: &str, result: &Result<T>) {
    match result {
        Ok(_) => {
            bunt::println!(" ▸ {[bold+intense]}  {$green+bold}✔ ok{/$}", label);
        }
        Err(e) => {
            *any_errors = true;
            bunt::println!(" ▸ {[bold+intense]}  {$red+bold}✘ error{/$}", label);
            bunt::println!("      {$red}▶▶▶ {$bold}Error:{/$}{/$} {[yellow+intense]}", e);
            if e.chain().len() > 1 {
                println!();
                bunt::println!("      {$red+italic}Caused by:{/$}");
            }

            for (i, cause) in e.chain().skip(1).enumerate() {
                print!("       {: >1$}", "", i * 2);
                println!("‣ {cause}");
            }
            println!();
        }
    }
}
