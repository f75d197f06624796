//! 🚀 lsx-cli — the front door, the bouncer, the maitre d' of leadsync.
//!
//! 🎬 *[narrator voice]* "It all started with a simple main() function..."
//! 📦 This binary crate is the thin CLI wrapper that loads config,
//! sets up logging, and then lets the real code do the heavy lifting.
//! Like a manager. 🦆

use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// 🚀 main() — where it all begins. The genesis. The big bang.
/// The "I pressed F5 and held my breath" moment.
///
/// 🔧 Steps:
/// 1. Init tracing (so we can see what goes wrong, and when)
/// 2. Parse args (or don't, we're not picky — one optional config path)
/// 3. Load config (the moment of truth)
/// 4. Run the sync (send it and pray 🙏)
/// 5. Print the summary, or the error chain (cry, but with context)
#[tokio::main]
async fn main() -> Result<()> {
    // 📡 Set up tracing — because println! debugging is a lifestyle choice
    // we're trying to move past, like flip phones and cargo shorts
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 🎯 Grab the args like catching Pokémon — gotta get at least 1
    let args: Vec<String> = std::env::args().collect();
    let path_arg = match args.get(1) {
        Some(s) => s.as_str(),
        None => "lsx.toml", // 🔧 default: the ol' reliable
    };

    // 🔒 Validate the config file exists before we get too emotionally attached
    let config_file = std::path::Path::new(path_arg);
    let config_file_if_it_exists = match config_file.try_exists()
        .context(format!("💀 Configuration file may not exist, couldn't find it. Double check that it exists, or maybe it's an issue with pwd/cwd and relative paths. In that case, use an absolute path, to be absolutely certain. Was checking here: '{}'", config_file.display()))?
    {
        true => Some(config_file),  // ✅ Found it! Better than finding my car keys
        false => None,              // 💤 Not there. Env vars, it's all you.
    };

    // 🔧 Load the config — this is the moment where we find out if the TOML
    // is valid or if someone put a tab where a space should be
    let app_config = lsx::app_config::load_config(config_file_if_it_exists)
        .context("💀 Couldn't load the configuration. Take a look at the file, make sure you didn't forget something obvious.")?;

    // 🚀 SEND IT. No take-backs. This is not a drill.
    let started = Instant::now();
    let result = lsx::run(app_config).await;

    match result {
        Ok(report) => {
            // ✅ The summary is the contract: it prints even when every
            // single record failed, because partial failure is not fatal.
            info!("✅ sync finished");
            println!("{}", lsx::progress::summary_table(&report, started.elapsed()));
            if !report.errors.is_empty() {
                println!("\n💀 {} record(s) had problems:", report.errors.len());
                for line in &report.errors {
                    println!("  - {line}");
                }
            }
        }
        Err(err) => {
            // 💀 Error handling: the part where we find out what went wrong
            // and print it in a way that's helpful at 3am
            error!("💀 error: {}", err);
            // -- 🧅 peel the onion of sadness, one tear-jerking layer at a time
            let mut the_vibes_are_giving_connection_issues = false;
            for cause in err.chain().skip(1) {
                error!("⚠️  cause: {}", cause);
                // -- 🕵️ sniff the cause like a truffle pig hunting for connection problems
                let cause_str = cause.to_string();
                if cause_str.contains("error sending request")
                    || cause_str.contains("connection refused")
                    || cause_str.contains("Connection refused")
                    || cause_str.contains("tcp connect error")
                    || cause_str.contains("dns error")
                    || cause_str.contains("Server selection timeout")
                {
                    the_vibes_are_giving_connection_issues = true;
                }
            }

            // -- 📡 if it smells like a connection problem, it's probably a connection problem
            // -- like when your wifi icon has full bars but nothing loads
            if the_vibes_are_giving_connection_issues {
                error!(
                    "🔧 hint: looks like a service isn't reachable. \
                    Double-check that the backing services (MongoDB, the CRM API) \
                    are actually running and that the URIs in your config point at them. \
                    If you're using Docker, try: `docker ps` to see what's up, \
                    or `docker compose up -d` to resurrect it. \
                    Even servers need a nudge sometimes. ☕"
                );
            }

            // 🗑️ Exit with prejudice. Process exitus maximus.
            std::process::exit(1);
        }
    }

    // ✅ If we got here, everything worked. Pop the champagne. 🍾
    // (or at least close the terminal tab with a sense of accomplishment)
    Ok(())
}
