use cfw_guide::utils::display::DisplayFormatter;
use cfw_guide::{CatalogService, CfwGuideApi, CommandCooldowns, CommandError, Invoker, Settings};
use colored::Colorize;
use std::error::Error;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::{debug, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    info!("Starting cfw-guide");
    let settings = Settings::load()?;

    let catalog = CatalogService::new(
        Arc::new(CfwGuideApi::new(settings.catalog.clone())),
        &settings.catalog,
    );
    let cooldowns = Arc::new(CommandCooldowns::new(&settings.cooldowns)?);
    let sweeper = cooldowns.spawn_sweeper(settings.cooldowns.sweep_interval());
    let display = DisplayFormatter::new();

    println!("=== iOS CFW Guide ===");
    println!("Commands:");
    println!("  jailbreak <name>                 - Show info about a jailbreak");
    println!("  firmware <version (build)>       - Show info about an iOS version");
    println!("  complete <jb|ios|device> <text>  - Show autocomplete choices");
    println!("  meme <name> [--mod]              - Post a meme, subject to its cooldown");
    println!("  refresh                          - Drop cached catalogs");
    println!("  exit                             - Exit the program");

    let mut input = String::new();
    loop {
        input.clear();
        print!("> ");
        io::stdout().flush()?;
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }

        let line = input.trim();
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();

        let outcome: Result<(), CommandError> = match command {
            "" => Ok(()),
            "exit" => {
                debug!("Received exit command");
                break;
            }
            "jailbreak" => show_jailbreak(&catalog, &display, rest).await,
            "firmware" => catalog.firmware(rest).await.map(|fw| {
                println!("{}", display.format_firmware(&fw));
            }),
            "complete" => {
                let (kind, prefix) = rest.split_once(' ').unwrap_or((rest, ""));
                let choices = match kind {
                    "jb" => catalog.jailbreak_choices(prefix).await,
                    "ios" => catalog.firmware_choices(prefix).await,
                    "device" => catalog.device_choices(prefix).await,
                    other => {
                        println!("Unknown autocomplete kind: {}", other);
                        continue;
                    }
                };
                choices
                    .map(|choices| println!("{}", display.format_choices(&choices)))
                    .map_err(CommandError::from)
            }
            "meme" => {
                let (name, invoker) = match rest.strip_suffix("--mod") {
                    Some(name) => (name.trim(), Invoker::moderator()),
                    None => (rest, Invoker::member()),
                };
                cooldowns.meme(name, invoker).map(|()| {
                    println!("{}", format!("Here's your meme: {}", name.to_lowercase()).bold());
                })
            }
            "refresh" => {
                catalog.invalidate_all();
                println!("Cached catalogs dropped");
                Ok(())
            }
            other => {
                println!("Unknown command: {}", other);
                Ok(())
            }
        };

        if let Err(e) = outcome {
            println!("{}", e.to_string().red());
        }
    }

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    info!("Shutting down");
    Ok(())
}

async fn show_jailbreak(
    catalog: &CatalogService,
    display: &DisplayFormatter,
    name: &str,
) -> Result<(), CommandError> {
    let jb = catalog.jailbreak(name).await?;
    let link = catalog.install_link(&jb.name).await?;
    println!("{}", display.format_jailbreak(&jb, link.as_deref()));
    Ok(())
}
