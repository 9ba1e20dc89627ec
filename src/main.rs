use std::{error::Error, net::SocketAddr, path::PathBuf};

use clap::{Parser, Subcommand};
use env_logger::Env;

use foodgram::{
    actions::{tags::create_tag, users::register_user},
    config::Config,
    context::{run_migrations, Context},
    form::RegisterForm,
    loader::load_ingredients,
    routes,
    schema::UserRole,
};

#[derive(Parser, Debug)]
#[command(name = "foodgram", version)]
#[command(about = "Recipe sharing backend", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending migrations and serve the API
    Serve,
    /// Apply pending migrations and exit
    Migrate,
    /// Import ingredients from a headerless `name,unit` CSV file
    LoadIngredients {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
    /// Create a recipe tag
    AddTag {
        #[arg(long)]
        name: String,
        /// HEX colour in #RRGGBB form
        #[arg(long)]
        color: String,
        #[arg(long)]
        slug: String,
    },
    /// Create an administrator account
    CreateAdmin {
        #[arg(long, value_name = "EMAIL")]
        email: String,
        #[arg(long, value_name = "USERNAME")]
        username: String,
        #[arg(long, env = "FOODGRAM_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long, default_value = "Admin")]
        first_name: String,
        #[arg(long, default_value = "Admin")]
        last_name: String,
    },
}

async fn serve(config: Config) -> Result<(), Box<dyn Error>> {
    tokio::fs::create_dir_all(&config.media_root).await?;
    let address: SocketAddr = config.bind_address.parse()?;

    let ctx = Context::connect(config).await?;
    run_migrations(&ctx.pool).await?;

    let (address, server) = warp::serve(routes(ctx.clone()))
        .try_bind_with_graceful_shutdown(address, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for shutdown signal: {e}");
            }
            log::info!("Shutting down...");
        })?;

    log::info!("Listening on http://{address}");
    server.await;

    ctx.pool.close().await;
    Ok(())
}

async fn run(command: Command, config: Config) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Serve => serve(config).await?,
        Command::Migrate => {
            let ctx = Context::connect(config).await?;
            run_migrations(&ctx.pool).await?;
            log::info!("Migrations applied");
        }
        Command::LoadIngredients { path } => {
            let ctx = Context::connect(config).await?;
            load_ingredients(&path, &ctx.pool).await?;
        }
        Command::AddTag { name, color, slug } => {
            let ctx = Context::connect(config).await?;
            let tag = create_tag(&name, &color, &slug, &ctx.pool).await?;
            log::info!("Created tag {} ({})", tag.slug, tag.id);
        }
        Command::CreateAdmin {
            email,
            username,
            password,
            first_name,
            last_name,
        } => {
            let ctx = Context::connect(config).await?;
            let form = RegisterForm {
                email,
                username,
                first_name,
                last_name,
                password,
            };
            let user = register_user(&form, UserRole::Admin, &ctx.pool).await?;
            log::info!("Created administrator {} ({})", user.username, user.id);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli.command, Config::load()).await {
        log::error!("{e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_tag_arguments() {
        let cli = Cli::parse_from([
            "foodgram", "add-tag", "--name", "Lunch", "--color", "#49B64E", "--slug", "lunch",
        ]);

        match cli.command {
            Command::AddTag { name, color, slug } => {
                assert_eq!((name.as_str(), color.as_str(), slug.as_str()), ("Lunch", "#49B64E", "lunch"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
