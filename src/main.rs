use clap::Parser;
use devnotify::cli::commands::{self, App};
use devnotify::cli::{Cli, Commands};
use devnotify::logging;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("notify: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.as_deref();

    // These work without a loadable config.
    match cli.command {
        Commands::Config { action } => return commands::config(config_path, action),
        Commands::ShellHook { shell } => return commands::shell_hook_snippet(&shell),
        _ => {}
    }

    let app = App::load(config_path)?;
    match cli.command {
        Commands::Trigger(args) => commands::trigger(&app, &args).await,
        Commands::Send(opts) => commands::send(&app, opts).await,
        Commands::Dashboard(opts) => commands::dashboard(app, opts).await,
        Commands::History(opts) => commands::history(&app, opts),
        Commands::Voice { action } => commands::voice(&app, action).await,
        Commands::Silent { value } => commands::silent(&app, value.as_deref()),
        Commands::List => commands::list(&app),
        Commands::Test(opts) => commands::test(&app, opts),
        Commands::Watch(opts) => commands::watch(&app, opts).await,
        Commands::ClaudeHook { profile } => commands::claude_hook(&app, profile).await,
        Commands::Hook(opts) => commands::hook(&app, opts).await,
        Commands::Config { .. } | Commands::ShellHook { .. } => Ok(()),
    }
}
