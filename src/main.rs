use clap::Parser;
use color_eyre::Result;
use gauge_hub::{
    cli,
    client::Mode,
    config::Config,
    controller::{Command, ControllerHandle},
    logging,
    mock::MockHub,
};
use tokio_stream::{wrappers::BroadcastStream, StreamExt};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use tracing::{debug, info, warn};

#[cfg(unix)]
async fn hangup() -> Result<()> {
    let mut hangup = signal(SignalKind::hangup())?;
    hangup.recv().await;

    Ok(())
}

#[cfg(not(unix))]
async fn hangup() -> Result<()> {
    std::future::pending().await
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = cli::Cli::parse();

    if let Some(command) = cli.command {
        cli::handle_command(command)?;

        return Ok(());
    }

    let file_logging = cli.log_dir.map(|dir| (cli.log_level, dir));
    logging::init(cli.log_level, file_logging).await;

    let config = if let Some(config_path) = cli.config {
        debug!(?config_path, "Config from path");
        Config::new_from_path(config_path)?
    } else {
        debug!("Example config");
        Config::example()
    };

    let mode = if cli.simulate {
        info!("Simulating the hub");
        Mode::Simulation(MockHub::default())
    } else {
        Mode::Serial
    };

    let controller = ControllerHandle::new(cli.index, config, mode);
    let mut events = BroadcastStream::new(controller.events());

    controller.command(Command::Start).await?;
    controller.command(Command::Enable).await?;

    let printer = async {
        while let Some(event) = events.next().await {
            match event {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(line) => println!("{line}"),
                    Err(e) => warn!(?e, "Could not serialize event"),
                },
                Err(lagged) => warn!(%lagged, "Falling behind on events"),
            }
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C, quitting")
        }
        result = hangup() => {
            result?;
            info!("Told to hang up, quitting")
        }
        _ = printer => {
            info!("Controller stopped publishing, quitting")
        }
    }

    controller.shutdown().await?;
    logging::shutdown();

    Ok(())
}
