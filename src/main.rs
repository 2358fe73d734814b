mod cli;

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands};
use vw_core::EngineConfig;
use vw_tools::{probe, session::ConversionSession, DependencyCoordinator, ToolKind};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise pick defaults from the verbose flag.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "vidwall=trace,vw_tools=trace,vw_core=debug".to_string()
        } else {
            "vidwall=info,vw_tools=info,vw_core=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    let config = EngineConfig::load_or_default(cli.config.as_deref());
    for warning in config.validate() {
        tracing::warn!("config: {warning}");
    }
    let coordinator = DependencyCoordinator::from_config(&config);

    match cli.command {
        Commands::Status => status(&coordinator),
        Commands::Setup => block_on(setup(&coordinator)),
        Commands::Doctor => {
            print!("{}", coordinator.diagnostic_report());
            Ok(())
        }
        Commands::TestTools => block_on(test_tools(&coordinator)),
        Commands::Probe { file } => block_on(probe_file(&coordinator, &file)),
        Commands::Fetch { url, dest, extra } => {
            block_on(fetch(&coordinator, &url, &dest, &extra))
        }
        Commands::Convert {
            input,
            output,
            extra,
        } => block_on(convert(&coordinator, &config, &input, &output, &extra)),
        Commands::Version => {
            println!("vidwall {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn block_on<F: std::future::Future<Output = Result<()>>>(fut: F) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(fut)
}

fn status(coordinator: &DependencyCoordinator) -> Result<()> {
    let status = coordinator.check_status();

    for tool in &status.tools {
        let mark = if tool.available { "✓" } else { "✗" };
        print!("{} {}", mark, tool.kind);
        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }
        println!();
    }

    println!();
    if status.all_available() {
        println!("All bundled tools are available.");
    } else {
        let missing: Vec<String> = status.missing().iter().map(|k| k.to_string()).collect();
        println!(
            "Missing: {}. Run `vidwall setup` after installing.",
            missing.join(", ")
        );
    }

    Ok(())
}

async fn setup(coordinator: &DependencyCoordinator) -> Result<()> {
    if coordinator.initialize_once().await {
        println!("Tool preparation pass completed.");
    } else {
        println!("Tool preparation already ran in this process.");
    }
    status(coordinator)
}

async fn test_tools(coordinator: &DependencyCoordinator) -> Result<()> {
    let mut all_ok = true;

    for kind in ToolKind::ALL {
        let healthy = coordinator.test_executable(kind).await;
        all_ok &= healthy;
        println!("{} {}", if healthy { "✓" } else { "✗" }, kind);
    }

    if !all_ok {
        anyhow::bail!("one or more tools failed the version check");
    }
    Ok(())
}

async fn probe_file(coordinator: &DependencyCoordinator, file: &Path) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let secs = probe::probe_duration(coordinator, file).await?;
    let whole = secs as u64;
    println!(
        "Duration: {:02}:{:02}:{:05.2} ({secs:.2} s)",
        whole / 3600,
        (whole % 3600) / 60,
        secs % 60.0
    );
    Ok(())
}

async fn fetch(
    coordinator: &DependencyCoordinator,
    url: &str,
    dest: &Path,
    extra: &[String],
) -> Result<()> {
    let out = vw_tools::download::download(coordinator, url, dest, extra).await?;
    if !out.success {
        anyhow::bail!("download failed:\n{}", tail(&out.output, 5));
    }
    println!("Downloaded into {}", dest.display());
    Ok(())
}

async fn convert(
    coordinator: &DependencyCoordinator,
    config: &EngineConfig,
    input: &Path,
    output: &Path,
    extra: &[String],
) -> Result<()> {
    if !input.exists() {
        anyhow::bail!("Input file does not exist: {:?}", input);
    }

    let total_secs = match probe::probe_duration(coordinator, input).await {
        Ok(secs) => secs,
        Err(e) => {
            tracing::warn!("could not probe duration ({e}); progress ratio will stay at 0");
            0.0
        }
    };

    let mut args: Vec<String> = vec!["-y".into(), "-i".into(), input.to_string_lossy().into()];
    args.extend(extra.iter().cloned());
    args.push(output.to_string_lossy().into());

    let session =
        ConversionSession::new().with_timeout(Duration::from_secs(config.run_timeout_secs));

    // Ctrl-C terminates the transcoder rather than orphaning it.
    let cancel = session.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let mut rx = session.subscribe();
    let printer = tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let snap = rx.borrow_and_update().clone();
            println!("[{:>5.1}%] {}", snap.ratio * 100.0, snap.message);
        }
    });

    let out = session.run(coordinator, &args, total_secs).await?;
    drop(session);
    let _ = printer.await;

    if !out.success {
        anyhow::bail!("conversion failed:\n{}", tail(&out.output, 5));
    }
    println!("Wrote {}", output.display());
    Ok(())
}

/// Last `n` non-empty lines of a tool's output.
fn tail(output: &str, n: usize) -> String {
    let lines: Vec<&str> = output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}
