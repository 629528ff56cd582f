//! eMBMS Receiver Main Application
//!
//! Connects to the PHY toolkit, acquires an eMBMS cell and publishes one
//! MBSFN scheduling decision per subframe. SIB13 and MCCH contents arrive on
//! the control feed and are applied by a single ingest task.

mod config;
mod receiver;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use config::ModemConfig;
use interfaces::message_types::{topics, ControlMessage};
use interfaces::zmq_handler::{SocketType, ZmqConfig, ZmqHandler};
use interfaces::zmq_toolkit::{ZmqToolkit, ZmqToolkitConfig};
use layers::mac::MbsfnScheduler;
use layers::phy::CellAcquisition;
use layers::rrc::ConfigIngest;
use layers::status::ModemStatus;
use receiver::{ReceiveLoop, StepOutcome};

/// eMBMS receiver control plane
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a TOML or YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Bandwidth assumed during cell search, in PRB
    #[arg(long)]
    search_nof_prb: Option<u8>,

    /// Force the PRB count of MBMS-dedicated cells
    #[arg(long)]
    override_nof_prb: Option<u8>,

    /// Number of receive channels
    #[arg(long)]
    rx_channels: Option<u8>,
}

/// Work items of the ingest task
#[derive(Debug)]
enum IngestCommand {
    Control(ControlMessage),
    /// The cell was lost, its MBSFN configuration no longer applies
    Reset,
}

type Publisher = Arc<Mutex<ZmqHandler>>;

fn load_config(args: &Args) -> Result<ModemConfig> {
    let mut config = match &args.config {
        Some(path) => ModemConfig::from_file(path)?,
        None => ModemConfig::default(),
    };

    if let Some(level) = &args.log_level {
        config.log.level = level.clone();
    }
    if let Some(prb) = args.search_nof_prb {
        config.acquisition.search_nof_prb = prb;
    }
    if args.override_nof_prb.is_some() {
        config.acquisition.override_nof_prb = args.override_nof_prb;
    }
    if let Some(channels) = args.rx_channels {
        config.acquisition.rx_channels = channels;
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    // Initialize logging
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));

    fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    info!("Starting eMBMS receiver");
    if let Some(path) = &args.config {
        info!("Configuration file: {}", path.display());
    }
    info!("Acquisition configuration:");
    info!("  Search bandwidth: {} PRB", config.acquisition.search_nof_prb);
    if let Some(prb) = config.acquisition.override_nof_prb {
        info!("  PRB override: {}", prb);
    }
    info!("  RX channels: {}", config.acquisition.rx_channels);
    info!("  Toolkit: {}", config.toolkit.address);
    info!("  Control feed: {}", config.control.feed_address);
    info!("  Events: {}", config.control.event_address);

    let mut ingest = ConfigIngest::new();
    for d in &config.destinations {
        ingest.set_destination(d.mch_index, d.lcid, d.dest.clone());
    }
    let scheduler = MbsfnScheduler::new(ingest.subscribe(), config.receiver.decode_mcch);

    let mut publisher = ZmqHandler::new(ZmqConfig {
        socket_type: SocketType::Pub,
        address: config.control.event_address.clone(),
        hwm: config.control.hwm,
        recv_timeout_ms: config.control.recv_timeout_ms,
    });
    publisher.initialize()?;
    let publisher: Publisher = Arc::new(Mutex::new(publisher));

    let mut toolkit = ZmqToolkit::new(ZmqToolkitConfig {
        address: config.toolkit.address.clone(),
        timeout_ms: config.toolkit.timeout_ms,
    });
    toolkit.connect()?;

    let running = Arc::new(RwLock::new(true));
    let (cmd_tx, cmd_rx) = mpsc::channel::<IngestCommand>(64);
    let acquisition = CellAcquisition::new(toolkit, config.acquisition.clone(), scheduler);
    let receive_loop = ReceiveLoop::new(acquisition, config.receiver.max_sync_failures);
    let (status_tx, status_rx) = watch::channel(receive_loop.status());

    info!("eMBMS receiver initialized successfully");

    let ingest_handle = tokio::spawn(run_ingest(ingest, cmd_rx, publisher.clone()));

    let feed_handle = {
        let running = running.clone();
        let cmd_tx = cmd_tx.clone();
        let feed_config = ZmqConfig {
            socket_type: SocketType::Sub,
            address: config.control.feed_address.clone(),
            hwm: config.control.hwm,
            recv_timeout_ms: config.control.recv_timeout_ms,
        };
        tokio::task::spawn_blocking(move || run_control_feed(feed_config, cmd_tx, running))
    };

    let receive_handle = {
        let running = running.clone();
        let publisher = publisher.clone();
        tokio::task::spawn_blocking(move || run_receiver(receive_loop, cmd_tx, status_tx, publisher, running))
    };

    // Start status reporting
    let stats_handle = {
        let running = running.clone();
        let publisher = publisher.clone();
        let period = Duration::from_secs(config.receiver.status_interval_secs);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);

            while *running.read().await {
                interval.tick().await;

                let status = status_rx.borrow().clone();
                info!(
                    "Receiver: {}, PCI {:?}, PRB {:?}, CFO {:.1} Hz, {} MCH",
                    status.state,
                    status.cell_id,
                    status.nof_prb,
                    status.cfo,
                    status.mch_info.len()
                );
                if let Err(e) = publisher.lock().await.publish(topics::STATUS, &status) {
                    warn!("Cannot publish status: {}", e);
                }
            }
        })
    };

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        _ = receive_handle => {
            warn!("Receive loop stopped unexpectedly");
        }
    }

    // Shutdown
    info!("Shutting down eMBMS receiver");
    *running.write().await = false;

    // Wait for tasks to complete
    let timeout = Duration::from_secs(5);
    let _ = tokio::time::timeout(timeout, feed_handle).await;
    let _ = tokio::time::timeout(timeout, stats_handle).await;
    let _ = tokio::time::timeout(timeout, ingest_handle).await;

    publisher.lock().await.shutdown();
    info!("eMBMS receiver shutdown complete");
    Ok(())
}

/// Single writer of the scheduling configuration
async fn run_ingest(mut ingest: ConfigIngest, mut cmd_rx: mpsc::Receiver<IngestCommand>, publisher: Publisher) {
    while let Some(command) = cmd_rx.recv().await {
        match command {
            IngestCommand::Control(message) => {
                if let Err(e) = ingest.apply(&message) {
                    warn!("Rejected control message: {}", e);
                    continue;
                }
            }
            IngestCommand::Reset => ingest.reset(),
        }

        let mch_info = ingest.mch_info();
        if let Err(e) = publisher.lock().await.publish(topics::MCH_INFO, &mch_info) {
            warn!("Cannot publish MCH info: {}", e);
        }
    }
    debug!("Ingest task finished");
}

fn run_control_feed(config: ZmqConfig, cmd_tx: mpsc::Sender<IngestCommand>, running: Arc<RwLock<bool>>) {
    let mut feed = ZmqHandler::new(config);
    if let Err(e) = feed.initialize() {
        error!("Cannot open control feed: {}", e);
        return;
    }

    while *running.blocking_read() {
        match feed.receive_control() {
            Ok(Some(message)) => {
                if cmd_tx.blocking_send(IngestCommand::Control(message)).is_err() {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => {
                error!("Control feed error: {}", e);
                break;
            }
        }
    }
    feed.shutdown();
}

fn run_receiver(
    mut receive_loop: ReceiveLoop<ZmqToolkit>,
    cmd_tx: mpsc::Sender<IngestCommand>,
    status_tx: watch::Sender<ModemStatus>,
    publisher: Publisher,
    running: Arc<RwLock<bool>>,
) {
    let status_period = Duration::from_millis(500);
    let mut last_status = Instant::now();

    while *running.blocking_read() {
        match receive_loop.step() {
            StepOutcome::Subframe(decision) => {
                if let Err(e) = publisher.blocking_lock().publish(topics::SUBFRAME, &decision) {
                    warn!("Cannot publish subframe decision: {}", e);
                }
            }
            StepOutcome::Acquired(cell) => {
                info!(
                    "Synchronized to PCI {} ({} PRB), CFO {:.1} Hz",
                    cell.pci.0,
                    cell.nof_prb,
                    receive_loop.acquisition().cfo()
                );
                status_tx.send_replace(receive_loop.status());
            }
            StepOutcome::Lost => {
                warn!("Cell lost, searching again");
                if cmd_tx.blocking_send(IngestCommand::Reset).is_err() {
                    break;
                }
                status_tx.send_replace(receive_loop.status());
            }
            StepOutcome::SyncFailed { consecutive } => {
                if consecutive == 1 {
                    debug!("Synchronisation lost, retrying");
                }
            }
            StepOutcome::Searching => std::thread::sleep(Duration::from_millis(100)),
        }

        if last_status.elapsed() >= status_period {
            status_tx.send_replace(receive_loop.status());
            last_status = Instant::now();
        }
    }
}
