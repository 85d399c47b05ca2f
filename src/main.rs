use clap::{Parser, Subcommand};
use iouledger::node::{LocalNetwork, Node, NodeConfig};
use iouledger::storage::SledLedger;
use iouledger::transition::{SignedTransition, TransitionCodec};
use std::error::Error;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ledger", version, about = "Multi-party IOU ledger")]
struct Cli {
    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an IOU between two in-process nodes, then transfer it to a third
    Demo {
        #[arg(long, default_value_t = 10)]
        value: i64,
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,
    },
    /// Create (or load) the node keypair stored in a ledger directory
    Keygen {
        #[arg(long, default_value = "./ledger-data")]
        data_dir: PathBuf,
    },
    /// Print the identity and ledger statistics of a ledger directory
    Identity {
        #[arg(long, default_value = "./ledger-data")]
        data_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Command::Demo { value, timeout_secs } => run_demo(value, timeout_secs).await,
        Command::Keygen { data_dir } => {
            let store = SledLedger::open(&data_dir)?;
            let keypair = store.load_or_create_keypair()?;
            store.flush()?;
            println!("{}", keypair.did());
            Ok(())
        }
        Command::Identity { data_dir } => {
            let store = SledLedger::open(&data_dir)?;
            let Some(keypair) = store.load_keypair()? else {
                return Err(format!("no keypair in {}; run keygen first", data_dir.display()).into());
            };
            let stats = store.stats()?;
            println!("did:          {}", keypair.did());
            println!("transitions:  {}", stats.transaction_count);
            println!("consumed:     {}", stats.consumed_count);
            println!("disk usage:   {} bytes", stats.disk_size_bytes);
            Ok(())
        }
    }
}

async fn run_demo(value: i64, timeout_secs: u64) -> Result<(), Box<dyn Error>> {
    let config = NodeConfig::new()
        .with_session_timeout(timeout_secs)
        .with_finality_wait(timeout_secs);
    let mut network = LocalNetwork::new(config);
    let alice = network.add_node("alice")?;
    let bob = network.add_node("bob")?;
    let charlie = network.add_node("charlie")?;

    let created = alice.create_iou(value, bob.did()).await?;
    print_transition("create", &created)?;
    if bob.wait_for_transaction(&created.id()).await.is_none() {
        return Err("bob never recorded the new IOU".into());
    }

    let iou = created
        .transition()
        .output_refs()
        .into_iter()
        .next()
        .ok_or("create produced no output")?;
    let transferred = bob.transfer_iou(&iou.reference, charlie.did()).await?;
    print_transition("transfer", &transferred)?;
    if charlie.wait_for_transaction(&transferred.id()).await.is_none() {
        return Err("charlie never recorded the transfer".into());
    }

    for node in [&alice, &bob, &charlie] {
        print_states(node)?;
    }
    network.shutdown();
    Ok(())
}

fn print_transition(label: &str, stx: &SignedTransition) -> Result<(), Box<dyn Error>> {
    println!("{label} {} signed by:", stx.id().to_hex());
    for sig in stx.signatures() {
        println!("  {}", sig.by);
    }
    println!("  {}", TransitionCodec::encode_base64(stx)?);
    Ok(())
}

fn print_states(node: &Node) -> Result<(), Box<dyn Error>> {
    let states = node.list_states()?;
    println!("{} holds {} unconsumed IOU(s)", node.name(), states.len());
    for s in states {
        println!(
            "  {} value={} sender={} recipient={} at {}",
            s.state.linear_id(),
            s.state.value(),
            s.state.sender().short(),
            s.state.recipient().short(),
            s.reference
        );
    }
    Ok(())
}
