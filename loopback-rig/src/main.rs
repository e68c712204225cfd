//! Two-node capture/sync demo over the in-memory loopback bus.
//!
//! Builds one initiator and one responder node, scripts a little capture
//! traffic into each tap, and lets the run loops exchange and pair the
//! streams. Every pair is printed by both nodes; the lines must agree.
//! Run with `RUST_LOG=trace` to see the exchange narration as well.

use std::sync::atomic::{AtomicUsize, Ordering};

use embassy_time::{Duration, Timer};
use futures_executor::LocalPool;
use futures_task::LocalSpawn;
use static_cell::StaticCell;
use tapweave::capture::Tap;
use tapweave::core::{PeerAddress, Role};
use tapweave::node::{Config, Node};
use tapweave::report::{Paired, Sink};
use tapweave::sync::Coordinator;
use tapweave_loopback::{ControllerPort, LoopbackBus, TargetPort};

const CAPACITY: usize = 64;
const ALPHA: PeerAddress = PeerAddress::new(0x0a).unwrap();
const BETA: PeerAddress = PeerAddress::new(0x0b).unwrap();

const SYNC_INTERVAL: Duration = Duration::from_millis(25);
const EXCHANGE_TIMEOUT: Duration = Duration::from_millis(250);
const BURST_GAP: Duration = Duration::from_millis(40);
const RUN_FOR: Duration = Duration::from_millis(600);

const BURSTS: usize = 3;
const BURST_LEN: usize = 4;

static ALPHA_PAIRS: AtomicUsize = AtomicUsize::new(0);
static BETA_PAIRS: AtomicUsize = AtomicUsize::new(0);

fn main() {
    env_logger::init();

    let mut executor = LocalPool::new();
    let spawner = executor.spawner();

    let (controller, target) = {
        static BUS: StaticCell<LoopbackBus> = StaticCell::new();
        BUS.init(LoopbackBus::new()).split(BETA)
    };

    let (alpha_tap, alpha_coordinator, alpha_diagnostics) = {
        static NODE: StaticCell<Node<CAPACITY>> = StaticCell::new();
        NODE.init(Node::new(Config {
            role: Role::Initiator,
            peer: BETA,
            exchange_timeout: EXCHANGE_TIMEOUT,
        }))
        .split()
    };
    let (beta_tap, beta_coordinator, beta_diagnostics) = {
        static NODE: StaticCell<Node<CAPACITY>> = StaticCell::new();
        NODE.init(Node::new(Config {
            role: Role::Responder,
            peer: ALPHA,
            exchange_timeout: EXCHANGE_TIMEOUT,
        }))
        .split()
    };

    let alpha_sink = ConsoleSink {
        name: "alpha",
        emitted: &ALPHA_PAIRS,
    };
    let beta_sink = ConsoleSink {
        name: "beta",
        emitted: &BETA_PAIRS,
    };

    spawner
        .spawn_local_obj(Box::new(initiate(alpha_coordinator, controller, alpha_sink)).into())
        .unwrap();
    spawner
        .spawn_local_obj(Box::new(respond(beta_coordinator, target, beta_sink)).into())
        .unwrap();
    spawner
        .spawn_local_obj(Box::new(traffic(alpha_tap, 0x10)).into())
        .unwrap();
    spawner
        .spawn_local_obj(Box::new(traffic(beta_tap, 0xb0)).into())
        .unwrap();

    println!(
        "loopback rig: {} bytes per node, sync every {} ms",
        BURSTS * BURST_LEN,
        SYNC_INTERVAL.as_millis()
    );

    executor.run_until(Timer::after(RUN_FOR));

    println!();
    println!(
        "pairs reported: alpha {}, beta {}",
        ALPHA_PAIRS.load(Ordering::Relaxed),
        BETA_PAIRS.load(Ordering::Relaxed)
    );
    println!("alpha faults: {:?}", alpha_diagnostics.counts());
    println!("beta  faults: {:?}", beta_diagnostics.counts());
}

struct ConsoleSink {
    name: &'static str,
    emitted: &'static AtomicUsize,
}

impl Sink for ConsoleSink {
    fn record(&mut self, pair: Paired) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
        println!(
            "{:5}  {:#04x} <-> {:#04x}",
            self.name, pair.initiator, pair.responder
        );
    }
}

async fn initiate(
    mut coordinator: Coordinator<'static, CAPACITY>,
    mut bus: ControllerPort<'static>,
    mut sink: ConsoleSink,
) {
    match coordinator
        .run_initiator(&mut bus, &mut sink, SYNC_INTERVAL)
        .await
    {
        Ok(never) | Err(never) => match never {},
    }
}

async fn respond(
    mut coordinator: Coordinator<'static, CAPACITY>,
    mut bus: TargetPort<'static>,
    mut sink: ConsoleSink,
) {
    match coordinator.run_responder(&mut bus, &mut sink).await {
        Ok(never) | Err(never) => match never {},
    }
}

async fn traffic(mut tap: Tap<'static, CAPACITY>, base: u8) {
    for burst in 0..BURSTS {
        Timer::after(BURST_GAP).await;
        for i in 0..BURST_LEN {
            tap.capture(base + (burst * BURST_LEN + i) as u8);
        }
    }
}
