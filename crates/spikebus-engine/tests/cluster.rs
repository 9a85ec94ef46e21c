//! End-to-end cluster scenarios: spike routing across nodes, plasticity on
//! bus-delivered spikes, and the deployment/lifecycle protocol.

use spikebus_engine::{Cluster, EngineConfig, EngineState};
use spikebus_store::BackingStore;
use spikebus_transport::{
    split_into_frames, BusTarget, Command, FramePayload, DEFAULT_CHUNK_SIZE,
    DEFAULT_TIMEOUT_TICKS,
};
use spikebus_wire::{GlobalId, LocalId, NodeId, NeuronRecord, SynapseEntry, NEVER_SPIKED};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn gid(node: u8, local: u16) -> GlobalId {
    GlobalId::new(NodeId::new(node), LocalId::new(local))
}

fn encode_table(records: &[NeuronRecord]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for record in records {
        bytes.extend_from_slice(&record.encode());
    }
    bytes
}

fn load_table_payload(records: &[NeuronRecord]) -> Vec<u8> {
    let mut payload = (records.len() as u32).to_le_bytes().to_vec();
    payload.extend_from_slice(&encode_table(records));
    payload
}

/// Three nodes. Node 1 listens to node 0's neuron; node 2 listens to a
/// source that never fires. A spike on node 0 must cross the bus and fire
/// node 1's neuron, and must leave node 2 untouched.
#[test]
fn test_spike_crosses_nodes() {
    init_logging();
    let mut cluster = Cluster::new();
    for n in 0..3u8 {
        cluster
            .add_node(EngineConfig::new(NodeId::new(n)).with_max_neurons(8))
            .unwrap();
    }

    let sender = NeuronRecord::new(gid(0, 0), 1.0, 0.01, 2);
    cluster
        .load_table(NodeId::new(0), &encode_table(&[sender]), 1)
        .unwrap();

    let mut listener = NeuronRecord::new(gid(1, 0), 1.0, 0.01, 2);
    listener
        .add_synapse(SynapseEntry::quantized(gid(0, 0), 1.2))
        .unwrap();
    cluster
        .load_table(NodeId::new(1), &encode_table(&[listener]), 1)
        .unwrap();

    let mut bystander = NeuronRecord::new(gid(2, 0), 1.0, 0.01, 2);
    bystander
        .add_synapse(SynapseEntry::quantized(gid(0, 5), 1.2))
        .unwrap();
    cluster
        .load_table(NodeId::new(2), &encode_table(&[bystander]), 1)
        .unwrap();

    cluster.start_all().unwrap();
    cluster
        .engine_mut(NodeId::new(0))
        .unwrap()
        .inject(LocalId::new(0), 1.0)
        .unwrap();
    cluster.run_steps(4).unwrap();

    let s0 = cluster.engine(NodeId::new(0)).unwrap().stats();
    let s1 = cluster.engine(NodeId::new(1)).unwrap().stats();
    let s2 = cluster.engine(NodeId::new(2)).unwrap().stats();
    assert_eq!(s0.spikes_generated, 1);
    assert_eq!(s1.spikes_generated, 1, "listener must fire on the routed spike");
    assert_eq!(s1.spikes_received, 1);
    assert_eq!(s2.spikes_generated, 0, "bystander must stay silent");

    let fired = cluster
        .engine_mut(NodeId::new(1))
        .unwrap()
        .peek(LocalId::new(0))
        .unwrap();
    assert_ne!(fired.last_spike_tick, NEVER_SPIKED);
}

/// Causal pairing across the bus: the pre-synaptic neuron on node 0 spikes
/// a tick before the listener on node 1 fires, so the synapse potentiates.
#[test]
fn test_causal_pairing_potentiates_across_nodes() {
    init_logging();
    let mut cluster = Cluster::new();
    cluster
        .add_node(EngineConfig::new(NodeId::new(0)).with_max_neurons(4))
        .unwrap();
    cluster
        .add_node(EngineConfig::new(NodeId::new(1)).with_max_neurons(4))
        .unwrap();

    // Refractory 1 lets the sender fire on consecutive ticks
    let sender = NeuronRecord::new(gid(0, 0), 1.0, 0.01, 1);
    cluster
        .load_table(NodeId::new(0), &encode_table(&[sender]), 1)
        .unwrap();

    // Two incoming spikes of 0.5 are needed to cross 0.9, so the fire lands
    // one tick after the first pre spike
    let mut listener = NeuronRecord::new(gid(1, 0), 0.9, 0.01, 2);
    listener
        .add_synapse(SynapseEntry::quantized(gid(0, 0), 0.5))
        .unwrap();
    cluster
        .load_table(NodeId::new(1), &encode_table(&[listener]), 1)
        .unwrap();

    cluster.start_all().unwrap();
    for _ in 0..2 {
        cluster
            .engine_mut(NodeId::new(0))
            .unwrap()
            .inject(LocalId::new(0), 1.0)
            .unwrap();
        cluster.step_all().unwrap();
    }
    cluster.run_steps(2).unwrap();

    assert_eq!(cluster.engine(NodeId::new(1)).unwrap().stats().spikes_generated, 1);
    let record = cluster
        .engine_mut(NodeId::new(1))
        .unwrap()
        .peek(LocalId::new(0))
        .unwrap();
    assert!(
        record.synapses()[0].weight > 0.5,
        "weight {} did not potentiate",
        record.synapses()[0].weight
    );
}

/// Anti-causal pairing: the listener fires first, then the pre-synaptic
/// spike arrives, so the synapse depresses.
#[test]
fn test_anticausal_pairing_depresses_across_nodes() {
    init_logging();
    let mut cluster = Cluster::new();
    cluster
        .add_node(EngineConfig::new(NodeId::new(0)).with_max_neurons(4))
        .unwrap();
    cluster
        .add_node(EngineConfig::new(NodeId::new(1)).with_max_neurons(4))
        .unwrap();

    let sender = NeuronRecord::new(gid(0, 0), 1.0, 0.01, 2);
    cluster
        .load_table(NodeId::new(0), &encode_table(&[sender]), 1)
        .unwrap();

    let mut listener = NeuronRecord::new(gid(1, 0), 0.9, 0.01, 2);
    listener
        .add_synapse(SynapseEntry::quantized(gid(0, 0), 0.5))
        .unwrap();
    cluster
        .load_table(NodeId::new(1), &encode_table(&[listener]), 1)
        .unwrap();

    cluster.start_all().unwrap();

    // Listener fires at tick 1 from direct stimulus
    cluster
        .engine_mut(NodeId::new(1))
        .unwrap()
        .inject(LocalId::new(0), 1.0)
        .unwrap();
    cluster.step_all().unwrap();

    // Sender fires at tick 2; its spike reaches the listener after the fire
    cluster
        .engine_mut(NodeId::new(0))
        .unwrap()
        .inject(LocalId::new(0), 1.0)
        .unwrap();
    cluster.run_steps(2).unwrap();

    let record = cluster
        .engine_mut(NodeId::new(1))
        .unwrap()
        .peek(LocalId::new(0))
        .unwrap();
    assert!(
        record.synapses()[0].weight < 0.5,
        "weight {} did not depress",
        record.synapses()[0].weight
    );
}

/// Full deployment lifecycle over the bus: a controller endpoint ships a
/// table via the multi-frame protocol, starts the node, and stops it.
#[test]
fn test_bus_driven_deploy_start_stop() {
    init_logging();
    let mut cluster = Cluster::new();
    cluster
        .add_node(EngineConfig::new(NodeId::new(0)).with_max_neurons(8))
        .unwrap();
    let controller = cluster.bus().register(NodeId::new(9));

    let record = NeuronRecord::new(gid(0, 0), 1.0, 0.1, 2);
    let payload = load_table_payload(&[record]);
    let frames = split_into_frames(
        NodeId::new(9),
        BusTarget::Node(NodeId::new(0)),
        Command::LoadTable,
        &payload,
        DEFAULT_CHUNK_SIZE,
    )
    .unwrap();
    controller.send_all(frames).unwrap();
    cluster.poll_all();
    assert_eq!(
        cluster.engine(NodeId::new(0)).unwrap().state(),
        EngineState::Loaded
    );
    assert_eq!(cluster.engine(NodeId::new(0)).unwrap().stats().neurons_loaded, 1);

    controller
        .send(
            BusTarget::Node(NodeId::new(0)),
            FramePayload::Command {
                op: Command::Start,
                arg: None,
            },
        )
        .unwrap();
    cluster.poll_all();
    assert_eq!(
        cluster.engine(NodeId::new(0)).unwrap().state(),
        EngineState::Running
    );

    cluster.run_steps(2).unwrap();

    // Stop is honored at the end of the next timestep
    controller
        .send(
            BusTarget::Node(NodeId::new(0)),
            FramePayload::Command {
                op: Command::Stop,
                arg: None,
            },
        )
        .unwrap();
    cluster.run_steps(1).unwrap();
    assert_eq!(
        cluster.engine(NodeId::new(0)).unwrap().state(),
        EngineState::Stopped
    );
}

/// A corrupted deployment transfer is discarded whole: the node stays
/// uninitialized and its store receives nothing.
#[test]
fn test_corrupt_deployment_discarded() {
    init_logging();
    let mut cluster = Cluster::new();
    cluster
        .add_node(EngineConfig::new(NodeId::new(0)).with_max_neurons(8))
        .unwrap();
    let controller = cluster.bus().register(NodeId::new(9));

    let record = NeuronRecord::new(gid(0, 0), 1.0, 0.1, 2);
    let payload = load_table_payload(&[record]);
    let mut frames = split_into_frames(
        NodeId::new(9),
        BusTarget::Node(NodeId::new(0)),
        Command::LoadTable,
        &payload,
        DEFAULT_CHUNK_SIZE,
    )
    .unwrap();
    if let FramePayload::FrameData { chunk, .. } = &mut frames[3].payload {
        chunk[0] ^= 0xFF;
    } else {
        panic!("expected a data frame");
    }
    controller.send_all(frames).unwrap();
    cluster.poll_all();

    let engine = cluster.engine(NodeId::new(0)).unwrap();
    assert_eq!(engine.state(), EngineState::Uninitialized);
    assert_eq!(engine.stats().transfers_discarded, 1);
    assert!(engine.store().is_empty());
}

/// A transfer that stalls before the node ever runs must still time out:
/// control polling alone has to expire it.
#[test]
fn test_stalled_transfer_expires_while_idle() {
    init_logging();
    let mut cluster = Cluster::new();
    cluster
        .add_node(EngineConfig::new(NodeId::new(0)).with_max_neurons(8))
        .unwrap();
    let controller = cluster.bus().register(NodeId::new(9));

    // Open a transfer and never finish it
    controller
        .send(
            BusTarget::Node(NodeId::new(0)),
            FramePayload::FrameStart {
                op: Command::LoadTable,
                total_len: 64,
            },
        )
        .unwrap();

    for _ in 0..(DEFAULT_TIMEOUT_TICKS + 2) {
        cluster.poll_all();
    }

    let engine = cluster.engine(NodeId::new(0)).unwrap();
    assert_eq!(engine.stats().transfers_discarded, 1);
    assert_eq!(engine.state(), EngineState::Uninitialized);
}

/// Ping is answered to the sender with the argument byte echoed back.
#[test]
fn test_ping_echo() {
    init_logging();
    let mut cluster = Cluster::new();
    cluster
        .add_node(EngineConfig::new(NodeId::new(0)).with_max_neurons(4))
        .unwrap();
    let controller = cluster.bus().register(NodeId::new(9));

    controller
        .send(
            BusTarget::Node(NodeId::new(0)),
            FramePayload::Command {
                op: Command::Ping,
                arg: Some(0x5A),
            },
        )
        .unwrap();
    cluster.poll_all();

    let frames = controller.drain();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].source, NodeId::new(0));
    assert_eq!(
        frames[0].payload,
        FramePayload::Command {
            op: Command::Ping,
            arg: Some(0x5A),
        }
    );
}
