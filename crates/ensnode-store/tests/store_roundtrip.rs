//! Checkpointing nodes through the ensemble store.

use std::fs;
use std::sync::Arc;
use std::thread;

use ensnode_error::EnsError;
use ensnode_node::kinds::gen_kw::GenKw;
use ensnode_node::{EnsembleConfig, Node, NodeRegistry};
use ensnode_store::{EnsembleStore, NodeKey};
use rand::SeedableRng;
use rand::rngs::StdRng;

const DECK: &str = r#"
ensemble_size = 4
seed = 17

[[parameter]]
kind = "gen_kw"
name = "MULTFLT"
elements = [{ name = "F1" }, { name = "F2" }, { name = "F3" }]

[[parameter]]
kind = "field"
name = "PORO"
dims = [3, 2, 1]
file = "PORO.bin"
"#;

fn setup() -> (tempfile::TempDir, EnsembleStore, EnsembleConfig, NodeRegistry) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = EnsembleStore::open_or_create(dir.path().join("storage")).expect("store");
    let config = EnsembleConfig::from_toml_str(DECK).expect("config");
    (dir, store, config, NodeRegistry::with_builtin_kinds())
}

// ─── Round-trip ─────────────────────────────────────────────────────────

#[test]
fn sampled_node_survives_checkpoint() {
    let (_dir, store, config, registry) = setup();
    let param = Arc::clone(config.parameter("MULTFLT").expect("param"));

    let mut node = Node::alloc(&registry, Arc::clone(&param)).expect("alloc");
    node.sample(&mut StdRng::seed_from_u64(config.seed)).expect("sample");
    store.save_node(&node, 2, 0).expect("save");

    let mut restored = Node::new(&registry, param).expect("node");
    store.load_node(&mut restored, 2, 0).expect("load");
    assert_eq!(restored.payload(), node.payload());

    let key = NodeKey::new("MULTFLT", 2, 0).expect("key");
    assert!(store.has_node(&key));
    assert!(!store.has_node(&NodeKey::new("MULTFLT", 2, 1).expect("key")));
}

#[test]
fn absent_payload_survives_checkpoint() {
    let (_dir, store, config, registry) = setup();
    let param = Arc::clone(config.parameter("PORO").expect("param"));
    let empty = Node::new(&registry, Arc::clone(&param)).expect("node");
    store.save_node(&empty, 0, 5).expect("save");

    let mut restored = Node::alloc(&registry, param).expect("alloc");
    store.load_node(&mut restored, 0, 5).expect("load");
    assert!(!restored.has_payload());
}

#[test]
fn later_save_replaces_earlier() {
    let (_dir, store, config, registry) = setup();
    let param = Arc::clone(config.parameter("MULTFLT").expect("param"));
    let mut node = Node::alloc(&registry, Arc::clone(&param)).expect("alloc");
    store.save_node(&node, 0, 0).expect("first save");
    node.payload_as_mut::<GenKw>().expect("gen_kw").values_mut()[1] = 9.5;
    store.save_node(&node, 0, 0).expect("second save");

    let mut restored = Node::new(&registry, param).expect("node");
    store.load_node(&mut restored, 0, 0).expect("load");
    assert_eq!(
        restored.payload_as::<GenKw>().expect("gen_kw").values(),
        &[0.0, 9.5, 0.0]
    );
}

// ─── Corruption ─────────────────────────────────────────────────────────

#[test]
fn flipped_byte_on_disk_is_corrupt_record() {
    let (_dir, store, config, registry) = setup();
    let param = Arc::clone(config.parameter("PORO").expect("param"));
    let node = Node::alloc(&registry, Arc::clone(&param)).expect("alloc");
    store.save_node(&node, 1, 1).expect("save");

    let path = store.path_for(&NodeKey::new("PORO", 1, 1).expect("key"));
    let mut bytes = fs::read(&path).expect("read");
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0xFF;
    fs::write(&path, bytes).expect("write");

    let mut restored = Node::new(&registry, param).expect("node");
    let err = store.load_node(&mut restored, 1, 1).unwrap_err();
    assert!(matches!(err, EnsError::CorruptRecord { .. }));
    assert!(err.is_recoverable());
    assert!(!restored.has_payload());
}

#[test]
fn record_of_another_kind_is_kind_mismatch() {
    let (_dir, store, config, registry) = setup();
    let poro = Node::alloc(
        &registry,
        Arc::clone(config.parameter("PORO").expect("param")),
    )
    .expect("alloc");
    let mut writer = store
        .open_for_write(NodeKey::new("MULTFLT", 0, 0).expect("key"))
        .expect("writer");
    poro.store(writer.buffer()).expect("store");
    writer.commit().expect("commit");

    let mut target = Node::new(
        &registry,
        Arc::clone(config.parameter("MULTFLT").expect("param")),
    )
    .expect("node");
    let err = store.load_node(&mut target, 0, 0).unwrap_err();
    assert!(matches!(err, EnsError::KindMismatch { expected: 107, found: 104, .. }));
}

// ─── Concurrency ────────────────────────────────────────────────────────

#[test]
fn members_checkpoint_in_parallel() {
    let (_dir, store, config, registry) = setup();
    let param = Arc::clone(config.parameter("MULTFLT").expect("param"));

    let nodes: Vec<Node> = (0..config.ensemble_size)
        .map(|member| {
            let mut node = Node::alloc(&registry, Arc::clone(&param)).expect("alloc");
            let seed = config.seed + u64::try_from(member).expect("member");
            node.sample(&mut StdRng::seed_from_u64(seed)).expect("sample");
            node
        })
        .collect();

    thread::scope(|scope| {
        for (member, node) in nodes.iter().enumerate() {
            let store = &store;
            scope.spawn(move || store.save_node(node, member, 3).expect("save"));
        }
    });

    for (member, node) in nodes.iter().enumerate() {
        let mut restored = Node::new(&registry, Arc::clone(&param)).expect("node");
        store.load_node(&mut restored, member, 3).expect("load");
        assert_eq!(restored.payload(), node.payload(), "member={member}");
    }
}
