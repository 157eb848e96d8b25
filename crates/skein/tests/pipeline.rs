//! Two-stage pipeline through the public API: a constant producer
//! feeding an identity copier over connected ports.

use std::sync::Arc;

use skein::prelude::*;
use skein_test_utils::{ConstModule, IdentityModule};

#[test]
fn producer_feeds_consumer_through_ports() {
    let arena = skein_test_utils::test_arena("pipeline-test");

    let mut producer_ports = PortSet::new();
    let mut consumer_ports = PortSet::new();
    producer_ports.create_output_port("out").unwrap();
    consumer_ports.create_input_port("in").unwrap();
    consumer_ports.create_output_port("copy_out").unwrap();
    PortSet::connect(&mut producer_ports, "out", &mut consumer_ports, "in").unwrap();

    // Each module is its own single-rank replica group.
    let producer = skein::module::spawn(
        Box::new(ConstModule::new("source", "out", 7.0, 4)),
        Arc::clone(&arena),
        ModuleId(1),
        producer_ports,
        Arc::new(LocalCollective::group(1).remove(0)),
        None,
        RunnerConfig::default(),
    )
    .unwrap();
    let consumer = skein::module::spawn(
        Box::new(IdentityModule::new("copy", "in", "copy_out")),
        Arc::clone(&arena),
        ModuleId(2),
        consumer_ports,
        Arc::new(LocalCollective::group(1).remove(0)),
        None,
        RunnerConfig::default(),
    )
    .unwrap();

    // Drive the producer to completion first so the consumer's input
    // queue is populated.
    assert!(producer.execute(ExecutionId(1), TimestepList::new()));
    let finished = producer.status().recv().unwrap();
    assert!(finished.text.contains("finished"), "got: {finished}");

    assert!(consumer.execute(ExecutionId(1), TimestepList::new()));
    let finished = consumer.status().recv().unwrap();
    assert!(
        finished.severity == Severity::Info && finished.text.contains("finished"),
        "consumer reported: {finished}"
    );

    // Source object plus its deep copy are both live in the arena.
    assert_eq!(arena.metrics().object_count, 2);
    let directory = arena.directory_snapshot();
    assert_eq!(directory.len(), 2);
    for (name, _refs) in directory {
        let object = arena.lookup(&name).unwrap();
        assert_eq!(&*object.read(), &[7.0; 4]);
    }

    producer.join();
    consumer.join();
}
