//! End-to-end annotation scenarios against the public facade.

use std::fs;
use std::thread;
use vernier_core::prelude::*;

fn runtime() -> Vernier {
    Vernier::create(RuntimeConfig::default().with_output("none"))
}

fn string_attr(rt: &Vernier, name: &str) -> Attribute {
    rt.create_attribute(name, AttributeType::String, AttributeProperties::empty())
        .unwrap()
}

/// Snapshot an environment with the documented grow-and-retry contract.
fn snapshot(rt: &Vernier, env: EnvironmentId) -> Vec<ContextRecord> {
    let mut buf = vec![0u64; rt.context_size(env)];
    loop {
        let required = rt.get_context(env, &mut buf).unwrap();
        if required <= buf.len() {
            return rt.unpack(&buf[..required]).unwrap();
        }
        buf.resize(required, 0);
    }
}

fn chain_values(records: &[ContextRecord], attribute: &str) -> Vec<String> {
    records
        .iter()
        .flat_map(|r| &r.entries)
        .filter(|e| e.attribute == attribute)
        .map(|e| e.value.to_string())
        .collect()
}

#[test]
fn nested_function_annotations_round_trip() {
    let rt = runtime();
    let env = EnvironmentId::DEFAULT;
    let function = string_attr(&rt, "function");

    rt.begin(env, &function, b"foo").unwrap();
    rt.begin(env, &function, b"bar").unwrap();
    assert_eq!(chain_values(&snapshot(&rt, env), "function"), ["foo", "bar"]);

    rt.end(env, &function).unwrap();
    assert_eq!(chain_values(&snapshot(&rt, env), "function"), ["foo"]);

    rt.end(env, &function).unwrap();
    assert!(snapshot(&rt, env).is_empty());
}

#[test]
fn inline_counter_set_and_end() {
    let rt = runtime();
    let env = EnvironmentId::DEFAULT;
    let count = rt
        .create_attribute(
            "count",
            AttributeType::Uint,
            AttributeProperties::STORE_AS_VALUE,
        )
        .unwrap();

    rt.set(env, &count, &7u64.to_le_bytes()).unwrap();

    let records = snapshot(&rt, env);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].entries[0].value, Variant::Uint(7));

    rt.end(env, &count).unwrap();
    assert_eq!(rt.get(env, count.id()), None);
    assert!(snapshot(&rt, env).is_empty());
}

#[test]
fn out_of_order_ends_leave_other_attributes_intact() {
    let rt = runtime();
    let env = EnvironmentId::DEFAULT;
    let a = string_attr(&rt, "a");
    let b = string_attr(&rt, "b");

    rt.begin(env, &a, b"x").unwrap();
    rt.begin(env, &b, b"y").unwrap();
    rt.end(env, &a).unwrap();

    let records = snapshot(&rt, env);
    assert_eq!(chain_values(&records, "a"), Vec::<String>::new());
    assert_eq!(chain_values(&records, "b"), ["y"]);
}

#[test]
fn global_attribute_overlays_every_environment() {
    let rt = runtime();
    let env0 = EnvironmentId::DEFAULT;
    let pid = rt
        .create_attribute(
            "pid",
            AttributeType::Uint,
            AttributeProperties::STORE_AS_VALUE | AttributeProperties::GLOBAL,
        )
        .unwrap();

    rt.set(env0, &pid, &1234u64.to_le_bytes()).unwrap();

    let env1 = rt.clone_environment(env0);
    let records = snapshot(&rt, env1);
    assert_eq!(chain_values(&records, "pid"), ["1234"]);

    // Environments that were never written still see the overlay.
    let records = snapshot(&rt, EnvironmentId::new(5));
    assert_eq!(chain_values(&records, "pid"), ["1234"]);
}

#[test]
fn cloned_environments_are_isolated() {
    let rt = runtime();
    let env0 = EnvironmentId::DEFAULT;
    let phase = string_attr(&rt, "phase");

    rt.begin(env0, &phase, b"setup").unwrap();
    let env1 = rt.clone_environment(env0);

    rt.begin(env1, &phase, b"solve").unwrap();
    rt.end(env0, &phase).unwrap();

    assert_eq!(chain_values(&snapshot(&rt, env0), "phase"), Vec::<String>::new());
    assert_eq!(
        chain_values(&snapshot(&rt, env1), "phase"),
        ["setup", "solve"]
    );
}

#[test]
fn concurrent_begins_intern_a_single_node() {
    let rt = runtime();
    let region = string_attr(&rt, "region");

    // Clone the (still empty) default environment up front so every thread
    // begins under the root.
    let mut envs = vec![EnvironmentId::DEFAULT];
    envs.extend((0..7).map(|_| rt.clone_environment(EnvironmentId::DEFAULT)));

    let slots: Vec<NodeId> = thread::scope(|scope| {
        let handles: Vec<_> = envs
            .iter()
            .map(|&env| {
                let rt = &rt;
                let region = &region;
                scope.spawn(move || {
                    rt.begin(env, region, b"shared").unwrap();
                    rt.get(env, region.id()).unwrap().as_node().unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    // Strict dedup: every environment adopted the same interned node.
    assert!(slots.windows(2).all(|pair| pair[0] == pair[1]));

    let mut matching = 0;
    rt.foreach_node(|node| {
        if node.attribute() == region.id() {
            assert_eq!(node.data(), b"shared");
            assert_eq!(node.parent(), None);
            matching += 1;
        }
    });
    assert_eq!(matching, 1);
}

#[test]
fn snapshots_race_mutators_without_deadlock() {
    let rt = runtime();
    let env = EnvironmentId::DEFAULT;
    let function = string_attr(&rt, "function");

    thread::scope(|scope| {
        let mutator = scope.spawn(|| {
            for i in 0..2000u32 {
                let name = format!("fn_{}", i % 7);
                rt.begin(env, &function, name.as_bytes()).unwrap();
                rt.end(env, &function).unwrap();
            }
        });

        let mut buf = vec![0u64; 64];
        while !mutator.is_finished() {
            match rt.get_context(env, &mut buf) {
                // Every successful snapshot decodes cleanly.
                Ok(written) => {
                    rt.unpack(&buf[..written]).unwrap();
                }
                // Contention with a writer is a refusal, never a hang.
                Err(err) => assert_eq!(err.code(), "unavailable"),
            }
        }
        mutator.join().unwrap();

        // Quiescent now: the snapshot must go through.
        let written = rt.get_context(env, &mut buf).unwrap();
        assert!(rt.unpack(&buf[..written]).unwrap().is_empty());
    });
}

#[test]
fn write_metadata_honors_the_output_setting() {
    // output = none succeeds and emits nothing.
    let dir = tempfile::tempdir().unwrap();
    let rt = Vernier::create(
        RuntimeConfig::default()
            .with_output("none")
            .with_output_dir(dir.path()),
    );
    let function = string_attr(&rt, "function");
    rt.begin(EnvironmentId::DEFAULT, &function, b"main").unwrap();
    assert!(rt.write_metadata());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);

    // An unknown writer name fails.
    let rt = Vernier::create(RuntimeConfig::default().with_output("exotic"));
    assert!(!rt.write_metadata());

    // The built-in csv writer produces both files.
    let dir = tempfile::tempdir().unwrap();
    let rt = Vernier::create(
        RuntimeConfig::default()
            .with_output("csv")
            .with_output_dir(dir.path()),
    );
    let function = string_attr(&rt, "function");
    rt.begin(EnvironmentId::DEFAULT, &function, b"main").unwrap();
    rt.begin(EnvironmentId::DEFAULT, &function, b"solve").unwrap();
    assert!(rt.write_metadata());

    let attrs = fs::read_to_string(dir.path().join("attributes.csv")).unwrap();
    assert!(attrs.contains("function"));
    let nodes = fs::read_to_string(dir.path().join("nodes.csv")).unwrap();
    assert!(nodes.contains("main"));
    assert!(nodes.contains("solve"));
}

#[test]
fn attribute_identity_is_stable_across_lookups() {
    let rt = runtime();
    let first = rt
        .create_attribute("iteration", AttributeType::Uint, AttributeProperties::empty())
        .unwrap();
    let second = rt
        .create_attribute(
            "iteration",
            AttributeType::Int,
            AttributeProperties::STORE_AS_VALUE,
        )
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(second.attribute_type(), AttributeType::Uint);
    assert_eq!(rt.get_attribute(first.id()).name(), "iteration");
}
