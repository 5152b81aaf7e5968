//! Tests for Markov-driven source and action nodes

use queue_simulator_core_rs::config::{MarkovConfig, MarkovRole};
use queue_simulator_core_rs::markov::TransitionTable;
use queue_simulator_core_rs::model::AtomicModel;
use queue_simulator_core_rs::nodes::{MarkovNode, MarkovPhase};
use queue_simulator_core_rs::{Job, JobId, Message, MessageBatch, OutputBag, Port};
use std::collections::BTreeMap;
use std::io::Write;

const GENERATOR: &str = r#"{ "states": [
    { "name": "generating", "transitions": [
        { "to": "emitted", "weight": 1.0, "holding_time": { "kind": "fixed", "value": 2.0 } } ] } ] }"#;

const SERVICE: &str = r#"{ "states": [
    { "name": "queued", "transitions": [
        { "to": "serving", "weight": 1.0, "holding_time": { "kind": "fixed", "value": 1.0 } } ] },
    { "name": "serving", "transitions": [
        { "to": "done", "weight": 3.0, "holding_time": { "kind": "fixed", "value": 5.0 } },
        { "to": "dropped", "weight": 1.0, "holding_time": { "kind": "fixed", "value": 5.0 } } ] },
    { "name": "timed_out" }
] }"#;

fn config(role: MarkovRole, home: &str, routes: &[(&str, &str)]) -> MarkovConfig {
    MarkovConfig {
        name: "node".to_string(),
        role,
        input_ports: match role {
            MarkovRole::Source => vec![],
            MarkovRole::Action => vec!["in".to_string()],
        },
        output_ports: vec!["out".to_string(), "side".to_string()],
        table_path: None,
        home_state: home.to_string(),
        max_time_advance: f64::INFINITY,
        continuation_state: None,
        seed: 2349991 + 19,
        routes: routes
            .iter()
            .map(|(state, port)| (state.to_string(), port.to_string()))
            .collect::<BTreeMap<_, _>>(),
    }
}

/// Advance to the node's next internal event, returning its output
fn fire<M: AtomicModel>(node: &mut M, clock: &mut f64) -> OutputBag {
    *clock += node.time_advance();
    let out = node.output();
    node.internal_transition().unwrap();
    out
}

fn job(id: &str) -> MessageBatch {
    let mut batch = MessageBatch::new();
    batch.push("in", Message::new(Job::new(id)));
    batch
}

#[test]
fn test_source_numbers_jobs_from_one() {
    let table = TransitionTable::from_json_str(GENERATOR).unwrap();
    let cfg = config(MarkovRole::Source, "generating", &[("emitted", "out")]);
    let mut node = MarkovNode::from_table(cfg, table).unwrap();

    let mut clock = 0.0;
    let mut emitted = Vec::new();
    while clock + node.time_advance() < 7.0 {
        let out = fire(&mut node, &mut clock);
        for message in out.messages(&Port::from("out")) {
            emitted.push((clock, message.job.id().clone()));
        }
    }

    assert_eq!(
        emitted,
        vec![
            (2.0, JobId::Number(1)),
            (4.0, JobId::Number(2)),
            (6.0, JobId::Number(3)),
        ]
    );
    assert_eq!(node.generated_count(), 4);
}

#[test]
fn test_action_routes_by_exit_state() {
    let table = TransitionTable::from_json_str(SERVICE).unwrap();
    let mut node = MarkovNode::from_table(
        config(MarkovRole::Action, "queued", &[("done", "out"), ("dropped", "side")]),
        table,
    )
    .unwrap();

    node.external_transition(0.0, job("a")).unwrap();
    let mut clock = 0.0;
    let mut routed = Vec::new();
    while node.markov_phase() != MarkovPhase::Passive {
        let out = fire(&mut node, &mut clock);
        for port in ["out", "side"] {
            if !out.messages(&Port::from(port)).is_empty() {
                routed.push(port);
            }
        }
    }

    assert_eq!(routed.len(), 1);
    assert_eq!(node.dispatched_count(), 1);
    assert_eq!(clock, 6.0);
    assert!(node.current_job().is_none());
}

#[test]
fn test_intermediate_state_unrouted_emits_nothing() {
    let table = TransitionTable::from_json_str(SERVICE).unwrap();
    let mut node =
        MarkovNode::from_table(config(MarkovRole::Action, "queued", &[("done", "out")]), table)
            .unwrap();

    node.external_transition(0.0, job("a")).unwrap();
    let mut clock = 0.0;
    // decision in queued, then the hold toward serving
    assert!(fire(&mut node, &mut clock).is_empty());
    assert!(fire(&mut node, &mut clock).is_empty());
    assert_eq!(node.phase(), "serving");
}

#[test]
fn test_unrouted_exit_counts_as_lost() {
    let table = TransitionTable::from_json_str(SERVICE).unwrap();
    let mut node =
        MarkovNode::from_table(config(MarkovRole::Action, "queued", &[]), table).unwrap();

    node.external_transition(0.0, job("a")).unwrap();
    let mut clock = 0.0;
    while node.markov_phase() != MarkovPhase::Passive {
        fire(&mut node, &mut clock);
    }

    assert_eq!(node.lost_count(), 1);
    assert_eq!(node.dispatched_count(), 0);
    assert_eq!(node.throughput(), 0.0);
}

#[test]
fn test_clamped_service_dwells_ceiling_then_continuation() {
    let table = TransitionTable::from_json_str(SERVICE).unwrap();
    let mut cfg = config(MarkovRole::Action, "serving", &[("done", "out")]);
    cfg.max_time_advance = 2.5;
    cfg.continuation_state = Some("timed_out".to_string());
    let mut node = MarkovNode::from_table(cfg, table).unwrap();

    node.external_transition(1.0, job("a")).unwrap();
    let mut clock = 1.0;

    fire(&mut node, &mut clock); // decision: sampled 5.0, clamped
    assert_eq!(node.time_advance(), 2.5);

    let out = fire(&mut node, &mut clock);
    assert!(out.is_empty());
    assert_eq!(clock, 3.5);
    assert_eq!(node.phase(), "timed_out");

    fire(&mut node, &mut clock);
    assert_eq!(node.markov_phase(), MarkovPhase::Passive);
    assert_eq!(node.lost_count(), 1);
}

#[test]
fn test_routed_continuation_is_emitted_and_dispatched() {
    let table = TransitionTable::from_json_str(SERVICE).unwrap();
    let routes = [("done", "out"), ("timed_out", "side")];
    let mut cfg = config(MarkovRole::Action, "serving", &routes);
    cfg.max_time_advance = 2.0;
    cfg.continuation_state = Some("timed_out".to_string());
    let mut node = MarkovNode::from_table(cfg, table).unwrap();

    node.external_transition(1.0, job("a")).unwrap();
    let mut clock = 1.0;

    let mut emitted = Vec::new();
    while node.markov_phase() != MarkovPhase::Passive {
        let out = fire(&mut node, &mut clock);
        assert!(out.messages(&Port::from("out")).is_empty());
        for message in out.messages(&Port::from("side")) {
            emitted.push((clock, message.job.id().clone()));
        }
    }

    assert_eq!(emitted, vec![(3.0, JobId::Text("a".to_string()))]);
    assert_eq!(node.dispatched_count(), emitted.len());
    assert_eq!(node.lost_count(), 0);
    assert_eq!(node.throughput(), 1.0 / 3.0);
}

#[test]
fn test_busy_node_records_losses() {
    let table = TransitionTable::from_json_str(SERVICE).unwrap();
    let mut node =
        MarkovNode::from_table(config(MarkovRole::Action, "queued", &[("done", "out")]), table)
            .unwrap();

    node.external_transition(1.0, job("a")).unwrap();
    node.external_transition(0.0, job("b")).unwrap();
    node.external_transition(0.0, job("c")).unwrap();

    assert_eq!(node.received_count(), 3);
    assert_eq!(node.lost_count(), 2);
    assert_eq!(node.current_job(), Some(&Job::new("a")));

    let last = node.sink().log().markov_records().last().cloned().unwrap();
    assert_eq!(last.lost_count, 2);
    assert_eq!(last.arrival_rate, 3.0);
    assert_eq!(node.sink().log().len(), 3);
}

#[test]
fn test_arrival_rate_guarded_at_time_zero() {
    let table = TransitionTable::from_json_str(SERVICE).unwrap();
    let mut node =
        MarkovNode::from_table(config(MarkovRole::Action, "queued", &[]), table).unwrap();

    node.external_transition(0.0, job("a")).unwrap();
    assert_eq!(node.arrival_rate(), 0.0);
}

#[test]
fn test_identical_nodes_replay_identically() {
    let run = || {
        let json = r#"{ "states": [
            { "name": "idle", "transitions": [ { "to": "busy", "weight": 1.0 }, { "to": "off", "weight": 0.2 } ] },
            { "name": "busy", "transitions": [ { "to": "idle", "weight": 3.0 } ] } ] }"#;
        let table = TransitionTable::from_json_str(json).unwrap();
        let mut node =
            MarkovNode::from_table(config(MarkovRole::Source, "idle", &[("off", "out")]), table)
                .unwrap();
        let mut clock = 0.0;
        let mut trace = Vec::new();
        for _ in 0..300 {
            fire(&mut node, &mut clock);
            trace.push((node.phase(), node.time_advance()));
        }
        (trace, node.generated_count())
    };
    assert_eq!(run(), run());
}

#[test]
fn test_dwell_records_exposed() {
    let table = TransitionTable::from_json_str(GENERATOR).unwrap();
    let cfg = config(MarkovRole::Source, "generating", &[("emitted", "out")]);
    let mut node = MarkovNode::from_table(cfg, table).unwrap();
    let generating = node.home_state();

    let mut clock = 0.0;
    for _ in 0..9 {
        fire(&mut node, &mut clock);
    }

    let (_, record) = node
        .dwell_records()
        .find(|(state, _)| *state == generating)
        .unwrap();
    assert_eq!(record.visit_count, 3);
    assert_eq!(record.cumulative_elapsed_time, 6.0);
}

#[test]
fn test_new_loads_table_from_path() {
    let path = std::env::temp_dir().join(format!("markov_node_{}.json", std::process::id()));
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(GENERATOR.as_bytes()).unwrap();
    drop(file);

    let mut cfg = config(MarkovRole::Source, "generating", &[("emitted", "out")]);
    cfg.table_path = Some(path.clone());
    let node = MarkovNode::new(cfg);
    std::fs::remove_file(&path).unwrap();

    let node = node.unwrap();
    assert_eq!(node.state_name(node.home_state()), "generating");
}
