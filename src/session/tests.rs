//! Session Module Tests
//!
//! ## Test Scopes
//! - **Graph**: route resolution, descendants and fan-in counts.
//! - **Fan-in**: tasks finalize exactly once, after all expected inputs.
//! - **Replies**: errors first, final gathers whole, `"result"` otherwise.
//! - **Timeout**: the timer abandons the session; `finish` cancels it.

#[cfg(test)]
mod tests {
    use crate::catalog::dataset::Catalog;
    use crate::catalog::types::{LiveNodes, Message, MessageType, Route};
    use crate::error::ConfigurationError;
    use crate::planner::planner::DistributedCommandPlanner;
    use crate::planner::types::{ProcessorOptions, ReducerSpec, Request};
    use crate::session::dispatcher::{ChannelDispatcher, Outbound};
    use crate::session::graph::{build_tasks, destinations, route_steps};
    use crate::session::session::Session;
    use crate::session::types::{DescendantMessage, RoutedStep, SessionId, SessionState};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;

    const LOCAL: &str = "127.0.0.1:10031/droonga";
    const SHARD_0: &str = "127.0.0.1:10031/droonga.000";
    const SHARD_1: &str = "127.0.0.1:10031/droonga.001";

    fn catalog() -> Catalog {
        Catalog::from_value(&json!({
            "datasets": {
                "Default": {
                    "replicas": [
                        {
                            "slices": [
                                { "volume": { "address": SHARD_0 } },
                                { "volume": { "address": SHARD_1 } }
                            ]
                        }
                    ]
                }
            }
        }))
        .unwrap()
    }

    fn live_nodes() -> LiveNodes {
        [LOCAL.to_string()].into_iter().collect()
    }

    /// Reduce `result` with sum over a scatter to both shards.
    fn routed_plan() -> Vec<RoutedStep> {
        let request = Request::new("search", "Default", json!({}));
        let mut planner = DistributedCommandPlanner::new("Default", request);
        planner.reduce([("result", ReducerSpec::from("sum"))]);
        planner.scatter(ProcessorOptions::default());

        route_steps(
            planner.plan().unwrap(),
            &catalog(),
            &live_nodes(),
            &Route::new(LOCAL),
        )
        .unwrap()
    }

    fn coordinator_session() -> (Session, UnboundedReceiver<Outbound>) {
        let (dispatcher, receiver) = ChannelDispatcher::new();
        let session = Session::from_plan(
            SessionId("session-1".to_string()),
            routed_plan(),
            |route| route.0 == LOCAL,
            Box::new(dispatcher),
        );
        (session, receiver)
    }

    fn drain(receiver: &mut UnboundedReceiver<Outbound>) -> Vec<Outbound> {
        let mut outbound = Vec::new();
        while let Ok(item) = receiver.try_recv() {
            outbound.push(item);
        }
        outbound
    }

    /// Plays both shards' answers for `errors` and `result`.
    fn feed_shards(session: &mut Session, errors: [Value; 2], results: [Value; 2]) {
        let [e0, e1] = errors;
        let [r0, r1] = results;
        session.receive("errors", e0);
        session.receive("result", r0);
        session.receive("errors", e1);
        session.receive("result", r1);
    }

    fn descendant_values(outbound: &[Outbound]) -> Vec<(String, Value)> {
        outbound
            .iter()
            .filter_map(|item| match item {
                Outbound::Dispatch { message, route } => {
                    assert_eq!(route.0, LOCAL);
                    Some((message.input.clone(), message.value.clone()))
                }
                _ => None,
            })
            .collect()
    }

    // ============================================================
    // GRAPH TESTS
    // ============================================================

    #[test]
    fn test_route_steps_sends_fan_in_steps_home() {
        let steps = routed_plan();

        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].routes, vec![Route::new(LOCAL)]);
        assert_eq!(steps[1].routes, vec![Route::new(LOCAL)]);
        assert_eq!(steps[2].routes, vec![Route::new(SHARD_0), Route::new(SHARD_1)]);
        assert_eq!(
            destinations(&steps),
            vec![Route::new(LOCAL), Route::new(SHARD_0), Route::new(SHARD_1)]
        );
    }

    #[test]
    fn test_route_steps_unknown_dataset() {
        let mut message = Message::new(MessageType::Scatter, "search");
        message.dataset = Some("Missing".to_string());
        let steps = vec![crate::planner::types::PlanStep::Processor(message)];

        let result = route_steps(steps, &catalog(), &live_nodes(), &Route::new(LOCAL));
        assert_eq!(
            result.unwrap_err(),
            ConfigurationError::UnknownDataset("Missing".to_string())
        );
    }

    #[test]
    fn test_build_tasks_counts_fan_in() {
        let graph = build_tasks(routed_plan(), |route| route.0 == LOCAL);

        assert_eq!(graph.tasks.len(), 2);
        assert!(graph.roots.is_empty());

        let reduce = &graph.tasks[0];
        assert_eq!(reduce.step.message.command, "sum");
        // two inputs, each produced by both shards
        assert_eq!(reduce.n_of_expects, 4);
        assert_eq!(
            reduce.step.descendants["result_reduced"],
            vec![Route::new(LOCAL)]
        );

        let gather = &graph.tasks[1];
        assert_eq!(gather.n_of_expects, 2);
        assert!(gather.step.descendants.is_empty());

        assert_eq!(graph.inputs["errors"], vec![0]);
        assert_eq!(graph.inputs["result"], vec![0]);
        assert_eq!(graph.inputs["result_reduced"], vec![1]);
    }

    #[test]
    fn test_build_tasks_shard_side_has_roots() {
        let graph = build_tasks(routed_plan(), |route| route.0 != LOCAL);

        assert_eq!(graph.tasks.len(), 2);
        assert_eq!(graph.roots, vec![0, 1]);
        assert_eq!(
            graph.tasks[0].step.descendants["errors"],
            vec![Route::new(LOCAL)]
        );
    }

    // ============================================================
    // FAN-IN TESTS
    // ============================================================

    #[test]
    fn test_full_fan_in_replies_once() {
        let (mut session, mut receiver) = coordinator_session();
        assert!(session.need_result());

        session.start();
        assert_eq!(session.n_dones(), 0);

        feed_shards(
            &mut session,
            [Value::Null, Value::Null],
            [json!(3), json!(4)],
        );

        // reduce finished and forwarded its outputs
        let outbound = drain(&mut receiver);
        let forwarded = descendant_values(&outbound);
        assert_eq!(
            forwarded,
            vec![
                ("errors_reduced".to_string(), Value::Null),
                ("result_reduced".to_string(), json!(7)),
            ]
        );
        assert_eq!(session.n_dones(), 1);

        for (name, value) in forwarded {
            session.receive(&name, value);
        }

        let outbound = drain(&mut receiver);
        assert_eq!(outbound, vec![Outbound::Reply(json!(7))]);
        assert_eq!(session.n_dones(), 2);
        assert!(session.done());
    }

    #[test]
    fn test_two_input_task_finalizes_exactly_once() {
        let (mut session, mut receiver) = coordinator_session();
        session.start();
        feed_shards(&mut session, [Value::Null, Value::Null], [json!(1), json!(1)]);
        drain(&mut receiver);

        session.receive("errors_reduced", Value::Null);
        assert!(drain(&mut receiver).is_empty(), "one of two inputs must not finalize");
        assert_eq!(session.n_dones(), 1);

        session.receive("result_reduced", json!(2));
        assert_eq!(drain(&mut receiver), vec![Outbound::Reply(json!(2))]);
        assert_eq!(session.n_dones(), 2);

        // a late duplicate must not post again
        session.receive("result_reduced", json!(2));
        assert!(drain(&mut receiver).is_empty());
        assert_eq!(session.n_dones(), 2);
    }

    #[test]
    fn test_unregistered_input_is_dropped() {
        let (mut session, mut receiver) = coordinator_session();
        session.start();

        session.receive("nobody_waits_for_this", json!({ "x": 1 }));

        assert_eq!(session.n_dones(), 0);
        assert!(drain(&mut receiver).is_empty());
        assert!(session.tasks().iter().all(|task| task.n_of_inputs == 0));
    }

    #[test]
    fn test_errors_become_the_reply() {
        let (mut session, mut receiver) = coordinator_session();
        session.start();
        feed_shards(
            &mut session,
            [json!({ SHARD_0: "table not found" }), Value::Null],
            [json!(1), json!(2)],
        );
        let forwarded = descendant_values(&drain(&mut receiver));
        for (name, value) in forwarded {
            session.receive(&name, value);
        }

        let outbound = drain(&mut receiver);
        assert_eq!(
            outbound,
            vec![Outbound::Reply(json!({
                "errors": { SHARD_0: "table not found" },
                "result": 3
            }))]
        );
    }

    #[test]
    fn test_final_gather_replies_with_everything() {
        let mut gather = Message::new(MessageType::Gather, "search_gather");
        gather.inputs = vec!["books".to_string()];
        gather.body = json!({ "books": { "output": "books" } });
        gather.post = true;

        let mut search = Message::new(MessageType::Scatter, "search");
        search.outputs = vec!["books".to_string()];

        let steps = vec![
            RoutedStep { message: gather, routes: vec![Route::new(LOCAL)] },
            RoutedStep { message: search, routes: vec![Route::new(SHARD_0)] },
        ];

        let (dispatcher, mut receiver) = ChannelDispatcher::new();
        let mut session = Session::from_plan(
            SessionId::new(),
            steps,
            |route| route.0 == LOCAL,
            Box::new(dispatcher),
        );
        session.start();
        session.receive("books", json!({ "count": 2, "records": [["a"], ["b"]] }));

        assert_eq!(
            drain(&mut receiver),
            vec![Outbound::Reply(json!({
                "books": { "count": 2, "records": [["a"], ["b"]] }
            }))]
        );
    }

    #[test]
    fn test_start_dispatches_root_tasks() {
        let (dispatcher, mut receiver) = ChannelDispatcher::new();
        let mut session = Session::from_plan(
            SessionId("shard-side".to_string()),
            routed_plan(),
            |route| route.0 != LOCAL,
            Box::new(dispatcher),
        );
        assert!(!session.need_result());

        session.start();

        let outbound = drain(&mut receiver);
        assert_eq!(outbound.len(), 2);
        for item in &outbound {
            let Outbound::Local(message) = item else {
                panic!("expected a local message, got {:?}", item);
            };
            assert_eq!(message.id.0, "shard-side");
            assert_eq!(message.step.command, "search");
            assert_eq!(message.descendants["errors"], vec![Route::new(LOCAL)]);
            assert_eq!(message.descendants["result"], vec![Route::new(LOCAL)]);

            let wire = serde_json::to_value(message).unwrap();
            assert_eq!(wire["descendants"]["result"], json!([LOCAL]));
        }
        assert_eq!(session.n_dones(), 2);
        assert!(session.done());
    }

    #[test]
    fn test_descendant_message_carries_session_id() {
        let (mut session, mut receiver) = coordinator_session();
        session.start();
        feed_shards(&mut session, [Value::Null, Value::Null], [json!(5), json!(5)]);

        let messages: Vec<DescendantMessage> = drain(&mut receiver)
            .into_iter()
            .filter_map(|item| match item {
                Outbound::Dispatch { message, .. } => Some(message),
                _ => None,
            })
            .collect();

        assert!(!messages.is_empty());
        assert!(messages.iter().all(|m| m.id.0 == "session-1"));
    }

    // ============================================================
    // TIMEOUT TESTS
    // ============================================================

    #[tokio::test]
    async fn test_timeout_fires_continuation() {
        let (mut session, _receiver) = coordinator_session();
        let (sender, fired) = tokio::sync::oneshot::channel();

        session.set_timeout(Duration::from_millis(20), move || {
            let _ = sender.send(());
        });
        assert_eq!(session.state(), SessionState::Running);

        tokio::time::timeout(Duration::from_secs(2), fired)
            .await
            .expect("timeout continuation should run")
            .unwrap();
        assert_eq!(session.state(), SessionState::TimedOut);
    }

    #[tokio::test]
    async fn test_finish_cancels_timeout() {
        let (mut session, _receiver) = coordinator_session();
        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = fired.clone();

        session.set_timeout(Duration::from_millis(50), move || {
            fired_clone.store(true, Ordering::SeqCst);
        });
        session.finish();

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!fired.load(Ordering::SeqCst));
        assert_eq!(session.state(), SessionState::Finished);
    }
}
