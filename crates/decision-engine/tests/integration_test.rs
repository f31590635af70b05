//! 决策引擎集成测试
//!
//! 覆盖条件求值、FEEL-lite 编译与五种命中策略的完整工作流。

use decision_engine::{
    Condition, Context, DecisionTable, DecisionTableDefinition, EvaluationEngine, FetchClient,
    HitPolicy, Resolution, RuleError, TableStore, compile_cell,
};
use mockall::mock;
use serde_json::{Map, Value, json};
use std::sync::Arc;

mock! {
    pub Fetcher {}

    impl FetchClient for Fetcher {
        fn fetch(&self, endpoint: &str, params: &Map<String, Value>) -> decision_engine::Result<Value>;
    }
}

/// 创建测试上下文：模拟一个购买事件
fn create_purchase_context() -> Context {
    Context::new(json!({
        "event": {"type": "PURCHASE", "timestamp": "2024-01-15T10:00:00Z", "source": "mobile_app"},
        "order": {
            "id": "order-12345",
            "amount": 1500,
            "currency": "CNY",
            "categories": ["ticket", "food"]
        },
        "user": {
            "id": "user-67890",
            "level": "gold",
            "is_vip": true,
            "tags": ["frequent_visitor", "annual_pass"],
            "email": "visitor@example.com",
            "home": {"lat": 31.2304, "lon": 121.4737}
        }
    }))
}

fn table_from(definition: Value) -> DecisionTable {
    let engine = EvaluationEngine::new();
    let definition: DecisionTableDefinition = serde_json::from_value(definition).unwrap();
    engine.compiler().compile_table(definition).unwrap()
}

fn score_table(hit_policy: &str, rows: Value) -> DecisionTable {
    table_from(json!({
        "id": "score",
        "hit_policy": hit_policy,
        "inputs": [{"field": "score"}],
        "outputs": [{"name": "band"}],
        "rules": rows
    }))
}

fn ctx_with(field: &str, value: Value) -> Context {
    let mut map = Map::new();
    map.insert(field.to_string(), value);
    Context::from_map(map)
}

#[test]
fn test_complex_condition_tree() {
    decision_shared::observability::init_for_tests();
    let engine = EvaluationEngine::new();
    let ctx = create_purchase_context();

    let condition: Condition = serde_json::from_value(json!({
        "all": [
            {"field": "event.type", "operator": "eq", "value": "PURCHASE"},
            {"field": "order.amount", "operator": "between", "value": {"min": 1000, "max": 2000}},
            {"field": "user.email", "operator": "matches", "value": "@example\\.com$"},
            {"any": [
                {"field": "user.tags", "operator": "contains_any", "value": ["annual_pass", "staff"]},
                {"field": "user.level", "operator": "eq", "value": "platinum"}
            ]},
            {"field": "user.home", "operator": "within_radius",
             "value": {"center": {"lat": 31.24, "lon": 121.49}, "radius_km": 5}}
        ]
    }))
    .unwrap();

    assert!(engine.evaluate(&condition, &ctx));

    let result = engine.evaluate_traced(&condition, &ctx);
    assert!(result.matched);
    assert_eq!(result.matched_conditions.len(), 5);
}

#[test]
fn test_between_forms_agree() {
    let engine = EvaluationEngine::new();
    for amount in [-1.0, 0.0, 5.5, 10.0, 10.5] {
        let ctx = ctx_with("amount", json!(amount));
        let pair = engine.evaluate(&Condition::field("amount", "between", json!([0, 10])), &ctx);
        let map = engine.evaluate(&Condition::field("amount", "between", json!({"min": 0, "max": 10})), &ctx);
        assert_eq!(pair, map, "amount {amount}");
    }
}

#[test]
fn test_present_and_blank_are_complements() {
    let engine = EvaluationEngine::new();
    for value in [json!(0), json!(false), json!(""), json!([]), json!({}), json!("x"), json!([1]), Value::Null] {
        let ctx = ctx_with("v", value.clone());
        let present = engine.evaluate(&Condition::field("v", "present", true), &ctx);
        let blank = engine.evaluate(&Condition::field("v", "blank", true), &ctx);
        assert_ne!(present, blank, "value {value}");
    }

    let engine_ctx = ctx_with("v", json!(0));
    assert!(engine.evaluate(&Condition::field("v", "present", true), &engine_ctx));
    let engine_ctx = ctx_with("v", json!(false));
    assert!(engine.evaluate(&Condition::field("v", "present", true), &engine_ctx));
}

#[test]
fn test_feel_truth_tables() {
    let engine = EvaluationEngine::new();
    let samples = [17.999, 18.0, 18.001, 29.999, 30.0, 30.001];

    let cases: [(&str, [bool; 6]); 6] = [
        ("[18..30]", [false, true, true, true, true, false]),
        ("[18..30)", [false, true, true, true, false, false]),
        ("(18..30]", [false, false, true, true, true, false]),
        ("(18..30)", [false, false, true, true, false, false]),
        (">= 18", [false, true, true, true, true, true]),
        ("-", [true, true, true, true, true, true]),
    ];

    for (cell, expected) in cases {
        let condition = compile_cell("age", cell).unwrap();
        for (sample, want) in samples.iter().zip(expected) {
            let ctx = ctx_with("age", json!(sample));
            assert_eq!(engine.evaluate(&condition, &ctx), want, "cell {cell} at {sample}");
        }
    }
}

#[test]
fn test_unique_policy_coverage_and_ambiguity() {
    let engine = EvaluationEngine::new();

    let complete = score_table("UNIQUE", json!([
        {"inputs": ["[0..100)"], "outputs": ["low"]},
        {"inputs": [">= 100"], "outputs": ["high"]}
    ]));
    for (score, band) in [(0.0, "low"), (99.5, "low"), (100.0, "high"), (150.0, "high")] {
        let resolution = engine.resolve(&complete, &ctx_with("score", json!(score))).unwrap();
        let decision = resolution.decision().unwrap();
        assert_eq!(decision.match_count, 1);
        assert_eq!(decision.outputs.get("band"), Some(&json!(band)));
    }

    let gap = score_table("UNIQUE", json!([
        {"inputs": ["[0..100)"], "outputs": ["low"]}
    ]));
    let err = engine.resolve(&gap, &ctx_with("score", json!(150))).unwrap_err();
    assert!(matches!(err, RuleError::CoverageGap { .. }));

    let overlapping = score_table("UNIQUE", json!([
        {"inputs": ["[0..100)"], "outputs": ["low"]},
        {"inputs": [">= 100"], "outputs": ["high"]},
        {"inputs": ["[40..60]"], "outputs": ["mid"]}
    ]));
    let err = engine.resolve(&overlapping, &ctx_with("score", json!(50))).unwrap_err();
    match err {
        RuleError::AmbiguousMatch { rule_ids, .. } => assert_eq!(rule_ids, vec!["score-r1", "score-r3"]),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_any_policy_conflict() {
    let engine = EvaluationEngine::new();
    let agreeing = table_from(json!({
        "id": "eligible",
        "hit_policy": "ANY",
        "inputs": [{"field": "age"}, {"field": "member"}],
        "outputs": [{"name": "eligible"}],
        "rules": [
            {"inputs": [">= 18", "-"], "outputs": [true]},
            {"inputs": ["-", "true"], "outputs": [true]}
        ]
    }));
    let ctx = Context::new(json!({"age": 30, "member": true}));
    let resolution = engine.resolve(&agreeing, &ctx).unwrap();
    let decision = resolution.decision().unwrap();
    assert_eq!(decision.outputs.get("eligible"), Some(&json!(true)));
    assert_eq!(decision.matched_rule_ids, vec!["eligible-r1", "eligible-r2"]);

    let mut conflicting = agreeing.clone();
    conflicting.rules[1].outputs.insert("eligible".to_string(), json!(false));
    let err = engine.resolve(&conflicting, &ctx).unwrap_err();
    assert!(matches!(err, RuleError::ConflictingOutput { .. }));
    assert!(err.is_model_error());
}

#[test]
fn test_collect_policy_annotations() {
    let engine = EvaluationEngine::new();
    let table = table_from(json!({
        "id": "offers",
        "hit_policy": "COLLECT",
        "inputs": [{"field": "user.level"}, {"field": "order.amount"}],
        "outputs": [{"name": "offer"}],
        "rules": [
            {"id": "vip", "inputs": ["\"gold\", \"platinum\"", "-"], "outputs": ["lounge"]},
            {"id": "small", "inputs": ["-", "< 100"], "outputs": ["coupon"]},
            {"id": "big", "inputs": ["-", ">= 1000"], "outputs": ["gift"]}
        ]
    }));

    let resolution = engine.resolve(&table, &create_purchase_context()).unwrap();
    let decision = resolution.decision().unwrap();
    assert_eq!(decision.hit_policy, HitPolicy::Collect);
    assert_eq!(decision.rule_id, "vip");
    assert_eq!(decision.outputs.get("offer"), Some(&json!("lounge")));
    assert_eq!(decision.matched_rule_ids, vec!["vip", "big"]);
    assert_eq!(decision.match_count, 2);
    assert_eq!(decision.matched_outputs[1].get("offer"), Some(&json!("gift")));
    assert_eq!(decision.confidence, 0.5);

    let ctx = Context::new(json!({"user": {"level": "basic"}, "order": {"amount": 500}}));
    assert_eq!(engine.resolve(&table, &ctx).unwrap(), Resolution::NoMatch);
}

#[test]
fn test_priority_uses_row_order() {
    let engine = EvaluationEngine::new();
    let table = score_table("PRIORITY", json!([
        {"inputs": [">= 90"], "outputs": ["A"]},
        {"inputs": [">= 50"], "outputs": ["B"]},
        {"inputs": ["-"], "outputs": ["C"]}
    ]));
    let resolution = engine.resolve(&table, &ctx_with("score", json!(95))).unwrap();
    assert_eq!(resolution.decision().unwrap().outputs.get("band"), Some(&json!("A")));
    let resolution = engine.resolve(&table, &ctx_with("score", json!(10))).unwrap();
    assert_eq!(resolution.decision().unwrap().rule_id, "score-r3");
}

#[test]
fn test_enrichment_feeds_later_conditions() {
    let mut fetcher = MockFetcher::new();
    fetcher
        .expect_fetch()
        .withf(|endpoint, params| endpoint == "/credit" && params.get("uid") == Some(&json!("user-67890")))
        .times(1)
        .returning(|_, _| Ok(json!({"result": {"score": 720, "grade": "A"}})));

    let engine = EvaluationEngine::new().with_fetcher(Arc::new(fetcher));
    let ctx = create_purchase_context();

    let condition: Condition = serde_json::from_value(json!({
        "all": [
            {"field": "user.id", "operator": "fetch_from_api", "value": {
                "endpoint": "/credit",
                "params": {"uid": "{{user.id}}"},
                "mapping": {"credit_score": "result.score", "credit_grade": "result.grade"}
            }},
            {"any": [
                {"field": "credit_score", "operator": "gte", "value": 700},
                {"field": "credit_grade", "operator": "eq", "value": "S"}
            ]}
        ]
    }))
    .unwrap();

    assert!(engine.evaluate(&condition, &ctx));
    assert!(ctx.get("credit_score").is_none());
}

#[test]
fn test_enrichment_failure_fails_closed() {
    let mut fetcher = MockFetcher::new();
    fetcher
        .expect_fetch()
        .returning(|_, _| Err(RuleError::Fetch("timeout".to_string())));

    let engine = EvaluationEngine::new().with_fetcher(Arc::new(fetcher));
    let condition = Condition::any(vec![
        Condition::field("user.id", "fetch_from_api", json!({"endpoint": "/credit"})),
        Condition::field("user.is_vip", "eq", true),
    ]);
    assert!(engine.evaluate(&condition, &create_purchase_context()));
    assert!(!engine.evaluate(
        &Condition::field("user.id", "fetch_from_api", json!({"endpoint": "/credit"})),
        &create_purchase_context()
    ));
}

#[test]
fn test_table_store_workflow() {
    let store = TableStore::new(Arc::new(EvaluationEngine::new()));
    let json = json!({
        "id": "risk",
        "name": "风险分级",
        "hit_policy": "FIRST",
        "inputs": [{"field": "order.amount"}, {"field": "user.is_vip"}],
        "outputs": [{"name": "level"}, {"name": "review"}],
        "rules": [
            {"inputs": ["> 10000", "-"], "outputs": ["high", true]},
            {"inputs": ["> 1000", "false"], "outputs": ["medium", true]},
            {"inputs": ["-", "-"], "outputs": ["low", false]}
        ]
    })
    .to_string();

    store.load_from_json(&json).unwrap();
    let resolution = store.resolve("risk", &create_purchase_context()).unwrap();
    let decision = resolution.decision().unwrap();
    assert_eq!(decision.outputs.get("level"), Some(&json!("low")));
    assert_eq!(decision.outputs.get("review"), Some(&json!(false)));

    store.delete("risk").unwrap();
    assert!(matches!(
        store.resolve("risk", &create_purchase_context()),
        Err(RuleError::TableNotFound(_))
    ));
}

#[test]
fn test_invalid_feel_cell_rejected_at_load() {
    let store = TableStore::default();
    let err = store
        .load_from_json(
            &json!({
                "id": "broken",
                "hit_policy": "FIRST",
                "inputs": [{"field": "x"}],
                "outputs": [{"name": "y"}],
                "rules": [{"inputs": ["[1..2"], "outputs": [1]}]
            })
            .to_string(),
        )
        .unwrap_err();
    assert_eq!(err.code(), "FEEL_SYNTAX");
}
