//! Benchmarks for template resolution.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use playbook::context::RunContext;
use playbook::template::Template;
use serde_json::{json, Map};
use std::collections::HashMap;

fn context() -> RunContext {
    let mut env = HashMap::new();
    env.insert("API_BASE".to_string(), "https://api.example.com".to_string());
    let mut ctx = RunContext::new(env, Map::new());
    ctx.vars.insert("city".into(), json!("Austin"));
    ctx.collections.set(
        "leads",
        (0..500).map(|i| json!({ "id": i, "name": format!("lead-{i}") })).collect(),
    );
    ctx
}

fn template_benchmark(c: &mut Criterion) {
    let ctx = context();
    let params = json!({
        "url": "${env.API_BASE}/vendors?city=${vars.city}",
        "fallback": "${vars.missing || env.MISSING || 'default'}",
        "rows": "${collections.leads}",
        "count": "${collections.leads.length}",
        "nested": {"first": "${collections.leads.0.name}", "at": "${now}"}
    });

    c.bench_function("parse_template", |b| {
        b.iter(|| Template::parse(black_box("${env.API_BASE}/vendors?city=${vars.city || 'x'}")))
    });

    c.bench_function("resolve_params", |b| b.iter(|| ctx.resolve(black_box(&params))));

    c.bench_function("evaluate_condition", |b| {
        b.iter(|| ctx.evaluate_condition(black_box(Some("collections.leads.length > 0 && vars.city"))))
    });
}

criterion_group!(benches, template_benchmark);
criterion_main!(benches);
