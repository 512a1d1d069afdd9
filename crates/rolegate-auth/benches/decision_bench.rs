//! Benchmarks for authorization decisions.
//!
//! Compares the credential path (full password hash) with the session-token
//! path that the identity cache enables, plus raw hierarchy queries.
//!
//! Run with: `cargo bench -p rolegate-auth decision`

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rolegate_auth::config::{AuthConfig, UserConfig};
use rolegate_auth::engine::{AccessRequest, AuthorizationEngine};
use rolegate_auth::hierarchy::RoleHierarchy;
use tokio::runtime::Runtime;

fn engine() -> AuthorizationEngine {
    let mut config = AuthConfig::default();
    config.password.memory_kib = 8192;
    config.password.iterations = 2;
    config.remember_me.key = Some("bench".to_string());
    config.users.push(UserConfig {
        username: "userAdmin".to_string(),
        password: Some("passAdmin".to_string()),
        roles: vec!["admin".to_string()],
        ..UserConfig::default()
    });
    AuthorizationEngine::from_config(&config).expect("bench config is valid")
}

fn bench_decisions(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");
    let engine = engine();

    let login = AccessRequest::new("GET", "/api/testView")
        .with_operation("api.testView")
        .with_credentials("userAdmin", "passAdmin");
    let session = rt
        .block_on(engine.decide(&login))
        .issued
        .first()
        .map(|token| token.value.clone())
        .expect("session token issued");
    let cached = AccessRequest::new("GET", "/api/testView")
        .with_operation("api.testView")
        .with_session_token(session);

    let mut group = c.benchmark_group("decision");
    group.sample_size(20);

    group.bench_function("credentials", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(engine.decide(black_box(&login)).await) });
    });

    group.bench_function("session_token", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(engine.decide(black_box(&cached)).await) });
    });

    group.finish();
}

fn bench_hierarchy(c: &mut Criterion) {
    let roles: Vec<String> = (0..64).map(|i| format!("role{i}")).collect();
    let chain = roles.join(" > ");
    let hierarchy = RoleHierarchy::parse(roles.iter().map(String::as_str), &chain)
        .expect("chain hierarchy is valid");

    c.bench_function("hierarchy_dominates_deep", |b| {
        b.iter(|| black_box(hierarchy.dominates(black_box("role0"), black_box("role63"))));
    });
}

criterion_group!(benches, bench_decisions, bench_hierarchy);
criterion_main!(benches);
