use criterion::{criterion_group, criterion_main, Criterion};
use rampart_core::rules::{require_non_empty_list, require_true};
use rampart_core::{Level, Pack, Rule, Suppression, Tree, TreeSpec, Verdict};
use serde_json::json;
use std::hint::black_box;

#[derive(Clone, Copy)]
struct Workload {
    name: &'static str,
    stacks: usize,
    resources_per_stack: usize,
}

const SMALL: Workload = Workload {
    name: "small",
    stacks: 4,
    resources_per_stack: 50,
};

const TYPICAL_APP: Workload = Workload {
    name: "typical-app",
    stacks: 20,
    resources_per_stack: 200,
};

const LARGE: Workload = Workload {
    name: "large",
    stacks: 100,
    resources_per_stack: 500,
};

fn selected_workloads() -> Vec<Workload> {
    match std::env::var("RAMPART_PERF_WORKLOAD").ok().as_deref() {
        Some("small") => vec![SMALL],
        Some("typical-app") => vec![TYPICAL_APP],
        Some("large") => vec![LARGE],
        Some("small,typical-app,large") => vec![SMALL, TYPICAL_APP, LARGE],
        _ => vec![SMALL, TYPICAL_APP],
    }
}

fn build_tree(workload: Workload) -> Tree {
    let mut app = TreeSpec::new("App", "App");
    for s in 0..workload.stacks {
        let mut stack = TreeSpec::new(format!("Stack{}", s), "Stack");
        for r in 0..workload.resources_per_stack {
            let resource = match r % 3 {
                0 => TreeSpec::new(format!("Volume{}", r), "Volume")
                    .property("Encrypted", json!(r % 2 == 0)),
                1 => TreeSpec::new(format!("Function{}", r), "Function").property(
                    "VpcConfig",
                    json!({ "SubnetIds": ["subnet-1"], "SecurityGroupIds": [] }),
                ),
                _ => TreeSpec::new(format!("Queue{}", r), "Queue"),
            };
            stack = stack.child(resource);
        }
        app = app.child(stack);
    }
    Tree::from_spec(app).expect("synthetic tree must be valid")
}

fn build_pack() -> Pack {
    Pack::builder("bench")
        .rule(
            Rule::new("bench-Encrypted", Level::Error, |input| {
                require_true(input.node(), "Encrypted")
            })
            .for_kinds(["Volume"]),
        )
        .rule(
            Rule::new("bench-InVpc", Level::Warn, |input| {
                require_non_empty_list(input.node(), "VpcConfig.SecurityGroupIds")
            })
            .for_kinds(["Function"]),
        )
        .rule(Rule::new("bench-Any", Level::Info, |_| Verdict::Compliant))
        .suppression(
            Suppression::all_rules("App/Stack0", "load-test fixture stack").applying_to_children(),
        )
        .suppression(Suppression::new("*", "bench-InVpc", "edge functions run outside the VPC"))
        .build()
        .expect("bench pack must build")
}

fn bench_run(c: &mut Criterion) {
    for workload in selected_workloads() {
        let tree = build_tree(workload);
        let mut pack = build_pack();
        c.bench_function(&format!("run/{}", workload.name), |b| {
            b.iter(|| {
                let diagnostics = pack.run(black_box(&tree));
                black_box(diagnostics.len());
            });
        });
    }
}

fn bench_report(c: &mut Criterion) {
    for workload in selected_workloads() {
        let tree = build_tree(workload);
        let mut pack = build_pack();
        pack.run(&tree);
        c.bench_function(&format!("sarif/{}", workload.name), |b| {
            b.iter(|| {
                let sarif = rampart_core::report::sarif::to_sarif(black_box(&pack));
                black_box(sarif);
            });
        });
    }
}

criterion_group!(walk_harness, bench_run, bench_report);
criterion_main!(walk_harness);
