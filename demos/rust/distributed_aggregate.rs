//! Runs the distribution rewriter on a GROUPBY/COUNT plan, ships the
//! resulting remote sub-plan's wire form to two simulated shards, and
//! combines their partial counts the way a coordinator's local GROUP tail
//! would.
//!
//! Gathering real per-shard replies over the wire is [`aggflow::network`]'s
//! job (out of scope here); this demo only shows the plan split and runs
//! the remote half against two small in-memory "shards" directly.
//!
//! ```bash
//! cargo run --example distributed_aggregate
//! ```

use std::collections::HashMap;

use aggflow::distribute_plan;
use aggflow::iterators::QueryIterator;
use aggflow::pipeline::loader::DocStore;
use aggflow::pipeline::scorer::PassThroughScore;
use aggflow::pipeline::RpStatus;
use aggflow::plan::{compile, CompileInputs, GroupStep, LoadStep, PlanStep};
use aggflow::reducers::{ReducerCall, ReducerKind};
use aggflow::value::{RLookup, RSValue};
use aggflow::{AggPlan, DistributionOutcome};

struct Shard {
    categories: HashMap<u64, &'static str>,
}

impl Shard {
    fn new(categories: HashMap<u64, &'static str>) -> Self {
        Shard { categories }
    }

    fn ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.categories.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl DocStore for Shard {
    fn load(&self, doc_id: u64, field: &str) -> Option<RSValue> {
        if field != "category" {
            return None;
        }
        self.categories.get(&doc_id).map(|c| RSValue::string((*c).to_string()))
    }
}

fn run_remote(remote_plan: &AggPlan, shard: Shard) -> Vec<(String, f64)> {
    let mut output = RLookup::new();
    let category_key = output.get_for_write("category", true).unwrap();
    let count_key = output.get_for_write("n", true).unwrap();
    // The remote plan's own GROUP step carries a fresh, empty output
    // lookup (distribute() resets it, since each shard resolves its own
    // slots); build an equivalent one locally to read results back.
    let mut remote_plan = remote_plan.clone();
    for step in remote_plan.steps_mut() {
        if let PlanStep::Group(group) = step {
            group.output = output.clone();
        }
    }

    let inputs = CompileInputs {
        index: QueryIterator::IdList { ids: shard.ids(), pos: 0 },
        scorer: Box::new(PassThroughScore),
        doc_store: Box::new(shard),
    };
    let mut pipeline = compile(&remote_plan, inputs).expect("remote plan compiles");
    let mut partials = Vec::new();
    loop {
        match pipeline.next().expect("pipeline runs") {
            (RpStatus::Ok, Some(result)) => {
                let category = result.row.read(&category_key).cloned().unwrap_or(RSValue::Null);
                let count = result.row.read(&count_key).and_then(RSValue::to_number).unwrap_or(0.0);
                partials.push((format!("{category:?}"), count));
            }
            (RpStatus::Ok, None) => continue,
            (RpStatus::Eof, _) => break,
            _ => break,
        }
    }
    partials
}

fn main() {
    // FT.AGGREGATE orders * GROUPBY 1 @category REDUCE COUNT 0 AS n
    let mut plan = AggPlan::new(RLookup::new());
    plan.add_step(PlanStep::Load(LoadStep { fields: Some(vec!["category".into()]) }));
    plan.add_step(PlanStep::Group(GroupStep {
        group_by: vec!["category".into()],
        reducers: vec![ReducerCall::new(ReducerKind::Count, Vec::new(), "n")],
        output: RLookup::new(),
    }));

    let outcome = distribute_plan(&plan).expect("distribution rewrite runs");
    let DistributionOutcome::Distributed(distributed) = outcome else {
        panic!("COUNT is always distributable");
    };

    let PlanStep::Distribute(step) = &distributed.steps()[1] else {
        panic!("distribute() always prepends a DISTRIBUTE step");
    };
    let remote_plan = step.remote_plan.as_ref().expect("distributable plan carries a remote plan");

    println!("remote sub-plan shipped to each shard:");
    for token in remote_plan.serialize().expect("remote plan serializes") {
        print!("{token} ");
    }
    println!("\n");

    let shard_a = Shard::new(HashMap::from([(1, "electronics"), (2, "electronics"), (3, "books")]));
    let shard_b = Shard::new(HashMap::from([(4, "books"), (5, "garden")]));

    let mut merged: HashMap<String, f64> = HashMap::new();
    for (category, count) in run_remote(remote_plan, shard_a) {
        *merged.entry(category).or_insert(0.0) += count;
    }
    for (category, count) in run_remote(remote_plan, shard_b) {
        *merged.entry(category).or_insert(0.0) += count;
    }

    println!("merged per-category counts (coordinator's local GROUP tail would finish this):");
    let mut rows: Vec<_> = merged.into_iter().collect();
    rows.sort_by(|a, b| a.0.cmp(&b.0));
    for (category, count) in rows {
        println!("  {category}: {count}");
    }
}
