//! Builds an `FT.AGGREGATE`-style plan by hand, compiles it into a
//! `Pipeline`, and runs it against a tiny in-memory catalog on a single
//! shard — no distribution, no cursors.
//!
//! ```bash
//! cargo run --example single_shard_aggregate
//! ```

use std::collections::HashMap;

use aggflow::iterators::QueryIterator;
use aggflow::pipeline::loader::DocStore;
use aggflow::pipeline::scorer::PassThroughScore;
use aggflow::pipeline::RpStatus;
use aggflow::plan::{compile, CompileInputs, GroupStep, LoadStep, PlanStep};
use aggflow::reducers::{ReducerCall, ReducerKind};
use aggflow::value::{RLookup, RSValue};
use aggflow::AggPlan;

struct Orders {
    rows: HashMap<u64, (String, f64)>,
}

impl Orders {
    fn new() -> Self {
        let mut rows = HashMap::new();
        rows.insert(1, ("electronics".to_string(), 199.0));
        rows.insert(2, ("electronics".to_string(), 49.0));
        rows.insert(3, ("books".to_string(), 15.0));
        rows.insert(4, ("books".to_string(), 22.0));
        rows.insert(5, ("garden".to_string(), 60.0));
        Orders { rows }
    }

    fn ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.rows.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl DocStore for Orders {
    fn load(&self, doc_id: u64, field: &str) -> Option<RSValue> {
        let (category, price) = self.rows.get(&doc_id)?;
        match field {
            "category" => Some(RSValue::string(category.clone())),
            "price" => Some(RSValue::Number(*price)),
            _ => None,
        }
    }
}

fn main() {
    // FT.AGGREGATE orders * LOAD 2 @category @price
    //     GROUPBY 1 @category REDUCE SUM 1 @price AS total
    let mut plan = AggPlan::new(RLookup::new());
    plan.add_step(PlanStep::Load(LoadStep {
        fields: Some(vec!["category".into(), "price".into()]),
    }));

    let mut group_output = RLookup::new();
    let category_key = group_output.get_for_write("category", true).unwrap();
    let total_key = group_output.get_for_write("total", true).unwrap();
    plan.add_step(PlanStep::Group(GroupStep {
        group_by: vec!["category".into()],
        reducers: vec![ReducerCall::new(ReducerKind::Sum, vec!["price".into()], "total")],
        output: group_output,
    }));

    let orders = Orders::new();
    let inputs = CompileInputs {
        index: QueryIterator::IdList { ids: orders.ids(), pos: 0 },
        scorer: Box::new(PassThroughScore),
        doc_store: Box::new(orders),
    };

    let mut pipeline = compile(&plan, inputs).expect("plan compiles");
    let mut totals: Vec<(String, f64)> = Vec::new();
    loop {
        match pipeline.next().expect("pipeline runs") {
            (RpStatus::Ok, Some(result)) => {
                let category = result.row.read(&category_key).cloned().unwrap_or(RSValue::Null);
                let total = result.row.read(&total_key).and_then(RSValue::to_number).unwrap_or(0.0);
                totals.push((format!("{category:?}"), total));
            }
            (RpStatus::Ok, None) => continue,
            (RpStatus::Eof, _) => break,
            (status, _) => {
                println!("stopped: {status:?}");
                break;
            }
        }
    }
    totals.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
    println!("category totals, highest first:");
    for (category, total) in totals {
        println!("  {category}: {total}");
    }
}
