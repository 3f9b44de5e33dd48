//! Compare aggregation policies with and without Multi-Krum selection

use ndarray::Array1;
use rand::prelude::*;
use tracing_subscriber::EnvFilter;

use bastion_fl::{select_updates, AggregationPolicy, Update};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let mut rng = StdRng::seed_from_u64(7);
    let dim = 4;
    let f = 3;

    // 9 honest participants around 1.0, 3 attackers pushing towards 50.0
    let mut updates: Vec<Update> = (0..9)
        .map(|i| {
            let v = Array1::from_shape_fn(dim, |_| 1.0 + rng.gen_range(-0.1..0.1));
            Update::new(format!("honest-{}", i), 1, v).with_stake(rng.gen_range(500.0..1500.0))
        })
        .collect();
    updates.extend((0..3).map(|i| {
        let v = Array1::from_elem(dim, 50.0);
        Update::new(format!("attacker-{}", i), 1, v).with_stake(2000.0)
    }));

    let all: Vec<&Update> = updates.iter().collect();
    let selection = select_updates(&all, f)?;
    let selected: Vec<&Update> = selection.indices.iter().map(|&i| all[i]).collect();

    println!("Bastion-FL policy comparison (9 honest, 3 Byzantine, f = {})\n", f);
    println!("{:<30} {:>14} {:>14}", "policy", "unfiltered", "multi-krum");

    for policy in [
        AggregationPolicy::Mean,
        AggregationPolicy::StakeWeightedMedian,
        AggregationPolicy::StakeWeightedTrimmedMean { trim_fraction: 0.25 },
    ] {
        let raw = policy.try_aggregate(&all)?;
        let filtered = policy.try_aggregate(&selected)?;
        println!("{:<30} {:>14.4} {:>14.4}", policy.name(), raw[0], filtered[0]);
    }
    Ok(())
}
