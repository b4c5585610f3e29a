// Demonstration: roll out a baseline policy over random CVRPB instances.
//
// Run from the repo root:
//   cargo run --example rollout_demo -- --policy nearest --episodes 20 --aug 8 --debug

use std::env;

use vrpb_env::env::{
    EnvConfig, EvaluationMetrics, NearestFeasiblePolicy, Policy, RandomPolicy, VrpbEnv,
};

fn main() {
    let args: Vec<String> = env::args().collect();
    let policy_name = arg_value(&args, "--policy").unwrap_or("nearest");
    let episodes: usize = parsed(&args, "--episodes").unwrap_or(10);
    let batch_size: usize = parsed(&args, "--batch").unwrap_or(16);
    let seed: u64 = parsed(&args, "--seed").unwrap_or(1234);
    let aug: usize = parsed(&args, "--aug").unwrap_or(1);
    let problem_size: usize = parsed(&args, "--problem-size").unwrap_or(20);
    let pomo_size: usize = parsed(&args, "--pomo-size").unwrap_or(10);

    tracing_subscriber::fmt()
        .with_max_level(if args.iter().any(|a| a == "--debug") {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    let config = EnvConfig {
        seed,
        ..EnvConfig::new(problem_size, pomo_size)
    };
    let mut env = match VrpbEnv::new(config) {
        Ok(env) => env,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            std::process::exit(2);
        }
    };

    let mut policy: Box<dyn Policy> = match policy_name {
        "random" => Box::new(RandomPolicy::new(seed)),
        "nearest" => Box::new(NearestFeasiblePolicy::new()),
        other => {
            eprintln!("Unknown --policy '{}'; expected 'nearest' or 'random'.", other);
            std::process::exit(2);
        }
    };

    match EvaluationMetrics::evaluate(&mut env, policy.as_mut(), episodes, batch_size, aug) {
        Ok(metrics) => {
            println!("Policy: {}", policy.name());
            println!("{}", metrics);
        }
        Err(e) => {
            eprintln!("Evaluation failed: {e}");
            std::process::exit(1);
        }
    }
}

fn arg_value<'a>(args: &'a [String], key: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

fn parsed<T: std::str::FromStr>(args: &[String], key: &str) -> Option<T> {
    arg_value(args, key).and_then(|s| s.parse().ok())
}
