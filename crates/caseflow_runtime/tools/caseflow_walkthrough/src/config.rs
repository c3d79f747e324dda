use std::env;

use caseflow_runtime::config::{parse_bool, parse_count};
use caseflow_runtime::RuntimeConfig;

pub const DEFAULT_AMOUNT: i64 = 1500;

pub struct Config {
    /// Claimed amount, visible to rules as `amount`.
    pub amount: i64,
    pub runtime: RuntimeConfig,
}

impl Config {
    pub fn from_args() -> Self {
        Self::from_args_iter(env::args())
    }

    pub fn from_args_iter<I, S>(iter: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut amount = env::var("CASEFLOW_WALKTHROUGH_AMOUNT")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_AMOUNT);
        let mut runtime = RuntimeConfig::from_env();

        let mut args = iter.into_iter();
        let _ = args.next();
        while let Some(arg) = args.next() {
            let arg = arg.as_ref();
            match arg {
                "-h" | "--help" => {
                    print_usage();
                    std::process::exit(0);
                }
                "--amount" => {
                    if let Some(value) = args.next().and_then(|v| v.as_ref().parse().ok()) {
                        amount = value;
                    }
                }
                "--max-depth" => {
                    if let Some(value) = args.next().and_then(|v| parse_count(v.as_ref().to_string())) {
                        runtime.cascade.max_depth = value;
                    }
                }
                "--rollback" => {
                    if let Some(value) = args.next().and_then(|v| parse_bool(v.as_ref().to_string())) {
                        runtime.rollback = value;
                    }
                }
                "--no-rollback" => {
                    runtime.rollback = false;
                }
                _ if arg.starts_with("--amount=") => {
                    if let Ok(value) = arg["--amount=".len()..].parse() {
                        amount = value;
                    }
                }
                _ if arg.starts_with("--max-depth=") => {
                    if let Some(value) = parse_count(arg["--max-depth=".len()..].to_string()) {
                        runtime.cascade.max_depth = value;
                    }
                }
                _ if arg.starts_with("--rollback=") => {
                    if let Some(value) = parse_bool(arg["--rollback=".len()..].to_string()) {
                        runtime.rollback = value;
                    }
                }
                _ => {}
            }
        }

        Self { amount, runtime }
    }
}

fn print_usage() {
    println!(
        "caseflow_walkthrough [--amount <n>] [--max-depth <n>] [--rollback <bool>] [--no-rollback]"
    );
}
