use anyhow::{Context, Result};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use caseflow_walkthrough::config::Config;
use caseflow_walkthrough::scenario;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::from_args();

    let mut case = scenario::claim_case("claim-walkthrough", config.runtime)
        .context("build claim case")?;
    case.set_variable("amount", config.amount);

    info!(
        "walkthrough started case={} amount={} max_depth={} rollback={}",
        case.name(),
        config.amount,
        config.runtime.cascade.max_depth,
        config.runtime.rollback
    );

    let mut events = case.subscribe_events();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => info!(
                    "[{}] {}#{} {} {} -> {}",
                    event.case,
                    event.record.definition_id,
                    event.record.instance,
                    event.record.transition,
                    event.record.from,
                    event.record.to
                ),
                Err(RecvError::Lagged(missed)) => warn!("event printer lagged, missed={missed}"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let outcome = scenario::run(&mut case).context("run claim walkthrough")?;

    // Dropping the runtime closes the event stream.
    drop(case);
    printer.await.context("join event printer")?;

    info!(
        "walkthrough finished state={} expert_review_required={}",
        outcome.final_state, outcome.expert_review_required
    );
    Ok(())
}
