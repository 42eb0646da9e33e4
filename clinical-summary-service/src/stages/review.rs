use async_trait::async_trait;
use care_flow::{Advance, Context, Stage, StageOutcome};
use tracing::info;

/// Human-in-the-loop checkpoint: nothing is written back to the record
/// store until a nurse has confirmed (or edited) the generated summary.
pub struct NurseReviewStage;

#[async_trait]
impl Stage for NurseReviewStage {
    fn id(&self) -> &str {
        "nurse_review"
    }

    async fn run(&self, ctx: Context) -> care_flow::Result<StageOutcome> {
        let confirmation: Option<String> = ctx.get("nurse_confirmation").await;

        match confirmation {
            Some(_) => {
                info!("nurse confirmation received, proceeding to record write-back");
                ctx.set("awaiting_confirmation", false).await;
                Ok(StageOutcome::with_status(
                    None,
                    Advance::NextAndRun,
                    "nurse confirmation received",
                ))
            }
            None => {
                info!("holding session for nurse confirmation");
                ctx.set("awaiting_confirmation", true).await;
                Ok(StageOutcome::with_status(
                    Some("summary ready, waiting for nurse confirmation".to_string()),
                    Advance::WaitForInput,
                    "waiting for nurse confirmation",
                ))
            }
        }
    }
}
