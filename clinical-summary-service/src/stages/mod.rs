pub mod confirm;
pub mod review;
pub mod summarize;
pub mod validate;

pub use confirm::ConfirmStage;
pub use review::NurseReviewStage;
pub use summarize::SummarizeStage;
pub use validate::ValidateStage;
