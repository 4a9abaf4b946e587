//! Examiner turn engine.

pub mod reply;
pub mod turn;

pub use reply::{ExaminerReply, ParseStage, parse_reply};
pub use turn::{
    ExaminerTurn, FALLBACK_MODEL_ANSWER, FALLBACK_QUESTION, TurnConfig, TurnStatus,
    run_examiner_turn,
};
