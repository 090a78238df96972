use serde::{Deserialize, Serialize};
use std::fmt;

pub const SEND_TO_AI_MIN_SCORE: i32 = 60;
pub const REVIEW_MIN_SCORE: i32 = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    SendToAi,
    ReviewManually,
    Redigitalize,
}

impl Decision {
    pub const ALL: [Decision; 3] = [
        Decision::SendToAi,
        Decision::ReviewManually,
        Decision::Redigitalize,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::SendToAi => "SEND_TO_AI",
            Decision::ReviewManually => "REVIEW_MANUALLY",
            Decision::Redigitalize => "REDIGITALIZE",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn decide(score: i32) -> Decision {
    if score >= SEND_TO_AI_MIN_SCORE {
        Decision::SendToAi
    } else if score >= REVIEW_MIN_SCORE {
        Decision::ReviewManually
    } else {
        Decision::Redigitalize
    }
}
