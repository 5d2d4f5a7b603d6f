//! Review Gate
//!
//! Static table deciding, per quest type, whether a submitted proof can
//! be verified by the external oracle or must wait for a human. Unknown
//! types always require manual review.

use crate::settlement::models::QuestType;

/// How a submitted action gets verified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationRoute {
    /// The oracle can confirm completion
    Automatic,
    /// A human must approve or reject
    Manual,
}

pub struct ReviewGate;

impl ReviewGate {
    pub fn route(quest_type: QuestType) -> VerificationRoute {
        match quest_type {
            QuestType::ChannelFollow | QuestType::Retweet | QuestType::ChainTransfer => {
                VerificationRoute::Automatic
            }
            QuestType::ScreenshotUpload | QuestType::Other => VerificationRoute::Manual,
        }
    }

    pub fn requires_manual_review(quest_type: QuestType) -> bool {
        Self::route(quest_type) == VerificationRoute::Manual
    }
}
