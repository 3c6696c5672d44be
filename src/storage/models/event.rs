use csv::StringRecord;
use serde::Serialize;

use super::{ChatId, UserId};

/// 导入文件中的一行: `[chatID, userID, messageType, lastEventTimestamp, ...]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatEvent {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub message_type: String,
    pub last_event: String,
}

/// 行解析失败的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowProblem {
    TooFewColumns(usize),
    BadChatId(String),
    BadUserId(String),
}

impl std::fmt::Display for RowProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowProblem::TooFewColumns(n) => write!(f, "需要至少4列，实际 {} 列", n),
            RowProblem::BadChatId(v) => write!(f, "无效的聊天ID {:?}", v),
            RowProblem::BadUserId(v) => write!(f, "无效的用户ID {:?}", v),
        }
    }
}

impl TryFrom<&StringRecord> for ChatEvent {
    type Error = RowProblem;

    fn try_from(record: &StringRecord) -> Result<Self, Self::Error> {
        if record.len() < 4 {
            return Err(RowProblem::TooFewColumns(record.len()));
        }

        // 第4列之后的列忽略
        let chat_id = record[0]
            .parse()
            .map_err(|_| RowProblem::BadChatId(record[0].to_string()))?;
        let user_id = record[1]
            .parse()
            .map_err(|_| RowProblem::BadUserId(record[1].to_string()))?;

        Ok(ChatEvent {
            chat_id,
            user_id,
            message_type: record[2].to_string(),
            last_event: record[3].to_string(),
        })
    }
}
