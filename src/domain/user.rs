use serde::{Deserialize, Serialize};

use super::UserId;

/// 利用者（利用者管理コンテキストからの参照用の写し）
///
/// 貸出コンテキストは認証やプロフィールを扱わない。
/// 通知先（chat_id）と権限フラグだけを参照する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: UserId,
    pub email: String,
    /// メッセージングボットの配信先。未登録ならNone
    pub chat_id: Option<i64>,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl User {
    pub fn has_delivery_address(&self) -> bool {
        self.chat_id.is_some()
    }
}
