use crate::domain::{User, UserId};
use async_trait::async_trait;

use super::Result;

/// 利用者ディレクトリポート
///
/// 利用者管理コンテキストへの読み取り専用の境界。
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_by_id(&self, user_id: UserId) -> Result<Option<User>>;

    /// 通知先（chat_id）を登録している全利用者
    async fn find_with_delivery_address(&self) -> Result<Vec<User>>;
}
