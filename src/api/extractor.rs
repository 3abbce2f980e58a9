use crate::application::payment::RequestContext;
use crate::domain::{User, UserId};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::HOST, request::Parts},
};
use std::convert::Infallible;
use std::sync::Arc;
use uuid::Uuid;

use super::{error::ApiError, handlers::AppState};

/// 上流の認証で確定した利用者IDを運ぶヘッダー
pub const USER_ID_HEADER: &str = "x-user-id";
const FORWARDED_PROTO_HEADER: &str = "x-forwarded-proto";

/// 認証済みの利用者
///
/// ヘッダーがない・UUIDでない・利用者が存在しない場合は401。
pub struct AuthenticatedUser(pub User);

impl AuthenticatedUser {
    pub fn id(&self) -> UserId {
        self.0.user_id
    }

    /// スタッフ専用操作の前提条件
    pub fn require_staff(&self) -> Result<(), ApiError> {
        if self.0.is_staff {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value.trim()).ok())
            .map(UserId::from_uuid)
            .ok_or(ApiError::Unauthenticated)?;

        let user = state
            .service_deps
            .users
            .get_by_id(user_id)
            .await
            .map_err(ApiError::Internal)?
            .ok_or(ApiError::Unauthenticated)?;

        Ok(Self(user))
    }
}

fn header_str<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
}

/// 決済コールバックURLの組み立てに使うリクエスト文脈
///
/// 公開ベースURLが設定されていればそれを、なければ
/// `X-Forwarded-Proto`（既定はhttp）と`Host`から組み立てる。
/// どちらもなければNone（決済を伴う操作はバリデーションエラーになる）。
pub struct CallbackContext(pub Option<RequestContext>);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CallbackContext {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(context) = &state.public_base_url {
            return Ok(Self(Some(context.clone())));
        }

        let context = header_str(parts, HOST.as_str()).and_then(|host| {
            RequestContext::from_forwarded(header_str(parts, FORWARDED_PROTO_HEADER), host).ok()
        });

        Ok(Self(context))
    }
}
