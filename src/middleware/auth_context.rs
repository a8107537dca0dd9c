use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use uuid::Uuid;

use crate::auth::hash_access_token;
use crate::error::ApiError;
use crate::models::{AppState, ROLE_ADMIN, ROLE_MANAGER, ROLE_RECEPTIONIST, ROLE_SPECIALIST};

#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub role: i16,
    pub session_token_id: Uuid,
}

impl AuthContext {
    /// Front desk and management: booking, check-in, cancellation, certificates.
    pub fn can_manage_appointments(&self) -> bool {
        matches!(self.role, ROLE_ADMIN | ROLE_MANAGER | ROLE_RECEPTIONIST)
    }

    /// Specialists record exam progress; managers may correct it.
    pub fn can_record_exams(&self) -> bool {
        matches!(self.role, ROLE_ADMIN | ROLE_MANAGER | ROLE_SPECIALIST)
    }

    pub fn ensure_manage(&self) -> Result<(), ApiError> {
        if self.can_manage_appointments() {
            Ok(())
        } else {
            Err(ApiError::Forbidden(
                "FORBIDDEN",
                "Only admin/manager/receptionist can manage appointments".into(),
            ))
        }
    }

    pub fn ensure_record_exams(&self) -> Result<(), ApiError> {
        if self.can_record_exams() {
            Ok(())
        } else {
            Err(ApiError::Forbidden(
                "FORBIDDEN",
                "Only specialists and managers can record exam progress".into(),
            ))
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SessionLookupRow {
    session_token_id: Uuid,
    user_id: Uuid,
    role: i16,
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            let TypedHeader(authz): TypedHeader<Authorization<Bearer>> =
                TypedHeader::from_request_parts(parts, state)
                    .await
                    .map_err(|_| ApiError::session_expired())?;

            let token_hash = hash_access_token(authz.token());

            let row: SessionLookupRow = sqlx::query_as::<_, SessionLookupRow>(
                r#"
                SELECT st.session_token_id, st.user_id, u.role
                FROM session_token st
                JOIN app_user u ON u.user_id = st.user_id
                WHERE st.session_token_hash = $1
                  AND st.revoked_at IS NULL
                  AND st.expires_at > now()
                  AND u.is_active = true
                "#,
            )
            .bind(&token_hash)
            .fetch_optional(&state.db)
            .await
            .map_err(ApiError::db)?
            .ok_or_else(ApiError::session_expired)?;

            // best-effort
            if let Err(e) = sqlx::query(
                r#"
                UPDATE session_token
                SET last_seen_at = now()
                WHERE session_token_id = $1
                "#,
            )
            .bind(row.session_token_id)
            .execute(&state.db)
            .await
            {
                tracing::debug!(error = %e, "failed to touch session last_seen_at");
            }

            Ok(AuthContext {
                user_id: row.user_id,
                role: row.role,
                session_token_id: row.session_token_id,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(role: i16) -> AuthContext {
        AuthContext {
            user_id: Uuid::new_v4(),
            role,
            session_token_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn role_gates() {
        assert!(ctx(ROLE_RECEPTIONIST).ensure_manage().is_ok());
        assert!(ctx(ROLE_RECEPTIONIST).ensure_record_exams().is_err());
        assert!(ctx(ROLE_SPECIALIST).ensure_record_exams().is_ok());
        assert!(ctx(ROLE_SPECIALIST).ensure_manage().is_err());
        assert!(ctx(ROLE_MANAGER).ensure_manage().is_ok());
        assert!(ctx(ROLE_MANAGER).ensure_record_exams().is_ok());
        assert!(ctx(0).ensure_manage().is_err());
        assert!(ctx(0).ensure_record_exams().is_err());
    }
}
