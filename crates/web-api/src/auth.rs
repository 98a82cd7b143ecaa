//! JWT 管理端鉴权
//!
//! 管理端协作方携带带角色与租户声明的 Bearer token。
//! 权限判断走领域层的角色权限表。

use axum::http::HeaderMap;
use config::AuthConfig;
use domain::{Permission, Role, TenantId};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// 管理端 JWT Claims
#[derive(Debug, Serialize, Deserialize)]
pub struct AdminClaims {
    /// 操作者标识（记入封禁记录的 issued_by）
    pub actor: String,
    pub role: Role,
    /// 被授权的租户；Root 不受此限制
    pub tenant: String,
    pub exp: i64,
}

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_ref()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_ref()),
        }
    }

    /// 签发管理端 token（运维工具用）
    pub fn issue(
        &self,
        actor: &str,
        role: Role,
        tenant: &str,
        valid_for: chrono::Duration,
    ) -> Result<String, ApiError> {
        let claims = AdminClaims {
            actor: actor.to_string(),
            role,
            tenant: tenant.to_string(),
            exp: (chrono::Utc::now() + valid_for).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|err| ApiError::unauthorized(format!("token generation failed: {}", err)))
    }

    pub fn verify(&self, token: &str) -> Result<AdminClaims, ApiError> {
        decode::<AdminClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|err| ApiError::unauthorized(format!("invalid token: {}", err)))
    }

    /// 从请求头解析 claims，校验租户归属与所需权限
    pub fn authorize(
        &self,
        headers: &HeaderMap,
        tenant: &TenantId,
        permission: Permission,
    ) -> Result<AdminClaims, ApiError> {
        let auth_header = headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|header| header.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("missing authorization header"))?;
        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthorized("invalid authorization header format"))?;

        let claims = self.verify(token)?;

        if claims.role != Role::Root && claims.tenant != tenant.as_str() {
            return Err(ApiError::forbidden("token is scoped to another tenant"));
        }
        if !claims.role.allows(permission) {
            return Err(ApiError::forbidden("insufficient role"));
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> JwtService {
        JwtService::new(&AuthConfig {
            jwt_secret: "0123456789abcdef0123456789abcdef".into(),
        })
    }

    fn headers_with(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            format!("Bearer {}", token).parse().unwrap(),
        );
        headers
    }

    #[test]
    fn moderator_token_authorizes_its_own_tenant_only() {
        let svc = service();
        let tenant = TenantId::new("radio-one").unwrap();
        let other = TenantId::new("radio-two").unwrap();
        let token = svc
            .issue("mod-1", Role::Moderator, "radio-one", chrono::Duration::hours(1))
            .unwrap();
        let headers = headers_with(&token);

        assert!(svc
            .authorize(&headers, &tenant, Permission::BanSubject)
            .is_ok());
        assert!(svc
            .authorize(&headers, &other, Permission::BanSubject)
            .is_err());
        // 版主没有清空权限
        assert!(svc
            .authorize(&headers, &tenant, Permission::ClearChat)
            .is_err());
    }

    #[test]
    fn root_token_crosses_tenants() {
        let svc = service();
        let tenant = TenantId::new("radio-two").unwrap();
        let token = svc
            .issue("ops", Role::Root, "radio-one", chrono::Duration::hours(1))
            .unwrap();
        assert!(svc
            .authorize(&headers_with(&token), &tenant, Permission::ClearChat)
            .is_ok());
    }

    #[test]
    fn garbage_token_is_rejected() {
        let svc = service();
        let tenant = TenantId::new("radio-one").unwrap();
        assert!(svc
            .authorize(&headers_with("not-a-jwt"), &tenant, Permission::ListBans)
            .is_err());
    }
}
