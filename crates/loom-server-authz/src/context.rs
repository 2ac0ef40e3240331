// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-call authorization context.
//!
//! [`AuthzContext`] binds the `user` and `request` primitives for exactly one
//! authorization call. It is passed explicitly into every engine operation and
//! never stored on the engine, so concurrent calls sharing one engine cannot
//! observe each other's user.
//!
//! Resolving the user from a request is delegated to the host through
//! [`UserResolver`]; [`ContextResolver`] applies the debug fallback policy.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{instrument, warn};

use crate::config::AuthzConfig;
use crate::error::{AuthzError, Result};
use crate::value::Value;

/// The user and request an authorization call is evaluated for.
#[derive(Debug, Clone)]
pub struct AuthzContext {
	user: Value,
	request: Value,
}

impl AuthzContext {
	pub fn new(user: impl Into<Value>, request: impl Into<Value>) -> Self {
		Self {
			user: user.into(),
			request: request.into(),
		}
	}

	/// A context whose user is `null`.
	pub fn anonymous(request: impl Into<Value>) -> Self {
		Self::new(Value::Null, request)
	}

	pub fn user(&self) -> &Value {
		&self.user
	}

	pub fn request(&self) -> &Value {
		&self.request
	}
}

/// Host capability that maps a request to the authenticated user.
#[async_trait]
pub trait UserResolver: Send + Sync {
	/// Returns the user making `request`, or `None` if there is none.
	async fn resolve_user(&self, request: &Value) -> Option<Value>;

	/// Looks a user up by identity key. Only used for the debug fallback.
	async fn lookup_user(&self, _user_id: &str) -> Option<Value> {
		None
	}
}

/// Builds [`AuthzContext`]s from requests.
pub struct ContextResolver {
	resolver: Arc<dyn UserResolver>,
	fallback_user: Option<String>,
}

impl ContextResolver {
	/// The fallback identity is only armed when `config.debug` is set.
	pub fn new(resolver: Arc<dyn UserResolver>, config: &AuthzConfig) -> Self {
		let fallback_user = if config.debug {
			config.debug_fallback_user.clone()
		} else {
			None
		};
		Self {
			resolver,
			fallback_user,
		}
	}

	/// Resolves the user for `request`.
	///
	/// # Errors
	///
	/// [`AuthzError::UserResolutionFailed`] if the resolver finds no user and
	/// no debug fallback is armed, or if the fallback identity is not found.
	#[instrument(level = "debug", skip_all, fields(fallback_armed = self.fallback_user.is_some()))]
	pub async fn resolve(&self, request: Value) -> Result<AuthzContext> {
		if let Some(user) = self.resolver.resolve_user(&request).await {
			return Ok(AuthzContext::new(user, request));
		}

		let Some(fallback_id) = self.fallback_user.as_deref() else {
			return Err(AuthzError::UserResolutionFailed);
		};

		warn!(
			fallback_user = %fallback_id,
			"no user for request, using debug fallback identity"
		);
		let user = self
			.resolver
			.lookup_user(fallback_id)
			.await
			.ok_or(AuthzError::UserResolutionFailed)?;
		Ok(AuthzContext::new(user, request))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::value::Entity;
	use std::collections::HashMap;

	struct TokenResolver {
		users: HashMap<String, Value>,
	}

	impl TokenResolver {
		fn new() -> Self {
			let mut users = HashMap::new();
			users.insert(
				"token-7".to_string(),
				Entity::new("User").with("id", 7).identified_by("id").into(),
			);
			users.insert(
				"2".to_string(),
				Entity::new("User").with("id", 2).identified_by("id").into(),
			);
			Self { users }
		}
	}

	#[async_trait]
	impl UserResolver for TokenResolver {
		async fn resolve_user(&self, request: &Value) -> Option<Value> {
			match request.attribute("authorization")? {
				Value::String(token) => self.users.get(&token).cloned(),
				_ => None,
			}
		}

		async fn lookup_user(&self, user_id: &str) -> Option<Value> {
			self.users.get(user_id).cloned()
		}
	}

	fn request(token: Option<&str>) -> Value {
		Entity::new("Request")
			.with("authorization", token.map(str::to_string))
			.into()
	}

	fn config(debug: bool, fallback: Option<&str>) -> AuthzConfig {
		AuthzConfig {
			debug,
			debug_fallback_user: fallback.map(str::to_string),
			..Default::default()
		}
	}

	#[tokio::test]
	async fn resolves_known_user() {
		let resolver = ContextResolver::new(Arc::new(TokenResolver::new()), &config(false, None));
		let ctx = resolver.resolve(request(Some("token-7"))).await.unwrap();
		assert_eq!(ctx.user().attribute("id"), Some(Value::Int(7)));
		assert!(ctx.request().attribute("authorization").is_some());
	}

	#[tokio::test]
	async fn unknown_user_is_an_error_without_debug() {
		let resolver =
			ContextResolver::new(Arc::new(TokenResolver::new()), &config(false, Some("2")));
		let err = resolver.resolve(request(Some("bogus"))).await.unwrap_err();
		assert_eq!(err, AuthzError::UserResolutionFailed);
	}

	#[tokio::test]
	async fn debug_falls_back_to_fixed_identity() {
		let resolver =
			ContextResolver::new(Arc::new(TokenResolver::new()), &config(true, Some("2")));
		let ctx = resolver.resolve(request(None)).await.unwrap();
		assert_eq!(ctx.user().attribute("id"), Some(Value::Int(2)));
	}

	#[tokio::test]
	async fn debug_without_fallback_identity_still_fails() {
		let resolver = ContextResolver::new(Arc::new(TokenResolver::new()), &config(true, None));
		let err = resolver.resolve(request(None)).await.unwrap_err();
		assert_eq!(err, AuthzError::UserResolutionFailed);
	}

	#[tokio::test]
	async fn missing_fallback_identity_fails() {
		let resolver =
			ContextResolver::new(Arc::new(TokenResolver::new()), &config(true, Some("404")));
		let err = resolver.resolve(request(None)).await.unwrap_err();
		assert_eq!(err, AuthzError::UserResolutionFailed);
	}

	#[test]
	fn anonymous_context_has_null_user() {
		let ctx = AuthzContext::anonymous(Value::Null);
		assert!(matches!(ctx.user(), Value::Null));
	}
}
