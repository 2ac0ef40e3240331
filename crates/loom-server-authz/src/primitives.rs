// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Primitive registry: the named roots of right-hand lookup paths.
//!
//! | Name        | Value                                  |
//! |-------------|----------------------------------------|
//! | `now`       | current time (UTC)                     |
//! | `yesterday` | `now` - 1 day                          |
//! | `tomorrow`  | `now` + 1 day                          |
//! | `last_week` | `now` - 7 days                         |
//! | `next_week` | `now` + 7 days                         |
//! | `user`      | the call context's user                |
//! | `request`   | the call context's request             |
//!
//! Every primitive is evaluated when it is resolved, never when it is
//! registered. Custom primitives are zero-argument providers; registering a
//! name again replaces the earlier binding.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::context::AuthzContext;
use crate::error::{AuthzError, Result};
use crate::value::Value;

pub const NOW: &str = "now";
pub const YESTERDAY: &str = "yesterday";
pub const TOMORROW: &str = "tomorrow";
pub const LAST_WEEK: &str = "last_week";
pub const NEXT_WEEK: &str = "next_week";
pub const USER: &str = "user";
pub const REQUEST: &str = "request";

/// Source of the current time for the time primitives.
pub trait Clock: Send + Sync {
	fn now(&self) -> DateTime<Utc>;
}

/// Reads the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> DateTime<Utc> {
		Utc::now()
	}
}

/// Always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
	fn now(&self) -> DateTime<Utc> {
		self.0
	}
}

/// A zero-argument primitive provider.
pub type Provider = Arc<dyn Fn() -> Value + Send + Sync>;

#[derive(Clone)]
enum Binding {
	/// `clock.now()` shifted by the offset.
	Clock(Duration),
	User,
	Request,
	Custom(Provider),
}

/// Name to provider mapping consulted during rule normalization.
#[derive(Clone)]
pub struct PrimitiveRegistry {
	bindings: HashMap<String, Binding>,
	clock: Arc<dyn Clock>,
}

impl PrimitiveRegistry {
	/// Registry with the built-in primitives, reading the system clock.
	pub fn new() -> Self {
		Self::with_clock(Arc::new(SystemClock))
	}

	/// Registry with the built-in primitives, reading `clock`.
	pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
		let mut bindings = HashMap::new();
		bindings.insert(NOW.to_string(), Binding::Clock(Duration::zero()));
		bindings.insert(YESTERDAY.to_string(), Binding::Clock(Duration::days(-1)));
		bindings.insert(TOMORROW.to_string(), Binding::Clock(Duration::days(1)));
		bindings.insert(LAST_WEEK.to_string(), Binding::Clock(Duration::days(-7)));
		bindings.insert(NEXT_WEEK.to_string(), Binding::Clock(Duration::days(7)));
		bindings.insert(USER.to_string(), Binding::User);
		bindings.insert(REQUEST.to_string(), Binding::Request);
		Self { bindings, clock }
	}

	/// Binds `name` to `provider`, replacing any earlier binding.
	///
	/// # Errors
	///
	/// [`AuthzError::ReservedPrimitive`] for `user` and `request`, which are
	/// always bound to the call context.
	pub fn register<F>(&mut self, name: impl Into<String>, provider: F) -> Result<()>
	where
		F: Fn() -> Value + Send + Sync + 'static,
	{
		let name = name.into();
		if name == USER || name == REQUEST {
			return Err(AuthzError::ReservedPrimitive(name));
		}
		self.bindings.insert(name, Binding::Custom(Arc::new(provider)));
		Ok(())
	}

	/// Registered names in sorted order.
	pub fn names(&self) -> Vec<&str> {
		let mut names: Vec<&str> = self.bindings.keys().map(String::as_str).collect();
		names.sort_unstable();
		names
	}

	/// Evaluates the primitive bound to `name` for the given call.
	///
	/// # Errors
	///
	/// - [`AuthzError::UnknownPrimitive`] if nothing is bound to `name`.
	/// - [`AuthzError::TimestampOutOfRange`] if a time offset overflows.
	pub fn resolve(&self, name: &str, ctx: &AuthzContext) -> Result<Value> {
		let binding = self
			.bindings
			.get(name)
			.ok_or_else(|| AuthzError::UnknownPrimitive(name.to_string()))?;
		Ok(match binding {
			Binding::Clock(offset) => self
				.clock
				.now()
				.checked_add_signed(*offset)
				.map(Value::Timestamp)
				.ok_or_else(|| AuthzError::TimestampOutOfRange(name.to_string()))?,
			Binding::User => ctx.user().clone(),
			Binding::Request => ctx.request().clone(),
			Binding::Custom(provider) => provider(),
		})
	}
}

impl Default for PrimitiveRegistry {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Debug for PrimitiveRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PrimitiveRegistry")
			.field("names", &self.names())
			.finish_non_exhaustive()
	}
}
