// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Relational authorization decisions.
//!
//! [`RelationalAuthorization`] answers the CRUD questions for one resource
//! type from a [`RuleBook`]:
//!
//! | Operation                          | Rules used | Answer                              |
//! |------------------------------------|------------|-------------------------------------|
//! | `read_list`                        | `retrieve` | candidates passing the filter       |
//! | `read_detail`                      | `retrieve` | object is in `read_list`            |
//! | `create/update/delete_detail`      | matching   | every obligation is satisfied       |
//! | `create/update/delete_list`        | matching   | objects whose detail check passes   |
//!
//! Every call normalizes its rules against the [`AuthzContext`] it is given.
//! The engine itself is immutable after [`build`](RelationalAuthorizationBuilder::build)
//! and can be shared between concurrent requests.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::comparator::satisfies;
use crate::context::AuthzContext;
use crate::error::Result;
use crate::filter::{CollectionFilter, InMemoryFilter};
use crate::normalize::{normalize, Obligation};
use crate::primitives::{Clock, PrimitiveRegistry, Provider, SystemClock};
use crate::rules::{Operation, RuleBook};
use crate::value::Value;

/// Rule-driven authorization for one resource type.
pub struct RelationalAuthorization {
	rules: RuleBook,
	primitives: PrimitiveRegistry,
	filter: Arc<dyn CollectionFilter>,
}

impl RelationalAuthorization {
	pub fn builder() -> RelationalAuthorizationBuilder {
		RelationalAuthorizationBuilder::default()
	}

	/// Engine over `rules` with the built-in primitives, the system clock and
	/// the in-memory collection filter.
	pub fn new(rules: RuleBook) -> Self {
		Self {
			rules,
			primitives: PrimitiveRegistry::new(),
			filter: Arc::new(InMemoryFilter),
		}
	}

	pub fn rules(&self) -> &RuleBook {
		&self.rules
	}

	pub fn primitives(&self) -> &PrimitiveRegistry {
		&self.primitives
	}

	/// Normalizes the rules for `operation` against `ctx`.
	pub fn obligations(&self, operation: Operation, ctx: &AuthzContext) -> Result<Vec<Obligation>> {
		normalize(self.rules.rules_for(operation), &self.primitives, ctx)
	}

	/// Candidates the user may read, in input order.
	#[instrument(level = "debug", skip_all, fields(candidates = candidates.len()))]
	pub async fn read_list(&self, candidates: Vec<Value>, ctx: &AuthzContext) -> Result<Vec<Value>> {
		let obligations = self.obligations(Operation::Retrieve, ctx)?;
		let readable = self.filter.filter(candidates, &obligations).await?;
		debug!(
			obligations = obligations.len(),
			readable = readable.len(),
			"read_list decision"
		);
		Ok(readable)
	}

	/// True iff `object` is among the readable `candidates`.
	#[instrument(level = "debug", skip_all, fields(candidates = candidates.len()))]
	pub async fn read_detail(
		&self,
		object: &Value,
		candidates: Vec<Value>,
		ctx: &AuthzContext,
	) -> Result<bool> {
		let readable = self.read_list(candidates, ctx).await?;
		let allowed = readable.iter().any(|candidate| candidate == object);
		debug!(allowed, "read_detail decision");
		Ok(allowed)
	}

	/// True iff `object` satisfies every obligation for `operation`.
	///
	/// Stops at the first unsatisfied obligation.
	#[instrument(level = "debug", skip_all, fields(operation = %operation))]
	pub fn validate_detail(
		&self,
		object: &Value,
		ctx: &AuthzContext,
		operation: Operation,
	) -> Result<bool> {
		let obligations = self.obligations(operation, ctx)?;
		let allowed = check(object, &obligations)?;
		debug!(obligations = obligations.len(), allowed, "detail decision");
		Ok(allowed)
	}

	/// The objects passing the detail check for `operation`, in input order.
	///
	/// Rules are normalized once for the whole collection.
	#[instrument(
		level = "debug",
		skip_all,
		fields(operation = %operation, objects = objects.len())
	)]
	pub fn validate_list(
		&self,
		objects: Vec<Value>,
		ctx: &AuthzContext,
		operation: Operation,
	) -> Result<Vec<Value>> {
		let obligations = self.obligations(operation, ctx)?;
		let mut allowed = Vec::with_capacity(objects.len());
		for object in objects {
			if check(&object, &obligations)? {
				allowed.push(object);
			}
		}
		debug!(
			obligations = obligations.len(),
			allowed = allowed.len(),
			"list decision"
		);
		Ok(allowed)
	}

	pub fn create_detail(&self, object: &Value, ctx: &AuthzContext) -> Result<bool> {
		self.validate_detail(object, ctx, Operation::Create)
	}

	pub fn update_detail(&self, object: &Value, ctx: &AuthzContext) -> Result<bool> {
		self.validate_detail(object, ctx, Operation::Update)
	}

	pub fn delete_detail(&self, object: &Value, ctx: &AuthzContext) -> Result<bool> {
		self.validate_detail(object, ctx, Operation::Delete)
	}

	pub fn create_list(&self, objects: Vec<Value>, ctx: &AuthzContext) -> Result<Vec<Value>> {
		self.validate_list(objects, ctx, Operation::Create)
	}

	pub fn update_list(&self, objects: Vec<Value>, ctx: &AuthzContext) -> Result<Vec<Value>> {
		self.validate_list(objects, ctx, Operation::Update)
	}

	pub fn delete_list(&self, objects: Vec<Value>, ctx: &AuthzContext) -> Result<Vec<Value>> {
		self.validate_list(objects, ctx, Operation::Delete)
	}
}

fn check(object: &Value, obligations: &[Obligation]) -> Result<bool> {
	for obligation in obligations {
		if !satisfies(object, obligation)? {
			debug!(path = %obligation.path(), "obligation not satisfied");
			return Ok(false);
		}
	}
	Ok(true)
}

impl fmt::Debug for RelationalAuthorization {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RelationalAuthorization")
			.field("rules", &self.rules)
			.field("primitives", &self.primitives)
			.finish_non_exhaustive()
	}
}

/// Collects rules, primitives and collaborators for a [`RelationalAuthorization`].
#[derive(Default)]
pub struct RelationalAuthorizationBuilder {
	rules: RuleBook,
	primitives: Vec<(String, Provider)>,
	clock: Option<Arc<dyn Clock>>,
	filter: Option<Arc<dyn CollectionFilter>>,
}

impl RelationalAuthorizationBuilder {
	pub fn rules(mut self, rules: RuleBook) -> Self {
		self.rules = rules;
		self
	}

	/// Registers a custom primitive. Later registrations of a name win.
	pub fn primitive<F>(mut self, name: impl Into<String>, provider: F) -> Self
	where
		F: Fn() -> Value + Send + Sync + 'static,
	{
		self.primitives.push((name.into(), Arc::new(provider)));
		self
	}

	/// Clock feeding `now`, `yesterday`, `tomorrow`, `last_week` and `next_week`.
	pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = Some(clock);
		self
	}

	/// Collection filter used by `read_list`. Defaults to [`InMemoryFilter`].
	pub fn filter(mut self, filter: Arc<dyn CollectionFilter>) -> Self {
		self.filter = Some(filter);
		self
	}

	/// # Errors
	///
	/// [`AuthzError::ReservedPrimitive`](crate::AuthzError::ReservedPrimitive)
	/// if a custom primitive is named `user` or `request`.
	pub fn build(self) -> Result<RelationalAuthorization> {
		let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
		let mut primitives = PrimitiveRegistry::with_clock(clock);
		for (name, provider) in self.primitives {
			primitives.register(name, move || provider())?;
		}
		Ok(RelationalAuthorization {
			rules: self.rules,
			primitives,
			filter: self.filter.unwrap_or_else(|| Arc::new(InMemoryFilter)),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::AuthzError;
	use crate::primitives::FixedClock;
	use crate::rules::{RuleSet, Sentinel};
	use crate::value::Entity;
	use async_trait::async_trait;
	use chrono::{TimeZone, Utc};
	use proptest::prelude::*;

	fn user(id: i64) -> Entity {
		Entity::new("User")
			.with("id", id)
			.with("is_super", false)
			.identified_by("id")
	}

	fn ctx(id: i64) -> AuthzContext {
		AuthzContext::new(user(id), Entity::new("Request").with("method", "PUT"))
	}

	fn document(id: i64, owner: i64) -> Value {
		Entity::new("Document")
			.with("id", id)
			.with("owner", user(owner))
			.with("secret_field", "classified")
			.identified_by("id")
			.into()
	}

	fn owner_rules() -> RuleSet {
		RuleSet::new().rule("owner__id", "user__id")
	}

	fn engine(book: RuleBook) -> RelationalAuthorization {
		let now = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
		RelationalAuthorization::builder()
			.rules(book)
			.clock(Arc::new(FixedClock(now)))
			.primitive("allowed_value", || Value::from("open"))
			.build()
			.unwrap()
	}

	fn ids(values: &[Value]) -> Vec<Value> {
		values.iter().filter_map(|v| v.attribute("id")).collect()
	}

	mod detail {
		use super::*;

		#[test]
		fn owner_may_update() {
			let authz = engine(RuleBook::new().with(Operation::Update, owner_rules()));
			assert!(authz.update_detail(&document(1, 7), &ctx(7)).unwrap());
			assert!(!authz.update_detail(&document(1, 3), &ctx(7)).unwrap());
		}

		#[test]
		fn operations_use_their_own_rules() {
			let authz = engine(RuleBook::new().with(Operation::Delete, owner_rules()));
			assert!(!authz.delete_detail(&document(1, 3), &ctx(7)).unwrap());
			assert!(authz.update_detail(&document(1, 3), &ctx(7)).unwrap());
			assert!(authz.create_detail(&document(1, 3), &ctx(7)).unwrap());
		}

		#[test]
		fn broken_path_is_an_error_not_a_denial() {
			let authz = engine(
				RuleBook::new().with(Operation::Update, RuleSet::new().rule("status", "now__weekday")),
			);
			let err = authz.update_detail(&document(1, 7), &ctx(7)).unwrap_err();
			assert_eq!(err, AuthzError::path_not_found("weekday", "timestamp"));
		}

		#[test]
		fn rejected_sentinel_leaves_the_check_vacuous() {
			let rules = RuleSet::new().gated(Sentinel::is_super(), ("secret_field", "allowed_value"));
			let authz = engine(RuleBook::new().with(Operation::Update, rules));
			assert!(authz.obligations(Operation::Update, &ctx(7)).unwrap().is_empty());
			assert!(authz.update_detail(&document(1, 3), &ctx(7)).unwrap());
		}

		#[test]
		fn stops_at_first_unsatisfied_obligation() {
			let rules = owner_rules().rule("owner__nonexistent", "user__id");
			let authz = engine(RuleBook::new().with(Operation::Update, rules));
			assert!(!authz.update_detail(&document(1, 3), &ctx(7)).unwrap());
			assert!(authz.update_detail(&document(1, 7), &ctx(7)).is_err());
		}

		#[test]
		fn time_primitive_overflow_is_an_error() {
			let authz = RelationalAuthorization::builder()
				.rules(RuleBook::new().with(Operation::Update, RuleSet::new().rule("created__gte", "next_week")))
				.clock(Arc::new(FixedClock(chrono::DateTime::<Utc>::MAX_UTC)))
				.build()
				.unwrap();
			let err = authz.update_detail(&document(1, 7), &ctx(7)).unwrap_err();
			assert_eq!(err, AuthzError::TimestampOutOfRange("next_week".to_string()));
		}

		#[test]
		fn reserved_primitive_fails_build() {
			let err = RelationalAuthorization::builder()
				.primitive("user", || Value::Null)
				.build()
				.unwrap_err();
			assert_eq!(err, AuthzError::ReservedPrimitive("user".to_string()));
		}
	}

	mod lists {
		use super::*;

		#[test]
		fn keeps_permitted_objects_in_order() {
			let authz = engine(RuleBook::new().with(Operation::Delete, owner_rules()));
			let docs = vec![document(1, 7), document(2, 3), document(3, 7)];
			let kept = authz.delete_list(docs, &ctx(7)).unwrap();
			assert_eq!(ids(&kept), vec![Value::Int(1), Value::Int(3)]);
		}

		#[test]
		fn comparator_error_aborts_the_whole_list() {
			let rules = RuleSet::new().rule("owner__startswith", "user__id");
			let authz = engine(RuleBook::new().with(Operation::Create, rules));
			let err = authz
				.create_list(vec![document(1, 7), document(2, 3)], &ctx(7))
				.unwrap_err();
			assert_eq!(err, AuthzError::comparator_not_found("startswith", "User"));
		}

		#[test]
		fn missing_path_aborts_the_whole_list() {
			let rules = RuleSet::new().rule("author__id", "user__id");
			let authz = engine(RuleBook::new().with(Operation::Delete, rules));
			let err = authz
				.delete_list(vec![document(1, 7), document(2, 3)], &ctx(7))
				.unwrap_err();
			assert_eq!(err, AuthzError::path_not_found("author", "Document"));
		}

		#[test]
		fn normalizes_once_per_call() {
			use std::sync::atomic::{AtomicUsize, Ordering};

			let calls = Arc::new(AtomicUsize::new(0));
			let counter = calls.clone();
			let authz = RelationalAuthorization::builder()
				.rules(RuleBook::new().with(Operation::Update, RuleSet::new().rule("id__gte", "floor")))
				.primitive("floor", move || {
					counter.fetch_add(1, Ordering::SeqCst);
					Value::Int(2)
				})
				.build()
				.unwrap();

			let docs = vec![document(1, 7), document(2, 7), document(3, 7)];
			let kept = authz.update_list(docs, &ctx(7)).unwrap();
			assert_eq!(ids(&kept), vec![Value::Int(2), Value::Int(3)]);
			assert_eq!(calls.load(Ordering::SeqCst), 1);
		}

		#[tokio::test]
		async fn read_list_filters_by_retrieve_rules() {
			let authz = engine(RuleBook::new().with(Operation::Retrieve, owner_rules()));
			let docs = vec![document(1, 7), document(2, 3), document(3, 7)];
			let readable = authz.read_list(docs, &ctx(7)).await.unwrap();
			assert_eq!(ids(&readable), vec![Value::Int(1), Value::Int(3)]);
		}

		#[tokio::test]
		async fn read_detail_checks_membership() {
			let authz = engine(RuleBook::new().with(Operation::Retrieve, owner_rules()));
			let docs = vec![document(1, 7), document(2, 3)];
			assert!(authz.read_detail(&document(1, 7), docs.clone(), &ctx(7)).await.unwrap());
			assert!(!authz.read_detail(&document(2, 3), docs.clone(), &ctx(7)).await.unwrap());
			assert!(!authz.read_detail(&document(9, 7), docs, &ctx(7)).await.unwrap());
		}

		#[tokio::test]
		async fn read_list_surfaces_filter_failures() {
			struct Unavailable;

			#[async_trait]
			impl CollectionFilter for Unavailable {
				async fn filter(&self, _: Vec<Value>, _: &[Obligation]) -> Result<Vec<Value>> {
					Err(AuthzError::Filter("database unavailable".to_string()))
				}
			}

			let authz = RelationalAuthorization::builder()
				.rules(RuleBook::new().with(Operation::Retrieve, owner_rules()))
				.filter(Arc::new(Unavailable))
				.build()
				.unwrap();
			let err = authz.read_list(vec![document(1, 7)], &ctx(7)).await.unwrap_err();
			assert_eq!(err.code(), "FILTER_FAILED");
		}
	}

	mod concurrency {
		use super::*;

		fn assert_send_sync<T: Send + Sync>() {}

		#[test]
		fn engine_is_send_and_sync() {
			assert_send_sync::<RelationalAuthorization>();
		}

		#[tokio::test]
		async fn concurrent_calls_see_their_own_user() {
			let authz = Arc::new(engine(RuleBook::new().with(Operation::Update, owner_rules())));
			let doc = document(1, 7);

			let mut handles = Vec::new();
			for id in 0..32_i64 {
				let authz = authz.clone();
				let doc = doc.clone();
				handles.push(tokio::spawn(async move {
					let allowed = authz.update_detail(&doc, &ctx(id % 8 + 4)).unwrap();
					(id % 8 + 4, allowed)
				}));
			}
			for handle in handles {
				let (id, allowed) = handle.await.unwrap();
				assert_eq!(allowed, id == 7);
			}
		}
	}

	mod properties {
		use super::*;

		fn rule_pool() -> Vec<(&'static str, &'static str)> {
			vec![
				("owner__id", "user__id"),
				("team", "user__team"),
				("status__gte", "threshold"),
				("score__lt", "user__quota"),
			]
		}

		fn property_engine(rules: RuleSet) -> RelationalAuthorization {
			RelationalAuthorization::builder()
				.rules(RuleBook::new().with(Operation::Update, rules))
				.primitive("threshold", || Value::Int(5))
				.build()
				.unwrap()
		}

		fn property_ctx(id: i64, team: i64, quota: i64) -> AuthzContext {
			AuthzContext::new(
				Entity::new("User")
					.with("id", id)
					.with("team", team)
					.with("quota", quota),
				Value::Null,
			)
		}

		fn candidate(id: i64, owner: i64, team: i64, status: i64, score: i64) -> Value {
			Entity::new("Document")
				.with("id", id)
				.with("owner", Entity::new("User").with("id", owner))
				.with("team", team)
				.with("status", status)
				.with("score", score)
				.identified_by("id")
				.into()
		}

		fn select(mask: &[bool], skip: Option<usize>) -> RuleSet {
			rule_pool()
				.into_iter()
				.enumerate()
				.filter(|(i, _)| mask[*i] && Some(*i) != skip)
				.map(|(_, (lhs, rhs))| crate::rules::Rule::naked(lhs, rhs))
				.collect()
		}

		proptest! {
			#[test]
			fn adding_a_rule_never_grants_access(
				mask in prop::array::uniform4(any::<bool>()),
				extra in 0usize..4,
				user in (1i64..4, 1i64..4, 1i64..10),
				doc in (1i64..4, 1i64..4, 0i64..10, 0i64..10),
			) {
				let (id, team, quota) = user;
				let (owner, doc_team, status, score) = doc;
				let ctx = property_ctx(id, team, quota);
				let object = candidate(1, owner, doc_team, status, score);

				let base = select(&mask, Some(extra));
				let (lhs, rhs) = rule_pool()[extra];
				let extended = base.clone().rule(lhs, rhs);

				let with_extra = property_engine(extended).update_detail(&object, &ctx).unwrap();
				let without = property_engine(base).update_detail(&object, &ctx).unwrap();
				prop_assert!(!with_extra || without);
			}

			#[test]
			fn list_is_the_ordered_subset_passing_detail(
				mask in prop::array::uniform4(any::<bool>()),
				docs in prop::collection::vec((1i64..4, 1i64..4, 0i64..10, 0i64..10), 0..12),
			) {
				let authz = property_engine(select(&mask, None));
				let ctx = property_ctx(2, 2, 5);
				let objects: Vec<Value> = docs
					.iter()
					.enumerate()
					.map(|(i, (owner, team, status, score))| candidate(i as i64, *owner, *team, *status, *score))
					.collect();

				let expected: Vec<Value> = objects
					.iter()
					.filter(|o| authz.update_detail(o, &ctx).unwrap())
					.cloned()
					.collect();
				let listed = authz.update_list(objects, &ctx).unwrap();
				prop_assert_eq!(ids(&listed), ids(&expected));
			}

			#[test]
			fn read_detail_iff_in_read_list(
				owners in prop::collection::vec(1i64..4, 1..8),
				pick in 0usize..8,
			) {
				let authz = engine(RuleBook::new().with(Operation::Retrieve, owner_rules()));
				let ctx = ctx(2);
				let docs: Vec<Value> = owners
					.iter()
					.enumerate()
					.map(|(i, owner)| document(i as i64, *owner))
					.collect();
				let object = docs[pick % docs.len()].clone();

				let listed = tokio_test::block_on(authz.read_list(docs.clone(), &ctx)).unwrap();
				let detail = tokio_test::block_on(authz.read_detail(&object, docs, &ctx)).unwrap();
				prop_assert_eq!(detail, listed.contains(&object));
			}
		}
	}
}
