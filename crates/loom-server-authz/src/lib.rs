// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Relational authorization for Loom server resources.
//!
//! Access rules are pairs of lookup paths: a path into the object being
//! authorized and a path into a *primitive* such as the current user, the
//! current request or the current time. Segments are separated by `__`.
//!
//! ```text
//! ("owner__id",    "user__id")     object.owner.id == user.id
//! ("created__gte", "last_week")    object.created >= now - 7 days
//! ("status__in",   "user__roles")  object.status in user.roles
//! ```
//!
//! Rules may be gated by a sentinel, a predicate over the current user, and
//! only apply when the sentinel admits that user.
//!
//! # Overview
//!
//! - [`primitives`]: named roots of right-hand paths
//! - [`path`]: lookup paths and their traversal
//! - [`rules`]: rules, sentinels and per-operation rule sets
//! - [`normalize`]: rules to concrete obligations for one call
//! - [`comparator`]: checking an object against an obligation
//! - [`engine`]: the CRUD decisions
//! - [`config`]: layered configuration, including rule files
//!
//! A denial is `Ok(false)`; an [`AuthzError`] always means a broken rule or
//! collaborator and must not be treated as a denial.
//!
//! # Example
//!
//! ```
//! use loom_server_authz::{AuthzContext, Entity, Operation, RelationalAuthorization, RuleBook, RuleSet};
//!
//! let authz = RelationalAuthorization::builder()
//!     .rules(RuleBook::new().with(Operation::Update, RuleSet::new().rule("owner__id", "user__id")))
//!     .build()?;
//!
//! let owner = Entity::new("User").with("id", 7);
//! let document = Entity::new("Document").with("owner", owner.clone()).into();
//!
//! let ctx = AuthzContext::new(owner, Entity::new("Request"));
//! assert!(authz.update_detail(&document, &ctx)?);
//!
//! let stranger = AuthzContext::new(Entity::new("User").with("id", 3), Entity::new("Request"));
//! assert!(!authz.update_detail(&document, &stranger)?);
//! # Ok::<(), loom_server_authz::AuthzError>(())
//! ```

pub mod comparator;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod filter;
pub mod normalize;
pub mod path;
pub mod primitives;
pub mod rules;
pub mod value;

pub use comparator::{satisfies, Comparator};
pub use config::{load_config, load_config_with_file, AuthzConfig, ConfigError};
pub use context::{AuthzContext, ContextResolver, UserResolver};
pub use engine::{RelationalAuthorization, RelationalAuthorizationBuilder};
pub use error::{AuthzError, Result};
pub use filter::{CollectionFilter, InMemoryFilter};
pub use normalize::{normalize, Obligation};
pub use path::{LookupPath, LOOKUP_SEP};
pub use primitives::{Clock, FixedClock, PrimitiveRegistry, SystemClock};
pub use rules::{Operation, Rule, RuleBook, RuleSet, Sentinel, SentinelRegistry};
pub use value::{Entity, Record, Value};
