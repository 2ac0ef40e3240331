// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Lookup paths and attribute traversal.
//!
//! A lookup path is a string of segments joined by [`LOOKUP_SEP`], in the
//! style of ORM field lookups: `owner__team__id`, `created__gte`.
//!
//! Two traversal modes exist:
//!
//! - [`resolve`] follows a right-hand path from a primitive root and invokes
//!   every [`Value::Deferred`] it lands on.
//! - [`traverse`] follows the leading segments of a left-hand path on a
//!   candidate object using plain attribute access only.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::trace;

use crate::error::{AuthzError, Result};
use crate::value::Value;

/// Separator between lookup path segments.
pub const LOOKUP_SEP: &str = "__";

/// A parsed lookup path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LookupPath {
	raw: String,
	segments: Vec<String>,
}

impl LookupPath {
	pub fn new(raw: impl Into<String>) -> Self {
		let raw = raw.into();
		let segments = raw.split(LOOKUP_SEP).map(str::to_string).collect();
		Self { raw, segments }
	}

	pub fn as_str(&self) -> &str {
		&self.raw
	}

	pub fn segments(&self) -> &[String] {
		&self.segments
	}

	/// First segment. For a right-hand path this names the primitive.
	pub fn head(&self) -> &str {
		self.segments.first().map(String::as_str).unwrap_or_default()
	}

	/// Every segment after the first.
	pub fn tail(&self) -> &[String] {
		self.segments.get(1..).unwrap_or_default()
	}

	/// Leading segments and the final segment.
	pub fn split_last(&self) -> (&[String], &str) {
		match self.segments.split_last() {
			Some((last, leading)) => (leading, last.as_str()),
			None => (&[], ""),
		}
	}

	/// True if the path is empty or contains an empty segment (`a____b`).
	pub fn has_empty_segment(&self) -> bool {
		self.segments.iter().any(String::is_empty)
	}
}

impl fmt::Display for LookupPath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.raw)
	}
}

impl From<&str> for LookupPath {
	fn from(raw: &str) -> Self {
		LookupPath::new(raw)
	}
}

impl From<String> for LookupPath {
	fn from(raw: String) -> Self {
		LookupPath::new(raw)
	}
}

impl Serialize for LookupPath {
	fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&self.raw)
	}
}

impl<'de> Deserialize<'de> for LookupPath {
	fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		String::deserialize(deserializer).map(LookupPath::new)
	}
}

/// Follows `segments` from `root`, invoking deferred members as they are
/// reached.
///
/// Fails with [`AuthzError::PathNotFound`] naming the missing segment and the
/// kind of the value it was looked up on.
pub fn resolve(root: Value, segments: &[String]) -> Result<Value> {
	let mut current = root;
	for segment in segments {
		let member = current
			.attribute(segment)
			.ok_or_else(|| AuthzError::path_not_found(segment, current.type_name()))?;
		trace!(segment = %segment, on = current.type_name(), "resolved lookup segment");
		current = member.force();
	}
	Ok(current)
}

/// Follows `segments` from `root` with plain attribute access.
///
/// Deferred members are returned as-is, never invoked.
pub fn traverse(root: &Value, segments: &[String]) -> Result<Value> {
	let mut current = root.clone();
	for segment in segments {
		current = current
			.attribute(segment)
			.ok_or_else(|| AuthzError::path_not_found(segment, current.type_name()))?;
	}
	Ok(current)
}
