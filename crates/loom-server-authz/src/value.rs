// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Values that rules traverse and compare.
//!
//! Lookup paths walk over a closed set of value kinds rather than arbitrary
//! host objects:
//!
//! - **Scalars** ([`Value::Null`], [`Value::Bool`], [`Value::Int`],
//!   [`Value::Float`], [`Value::String`], [`Value::Timestamp`]) and
//!   [`Value::List`] expose no attributes.
//! - **Records** ([`Value::Record`]) expose named attributes through the
//!   [`Record`] trait. Hosts implement it for their models, or use
//!   [`Entity`] / [`Value::from_json`].
//! - **Deferred values** ([`Value::Deferred`]) are zero-argument computations.
//!   Right-hand paths invoke them as they are reached; left-hand paths do not.
//!
//! Equality is loose across numeric kinds (`true == 1 == 1.0`) and strict
//! otherwise. Two records are equal when they share a type name and have
//! equal identities, or when they are the same allocation.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

/// A record-like value whose attributes can be looked up by name.
pub trait Record: Send + Sync {
	/// Name used in error messages and for record equality.
	fn type_name(&self) -> &str;

	/// Returns the named attribute, or `None` if the record has no such member.
	fn attribute(&self, name: &str) -> Option<Value>;

	/// Identity used for equality between distinct allocations (a primary key).
	fn identity(&self) -> Option<Value> {
		None
	}
}

/// A zero-argument computation producing a [`Value`] when invoked.
#[derive(Clone)]
pub struct Deferred(Arc<dyn Fn() -> Value + Send + Sync>);

impl Deferred {
	pub fn new<F>(f: F) -> Self
	where
		F: Fn() -> Value + Send + Sync + 'static,
	{
		Self(Arc::new(f))
	}

	pub fn invoke(&self) -> Value {
		(self.0)()
	}
}

impl fmt::Debug for Deferred {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("Deferred(..)")
	}
}

/// A value taking part in rule evaluation.
#[derive(Clone)]
pub enum Value {
	Null,
	Bool(bool),
	Int(i64),
	Float(f64),
	String(String),
	Timestamp(DateTime<Utc>),
	List(Vec<Value>),
	Record(Arc<dyn Record>),
	Deferred(Deferred),
}

impl Value {
	/// Wraps a host record.
	pub fn record<R: Record + 'static>(record: R) -> Self {
		Value::Record(Arc::new(record))
	}

	/// Wraps a zero-argument computation.
	pub fn deferred<F>(f: F) -> Self
	where
		F: Fn() -> Value + Send + Sync + 'static,
	{
		Value::Deferred(Deferred::new(f))
	}

	/// Human-readable kind, used in `PathNotFound` and `ComparatorNotFound`.
	pub fn type_name(&self) -> &str {
		match self {
			Value::Null => "null",
			Value::Bool(_) => "bool",
			Value::Int(_) => "int",
			Value::Float(_) => "float",
			Value::String(_) => "string",
			Value::Timestamp(_) => "timestamp",
			Value::List(_) => "list",
			Value::Record(record) => record.type_name(),
			Value::Deferred(_) => "deferred",
		}
	}

	/// Plain attribute lookup. Only records have attributes.
	pub fn attribute(&self, name: &str) -> Option<Value> {
		match self {
			Value::Record(record) => record.attribute(name),
			_ => None,
		}
	}

	/// Invokes a deferred value; any other value is returned unchanged.
	pub fn force(self) -> Value {
		match self {
			Value::Deferred(deferred) => deferred.invoke(),
			other => other,
		}
	}

	/// `null`, `false`, zero, the empty string and the empty list are falsy.
	pub fn is_truthy(&self) -> bool {
		match self {
			Value::Null => false,
			Value::Bool(b) => *b,
			Value::Int(i) => *i != 0,
			Value::Float(f) => *f != 0.0,
			Value::String(s) => !s.is_empty(),
			Value::List(items) => !items.is_empty(),
			Value::Timestamp(_) | Value::Record(_) | Value::Deferred(_) => true,
		}
	}

	/// Whether `<`, `<=`, `>`, `>=` are defined with `self` as left operand.
	pub fn is_orderable(&self) -> bool {
		matches!(
			self,
			Value::Bool(_)
				| Value::Int(_)
				| Value::Float(_)
				| Value::String(_)
				| Value::Timestamp(_)
				| Value::List(_)
		)
	}

	/// Containment with `self` as the container.
	///
	/// Returns `None` if `self` is not a container. A string only contains
	/// strings.
	pub fn contains(&self, needle: &Value) -> Option<bool> {
		match self {
			Value::List(items) => Some(items.iter().any(|item| item == needle)),
			Value::String(haystack) => Some(match needle {
				Value::String(needle) => haystack.contains(needle.as_str()),
				_ => false,
			}),
			_ => None,
		}
	}

	/// Lifts a JSON document. Objects become records whose identity is their
	/// `id` field.
	pub fn from_json(json: serde_json::Value) -> Self {
		match json {
			serde_json::Value::Null => Value::Null,
			serde_json::Value::Bool(b) => Value::Bool(b),
			serde_json::Value::Number(n) => match n.as_i64() {
				Some(i) => Value::Int(i),
				None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
			},
			serde_json::Value::String(s) => Value::String(s),
			serde_json::Value::Array(items) => {
				Value::List(items.into_iter().map(Value::from_json).collect())
			}
			serde_json::Value::Object(map) => Value::record(JsonRecord(map)),
		}
	}

	fn as_number(&self) -> Option<Number> {
		match self {
			Value::Bool(b) => Some(Number::Int(i64::from(*b))),
			Value::Int(i) => Some(Number::Int(*i)),
			Value::Float(f) => Some(Number::Float(*f)),
			_ => None,
		}
	}
}

#[derive(Clone, Copy)]
enum Number {
	Int(i64),
	Float(f64),
}

impl Number {
	fn partial_cmp(self, other: Number) -> Option<Ordering> {
		match (self, other) {
			(Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
			(Number::Float(a), Number::Float(b)) => a.partial_cmp(&b),
			(Number::Int(a), Number::Float(b)) => cmp_int_float(a, b),
			(Number::Float(a), Number::Int(b)) => cmp_int_float(b, a).map(Ordering::reverse),
		}
	}
}

/// Exact comparison of an integer with a float. Casting the integer to
/// `f64` rounds above 2^53.
fn cmp_int_float(i: i64, f: f64) -> Option<Ordering> {
	// 2^63, the first float past i64::MAX.
	const LIMIT: f64 = 9_223_372_036_854_775_808.0;

	if f.is_nan() {
		return None;
	}
	if f >= LIMIT {
		return Some(Ordering::Less);
	}
	if f < -LIMIT {
		return Some(Ordering::Greater);
	}

	let whole = f.trunc();
	match i.cmp(&(whole as i64)) {
		Ordering::Equal => whole.partial_cmp(&f),
		unequal => Some(unequal),
	}
}

fn same_allocation<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
	Arc::ptr_eq(a, b)
}

impl PartialEq for Value {
	fn eq(&self, other: &Value) -> bool {
		if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
			return a.partial_cmp(b) == Some(Ordering::Equal);
		}
		match (self, other) {
			(Value::Null, Value::Null) => true,
			(Value::String(a), Value::String(b)) => a == b,
			(Value::Timestamp(a), Value::Timestamp(b)) => a == b,
			(Value::List(a), Value::List(b)) => a == b,
			(Value::Record(a), Value::Record(b)) => {
				if same_allocation(a, b) {
					return true;
				}
				if a.type_name() != b.type_name() {
					return false;
				}
				match (a.identity(), b.identity()) {
					(Some(x), Some(y)) => x == y,
					_ => false,
				}
			}
			(Value::Deferred(a), Value::Deferred(b)) => same_allocation(&a.0, &b.0),
			_ => false,
		}
	}
}

impl PartialOrd for Value {
	fn partial_cmp(&self, other: &Value) -> Option<Ordering> {
		if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
			return a.partial_cmp(b);
		}
		match (self, other) {
			(Value::String(a), Value::String(b)) => Some(a.cmp(b)),
			(Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
			(Value::List(a), Value::List(b)) => a.partial_cmp(b),
			_ => None,
		}
	}
}

impl fmt::Debug for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Value::Null => f.write_str("Null"),
			Value::Bool(b) => write!(f, "Bool({b})"),
			Value::Int(i) => write!(f, "Int({i})"),
			Value::Float(x) => write!(f, "Float({x})"),
			Value::String(s) => write!(f, "String({s:?})"),
			Value::Timestamp(t) => write!(f, "Timestamp({})", t.to_rfc3339()),
			Value::List(items) => f.debug_tuple("List").field(items).finish(),
			Value::Record(record) => match record.identity() {
				Some(id) => write!(f, "Record({} {:?})", record.type_name(), id),
				None => write!(f, "Record({})", record.type_name()),
			},
			Value::Deferred(deferred) => fmt::Debug::fmt(deferred, f),
		}
	}
}

impl From<bool> for Value {
	fn from(b: bool) -> Self {
		Value::Bool(b)
	}
}

impl From<i64> for Value {
	fn from(i: i64) -> Self {
		Value::Int(i)
	}
}

impl From<i32> for Value {
	fn from(i: i32) -> Self {
		Value::Int(i64::from(i))
	}
}

impl From<u32> for Value {
	fn from(i: u32) -> Self {
		Value::Int(i64::from(i))
	}
}

impl From<f64> for Value {
	fn from(f: f64) -> Self {
		Value::Float(f)
	}
}

impl From<&str> for Value {
	fn from(s: &str) -> Self {
		Value::String(s.to_string())
	}
}

impl From<String> for Value {
	fn from(s: String) -> Self {
		Value::String(s)
	}
}

impl From<DateTime<Utc>> for Value {
	fn from(t: DateTime<Utc>) -> Self {
		Value::Timestamp(t)
	}
}

impl<T: Into<Value>> From<Vec<T>> for Value {
	fn from(items: Vec<T>) -> Self {
		Value::List(items.into_iter().map(Into::into).collect())
	}
}

impl<T: Into<Value>> From<Option<T>> for Value {
	fn from(opt: Option<T>) -> Self {
		opt.map(Into::into).unwrap_or(Value::Null)
	}
}

impl From<Entity> for Value {
	fn from(entity: Entity) -> Self {
		Value::record(entity)
	}
}

impl From<serde_json::Value> for Value {
	fn from(json: serde_json::Value) -> Self {
		Value::from_json(json)
	}
}

/// A general-purpose [`Record`] assembled from named fields.
///
/// ```
/// use loom_server_authz::{Entity, Value};
///
/// let owner = Entity::new("User").with("id", 7).identified_by("id");
/// let doc: Value = Entity::new("Document")
///     .with("owner", owner)
///     .with_deferred("title_length", || Value::Int(12))
///     .into();
/// assert_eq!(doc.type_name(), "Document");
/// ```
#[derive(Clone)]
pub struct Entity {
	type_name: String,
	fields: BTreeMap<String, Value>,
	identity_field: Option<String>,
}

impl Entity {
	pub fn new(type_name: impl Into<String>) -> Self {
		Self {
			type_name: type_name.into(),
			fields: BTreeMap::new(),
			identity_field: None,
		}
	}

	/// Builder: set a plain field.
	pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
		self.fields.insert(name.into(), value.into());
		self
	}

	/// Builder: set a field computed on access.
	pub fn with_deferred<F>(mut self, name: impl Into<String>, f: F) -> Self
	where
		F: Fn() -> Value + Send + Sync + 'static,
	{
		self.fields.insert(name.into(), Value::deferred(f));
		self
	}

	/// Builder: use the named field as this entity's identity.
	pub fn identified_by(mut self, field: impl Into<String>) -> Self {
		self.identity_field = Some(field.into());
		self
	}
}

impl Record for Entity {
	fn type_name(&self) -> &str {
		&self.type_name
	}

	fn attribute(&self, name: &str) -> Option<Value> {
		self.fields.get(name).cloned()
	}

	fn identity(&self) -> Option<Value> {
		let field = self.identity_field.as_ref()?;
		self.fields.get(field).cloned().map(Value::force)
	}
}

struct JsonRecord(serde_json::Map<String, serde_json::Value>);

impl Record for JsonRecord {
	fn type_name(&self) -> &str {
		"object"
	}

	fn attribute(&self, name: &str) -> Option<Value> {
		self.0.get(name).cloned().map(Value::from_json)
	}

	fn identity(&self) -> Option<Value> {
		self.attribute("id")
	}
}
