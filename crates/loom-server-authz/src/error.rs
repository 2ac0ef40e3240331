// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for relational authorization.
//!
//! Every variant is a configuration or data defect. A legitimate "deny" is
//! never an error: it is `Ok(false)` (or an object missing from a filtered
//! list). Callers must not map these errors to a denial, since that would
//! hide broken rules behind what looks like a security decision.

use thiserror::Error;

/// Errors that abort an authorization call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthzError {
	/// The first segment of a right-hand path names no registered primitive.
	#[error("unknown primitive: {0}")]
	UnknownPrimitive(String),

	/// A path segment is not an attribute of the value it was applied to.
	#[error("lookup '{segment}' not found on {type_name}")]
	PathNotFound { segment: String, type_name: String },

	/// The final segment of a left-hand path names a comparator the operand
	/// does not support (or names no comparator at all).
	#[error("comparator '{comparator}' not supported by {type_name}")]
	ComparatorNotFound {
		comparator: String,
		type_name: String,
	},

	/// The request could not be mapped to a user.
	#[error("failed to resolve user for request")]
	UserResolutionFailed,

	/// `user` and `request` are bound per call and cannot be re-registered.
	#[error("primitive '{0}' is bound to the call context and cannot be registered")]
	ReservedPrimitive(String),

	/// A time primitive's offset moved past the range of representable
	/// timestamps.
	#[error("primitive '{0}' is out of the representable time range")]
	TimestampOutOfRange(String),

	/// The collection-filter collaborator failed.
	#[error("collection filter failed: {0}")]
	Filter(String),
}

impl AuthzError {
	pub(crate) fn path_not_found(segment: &str, type_name: &str) -> Self {
		AuthzError::PathNotFound {
			segment: segment.to_string(),
			type_name: type_name.to_string(),
		}
	}

	pub(crate) fn comparator_not_found(comparator: &str, type_name: &str) -> Self {
		AuthzError::ComparatorNotFound {
			comparator: comparator.to_string(),
			type_name: type_name.to_string(),
		}
	}

	/// Stable error code for logs and API responses.
	pub fn code(&self) -> &'static str {
		match self {
			AuthzError::UnknownPrimitive(_) => "UNKNOWN_PRIMITIVE",
			AuthzError::PathNotFound { .. } => "PATH_NOT_FOUND",
			AuthzError::ComparatorNotFound { .. } => "COMPARATOR_NOT_FOUND",
			AuthzError::UserResolutionFailed => "USER_RESOLUTION_FAILED",
			AuthzError::ReservedPrimitive(_) => "RESERVED_PRIMITIVE",
			AuthzError::TimestampOutOfRange(_) => "TIMESTAMP_OUT_OF_RANGE",
			AuthzError::Filter(_) => "FILTER_FAILED",
		}
	}
}

pub type Result<T> = std::result::Result<T, AuthzError>;
