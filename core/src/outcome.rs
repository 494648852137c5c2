//! Uniform success/message/error envelope for fallible operations.
//!
//! Operations whose failure modes are expected (bad input, empty result,
//! connectivity errors) return an [`Outcome`] instead of an `Err`. The
//! envelope is built only through constructors, and `success` is derived from
//! the payload on every read, so the flag and the payload cannot disagree.
//!
//! There are three instantiations:
//!
//! - `Outcome<()>`: no payload, built with [`Outcome::basic`].
//! - `Outcome<T>`: a single model, built with [`Outcome::model`].
//! - `Outcome<Vec<T>>`: a collection, built with [`Outcome::collection`].
//!   An empty collection counts as "no payload".
//!
//! # Example
//!
//! ```
//! use routine_sync_core::Outcome;
//!
//! let found: Outcome<Vec<u32>> = Outcome::collection(vec![1, 2, 3]);
//! assert!(found.success());
//! assert_eq!(found.message(), "There are 3 items in the list.");
//!
//! let none: Outcome<Vec<u32>> = Outcome::collection(Vec::new());
//! assert!(!none.success());
//! assert!(none.is_empty());
//! assert!(none.into_items().is_empty());
//! ```

use std::fmt;

use serde::ser::{Serialize, SerializeStruct, Serializer};

/// Boxed error type used as the default error parameter of [`Outcome`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

const MSG_NOT_FOUND: &str = "The requested information was not found.";
const MSG_MODEL_FOUND: &str = "Information found.";
const MSG_COMPLETED: &str = "Request completed successfully.";
const MSG_NOT_COMPLETED: &str = "The request could not be completed.";

#[derive(Debug, Clone)]
enum Fault<E> {
    /// Input was refused before any work was attempted.
    Rejected,
    /// Work was attempted and failed with an error.
    Failed(E),
}

/// Result envelope carrying a success flag, a human-readable message, an
/// optional error, and an optional payload.
///
/// `success()` is `true` exactly when a payload is present. Failure comes in
/// three shapes that callers can tell apart:
///
/// - **rejected** ([`is_rejected`](Self::is_rejected)): the input was invalid.
/// - **empty** ([`is_empty`](Self::is_empty)): the operation ran but produced
///   nothing.
/// - **failed** ([`error`](Self::error) is `Some`): the operation raised an
///   error.
#[derive(Debug, Clone)]
pub struct Outcome<T, E = BoxError> {
    message: String,
    payload: Option<T>,
    fault: Option<Fault<E>>,
}

impl<T, E> Outcome<T, E> {
    /// Builds a failed outcome. The message wraps the error text.
    pub fn failed(error: E) -> Self
    where
        E: fmt::Display,
    {
        Self {
            message: format!("An internal error occurred, {error}."),
            payload: None,
            fault: Some(Fault::Failed(error)),
        }
    }

    /// Builds an outcome for input refused before any work was attempted.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            payload: None,
            fault: Some(Fault::Rejected),
        }
    }

    /// Builds an outcome for an operation that completed without a result.
    pub fn empty(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            payload: None,
            fault: None,
        }
    }

    /// Builds a single-model outcome. `None` means "not found".
    pub fn model(model: Option<T>) -> Self {
        Self::empty(MSG_NOT_FOUND).with_model(model)
    }

    /// Replaces the payload with `model`, re-deriving success and the default
    /// message. Any previous fault is cleared.
    pub fn with_model(mut self, model: Option<T>) -> Self {
        self.message = if model.is_some() {
            MSG_MODEL_FOUND
        } else {
            MSG_NOT_FOUND
        }
        .to_string();
        self.payload = model;
        self.fault = None;
        self
    }

    /// Overrides the message without touching payload or fault.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn success(&self) -> bool {
        self.payload.is_some()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn error(&self) -> Option<&E> {
        match &self.fault {
            Some(Fault::Failed(error)) => Some(error),
            _ => None,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self.fault, Some(Fault::Rejected))
    }

    /// `true` when the operation ran without error but produced no payload.
    pub fn is_empty(&self) -> bool {
        self.payload.is_none() && self.fault.is_none()
    }

    pub fn payload(&self) -> Option<&T> {
        self.payload.as_ref()
    }

    pub fn into_payload(self) -> Option<T> {
        self.payload
    }

    /// Consumes the outcome, returning the error if it failed.
    pub fn into_error(self) -> Option<E> {
        match self.fault {
            Some(Fault::Failed(error)) => Some(error),
            _ => None,
        }
    }

    /// Maps the payload, keeping message and fault.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U, E> {
        Outcome {
            message: self.message,
            payload: self.payload.map(f),
            fault: self.fault,
        }
    }
}

impl<T, E> Outcome<Vec<T>, E> {
    /// Builds a collection outcome. An empty collection is stored as "no
    /// payload", so the outcome is unsuccessful.
    pub fn collection(items: Vec<T>) -> Self {
        Self::empty(MSG_NOT_FOUND).with_items(items)
    }

    /// Replaces the collection, re-deriving success and the default message.
    /// Any previous fault is cleared.
    pub fn with_items(mut self, items: Vec<T>) -> Self {
        if items.is_empty() {
            self.message = MSG_NOT_FOUND.to_string();
            self.payload = None;
        } else {
            self.message = format!("There are {} items in the list.", items.len());
            self.payload = Some(items);
        }
        self.fault = None;
        self
    }

    /// Items of the collection; empty when the outcome is unsuccessful.
    pub fn items(&self) -> &[T] {
        self.payload.as_deref().unwrap_or_default()
    }

    /// Consumes the outcome, returning the items or an empty vector.
    pub fn into_items(self) -> Vec<T> {
        self.payload.unwrap_or_default()
    }
}

impl<E> Outcome<(), E> {
    /// Builds a payload-less outcome from a completion flag.
    pub fn basic(completed: bool) -> Self {
        if completed {
            Self {
                message: MSG_COMPLETED.to_string(),
                payload: Some(()),
                fault: None,
            }
        } else {
            Self::empty(MSG_NOT_COMPLETED)
        }
    }
}

/// Serializes as `{ "success", "message", "payload" }`. The error is never
/// serialized.
impl<T: Serialize, E> Serialize for Outcome<T, E> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Outcome", 3)?;
        state.serialize_field("success", &self.success())?;
        state.serialize_field("message", &self.message)?;
        state.serialize_field("payload", &self.payload)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Boom;

    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("connection refused")
        }
    }

    #[test]
    fn test_collection_success_tracks_emptiness() {
        let full: Outcome<Vec<i32>, Boom> = Outcome::collection(vec![1, 2]);
        assert!(full.success());
        assert_eq!(full.items(), &[1, 2]);
        assert!(full.error().is_none());

        let empty: Outcome<Vec<i32>, Boom> = Outcome::collection(vec![]);
        assert!(!empty.success());
        assert!(empty.is_empty());
        assert_eq!(empty.message(), MSG_NOT_FOUND);
    }

    #[test]
    fn test_failed_is_never_successful() {
        let failed: Outcome<Vec<i32>, Boom> = Outcome::failed(Boom);
        assert!(!failed.success());
        assert!(!failed.is_empty());
        assert!(!failed.is_rejected());
        assert!(failed.error().is_some());
        assert_eq!(
            failed.message(),
            "An internal error occurred, connection refused."
        );
        assert!(failed.into_items().is_empty());
    }

    #[test]
    fn test_reassigning_payload_rederives_success() {
        let outcome: Outcome<Vec<i32>, Boom> = Outcome::collection(vec![1]);
        let outcome = outcome.with_items(vec![]);
        assert!(!outcome.success());

        let outcome = outcome.with_items(vec![4, 5, 6]);
        assert!(outcome.success());
        assert_eq!(outcome.message(), "There are 3 items in the list.");

        let recovered: Outcome<Vec<i32>, Boom> = Outcome::failed(Boom).with_items(vec![9]);
        assert!(recovered.success());
        assert!(recovered.error().is_none());
    }

    #[test]
    fn test_model_outcome() {
        let found: Outcome<&str, Boom> = Outcome::model(Some("routine"));
        assert!(found.success());
        assert_eq!(found.message(), MSG_MODEL_FOUND);

        let missing = found.with_model(None);
        assert!(!missing.success());
        assert_eq!(missing.message(), MSG_NOT_FOUND);
    }

    #[test]
    fn test_basic_outcome() {
        let done: Outcome<(), Boom> = Outcome::basic(true);
        assert!(done.success());
        assert_eq!(done.message(), MSG_COMPLETED);

        let not_done: Outcome<(), Boom> = Outcome::basic(false);
        assert!(!not_done.success());
        assert_eq!(not_done.message(), MSG_NOT_COMPLETED);
    }

    #[test]
    fn test_rejected_and_empty_are_distinguishable() {
        let rejected: Outcome<Vec<i32>, Boom> = Outcome::rejected("bad input");
        let empty: Outcome<Vec<i32>, Boom> = Outcome::empty("nothing");
        assert!(rejected.is_rejected() && !rejected.is_empty());
        assert!(empty.is_empty() && !empty.is_rejected());
        assert!(!rejected.success() && !empty.success());
    }

    #[test]
    fn test_with_message_keeps_payload() {
        let outcome: Outcome<Vec<i32>, Boom> =
            Outcome::collection(vec![1]).with_message("custom");
        assert!(outcome.success());
        assert_eq!(outcome.message(), "custom");
    }

    #[test]
    fn test_map_preserves_state() {
        let outcome: Outcome<Vec<i32>, Boom> = Outcome::collection(vec![1, 2]);
        let mapped = outcome.map(|items| items.len());
        assert!(mapped.success());
        assert_eq!(mapped.payload(), Some(&2));
    }

    #[test]
    fn test_serialize_skips_error() {
        let failed: Outcome<Vec<i32>, Boom> = Outcome::failed(Boom);
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "success": false,
                "message": "An internal error occurred, connection refused.",
                "payload": null
            })
        );
    }
}
