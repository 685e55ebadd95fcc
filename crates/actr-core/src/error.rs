//! Error types for model construction and simulation.
//!
//! Every variant here is fatal to the rule firing that raised it. Retrieval
//! failures and false buffer queries are not errors: they surface as buffer
//! state (`error`) that rules can test for.

/// Errors raised while building or running a model.
#[derive(Debug, thiserror::Error)]
pub enum ActrError {
	/// A variable was used where a concrete value is required.
	#[error("Unbound variable '={variable}' in {context}")]
	Binding {
		/// Variable name without the `=` prefix
		variable: String,
		/// Where the variable was being resolved
		context: String,
	},

	/// A production or chunk violates the rule conventions.
	#[error("Rule error: {0}")]
	Rule(String),

	/// Base-level activation is undefined for a chunk.
	#[error("Chunk {chunk} cannot receive base-level activation: {reason}")]
	Activation {
		/// Display form of the chunk
		chunk: String,
		/// Why the computation is undefined
		reason: String,
	},

	/// The model is wired up inconsistently (buffers, memories, parameters).
	#[error("Configuration error: {0}")]
	Configuration(String),

	/// Config file could not be decoded.
	#[error("Failed to parse model configuration: {0}")]
	Parse(String),

	/// I/O error while reading a config file.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}

impl ActrError {
	/// Shorthand for a [`ActrError::Rule`] with a formatted message.
	pub fn rule(message: impl Into<String>) -> Self {
		Self::Rule(message.into())
	}

	/// Shorthand for a [`ActrError::Configuration`] with a formatted message.
	pub fn configuration(message: impl Into<String>) -> Self {
		Self::Configuration(message.into())
	}

	/// Check if the error comes from parameters, files or model wiring.
	#[must_use]
	pub fn is_configuration(&self) -> bool {
		matches!(self, Self::Configuration(_) | Self::Parse(_) | Self::Io(_))
	}

	/// Check if the error means the model itself is malformed.
	#[must_use]
	pub fn is_model_error(&self) -> bool {
		matches!(
			self,
			Self::Binding { .. } | Self::Rule(_) | Self::Activation { .. }
		)
	}
}

/// Result type alias for simulator operations.
pub type Result<T> = std::result::Result<T, ActrError>;
