pub type SynthResult<T> = Result<T, SynthError>;
pub type ComputeResult<T> = SynthResult<T>;

/// Failure class of a [`SynthError`]; fixes the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SynthErrorCategory {
    InputValidationError,
    IoSystemError,
    ComputationError,
    InternalError,
}

impl SynthErrorCategory {
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::InputValidationError => 2,
            Self::IoSystemError => 3,
            Self::ComputationError => 4,
            Self::InternalError => 5,
        }
    }
}

/// Crate-wide error: a category, a stable dotted placeholder such as
/// `INPUT.LINE_LIST` and a human message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("[{placeholder}] {message}")]
pub struct SynthError {
    category: SynthErrorCategory,
    placeholder: &'static str,
    message: String,
}

impl SynthError {
    pub fn new(
        category: SynthErrorCategory,
        placeholder: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            placeholder,
            message: message.into(),
        }
    }

    pub fn input_validation(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(SynthErrorCategory::InputValidationError, placeholder, message)
    }

    pub fn io_system(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(SynthErrorCategory::IoSystemError, placeholder, message)
    }

    pub fn computation(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(SynthErrorCategory::ComputationError, placeholder, message)
    }

    pub fn internal(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(SynthErrorCategory::InternalError, placeholder, message)
    }

    pub const fn category(&self) -> SynthErrorCategory {
        self.category
    }

    pub const fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    /// `ERROR: [PLACEHOLDER] message`, the first stderr line of a failed run.
    pub fn diagnostic_line(&self) -> String {
        format!("ERROR: {self}")
    }

    pub fn fatal_exit_line(&self) -> String {
        format!("FATAL EXIT CODE: {}", self.exit_code())
    }
}
