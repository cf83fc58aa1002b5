use std::error::Error;
use std::fmt::{Display, Formatter};

pub type MplaceResult<T> = Result<T, MplaceError>;
pub type ParserResult<T> = MplaceResult<T>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MplaceErrorCategory {
    Success,
    SyntaxError,
    SchemaError,
    BoundsError,
    NamespaceError,
    IoSystemError,
    InternalError,
}

impl MplaceErrorCategory {
    pub const fn compatibility_placeholder(self) -> CompatibilityExitPlaceholder {
        match self {
            Self::Success => CompatibilityExitPlaceholder {
                exit_code: 0,
                rust_category: "Success",
                legacy_class: "SUCCESS",
            },
            Self::SyntaxError => CompatibilityExitPlaceholder {
                exit_code: 2,
                rust_category: "SyntaxError",
                legacy_class: "INPUT_FATAL",
            },
            Self::SchemaError => CompatibilityExitPlaceholder {
                exit_code: 2,
                rust_category: "SchemaError",
                legacy_class: "INPUT_FATAL",
            },
            Self::BoundsError => CompatibilityExitPlaceholder {
                exit_code: 2,
                rust_category: "BoundsError",
                legacy_class: "INPUT_FATAL",
            },
            Self::NamespaceError => CompatibilityExitPlaceholder {
                exit_code: 2,
                rust_category: "NamespaceError",
                legacy_class: "INPUT_FATAL",
            },
            Self::IoSystemError => CompatibilityExitPlaceholder {
                exit_code: 3,
                rust_category: "IoSystemError",
                legacy_class: "IO_FATAL",
            },
            Self::InternalError => CompatibilityExitPlaceholder {
                exit_code: 5,
                rust_category: "InternalError",
                legacy_class: "SYS_FATAL",
            },
        }
    }

    pub const fn exit_code(self) -> i32 {
        self.compatibility_placeholder().exit_code
    }

    pub const fn rust_category(self) -> &'static str {
        self.compatibility_placeholder().rust_category
    }

    pub const fn legacy_class(self) -> &'static str {
        self.compatibility_placeholder().legacy_class
    }

    pub const fn is_fatal(self) -> bool {
        !matches!(self, Self::Success)
    }

    /// Input categories are reported back to the user; the rest are faults.
    pub const fn is_user_input(self) -> bool {
        matches!(
            self,
            Self::SyntaxError | Self::SchemaError | Self::BoundsError | Self::NamespaceError
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompatibilityExitPlaceholder {
    pub exit_code: i32,
    pub rust_category: &'static str,
    pub legacy_class: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MplaceError {
    category: MplaceErrorCategory,
    placeholder: &'static str,
    message: String,
    context: Option<String>,
}

impl MplaceError {
    pub fn new(
        category: MplaceErrorCategory,
        placeholder: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            placeholder,
            message: message.into(),
            context: None,
        }
    }

    pub fn syntax(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(MplaceErrorCategory::SyntaxError, placeholder, message)
    }

    pub fn schema(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(MplaceErrorCategory::SchemaError, placeholder, message)
    }

    pub fn bounds(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(MplaceErrorCategory::BoundsError, placeholder, message)
    }

    pub fn namespace(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(MplaceErrorCategory::NamespaceError, placeholder, message)
    }

    pub fn io_system(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(MplaceErrorCategory::IoSystemError, placeholder, message)
    }

    pub fn internal(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(MplaceErrorCategory::InternalError, placeholder, message)
    }

    /// Attaches the field or material the error refers to, e.g. `compounds['Drug1']`.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub const fn category(&self) -> MplaceErrorCategory {
        self.category
    }

    pub const fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    pub const fn compatibility_placeholder(&self) -> CompatibilityExitPlaceholder {
        self.category.compatibility_placeholder()
    }

    pub fn diagnostic_line(&self) -> String {
        let severity = if self.category.is_fatal() {
            "ERROR"
        } else {
            "INFO"
        };
        match &self.context {
            Some(context) => format!(
                "{}: [{}] {}: {}",
                severity, self.placeholder, context, self.message
            ),
            None => format!("{}: [{}] {}", severity, self.placeholder, self.message),
        }
    }

    pub fn fatal_exit_line(&self) -> Option<String> {
        self.category
            .is_fatal()
            .then(|| format!("FATAL EXIT CODE: {}", self.exit_code()))
    }
}

impl Display for MplaceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] ",
            self.category.rust_category(),
            self.placeholder
        )?;
        if let Some(context) = &self.context {
            write!(f, "{}: ", context)?;
        }
        f.write_str(&self.message)
    }
}

impl Error for MplaceError {}

#[cfg(test)]
mod tests {
    use super::{MplaceError, MplaceErrorCategory};

    #[test]
    fn exit_mapping_is_stable() {
        let cases = [
            (MplaceErrorCategory::Success, 0, "Success", "SUCCESS"),
            (MplaceErrorCategory::SyntaxError, 2, "SyntaxError", "INPUT_FATAL"),
            (MplaceErrorCategory::SchemaError, 2, "SchemaError", "INPUT_FATAL"),
            (MplaceErrorCategory::BoundsError, 2, "BoundsError", "INPUT_FATAL"),
            (
                MplaceErrorCategory::NamespaceError,
                2,
                "NamespaceError",
                "INPUT_FATAL",
            ),
            (MplaceErrorCategory::IoSystemError, 3, "IoSystemError", "IO_FATAL"),
            (MplaceErrorCategory::InternalError, 5, "InternalError", "SYS_FATAL"),
        ];

        for (category, exit_code, rust_category, legacy_class) in cases {
            let placeholder = category.compatibility_placeholder();
            assert_eq!(placeholder.exit_code, exit_code);
            assert_eq!(placeholder.rust_category, rust_category);
            assert_eq!(placeholder.legacy_class, legacy_class);
        }
    }

    #[test]
    fn fatal_error_renders_compatibility_lines() {
        let error = MplaceError::schema(
            "INPUT.SCHEMA_REPLICATES",
            "replicate count must be an integer >= 1 (found 0)",
        )
        .with_context("compounds['Drug1']");

        assert_eq!(error.exit_code(), 2);
        assert_eq!(error.context(), Some("compounds['Drug1']"));
        assert_eq!(
            error.diagnostic_line(),
            "ERROR: [INPUT.SCHEMA_REPLICATES] compounds['Drug1']: replicate count must be an integer >= 1 (found 0)"
        );
        assert_eq!(
            error.fatal_exit_line().as_deref(),
            Some("FATAL EXIT CODE: 2")
        );
    }

    #[test]
    fn input_categories_are_separated_from_faults() {
        assert!(MplaceErrorCategory::NamespaceError.is_user_input());
        assert!(MplaceErrorCategory::SyntaxError.is_user_input());
        assert!(!MplaceErrorCategory::InternalError.is_user_input());
        assert!(!MplaceErrorCategory::IoSystemError.is_user_input());
    }
}
