#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(transparent)]
pub(crate) struct ErrorCode {
    code: &'static str,
}

impl ErrorCode {
    pub(crate) const fn as_str(&self) -> &'static str {
        self.code
    }

    pub(crate) const NO_SUCH_TABLE: ErrorCode = ErrorCode {
        code: "no-such-table",
    };
    pub(crate) const DUPLICATE_COLUMN: ErrorCode = ErrorCode {
        code: "duplicate-column",
    };
    pub(crate) const UNKNOWN_COLUMN: ErrorCode = ErrorCode {
        code: "unknown-column",
    };
    pub(crate) const DATA_TOO_LONG: ErrorCode = ErrorCode {
        code: "data-too-long",
    };
    pub(crate) const NOT_NULL: ErrorCode = ErrorCode { code: "not-null" };
    pub(crate) const ACCESS_DENIED: ErrorCode = ErrorCode {
        code: "access-denied",
    };
    pub(crate) const ALREADY_RECORDED: ErrorCode = ErrorCode {
        code: "already-recorded",
    };
    pub(crate) const INVALID_LEDGER: ErrorCode = ErrorCode {
        code: "invalid-ledger",
    };
    pub(crate) const INVALID_COLUMN_TYPE: ErrorCode = ErrorCode {
        code: "invalid-column-type",
    };
    pub(crate) const MYSQL_ERROR: ErrorCode = ErrorCode {
        code: "mysql-error",
    };
    pub(crate) const CHECKSUM_MISMATCH: ErrorCode = ErrorCode {
        code: "checksum-mismatch",
    };
    pub(crate) const UNKNOWN_APPLIED: ErrorCode = ErrorCode {
        code: "unknown-applied",
    };
    pub(crate) const MISSING_MIGRATION: ErrorCode = ErrorCode {
        code: "missing-migration",
    };
    pub(crate) const UNKNOWN_TARGET: ErrorCode = ErrorCode {
        code: "unknown-target",
    };
    pub(crate) const NOT_SATISFIED: ErrorCode = ErrorCode {
        code: "not-satisfied",
    };
    pub(crate) const INVALID_REGISTRY: ErrorCode = ErrorCode {
        code: "invalid-registry",
    };
    pub(crate) const VERIFY_FAILED: ErrorCode = ErrorCode {
        code: "verify-failed",
    };
    pub(crate) const IO_ERROR: ErrorCode = ErrorCode { code: "io-error" };
    pub(crate) const SERIALIZE_OUTPUT: ErrorCode = ErrorCode {
        code: "serialize-output",
    };
    pub(crate) const UNKNOWN_ERROR: ErrorCode = ErrorCode {
        code: "unknown-error",
    };
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
