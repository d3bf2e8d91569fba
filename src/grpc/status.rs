//! Status simulation for the RPC surface.

use tonic::{Code, Status};

/// Canonical upper-case names of every gRPC status code.
pub const STATUS_CODES: [(&str, Code); 17] = [
    ("OK", Code::Ok),
    ("CANCELLED", Code::Cancelled),
    ("UNKNOWN", Code::Unknown),
    ("INVALID_ARGUMENT", Code::InvalidArgument),
    ("DEADLINE_EXCEEDED", Code::DeadlineExceeded),
    ("NOT_FOUND", Code::NotFound),
    ("ALREADY_EXISTS", Code::AlreadyExists),
    ("PERMISSION_DENIED", Code::PermissionDenied),
    ("RESOURCE_EXHAUSTED", Code::ResourceExhausted),
    ("FAILED_PRECONDITION", Code::FailedPrecondition),
    ("ABORTED", Code::Aborted),
    ("OUT_OF_RANGE", Code::OutOfRange),
    ("UNIMPLEMENTED", Code::Unimplemented),
    ("INTERNAL", Code::Internal),
    ("UNAVAILABLE", Code::Unavailable),
    ("DATA_LOSS", Code::DataLoss),
    ("UNAUTHENTICATED", Code::Unauthenticated),
];

/// Outcome table for `Status` when no name is requested: five `OK` and
/// one of each error.
pub const RANDOM_GRPC_CODES: [(Code, u32); 5] = [
    (Code::Ok, 5),
    (Code::InvalidArgument, 1),
    (Code::NotFound, 1),
    (Code::Internal, 1),
    (Code::Unavailable, 1),
];

pub fn code_from_name(name: &str) -> Option<Code> {
    STATUS_CODES
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, code)| *code)
}

pub fn code_name(code: Code) -> &'static str {
    STATUS_CODES
        .iter()
        .find(|(_, candidate)| *candidate == code)
        .map(|(name, _)| *name)
        .unwrap_or("UNKNOWN")
}

/// CamelCase rendering used as the status message, e.g. `NotFound`.
pub fn code_message(code: Code) -> &'static str {
    match code {
        Code::Ok => "OK",
        Code::Cancelled => "Canceled",
        Code::Unknown => "Unknown",
        Code::InvalidArgument => "InvalidArgument",
        Code::DeadlineExceeded => "DeadlineExceeded",
        Code::NotFound => "NotFound",
        Code::AlreadyExists => "AlreadyExists",
        Code::PermissionDenied => "PermissionDenied",
        Code::ResourceExhausted => "ResourceExhausted",
        Code::FailedPrecondition => "FailedPrecondition",
        Code::Aborted => "Aborted",
        Code::OutOfRange => "OutOfRange",
        Code::Unimplemented => "Unimplemented",
        Code::Internal => "Internal",
        Code::Unavailable => "Unavailable",
        Code::DataLoss => "DataLoss",
        Code::Unauthenticated => "Unauthenticated",
    }
}

/// Result of a `Status` call answering with `code`.
pub fn outcome(code: Code) -> Result<(), Status> {
    match code {
        Code::Ok => Ok(()),
        code => Err(Status::new(code, code_message(code))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for (name, code) in STATUS_CODES {
            assert_eq!(code_from_name(name), Some(code));
            assert_eq!(code_name(code), name);
        }
    }

    #[test]
    fn test_unknown_name() {
        assert_eq!(code_from_name("TEAPOT"), None);
        assert_eq!(code_from_name("ok"), None);
    }

    #[test]
    fn test_outcome() {
        assert!(outcome(Code::Ok).is_ok());
        let status = outcome(Code::NotFound).unwrap_err();
        assert_eq!(status.code(), Code::NotFound);
        assert_eq!(status.message(), "NotFound");

        let cancelled = outcome(Code::Cancelled).unwrap_err();
        assert_eq!(cancelled.message(), "Canceled");
        let invalid = outcome(Code::InvalidArgument).unwrap_err();
        assert_eq!(invalid.message(), "InvalidArgument");
    }
}
